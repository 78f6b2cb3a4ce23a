use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use foodie_core::{
    config::API_KEY_ENV, filter_by_text, nearest_match, rank_by_distance, resolve_location,
    Config, Coordinates, DiscoveryService, GooglePlacesProvider, ListKind, RemoveOutcome,
    SaveOutcome, SavedListStore, SavedRestaurant, StaticLocation, Viewport,
};
use foodie_store::{KvStore, MemoryKvStore, SqliteKvStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "foodie")]
#[command(version, about = "Find restaurants nearby and keep your favorites", long_about = None)]
struct Cli {
    /// Places API key (overrides config file and environment)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Saved-lists database (defaults to the user data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Keep saved lists in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List restaurants around a point, closest first
    Nearby {
        /// Latitude of the search center (omit to use the default location)
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude of the search center
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Search radius in meters
        #[arg(long)]
        radius: Option<u32>,
        /// Only names containing this text
        #[arg(long, short)]
        query: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show details for a place
    Details {
        /// Provider place id
        id: String,
    },
    /// Fetch a place's details and add it to a list
    Save {
        /// Provider place id
        id: String,
        /// favorites or pending
        #[arg(long, short, value_parser = parse_list, default_value = "favorites")]
        list: ListKind,
    },
    /// Show a saved list
    List {
        /// favorites or pending
        #[arg(value_parser = parse_list)]
        list: ListKind,
    },
    /// Take a place off a list
    Remove {
        /// Provider place id
        id: String,
        /// favorites or pending
        #[arg(long, short, value_parser = parse_list)]
        list: ListKind,
    },
    /// Delete both saved lists
    Clear,
    /// Print the effective configuration
    Config {
        /// Write the defaults to the config file if it doesn't exist yet
        #[arg(long)]
        init: bool,
    },
}

fn parse_list(s: &str) -> Result<ListKind, String> {
    s.parse::<ListKind>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodie=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_api_key_override(cli.api_key.clone());
    if let Some(db) = &cli.db {
        config.storage.db_path = Some(db.clone());
    }

    match cli.command {
        Some(Commands::Nearby {
            lat,
            lng,
            radius,
            query,
            json,
        }) => {
            let discovery = discovery_service(&config)?;
            let location = StaticLocation(lat.zip(lng).map(|(lat, lng)| Coordinates::new(lat, lng)));
            let here = resolve_location(&location, config.location.default_coordinates()).await;

            tracing::info!(
                "Searching around {} within {}m",
                here,
                radius.unwrap_or(discovery.config().search_radius_meters)
            );
            let candidates = match radius {
                Some(radius) => discovery.fetch_nearby(here, Some(radius)).await?,
                None => {
                    let viewport = Viewport::default().recentered(here);
                    discovery.fetch_viewport(&viewport).await?
                }
            };
            let matching = filter_by_text(&candidates, query.as_deref().unwrap_or(""));
            let ranked = rank_by_distance(&matching, here);

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
                return Ok(());
            }

            if ranked.is_empty() {
                println!("No restaurants found.");
                return Ok(());
            }

            if let (Some(q), Some(best)) = (&query, nearest_match(&matching, here)) {
                println!("Closest match for \"{}\": {}\n", q, best.name);
            }

            for candidate in &ranked {
                let rating = candidate
                    .rating
                    .map(|r| format!("{:.1}★", r))
                    .unwrap_or_else(|| "  - ".to_string());
                println!(
                    "{:>6.0} m  {:<5} {:<40} {}",
                    here.distance_to(candidate.coordinates),
                    rating,
                    candidate.name,
                    candidate.id
                );
            }
        }
        Some(Commands::Details { id }) => {
            let discovery = discovery_service(&config)?;
            let Some(details) = discovery.fetch_details(&id).await? else {
                bail!("No place with id {}", id);
            };

            println!("{}", details.name);
            if let Some(rating) = details.rating {
                println!("  Rating:  {:.1}", rating);
            }
            println!("  Price:   {}", details.price_text());
            if let Some(address) = &details.formatted_address {
                println!("  Address: {}", address);
            }
            if let Some(phone) = details.phone_uri() {
                println!("  Phone:   {}", phone);
            }
            if let Some(website) = &details.website {
                println!("  Website: {}", website);
            }

            let lists = saved_lists(&config, cli.ephemeral)?;
            let on = lists.memberships(&id).await?;
            if !on.is_empty() {
                let names: Vec<_> = on.iter().map(ListKind::as_str).collect();
                println!("  Saved in: {}", names.join(", "));
            }
        }
        Some(Commands::Save { id, list }) => {
            let discovery = discovery_service(&config)?;
            let details = discovery
                .fetch_details(&id)
                .await?
                .with_context(|| format!("No place with id {}", id))?;

            let lists = saved_lists(&config, cli.ephemeral)?;
            let restaurant = SavedRestaurant::from_details(&id, &details, list);
            match lists.save(restaurant).await? {
                SaveOutcome::Saved => println!("Saved {} to {}", details.name, list),
                SaveOutcome::AlreadySaved => println!("{} is already in {}", details.name, list),
            }
        }
        Some(Commands::List { list }) => {
            let lists = saved_lists(&config, cli.ephemeral)?;
            let saved = lists.list(list).await?;

            if saved.is_empty() {
                println!("Your {} list is empty.", list);
            }
            for restaurant in &saved {
                let rating = restaurant
                    .rating
                    .map(|r| format!("{:.1}★", r))
                    .unwrap_or_default();
                println!("{:<40} {:<5} {}", restaurant.name, rating, restaurant.id);
                if !restaurant.address.is_empty() {
                    println!("    {}", restaurant.address);
                }
            }
        }
        Some(Commands::Remove { id, list }) => {
            let lists = saved_lists(&config, cli.ephemeral)?;
            match lists.remove(&id, list).await? {
                RemoveOutcome::Removed => println!("Removed {} from {}", id, list),
                RemoveOutcome::NotFound => println!("{} was not in {}", id, list),
            }
        }
        Some(Commands::Clear) => {
            saved_lists(&config, cli.ephemeral)?.clear().await?;
            println!("Cleared favorites and pending.");
        }
        Some(Commands::Config { init }) => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    println!("{} already exists", path.display());
                } else {
                    Config::default().save()?;
                    println!("Wrote {}", path.display());
                }
            }

            let mut shown = config.clone();
            if shown.places.api_key.is_some() {
                shown.places.api_key = Some("********".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        None => {
            println!("No command specified. Try --help");
        }
    }

    Ok(())
}

fn discovery_service(config: &Config) -> anyhow::Result<DiscoveryService> {
    let provider = GooglePlacesProvider::from_config(&config.places)
        .with_context(|| format!("pass --api-key or set {}", API_KEY_ENV))?;
    Ok(DiscoveryService::new(
        Box::new(provider),
        config.places.discovery_config(),
    ))
}

fn saved_lists(config: &Config, ephemeral: bool) -> anyhow::Result<SavedListStore> {
    let store: Arc<dyn KvStore> = if ephemeral {
        Arc::new(MemoryKvStore::new())
    } else {
        let path = config.storage.resolved_db_path()?;
        Arc::new(
            SqliteKvStore::open(&path)
                .with_context(|| format!("opening {}", path.display()))?,
        )
    };
    Ok(SavedListStore::new(store))
}
