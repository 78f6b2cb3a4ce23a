// Core business logic: saved lists, nearby discovery, and the seams to the
// places provider, the key-value store and the device location
pub mod config;
pub mod discovery;
pub mod error;
pub mod geo;
pub mod location;
pub mod models;
pub mod providers;
pub mod saved_list;

pub use config::Config;
pub use discovery::{
    filter_by_text, nearest_match, rank_by_distance, DiscoveryConfig, DiscoveryService,
};
pub use error::Error;
pub use geo::haversine_distance_m;
pub use location::{resolve_location, LocationError, LocationProvider, StaticLocation};
pub use models::{
    Coordinates, DetailsRecord, ListKind, PriceLevel, RestaurantCandidate, SavedRestaurant,
    Viewport,
};
pub use providers::{GooglePlacesProvider, PlacesProvider};
pub use saved_list::{RemoveOutcome, SaveOutcome, SavedListStore};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
