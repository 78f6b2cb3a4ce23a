// Nearby discovery: fetch, dedupe, filter by name, rank by distance
use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    geo::haversine_distance_m,
    models::{Coordinates, DetailsRecord, RestaurantCandidate, Viewport},
    providers::PlacesProvider,
    Result,
};

/// Search parameters the service applies on every nearby call
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub search_radius_meters: u32,
    pub category: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_radius_meters: 1500,
            category: "restaurant".to_string(),
        }
    }
}

/// Turns a map position into a list of restaurants worth showing
///
/// Holds no caller state. The current viewport, candidate list and filter
/// text belong to the caller and come in as arguments, so two screens can
/// share one service without stepping on each other.
pub struct DiscoveryService {
    provider: Box<dyn PlacesProvider>,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(provider: Box<dyn PlacesProvider>, config: DiscoveryConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Restaurants around `center`, provider order, duplicate ids dropped
    ///
    /// `radius_meters` of `None` uses the configured radius. Failures are
    /// logged and returned; an empty `Ok` really means nothing is nearby.
    pub async fn fetch_nearby(
        &self,
        center: Coordinates,
        radius_meters: Option<u32>,
    ) -> Result<Vec<RestaurantCandidate>> {
        let radius = radius_meters.unwrap_or(self.config.search_radius_meters);
        debug!("Nearby search around {} within {}m", center, radius);

        match self
            .provider
            .nearby(center, radius, &self.config.category)
            .await
        {
            Ok(candidates) => {
                let fetched = candidates.len();
                let unique = dedup_by_id(candidates);
                if unique.len() < fetched {
                    debug!("Dropped {} duplicate results", fetched - unique.len());
                }
                info!("Found {} restaurants near {}", unique.len(), center);
                Ok(unique)
            }
            Err(e) => {
                warn!(error = %e, center = %center, "Nearby search failed");
                Err(e)
            }
        }
    }

    /// Refresh for a map region change
    pub async fn fetch_viewport(&self, viewport: &Viewport) -> Result<Vec<RestaurantCandidate>> {
        self.fetch_nearby(viewport.center, None).await
    }

    /// Fetch around `center`, keep names matching `query`, closest to `reference` first
    pub async fn search(
        &self,
        center: Coordinates,
        query: &str,
        reference: Coordinates,
    ) -> Result<Vec<RestaurantCandidate>> {
        let candidates = self.fetch_nearby(center, None).await?;
        let matching = filter_by_text(&candidates, query);
        Ok(rank_by_distance(&matching, reference))
    }

    /// Full details for one place; `Ok(None)` when the provider doesn't know it
    pub async fn fetch_details(&self, id: &str) -> Result<Option<DetailsRecord>> {
        match self.provider.details(id).await {
            Ok(Some(details)) => Ok(Some(details)),
            Ok(None) => {
                info!("No details for place {}", id);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, place_id = %id, "Details lookup failed");
                Err(e)
            }
        }
    }
}

/// Keep the first occurrence of every id, order otherwise untouched
pub fn dedup_by_id(candidates: Vec<RestaurantCandidate>) -> Vec<RestaurantCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// Case-insensitive substring match on the name; a blank query keeps everything
pub fn filter_by_text(candidates: &[RestaurantCandidate], query: &str) -> Vec<RestaurantCandidate> {
    if query.trim().is_empty() {
        return candidates.to_vec();
    }
    let needle = query.to_lowercase();

    candidates
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Closest first by haversine distance; equal distances keep input order
pub fn rank_by_distance(
    candidates: &[RestaurantCandidate],
    reference: Coordinates,
) -> Vec<RestaurantCandidate> {
    let mut keyed: Vec<(f64, &RestaurantCandidate)> = candidates
        .iter()
        .map(|c| (haversine_distance_m(reference, c.coordinates), c))
        .collect();

    // sort_by is stable
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    keyed.into_iter().map(|(_, c)| c.clone()).collect()
}

/// The candidate closest to `reference`, used to recenter the map on a live search
pub fn nearest_match(
    candidates: &[RestaurantCandidate],
    reference: Coordinates,
) -> Option<RestaurantCandidate> {
    // min_by returns the first of several equal minimums, same as the stable sort
    candidates
        .iter()
        .min_by(|a, b| {
            haversine_distance_m(reference, a.coordinates)
                .total_cmp(&haversine_distance_m(reference, b.coordinates))
        })
        .cloned()
}
