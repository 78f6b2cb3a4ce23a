// Places provider seam - the core never talks HTTP directly
pub mod google;

pub use google::GooglePlacesProvider;

use async_trait::async_trait;

use crate::{
    models::{Coordinates, DetailsRecord, RestaurantCandidate},
    Result,
};

/// Anything that can answer "what's near here" and "tell me about this place"
///
/// One implementation per vendor; tests swap in a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Places of `category` within `radius_meters` of `center`, provider order
    async fn nearby(
        &self,
        center: Coordinates,
        radius_meters: u32,
        category: &str,
    ) -> Result<Vec<RestaurantCandidate>>;

    /// Details for one place; `Ok(None)` when the id is unknown
    async fn details(&self, id: &str) -> Result<Option<DetailsRecord>>;
}
