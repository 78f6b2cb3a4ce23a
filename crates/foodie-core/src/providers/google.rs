// Google Places provider - bridges the HTTP client with the PlacesProvider trait
use std::time::Duration;

use async_trait::async_trait;
use foodie_api::{NearbyPlace, PlaceDetails, PlacesClient};

use crate::{
    config::PlacesConfig,
    models::{Coordinates, DetailsRecord, PriceLevel, RestaurantCandidate},
    providers::PlacesProvider,
    Error, Result,
};

/// Wrapper around PlacesClient that implements PlacesProvider
pub struct GooglePlacesProvider {
    client: PlacesClient,
}

impl GooglePlacesProvider {
    pub fn new(client: PlacesClient) -> Self {
        Self { client }
    }

    /// Build a client from configuration; fails when no API key is set
    pub fn from_config(config: &PlacesConfig) -> Result<Self> {
        let client = PlacesClient::with_options(
            config.api_key()?.to_string(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesProvider {
    async fn nearby(
        &self,
        center: Coordinates,
        radius_meters: u32,
        category: &str,
    ) -> Result<Vec<RestaurantCandidate>> {
        let places = self
            .client
            .nearby_search(center.latitude, center.longitude, radius_meters, category)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(places.into_iter().map(place_to_candidate).collect())
    }

    async fn details(&self, id: &str) -> Result<Option<DetailsRecord>> {
        let details = self
            .client
            .place_details(id)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(details.map(details_to_record))
    }
}

fn place_to_candidate(place: NearbyPlace) -> RestaurantCandidate {
    RestaurantCandidate {
        id: place.place_id,
        name: place.name,
        coordinates: Coordinates::new(place.geometry.location.lat, place.geometry.location.lng),
        rating: place.rating,
        vicinity: place.vicinity,
    }
}

fn details_to_record(details: PlaceDetails) -> DetailsRecord {
    DetailsRecord {
        name: details.name,
        formatted_address: details.formatted_address,
        phone: details.formatted_phone_number,
        website: details.website,
        rating: details.rating,
        price_level: details.price_level.map(PriceLevel),
    }
}
