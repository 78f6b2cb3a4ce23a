// Places provider client - nearby search and place details over HTTP
pub mod places;
pub mod retry;

pub use places::{
    LatLng, NearbyPlace, PlaceDetails, PlacesClient, PlacesError, DETAILS_FIELDS,
};
pub use retry::RetryConfig;
