use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::geo::haversine_distance_m;

/// A WGS84 point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn distance_to(&self, other: Coordinates) -> f64 {
        haversine_distance_m(*self, other)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Puerta del Sol, where the map opens when nothing better is known
pub const MADRID: Coordinates = Coordinates::new(40.416775, -3.703790);

/// The visible map region: a center plus the span shown on each axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Coordinates,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Viewport {
    pub fn new(center: Coordinates, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            center,
            latitude_delta,
            longitude_delta,
        }
    }

    /// Whether a point falls inside the visible span
    pub fn contains(&self, point: Coordinates) -> bool {
        (point.latitude - self.center.latitude).abs() <= self.latitude_delta / 2.0
            && (point.longitude - self.center.longitude).abs() <= self.longitude_delta / 2.0
    }

    /// Same span, new center. Used when recentering on a search match.
    pub fn recentered(&self, center: Coordinates) -> Self {
        Self { center, ..*self }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(MADRID, 0.0922, 0.0421)
    }
}

/// A transient nearby-search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantCandidate {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub rating: Option<f64>,
    /// Short address the nearby search returns alongside the name
    pub vicinity: Option<String>,
}

/// Provider price bracket, 0 (free) to 4 (very expensive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceLevel(pub u8);

impl PriceLevel {
    pub fn symbols(&self) -> String {
        "$".repeat(self.0 as usize)
    }

    /// Display text for an optional level
    pub fn describe(level: Option<PriceLevel>) -> String {
        match level {
            Some(level) => level.symbols(),
            None => "Not available".to_string(),
        }
    }
}

/// Everything a details lookup knows about one place
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetailsRecord {
    pub name: String,
    pub formatted_address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub price_level: Option<PriceLevel>,
}

impl DetailsRecord {
    /// `tel:` link for the call button
    pub fn phone_uri(&self) -> Option<String> {
        self.phone
            .as_ref()
            .map(|p| format!("tel:{}", p.replace(' ', "")))
    }

    pub fn price_text(&self) -> String {
        PriceLevel::describe(self.price_level)
    }
}

/// The two saved lists. Serialized names match what older app builds wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    #[serde(rename = "favoritos")]
    Favorites,
    #[serde(rename = "pendientes")]
    Pending,
}

impl ListKind {
    pub fn all() -> [ListKind; 2] {
        [ListKind::Favorites, ListKind::Pending]
    }

    /// Key of the storage slot holding this list
    pub fn storage_key(&self) -> &'static str {
        match self {
            ListKind::Favorites => "@foodie_favoritos",
            ListKind::Pending => "@foodie_pendientes",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Favorites => "favorites",
            ListKind::Pending => "pending",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "favorites" | "favoritos" | "fav" => Ok(ListKind::Favorites),
            "pending" | "pendientes" | "todo" => Ok(ListKind::Pending),
            other => Err(crate::Error::UnknownList(other.to_string())),
        }
    }
}

/// A restaurant the user put on one of their lists
///
/// The JSON shape is the on-device format, so optional fields are omitted
/// rather than written as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRestaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub list: ListKind,
}

impl SavedRestaurant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, list: ListKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: String::new(),
            rating: None,
            phone: None,
            website: None,
            list,
        }
    }

    /// Save straight from a search result, before any details lookup
    pub fn from_candidate(candidate: &RestaurantCandidate, list: ListKind) -> Self {
        Self {
            address: candidate.vicinity.clone().unwrap_or_default(),
            rating: candidate.rating,
            ..Self::new(candidate.id.clone(), candidate.name.clone(), list)
        }
    }

    /// Save with the full details record; `id` is the provider id it was fetched for
    pub fn from_details(id: impl Into<String>, details: &DetailsRecord, list: ListKind) -> Self {
        Self {
            id: id.into(),
            name: details.name.clone(),
            address: details.formatted_address.clone().unwrap_or_default(),
            rating: details.rating,
            phone: details.phone.clone(),
            website: details.website.clone(),
            list,
        }
    }
}
