use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lodging {
    pub name: String,
    pub rating: f32,
    pub price_range: PriceRange,
    pub location: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rating: f32,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub best_time: Option<String>,
    #[serde(default)]
    pub tips: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransitOption {
    pub method: String,
    pub description: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransitRoute {
    pub origin: String,
    pub destination: String,
    pub options: Vec<TransitOption>,
}
