use async_trait::async_trait;

use crate::lookups::{LookupResult, TransitEstimator};
use crate::models::{Lodging, PointOfInterest, TransitOption};

/// Canned public transit, taxi and walking suggestions for any origin/destination pair.
#[derive(Clone, Debug, Default)]
pub struct TemplateTransitEstimator;

impl TemplateTransitEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn suggestions(origin: &str, destination: &str) -> Vec<TransitOption> {
        vec![
            TransitOption {
                method: "public transit".to_string(),
                description: format!(
                    "Take the metro or a city bus from {origin} to {destination}; allow 30-45 minutes."
                ),
            },
            TransitOption {
                method: "taxi".to_string(),
                description: format!(
                    "A taxi from {origin} to {destination} takes about 15-20 minutes and costs roughly NT$250."
                ),
            },
            TransitOption {
                method: "walking".to_string(),
                description: format!(
                    "Walking from {origin} to {destination} covers about 1.5 km and takes around 20 minutes."
                ),
            },
        ]
    }
}

#[async_trait]
impl TransitEstimator for TemplateTransitEstimator {
    async fn estimate_transit(
        &self,
        origin: &Lodging,
        destination: &PointOfInterest,
    ) -> LookupResult<Vec<TransitOption>> {
        Ok(Self::suggestions(&origin.name, &destination.name))
    }
}
