use serde::{Deserialize, Serialize};

use crate::models::Lodging;

/// Parameters extracted from a query and handed to a lookup collaborator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupParameters {
    pub destination: Option<String>,
    pub budget: Option<u32>,
    pub guests: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Lodging the search should be centred on, when one was already selected.
    #[serde(default)]
    pub anchor: Option<Lodging>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedRecord {
    pub needed: bool,
    #[serde(default)]
    pub parameters: LookupParameters,
}

impl NeedRecord {
    pub fn needed(parameters: LookupParameters) -> Self {
        Self {
            needed: true,
            parameters,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub destination: Option<String>,
    #[serde(default)]
    pub lodging: NeedRecord,
    #[serde(default)]
    pub points_of_interest: NeedRecord,
    #[serde(default)]
    pub transit: NeedRecord,
}

impl IntentRecord {
    pub fn any_needed(&self) -> bool {
        self.lodging.needed || self.points_of_interest.needed || self.transit.needed
    }
}
