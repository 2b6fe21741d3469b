use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::coordinator::{LODGING_KIND, POINTS_OF_INTEREST_KIND};
use crate::lookups::{
    LodgingSearch, LookupPayload, LookupRequest, LookupResult, PointOfInterestSearch,
};
use crate::models::{
    CoreError, CoreErrorKind, Lodging, LookupParameters, PointOfInterest, PriceRange,
};
use crate::orchestration::FallbackRegistry;

struct LodgingEntry {
    city: &'static str,
    district: &'static str,
    name: &'static str,
    style: &'static str,
    rating: f32,
    price: (u32, u32),
    amenities: &'static [&'static str],
}

struct PointOfInterestEntry {
    city: &'static str,
    district: &'static str,
    name: &'static str,
    kind: &'static str,
    rating: f32,
    description: &'static str,
    best_time: &'static str,
    tips: &'static str,
}

const LODGING: &[LodgingEntry] = &[
    LodgingEntry {
        city: "Taipei",
        district: "Xinyi",
        name: "Taipei Grand Luxury Hotel",
        style: "five-star hotel",
        rating: 4.8,
        price: (3500, 8000),
        amenities: &["pool", "gym", "spa", "business center", "restaurant", "meeting rooms"],
    },
    LodgingEntry {
        city: "Taipei",
        district: "Da'an",
        name: "Taipei Comfort Inn",
        style: "boutique business hotel",
        rating: 4.5,
        price: (2200, 4500),
        amenities: &["free breakfast", "gym", "business center", "laundry"],
    },
    LodgingEntry {
        city: "Taipei",
        district: "Wenshan",
        name: "Taipei Family Lodge",
        style: "budget guesthouse",
        rating: 4.2,
        price: (1500, 3000),
        amenities: &["free parking", "free Wi-Fi", "shared kitchen"],
    },
    LodgingEntry {
        city: "Kaohsiung",
        district: "Qianzhen",
        name: "Harbour View Hotel",
        style: "four-star hotel",
        rating: 4.6,
        price: (2800, 6000),
        amenities: &["harbour view", "pool", "restaurant"],
    },
    LodgingEntry {
        city: "Kaohsiung",
        district: "Yancheng",
        name: "Pier-2 Art Hostel",
        style: "design hostel",
        rating: 4.3,
        price: (900, 2200),
        amenities: &["free Wi-Fi", "bike rental", "rooftop lounge"],
    },
];

const POINTS_OF_INTEREST: &[PointOfInterestEntry] = &[
    PointOfInterestEntry {
        city: "Taipei",
        district: "Xinyi",
        name: "Taipei 101",
        kind: "landmark",
        rating: 4.7,
        description: "The city's signature skyscraper, with an observatory on the 89th floor.",
        best_time: "09:00-22:00, sunset for the view",
        tips: "Buy observatory tickets online to skip the queue.",
    },
    PointOfInterestEntry {
        city: "Taipei",
        district: "Shilin",
        name: "National Palace Museum",
        kind: "museum",
        rating: 4.8,
        description: "One of the largest collections of Chinese imperial art in the world.",
        best_time: "09:00-17:00, weekday mornings are quietest",
        tips: "Rent the audio guide and allow at least half a day.",
    },
    PointOfInterestEntry {
        city: "Taipei",
        district: "Beitou",
        name: "Yangmingshan National Park",
        kind: "nature",
        rating: 4.6,
        description: "Volcanic hills with hiking trails, hot springs and seasonal flowers.",
        best_time: "Early morning; spring for the flower season",
        tips: "Weather changes quickly on the peaks, so bring a rain layer.",
    },
    PointOfInterestEntry {
        city: "Taipei",
        district: "Songshan",
        name: "Raohe Street Night Market",
        kind: "night market",
        rating: 4.5,
        description: "A long lane of street food stalls next to Ciyou Temple.",
        best_time: "17:00-24:00",
        tips: "Start with the black pepper buns at the temple gate.",
    },
    PointOfInterestEntry {
        city: "Taipei",
        district: "Wenshan",
        name: "Maokong Gondola",
        kind: "scenic ride",
        rating: 4.4,
        description: "A cable car over tea plantations with views back across the city.",
        best_time: "09:00-21:00, closed most Mondays",
        tips: "Ride a crystal cabin and stop for tea at the top.",
    },
    PointOfInterestEntry {
        city: "Kaohsiung",
        district: "Yancheng",
        name: "Pier-2 Art Center",
        kind: "art district",
        rating: 4.5,
        description: "Converted harbour warehouses filled with galleries and installations.",
        best_time: "Late afternoon into the evening",
        tips: "Rent a bike to cover the whole waterfront.",
    },
    PointOfInterestEntry {
        city: "Kaohsiung",
        district: "Zuoying",
        name: "Lotus Pond",
        kind: "temple",
        rating: 4.4,
        description: "A lake ringed by temples, including the Dragon and Tiger Pagodas.",
        best_time: "Morning, before the heat",
        tips: "Enter the dragon's mouth and leave through the tiger's for good luck.",
    },
];

/// Failure and latency injection for [`InMemoryCatalog`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CatalogBehavior {
    pub lodging_latency: Duration,
    pub points_of_interest_latency: Duration,
    pub fail_lodging: bool,
    pub fail_points_of_interest: bool,
}

/// A small built-in dataset of Taiwanese lodging and sights, used as the default lodging
/// and point-of-interest collaborator and as the source for fallbacks.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    behavior: CatalogBehavior,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: CatalogBehavior) -> Self {
        Self { behavior }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.lodging_latency = latency;
        self.behavior.points_of_interest_latency = latency;
        self
    }

    pub fn with_lodging_latency(mut self, latency: Duration) -> Self {
        self.behavior.lodging_latency = latency;
        self
    }

    pub fn with_points_of_interest_latency(mut self, latency: Duration) -> Self {
        self.behavior.points_of_interest_latency = latency;
        self
    }

    /// Every live search fails. Fallbacks still answer.
    pub fn failing(mut self) -> Self {
        self.behavior.fail_lodging = true;
        self.behavior.fail_points_of_interest = true;
        self
    }

    pub fn behavior(&self) -> CatalogBehavior {
        self.behavior
    }

    pub fn cities() -> Vec<&'static str> {
        let mut cities: Vec<&'static str> = LODGING
            .iter()
            .map(|entry| entry.city)
            .chain(POINTS_OF_INTEREST.iter().map(|entry| entry.city))
            .collect();
        cities.sort_unstable();
        cities.dedup();
        cities
    }

    pub fn find_lodging(&self, parameters: &LookupParameters) -> Vec<Lodging> {
        let mut matches: Vec<Lodging> = LODGING
            .iter()
            .filter(|entry| matches_city(entry.city, parameters.destination.as_deref()))
            .filter(|entry| parameters.budget.is_none_or(|budget| entry.price.0 <= budget))
            .map(LodgingEntry::to_lodging)
            .collect();
        matches.sort_by(|first, second| second.rating.total_cmp(&first.rating));
        matches
    }

    pub fn find_points_of_interest(&self, parameters: &LookupParameters) -> Vec<PointOfInterest> {
        let anchor_district = parameters
            .anchor
            .as_ref()
            .map(|lodging| district_of(&lodging.location).to_string());

        let mut ranked: Vec<(u8, PointOfInterest)> = POINTS_OF_INTEREST
            .iter()
            .filter(|entry| matches_city(entry.city, parameters.destination.as_deref()))
            .map(|entry| {
                let mut score = 0;
                if anchor_district.as_deref() == Some(entry.district) {
                    score += 2;
                }
                if parameters
                    .interests
                    .iter()
                    .any(|interest| entry.kind.eq_ignore_ascii_case(interest))
                {
                    score += 1;
                }
                (score, entry.to_point_of_interest())
            })
            .collect();
        ranked.sort_by(|(first_score, first), (second_score, second)| {
            second_score
                .cmp(first_score)
                .then_with(|| second.rating.total_cmp(&first.rating))
        });
        ranked.into_iter().map(|(_, poi)| poi).collect()
    }

    /// Fallbacks that answer from this catalog without latency or failure injection, using
    /// only the destination: the single best lodging and the top three points of interest.
    /// Transit has no fallback.
    pub fn standard_fallbacks(self: &Arc<Self>) -> FallbackRegistry<LookupRequest, LookupPayload> {
        let mut registry = FallbackRegistry::new();

        let catalog = Arc::clone(self);
        registry.register(LODGING_KIND, move |request: &LookupRequest| match request {
            LookupRequest::Lodging(parameters) => {
                let mut lodging = catalog.find_lodging(&destination_only(parameters));
                lodging.truncate(1);
                Ok(LookupPayload::Lodging(lodging))
            }
            other => Err(mismatched_request(LODGING_KIND, other)),
        });

        let catalog = Arc::clone(self);
        registry.register(POINTS_OF_INTEREST_KIND, move |request: &LookupRequest| {
            match request {
                LookupRequest::PointsOfInterest(parameters) => {
                    let mut points =
                        catalog.find_points_of_interest(&destination_only(parameters));
                    points.truncate(3);
                    Ok(LookupPayload::PointsOfInterest(points))
                }
                other => Err(mismatched_request(POINTS_OF_INTEREST_KIND, other)),
            }
        });

        registry
    }
}

#[async_trait]
impl LodgingSearch for InMemoryCatalog {
    async fn search_lodging(&self, parameters: &LookupParameters) -> LookupResult<Vec<Lodging>> {
        simulate_latency(self.behavior.lodging_latency).await;
        if self.behavior.fail_lodging {
            return Err(CoreError::lookup("lodging search is unavailable"));
        }
        Ok(self.find_lodging(parameters))
    }
}

#[async_trait]
impl PointOfInterestSearch for InMemoryCatalog {
    async fn search_points_of_interest(
        &self,
        parameters: &LookupParameters,
    ) -> LookupResult<Vec<PointOfInterest>> {
        simulate_latency(self.behavior.points_of_interest_latency).await;
        if self.behavior.fail_points_of_interest {
            return Err(CoreError::lookup("point-of-interest search is unavailable"));
        }
        Ok(self.find_points_of_interest(parameters))
    }
}

impl LodgingEntry {
    fn to_lodging(&self) -> Lodging {
        Lodging {
            name: self.name.to_string(),
            rating: self.rating,
            price_range: PriceRange {
                min: self.price.0,
                max: self.price.1,
            },
            location: format!("{} District, {}", self.district, self.city),
            amenities: self.amenities.iter().map(|item| item.to_string()).collect(),
            description: Some(format!("A {} in {}.", self.style, self.district)),
        }
    }
}

impl PointOfInterestEntry {
    fn to_point_of_interest(&self) -> PointOfInterest {
        PointOfInterest {
            name: self.name.to_string(),
            kind: self.kind.to_string(),
            rating: self.rating,
            description: self.description.to_string(),
            location: format!("{} District, {}", self.district, self.city),
            best_time: Some(self.best_time.to_string()),
            tips: Some(self.tips.to_string()),
        }
    }
}

fn matches_city(city: &str, destination: Option<&str>) -> bool {
    destination.is_none_or(|destination| city.eq_ignore_ascii_case(destination.trim()))
}

fn destination_only(parameters: &LookupParameters) -> LookupParameters {
    LookupParameters {
        destination: parameters.destination.clone(),
        ..LookupParameters::default()
    }
}

fn district_of(location: &str) -> &str {
    location
        .split(',')
        .next()
        .unwrap_or(location)
        .trim()
        .trim_end_matches(" District")
}

fn mismatched_request(kind: &str, request: &LookupRequest) -> CoreError {
    CoreError::new(
        CoreErrorKind::Internal,
        format!("fallback '{kind}' cannot serve request {request:?}"),
    )
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCatalog;
    use crate::models::LookupParameters;

    fn taipei() -> LookupParameters {
        LookupParameters {
            destination: Some("Taipei".to_string()),
            ..LookupParameters::default()
        }
    }

    #[test]
    fn lodging_is_ranked_by_rating_and_filtered_by_budget() {
        let catalog = InMemoryCatalog::new();
        let all = catalog.find_lodging(&taipei());
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Taipei Grand Luxury Hotel");

        let budget = LookupParameters {
            budget: Some(2000),
            ..taipei()
        };
        let cheap = catalog.find_lodging(&budget);
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].name, "Taipei Family Lodge");
    }

    #[test]
    fn anchor_district_ranks_nearby_sights_first() {
        let catalog = InMemoryCatalog::new();
        let family_lodge = catalog
            .find_lodging(&taipei())
            .into_iter()
            .find(|lodging| lodging.name == "Taipei Family Lodge")
            .unwrap();

        let parameters = LookupParameters {
            anchor: Some(family_lodge),
            ..taipei()
        };
        let points = catalog.find_points_of_interest(&parameters);
        assert_eq!(points[0].name, "Maokong Gondola");
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn unknown_destination_matches_nothing() {
        let parameters = LookupParameters {
            destination: Some("Atlantis".to_string()),
            ..LookupParameters::default()
        };
        assert!(InMemoryCatalog::new().find_lodging(&parameters).is_empty());
    }
}
