use crate::models::{IntentRecord, LookupParameters, NeedRecord};

/// Turns a free-text query into the needs the coordinator schedules.
pub trait IntentExtractor: Send + Sync {
    fn extract(&self, query: &str) -> IntentRecord;
}

const DEFAULT_CITIES: &[&str] = &["Taipei", "Kaohsiung", "Taichung", "Tainan", "Hualien"];

const LODGING_KEYWORDS: &[&str] = &[
    "hotel",
    "hotels",
    "hostel",
    "inn",
    "stay",
    "lodging",
    "accommodation",
    "room",
    "rooms",
];

const POINT_OF_INTEREST_KEYWORDS: &[&str] = &[
    "attraction",
    "attractions",
    "sight",
    "sights",
    "sightseeing",
    "visit",
    "see",
    "explore",
    "itinerary",
    "tour",
    "things",
];

const TRANSIT_KEYWORDS: &[&str] = &[
    "transport",
    "transportation",
    "transit",
    "metro",
    "bus",
    "taxi",
    "directions",
    "around",
];

const GUEST_NOUNS: &[&str] = &[
    "people", "persons", "guests", "adults", "travellers", "travelers",
];

const BUDGET_FILLERS: &[&str] = &["of", "is", "around", "about", "under", "nt", "twd"];

/// Interest keywords mapped onto the point-of-interest kinds the catalog knows.
const INTERESTS: &[(&str, &[&str])] = &[
    ("night market", &["food", "street", "snacks", "market", "eat"]),
    ("museum", &["museum", "museums", "history", "historic", "culture"]),
    ("nature", &["nature", "hiking", "hike", "park", "mountain", "mountains"]),
    ("art district", &["art", "gallery", "galleries", "design"]),
    ("temple", &["temple", "temples", "religion", "religious"]),
    ("landmark", &["landmark", "landmarks", "skyline", "view"]),
    ("scenic ride", &["gondola", "cable", "scenic"]),
];

/// Cheap keyword matching over English queries.
///
/// A destination with no capability keyword asks for lodging and points of interest. Transit
/// is derived whenever both of those are needed.
#[derive(Clone, Debug)]
pub struct KeywordIntentExtractor {
    cities: Vec<String>,
}

impl Default for KeywordIntentExtractor {
    fn default() -> Self {
        Self::with_cities(DEFAULT_CITIES.iter().copied())
    }
}

impl KeywordIntentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cities<I, S>(cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cities: cities.into_iter().map(Into::into).collect(),
        }
    }

    fn destination(&self, words: &[String]) -> Option<String> {
        self.cities
            .iter()
            .find(|city| words.iter().any(|word| word.eq_ignore_ascii_case(city)))
            .cloned()
    }
}

impl IntentExtractor for KeywordIntentExtractor {
    fn extract(&self, query: &str) -> IntentRecord {
        let words = tokenize(query);
        let destination = self.destination(&words);

        let mut wants_lodging = mentions_any(&words, LODGING_KEYWORDS);
        let mut wants_sights = mentions_any(&words, POINT_OF_INTEREST_KEYWORDS);
        if destination.is_some() && !wants_lodging && !wants_sights {
            wants_lodging = true;
            wants_sights = true;
        }
        let wants_transit =
            (wants_lodging && wants_sights) || mentions_any(&words, TRANSIT_KEYWORDS);

        let parameters = LookupParameters {
            destination: destination.clone(),
            budget: budget(&words),
            guests: guests(&words),
            interests: interests(&words),
            anchor: None,
        };

        let need = |needed: bool| {
            if needed {
                NeedRecord::needed(parameters.clone())
            } else {
                NeedRecord::default()
            }
        };

        IntentRecord {
            destination,
            lodging: need(wants_lodging),
            points_of_interest: need(wants_sights),
            transit: need(wants_transit),
        }
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
        .map(|word| word.trim_matches(|c: char| c == '\'' || c == '"' || c == '(' || c == ')'))
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn mentions_any(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|word| keywords.contains(&word.as_str()))
}

fn parse_amount(word: &str) -> Option<u32> {
    word.trim_start_matches("nt$")
        .trim_start_matches('$')
        .replace('_', "")
        .parse()
        .ok()
}

fn guests(words: &[String]) -> Option<u32> {
    words.windows(2).find_map(|pair| {
        if GUEST_NOUNS.contains(&pair[1].as_str()) {
            pair[0].parse().ok()
        } else {
            None
        }
    })
}

fn budget(words: &[String]) -> Option<u32> {
    let position = words.iter().position(|word| word == "budget")?;
    words[position + 1..]
        .iter()
        .find(|word| !BUDGET_FILLERS.contains(&word.as_str()))
        .and_then(|word| parse_amount(word))
}

fn interests(words: &[String]) -> Vec<String> {
    INTERESTS
        .iter()
        .filter(|(_, keywords)| mentions_any(words, keywords))
        .map(|(kind, _)| kind.to_string())
        .collect()
}
