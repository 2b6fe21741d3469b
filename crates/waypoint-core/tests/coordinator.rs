use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use waypoint_core::config::CoordinatorConfig;
use waypoint_core::coordinator::TwoPhaseCoordinator;
use waypoint_core::formatter;
use waypoint_core::intent::{IntentExtractor, KeywordIntentExtractor};
use waypoint_core::lookups::{
    CatalogBehavior, InMemoryCatalog, LodgingSearch, LookupResult, LookupSet,
    PointOfInterestSearch, ProseDrafter, TemplateTransitEstimator,
};
use waypoint_core::models::{
    AssistantMessage, CoreError, IntentRecord, Lodging, LookupParameters, MessageKind,
    PointOfInterest, ResponsePhase, TravelPlan,
};

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        initial_response_time: Duration::from_millis(300),
        complete_response_time: Duration::from_millis(1500),
        poll_interval: Duration::from_millis(20),
        ..CoordinatorConfig::default()
    }
}

fn taipei_trip() -> IntentRecord {
    KeywordIntentExtractor::new().extract("Plan a trip to Taipei")
}

fn kinds(messages: &[AssistantMessage]) -> Vec<MessageKind> {
    messages.iter().map(|message| message.kind).collect()
}

struct NoLodging;

#[async_trait]
impl LodgingSearch for NoLodging {
    async fn search_lodging(&self, _parameters: &LookupParameters) -> LookupResult<Vec<Lodging>> {
        Ok(Vec::new())
    }
}

/// Answers from the demo catalog and remembers every parameter set it was asked about.
#[derive(Default)]
struct RecordingSights {
    calls: Mutex<Vec<LookupParameters>>,
    catalog: InMemoryCatalog,
}

#[async_trait]
impl PointOfInterestSearch for RecordingSights {
    async fn search_points_of_interest(
        &self,
        parameters: &LookupParameters,
    ) -> LookupResult<Vec<PointOfInterest>> {
        self.calls.lock().unwrap().push(parameters.clone());
        Ok(self.catalog.find_points_of_interest(parameters))
    }
}

struct CannedProse {
    delay: Duration,
    text: &'static str,
}

#[async_trait]
impl ProseDrafter for CannedProse {
    async fn draft_prose(&self, plan: &TravelPlan) -> LookupResult<String> {
        tokio::time::sleep(self.delay).await;
        if self.text.is_empty() {
            return Err(CoreError::lookup("model unavailable"));
        }
        Ok(format!(
            "{} ({} places to stay)",
            self.text,
            plan.lodging.items().len()
        ))
    }
}

#[tokio::test]
async fn full_pipeline_delivers_acknowledgement_quick_and_complete_messages() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    assert_eq!(
        kinds(&messages),
        vec![
            MessageKind::Acknowledgement,
            MessageKind::Quick,
            MessageKind::Complete
        ]
    );
    assert_eq!(response.state.phase(), ResponsePhase::Done);
    assert_eq!(messages[1].text, response.quick_response());
    assert_eq!(messages[2].text, response.complete_response());

    assert!(response.quick_response().contains("# First travel suggestions"));
    let complete = response.complete_response();
    assert!(complete.contains("# Your trip to Taipei"));
    assert!(complete.contains("Taipei Grand Luxury Hotel"));
    assert!(complete.contains("### Taipei Grand Luxury Hotel to "));
    assert!(complete.contains("## Travel tips"));
    assert!(!complete.contains("Sorry"));

    assert!(response.timings.quick <= response.timings.complete);
    assert_eq!(response.timings.phase1_budget, Duration::from_millis(300));
}

#[tokio::test]
async fn every_lookup_failing_still_produces_non_empty_apologetic_text() {
    let catalog = Arc::new(InMemoryCatalog::new().failing());
    let coordinator =
        TwoPhaseCoordinator::new(fast_config(), LookupSet::in_memory(catalog)).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    assert!(!response.quick_response().is_empty());
    assert_eq!(response.complete_response(), formatter::total_failure());
    assert!(response.complete_response().contains("Sorry"));
    assert!(!response.complete_response().contains("unavailable"));
    assert_eq!(response.state.phase(), ResponsePhase::Done);
}

#[tokio::test]
async fn slow_lookups_degrade_to_fallback_results_within_the_budget() {
    let config = CoordinatorConfig {
        initial_response_time: Duration::from_millis(100),
        complete_response_time: Duration::from_millis(400),
        ..fast_config()
    };
    let catalog = Arc::new(InMemoryCatalog::new().with_latency(Duration::from_secs(5)));
    let coordinator = TwoPhaseCoordinator::in_memory(config, catalog).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    assert!(response.quick_response().contains("approximate"));
    let complete = response.complete_response();
    assert!(complete.contains("Taipei Grand Luxury Hotel"));
    assert!(complete.contains("approximate"));
    assert!(complete.contains("### Taipei Grand Luxury Hotel to "));
    assert!(
        response.timings.complete < Duration::from_millis(400 + 20 + 300),
        "complete response took {:?}",
        response.timings.complete
    );
}

#[tokio::test]
async fn failed_lodging_search_thins_its_section_but_keeps_the_sights() {
    let catalog = Arc::new(InMemoryCatalog::with_behavior(CatalogBehavior {
        fail_lodging: true,
        ..CatalogBehavior::default()
    }));
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    assert_eq!(response.state.phase(), ResponsePhase::Done);
    let complete = response.complete_response();
    assert!(complete.contains("# Your trip to Taipei"));
    assert!(complete.contains("Taipei 101"));
    assert!(complete.contains("National Palace Museum"));
    assert!(complete.contains("the search for places to stay ran into a problem"));
    assert!(complete.contains("need both a place to stay and sights to visit"));
    assert!(!complete.contains("unavailable"));
}

#[tokio::test]
async fn empty_lodging_result_still_runs_the_unanchored_sights_search() {
    let sights = Arc::new(RecordingSights::default());
    let lookups = LookupSet::new(
        Arc::new(NoLodging),
        sights.clone(),
        Arc::new(TemplateTransitEstimator::new()),
    );
    let coordinator = TwoPhaseCoordinator::new(fast_config(), lookups).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    let calls = sights.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|parameters| parameters.anchor.is_none()));

    let complete = response.complete_response();
    assert!(complete.contains("National Palace Museum"));
    assert!(complete.contains("couldn't find any places to stay"));
    assert!(complete.contains("need both a place to stay and sights to visit"));
}

#[tokio::test]
async fn phase_two_sights_search_is_anchored_on_the_top_lodging() {
    let sights = Arc::new(RecordingSights::default());
    let lookups = LookupSet::new(
        Arc::new(InMemoryCatalog::new()),
        sights.clone(),
        Arc::new(TemplateTransitEstimator::new()),
    );
    let coordinator = TwoPhaseCoordinator::new(fast_config(), lookups).unwrap();

    coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut Vec::new())
        .await;

    let calls = sights.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].anchor.is_none());
    assert_eq!(
        calls[1].anchor.as_ref().map(|lodging| lodging.name.as_str()),
        Some("Taipei Grand Luxury Hotel")
    );
}

#[tokio::test]
async fn transit_follow_up_runs_when_lodging_only_resolves_in_phase_two() {
    let config = CoordinatorConfig {
        initial_response_time: Duration::from_millis(100),
        complete_response_time: Duration::from_secs(2),
        ..fast_config()
    };
    let catalog =
        Arc::new(InMemoryCatalog::new().with_lodging_latency(Duration::from_millis(200)));
    let coordinator = TwoPhaseCoordinator::new(config, LookupSet::in_memory(catalog)).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut messages)
        .await;

    assert!(!response.quick_response().contains("Taipei Grand Luxury Hotel"));
    assert!(response.quick_response().contains("National Palace Museum"));

    let complete = response.complete_response();
    assert!(complete.contains("## Recommended places to stay"));
    assert!(complete.contains("### Taipei Grand Luxury Hotel to "));
    assert!(!complete.contains("Sorry"));
}

#[tokio::test]
async fn identical_queries_produce_identical_responses() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog).unwrap();
    let intent = taipei_trip();

    let first = coordinator
        .coordinate("Plan a trip to Taipei", &intent, &mut Vec::new())
        .await;
    let second = coordinator
        .coordinate("Plan a trip to Taipei", &intent, &mut Vec::new())
        .await;

    assert_eq!(first.quick_response(), second.quick_response());
    assert_eq!(first.complete_response(), second.complete_response());
    assert_eq!(first.state, second.state);
}

#[tokio::test]
async fn query_without_needs_asks_for_clarification() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog).unwrap();
    let mut messages = Vec::new();

    let response = coordinator
        .coordinate("hello", &IntentRecord::default(), &mut messages)
        .await;

    assert_eq!(kinds(&messages), vec![MessageKind::Complete]);
    assert_eq!(response.state.phase(), ResponsePhase::Done);
    assert_eq!(response.quick_response(), formatter::clarification());
    assert_eq!(response.complete_response(), formatter::clarification());
}

#[tokio::test]
async fn prose_drafter_output_replaces_the_template_when_it_arrives_in_time() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog)
        .unwrap()
        .with_prose_drafter(Arc::new(CannedProse {
            delay: Duration::from_millis(10),
            text: "A relaxed three days in Taipei",
        }));

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut Vec::new())
        .await;

    assert_eq!(
        response.complete_response(),
        "A relaxed three days in Taipei (3 places to stay)"
    );
}

#[tokio::test]
async fn slow_or_failing_prose_drafter_falls_back_to_the_template() {
    for drafter in [
        CannedProse {
            delay: Duration::from_secs(10),
            text: "too late",
        },
        CannedProse {
            delay: Duration::ZERO,
            text: "",
        },
    ] {
        let catalog = Arc::new(InMemoryCatalog::new());
        let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog)
            .unwrap()
            .with_prose_drafter(Arc::new(drafter));

        let response = coordinator
            .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut Vec::new())
            .await;

        assert!(response.complete_response().starts_with("# Your trip to Taipei"));
        assert!(response.timings.complete < Duration::from_millis(1500 + 300));
    }
}

#[tokio::test]
async fn messages_stream_through_a_channel_sink() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let coordinator = TwoPhaseCoordinator::in_memory(fast_config(), catalog).unwrap();
    let (mut sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

    let response = coordinator
        .coordinate("Plan a trip to Taipei", &taipei_trip(), &mut sender)
        .await;
    drop(sender);

    let mut received = Vec::new();
    while let Some(message) = receiver.recv().await {
        received.push(message);
    }
    assert_eq!(received.len(), 3);
    assert_eq!(received[2].text, response.complete_response());
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let config = CoordinatorConfig {
        complete_response_time: Duration::from_secs(1),
        initial_response_time: Duration::from_secs(2),
        ..CoordinatorConfig::default()
    };
    let catalog = Arc::new(InMemoryCatalog::new());
    assert!(TwoPhaseCoordinator::in_memory(config, catalog).is_err());
}
