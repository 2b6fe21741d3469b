use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use lazy_static::lazy_static;
use serde::Serialize;
use waypoint_core::config::CoordinatorConfig;
use waypoint_core::coordinator::TwoPhaseCoordinator;
use waypoint_core::intent::{IntentExtractor, KeywordIntentExtractor};
use waypoint_core::lookups::InMemoryCatalog;
use waypoint_core::models::{
    AssistantMessage, CoordinatedResponse, CoreError, MessageKind, ResponsePhase, TurnRecord,
};
use waypoint_core::persistence::TurnStore;
use waypoint_core::sqlite::SqliteStore;
use waypoint_core::telemetry;

struct WaypointState {
    store: Option<Arc<SqliteStore>>,
    coordinator: Arc<TwoPhaseCoordinator>,
    extractor: Arc<KeywordIntentExtractor>,
    tokio_rt: Arc<tokio::runtime::Runtime>,
}

/// Handles cloned out of `STATE` so slow work runs without holding the lock.
struct Session {
    store: Option<Arc<SqliteStore>>,
    coordinator: Arc<TwoPhaseCoordinator>,
    extractor: Arc<KeywordIntentExtractor>,
    tokio_rt: Arc<tokio::runtime::Runtime>,
}

lazy_static! {
    static ref STATE: Mutex<Option<WaypointState>> = Mutex::new(None);
}

#[derive(Serialize)]
struct CoordinateReply {
    acknowledgement: Option<String>,
    quick_response: String,
    complete_response: String,
    phase: ResponsePhase,
    quick_ms: u64,
    complete_ms: u64,
    phase1_budget_ms: u64,
    phase2_budget_ms: u64,
}

/// Initialize the Waypoint engine. `db_path` may be null to run without conversation history.
///
/// # Safety
///
/// `db_path` must be null or a valid pointer to a NUL-terminated UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn waypoint_init(db_path: *const c_char) -> bool {
    let Ok(mut guard) = STATE.lock() else {
        return false;
    };
    if guard.is_some() {
        return true;
    }

    telemetry::init_tracing("info");

    let store = if db_path.is_null() {
        None
    } else {
        let c_str = unsafe { CStr::from_ptr(db_path) };
        let Ok(path_str) = c_str.to_str() else {
            return false;
        };
        let store = Arc::new(SqliteStore::new(path_str));
        if let Err(e) = store.migrate_to_latest() {
            tracing::error!(error = %e, "failed to migrate conversation database");
            return false;
        }
        Some(store)
    };

    // One long-lived scheduler for the whole process.
    let tokio_rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to create tokio runtime");
            return false;
        }
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid coordinator configuration");
            return false;
        }
    };

    let coordinator =
        match TwoPhaseCoordinator::in_memory(config, Arc::new(InMemoryCatalog::new())) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                tracing::error!(error = %e, "failed to create coordinator");
                return false;
            }
        };

    *guard = Some(WaypointState {
        store,
        coordinator: Arc::new(coordinator),
        extractor: Arc::new(KeywordIntentExtractor::new()),
        tokio_rt: Arc::new(tokio_rt),
    });

    true
}

/// Answer one query. Returns a JSON object owned by the caller, or null on failure.
///
/// # Safety
///
/// `query` must be a valid, non-null pointer to a NUL-terminated UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn waypoint_coordinate(query: *const c_char) -> *mut c_char {
    if query.is_null() {
        return std::ptr::null_mut();
    }
    let c_str = unsafe { CStr::from_ptr(query) };
    let Ok(query) = c_str.to_str() else {
        return std::ptr::null_mut();
    };

    let Some(session) = session() else {
        return std::ptr::null_mut();
    };

    let intent = session.extractor.extract(query);
    let mut messages: Vec<AssistantMessage> = Vec::new();
    let response = session.tokio_rt.block_on(
        session
            .coordinator
            .coordinate(query, &intent, &mut messages),
    );

    if let Some(store) = &session.store
        && let Err(e) = record_turn(store, query, &response)
    {
        tracing::warn!(error = %e, "failed to record conversation turn");
    }

    let acknowledgement = messages
        .into_iter()
        .find(|message| message.kind == MessageKind::Acknowledgement)
        .map(|message| message.text);

    to_json_c_string(&CoordinateReply {
        acknowledgement,
        quick_response: response.quick_response().to_string(),
        complete_response: response.complete_response().to_string(),
        phase: response.state.phase(),
        quick_ms: response.timings.quick.as_millis() as u64,
        complete_ms: response.timings.complete.as_millis() as u64,
        phase1_budget_ms: response.timings.phase1_budget.as_millis() as u64,
        phase2_budget_ms: response.timings.phase2_budget.as_millis() as u64,
    })
}

/// Recorded turns, newest first, as a JSON array. Null when no history database is open.
#[unsafe(no_mangle)]
pub extern "C" fn waypoint_list_turns(limit: u32) -> *mut c_char {
    let Some(store) = session().and_then(|session| session.store) else {
        return std::ptr::null_mut();
    };

    match store.list_recent_turns(limit as usize) {
        Ok(turns) => to_json_c_string(&turns),
        Err(e) => {
            tracing::error!(error = %e, "failed to list conversation turns");
            std::ptr::null_mut()
        }
    }
}

/// Free a string previously returned by a `waypoint_*` function.
///
/// # Safety
///
/// `s` must be a pointer previously returned by a `waypoint_*` function, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn waypoint_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

fn session() -> Option<Session> {
    let guard = STATE.lock().ok()?;
    let state = guard.as_ref()?;
    Some(Session {
        store: state.store.clone(),
        coordinator: state.coordinator.clone(),
        extractor: state.extractor.clone(),
        tokio_rt: state.tokio_rt.clone(),
    })
}

fn load_config() -> Result<CoordinatorConfig, CoreError> {
    let mut config = CoordinatorConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn record_turn(
    store: &SqliteStore,
    query: &str,
    response: &CoordinatedResponse,
) -> Result<(), CoreError> {
    store.record_turn(&TurnRecord {
        id: store.next_turn_id()?,
        query: query.to_string(),
        quick_response: response.quick_response().to_string(),
        complete_response: response.complete_response().to_string(),
        quick_ms: response.timings.quick.as_millis() as u64,
        complete_ms: response.timings.complete.as_millis() as u64,
        created_at: SystemTime::now(),
    })
}

fn to_json_c_string<T: Serialize>(value: &T) -> *mut c_char {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(_) => return std::ptr::null_mut(),
    };

    match CString::new(json) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use waypoint_core::intent::IntentExtractor;
    use waypoint_core::models::{AssistantMessage, ResponsePhase};

    use super::{
        STATE, session, waypoint_coordinate, waypoint_free_string, waypoint_init,
        waypoint_list_turns,
    };

    fn init_without_history() {
        assert!(unsafe { waypoint_init(std::ptr::null()) });
    }

    #[test]
    fn session_coordinates_while_another_caller_holds_the_state_lock() {
        init_without_history();
        let session = session().unwrap();

        let guard = STATE.lock().unwrap();
        let intent = session.extractor.extract("Plan a trip to Taipei");
        let mut messages: Vec<AssistantMessage> = Vec::new();
        let response = session.tokio_rt.block_on(session.coordinator.coordinate(
            "Plan a trip to Taipei",
            &intent,
            &mut messages,
        ));
        drop(guard);

        assert_eq!(response.state.phase(), ResponsePhase::Done);
        assert!(response.complete_response().contains("Taipei"));
    }

    #[test]
    fn coordinate_returns_both_responses_as_json() {
        init_without_history();
        let query = CString::new("Plan a trip to Taipei").unwrap();

        let raw = unsafe { waypoint_coordinate(query.as_ptr()) };
        assert!(!raw.is_null());
        let json = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        unsafe { waypoint_free_string(raw) };

        let reply: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(reply["phase"], "done");
        assert!(
            reply["quick_response"]
                .as_str()
                .is_some_and(|text| !text.is_empty())
        );
        assert!(
            reply["complete_response"]
                .as_str()
                .is_some_and(|text| text.contains("Taipei"))
        );
    }

    #[test]
    fn listing_turns_without_a_history_database_returns_null() {
        init_without_history();
        assert!(waypoint_list_turns(5).is_null());
    }
}
