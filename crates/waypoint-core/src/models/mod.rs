pub mod error;
pub mod intent;
pub mod plan;
pub mod response;
pub mod task;
pub mod travel;
pub mod turn;

pub use error::{CoreError, CoreErrorKind};
pub use intent::{IntentRecord, LookupParameters, NeedRecord};
pub use plan::{Section, TravelPlan};
pub use response::{
    AssistantMessage, CoordinatedResponse, MessageKind, PhaseTimings, ResponsePhase,
    ResponseState,
};
pub use task::{TaskOutcome, TaskPriority};
pub use travel::{Lodging, PointOfInterest, PriceRange, TransitOption, TransitRoute};
pub use turn::{TurnId, TurnRecord};
