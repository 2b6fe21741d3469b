mod sink;
mod two_phase;

pub use sink::ResponseSink;
pub use two_phase::TwoPhaseCoordinator;

use crate::models::TaskPriority;

pub const LODGING_TASK: &str = "lodging";
pub const POINTS_OF_INTEREST_TASK: &str = "points_of_interest";
/// Phase-two sights search, anchored on the selected lodging when there is one.
pub const NEARBY_POINTS_OF_INTEREST_TASK: &str = "nearby_points_of_interest";
pub const TRANSIT_TASK: &str = "transit";

/// Fallback key families. Both sights tasks share one kind.
pub const LODGING_KIND: &str = "lodging";
pub const POINTS_OF_INTEREST_KIND: &str = "points_of_interest";
pub const TRANSIT_KIND: &str = "transit";

pub const LODGING_PRIORITY: TaskPriority = 1;
pub const POINTS_OF_INTEREST_PRIORITY: TaskPriority = 2;
pub const TRANSIT_PRIORITY: TaskPriority = 3;
