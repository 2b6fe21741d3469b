use serde::Serialize;

use crate::models::{Lodging, PointOfInterest, TransitRoute};

/// Merged state of one response section across both phases.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "items", rename_all = "snake_case")]
pub enum Section<T> {
    NotRequested,
    /// Live results.
    Ready(Vec<T>),
    /// Results produced by a fallback after the live lookup ran out of time.
    Degraded(Vec<T>),
    /// The lookup succeeded but matched nothing.
    Empty,
    Failed,
    TimedOut,
    Cancelled,
    /// Prerequisites never resolved, so the lookup was not run.
    Skipped,
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::NotRequested
    }
}

impl<T> Section<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Section::Ready(items) | Section::Degraded(items) => items,
            _ => &[],
        }
    }

    pub fn has_items(&self) -> bool {
        !self.items().is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Section::Degraded(_))
    }

    /// Keeps whichever of the two sections carries more useful data; ties go to `newer`.
    pub fn merge(self, newer: Section<T>) -> Section<T> {
        if newer.rank() >= self.rank() {
            newer
        } else {
            self
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Section::Ready(items) if !items.is_empty() => 4,
            Section::Degraded(items) if !items.is_empty() => 3,
            Section::Ready(_) | Section::Degraded(_) | Section::Empty => 2,
            Section::Failed | Section::TimedOut | Section::Cancelled => 1,
            Section::NotRequested | Section::Skipped => 0,
        }
    }
}

/// Structured result of one coordinated query, in the order it is rendered.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TravelPlan {
    pub destination: Option<String>,
    pub lodging: Section<Lodging>,
    pub points_of_interest: Section<PointOfInterest>,
    pub transit: Section<TransitRoute>,
}

impl TravelPlan {
    pub fn selected_lodging(&self) -> Option<&Lodging> {
        self.lodging.items().first()
    }

    pub fn has_core_results(&self) -> bool {
        self.lodging.has_items() || self.points_of_interest.has_items()
    }
}
