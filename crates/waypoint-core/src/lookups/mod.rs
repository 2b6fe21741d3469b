pub mod catalog;
pub mod transit;

pub use catalog::{CatalogBehavior, InMemoryCatalog};
pub use transit::TemplateTransitEstimator;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    CoreError, CoreErrorKind, Lodging, LookupParameters, PointOfInterest, TransitOption,
    TransitRoute, TravelPlan,
};
use crate::orchestration::CancellationToken;

pub type LookupResult<T> = Result<T, CoreError>;

#[async_trait]
pub trait LodgingSearch: Send + Sync {
    /// Ranked best first.
    async fn search_lodging(&self, parameters: &LookupParameters) -> LookupResult<Vec<Lodging>>;
}

#[async_trait]
pub trait PointOfInterestSearch: Send + Sync {
    /// Ranked best first. `parameters.anchor`, when present, should bias results towards it.
    async fn search_points_of_interest(
        &self,
        parameters: &LookupParameters,
    ) -> LookupResult<Vec<PointOfInterest>>;
}

#[async_trait]
pub trait TransitEstimator: Send + Sync {
    async fn estimate_transit(
        &self,
        origin: &Lodging,
        destination: &PointOfInterest,
    ) -> LookupResult<Vec<TransitOption>>;
}

/// Optional language-model collaborator that turns a merged plan into prose.
#[async_trait]
pub trait ProseDrafter: Send + Sync {
    async fn draft_prose(&self, plan: &TravelPlan) -> LookupResult<String>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum LookupRequest {
    Lodging(LookupParameters),
    PointsOfInterest(LookupParameters),
    Transit {
        origin: Lodging,
        destinations: Vec<PointOfInterest>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum LookupPayload {
    Lodging(Vec<Lodging>),
    PointsOfInterest(Vec<PointOfInterest>),
    Transit(Vec<TransitRoute>),
}

impl LookupPayload {
    pub fn len(&self) -> usize {
        match self {
            LookupPayload::Lodging(items) => items.len(),
            LookupPayload::PointsOfInterest(items) => items.len(),
            LookupPayload::Transit(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The external lookups one coordinator dispatches to.
#[derive(Clone)]
pub struct LookupSet {
    pub lodging: Arc<dyn LodgingSearch>,
    pub points_of_interest: Arc<dyn PointOfInterestSearch>,
    pub transit: Arc<dyn TransitEstimator>,
}

impl LookupSet {
    pub fn new(
        lodging: Arc<dyn LodgingSearch>,
        points_of_interest: Arc<dyn PointOfInterestSearch>,
        transit: Arc<dyn TransitEstimator>,
    ) -> Self {
        Self {
            lodging,
            points_of_interest,
            transit,
        }
    }

    /// Demo collaborators: one in-memory catalog for both searches plus template transit.
    pub fn in_memory(catalog: Arc<InMemoryCatalog>) -> Self {
        Self::new(
            catalog.clone(),
            catalog,
            Arc::new(TemplateTransitEstimator::new()),
        )
    }

    pub async fn execute(
        &self,
        request: LookupRequest,
        token: CancellationToken,
    ) -> LookupResult<LookupPayload> {
        match request {
            LookupRequest::Lodging(parameters) => self
                .lodging
                .search_lodging(&parameters)
                .await
                .map(LookupPayload::Lodging),
            LookupRequest::PointsOfInterest(parameters) => self
                .points_of_interest
                .search_points_of_interest(&parameters)
                .await
                .map(LookupPayload::PointsOfInterest),
            LookupRequest::Transit {
                origin,
                destinations,
            } => {
                let mut routes = Vec::with_capacity(destinations.len());
                for destination in &destinations {
                    if token.is_cancelled() {
                        return Err(CoreError::new(
                            CoreErrorKind::Cancelled,
                            "transit estimation cancelled",
                        ));
                    }
                    let options = self.transit.estimate_transit(&origin, destination).await?;
                    routes.push(TransitRoute {
                        origin: origin.name.clone(),
                        destination: destination.name.clone(),
                        options,
                    });
                }
                Ok(LookupPayload::Transit(routes))
            }
        }
    }
}
