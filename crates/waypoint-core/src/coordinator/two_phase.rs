use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::config::CoordinatorConfig;
use crate::coordinator::{
    LODGING_KIND, LODGING_PRIORITY, LODGING_TASK, NEARBY_POINTS_OF_INTEREST_TASK,
    POINTS_OF_INTEREST_KIND, POINTS_OF_INTEREST_PRIORITY, POINTS_OF_INTEREST_TASK, ResponseSink,
    TRANSIT_KIND, TRANSIT_PRIORITY, TRANSIT_TASK,
};
use crate::formatter;
use crate::lookups::{InMemoryCatalog, LookupPayload, LookupRequest, LookupSet, ProseDrafter};
use crate::models::{
    AssistantMessage, CoordinatedResponse, CoreError, CoreErrorKind, IntentRecord,
    LookupParameters, MessageKind, PhaseTimings, ResponsePhase, ResponseState, Section,
    TaskOutcome, TaskPriority, TravelPlan,
};
use crate::orchestration::{
    Batch, BatchReport, FallbackRegistry, OrchestrationResult, ProgressTracker, TaskDescriptor,
    TaskRunner,
};

type LookupTask = TaskDescriptor<LookupRequest, LookupPayload>;
type LookupBatch = Batch<LookupRequest, LookupPayload>;
type LookupProgress = ProgressTracker<TaskOutcome<LookupPayload>>;

/// Answers a query in two deadline-bounded phases: a quick preview from the urgent lookups,
/// then a complete answer that also covers the lookups derived from phase-one results.
///
/// Holds no per-query state; one coordinator serves any number of queries.
pub struct TwoPhaseCoordinator {
    config: CoordinatorConfig,
    lookups: LookupSet,
    runner: TaskRunner<LookupRequest, LookupPayload>,
    prose: Option<Arc<dyn ProseDrafter>>,
}

struct Run<'a> {
    started: Instant,
    state: ResponseState,
    timings: PhaseTimings,
    sink: &'a mut dyn ResponseSink,
}

impl TwoPhaseCoordinator {
    pub fn new(config: CoordinatorConfig, lookups: LookupSet) -> Result<Self, CoreError> {
        config.validate()?;
        let runner =
            TaskRunner::new(config.poll_interval).with_max_concurrency(config.max_concurrency);
        Ok(Self {
            config,
            lookups,
            runner,
            prose: None,
        })
    }

    /// Demo wiring: the catalog answers both searches and supplies the standard fallbacks.
    pub fn in_memory(
        config: CoordinatorConfig,
        catalog: Arc<InMemoryCatalog>,
    ) -> Result<Self, CoreError> {
        let fallbacks = Arc::new(catalog.standard_fallbacks());
        Ok(Self::new(config, LookupSet::in_memory(catalog))?.with_fallbacks(fallbacks))
    }

    pub fn with_fallbacks(
        mut self,
        fallbacks: Arc<FallbackRegistry<LookupRequest, LookupPayload>>,
    ) -> Self {
        self.runner = self.runner.with_fallbacks(fallbacks);
        self
    }

    pub fn with_prose_drafter(mut self, drafter: Arc<dyn ProseDrafter>) -> Self {
        self.prose = Some(drafter);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Runs both phases for one query. Always yields non-empty quick and complete responses;
    /// failures inside the pipeline surface only as apologetic text.
    pub async fn coordinate(
        &self,
        query: &str,
        intent: &IntentRecord,
        sink: &mut dyn ResponseSink,
    ) -> CoordinatedResponse {
        let mut run = Run {
            started: Instant::now(),
            state: ResponseState::new(),
            timings: PhaseTimings {
                phase1_budget: self.config.initial_response_time,
                ..PhaseTimings::default()
            },
            sink,
        };

        tracing::info!(
            query_len = query.len(),
            destination = intent.destination.as_deref().unwrap_or("-"),
            lodging = intent.lodging.needed,
            points_of_interest = intent.points_of_interest.needed,
            transit = intent.transit.needed,
            "coordinating query"
        );

        if !intent.any_needed() {
            let text = formatter::clarification();
            run.state.record_quick(text.clone());
            run.timings.quick = run.started.elapsed();
            run.deliver(MessageKind::Complete, text);
            run.state.finish();
            return run.finish();
        }

        if let Err(error) = self.run_phases(intent, &mut run).await {
            tracing::error!(
                kind = ?error.kind,
                message = %error.message,
                phase = ?run.state.phase(),
                "coordination failed; replying with an apology"
            );
            let text = formatter::coordination_failure();
            if run.state.quick_response().is_none() {
                run.state.record_quick(text.clone());
                run.timings.quick = run.started.elapsed();
            }
            run.deliver(MessageKind::Complete, text);
            run.state.finish();
        }

        run.finish()
    }

    async fn run_phases(&self, intent: &IntentRecord, run: &mut Run<'_>) -> Result<(), CoreError> {
        run.state.advance(ResponsePhase::Phase1)?;
        run.deliver(
            MessageKind::Acknowledgement,
            formatter::acknowledgement(intent.destination.as_deref()),
        );

        let mut plan = TravelPlan {
            destination: intent.destination.clone(),
            ..TravelPlan::default()
        };
        let mut progress = LookupProgress::logging(0);

        let phase1 = self.phase_one_batch(intent)?;
        self.run_phase(
            ResponsePhase::Phase1,
            phase1,
            self.config.initial_response_time,
            &mut plan,
            &mut progress,
        )
        .await?;

        let quick = formatter::quick_response(&plan, &self.config)?;
        run.deliver(MessageKind::Quick, quick);

        run.state.advance(ResponsePhase::Phase2)?;
        let phase2_budget = self.remaining(run.started);
        run.timings.phase2_budget = phase2_budget;

        let phase2 = self.phase_two_batch(intent, &plan)?;
        self.run_phase(
            ResponsePhase::Phase2,
            phase2,
            phase2_budget,
            &mut plan,
            &mut progress,
        )
        .await?;

        if intent.transit.needed && matches!(plan.transit, Section::NotRequested) {
            match self.transit_task(&plan) {
                Some(task) => {
                    let batch = Batch::new().with_task(task)?;
                    let remaining = self.remaining(run.started);
                    tracing::debug!(
                        remaining_ms = remaining.as_millis() as u64,
                        "transit prerequisites resolved during phase two; running follow-up"
                    );
                    self.run_phase(
                        ResponsePhase::Phase2,
                        batch,
                        remaining,
                        &mut plan,
                        &mut progress,
                    )
                    .await?;
                }
                None => {
                    tracing::warn!("transit prerequisites never resolved; skipping transit");
                    plan.transit = Section::Skipped;
                }
            }
        }

        let complete = self.render_complete(&plan, run.started).await?;
        run.deliver(MessageKind::Complete, complete);
        run.state.advance(ResponsePhase::Done)?;

        let snapshot = progress.snapshot();
        tracing::info!(
            steps = snapshot.completed_steps,
            quick_ms = run.timings.quick.as_millis() as u64,
            complete_ms = run.timings.complete.as_millis() as u64,
            "query coordinated"
        );
        Ok(())
    }

    async fn run_phase(
        &self,
        phase: ResponsePhase,
        batch: LookupBatch,
        deadline: Duration,
        plan: &mut TravelPlan,
        progress: &mut LookupProgress,
    ) -> Result<(), CoreError> {
        if batch.is_empty() {
            tracing::debug!(?phase, "nothing to run in this phase");
            return Ok(());
        }
        tracing::info!(
            ?phase,
            tasks = batch.len(),
            deadline_ms = deadline.as_millis() as u64,
            "running phase"
        );

        progress.expect_more_steps(batch.len());
        let report = self.runner.run_batch(batch, deadline).await;
        absorb(plan, progress, report)
    }

    fn phase_one_batch(&self, intent: &IntentRecord) -> OrchestrationResult<LookupBatch> {
        let mut batch = Batch::new();
        if intent.lodging.needed {
            batch.insert(self.lookup_task(
                LODGING_TASK,
                LODGING_KIND,
                LODGING_PRIORITY,
                LookupRequest::Lodging(intent.lodging.parameters.clone()),
            ))?;
        }
        if intent.points_of_interest.needed {
            batch.insert(self.lookup_task(
                POINTS_OF_INTEREST_TASK,
                POINTS_OF_INTEREST_KIND,
                POINTS_OF_INTEREST_PRIORITY,
                LookupRequest::PointsOfInterest(intent.points_of_interest.parameters.clone()),
            ))?;
        }
        Ok(batch)
    }

    fn phase_two_batch(
        &self,
        intent: &IntentRecord,
        plan: &TravelPlan,
    ) -> OrchestrationResult<LookupBatch> {
        let mut batch = Batch::new();

        if intent.lodging.needed && !plan.lodging.has_items() {
            batch.insert(self.lookup_task(
                LODGING_TASK,
                LODGING_KIND,
                LODGING_PRIORITY,
                LookupRequest::Lodging(intent.lodging.parameters.clone()),
            ))?;
        }

        if intent.points_of_interest.needed {
            let parameters = LookupParameters {
                anchor: plan.selected_lodging().cloned(),
                ..intent.points_of_interest.parameters.clone()
            };
            batch.insert(self.lookup_task(
                NEARBY_POINTS_OF_INTEREST_TASK,
                POINTS_OF_INTEREST_KIND,
                POINTS_OF_INTEREST_PRIORITY,
                LookupRequest::PointsOfInterest(parameters),
            ))?;
        }

        if intent.transit.needed
            && let Some(task) = self.transit_task(plan)
        {
            batch.insert(task)?;
        }

        Ok(batch)
    }

    /// `None` until both a lodging and at least one point of interest are known.
    fn transit_task(&self, plan: &TravelPlan) -> Option<LookupTask> {
        let origin = plan.selected_lodging()?.clone();
        let destinations: Vec<_> = plan
            .points_of_interest
            .items()
            .iter()
            .take(self.config.transit_destinations)
            .cloned()
            .collect();
        if destinations.is_empty() {
            return None;
        }
        Some(self.lookup_task(
            TRANSIT_TASK,
            TRANSIT_KIND,
            TRANSIT_PRIORITY,
            LookupRequest::Transit {
                origin,
                destinations,
            },
        ))
    }

    fn lookup_task(
        &self,
        name: &'static str,
        kind: &'static str,
        priority: TaskPriority,
        request: LookupRequest,
    ) -> LookupTask {
        let lookups = self.lookups.clone();
        TaskDescriptor::new(name, priority, request, move |request, token| async move {
            lookups
                .execute(request, token)
                .await
                .map_err(|error| error.for_task(name))
        })
        .with_kind(kind)
    }

    async fn render_complete(
        &self,
        plan: &TravelPlan,
        started: Instant,
    ) -> Result<String, CoreError> {
        if !plan.has_core_results() {
            return Ok(formatter::total_failure());
        }
        let template = formatter::complete_response(plan, &self.config)?;

        let Some(drafter) = &self.prose else {
            return Ok(template);
        };
        let remaining = self.remaining(started);
        if remaining.is_zero() {
            tracing::warn!("no budget left for prose drafting; using the template");
            return Ok(template);
        }

        match timeout(remaining, drafter.draft_prose(plan)).await {
            Ok(Ok(prose)) if !prose.trim().is_empty() => Ok(prose),
            Ok(Ok(_)) => {
                tracing::warn!("prose drafter returned nothing; using the template");
                Ok(template)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    kind = ?error.kind,
                    message = %error.message,
                    "prose drafting failed; using the template"
                );
                Ok(template)
            }
            Err(_) => {
                tracing::warn!(
                    budget_ms = remaining.as_millis() as u64,
                    "prose drafting ran out of time; using the template"
                );
                Ok(template)
            }
        }
    }

    fn remaining(&self, started: Instant) -> Duration {
        self.config
            .complete_response_time
            .saturating_sub(started.elapsed())
    }
}

impl Run<'_> {
    /// Records `text` as the quick or complete response and hands it to the sink.
    fn deliver(&mut self, kind: MessageKind, text: String) {
        match kind {
            MessageKind::Quick => {
                self.state.record_quick(text.clone());
                self.timings.quick = self.started.elapsed();
            }
            MessageKind::Complete => {
                self.state.record_complete(text.clone());
                self.timings.complete = self.started.elapsed();
            }
            MessageKind::Acknowledgement => {}
        }
        self.sink.deliver(AssistantMessage::new(kind, text));
    }

    fn finish(self) -> CoordinatedResponse {
        CoordinatedResponse {
            state: self.state,
            timings: self.timings,
        }
    }
}

fn absorb(
    plan: &mut TravelPlan,
    progress: &mut LookupProgress,
    report: BatchReport<LookupPayload>,
) -> Result<(), CoreError> {
    let fallbacks_used = report.fallbacks_used.clone();
    for (name, outcome) in report.into_outcomes() {
        progress.update(&name, outcome.clone());
        let from_fallback = fallbacks_used.contains(&name);

        match name.as_str() {
            LODGING_TASK => merge_outcome(
                &mut plan.lodging,
                &name,
                outcome,
                from_fallback,
                |payload| match payload {
                    LookupPayload::Lodging(items) => Some(items),
                    _ => None,
                },
            )?,
            POINTS_OF_INTEREST_TASK | NEARBY_POINTS_OF_INTEREST_TASK => merge_outcome(
                &mut plan.points_of_interest,
                &name,
                outcome,
                from_fallback,
                |payload| match payload {
                    LookupPayload::PointsOfInterest(items) => Some(items),
                    _ => None,
                },
            )?,
            TRANSIT_TASK => merge_outcome(
                &mut plan.transit,
                &name,
                outcome,
                from_fallback,
                |payload| match payload {
                    LookupPayload::Transit(routes) => Some(routes),
                    _ => None,
                },
            )?,
            other => {
                return Err(CoreError::new(
                    CoreErrorKind::Coordination,
                    format!("no response section for task '{other}'"),
                ));
            }
        }
    }
    Ok(())
}

fn merge_outcome<T>(
    section: &mut Section<T>,
    name: &str,
    outcome: TaskOutcome<LookupPayload>,
    from_fallback: bool,
    unpack: fn(LookupPayload) -> Option<Vec<T>>,
) -> Result<(), CoreError> {
    let newer = match outcome {
        TaskOutcome::Success(payload) => {
            let Some(items) = unpack(payload) else {
                return Err(CoreError::new(
                    CoreErrorKind::Coordination,
                    format!("task '{name}' produced a payload for another section"),
                )
                .for_task(name));
            };
            if items.is_empty() {
                Section::Empty
            } else if from_fallback {
                tracing::warn!(task = %name, items = items.len(), "using fallback results");
                Section::Degraded(items)
            } else {
                Section::Ready(items)
            }
        }
        TaskOutcome::Error(message) => {
            tracing::warn!(task = %name, %message, "lookup failed");
            Section::Failed
        }
        TaskOutcome::TimedOut => {
            tracing::warn!(task = %name, "lookup timed out without a fallback");
            Section::TimedOut
        }
        TaskOutcome::Cancelled => Section::Cancelled,
    };
    *section = std::mem::take(section).merge(newer);
    Ok(())
}
