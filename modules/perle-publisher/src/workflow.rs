//! One publication cycle: fetch, merge, select, produce, deliver, publish.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

use perle_common::{ContentItem, ItemId};
use perle_sources::ContentSource;
use perle_store::{ContentStore, StoreError};
use perle_studio::ArtifactProducer;

use crate::delivery::DeliveryChannel;
use crate::error::CycleError;
use crate::guard::CycleGuard;
use crate::notify::backend::NotifyBackend;
use crate::notify::noop::NoopBackend;

/// How many of the most recently added unpublished items are eligible.
pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchingSource,
    Merging,
    Selecting,
    Producing,
    Delivering,
    Publishing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingSource => write!(f, "fetching_source"),
            Self::Merging => write!(f, "merging"),
            Self::Selecting => write!(f, "selecting"),
            Self::Producing => write!(f, "producing"),
            Self::Delivering => write!(f, "delivering"),
            Self::Publishing => write!(f, "publishing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published,
    NothingToPublish,
    Skipped(SkipReason),
    /// `state` is where the cycle was when it failed.
    Failed { state: CycleState, error: String },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published => write!(f, "published"),
            Self::NothingToPublish => write!(f, "nothing_to_publish"),
            Self::Skipped(SkipReason::AlreadyRunning) => write!(f, "skipped(already_running)"),
            Self::Failed { state, error } => write!(f, "failed({state}: {error})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub added: usize,
    /// Unpublished items left after the cycle.
    pub unpublished: usize,
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} added={} unpublished={}",
            self.fetched, self.added, self.unpublished
        )
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub stats: CycleStats,
    pub item_id: Option<ItemId>,
    pub artifact: Option<PathBuf>,
    pub reference: Option<String>,
    pub elapsed: Duration,
}

impl CycleReport {
    fn skipped() -> Self {
        Self {
            outcome: CycleOutcome::Skipped(SkipReason::AlreadyRunning),
            stats: CycleStats::default(),
            item_id: None,
            artifact: None,
            reference: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outcome={} {}", self.outcome, self.stats)?;
        if let Some(id) = &self.item_id {
            write!(f, " item={id}")?;
        }
        if let Some(reference) = &self.reference {
            write!(f, " reference={reference}")?;
        }
        write!(f, " elapsed_ms={}", self.elapsed.as_millis())
    }
}

/// What a cycle has learned so far; survives errors and panics so the
/// report can say where things stopped.
#[derive(Debug)]
struct Progress {
    state: CycleState,
    stats: CycleStats,
    item_id: Option<ItemId>,
    artifact: Option<PathBuf>,
    reference: Option<String>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: CycleState::Idle,
            stats: CycleStats::default(),
            item_id: None,
            artifact: None,
            reference: None,
        }
    }

    fn enter(&mut self, state: CycleState) {
        debug!(from = %self.state, to = %state, "Cycle state");
        self.state = state;
    }

    fn into_report(self, outcome: CycleOutcome, elapsed: Duration) -> CycleReport {
        CycleReport {
            outcome,
            stats: self.stats,
            item_id: self.item_id,
            artifact: self.artifact,
            reference: self.reference,
            elapsed,
        }
    }
}

/// Uniform pick among the last `window` items (store order = insertion order).
pub fn select_candidate<'a, R>(
    unpublished: &'a [ContentItem],
    window: usize,
    rng: &mut R,
) -> Option<&'a ContentItem>
where
    R: Rng + ?Sized,
{
    let start = unpublished.len().saturating_sub(window.max(1));
    unpublished[start..].choose(rng)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(TypedBuilder)]
pub struct Workflow {
    source: Box<dyn ContentSource>,
    store: Arc<ContentStore>,
    producer: Box<dyn ArtifactProducer>,
    channel: Box<dyn DeliveryChannel>,
    #[builder(default = Box::new(NoopBackend))]
    notifier: Box<dyn NotifyBackend>,
    #[builder(default)]
    guard: CycleGuard,
    #[builder(default = DEFAULT_WINDOW)]
    window: usize,
}

impl Workflow {
    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Run one cycle. Never fails and never panics: every problem ends up in
    /// the report's outcome, and the guard is released before returning.
    pub async fn run_cycle(&self) -> CycleReport {
        let Some(permit) = self.guard.try_start() else {
            info!("Cycle already in flight, dropping trigger");
            return CycleReport::skipped();
        };

        let started = Instant::now();
        let mut progress = Progress::new();
        info!(source = self.source.name(), channel = self.channel.name(), "Cycle starting");

        let result = AssertUnwindSafe(self.run_inner(&mut progress))
            .catch_unwind()
            .await;
        drop(permit);

        let failed_state = progress.state;
        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                if e.is_configuration() {
                    error!(state = %failed_state, error = %e, "Cycle failed: configuration");
                } else {
                    warn!(state = %failed_state, error = %e, "Cycle failed");
                }
                CycleOutcome::Failed {
                    state: failed_state,
                    error: e.to_string(),
                }
            }
            Err(payload) => {
                let e = CycleError::Panicked(panic_message(payload.as_ref()));
                error!(state = %failed_state, error = %e, "Cycle panicked");
                CycleOutcome::Failed {
                    state: failed_state,
                    error: e.to_string(),
                }
            }
        };

        let report = progress.into_report(outcome, started.elapsed());
        self.notify(&report).await;
        info!("Cycle complete. {report}");
        report
    }

    async fn run_inner(&self, p: &mut Progress) -> Result<CycleOutcome, CycleError> {
        p.enter(CycleState::FetchingSource);
        let items = self.source.fetch().await?;
        if items.is_empty() {
            return Err(CycleError::EmptySource);
        }
        p.stats.fetched = items.len();

        p.enter(CycleState::Merging);
        p.stats.added = self.store.merge(items).await?;

        p.enter(CycleState::Selecting);
        let unpublished = self.store.unpublished_items().await;
        p.stats.unpublished = unpublished.len();
        let Some(item) = self.pick(&unpublished) else {
            info!("Nothing to publish");
            return Ok(CycleOutcome::NothingToPublish);
        };
        p.item_id = Some(item.id.clone());
        info!(item_id = %item.id, window = self.window, candidates = unpublished.len(), "Selected perla");

        p.enter(CycleState::Producing);
        let artifact = self.producer.produce(&item).await?;
        p.artifact = Some(artifact.path.clone());

        p.enter(CycleState::Delivering);
        let delivery = self.channel.deliver(&artifact, &item).await?;
        if !delivery.success {
            return Err(CycleError::Rejected(
                delivery.reason.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        let reference = delivery.reference.ok_or_else(|| {
            CycleError::Rejected("channel reported success without a reference".to_string())
        })?;

        p.enter(CycleState::Publishing);
        p.reference = Some(reference.clone());
        match self.store.mark_published(&item.id, &reference).await {
            Ok(publication) => {
                p.reference = Some(publication.reference);
                p.stats.unpublished = p.stats.unpublished.saturating_sub(1);
            }
            // The post is live; the record vanished underneath us.
            Err(StoreError::NotFound(_)) => {
                warn!(item_id = %item.id, reference = %reference, "Delivered item no longer in store");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(CycleOutcome::Published)
    }

    fn pick(&self, unpublished: &[ContentItem]) -> Option<ContentItem> {
        select_candidate(unpublished, self.window, &mut rand::rng()).cloned()
    }

    async fn notify(&self, report: &CycleReport) {
        let sent = match &report.outcome {
            CycleOutcome::Published => self.notifier.send_published(report).await,
            CycleOutcome::Failed {
                state: CycleState::Delivering | CycleState::Publishing,
                ..
            } => self.notifier.send_failure(report).await,
            _ => Ok(()),
        };
        if let Err(e) = sent {
            warn!(error = %e, "Failed to send operator alert");
        }
    }

    /// Fetch and merge only.
    pub async fn sync(&self) -> Result<CycleStats, CycleError> {
        let Some(_permit) = self.guard.try_start() else {
            info!("Cycle already in flight, skipping sync");
            return Ok(CycleStats::default());
        };

        let items = self.source.fetch().await?;
        let fetched = items.len();
        let added = self.store.merge(items).await?;
        let unpublished = self.store.stats().await.unpublished;

        let stats = CycleStats {
            fetched,
            added,
            unpublished,
        };
        info!("Sync complete. {stats}");
        Ok(stats)
    }
}
