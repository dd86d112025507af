//! End-to-end cycles against a real store file and mock source, producer and
//! channel.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Notify;

use perle_publisher::testing::{
    ChannelBehavior, MockChannel, MockProducer, MockSource, ProducerBehavior, RecordingNotifier,
};
use perle_publisher::{CycleOutcome, CycleState, SkipReason, Workflow};
use perle_store::ContentStore;

const TEXTS: [&str; 2] = ["Ciao a tutti quanti", "Buongiorno gruppo"];

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<ContentStore>,
    source: Arc<MockSource>,
    producer: Arc<MockProducer>,
    channel: Arc<MockChannel>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(source: MockSource, producer: ProducerBehavior, channel: ChannelBehavior) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::new(dir.path().join("perle.json")));
        let producer = Arc::new(MockProducer::new(dir.path().join("videos"), producer));
        Self {
            store,
            source: Arc::new(source),
            producer,
            channel: Arc::new(MockChannel::new(channel)),
            notifier: Arc::new(RecordingNotifier::default()),
            _dir: dir,
        }
    }

    fn with_producer(mut self, producer: MockProducer) -> Self {
        self.producer = Arc::new(producer);
        self
    }

    fn with_channel(mut self, channel: MockChannel) -> Self {
        self.channel = Arc::new(channel);
        self
    }

    fn videos_dir(&self) -> std::path::PathBuf {
        self._dir.path().join("videos")
    }

    fn workflow(&self) -> Workflow {
        Workflow::builder()
            .source(Box::new(Arc::clone(&self.source)))
            .store(Arc::clone(&self.store))
            .producer(Box::new(Arc::clone(&self.producer)))
            .channel(Box::new(Arc::clone(&self.channel)))
            .notifier(Box::new(Arc::clone(&self.notifier)))
            .build()
    }
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_cycle_publishes_exactly_one_item() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );
    let workflow = h.workflow();

    let report = workflow.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Published);
    assert_eq!(report.stats.fetched, 2);
    assert_eq!(report.stats.added, 2);
    assert_eq!(report.stats.unpublished, 1);

    let items = h.store.load().await;
    assert_eq!(items.len(), 2);
    let published: Vec<_> = items.iter().filter(|i| i.is_published()).collect();
    assert_eq!(published.len(), 1);

    let publication = published[0].publication().unwrap();
    assert_eq!(Some(&publication.reference), report.reference.as_ref());
    assert_eq!(report.item_id.as_ref(), Some(&published[0].id));
    assert!(workflow.guard().is_idle());
    assert_eq!(h.notifier.published().len(), 1);
}

#[tokio::test]
async fn second_cycle_publishes_the_other_item_then_runs_dry() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );
    let workflow = h.workflow();

    assert_eq!(workflow.run_cycle().await.outcome, CycleOutcome::Published);
    let second = workflow.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::Published);
    assert_eq!(second.stats.added, 0);

    let third = workflow.run_cycle().await;
    assert_eq!(third.outcome, CycleOutcome::NothingToPublish);
    assert!(!third.outcome.is_failure());

    let stats = h.store.stats().await;
    assert_eq!((stats.total, stats.published), (2, 2));
    assert_eq!(h.channel.delivered().len(), 2);
}

// ---------------------------------------------------------------------------
// Failure injection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn source_failure_leaves_store_untouched() {
    let h = Harness::new(
        MockSource::failing(),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );

    let report = h.workflow().run_cycle().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed { state: CycleState::FetchingSource, .. }
    ));
    assert!(h.store.load().await.is_empty());
    assert!(h.producer.produced().is_empty());
}

#[tokio::test]
async fn empty_source_is_a_failure() {
    let h = Harness::new(
        MockSource::with_texts(&[]),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );

    let report = h.workflow().run_cycle().await;
    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed { state: CycleState::FetchingSource, .. }
    ));
}

#[tokio::test]
async fn production_failure_publishes_nothing() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Fail,
        ChannelBehavior::Accept,
    );

    let report = h.workflow().run_cycle().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed { state: CycleState::Producing, .. }
    ));
    let stats = h.store.stats().await;
    assert_eq!((stats.total, stats.unpublished), (2, 2));
    assert!(h.channel.delivered().is_empty());
    assert!(h.notifier.failures().is_empty());
}

#[tokio::test]
async fn rejected_delivery_keeps_artifact_and_alerts() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Reject,
    );

    let report = h.workflow().run_cycle().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed { state: CycleState::Delivering, .. }
    ));
    assert_eq!(h.store.stats().await.unpublished, 2);
    let artifact = report.artifact.expect("artifact path recorded");
    assert!(artifact.exists());
    assert_eq!(h.notifier.failures().len(), 1);
}

#[tokio::test]
async fn misconfigured_channel_fails_the_cycle_only() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Misconfigured,
    );
    let workflow = h.workflow();

    let report = workflow.run_cycle().await;
    assert!(report.outcome.is_failure());
    assert_eq!(h.store.stats().await.published, 0);
    assert_eq!(file_count(&h.videos_dir()), 1);

    // The workflow stays usable.
    assert!(workflow.guard().is_idle());
    assert!(workflow.run_cycle().await.outcome.is_failure());
}

#[tokio::test]
async fn delivered_item_missing_from_store_still_counts_as_published() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );
    let store_path = h.store.path().to_path_buf();
    let h = h.with_channel(MockChannel::accept_and_wipe(store_path));

    let report = h.workflow().run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Published);
    let item_id = report.item_id.clone().expect("item selected");
    assert_eq!(report.reference, Some(format!("mock:{item_id}:1")));
    assert_eq!(h.channel.delivered().len(), 1);
    assert_eq!(h.notifier.published().len(), 1);
    assert!(h.notifier.failures().is_empty());
    assert!(h.store.load().await.is_empty());
}

#[tokio::test]
async fn panicking_producer_is_contained() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Panic,
        ChannelBehavior::Accept,
    );
    let workflow = h.workflow();

    let report = workflow.run_cycle().await;

    match &report.outcome {
        CycleOutcome::Failed { state, error } => {
            assert_eq!(*state, CycleState::Producing);
            assert!(error.contains("mock producer exploded"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(workflow.guard().is_idle());
    assert_eq!(h.store.stats().await.published, 0);
}

// ---------------------------------------------------------------------------
// Single flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_trigger_is_dropped() {
    let gate = Arc::new(Notify::new());
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );
    let dir = h.videos_dir();
    let h = h.with_producer(
        MockProducer::new(dir, ProducerBehavior::Succeed).gated(Arc::clone(&gate)),
    );
    let workflow = h.workflow();

    let first = workflow.run_cycle();
    let second = async {
        // Let the first cycle reach the gated producer.
        while workflow.guard().is_idle() {
            tokio::task::yield_now().await;
        }
        let report = workflow.run_cycle().await;
        gate.notify_one();
        report
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.outcome, CycleOutcome::Published);
    assert_eq!(second.outcome, CycleOutcome::Skipped(SkipReason::AlreadyRunning));
    assert_eq!(h.source.calls(), 1);
    assert_eq!(h.store.stats().await.published, 1);
    assert!(workflow.guard().is_idle());
}

#[tokio::test]
async fn sync_merges_without_publishing() {
    let h = Harness::new(
        MockSource::with_texts(&TEXTS),
        ProducerBehavior::Succeed,
        ChannelBehavior::Accept,
    );

    let stats = h.workflow().sync().await.unwrap();

    assert_eq!((stats.fetched, stats.added, stats.unpublished), (2, 2, 2));
    assert!(h.producer.produced().is_empty());
}
