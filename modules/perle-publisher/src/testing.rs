// Test mocks for the publication cycle, one per trait boundary:
// - MockSource (ContentSource): canned items or a canned failure
// - MockProducer (ArtifactProducer): writes a small file, fails, or panics
// - MockChannel (DeliveryChannel): accepts, rejects, or is misconfigured
// - RecordingNotifier (NotifyBackend): remembers what it was asked to send

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use perle_common::{ContentItem, ItemId};
use perle_sources::{ContentSource, SourceError};
use perle_studio::{ArtifactHandle, ArtifactProducer, ProductionError, Stage};

use crate::delivery::{DeliveryChannel, DeliveryError, DeliveryResult};
use crate::notify::backend::NotifyBackend;
use crate::workflow::CycleReport;

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

pub struct MockSource {
    texts: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            texts: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn fetch(&self) -> perle_sources::Result<Vec<ContentItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SourceError::Unavailable("mock source is down".into()));
        }
        Ok(self
            .texts
            .iter()
            .filter_map(|t| ContentItem::candidate(t).ok())
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockProducer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerBehavior {
    Succeed,
    Fail,
    Panic,
}

pub struct MockProducer {
    out_dir: PathBuf,
    behavior: ProducerBehavior,
    /// When set, `produce` waits for a notification before finishing.
    gate: Option<Arc<Notify>>,
    produced: Mutex<Vec<ItemId>>,
}

impl MockProducer {
    pub fn new(out_dir: impl Into<PathBuf>, behavior: ProducerBehavior) -> Self {
        Self {
            out_dir: out_dir.into(),
            behavior,
            gate: None,
            produced: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn produced(&self) -> Vec<ItemId> {
        self.produced.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactProducer for MockProducer {
    async fn produce(&self, item: &ContentItem) -> perle_studio::Result<ArtifactHandle> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.behavior {
            ProducerBehavior::Fail => {
                return Err(ProductionError::failed(Stage::Narration, "mock TTS is down"))
            }
            ProducerBehavior::Panic => panic!("mock producer exploded"),
            ProducerBehavior::Succeed => {}
        }

        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| ProductionError::failed(Stage::Setup, e.to_string()))?;
        let path = self.out_dir.join(format!("{}.mp4", item.id));
        std::fs::write(&path, b"fake mp4")
            .map_err(|e| ProductionError::failed(Stage::Compose, e.to_string()))?;
        self.produced.lock().unwrap().push(item.id.clone());

        Ok(ArtifactHandle {
            item_id: item.id.clone(),
            path,
            duration: Some(Duration::from_secs(5)),
        })
    }
}

// ---------------------------------------------------------------------------
// MockChannel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBehavior {
    Accept,
    Reject,
    Misconfigured,
}

pub struct MockChannel {
    behavior: ChannelBehavior,
    delivered: Mutex<Vec<PathBuf>>,
    /// Emptied right after a successful delivery.
    wipe_store: Option<PathBuf>,
}

impl MockChannel {
    pub fn new(behavior: ChannelBehavior) -> Self {
        Self {
            behavior,
            delivered: Mutex::new(Vec::new()),
            wipe_store: None,
        }
    }

    /// Accepts, but empties the store file at `store_path` while delivering,
    /// as if someone reset the collection mid-cycle.
    pub fn accept_and_wipe(store_path: impl Into<PathBuf>) -> Self {
        Self {
            wipe_store: Some(store_path.into()),
            ..Self::new(ChannelBehavior::Accept)
        }
    }

    pub fn delivered(&self) -> Vec<PathBuf> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for MockChannel {
    async fn deliver(
        &self,
        artifact: &ArtifactHandle,
        item: &ContentItem,
    ) -> Result<DeliveryResult, DeliveryError> {
        match self.behavior {
            ChannelBehavior::Misconfigured => {
                Err(DeliveryError::Configuration("mock channel has no token".into()))
            }
            ChannelBehavior::Reject => Ok(DeliveryResult::rejected("mock channel said no")),
            ChannelBehavior::Accept => {
                if let Some(path) = &self.wipe_store {
                    std::fs::write(path, r#"{"items":[]}"#).unwrap();
                }
                let mut delivered = self.delivered.lock().unwrap();
                delivered.push(artifact.path.clone());
                Ok(DeliveryResult::delivered(format!(
                    "mock:{}:{}",
                    item.id,
                    delivered.len()
                )))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyBackend for RecordingNotifier {
    async fn send_published(&self, report: &CycleReport) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(report.to_string());
        Ok(())
    }

    async fn send_failure(&self, report: &CycleReport) -> anyhow::Result<()> {
        self.failures.lock().unwrap().push(report.to_string());
        Ok(())
    }
}

