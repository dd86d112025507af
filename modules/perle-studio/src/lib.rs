//! Turns a perla into a vertical short video: narration, still card, ffmpeg.

pub mod compose;
pub mod error;
pub mod narration;
pub mod render;
pub mod retry;
pub mod studio;

pub use compose::{Composer, FfmpegComposer};
pub use error::{ProductionError, Result, Stage};
pub use narration::{Narrator, TtsNarrator};
pub use render::{CardRenderer, CardStyle, DisabledRenderer, StillRenderer};
pub use retry::RetryPolicy;
pub use studio::{ArtifactHandle, ArtifactProducer, VideoStudio};
