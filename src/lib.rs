#![forbid(unsafe_code)]

pub mod core;
pub mod curve;
pub mod engine;
pub mod error;
pub mod model;
pub mod scroll;
pub mod sequence;
pub mod timeline;

pub use crate::core::Progress;
pub use crate::curve::{Breakpoint, Curve, Ease};
pub use crate::engine::{
    EngineStats, FrameRGBA, PlaybackEngine, ViewportState, attach_engine, contain_rect,
    frame_index_for,
};
pub use crate::error::{CinescrollError, CinescrollResult};
pub use crate::model::{Scene, SceneCopy, SequenceSpec, Storyboard};
pub use crate::scroll::{ScrollRegion, ScrollTimeline, Subscription};
pub use crate::sequence::{FrameStore, PreparedFrame, decode_frame};
pub use crate::timeline::{SceneStyle, TimelineSnapshot, evaluate_scene, evaluate_timeline};
