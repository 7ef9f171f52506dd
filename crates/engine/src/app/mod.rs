mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{FrameReport, LoopConfig, SceneRunner};
pub use metrics::LoopMetricsSnapshot;
pub use scene::{Scene, SceneCommand};
