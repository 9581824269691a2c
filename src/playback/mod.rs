pub mod format;
pub mod renderer;
pub mod source;
pub mod switcher;
pub mod types;

pub use format::{SampleEncoding, WaveFormat};
pub use renderer::ReconfigurableRenderer;
pub use source::{SampleSource, SharedSampleSource};
pub use switcher::{PlaybackEnded, SourceSwitchProvider};
pub use types::{PipelineRequest, PlaybackState, PlaybackStopped, ShareMode};
