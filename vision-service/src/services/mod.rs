pub mod metrics;
pub mod providers;
pub mod relay;
pub mod scratch;

pub use metrics::{get_metrics, init_metrics};
pub use relay::{InferenceRelay, RelayError};
pub use scratch::{ScratchDir, ScratchFile};
