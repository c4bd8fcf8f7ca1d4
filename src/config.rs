use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Anamnesis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bound on the number of envelope layers peeled per response.
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = crate::pipeline::decoding::DEFAULT_MAX_UNWRAP_DEPTH;

/// Default cap on raw response size accepted by callers (2 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 2 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is unset.
/// Debug builds trace the pipeline stages; release builds only warn.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "anamnesis=debug"
    } else {
        "anamnesis=warn"
    }
}

/// True for debug builds.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Decoder tuning knobs.
///
/// `max_input_bytes` is enforced by the caller before decoding (the CLI
/// rejects larger inputs); the pipeline itself never truncates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub max_unwrap_depth: usize,
    pub max_input_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_unwrap_depth: DEFAULT_MAX_UNWRAP_DEPTH,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl DecoderConfig {
    /// True when `len` bytes fit under the configured cap.
    pub fn accepts_len(&self, len: usize) -> bool {
        len <= self.max_input_bytes
    }
}
