use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// `base_dir` is the directory under which every queue directory lives; the
/// engine creates it on startup if missing and resolves all paths against
/// it, so the process working directory is never consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the queue directories.
    pub base_dir: PathBuf,
    /// Whether writer opens sweep payload files no LUT slot references.
    /// Such files can be left behind by a crash between the payload write
    /// and the index write.
    pub sweep_orphans: bool,
}

impl EngineConfig {
    /// Config with the given base directory and default behavior.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sweep_orphans: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("spoolq")
    }
}
