//! Host environment detection and one-time process setup.

use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Variables capping the thread pools of numeric libraries an engine may link.
pub const THREAD_LIMIT_VARS: &[&str] = &["OMP_NUM_THREADS", "OPENBLAS_NUM_THREADS", "MKL_NUM_THREADS"];

static INIT: Once = Once::new();

/// Pin numeric library thread pools to a single thread and point scratch
/// folders at the system temp directory.
///
/// Must be called at process startup, before any other thread exists and
/// before any adapter runs. Applied at most once; later calls return
/// immediately. The binary calls it first thing in `main`.
pub fn init_process() {
    INIT.call_once(|| {
        for var in THREAD_LIMIT_VARS {
            // SAFETY: callers run this before spawning threads, so nothing
            // reads the environment concurrently.
            unsafe { std::env::set_var(var, "1") };
        }
        // SAFETY: as above.
        unsafe { std::env::set_var("JOBLIB_TEMP_FOLDER", std::env::temp_dir()) };
        debug!(vars = ?THREAD_LIMIT_VARS, "numeric library thread pools limited to 1");
    });
}

/// Environment information attached to each run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ram_bytes: Option<u64>,

    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            cpu_model: None,
            cpu_cores: None,
            total_ram_bytes: None,
            os: std::env::consts::OS.to_string(),
            hostname: None,
        }
    }
}

impl EnvironmentInfo {
    /// Detect environment information from the current system
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut sys = System::new_all();
        sys.refresh_all();

        EnvironmentInfo {
            cpu_model: sys.cpus().first().map(|c| c.brand().to_string()),
            cpu_cores: sys.physical_core_count().map(|c| c as u32),
            total_ram_bytes: Some(sys.total_memory()),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            hostname: System::host_name(),
        }
    }
}
