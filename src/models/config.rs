use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Settings for a merge write-back pass, loaded from `resmerge.yaml`.
///
/// Every field has a default, so a partial (or missing) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Disable crunching of plain `.png` files. Nine-patch images are always crunched.
    pub no_crunch: bool,

    /// Path to the crunch tool. Empty means files are copied without crunching.
    pub crunch_tool: String,

    /// Seconds to wait for one crunch invocation, 0 for no limit.
    pub crunch_timeout: u32,

    /// Extra environment variables for the crunch tool.
    pub crunch_env: IndexMap<String, String>,

    /// Upper bound on concurrently running per-item writes.
    pub max_concurrent_writes: usize,

    pub debug_mode: bool,

    pub log_dir: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            no_crunch: false,
            crunch_tool: String::new(),
            crunch_timeout: default_crunch_timeout(),
            crunch_env: IndexMap::new(),
            max_concurrent_writes: default_max_concurrent_writes(),
            debug_mode: false,
            log_dir: "logs".to_string(),
        }
    }
}

fn default_crunch_timeout() -> u32 {
    300
}

pub fn default_max_concurrent_writes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Values picked up from `RESMERGE_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsOverrides {
    pub no_crunch: Option<bool>,
    pub crunch_tool: Option<String>,
    pub crunch_timeout: Option<u32>,
    pub max_concurrent_writes: Option<usize>,
    pub debug_mode: Option<bool>,
    pub log_dir: Option<String>,
}

impl MergeSettings {
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(v) = overrides.no_crunch {
            self.no_crunch = v;
        }
        if let Some(v) = overrides.crunch_tool {
            self.crunch_tool = v;
        }
        if let Some(v) = overrides.crunch_timeout {
            self.crunch_timeout = v;
        }
        if let Some(v) = overrides.max_concurrent_writes {
            self.max_concurrent_writes = v;
        }
        if let Some(v) = overrides.debug_mode {
            self.debug_mode = v;
        }
        if let Some(v) = overrides.log_dir {
            self.log_dir = v;
        }
    }

    pub fn has_crunch_tool(&self) -> bool {
        !self.crunch_tool.trim().is_empty()
    }
}
