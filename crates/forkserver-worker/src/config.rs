use std::path::{Path, PathBuf};

/// File name prefix of materialized resources.
pub const RESOURCE_PREFIX: &str = "resource-";
/// File name suffix of materialized resources.
pub const RESOURCE_SUFFIX: &str = ".bin";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory receiving `resource-<n>.bin` files. Default: current directory.
    ///
    /// Files are never removed by the worker; cleanup belongs to whoever
    /// launched it.
    pub resource_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("."),
        }
    }
}

impl WorkerConfig {
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = dir.into();
        self
    }

    /// Path of the `index`-th materialized resource.
    pub fn resource_path(&self, index: u64) -> PathBuf {
        resource_path_in(&self.resource_dir, index)
    }
}

fn resource_path_in(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{RESOURCE_PREFIX}{index}{RESOURCE_SUFFIX}"))
}
