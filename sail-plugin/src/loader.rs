//! Filesystem discovery of codec metadata files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Suffix of codec metadata files, e.g. `gif.codec.info`.
pub const METADATA_SUFFIX: &str = ".codec.info";

/// Environment variable with additional codec search directories,
/// separated by the platform's path-list separator.
pub const CODECS_PATH_ENV: &str = "SAIL_CODECS_PATH";

#[cfg(unix)]
const INSTALL_CODECS_DIR: &str = "/usr/local/lib/sail/codecs";
#[cfg(windows)]
const INSTALL_CODECS_DIR: &str = "C:\\SAIL\\codecs";

/// The built-in install directory plus any `SAIL_CODECS_PATH` entries.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(INSTALL_CODECS_DIR)];

    if let Some(value) = std::env::var_os(CODECS_PATH_ENV) {
        paths.extend(std::env::split_paths(&value));
    }

    paths
}

/// Path of the plugin binary sited next to a metadata file: same stem,
/// platform dynamic-library naming.
pub fn plugin_path_for(metadata_path: &Path) -> PathBuf {
    let stem = metadata_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(METADATA_SUFFIX))
        .unwrap_or("codec");

    let file_name = format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        stem,
        std::env::consts::DLL_SUFFIX
    );

    metadata_path.with_file_name(file_name)
}

/// Discovers codec metadata files across a list of directories.
pub struct CodecLoader {
    search_paths: Vec<PathBuf>,
}

impl CodecLoader {
    /// Create a loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Create a loader over the given directories.
    pub fn with_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: paths.into_iter().collect(),
        }
    }

    /// Add a directory to search.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Find all metadata files, in directory order and sorted within each
    /// directory. Unreadable directories are logged and skipped.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();

        for dir in &self.search_paths {
            if !dir.is_dir() {
                debug!(path = %dir.display(), "codec directory does not exist, skipping");
                continue;
            }

            match std::fs::read_dir(dir) {
                Ok(entries) => {
                    let mut in_dir: Vec<PathBuf> = entries
                        .flatten()
                        .map(|entry| entry.path())
                        .filter(|path| Self::is_metadata_file(path))
                        .collect();
                    in_dir.sort();
                    found.extend(in_dir);
                }
                Err(err) => {
                    warn!(
                        path = %dir.display(),
                        error = %err,
                        "failed to read codec directory"
                    );
                }
            }
        }

        found
    }

    fn is_metadata_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(METADATA_SUFFIX))
            .unwrap_or(false)
    }
}

impl Default for CodecLoader {
    fn default() -> Self {
        Self::new()
    }
}
