use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Where session records and the log file live unless overridden.
    pub fn data_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("lanetap"),
            )
        } else {
            ProjectDirs::from("", "", "lanetap").map(|dirs| dirs.data_local_dir().to_path_buf())
        }
    }

    /// `override_dir` when given, else the platform data directory, else
    /// the working directory.
    pub fn resolve(override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .or_else(Self::data_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("sessions.db")
    }

    pub fn log_path(dir: &Path) -> PathBuf {
        dir.join("lanetap.log")
    }
}
