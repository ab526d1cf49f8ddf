//! Data structures for backup reconciliation.

use crate::error::BackupError;
use std::path::PathBuf;
use std::time::Duration;

/// One `(path, size)` record produced by a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Full path of the entry in the source filesystem.
    pub path: String,
    /// Size in bytes as reported by the listing.
    pub size_bytes: u64,
}

impl CatalogEntry {
    /// Last `/`-delimited segment of the path.
    pub fn name(&self) -> &str {
        crate::catalog::last_segment(&self.path)
    }
}

/// A top-level directory under the backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUnit {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
}

/// An immediate file entry within a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUnit {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
}

impl From<CatalogEntry> for TableUnit {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            path: entry.path,
            size_bytes: entry.size_bytes,
        }
    }
}

impl From<CatalogEntry> for FileUnit {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            path: entry.path,
            size_bytes: entry.size_bytes,
        }
    }
}

/// Configuration for a backup run.
///
/// # Example
///
/// ```
/// use hdfsync::BackupConfig;
///
/// let config = BackupConfig {
///     source_root: "/user/backup/BACKUP".to_string(),
///     prefix: "2013.06.20".to_string(),
///     report_only: true,
///     ..BackupConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// HDFS root whose immediate children are the tables (e.g. `"/user/xxx/BACKUP"`)
    pub source_root: String,
    /// Destination bucket name, without the `s3://` scheme
    pub bucket: String,
    /// Key prefix under the bucket for this run (e.g. `"2013.06.20"`)
    pub prefix: String,
    /// Stop after the dry-run report, never transfer (default: false).
    pub report_only: bool,
    /// Local scratch directory; one subdirectory per table is created beneath it.
    pub staging_dir: PathBuf,
    /// Maximum upload attempts per file (default: 50).
    pub max_attempts: u32,
    /// Linear backoff unit; attempt `n` sleeps `n * backoff_unit` after failing (default: 10s).
    pub backoff_unit: Duration,
    /// Listing entries whose name ends with this suffix are dropped (default: `"_logs"`).
    pub noise_suffix: String,
    /// Hadoop CLI executable (default: `"hadoop"`).
    pub hadoop_bin: String,
    /// s3cmd executable (default: `"s3cmd"`).
    pub s3cmd_bin: String,
    /// Chat webhook that receives the before/after summary. `None` disables notification.
    pub notify_webhook: Option<String>,
    /// Draw a progress bar during the execute pass.
    pub show_progress: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_root: String::new(),
            bucket: "companybook-backup".to_string(),
            prefix: String::new(),
            report_only: false,
            staging_dir: PathBuf::from(".hdfsync.staging"),
            max_attempts: 50,
            backoff_unit: Duration::from_secs(10),
            noise_suffix: "_logs".to_string(),
            hadoop_bin: "hadoop".to_string(),
            s3cmd_bin: "s3cmd".to_string(),
            notify_webhook: None,
            show_progress: false,
        }
    }
}

impl BackupConfig {
    /// Checks the parameters the run cannot do without.
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.source_root.trim().is_empty() {
            return Err(BackupError::InvalidConfig(
                "source root must not be empty".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(BackupError::InvalidConfig(
                "bucket must not be empty".to_string(),
            ));
        }
        if self.prefix.trim().is_empty() {
            return Err(BackupError::InvalidConfig(
                "destination prefix must not be empty".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(BackupError::InvalidConfig(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Destination URL of a table's directory, with a trailing slash.
    pub fn destination_dir(&self, table: &str) -> String {
        format!(
            "s3://{}/{}/{}/",
            self.bucket,
            self.prefix.trim_matches('/'),
            table
        )
    }

    /// Destination URL of one file inside a table.
    pub fn destination_file(&self, table: &str, file: &str) -> String {
        format!("{}{}", self.destination_dir(table), file)
    }

    /// Staging subdirectory for one table.
    pub fn staging_for(&self, table: &str) -> PathBuf {
        self.staging_dir.join(table)
    }
}

/// Whether a reconciliation pass only reports or also transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Reconcile and report, never transfer
    DryRun,
    /// Transfer every missing or mismatched file
    Execute,
}

/// States of a backup run, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Listing the tables under the source root
    Listing,
    /// Reconciling every table without transferring
    DryRunReport,
    /// Transferring missing and mismatched files
    Executing,
    /// Reconciling again after execution to confirm convergence
    FinalReport,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackupConfig {
        BackupConfig {
            source_root: "/user/xxx/BACKUP".to_string(),
            prefix: "2013.06.20".to_string(),
            ..BackupConfig::default()
        }
    }

    #[test]
    fn test_destination_urls() {
        let config = config();
        assert_eq!(
            config.destination_dir("table-1"),
            "s3://companybook-backup/2013.06.20/table-1/"
        );
        assert_eq!(
            config.destination_file("table-1", "part-m-000001"),
            "s3://companybook-backup/2013.06.20/table-1/part-m-000001"
        );
    }

    #[test]
    fn test_validate_rejects_missing_prefix() {
        let config = BackupConfig {
            prefix: " ".to_string(),
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(BackupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_file_unit_name_from_path() {
        let unit = FileUnit::from(CatalogEntry {
            path: "/user/xxx/BACKUP/table-1/part-m-000002".to_string(),
            size_bytes: 1000,
        });
        assert_eq!(unit.name, "part-m-000002");
        assert_eq!(unit.size_bytes, 1000);
    }
}
