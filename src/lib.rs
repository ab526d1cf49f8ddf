//! hdfsync - Reconcile and migrate HDFS backup trees into S3
//!
//! This library lists a backup root on HDFS, compares every table with what
//! already exists under the destination prefix in S3, and moves the missing
//! or mismatched files through a local staging directory.
//!
//! # Features
//!
//! - **Reconciliation first**: a dry-run report is always produced before anything moves
//! - **Size-based verification**: a file is in sync when its destination size matches
//! - **Bounded retry**: uploads retry with linear backoff before the run aborts
//! - **Idempotent**: re-running skips everything that already arrived
//! - **Notifications**: optional before/after summary to a chat webhook
//!
//! # Example
//!
//! ```no_run
//! use hdfsync::{run_backup, BackupConfig, ShellRunner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BackupConfig {
//!     source_root: "/user/xxx/BACKUP".to_string(),
//!     prefix: "2013.06.20".to_string(),
//!     report_only: true,
//!     ..BackupConfig::default()
//! };
//!
//! let outcome = run_backup(&ShellRunner, &config).await?;
//! println!("{}", outcome.before);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod destination;
mod error;
mod format;
mod notify;
mod orchestrator;
mod reconcile;
mod report;
mod retry;
mod shell;
mod transfer;
mod types;

pub use catalog::{last_segment, list_catalog, parse_du_output, total_size};
pub use destination::DestinationIndex;
pub use error::BackupError;
pub use format::format_size;
pub use notify::Notifier;
pub use orchestrator::{reconcile_pass, run_backup, PassOutcome, RunOutcome};
pub use reconcile::{decide, Reconciliation};
pub use report::{Report, ReportLine, ReportSummary, TableSummary};
pub use retry::{retry, RetryPolicy};
pub use shell::{command_line, run_checked, CommandOutput, CommandRunner, ShellRunner};
pub use transfer::{Transferer, LOGS_ENTRY};
pub use types::{BackupConfig, CatalogEntry, FileUnit, PassMode, RunState, TableUnit};
