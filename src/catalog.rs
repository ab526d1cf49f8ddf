//! Source catalog listing via `hadoop fs -du`.

use crate::error::BackupError;
use crate::shell::{command_line, run_checked, CommandRunner};
use crate::types::{BackupConfig, CatalogEntry};
use tracing::{debug, info};

/// Last `/`-delimited segment of a path, ignoring a trailing slash.
pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Lists the immediate children of `path` with their sizes.
///
/// Entries whose name ends with the configured noise suffix are dropped and
/// the result is sorted ascending by size. A failed listing is fatal: without
/// it the reconciliation has nothing to stand on, so it is never retried.
pub async fn list_catalog<R: CommandRunner>(
    runner: &R,
    config: &BackupConfig,
    path: &str,
) -> Result<Vec<CatalogEntry>, BackupError> {
    info!("Listing {}", path);
    let args = vec!["fs".to_string(), "-du".to_string(), path.to_string()];
    let stdout = run_checked(runner, &config.hadoop_bin, &args).await?;
    parse_du_output(
        &stdout,
        &config.noise_suffix,
        &command_line(&config.hadoop_bin, &args),
    )
}

/// Parses `hadoop fs -du` output.
///
/// Records are `size [disk_space_consumed] path`; the first token is the size
/// and the last token the path, which covers both Hadoop output layouts.
pub fn parse_du_output(
    stdout: &str,
    noise_suffix: &str,
    command: &str,
) -> Result<Vec<CatalogEntry>, BackupError> {
    let mut entries = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        // Hadoop 1.x prints a "Found N items" banner before the records
        if line.is_empty() || line.starts_with("Found ") {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(BackupError::Parse {
                command: command.to_string(),
                line: line.to_string(),
                reason: "expected a size and a path".to_string(),
            });
        }

        let size_bytes = tokens[0].parse::<u64>().map_err(|e| BackupError::Parse {
            command: command.to_string(),
            line: line.to_string(),
            reason: format!("invalid size {:?}: {}", tokens[0], e),
        })?;
        let path = tokens[tokens.len() - 1];

        if !noise_suffix.is_empty() && last_segment(path).ends_with(noise_suffix) {
            debug!("Skipping noise entry {}", path);
            continue;
        }

        entries.push(CatalogEntry {
            path: path.to_string(),
            size_bytes,
        });
    }

    entries.sort_by_key(|entry| entry.size_bytes);
    Ok(entries)
}

/// Sum of the sizes of a listing.
pub fn total_size(entries: &[CatalogEntry]) -> u64 {
    entries.iter().map(|entry| entry.size_bytes).sum()
}
