//! Destination index built from `s3cmd ls`.

use crate::catalog::last_segment;
use crate::error::BackupError;
use crate::shell::{command_line, run_checked, CommandRunner};
use crate::types::BackupConfig;
use std::collections::HashMap;
use tracing::{debug, info};

/// Snapshot of what already exists at the destination for one table.
///
/// An index is only meaningful for the table it was built for; it is rebuilt
/// for every table and never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationIndex {
    table: String,
    sizes: HashMap<String, u64>,
}

impl DestinationIndex {
    /// Lists the destination directory of `table` and indexes it by file name.
    ///
    /// A failed listing is fatal: an unreadable prefix must not be mistaken
    /// for an empty one.
    pub async fn build<R: CommandRunner>(
        runner: &R,
        config: &BackupConfig,
        table: &str,
    ) -> Result<Self, BackupError> {
        let url = config.destination_dir(table);
        info!("Indexing destination {}", url);
        let args = vec!["ls".to_string(), url];
        let stdout = run_checked(runner, &config.s3cmd_bin, &args).await?;
        Self::parse(table, &stdout, &command_line(&config.s3cmd_bin, &args))
    }

    /// Parses `s3cmd ls` output: `date time size path` per object.
    pub fn parse(table: &str, stdout: &str, command: &str) -> Result<Self, BackupError> {
        let mut sizes = HashMap::new();

        for line in stdout.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 {
                if !tokens.is_empty() {
                    debug!("Ignoring destination record {:?}", line.trim());
                }
                continue;
            }

            let size = tokens[2].parse::<u64>().map_err(|e| BackupError::Parse {
                command: command.to_string(),
                line: line.trim().to_string(),
                reason: format!("invalid size {:?}: {}", tokens[2], e),
            })?;
            sizes.insert(last_segment(tokens[3]).to_string(), size);
        }

        Ok(Self {
            table: table.to_string(),
            sizes,
        })
    }

    /// Builds an index directly from `(name, size)` pairs.
    pub fn from_entries<I, S>(table: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            table: table.to_string(),
            sizes: entries
                .into_iter()
                .map(|(name, size)| (name.into(), size))
                .collect(),
        }
    }

    /// The table this index describes.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Destination size of `name`, or `None` if it is not present.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}
