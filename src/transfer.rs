//! Staged transfer of one file from HDFS to S3.

use crate::error::BackupError;
use crate::format::format_size;
use crate::retry::{retry, RetryPolicy};
use crate::shell::{run_checked, CommandRunner};
use crate::types::{BackupConfig, FileUnit};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the Hadoop job-metadata entry that is never backed up.
pub const LOGS_ENTRY: &str = "_logs";

/// Moves files through the local staging area into the destination.
pub struct Transferer<'a, R> {
    runner: &'a R,
    config: &'a BackupConfig,
    policy: RetryPolicy,
}

impl<'a, R: CommandRunner> Transferer<'a, R> {
    pub fn new(runner: &'a R, config: &'a BackupConfig) -> Self {
        Self {
            runner,
            config,
            policy: RetryPolicy::new(config.max_attempts, config.backoff_unit),
        }
    }

    /// Stages `file`, uploads it under the retry policy and removes the staged
    /// copy. Returns the elapsed wall-clock seconds.
    ///
    /// Staging failures are fatal immediately; upload failures are fatal once
    /// the policy is exhausted. The staged copy is removed in every case.
    pub async fn transfer(&self, file: &FileUnit, table: &str) -> Result<f64, BackupError> {
        if file.name == LOGS_ENTRY {
            debug!("Skipping {}", file.path);
            return Ok(0.0);
        }

        let staging = self.config.staging_for(table);
        tokio::fs::create_dir_all(&staging).await?;
        let local = staging.join(&file.name);
        // leftovers from an aborted run would make copyToLocal refuse
        remove_staged(&local).await;

        let started = Instant::now();
        let result = self.stage_and_upload(file, table, &staging, &local).await;
        remove_staged(&local).await;
        result?;

        let elapsed = started.elapsed();
        let seconds = elapsed.as_secs_f64();
        let took = humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64));
        if seconds > 0.0 {
            let rate = (file.size_bytes as f64 / seconds) as u64;
            info!(
                "✅ Transferred {} ({}) in {} at {}/s",
                file.name,
                format_size(file.size_bytes),
                took,
                format_size(rate)
            );
        } else {
            info!("✅ Transferred {} ({})", file.name, format_size(file.size_bytes));
        }
        Ok(seconds)
    }

    /// Removes the table's staging subdirectory if nothing is left in it.
    pub async fn finish_table(&self, table: &str) {
        let staging = self.config.staging_for(table);
        match tokio::fs::remove_dir(&staging).await {
            Ok(()) => debug!("Removed staging directory {}", staging.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove staging directory {}: {}",
                staging.display(),
                e
            ),
        }
    }

    async fn stage_and_upload(
        &self,
        file: &FileUnit,
        table: &str,
        staging: &Path,
        local: &Path,
    ) -> Result<(), BackupError> {
        info!("⬇️  Staging {} into {}", file.path, staging.display());
        let stage_args = vec![
            "fs".to_string(),
            "-copyToLocal".to_string(),
            file.path.clone(),
            staging.display().to_string(),
        ];
        run_checked(self.runner, &self.config.hadoop_bin, &stage_args).await?;

        let target = self.config.destination_file(table, &file.name);
        info!("⬆️  Uploading {} to {}", file.name, target);
        let upload_args = vec![
            "--no-encrypt".to_string(),
            "put".to_string(),
            local.display().to_string(),
            target.clone(),
        ];
        let context = format!("Upload of {} to {}", file.path, target);

        let runner = self.runner;
        let s3cmd = self.config.s3cmd_bin.as_str();
        let upload_args = upload_args.as_slice();
        retry(&self.policy, &context, |_| async move {
            run_checked(runner, s3cmd, upload_args).await.map(|_| ())
        })
        .await
    }
}

async fn remove_staged(local: &Path) {
    match tokio::fs::remove_file(local).await {
        Ok(()) => debug!("Removed staged copy {}", local.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove staged copy {}: {}", local.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::CommandOutput;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Stages by writing the file into the target directory and fails the
    /// first `upload_failures` uploads.
    struct StagingRunner {
        upload_failures: u32,
        stage_fails: bool,
        calls: Mutex<Vec<String>>,
        staged_seen: Mutex<Vec<bool>>,
    }

    impl StagingRunner {
        fn new(upload_failures: u32) -> Self {
            Self {
                upload_failures,
                stage_fails: false,
                calls: Mutex::new(Vec::new()),
                staged_seen: Mutex::new(Vec::new()),
            }
        }

        fn uploads(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == "put")
                .count()
        }
    }

    impl CommandRunner for StagingRunner {
        async fn run(&self, _: &str, args: &[String]) -> Result<CommandOutput, BackupError> {
            if args[1] == "-copyToLocal" {
                self.calls.lock().unwrap().push("stage".to_string());
                if self.stage_fails {
                    return Ok(CommandOutput::failed(1, "copyToLocal: Could not obtain block"));
                }
                let name = crate::catalog::last_segment(&args[2]);
                std::fs::write(Path::new(&args[3]).join(name), b"payload")?;
                return Ok(CommandOutput::ok(""));
            }

            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push("put".to_string());
                calls.iter().filter(|c| c.as_str() == "put").count() as u32
            };
            self.staged_seen
                .lock()
                .unwrap()
                .push(Path::new(&args[2]).exists());
            if attempt <= self.upload_failures {
                Ok(CommandOutput::failed(1, "connection reset"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        }
    }

    fn config(staging: &TempDir, max_attempts: u32) -> BackupConfig {
        BackupConfig {
            source_root: "/user/xxx/BACKUP".to_string(),
            prefix: "2013.06.20".to_string(),
            staging_dir: staging.path().to_path_buf(),
            max_attempts,
            backoff_unit: Duration::from_millis(1),
            ..BackupConfig::default()
        }
    }

    fn part(name: &str) -> FileUnit {
        FileUnit {
            name: name.to_string(),
            path: format!("/user/xxx/BACKUP/table-1/{}", name),
            size_bytes: 1000,
        }
    }

    #[tokio::test]
    async fn test_transfer_cleans_up_staged_copy() {
        let staging = TempDir::new().unwrap();
        let config = config(&staging, 3);
        let runner = StagingRunner::new(1);
        let transferer = Transferer::new(&runner, &config);

        let seconds = transferer.transfer(&part("part-2"), "table-1").await.unwrap();

        assert!(seconds >= 0.0);
        assert_eq!(runner.uploads(), 2);
        assert!(runner.staged_seen.lock().unwrap().iter().all(|seen| *seen));
        assert!(!staging.path().join("table-1/part-2").exists());

        transferer.finish_table("table-1").await;
        assert!(!staging.path().join("table-1").exists());
    }

    #[tokio::test]
    async fn test_exhausted_upload_is_fatal_and_cleans_up() {
        let staging = TempDir::new().unwrap();
        let config = config(&staging, 3);
        let runner = StagingRunner::new(u32::MAX);
        let transferer = Transferer::new(&runner, &config);

        let err = transferer
            .transfer(&part("part-1"), "table-1")
            .await
            .unwrap_err();

        assert_eq!(runner.uploads(), 3);
        match err {
            BackupError::RetriesExhausted {
                context, attempts, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(context.contains("/user/xxx/BACKUP/table-1/part-1"));
                assert!(context.contains("s3://companybook-backup/2013.06.20/table-1/part-1"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!staging.path().join("table-1/part-1").exists());
    }

    #[tokio::test]
    async fn test_staging_failure_is_fatal_without_retry() {
        let staging = TempDir::new().unwrap();
        let config = config(&staging, 3);
        let runner = StagingRunner {
            stage_fails: true,
            ..StagingRunner::new(0)
        };
        let transferer = Transferer::new(&runner, &config);

        let err = transferer
            .transfer(&part("part-1"), "table-1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BackupError::CommandFailed {
                status: Some(1),
                ..
            }
        ));
        assert_eq!(*runner.calls.lock().unwrap(), vec!["stage".to_string()]);
        assert_eq!(runner.uploads(), 0);
        assert!(!staging.path().join("table-1/part-1").exists());
    }

    #[tokio::test]
    async fn test_logs_entry_is_never_transferred() {
        let staging = TempDir::new().unwrap();
        let config = config(&staging, 3);
        let runner = StagingRunner::new(0);
        let transferer = Transferer::new(&runner, &config);

        let seconds = transferer.transfer(&part(LOGS_ENTRY), "table-1").await.unwrap();

        assert_eq!(seconds, 0.0);
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
