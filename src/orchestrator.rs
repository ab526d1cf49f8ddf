//! Main orchestration logic for a backup run.

use crate::catalog::{list_catalog, total_size};
use crate::destination::DestinationIndex;
use crate::error::BackupError;
use crate::format::format_size;
use crate::notify::Notifier;
use crate::reconcile::decide;
use crate::report::{Report, ReportLine, ReportSummary};
use crate::shell::CommandRunner;
use crate::transfer::{Transferer, LOGS_ENTRY};
use crate::types::{BackupConfig, FileUnit, PassMode, RunState, TableUnit};
use std::collections::HashSet;
use tracing::{debug, info};

/// What a backup run observed and did.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Tables found under the source root, ascending by size.
    pub tables: Vec<TableUnit>,
    /// Aggregate size of the source root.
    pub total_source_bytes: u64,
    /// Report of the initial dry-run pass.
    pub before: ReportSummary,
    /// Report of the execute pass, if one ran.
    pub execution: Option<ReportSummary>,
    /// Report of the pass after execution, if one ran.
    pub after: Option<ReportSummary>,
    /// Number of files uploaded.
    pub transfers: usize,
}

/// Report and transfer count of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    pub report: Report,
    pub transfers: usize,
}

/// Reconciles the backup root against the destination and, unless the run is
/// report-only or nothing is missing, transfers what is missing.
///
/// The flow is: list the tables, reconcile every table without transferring,
/// transfer the missing and mismatched files of every table that is out of
/// sync, then reconcile again so the final report shows convergence. Any
/// fatal error aborts the whole run; re-running is safe because files that
/// are already in sync are skipped.
///
/// # Example
///
/// ```no_run
/// use hdfsync::{run_backup, BackupConfig, ShellRunner};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BackupConfig {
///     source_root: "/user/xxx/BACKUP".to_string(),
///     prefix: "2013.06.20".to_string(),
///     ..BackupConfig::default()
/// };
/// let outcome = run_backup(&ShellRunner, &config).await?;
/// println!("{}", outcome.before);
/// # Ok(())
/// # }
/// ```
pub async fn run_backup<R: CommandRunner>(
    runner: &R,
    config: &BackupConfig,
) -> Result<RunOutcome, BackupError> {
    config.validate()?;
    let notifier = Notifier::new(config.notify_webhook.clone());
    let mut state = RunState::Idle;

    enter(&mut state, RunState::Listing);
    let tables: Vec<TableUnit> = list_catalog(runner, config, &config.source_root)
        .await?
        .into_iter()
        .map(TableUnit::from)
        .collect();
    let total_source_bytes = tables.iter().map(|t| t.size_bytes).sum();
    info!(
        "📦 {} holds {} in {} tables",
        config.source_root,
        format_size(total_source_bytes),
        tables.len()
    );
    for table in &tables {
        debug!("Table {} - {}", table.path, format_size(table.size_bytes));
    }

    enter(&mut state, RunState::DryRunReport);
    let dry_run = reconcile_pass(runner, config, &tables, PassMode::DryRun, None).await?;
    let before = dry_run.report.summary();
    info!("📊 Reconciliation report:\n{}", before.render());

    if config.report_only || before.total.missing_count() == 0 {
        if config.report_only {
            info!("Report-only run, nothing transferred");
        } else {
            info!("✅ Destination already holds everything");
        }
        enter(&mut state, RunState::Done);
        notifier
            .notify(
                &format!("Backup report for {}", config.prefix),
                &before.render(),
            )
            .await;
        return Ok(RunOutcome {
            tables,
            total_source_bytes,
            before,
            execution: None,
            after: None,
            transfers: 0,
        });
    }

    enter(&mut state, RunState::Executing);
    let pending: HashSet<String> = before.out_of_sync().map(|t| t.table.clone()).collect();
    info!(
        "🚀 Transferring {} in {} files across {} tables",
        format_size(before.total.missing_bytes),
        before.total.missing_count(),
        pending.len()
    );
    let executed =
        reconcile_pass(runner, config, &tables, PassMode::Execute, Some(&pending)).await?;
    let execution = executed.report.summary();

    enter(&mut state, RunState::FinalReport);
    let final_pass = reconcile_pass(runner, config, &tables, PassMode::DryRun, None).await?;
    let after = final_pass.report.summary();
    info!(
        "📊 Final report after {} transfers in {:.1}s:\n{}",
        executed.transfers,
        execution.total.transfer_seconds,
        after.render()
    );

    enter(&mut state, RunState::Done);
    notifier
        .notify(
            &format!("Backup of {} to {}", config.source_root, config.prefix),
            &format!(
                "Before:\n{}\n\nAfter:\n{}",
                before.render(),
                after.render()
            ),
        )
        .await;

    Ok(RunOutcome {
        tables,
        total_source_bytes,
        before,
        execution: Some(execution),
        after: Some(after),
        transfers: executed.transfers,
    })
}

/// Walks `tables`, reconciling every file against its table's destination
/// index. In [`PassMode::Execute`] every file that is not in sync is
/// transferred. When `only` is given, tables outside it are skipped.
pub async fn reconcile_pass<R: CommandRunner>(
    runner: &R,
    config: &BackupConfig,
    tables: &[TableUnit],
    mode: PassMode,
    only: Option<&HashSet<String>>,
) -> Result<PassOutcome, BackupError> {
    let transferer = Transferer::new(runner, config);
    let mut outcome = PassOutcome::default();
    let pb = progress_bar(config, mode, tables.len());

    for table in tables {
        if let Some(only) = only {
            if !only.contains(&table.name) {
                debug!("Skipping {}, already in sync", table.name);
                pb.inc(1);
                continue;
            }
        }

        pb.set_message(format!("| {}", table.name));
        outcome.report.touch(&table.name);

        let entries = list_catalog(runner, config, &table.path).await?;
        debug!(
            "{} has {} files, {}",
            table.name,
            entries.len(),
            format_size(total_size(&entries))
        );
        let index = DestinationIndex::build(runner, config, &table.name).await?;

        for file in entries.into_iter().map(FileUnit::from) {
            let decision = decide(&file, &index);
            let mut transfer_seconds = 0.0;

            if mode == PassMode::Execute && decision.needs_transfer() {
                pb.set_message(format!("| {}/{}", table.name, file.name));
                transfer_seconds = transferer.transfer(&file, &table.name).await?;
                if file.name != LOGS_ENTRY {
                    outcome.transfers += 1;
                }
            }

            outcome.report.record(ReportLine {
                table: table.name.clone(),
                file: file.name.clone(),
                source_size: file.size_bytes,
                dest_size: decision.dest_size(file.size_bytes),
                transfer_seconds,
            });
        }

        if mode == PassMode::Execute {
            transferer.finish_table(&table.name).await;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(outcome)
}

fn enter(state: &mut RunState, next: RunState) {
    debug!("{:?} -> {:?}", state, next);
    *state = next;
}

fn progress_bar(config: &BackupConfig, mode: PassMode, tables: usize) -> indicatif::ProgressBar {
    if !config.show_progress || mode != PassMode::Execute {
        return indicatif::ProgressBar::hidden();
    }

    let pb = indicatif::ProgressBar::new(tables as u64);
    if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} tables {msg} | {elapsed_precise} elapsed",
    ) {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::CommandOutput;

    /// Answers listings only; any transfer attempt is a test failure.
    struct ListingRunner;

    impl CommandRunner for ListingRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, BackupError> {
            let target = args.last().map(String::as_str).unwrap_or_default();
            match (program, target) {
                ("hadoop", "/user/xxx/BACKUP") => Ok(CommandOutput::ok(
                    "2500 /user/xxx/BACKUP/table-1\n7 /user/xxx/BACKUP/table-1_logs\n",
                )),
                ("hadoop", "/user/xxx/BACKUP/table-1") => Ok(CommandOutput::ok(
                    "1500 /user/xxx/BACKUP/table-1/part-1\n1000 /user/xxx/BACKUP/table-1/part-2\n",
                )),
                ("s3cmd", "s3://companybook-backup/2013.06.20/table-1/") => Ok(CommandOutput::ok(
                    "2013-06-20 10:01 1500 s3://companybook-backup/2013.06.20/table-1/part-1\n",
                )),
                _ => panic!("unexpected command {} {:?}", program, args),
            }
        }
    }

    fn config() -> BackupConfig {
        BackupConfig {
            source_root: "/user/xxx/BACKUP".to_string(),
            prefix: "2013.06.20".to_string(),
            report_only: true,
            ..BackupConfig::default()
        }
    }

    #[tokio::test]
    async fn test_report_only_run_reports_missing_bytes() {
        let outcome = run_backup(&ListingRunner, &config()).await.unwrap();

        assert_eq!(outcome.tables.len(), 1);
        assert_eq!(outcome.total_source_bytes, 2500);
        assert_eq!(outcome.transfers, 0);
        assert!(outcome.execution.is_none());

        let table = outcome.before.table("table-1").unwrap();
        assert_eq!(table.missing_bytes, 1000);
        assert_eq!(table.missing_files, vec!["part-2".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_pass_never_transfers() {
        let tables = vec![TableUnit {
            name: "table-1".to_string(),
            path: "/user/xxx/BACKUP/table-1".to_string(),
            size_bytes: 2500,
        }];
        let pass = reconcile_pass(&ListingRunner, &config(), &tables, PassMode::DryRun, None)
            .await
            .unwrap();

        assert_eq!(pass.transfers, 0);
        assert_eq!(pass.report.lines("table-1").len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_listing() {
        let config = BackupConfig {
            source_root: String::new(),
            ..config()
        };
        let err = run_backup(&ListingRunner, &config).await.unwrap_err();
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }
}
