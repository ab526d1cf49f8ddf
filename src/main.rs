use anyhow::Context;
use clap::Parser;
use hdfsync::{run_backup, BackupConfig, ShellRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hdfsync")]
#[command(about = "Reconcile an HDFS backup root with S3 and transfer what is missing", long_about = None)]
#[command(version)]
struct Args {
    /// HDFS backup root whose immediate children are the tables
    #[arg(short, long)]
    source_root: String,

    /// Destination prefix under the bucket (e.g. "2013.06.20")
    #[arg(short, long)]
    prefix: String,

    /// Destination S3 bucket
    #[arg(short, long, default_value = "companybook-backup")]
    bucket: String,

    /// Only print the reconciliation report, never transfer
    #[arg(long)]
    report_only: bool,

    /// Local staging directory
    #[arg(long, default_value = ".hdfsync.staging")]
    staging_dir: PathBuf,

    /// Maximum upload attempts per file
    #[arg(long, default_value_t = 50)]
    max_attempts: u32,

    /// Backoff unit between upload attempts (attempt n waits n times this)
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    backoff: Duration,

    /// Listing entries ending with this suffix are ignored
    #[arg(long, default_value = "_logs")]
    noise_suffix: String,

    /// Hadoop executable
    #[arg(long, default_value = "hadoop")]
    hadoop_bin: String,

    /// s3cmd executable
    #[arg(long, default_value = "s3cmd")]
    s3cmd_bin: String,

    /// Chat webhook receiving the run summary
    #[arg(long, env = "HDFSYNC_NOTIFY_WEBHOOK")]
    notify_webhook: Option<String>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hdfsync={}", log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 hdfsync - HDFS to S3 backup reconciliation");
    info!("Source root: {}", args.source_root);
    info!("Destination: s3://{}/{}", args.bucket, args.prefix);

    let config = BackupConfig {
        source_root: args.source_root,
        bucket: args.bucket,
        prefix: args.prefix,
        report_only: args.report_only,
        staging_dir: args.staging_dir,
        max_attempts: args.max_attempts,
        backoff_unit: args.backoff,
        noise_suffix: args.noise_suffix,
        hadoop_bin: args.hadoop_bin,
        s3cmd_bin: args.s3cmd_bin,
        notify_webhook: args.notify_webhook,
        show_progress: !args.no_progress && atty::is(atty::Stream::Stderr),
    };

    match run_backup(&ShellRunner, &config).await {
        Ok(outcome) => {
            info!(
                "✅ Finished: {} files transferred, {} still missing",
                outcome.transfers,
                outcome
                    .after
                    .as_ref()
                    .unwrap_or(&outcome.before)
                    .total
                    .missing_count()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Backup aborted: {}", e);
            Err(e).context(format!("backup of {} failed", config.source_root))
        }
    }
}
