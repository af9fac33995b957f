use crate::cmd::connect::connect;
use crate::config::ConfigManager;
use crate::error::Result;
use crate::logging::{self, RunLogs};
use crate::migration::dataset;
use crate::migration::export::{take_snapshot, write_snapshot};
use crate::migration::summary::ExportSummary;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory for the exported CSV files
    #[arg(short, long, default_value = "./GroupExport")]
    pub output_dir: PathBuf,

    /// Sign in automatically when no cached token is available
    #[arg(long)]
    pub connect: bool,

    /// Also export mail-enabled security groups
    #[arg(long)]
    pub include_mail_enabled: bool,

    /// Source tenant (defaults to active tenant)
    #[arg(long)]
    pub tenant: Option<String>,

    /// Directory for run logs (defaults to log_dir in config.toml, then the data directory)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

pub async fn export(args: ExportArgs, verbose: bool) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let verbose = verbose || config_manager.load_config()?.log_level.eq_ignore_ascii_case("debug");
    let timestamp = dataset::run_timestamp();
    let log_dir = match args.log_dir.clone() {
        Some(dir) => dir,
        None => config_manager.log_dir()?,
    };
    let logs = logging::init_run_logging(&log_dir, "GroupExport", &timestamp, verbose)?;

    logging::log_failure(run_export(&args, &config_manager, &timestamp, &logs).await)
}

async fn run_export(
    args: &ExportArgs,
    config_manager: &ConfigManager,
    timestamp: &str,
    logs: &RunLogs,
) -> Result<()> {
    println!("\n{}", "Security Group Export".cyan().bold());
    println!("{}", "─".repeat(60));

    let connection = connect(config_manager, args.tenant.as_deref(), args.connect).await?;
    let snapshot = take_snapshot(&connection.client, args.include_mail_enabled).await?;
    let files = write_snapshot(&args.output_dir, timestamp, &snapshot)?;

    let summary = ExportSummary::new(
        timestamp,
        &connection.tenant.name,
        args.include_mail_enabled,
        &snapshot,
        files,
    );
    let summary_path = summary.write_to(&args.output_dir)?;

    println!("\n{}", summary);
    tracing::info!(
        groups = summary.groups,
        members = summary.members,
        owners = summary.owners,
        skipped_objects = summary.skipped_objects,
        errors = summary.errors,
        "Export finished"
    );
    logging::info(&format!("Summary written to {}", summary_path.display()));
    logging::info(&format!("Log file: {}", logs.main_log.display()));

    if summary.errors > 0 {
        logging::warn(&format!(
            "{} group(s) could not be fully exported; see {}",
            summary.errors,
            logs.error_log.display()
        ));
    } else {
        logging::success("Export completed");
    }

    Ok(())
}
