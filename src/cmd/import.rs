use crate::cmd::connect::connect;
use crate::config::ConfigManager;
use crate::error::{GroupSyncError, Result};
use crate::graph::directory::{Directory, Relation};
use crate::logging::{self, RunLogs};
use crate::migration::dataset::{self, Dataset};
use crate::migration::import::{
    converge_relations, create_groups, ImportSettings, Phase, PhaseResult,
};
use crate::migration::model::GroupRecord;
use crate::migration::summary::{ImportSummary, SkippedPhase};
use clap::{ArgAction, Args};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory holding the exported CSV files
    #[arg(short, long, default_value = "./GroupExport")]
    pub import_dir: PathBuf,

    /// Groups file (defaults to the newest SecurityGroups_*.csv)
    #[arg(long)]
    pub groups_file: Option<PathBuf>,

    /// Members file (defaults to the newest SecurityGroupMembers_*.csv)
    #[arg(long)]
    pub members_file: Option<PathBuf>,

    /// Owners file (defaults to the newest SecurityGroupOwners_*.csv)
    #[arg(long)]
    pub owners_file: Option<PathBuf>,

    /// Create the exported groups
    #[arg(long)]
    pub create_groups: bool,

    /// Add the exported owners to their groups
    #[arg(long)]
    pub add_owners: bool,

    /// Add the exported members to their groups
    #[arg(long)]
    pub add_members: bool,

    /// Run all three phases
    #[arg(long)]
    pub all: bool,

    /// Resolve and log every decision without changing the tenant
    #[arg(long)]
    pub preview: bool,

    /// Sign in automatically when no cached token is available
    #[arg(long)]
    pub connect: bool,

    /// Prepended to every group display name
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Appended to every group display name
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Skip groups that already exist in the destination
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub skip_existing: bool,

    /// Keep going after a failed create/add
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub continue_on_error: bool,

    /// Pause after each created group (defaults to config, then 2)
    #[arg(long)]
    pub settle_seconds: Option<u64>,

    /// Destination tenant (defaults to active tenant)
    #[arg(long)]
    pub tenant: Option<String>,

    /// Directory for run logs (defaults to log_dir in config.toml, then the data directory)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Phases requested on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSelection {
    pub create_groups: bool,
    pub add_owners: bool,
    pub add_members: bool,
}

impl PhaseSelection {
    pub fn all() -> Self {
        Self {
            create_groups: true,
            add_owners: true,
            add_members: true,
        }
    }

    fn from_args(args: &ImportArgs) -> Result<Self> {
        let selection = if args.all {
            Self::all()
        } else {
            Self {
                create_groups: args.create_groups,
                add_owners: args.add_owners,
                add_members: args.add_members,
            }
        };

        if !(selection.create_groups || selection.add_owners || selection.add_members) {
            return Err(GroupSyncError::InvalidConfig(
                "No import phase selected. Use --create-groups, --add-owners, --add-members or --all"
                    .into(),
            ));
        }

        Ok(selection)
    }
}

/// Input files for an import; `None` when nothing was found
#[derive(Debug, Clone, Default)]
pub struct InputFiles {
    pub groups: Option<PathBuf>,
    pub members: Option<PathBuf>,
    pub owners: Option<PathBuf>,
}

impl InputFiles {
    /// Explicit paths win; otherwise the newest matching file in `import_dir`
    pub fn discover(
        import_dir: &Path,
        groups: Option<PathBuf>,
        members: Option<PathBuf>,
        owners: Option<PathBuf>,
    ) -> Result<Self> {
        let pick = |explicit: Option<PathBuf>, kind: Dataset| -> Result<Option<PathBuf>> {
            match explicit {
                Some(path) => Ok(Some(path)),
                None => dataset::find_latest(import_dir, kind),
            }
        };

        Ok(Self {
            groups: pick(groups, Dataset::Groups)?,
            members: pick(members, Dataset::Members)?,
            owners: pick(owners, Dataset::Owners)?,
        })
    }

    fn path(&self, kind: Dataset) -> Option<&Path> {
        match kind {
            Dataset::Groups => self.groups.as_deref(),
            Dataset::Members => self.members.as_deref(),
            Dataset::Owners => self.owners.as_deref(),
        }
    }
}

/// Run the selected phases in order: groups, owners, members
///
/// A phase whose input file is missing or unreadable is recorded as skipped
/// and the remaining phases still run.
pub async fn run_phases(
    directory: &dyn Directory,
    phases: PhaseSelection,
    inputs: &InputFiles,
    summary: &mut ImportSummary,
) {
    summary.groups_file = inputs.groups.clone();
    summary.members_file = inputs.members.clone();
    summary.owners_file = inputs.owners.clone();
    let settings = summary.settings.clone();

    let groups = match inputs.path(Dataset::Groups) {
        Some(path) => load(path, Dataset::Groups, dataset::read_groups),
        None => Err(GroupSyncError::MissingInput(Dataset::Groups.label().into())),
    };

    if phases.create_groups {
        println!("\n{}", Phase::CreateGroups.to_string().cyan().bold());
        match &groups {
            Ok(records) => record(summary, create_groups(directory, records, &settings).await),
            Err(e) => skip_phase(summary, Phase::CreateGroups, e),
        }
    }

    // Mail nicknames from the groups file are only a fallback key here
    let nicknames: &[GroupRecord] = groups.as_deref().unwrap_or_default();

    for (selected, phase, relation, kind) in [
        (phases.add_owners, Phase::AddOwners, Relation::Owner, Dataset::Owners),
        (phases.add_members, Phase::AddMembers, Relation::Member, Dataset::Members),
    ] {
        if !selected {
            continue;
        }
        println!("\n{}", phase.to_string().cyan().bold());

        let edges = match inputs.path(kind) {
            Some(path) => load(path, kind, |p| match relation {
                Relation::Owner => dataset::read_owners(p),
                Relation::Member => dataset::read_members(p),
            }),
            None => Err(GroupSyncError::MissingInput(kind.label().into())),
        };

        match edges {
            Ok(edges) => record(
                summary,
                converge_relations(directory, relation, &edges, nicknames, &settings).await,
            ),
            Err(e) => skip_phase(summary, phase, &e),
        }
    }
}

fn load<T>(path: &Path, kind: Dataset, read: impl Fn(&Path) -> Result<Vec<T>>) -> Result<Vec<T>> {
    let rows = read(path)?;
    logging::info(&format!(
        "Loaded {} {} record(s) from {}",
        rows.len(),
        kind.label(),
        path.display()
    ));
    Ok(rows)
}

fn record(summary: &mut ImportSummary, result: PhaseResult) {
    tracing::info!(
        phase = %result.phase,
        succeeded = result.succeeded,
        skipped = result.skipped,
        previewed = result.previewed,
        errors = result.errors,
        aborted = result.aborted,
        "Phase finished"
    );
    summary.phases.push(result);
}

fn skip_phase(summary: &mut ImportSummary, phase: Phase, error: &GroupSyncError) {
    logging::error(&format!("Skipping '{}': {}", phase, error));
    summary.skipped_phases.push(SkippedPhase {
        phase,
        reason: error.to_string(),
    });
}

pub async fn import(args: ImportArgs, verbose: bool) -> Result<()> {
    let phases = PhaseSelection::from_args(&args)?;
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config()?;
    let verbose = verbose || config.log_level.eq_ignore_ascii_case("debug");

    let timestamp = dataset::run_timestamp();
    let log_dir = match args.log_dir.clone() {
        Some(dir) => dir,
        None => config_manager.log_dir()?,
    };
    let logs = logging::init_run_logging(&log_dir, "GroupImport", &timestamp, verbose)?;

    let settle_seconds = args
        .settle_seconds
        .or(config.settle_seconds)
        .unwrap_or(crate::config::DEFAULT_SETTLE_SECONDS);
    let settings = ImportSettings {
        prefix: args.prefix.clone(),
        suffix: args.suffix.clone(),
        preview_only: args.preview,
        skip_existing: args.skip_existing,
        continue_on_error: args.continue_on_error,
        settle_delay: Duration::from_secs(settle_seconds),
    };

    logging::log_failure(
        run_import(&args, phases, settings, &config_manager, &timestamp, &log_dir, &logs).await,
    )
}

async fn run_import(
    args: &ImportArgs,
    phases: PhaseSelection,
    settings: ImportSettings,
    config_manager: &ConfigManager,
    timestamp: &str,
    log_dir: &Path,
    logs: &RunLogs,
) -> Result<()> {
    println!("\n{}", "Security Group Import".cyan().bold());
    println!("{}", "─".repeat(60));
    if settings.preview_only {
        logging::warn("PREVIEW MODE: no changes will be made to the destination tenant");
    }

    let connection = connect(config_manager, args.tenant.as_deref(), args.connect).await?;
    let inputs = InputFiles::discover(
        &args.import_dir,
        args.groups_file.clone(),
        args.members_file.clone(),
        args.owners_file.clone(),
    )?;

    let mut summary = ImportSummary::new(timestamp, &connection.tenant.name, settings);
    run_phases(&connection.client, phases, &inputs, &mut summary).await;

    let summary_path = summary.write_to(log_dir)?;
    println!("\n{}", summary);
    logging::info(&format!("Summary written to {}", summary_path.display()));
    logging::info(&format!("Log file: {}", logs.main_log.display()));

    let errors = summary.total_errors();
    tracing::info!(
        skipped_phases = summary.skipped_phases.len(),
        total_errors = errors,
        "Import finished"
    );
    if errors > 0 {
        logging::warn(&format!(
            "Import finished with {} error(s); see {}",
            errors,
            logs.error_log.display()
        ));
    } else {
        logging::success("Import completed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ImportArgs,
    }

    fn parse(argv: &[&str]) -> ImportArgs {
        let mut full = vec!["import"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn test_switch_defaults() {
        let args = parse(&["--all"]);
        assert!(args.skip_existing);
        assert!(args.continue_on_error);
        assert!(!args.preview);
        assert_eq!(PhaseSelection::from_args(&args).unwrap(), PhaseSelection::all());

        let args = parse(&["--add-members", "--skip-existing", "false", "--continue-on-error", "false"]);
        assert!(!args.skip_existing);
        assert!(!args.continue_on_error);
        let phases = PhaseSelection::from_args(&args).unwrap();
        assert!(phases.add_members && !phases.create_groups && !phases.add_owners);
    }

    #[test]
    fn test_no_phase_selected_is_rejected() {
        let err = PhaseSelection::from_args(&parse(&["--preview"])).unwrap_err();
        assert!(matches!(err, GroupSyncError::InvalidConfig(_)));
    }

    #[test]
    fn test_discover_prefers_explicit_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SecurityGroups_20260101_000000.csv"), "x").unwrap();

        let explicit = dir.path().join("custom-owners.csv");
        let inputs = InputFiles::discover(dir.path(), None, None, Some(explicit.clone())).unwrap();

        assert_eq!(
            inputs.groups,
            Some(dir.path().join("SecurityGroups_20260101_000000.csv"))
        );
        assert_eq!(inputs.members, None);
        assert_eq!(inputs.owners, Some(explicit));
    }
}
