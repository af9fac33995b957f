//! End-of-run reports for export and import

use super::export::{ExportFiles, Snapshot};
use super::import::{ImportSettings, Phase, PhaseResult};
use crate::error::Result;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "============================================================";

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[derive(Debug)]
pub struct ExportSummary {
    pub timestamp: String,
    pub tenant: String,
    pub include_mail_enabled: bool,
    pub groups: usize,
    pub members: usize,
    pub owners: usize,
    pub skipped_objects: usize,
    pub errors: usize,
    pub files: ExportFiles,
}

impl ExportSummary {
    pub fn new(
        timestamp: &str,
        tenant: &str,
        include_mail_enabled: bool,
        snapshot: &Snapshot,
        files: ExportFiles,
    ) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            tenant: tenant.to_string(),
            include_mail_enabled,
            groups: snapshot.groups.len(),
            members: snapshot.members.len(),
            owners: snapshot.owners.len(),
            skipped_objects: snapshot.skipped_objects,
            errors: snapshot.errors,
            files,
        }
    }

    pub fn file_name(&self) -> String {
        format!("ExportSummary_{}.txt", self.timestamp)
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        write_report(dir, &self.file_name(), &self.to_string())
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Security Group Export Summary")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Export Date:            {}", self.timestamp)?;
        writeln!(f, "Source Tenant:          {}", self.tenant)?;
        writeln!(f, "Include Mail-Enabled:   {}", yes_no(self.include_mail_enabled))?;
        writeln!(f)?;
        writeln!(f, "Security Groups:        {}", self.groups)?;
        writeln!(f, "Group Memberships:      {}", self.members)?;
        writeln!(f, "Group Ownerships:       {}", self.owners)?;
        writeln!(f, "Skipped Objects:        {}", self.skipped_objects)?;
        writeln!(f, "Errors:                 {}", self.errors)?;
        writeln!(f)?;
        writeln!(f, "Files:")?;
        writeln!(f, "  Groups:   {}", self.files.groups.display())?;
        writeln!(f, "  Members:  {}", self.files.members.display())?;
        writeln!(f, "  Owners:   {}", self.files.owners.display())?;
        write!(f, "{}", RULE)
    }
}

/// A requested phase that did not run
#[derive(Debug, Clone)]
pub struct SkippedPhase {
    pub phase: Phase,
    pub reason: String,
}

#[derive(Debug)]
pub struct ImportSummary {
    pub timestamp: String,
    pub tenant: String,
    pub settings: ImportSettings,
    pub groups_file: Option<PathBuf>,
    pub members_file: Option<PathBuf>,
    pub owners_file: Option<PathBuf>,
    pub phases: Vec<PhaseResult>,
    pub skipped_phases: Vec<SkippedPhase>,
}

impl ImportSummary {
    pub fn new(timestamp: &str, tenant: &str, settings: ImportSettings) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            tenant: tenant.to_string(),
            settings,
            groups_file: None,
            members_file: None,
            owners_file: None,
            phases: Vec::new(),
            skipped_phases: Vec::new(),
        }
    }

    /// Errors across all phases, counting each skipped phase once
    pub fn total_errors(&self) -> usize {
        self.phases.iter().map(|r| r.errors).sum::<usize>() + self.skipped_phases.len()
    }

    pub fn file_name(&self) -> String {
        format!("ImportSummary_{}.txt", self.timestamp)
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        write_report(dir, &self.file_name(), &self.to_string())
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not used)".to_string())
        };

        writeln!(f, "{}", RULE)?;
        writeln!(f, "Security Group Import Summary")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Import Date:            {}", self.timestamp)?;
        writeln!(f, "Destination Tenant:     {}", self.tenant)?;
        writeln!(f, "Preview Only:           {}", yes_no(self.settings.preview_only))?;
        writeln!(f, "Group Prefix:           {}", self.settings.prefix)?;
        writeln!(f, "Group Suffix:           {}", self.settings.suffix)?;
        writeln!(f, "Skip Existing:          {}", yes_no(self.settings.skip_existing))?;
        writeln!(f, "Continue On Error:      {}", yes_no(self.settings.continue_on_error))?;
        writeln!(f)?;
        writeln!(f, "Files:")?;
        writeln!(f, "  Groups:   {}", file(&self.groups_file))?;
        writeln!(f, "  Members:  {}", file(&self.members_file))?;
        writeln!(f, "  Owners:   {}", file(&self.owners_file))?;

        for result in &self.phases {
            writeln!(f)?;
            writeln!(f, "{}:", result.phase)?;
            writeln!(f, "  {:<12} {}", format!("{}:", result.phase.success_label()), result.succeeded)?;
            writeln!(f, "  {:<12} {}", "Skipped:", result.skipped)?;
            if self.settings.preview_only {
                writeln!(f, "  {:<12} {}", "Previewed:", result.previewed)?;
            }
            writeln!(f, "  {:<12} {}", "Errors:", result.errors)?;
            if result.aborted {
                writeln!(f, "  Stopped after first failure")?;
            }
        }

        for skipped in &self.skipped_phases {
            writeln!(f)?;
            writeln!(f, "{}: not run ({})", skipped.phase, skipped.reason)?;
        }

        writeln!(f)?;
        writeln!(f, "Total Errors:           {}", self.total_errors())?;
        write!(f, "{}", RULE)
    }
}

fn write_report(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, format!("{}\n", contents))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_summary_reports_phase_counts() {
        let mut summary = ImportSummary::new("20260114_093000", "gcch", ImportSettings::default());
        summary.groups_file = Some(PathBuf::from("in/SecurityGroups_1.csv"));

        let mut created = PhaseResult::new(Phase::CreateGroups);
        created.succeeded = 1;
        let mut members = PhaseResult::new(Phase::AddMembers);
        members.succeeded = 2;
        members.errors = 1;
        summary.phases = vec![created, members];
        summary.skipped_phases.push(SkippedPhase {
            phase: Phase::AddOwners,
            reason: "No owners file found".into(),
        });

        let text = summary.to_string();
        assert!(text.contains("Created:     1"), "{}", text);
        assert!(text.contains("MembersAdded: 2"), "{}", text);
        assert!(text.contains("Add owners: not run (No owners file found)"));
        assert!(text.contains("Members:  (not used)"));
        assert!(!text.contains("Previewed"));
        assert_eq!(summary.total_errors(), 2);
        assert_eq!(summary.phases[1].succeeded, 2);
    }

    #[test]
    fn test_summary_written_next_to_logs() {
        let dir = tempfile::tempdir().unwrap();
        let summary = ImportSummary::new("20260114_093000", "gcch", ImportSettings::default());
        let path = summary.write_to(dir.path()).unwrap();

        assert!(path.ends_with("ImportSummary_20260114_093000.txt"));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with(RULE));
        assert!(text.contains("Skip Existing:          Yes"));
    }
}
