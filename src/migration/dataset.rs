//! Tabular (CSV) storage for the three export datasets
//!
//! Files are UTF-8 with a header row and carry the export timestamp in
//! their name, e.g. `SecurityGroupMembers_20260114_093000.csv`.

use super::model::{de_opt_string, Edge, GroupRecord, MemberType};
use crate::error::{GroupSyncError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Timestamp pattern embedded in file names (`yyyyMMdd_HHmmss`)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The three datasets an export produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Groups,
    Members,
    Owners,
}

impl Dataset {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Dataset::Groups => "SecurityGroups_",
            Dataset::Members => "SecurityGroupMembers_",
            Dataset::Owners => "SecurityGroupOwners_",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Groups => "groups",
            Dataset::Members => "members",
            Dataset::Owners => "owners",
        }
    }

    pub fn file_name(&self, timestamp: &str) -> String {
        format!("{}{}.csv", self.file_prefix(), timestamp)
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(self.file_prefix())
            && file_name.to_ascii_lowercase().ends_with(".csv")
    }
}

pub fn run_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MemberRow {
    group_name: String,
    group_source_object_id: String,
    member_type: MemberType,
    member_display_name: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    member_principal_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    member_mail_nickname: Option<String>,
    member_source_object_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OwnerRow {
    group_name: String,
    group_source_object_id: String,
    owner_type: MemberType,
    owner_display_name: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    owner_principal_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    owner_mail_nickname: Option<String>,
    owner_source_object_id: String,
}

impl From<&Edge> for MemberRow {
    fn from(edge: &Edge) -> Self {
        Self {
            group_name: edge.group_name.clone(),
            group_source_object_id: edge.group_source_object_id.clone(),
            member_type: edge.member_type,
            member_display_name: edge.display_name.clone(),
            member_principal_name: edge.principal_name.clone(),
            member_mail_nickname: edge.mail_nickname.clone(),
            member_source_object_id: edge.source_object_id.clone(),
        }
    }
}

impl From<MemberRow> for Edge {
    fn from(row: MemberRow) -> Self {
        Self {
            group_name: row.group_name,
            group_source_object_id: row.group_source_object_id,
            member_type: row.member_type,
            display_name: row.member_display_name,
            principal_name: row.member_principal_name,
            mail_nickname: row.member_mail_nickname,
            source_object_id: row.member_source_object_id,
        }
    }
}

impl From<&Edge> for OwnerRow {
    fn from(edge: &Edge) -> Self {
        Self {
            group_name: edge.group_name.clone(),
            group_source_object_id: edge.group_source_object_id.clone(),
            owner_type: edge.member_type,
            owner_display_name: edge.display_name.clone(),
            owner_principal_name: edge.principal_name.clone(),
            owner_mail_nickname: edge.mail_nickname.clone(),
            owner_source_object_id: edge.source_object_id.clone(),
        }
    }
}

impl From<OwnerRow> for Edge {
    fn from(row: OwnerRow) -> Self {
        Self {
            group_name: row.group_name,
            group_source_object_id: row.group_source_object_id,
            member_type: row.owner_type,
            display_name: row.owner_display_name,
            principal_name: row.owner_principal_name,
            mail_nickname: row.owner_mail_nickname,
            source_object_id: row.owner_source_object_id,
        }
    }
}

const GROUP_COLUMNS: &[&str] = &[
    "DisplayName",
    "Description",
    "SourceObjectId",
    "MailNickname",
    "SecurityEnabled",
    "MailEnabled",
    "GroupTypes",
    "CreatedDateTime",
    "DirectorySyncEnabled",
    "OnPremisesSecurityIdentifier",
    "Visibility",
];

const MEMBER_COLUMNS: &[&str] = &[
    "GroupName",
    "GroupSourceObjectId",
    "MemberType",
    "MemberDisplayName",
    "MemberPrincipalName",
    "MemberMailNickname",
    "MemberSourceObjectId",
];

const OWNER_COLUMNS: &[&str] = &[
    "GroupName",
    "GroupSourceObjectId",
    "OwnerType",
    "OwnerDisplayName",
    "OwnerPrincipalName",
    "OwnerMailNickname",
    "OwnerSourceObjectId",
];

/// Header is written explicitly so that an empty dataset still has one
fn write_rows<T: Serialize>(
    path: &Path,
    columns: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row; a malformed row fails the whole file with its line number
fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let contents = fs::read_to_string(path)?;
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(&contents);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Fields)
        .from_reader(contents.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.deserialize().enumerate() {
        let row_num = row_idx + 2; // header is line 1
        let row: T = result.map_err(|e| {
            GroupSyncError::InvalidInput(format!(
                "{} row {}: {}",
                path.display(),
                row_num,
                e
            ))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_groups(path: &Path, groups: &[GroupRecord]) -> Result<()> {
    write_rows(path, GROUP_COLUMNS, groups)
}

pub fn write_members(path: &Path, edges: &[Edge]) -> Result<()> {
    write_rows(path, MEMBER_COLUMNS, edges.iter().map(MemberRow::from))
}

pub fn write_owners(path: &Path, edges: &[Edge]) -> Result<()> {
    write_rows(path, OWNER_COLUMNS, edges.iter().map(OwnerRow::from))
}

pub fn read_groups(path: &Path) -> Result<Vec<GroupRecord>> {
    read_rows(path)
}

pub fn read_members(path: &Path) -> Result<Vec<Edge>> {
    Ok(read_rows::<MemberRow>(path)?
        .into_iter()
        .map(Edge::from)
        .collect())
}

pub fn read_owners(path: &Path) -> Result<Vec<Edge>> {
    Ok(read_rows::<OwnerRow>(path)?
        .into_iter()
        .map(Edge::from)
        .collect())
}

/// Most recently modified file of a dataset in `dir`
pub fn find_latest(dir: &Path, dataset: Dataset) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| dataset.matches(n));
        if !matches || !path.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(best, _)| modified > *best) {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
