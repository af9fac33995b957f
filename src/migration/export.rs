//! Source-tenant snapshot: security groups plus their direct members and owners

use super::dataset::{self, Dataset};
use super::model::{Edge, GroupRecord};
use crate::cmd::progress;
use crate::error::Result;
use crate::graph::directory::{Directory, DirectoryObject, Relation};
use crate::logging;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one export run captured
#[derive(Debug, Default)]
pub struct Snapshot {
    pub groups: Vec<GroupRecord>,
    pub members: Vec<Edge>,
    pub owners: Vec<Edge>,
    /// Devices, service principals, contacts... left out of the edge files
    pub skipped_objects: usize,
    /// Groups whose members or owners could not be listed
    pub errors: usize,
}

/// Paths of the three dataset files written for a snapshot
#[derive(Debug, Clone)]
pub struct ExportFiles {
    pub groups: PathBuf,
    pub members: PathBuf,
    pub owners: PathBuf,
}

/// Capture every security group with its direct members and owners
///
/// Failing to list the groups themselves is fatal; a failure on one
/// group's members or owners is logged and the export moves on.
pub async fn take_snapshot(directory: &dyn Directory, include_mail_enabled: bool) -> Result<Snapshot> {
    let spinner = progress::create_spinner("Retrieving security groups...");
    let groups = match directory.list_security_groups(include_mail_enabled).await {
        Ok(groups) => {
            progress::finish(&spinner, true, &format!("Found {} security group(s)", groups.len()));
            groups
        }
        Err(e) => {
            progress::finish(&spinner, false, "Failed to retrieve security groups");
            return Err(e);
        }
    };
    tracing::info!(count = groups.len(), include_mail_enabled, "Security groups listed");

    let mut snapshot = Snapshot::default();
    let bar = progress::create_progress_bar(groups.len() as u64, "Exporting groups");

    for group in &groups {
        let record = GroupRecord::from(group);
        bar.set_message(record.display_name.clone());

        for relation in [Relation::Member, Relation::Owner] {
            match directory.list_relations(&group.id, relation).await {
                Ok(objects) => {
                    let edges = collect_edges(&record, &objects, relation, &mut snapshot.skipped_objects);
                    match relation {
                        Relation::Member => snapshot.members.extend(edges),
                        Relation::Owner => snapshot.owners.extend(edges),
                    }
                }
                Err(e) => {
                    bar.suspend(|| {
                        logging::error(&format!(
                            "Failed to list {}s of '{}': {}",
                            relation, record.display_name, e
                        ))
                    });
                    snapshot.errors += 1;
                }
            }
        }

        snapshot.groups.push(record);
        bar.inc(1);
    }

    progress::finish(
        &bar,
        true,
        &format!(
            "Exported {} group(s), {} membership(s), {} ownership(s)",
            snapshot.groups.len(),
            snapshot.members.len(),
            snapshot.owners.len()
        ),
    );

    Ok(snapshot)
}

fn collect_edges(
    group: &GroupRecord,
    objects: &[DirectoryObject],
    relation: Relation,
    skipped: &mut usize,
) -> Vec<Edge> {
    objects
        .iter()
        .filter_map(|object| {
            let edge = Edge::from_object(group, object);
            if edge.is_none() {
                tracing::warn!(
                    group = %group.display_name,
                    object_id = %object.id,
                    odata_type = object.odata_type.as_deref().unwrap_or("unknown"),
                    "Skipping {} that is neither a user nor a group",
                    relation
                );
                *skipped += 1;
            }
            edge
        })
        .collect()
}

/// Write the three dataset files into `output_dir`
pub fn write_snapshot(output_dir: &Path, timestamp: &str, snapshot: &Snapshot) -> Result<ExportFiles> {
    fs::create_dir_all(output_dir)?;

    let files = ExportFiles {
        groups: output_dir.join(Dataset::Groups.file_name(timestamp)),
        members: output_dir.join(Dataset::Members.file_name(timestamp)),
        owners: output_dir.join(Dataset::Owners.file_name(timestamp)),
    };

    dataset::write_groups(&files.groups, &snapshot.groups)?;
    dataset::write_members(&files.members, &snapshot.members)?;
    dataset::write_owners(&files.owners, &snapshot.owners)?;

    Ok(files)
}
