//! Import phases: create groups, then converge owners and members
//!
//! Phases are independent and re-runnable. Every record is handled in
//! input order; per-record failures are counted and, unless
//! `continue_on_error` is off, never stop the phase.

use super::model::{Edge, GroupRecord, MemberType};
use super::resolver::{target_group_name, Resolution, Resolver, ResolvedIdentity};
use crate::graph::directory::{Directory, NewGroup, Relation};
use crate::logging;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub prefix: String,
    pub suffix: String,
    pub preview_only: bool,
    pub skip_existing: bool,
    pub continue_on_error: bool,
    /// Pause after each created group so later lookups can see it
    pub settle_delay: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            preview_only: false,
            skip_existing: true,
            continue_on_error: true,
            settle_delay: Duration::from_secs(crate::config::DEFAULT_SETTLE_SECONDS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreateGroups,
    AddOwners,
    AddMembers,
}

impl Phase {
    fn for_relation(relation: Relation) -> Self {
        match relation {
            Relation::Owner => Phase::AddOwners,
            Relation::Member => Phase::AddMembers,
        }
    }

    pub fn success_label(&self) -> &'static str {
        match self {
            Phase::CreateGroups => "Created",
            Phase::AddOwners => "OwnersAdded",
            Phase::AddMembers => "MembersAdded",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::CreateGroups => write!(f, "Create groups"),
            Phase::AddOwners => write!(f, "Add owners"),
            Phase::AddMembers => write!(f, "Add members"),
        }
    }
}

/// Counters produced by one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    pub phase: Phase,
    /// Groups created, or owners/members attached
    pub succeeded: usize,
    /// Existing groups skipped, or relations already present
    pub skipped: usize,
    /// Decisions logged as "would create/add" in preview mode
    pub previewed: usize,
    pub errors: usize,
    /// Stopped early because `continue_on_error` was off
    pub aborted: bool,
}

impl PhaseResult {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            succeeded: 0,
            skipped: 0,
            previewed: 0,
            errors: 0,
            aborted: false,
        }
    }
}

/// Create one destination group per record
pub async fn create_groups(
    directory: &dyn Directory,
    records: &[GroupRecord],
    settings: &ImportSettings,
) -> PhaseResult {
    let mut result = PhaseResult::new(Phase::CreateGroups);
    let resolver = Resolver::new(directory, &settings.prefix, &settings.suffix);

    logging::info(&format!("Creating {} group(s)...", records.len()));

    for record in records {
        let target_name = target_group_name(&settings.prefix, &record.display_name, &settings.suffix);
        let mail_nickname = Some(record.mail_nickname.as_str()).filter(|n| !n.trim().is_empty());

        if settings.skip_existing {
            if let Some(existing) = resolver
                .resolve_group(&record.display_name, mail_nickname)
                .await
                .found()
            {
                logging::info(&format!(
                    "  Skipped (already exists): {} ({})",
                    target_name, existing.id
                ));
                result.skipped += 1;
                continue;
            }
        }

        if settings.preview_only {
            logging::info(&format!("  [PREVIEW] Would create group: {}", target_name));
            result.previewed += 1;
            continue;
        }

        let request = NewGroup {
            display_name: target_name.clone(),
            description: Some(record.description.clone()).filter(|d| !d.trim().is_empty()),
            mail_nickname: mail_nickname.map(str::to_string),
            mail_enabled: record.mail_enabled,
            security_enabled: record.security_enabled,
        };

        match directory.create_group(&request).await {
            Ok(created) => {
                logging::success(&format!("  Created group: {} ({})", target_name, created.id));
                result.succeeded += 1;
                if !settings.settle_delay.is_zero() {
                    tokio::time::sleep(settings.settle_delay).await;
                }
            }
            Err(e) => {
                logging::error(&format!("  Failed to create group '{}': {}", target_name, e));
                result.errors += 1;
                if !settings.continue_on_error {
                    logging::error("Stopping group creation (continue-on-error is off)");
                    result.aborted = true;
                    break;
                }
            }
        }
    }

    result
}

/// Edges grouped by `GroupName`, groups and edges in first-appearance order
pub fn bucket_by_group(edges: &[Edge]) -> Vec<(String, Vec<&Edge>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<&Edge>)> = Vec::new();

    for edge in edges {
        match index.get(edge.group_name.as_str()) {
            Some(&i) => buckets[i].1.push(edge),
            None => {
                index.insert(edge.group_name.as_str(), buckets.len());
                buckets.push((edge.group_name.clone(), vec![edge]));
            }
        }
    }

    buckets
}

/// Attach every exported owner or member edge to its destination group
///
/// `groups` (the exported group records, possibly empty) supplies each
/// group's mail nickname as a second lookup key.
pub async fn converge_relations(
    directory: &dyn Directory,
    relation: Relation,
    edges: &[Edge],
    groups: &[GroupRecord],
    settings: &ImportSettings,
) -> PhaseResult {
    let mut result = PhaseResult::new(Phase::for_relation(relation));
    let resolver = Resolver::new(directory, &settings.prefix, &settings.suffix);
    let nicknames: HashMap<&str, &str> = groups
        .iter()
        .filter(|g| !g.mail_nickname.trim().is_empty())
        .map(|g| (g.source_object_id.as_str(), g.mail_nickname.as_str()))
        .collect();

    let buckets = bucket_by_group(edges);
    logging::info(&format!(
        "Adding {} {}(s) across {} group(s)...",
        edges.len(),
        relation,
        buckets.len()
    ));

    'groups: for (group_name, bucket) in buckets {
        let group_nickname = bucket
            .first()
            .and_then(|e| nicknames.get(e.group_source_object_id.as_str()).copied());
        let target_name = target_group_name(&settings.prefix, &group_name, &settings.suffix);

        let target_group = match resolver.resolve_group(&group_name, group_nickname).await {
            Resolution::Found(group) => group,
            other => {
                logging::error(&format!(
                    "Group '{}' not found in destination ({}), skipping {} {}(s)",
                    target_name,
                    other,
                    bucket.len(),
                    relation
                ));
                result.errors += 1;
                continue;
            }
        };

        logging::info(&format!("Group: {}", target_group.display_name));
        let mut current: Option<HashSet<String>> = None;

        for edge in bucket {
            let resolution = match edge.member_type {
                MemberType::User => {
                    resolver
                        .resolve_user(
                            &edge.display_name,
                            edge.mail_nickname.as_deref(),
                            edge.principal_name.as_deref(),
                        )
                        .await
                }
                MemberType::Group => {
                    resolver
                        .resolve_group(&edge.display_name, edge.mail_nickname.as_deref())
                        .await
                }
            };

            let Some(identity) = resolution.clone().found() else {
                logging::error(&format!(
                    "  {:?} '{}' not found in destination ({}), cannot add as {} of '{}'",
                    edge.member_type, edge.display_name, resolution, relation, target_group.display_name
                ));
                result.errors += 1;
                continue;
            };

            if settings.preview_only {
                logging::info(&format!(
                    "  [PREVIEW] Would add {} as {}",
                    identity.display_name, relation
                ));
                result.previewed += 1;
                continue;
            }

            if current.is_none() {
                match directory.list_relations(&target_group.id, relation).await {
                    Ok(objects) => {
                        current = Some(objects.into_iter().map(|o| o.id).collect());
                    }
                    Err(e) => {
                        logging::error(&format!(
                            "  Failed to read current {}s of '{}': {}",
                            relation, target_group.display_name, e
                        ));
                        result.errors += 1;
                        if !settings.continue_on_error {
                            result.aborted = true;
                            break 'groups;
                        }
                        continue;
                    }
                }
            }
            let present = current.get_or_insert_with(HashSet::new);

            if present.contains(&identity.id) {
                logging::info(&format!(
                    "  Already {}: {}",
                    relation, identity.display_name
                ));
                result.skipped += 1;
                continue;
            }

            match attach(directory, &target_group, relation, &identity).await {
                Ok(()) => {
                    present.insert(identity.id.clone());
                    logging::success(&format!(
                        "  Added {} as {}",
                        identity.display_name, relation
                    ));
                    result.succeeded += 1;
                }
                Err(e) => {
                    logging::error(&format!(
                        "  Failed to add {} as {} of '{}': {}",
                        identity.display_name, relation, target_group.display_name, e
                    ));
                    result.errors += 1;
                    if !settings.continue_on_error {
                        result.aborted = true;
                        break 'groups;
                    }
                }
            }
        }
    }

    if result.aborted {
        logging::error(&format!(
            "Stopping '{}' phase (continue-on-error is off)",
            result.phase
        ));
    }

    result
}

async fn attach(
    directory: &dyn Directory,
    group: &ResolvedIdentity,
    relation: Relation,
    identity: &ResolvedIdentity,
) -> crate::error::Result<()> {
    directory.add_relation(&group.id, relation, &identity.id).await
}
