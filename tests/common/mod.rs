//! In-memory directory used by the resolver, export and import tests
//!
//! Records every mutating call so tests can assert that preview runs and
//! re-runs leave the tenant untouched.

#![allow(dead_code)]

use async_trait::async_trait;
use groupsync::error::{GroupSyncError, Result};
use groupsync::graph::directory::{
    Directory, DirectoryObject, Group, LookupField, NewGroup, Relation,
};
use groupsync::migration::import::ImportSettings;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

const ODATA_USER: &str = "#microsoft.graph.user";
const ODATA_GROUP: &str = "#microsoft.graph.group";
const ODATA_DEVICE: &str = "#microsoft.graph.device";

#[derive(Default)]
struct State {
    next_id: usize,
    users: Vec<DirectoryObject>,
    groups: Vec<DirectoryObject>,
    /// Full group resources returned by `list_security_groups`
    security_groups: Vec<Group>,
    devices: Vec<DirectoryObject>,
    members: HashMap<String, Vec<String>>,
    owners: HashMap<String, Vec<String>>,

    created: Vec<NewGroup>,
    added: Vec<(String, Relation, String)>,
    relation_reads: usize,

    fail_create: HashSet<String>,
    fail_add: HashSet<String>,
    fail_lookup: HashSet<String>,
    fail_list: HashSet<String>,
}

impl State {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn relations(&mut self, relation: Relation) -> &mut HashMap<String, Vec<String>> {
        match relation {
            Relation::Member => &mut self.members,
            Relation::Owner => &mut self.owners,
        }
    }

    fn object(&self, id: &str) -> Option<DirectoryObject> {
        self.users
            .iter()
            .chain(self.groups.iter())
            .chain(self.devices.iter())
            .find(|o| o.id == id)
            .cloned()
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    state: Mutex<State>,
}

fn field_value<'a>(object: &'a DirectoryObject, field: LookupField) -> Option<&'a str> {
    match field {
        LookupField::DisplayName => object.display_name.as_deref(),
        LookupField::MailNickname => object.mail_nickname.as_deref(),
        LookupField::UserPrincipalName => object.user_principal_name.as_deref(),
    }
}

fn rejected(what: &str) -> GroupSyncError {
    GroupSyncError::GraphApiError(format!("HTTP 400 Bad Request: Request_BadRequest: {}", what))
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, display_name: &str, principal_name: &str, mail_nickname: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id("user");
        state.users.push(DirectoryObject {
            id: id.clone(),
            odata_type: Some(ODATA_USER.into()),
            display_name: Some(display_name.into()),
            user_principal_name: Some(principal_name.into()).filter(|s: &String| !s.is_empty()),
            mail_nickname: Some(mail_nickname.into()).filter(|s: &String| !s.is_empty()),
        });
        id
    }

    /// Group visible to lookups and listed as a security group
    pub fn add_group(&self, display_name: &str, mail_nickname: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id("group");
        state.groups.push(DirectoryObject {
            id: id.clone(),
            odata_type: Some(ODATA_GROUP.into()),
            display_name: Some(display_name.into()),
            user_principal_name: None,
            mail_nickname: Some(mail_nickname.into()).filter(|s: &String| !s.is_empty()),
        });
        state.security_groups.push(Group {
            id: id.clone(),
            display_name: Some(display_name.into()),
            mail_nickname: Some(mail_nickname.into()),
            security_enabled: Some(true),
            mail_enabled: Some(false),
            ..Default::default()
        });
        id
    }

    pub fn add_device(&self, display_name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id("device");
        state.devices.push(DirectoryObject {
            id: id.clone(),
            odata_type: Some(ODATA_DEVICE.into()),
            display_name: Some(display_name.into()),
            ..Default::default()
        });
        id
    }

    /// Pre-existing relation; not counted as a mutation
    pub fn link(&self, group_id: &str, relation: Relation, object_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .relations(relation)
            .entry(group_id.to_string())
            .or_default()
            .push(object_id.to_string());
    }

    pub fn fail_create_of(&self, display_name: &str) {
        self.state.lock().unwrap().fail_create.insert(display_name.into());
    }

    pub fn fail_add_of(&self, object_id: &str) {
        self.state.lock().unwrap().fail_add.insert(object_id.into());
    }

    /// Any lookup for this value fails as a transient remote error
    pub fn fail_lookup_of(&self, value: &str) {
        self.state.lock().unwrap().fail_lookup.insert(value.into());
    }

    pub fn fail_listing_of(&self, group_id: &str) {
        self.state.lock().unwrap().fail_list.insert(group_id.into());
    }

    pub fn created(&self) -> Vec<NewGroup> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn added(&self) -> Vec<(String, Relation, String)> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn mutation_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.created.len() + state.added.len()
    }

    pub fn relation_reads(&self) -> usize {
        self.state.lock().unwrap().relation_reads
    }

    pub fn group_id(&self, display_name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .groups
            .iter()
            .find(|g| g.display_name.as_deref() == Some(display_name))
            .map(|g| g.id.clone())
    }

    /// Display names holding `relation` on the named group
    pub fn related_names(&self, group_name: &str, relation: Relation) -> Vec<String> {
        let Some(group_id) = self.group_id(group_name) else {
            return Vec::new();
        };
        let mut state = self.state.lock().unwrap();
        let ids = state
            .relations(relation)
            .get(&group_id)
            .cloned()
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| state.object(id))
            .map(|o| o.display_name.unwrap_or_default())
            .collect()
    }

    fn find(&self, groups: bool, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>> {
        let state = self.state.lock().unwrap();
        if state.fail_lookup.contains(value) {
            return Err(GroupSyncError::GraphApiError(
                "HTTP 503 Service Unavailable: lookup failed".into(),
            ));
        }
        let pool = if groups { &state.groups } else { &state.users };
        Ok(pool
            .iter()
            .filter(|o| field_value(o, field).is_some_and(|v| v.eq_ignore_ascii_case(value)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn list_security_groups(&self, include_mail_enabled: bool) -> Result<Vec<Group>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .security_groups
            .iter()
            .filter(|g| g.is_exportable(include_mail_enabled))
            .cloned()
            .collect())
    }

    async fn list_relations(
        &self,
        group_id: &str,
        relation: Relation,
    ) -> Result<Vec<DirectoryObject>> {
        let mut state = self.state.lock().unwrap();
        state.relation_reads += 1;
        if state.fail_list.contains(group_id) {
            return Err(GroupSyncError::GraphApiError(
                "HTTP 500 Internal Server Error: listing failed".into(),
            ));
        }
        let ids = state
            .relations(relation)
            .get(group_id)
            .cloned()
            .unwrap_or_default();
        Ok(ids.iter().filter_map(|id| state.object(id)).collect())
    }

    async fn find_users(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>> {
        self.find(false, field, value)
    }

    async fn find_groups(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>> {
        self.find(true, field, value)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<DirectoryObject> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(&group.display_name) {
            return Err(rejected("group creation refused"));
        }
        let id = state.new_id("group");
        let object = DirectoryObject {
            id: id.clone(),
            odata_type: Some(ODATA_GROUP.into()),
            display_name: Some(group.display_name.clone()),
            user_principal_name: None,
            mail_nickname: group.mail_nickname.clone(),
        };
        state.groups.push(object.clone());
        state.created.push(group.clone());
        Ok(object)
    }

    async fn add_relation(
        &self,
        group_id: &str,
        relation: Relation,
        object_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_add.contains(object_id) {
            return Err(rejected("reference refused"));
        }
        state
            .relations(relation)
            .entry(group_id.to_string())
            .or_default()
            .push(object_id.to_string());
        state
            .added
            .push((group_id.to_string(), relation, object_id.to_string()));
        Ok(())
    }
}

/// Import settings with no settling pause
pub fn fast_settings() -> ImportSettings {
    ImportSettings {
        settle_delay: Duration::ZERO,
        ..ImportSettings::default()
    }
}
