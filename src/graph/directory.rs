//! Directory operations used by the exporter and importer
//!
//! The `Directory` trait is the seam between the migration logic and the
//! remote directory. `GraphClient` implements it against Microsoft Graph.

use crate::error::Result;
use crate::graph::GraphClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

const GROUP_SELECT: &str = "id,displayName,description,mailNickname,securityEnabled,mailEnabled,groupTypes,createdDateTime,onPremisesSyncEnabled,onPremisesSecurityIdentifier,visibility";
const OBJECT_SELECT: &str = "id,displayName,userPrincipalName,mailNickname";

const ODATA_USER: &str = "#microsoft.graph.user";
const ODATA_GROUP: &str = "#microsoft.graph.group";

/// Direct relationship between a group and a directory object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Member,
    Owner,
}

impl Relation {
    fn path(&self) -> &'static str {
        match self {
            Relation::Member => "members",
            Relation::Owner => "owners",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Member => write!(f, "member"),
            Relation::Owner => write!(f, "owner"),
        }
    }
}

/// Property used for an exact-match lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    DisplayName,
    MailNickname,
    UserPrincipalName,
}

impl LookupField {
    pub fn graph_property(&self) -> &'static str {
        match self {
            LookupField::DisplayName => "displayName",
            LookupField::MailNickname => "mailNickname",
            LookupField::UserPrincipalName => "userPrincipalName",
        }
    }
}

impl fmt::Display for LookupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupField::DisplayName => write!(f, "display name"),
            LookupField::MailNickname => write!(f, "mail nickname"),
            LookupField::UserPrincipalName => write!(f, "principal name"),
        }
    }
}

/// Kind of a directory object as reported by `@odata.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    User,
    Group,
    Other,
}

/// User, group or other object returned by lookups and relation listings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    pub id: String,
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail_nickname: Option<String>,
}

impl DirectoryObject {
    pub fn kind(&self) -> ObjectKind {
        match self.odata_type.as_deref() {
            Some(ODATA_USER) => ObjectKind::User,
            Some(ODATA_GROUP) => ObjectKind::Group,
            _ => ObjectKind::Other,
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Group resource as listed for export
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail_nickname: Option<String>,
    #[serde(default)]
    pub security_enabled: Option<bool>,
    #[serde(default)]
    pub mail_enabled: Option<bool>,
    #[serde(default)]
    pub group_types: Vec<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(default)]
    pub on_premises_security_identifier: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl Group {
    /// Security group in the sense of the export: security-enabled, not a
    /// Microsoft 365 (Unified) group, and mail-enabled only when asked for.
    pub fn is_exportable(&self, include_mail_enabled: bool) -> bool {
        self.security_enabled.unwrap_or(false)
            && !self.group_types.iter().any(|t| t.eq_ignore_ascii_case("Unified"))
            && (include_mail_enabled || !self.mail_enabled.unwrap_or(false))
    }
}

/// Body of a group creation request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    pub mail_enabled: bool,
    pub security_enabled: bool,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_security_groups(&self, include_mail_enabled: bool) -> Result<Vec<Group>>;

    /// Direct members or owners of a group
    async fn list_relations(&self, group_id: &str, relation: Relation)
        -> Result<Vec<DirectoryObject>>;

    async fn find_users(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>>;

    async fn find_groups(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>>;

    async fn create_group(&self, group: &NewGroup) -> Result<DirectoryObject>;

    async fn add_relation(&self, group_id: &str, relation: Relation, object_id: &str)
        -> Result<()>;
}

/// `$filter` expression for an exact match, percent-encoded for the query string
pub fn exact_filter(field: LookupField, value: &str) -> String {
    let expression = format!("{} eq '{}'", field.graph_property(), value.replace('\'', "''"));
    url::form_urlencoded::byte_serialize(expression.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[async_trait]
impl Directory for GraphClient {
    async fn list_security_groups(&self, include_mail_enabled: bool) -> Result<Vec<Group>> {
        let endpoint = format!(
            "groups?$filter=securityEnabled%20eq%20true&$select={}&$top=999",
            GROUP_SELECT
        );
        let groups: Vec<Group> = self.get_all_pages(&endpoint).await?;
        Ok(groups
            .into_iter()
            .filter(|g| g.is_exportable(include_mail_enabled))
            .collect())
    }

    async fn list_relations(
        &self,
        group_id: &str,
        relation: Relation,
    ) -> Result<Vec<DirectoryObject>> {
        let endpoint = format!(
            "groups/{}/{}?$select={}&$top=999",
            group_id,
            relation.path(),
            OBJECT_SELECT
        );
        self.get_all_pages(&endpoint).await
    }

    async fn find_users(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>> {
        let endpoint = format!(
            "users?$filter={}&$select={}",
            exact_filter(field, value),
            OBJECT_SELECT
        );
        let mut users: Vec<DirectoryObject> = self.get_all_pages(&endpoint).await?;
        for user in &mut users {
            user.odata_type.get_or_insert_with(|| ODATA_USER.to_string());
        }
        Ok(users)
    }

    async fn find_groups(&self, field: LookupField, value: &str) -> Result<Vec<DirectoryObject>> {
        let endpoint = format!(
            "groups?$filter={}&$select=id,displayName,mailNickname",
            exact_filter(field, value)
        );
        let mut groups: Vec<DirectoryObject> = self.get_all_pages(&endpoint).await?;
        for group in &mut groups {
            group.odata_type.get_or_insert_with(|| ODATA_GROUP.to_string());
        }
        Ok(groups)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<DirectoryObject> {
        let mut created: DirectoryObject = self.post("groups", group).await?;
        created.odata_type.get_or_insert_with(|| ODATA_GROUP.to_string());
        Ok(created)
    }

    async fn add_relation(
        &self,
        group_id: &str,
        relation: Relation,
        object_id: &str,
    ) -> Result<()> {
        let endpoint = format!("groups/{}/{}/$ref", group_id, relation.path());
        let body = serde_json::json!({
            "@odata.id": format!("{}/directoryObjects/{}", self.base_url(), object_id)
        });
        self.post_no_content(&endpoint, &body).await
    }
}
