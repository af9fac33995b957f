//! Records captured by an export and consumed by later imports
//!
//! None of these carry destination-tenant identifiers: correspondence is
//! re-derived at import time by name.

use crate::graph::directory::{DirectoryObject, Group, ObjectKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One exported security group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupRecord {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub source_object_id: String,
    #[serde(default)]
    pub mail_nickname: String,
    #[serde(default, serialize_with = "ser_bool", deserialize_with = "de_bool")]
    pub security_enabled: bool,
    #[serde(default, serialize_with = "ser_bool", deserialize_with = "de_bool")]
    pub mail_enabled: bool,
    #[serde(default, serialize_with = "ser_group_types", deserialize_with = "de_group_types")]
    pub group_types: Vec<String>,
    #[serde(default)]
    pub created_date_time: String,
    #[serde(default, serialize_with = "ser_bool", deserialize_with = "de_bool")]
    pub directory_sync_enabled: bool,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub on_premises_security_identifier: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub visibility: Option<String>,
}

impl From<&Group> for GroupRecord {
    fn from(group: &Group) -> Self {
        Self {
            display_name: group.display_name.clone().unwrap_or_default(),
            description: group.description.clone().unwrap_or_default(),
            source_object_id: group.id.clone(),
            mail_nickname: group.mail_nickname.clone().unwrap_or_default(),
            security_enabled: group.security_enabled.unwrap_or(false),
            mail_enabled: group.mail_enabled.unwrap_or(false),
            group_types: group.group_types.clone(),
            created_date_time: group.created_date_time.clone().unwrap_or_default(),
            directory_sync_enabled: group.on_premises_sync_enabled.unwrap_or(false),
            on_premises_security_identifier: group
                .on_premises_security_identifier
                .clone()
                .filter(|s| !s.is_empty()),
            visibility: group.visibility.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// Kind of principal on the far side of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberType {
    #[serde(alias = "user", alias = "USER")]
    User,
    #[serde(alias = "group", alias = "GROUP")]
    Group,
}

/// Direct membership or ownership captured at export time
///
/// Nested groups appear as `Group`-typed edges and are never flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub group_name: String,
    pub group_source_object_id: String,
    pub member_type: MemberType,
    pub display_name: String,
    pub principal_name: Option<String>,
    pub mail_nickname: Option<String>,
    pub source_object_id: String,
}

impl Edge {
    /// Build an edge from a listed member/owner; `None` for devices,
    /// service principals, contacts and other non user/group objects.
    pub fn from_object(group: &GroupRecord, object: &DirectoryObject) -> Option<Self> {
        let member_type = match object.kind() {
            ObjectKind::User => MemberType::User,
            ObjectKind::Group => MemberType::Group,
            ObjectKind::Other => return None,
        };

        Some(Self {
            group_name: group.display_name.clone(),
            group_source_object_id: group.source_object_id.clone(),
            member_type,
            display_name: object.display_name.clone().unwrap_or_default(),
            principal_name: match member_type {
                MemberType::User => object.user_principal_name.clone().filter(|s| !s.is_empty()),
                MemberType::Group => None,
            },
            mail_nickname: object.mail_nickname.clone().filter(|s| !s.is_empty()),
            source_object_id: object.id.clone(),
        })
    }
}

fn ser_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_bool(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid boolean '{}'", raw)))
}

/// Lenient boolean used for CSV cells; empty means false
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

fn ser_group_types<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.join(";"))
}

fn de_group_types<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

pub(crate) fn de_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_group_record_from_graph_group() {
        let group = Group {
            id: "src-1".into(),
            display_name: Some("Finance-Team".into()),
            security_enabled: Some(true),
            mail_enabled: Some(false),
            group_types: vec!["DynamicMembership".into()],
            on_premises_sync_enabled: None,
            on_premises_security_identifier: Some(String::new()),
            ..Default::default()
        };

        let record = GroupRecord::from(&group);
        assert_eq!(record.display_name, "Finance-Team");
        assert_eq!(record.source_object_id, "src-1");
        assert!(record.security_enabled);
        assert!(!record.directory_sync_enabled);
        assert_eq!(record.on_premises_security_identifier, None);
        assert_eq!(record.mail_nickname, "");
    }

    #[test]
    fn test_edge_skips_non_principal_objects() {
        let group = GroupRecord::from(&Group {
            id: "g1".into(),
            display_name: Some("Ops".into()),
            ..Default::default()
        });

        let user = DirectoryObject {
            id: "u1".into(),
            odata_type: Some("#microsoft.graph.user".into()),
            display_name: Some("Alice".into()),
            user_principal_name: Some("alice@contoso.com".into()),
            mail_nickname: Some("alice".into()),
        };
        let edge = Edge::from_object(&group, &user).unwrap();
        assert_eq!(edge.member_type, MemberType::User);
        assert_eq!(edge.group_name, "Ops");
        assert_eq!(edge.principal_name.as_deref(), Some("alice@contoso.com"));

        let sp = DirectoryObject {
            id: "sp1".into(),
            odata_type: Some("#microsoft.graph.servicePrincipal".into()),
            ..Default::default()
        };
        assert!(Edge::from_object(&group, &sp).is_none());
    }
}
