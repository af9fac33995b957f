//! Maps source-tenant identities onto destination-tenant objects
//!
//! Each lookup key is tried in order and only an exact, unique match is
//! accepted. Several matches are never disambiguated: the key is treated
//! as a miss and the next key is tried.

use crate::graph::directory::{Directory, DirectoryObject, LookupField};
use crate::logging;
use std::fmt;

/// Destination object found for a source identity
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub id: String,
    pub display_name: String,
}

impl From<DirectoryObject> for ResolvedIdentity {
    fn from(object: DirectoryObject) -> Self {
        Self {
            display_name: object.label().to_string(),
            id: object.id,
        }
    }
}

/// Outcome of a resolution; everything but `Found` is handled as "not found"
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolvedIdentity),
    NotFound,
    /// Last attempted key matched this many objects
    Ambiguous(usize),
    /// A lookup failed remotely and no later key matched
    LookupFailed(String),
}

impl Resolution {
    pub fn found(self) -> Option<ResolvedIdentity> {
        match self {
            Resolution::Found(identity) => Some(identity),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found(identity) => write!(f, "found {}", identity.id),
            Resolution::NotFound => write!(f, "no match"),
            Resolution::Ambiguous(count) => write!(f, "ambiguous ({} matches)", count),
            Resolution::LookupFailed(reason) => write!(f, "lookup failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    User,
    Group,
}

/// Prefix + name + suffix, the display name a migrated group carries
///
/// Trimmed the same way lookup keys are, so a created group is found again
/// by the next run.
pub fn target_group_name(prefix: &str, name: &str, suffix: &str) -> String {
    format!("{}{}{}", prefix, name, suffix).trim().to_string()
}

pub struct Resolver<'a> {
    directory: &'a dyn Directory,
    prefix: String,
    suffix: String,
}

impl<'a> Resolver<'a> {
    pub fn new(directory: &'a dyn Directory, prefix: &str, suffix: &str) -> Self {
        Self {
            directory,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Display name, then mail nickname, then original principal name
    pub async fn resolve_user(
        &self,
        display_name: &str,
        mail_nickname: Option<&str>,
        principal_name: Option<&str>,
    ) -> Resolution {
        let keys = [
            (LookupField::DisplayName, Some(display_name)),
            (LookupField::MailNickname, mail_nickname),
            (LookupField::UserPrincipalName, principal_name),
        ];
        self.resolve(Target::User, &keys).await
    }

    /// Prefixed/suffixed display name, then mail nickname (used verbatim)
    pub async fn resolve_group(&self, display_name: &str, mail_nickname: Option<&str>) -> Resolution {
        let full_name = if display_name.trim().is_empty() {
            String::new()
        } else {
            target_group_name(&self.prefix, display_name, &self.suffix)
        };
        let keys = [
            (LookupField::DisplayName, Some(full_name.as_str())),
            (LookupField::MailNickname, mail_nickname),
        ];
        self.resolve(Target::Group, &keys).await
    }

    async fn resolve(&self, target: Target, keys: &[(LookupField, Option<&str>)]) -> Resolution {
        let mut outcome = Resolution::NotFound;

        for (field, value) in keys {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };

            let lookup = match target {
                Target::User => self.directory.find_users(*field, value).await,
                Target::Group => self.directory.find_groups(*field, value).await,
            };

            match lookup {
                Ok(mut matches) if matches.len() == 1 => {
                    return Resolution::Found(matches.remove(0).into());
                }
                Ok(matches) if matches.is_empty() => {
                    tracing::debug!(%field, value, "No match");
                }
                Ok(matches) => {
                    logging::warn(&format!(
                        "{} matches for {} '{}', not choosing between them",
                        matches.len(),
                        field,
                        value
                    ));
                    outcome = Resolution::Ambiguous(matches.len());
                }
                Err(e) => {
                    logging::warn(&format!("Lookup by {} '{}' failed: {}", field, value, e));
                    outcome = Resolution::LookupFailed(e.to_string());
                }
            }
        }

        outcome
    }
}
