//! Session setup shared by `export` and `import`

use crate::config::{ConfigManager, TenantConfig};
use crate::error::{GroupSyncError, Result};
use crate::graph::auth::GraphAuth;
use crate::graph::{GraphClient, PaginatedResponse};
use crate::logging;
use serde::Deserialize;

const GRAPH_SERVICE: &str = "Microsoft Graph";

/// An authenticated, verified Graph session for one tenant
pub struct Connection {
    pub tenant: TenantConfig,
    pub client: GraphClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Resolve the tenant, obtain a token and verify it against Graph
///
/// With `auto_connect` a missing or expired token triggers the tenant's
/// login flow; without it the run fails. Every failure here is fatal.
pub async fn connect(
    config_manager: &ConfigManager,
    tenant_name: Option<&str>,
    auto_connect: bool,
) -> Result<Connection> {
    let tenant = match tenant_name {
        Some(name) => config_manager.get_tenant_or_env(name)?,
        None => config_manager.get_active_tenant()?.ok_or_else(|| {
            GroupSyncError::ConfigError(
                "No active tenant. Run 'groupsync login <tenant>' or pass --tenant".into(),
            )
        })?,
    };

    let auth = GraphAuth::new(config_manager.clone());
    let access_token = match auth.get_access_token(&tenant.name).await {
        Ok(token) => token,
        Err(GroupSyncError::TokenNotFound) if auto_connect => {
            logging::info(&format!("Connecting to {} ({})...", tenant.name, tenant.cloud));
            auth.login(&tenant)
                .await
                .map_err(|e| connection_failed(&tenant, e))?
                .access_token
        }
        Err(GroupSyncError::TokenNotFound) => {
            return Err(GroupSyncError::ConnectionFailed {
                service: GRAPH_SERVICE.into(),
                reason: format!(
                    "not signed in to tenant '{}'. Run 'groupsync login {}' or pass --connect",
                    tenant.name, tenant.name
                ),
            });
        }
        Err(e) => return Err(connection_failed(&tenant, e)),
    };

    let client = GraphClient::new(access_token, tenant.cloud);
    let organization = verify_connection(&client)
        .await
        .map_err(|e| connection_failed(&tenant, e))?;

    logging::success(&format!(
        "Connected to {} ({}, {})",
        organization, tenant.name, tenant.cloud
    ));

    Ok(Connection { tenant, client })
}

/// Cheap authenticated read proving the token works; returns the org name
pub async fn verify_connection(client: &GraphClient) -> Result<String> {
    let response: PaginatedResponse<Organization> =
        client.get("organization?$select=id,displayName").await?;

    let org = response.value.into_iter().next().ok_or_else(|| {
        GroupSyncError::GraphApiError("organization endpoint returned no tenant".into())
    })?;
    tracing::debug!(org_id = %org.id, "Session verified");

    Ok(org.display_name.unwrap_or(org.id))
}

fn connection_failed(tenant: &TenantConfig, error: GroupSyncError) -> GroupSyncError {
    GroupSyncError::ConnectionFailed {
        service: format!("{} ({})", GRAPH_SERVICE, tenant.name),
        reason: error.to_string(),
    }
}
