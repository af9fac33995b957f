use crate::config::{AuthType, ConfigManager, TenantConfig, TokenCache};
use crate::error::{GroupSyncError, Result};
use colored::Colorize;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret,
    DeviceAuthorizationUrl, EmptyExtraDeviceAuthorizationFields, Scope, TokenResponse, TokenUrl,
};
use std::time::Duration;

/// Graph permissions the app registration needs in both tenants
pub const REQUIRED_SCOPES: &[&str] = &["Group.ReadWrite.All", "User.Read.All", "Directory.Read.All"];

pub struct GraphAuth {
    config_manager: ConfigManager,
}

fn endpoint_urls(tenant: &TenantConfig) -> Result<(AuthUrl, TokenUrl)> {
    let authority = tenant.cloud.authority();

    let auth_url = AuthUrl::new(format!(
        "{}/{}/oauth2/v2.0/authorize",
        authority, tenant.tenant_id
    ))
    .map_err(|e| GroupSyncError::AuthError(format!("Invalid auth URL: {}", e)))?;

    let token_url = TokenUrl::new(format!(
        "{}/{}/oauth2/v2.0/token",
        authority, tenant.tenant_id
    ))
    .map_err(|e| GroupSyncError::AuthError(format!("Invalid token URL: {}", e)))?;

    Ok((auth_url, token_url))
}

fn expiry_from(expires_in: Option<Duration>) -> chrono::DateTime<chrono::Utc> {
    let lifetime = chrono::Duration::from_std(expires_in.unwrap_or(Duration::from_secs(3600)))
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    chrono::Utc::now() + lifetime
}

impl GraphAuth {
    pub fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Run the tenant's configured flow and cache the token
    pub async fn login(&self, tenant_config: &TenantConfig) -> Result<TokenCache> {
        match tenant_config.auth_type {
            AuthType::DeviceCode => self.login_device_code(tenant_config).await,
            AuthType::ClientCredentials => self.login_client_credentials(tenant_config).await,
        }
    }

    /// Authenticate using device code flow (interactive)
    pub async fn login_device_code(&self, tenant_config: &TenantConfig) -> Result<TokenCache> {
        println!(
            "{} Starting device code authentication for tenant '{}' ({})...",
            "→".cyan(),
            tenant_config.name,
            tenant_config.cloud
        );
        println!("  Required permissions: {}", REQUIRED_SCOPES.join(", "));

        let (auth_url, token_url) = endpoint_urls(tenant_config)?;
        let device_auth_url = DeviceAuthorizationUrl::new(format!(
            "{}/{}/oauth2/v2.0/devicecode",
            tenant_config.cloud.authority(),
            tenant_config.tenant_id
        ))
        .map_err(|e| GroupSyncError::AuthError(format!("Invalid device auth URL: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(tenant_config.client_id.clone()),
            None,
            auth_url,
            Some(token_url),
        )
        .set_device_authorization_url(device_auth_url);

        let details: oauth2::DeviceAuthorizationResponse<EmptyExtraDeviceAuthorizationFields> =
            client
                .exchange_device_code()
                .map_err(|e| {
                    GroupSyncError::AuthError(format!("Device code exchange failed: {}", e))
                })?
                .add_scope(Scope::new(tenant_config.cloud.graph_scope().to_string()))
                .request_async(async_http_client)
                .await
                .map_err(|e| {
                    GroupSyncError::AuthError(format!("Device authorization request failed: {}", e))
                })?;

        println!("\n  Please visit: {}", details.verification_uri().as_str());
        println!("  Enter code:   {}\n", details.user_code().secret().bold());

        let token = client
            .exchange_device_access_token(&details)
            .request_async(async_http_client, tokio::time::sleep, None)
            .await
            .map_err(|e| GroupSyncError::AuthError(format!("Token exchange failed: {}", e)))?;

        let token_cache = TokenCache {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_at: expiry_from(token.expires_in()),
            tenant_id: tenant_config.tenant_id.clone(),
        };

        self.config_manager
            .save_token(&tenant_config.name, &token_cache)?;
        tracing::info!(tenant = %tenant_config.name, "Device code authentication succeeded");

        Ok(token_cache)
    }

    /// Authenticate using client credentials flow (non-interactive)
    pub async fn login_client_credentials(
        &self,
        tenant_config: &TenantConfig,
    ) -> Result<TokenCache> {
        let client_secret = tenant_config.client_secret.as_ref().ok_or_else(|| {
            GroupSyncError::AuthError("Client secret required for client credentials flow".into())
        })?;

        let (auth_url, token_url) = endpoint_urls(tenant_config)?;
        let client = BasicClient::new(
            ClientId::new(tenant_config.client_id.clone()),
            Some(ClientSecret::new(client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(tenant_config.cloud.graph_scope().to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                GroupSyncError::AuthError(format!("Client credentials exchange failed: {}", e))
            })?;

        let token_cache = TokenCache {
            access_token: token.access_token().secret().clone(),
            refresh_token: None,
            expires_at: expiry_from(token.expires_in()),
            tenant_id: tenant_config.tenant_id.clone(),
        };

        self.config_manager
            .save_token(&tenant_config.name, &token_cache)?;
        tracing::info!(tenant = %tenant_config.name, "Client credentials authentication succeeded");

        Ok(token_cache)
    }

    /// Cached access token; expired or missing tokens map to `TokenNotFound`
    pub async fn get_access_token(&self, tenant_name: &str) -> Result<String> {
        match self.config_manager.load_token(tenant_name) {
            Ok(token) => Ok(token.access_token),
            Err(GroupSyncError::AuthError(_)) => Err(GroupSyncError::TokenNotFound),
            Err(e) => Err(e),
        }
    }

    pub fn logout(&self, tenant_name: &str) -> Result<()> {
        self.config_manager.delete_token(tenant_name)
    }
}
