use crate::config::{AuthType, Cloud, ConfigManager, TenantConfig};
use crate::error::{GroupSyncError, Result};
use crate::graph::auth::GraphAuth;
use clap::Args;
use colored::Colorize;

/// Safely truncate a string to n characters (not bytes) to prevent panics on non-ASCII
fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Tenant name; checked against tenants.toml, then tenants.env / {name}.env
    #[arg(index = 1)]
    name: Option<String>,

    /// Tenant name (alias for the positional argument)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Tenant ID (Entra ID tenant ID)
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client ID (Application ID)
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret (for client credentials flow)
    #[arg(long)]
    client_secret: Option<String>,

    /// Use client credentials flow instead of device code
    #[arg(long)]
    client_credentials: bool,

    /// Cloud the tenant lives in: commercial or gcc-high
    #[arg(long, default_value = "commercial")]
    cloud: Cloud,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Tenant name
    #[arg(short, long)]
    tenant: Option<String>,

    /// Logout from all tenants
    #[arg(long)]
    all: bool,
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    let tenant_name = args.name.as_ref().or(args.tenant.as_ref());

    let tenant_config = if let Some(name) = tenant_name {
        match config_manager.get_tenant_or_env(name) {
            Ok(tenant) => {
                println!(
                    "{} Loaded tenant: {} ({})",
                    "✓".green(),
                    tenant.name.bold(),
                    tenant.cloud
                );
                println!("  Tenant ID: {}...", truncate_chars(&tenant.tenant_id, 8));
                println!("  Client ID: {}...", truncate_chars(&tenant.client_id, 8));
                tenant
            }
            Err(GroupSyncError::TenantNotFound(_)) => {
                return Err(GroupSyncError::ConfigError(format!(
                    "Tenant '{}' not found.\n\n\
                    Options:\n\
                    1. Add a [{}] section to {}:\n   \
                       TENANT_ID=your-tenant-id\n   \
                       CLIENT_ID=your-client-id\n   \
                       CLOUD=gcc-high\n\n\
                    2. Run: groupsync login --tenant {} --tenant-id ID --client-id ID --cloud gcc-high",
                    name,
                    name.to_uppercase(),
                    config_manager.config_dir().join("tenants.env").display(),
                    name
                )));
            }
            Err(e) => return Err(e),
        }
    } else if let (Some(tenant_id), Some(client_id)) = (&args.tenant_id, &args.client_id) {
        let name = args.tenant.clone().unwrap_or_else(|| {
            let auto_name = tenant_id
                .split('-')
                .next()
                .unwrap_or("tenant")
                .to_string();
            println!(
                "{} Auto-generated tenant name: {}",
                "→".cyan(),
                auto_name.bold()
            );
            auto_name
        });

        let auth_type = if args.client_credentials || args.client_secret.is_some() {
            AuthType::ClientCredentials
        } else {
            AuthType::DeviceCode
        };

        let tenant = TenantConfig {
            name: name.clone(),
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: args.client_secret.clone(),
            auth_type,
            cloud: args.cloud,
            description: args.description.clone(),
        };

        config_manager.add_tenant(tenant.clone())?;
        println!("{} Tenant '{}' configuration saved", "✓".green(), name);

        tenant
    } else {
        return Err(GroupSyncError::InvalidConfig(
            "Usage:\n  \
            groupsync login NAME                                  # Existing or .env tenant\n  \
            groupsync login --tenant-id ID --client-id ID --cloud gcc-high  # Quick setup"
                .into(),
        ));
    };

    auth.login(&tenant_config).await?;
    config_manager.set_active_tenant(&tenant_config.name)?;

    println!(
        "\n{} Active tenant: {}",
        "→".cyan(),
        tenant_config.name.bold()
    );
    Ok(())
}

pub async fn logout(args: LogoutArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    if args.all {
        for tenant in &config_manager.load_tenants()? {
            auth.logout(&tenant.name)?;
        }
        println!("{} Logged out from all tenants", "✓".green());
    } else if let Some(tenant_name) = &args.tenant {
        auth.logout(tenant_name)?;
        println!("{} Logged out from '{}'", "✓".green(), tenant_name);
    } else if let Some(current_tenant) = config_manager.load_config()?.current_tenant {
        auth.logout(&current_tenant)?;
        println!("{} Logged out from '{}'", "✓".green(), current_tenant);
    } else {
        println!("{} No active tenant", "!".yellow());
    }

    Ok(())
}
