use crate::error::{GroupSyncError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Settling delay applied after each group creation when neither the
/// command line nor config.toml sets one.
pub const DEFAULT_SETTLE_SECONDS: u64 = 2;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub current_tenant: Option<String>,

    #[serde(default)]
    pub log_level: String,

    /// Directory for run logs; defaults to `<data dir>/logs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_seconds: Option<u64>,
}

/// Microsoft cloud a tenant lives in
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Cloud {
    #[default]
    Commercial,
    GccHigh,
}

impl Cloud {
    pub fn graph_base(&self) -> &'static str {
        match self {
            Cloud::Commercial => "https://graph.microsoft.com/v1.0",
            Cloud::GccHigh => "https://graph.microsoft.us/v1.0",
        }
    }

    pub fn authority(&self) -> &'static str {
        match self {
            Cloud::Commercial => "https://login.microsoftonline.com",
            Cloud::GccHigh => "https://login.microsoftonline.us",
        }
    }

    pub fn graph_scope(&self) -> &'static str {
        match self {
            Cloud::Commercial => "https://graph.microsoft.com/.default",
            Cloud::GccHigh => "https://graph.microsoft.us/.default",
        }
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cloud::Commercial => write!(f, "commercial"),
            Cloud::GccHigh => write!(f, "gcc-high"),
        }
    }
}

impl FromStr for Cloud {
    type Err = GroupSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "commercial" | "public" | "global" => Ok(Cloud::Commercial),
            "gcc-high" | "gcchigh" | "usgov" | "usgovhigh" => Ok(Cloud::GccHigh),
            other => Err(GroupSyncError::InvalidConfig(format!(
                "Unknown cloud '{}'. Expected 'commercial' or 'gcc-high'",
                other
            ))),
        }
    }
}

/// Tenant-specific configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TenantConfig {
    pub name: String,
    pub tenant_id: String,
    pub client_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub auth_type: AuthType,

    #[serde(default)]
    pub cloud: Cloud,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    DeviceCode,
    ClientCredentials,
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "groupsync", "groupsync").ok_or_else(|| {
            GroupSyncError::ConfigError("Failed to determine config directory".into())
        })?;

        Self::with_dirs(
            project_dirs.config_dir().to_path_buf(),
            project_dirs.data_dir().to_path_buf(),
        )
    }

    /// Use explicit directories instead of the platform defaults
    pub fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn tenants_file(&self) -> PathBuf {
        self.config_dir.join("tenants.toml")
    }

    pub fn token_cache_file(&self, tenant_name: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_name))
    }

    /// Log directory from config.toml, falling back to the data directory
    pub fn log_dir(&self) -> Result<PathBuf> {
        let config = self.load_config()?;
        Ok(config
            .log_dir
            .unwrap_or_else(|| self.data_dir.join("logs")))
    }

    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config).map_err(|e| {
            GroupSyncError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    pub fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        let tenants_path = self.tenants_file();

        if !tenants_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(tenants_path)?;

        #[derive(Deserialize)]
        struct TenantsFile {
            #[serde(default)]
            tenants: Vec<TenantConfig>,
        }

        let file: TenantsFile = toml::from_str(&contents)?;
        Ok(file.tenants)
    }

    pub fn save_tenants(&self, tenants: &[TenantConfig]) -> Result<()> {
        #[derive(Serialize)]
        struct TenantsFile<'a> {
            tenants: &'a [TenantConfig],
        }

        let contents = toml::to_string_pretty(&TenantsFile { tenants }).map_err(|e| {
            GroupSyncError::ConfigError(format!("Failed to serialize tenants: {}", e))
        })?;
        fs::write(self.tenants_file(), contents)?;
        Ok(())
    }

    /// Add or replace a tenant with the same name
    pub fn add_tenant(&self, tenant: TenantConfig) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        tenants.retain(|t| t.name != tenant.name);
        tenants.push(tenant);
        self.save_tenants(&tenants)
    }

    pub fn get_tenant(&self, name: &str) -> Result<TenantConfig> {
        self.load_tenants()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| GroupSyncError::TenantNotFound(name.to_string()))
    }

    pub fn get_active_tenant(&self) -> Result<Option<TenantConfig>> {
        match self.load_config()?.current_tenant {
            Some(tenant_name) => Ok(Some(self.get_tenant(&tenant_name)?)),
            None => Ok(None),
        }
    }

    pub fn set_active_tenant(&self, tenant_name: &str) -> Result<()> {
        let tenant = self.get_tenant(tenant_name)?;
        let mut config = self.load_config()?;
        config.current_tenant = Some(tenant.name);
        self.save_config(&config)
    }

    pub fn remove_tenant(&self, tenant_name: &str) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        let original_len = tenants.len();
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(tenant_name));

        if tenants.len() == original_len {
            return Err(GroupSyncError::TenantNotFound(tenant_name.to_string()));
        }

        self.save_tenants(&tenants)?;
        let _ = self.delete_token(tenant_name);

        let mut config = self.load_config()?;
        if config
            .current_tenant
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(tenant_name))
        {
            config.current_tenant = None;
            self.save_config(&config)?;
        }

        Ok(())
    }

    pub fn save_token(&self, tenant_name: &str, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(tenant_name), contents)?;
        Ok(())
    }

    /// Load a cached token; expired tokens are reported as `AuthError`
    pub fn load_token(&self, tenant_name: &str) -> Result<TokenCache> {
        let token_path = self.token_cache_file(tenant_name);

        if !token_path.exists() {
            return Err(GroupSyncError::TokenNotFound);
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.expires_at < chrono::Utc::now() {
            return Err(GroupSyncError::AuthError("Token expired".into()));
        }

        Ok(token)
    }

    pub fn delete_token(&self, tenant_name: &str) -> Result<()> {
        let token_path = self.token_cache_file(tenant_name);

        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        Ok(())
    }

    /// Load a tenant from `<name>.env` (or `.env`) in the config directory
    ///
    /// ```text
    /// TENANT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_SECRET=your-secret-here
    /// CLOUD=gcc-high
    /// ```
    pub fn load_env_file(&self, name: &str) -> Result<Option<TenantConfig>> {
        let env_path = self.config_dir.join(format!("{}.env", name.to_lowercase()));
        let fallback_path = self.config_dir.join(".env");

        let path = if env_path.exists() {
            env_path
        } else if fallback_path.exists() {
            fallback_path
        } else {
            return Ok(None);
        };

        let vars = parse_env_lines(&fs::read_to_string(&path)?);
        vars_to_tenant(name, &vars).transpose()
    }

    /// Load every `[NAME]` section of `tenants.env`
    pub fn load_tenants_env(&self) -> Result<Vec<TenantConfig>> {
        let env_path = self.config_dir.join("tenants.env");

        if !env_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&env_path)?;
        let mut tenants = Vec::new();
        let mut current_section: Option<String> = None;
        let mut section_lines: Vec<&str> = Vec::new();

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                if let Some(section) = current_section.take() {
                    let vars = parse_env_lines(&section_lines.join("\n"));
                    if let Some(tenant) = vars_to_tenant(&section, &vars).transpose()? {
                        tenants.push(tenant);
                    }
                }
                current_section = Some(trimmed[1..trimmed.len() - 1].to_uppercase());
                section_lines.clear();
            } else {
                section_lines.push(trimmed);
            }
        }

        if let Some(section) = current_section {
            let vars = parse_env_lines(&section_lines.join("\n"));
            if let Some(tenant) = vars_to_tenant(&section, &vars).transpose()? {
                tenants.push(tenant);
            }
        }

        Ok(tenants)
    }

    /// Get tenant by name, checking env files when tenants.toml has no match
    pub fn get_tenant_or_env(&self, name: &str) -> Result<TenantConfig> {
        if let Ok(tenant) = self.get_tenant(name) {
            return Ok(tenant);
        }

        if let Some(tenant) = self
            .load_tenants_env()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        if let Some(tenant) = self.load_env_file(name)? {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        Err(GroupSyncError::TenantNotFound(name.to_string()))
    }
}

/// Parse `KEY=VALUE` lines, upper-casing keys and stripping quotes
fn parse_env_lines(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                &value[1..value.len() - 1]
            } else {
                value
            };
            vars.insert(key.trim().to_uppercase(), value.to_string());
        }
    }

    vars
}

fn vars_to_tenant(name: &str, vars: &HashMap<String, String>) -> Option<Result<TenantConfig>> {
    let tenant_id = vars.get("TENANT_ID")?;
    let client_id = vars.get("CLIENT_ID")?;
    let client_secret = vars.get("CLIENT_SECRET").cloned();

    let cloud = match vars.get("CLOUD") {
        Some(value) => match value.parse::<Cloud>() {
            Ok(cloud) => cloud,
            Err(e) => return Some(Err(e)),
        },
        None => Cloud::default(),
    };

    Some(Ok(TenantConfig {
        name: name.to_string(),
        tenant_id: tenant_id.clone(),
        client_id: client_id.clone(),
        auth_type: if client_secret.is_some() {
            AuthType::ClientCredentials
        } else {
            AuthType::DeviceCode
        },
        client_secret,
        cloud,
        description: vars.get("NAME").or_else(|| vars.get("DESCRIPTION")).cloned(),
    }))
}
