use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroupSyncError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error: {0}")]
    GraphApiError(String),

    #[error("Connection to {service} failed: {reason}")]
    ConnectionFailed { service: String, reason: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Token not found. Please run 'groupsync login' first")]
    TokenNotFound,

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No {0} file found")]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, GroupSyncError>;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: the access token may have expired. Run 'groupsync login' again or pass --connect."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\nHint: the app registration needs Group.ReadWrite.All and User.Read.All with admin consent."
                }
                "Request_BadRequest" | "BadRequest" => {
                    if message.contains("already exist") {
                        "\nHint: the object is already attached to this group."
                    } else if message.contains("mailNickname") {
                        "\nHint: security groups need a mail nickname; check the exported MailNickname column."
                    } else if message.contains("mail-enabled") || message.contains("MailEnabled") {
                        "\nHint: mail-enabled security groups must be created through Exchange Online."
                    } else {
                        ""
                    }
                }
                "Request_ResourceNotFound" | "NotFound" => {
                    "\nHint: the group or directory object does not exist in this tenant."
                }
                "TooManyRequests" => "\nHint: API rate limit exceeded. Wait a moment and try again.",
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}
