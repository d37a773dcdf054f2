use crate::errors::AppError;
use std::time::Duration;

/// Default deadline for a single backend call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8000;

/// Settings for the prediction backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            anyhow::bail!("BACKEND_URL cannot be empty");
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("BACKEND_URL must start with http:// or https://");
        }
        url::Url::parse(&base_url)
            .map_err(|e| anyhow::anyhow!("BACKEND_URL is not a valid URL: {}", e))?;

        let timeout_ms: u64 = std::env::var("REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_MS.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("REQUEST_TIMEOUT_MS must be a positive integer"))?;
        if timeout_ms == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_MS must be greater than zero");
        }

        tracing::debug!("Backend URL: {}", base_url);
        tracing::debug!("Backend request timeout: {}ms", timeout_ms);

        Ok(Self {
            base_url,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// SMTP settings as read from the environment.
///
/// Every field is optional at startup; completeness is checked per request by
/// [`SmtpSettings::credentials`].
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: u16,
    /// `true` for implicit TLS (usually port 465), otherwise STARTTLS.
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
    /// The single fixed address every intervention email goes to.
    pub recipient: Option<String>,
}

/// Fully resolved SMTP settings, ready for a send.
#[derive(Clone)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub recipient: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &"[REDACTED]")
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl SmtpSettings {
    /// Resolves the settings, naming every missing variable on failure.
    pub fn credentials(&self) -> Result<SmtpCredentials, AppError> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("SMTP_HOST");
        }
        if self.user.is_none() {
            missing.push("SMTP_USER");
        }
        if self.pass.is_none() {
            missing.push("SMTP_PASS");
        }
        if self.from.is_none() {
            missing.push("SMTP_FROM");
        }
        if self.recipient.is_none() {
            missing.push("INTERVENTION_RECIPIENT");
        }

        match (
            &self.host,
            &self.user,
            &self.pass,
            &self.from,
            &self.recipient,
        ) {
            (Some(host), Some(user), Some(pass), Some(from), Some(recipient)) => {
                Ok(SmtpCredentials {
                    host: host.clone(),
                    port: self.port,
                    secure: self.secure,
                    user: user.clone(),
                    pass: pass.clone(),
                    from: from.clone(),
                    recipient: recipient.clone(),
                })
            }
            _ => Err(AppError::Configuration(format!(
                "SMTP configuration is incomplete (missing {})",
                missing.join(", ")
            ))),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.credentials().is_ok()
    }
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub smtp: SmtpSettings,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port = std::env::var("RELAY_PORT")
            .or_else(|_| std::env::var("PORT"))
            .unwrap_or_else(|_| "5050".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("RELAY_PORT must be a valid number between 1-65535"))?;

        let smtp_port = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("SMTP_PORT must be a valid number between 1-65535"))?;

        let secure = match optional_var("SMTP_SECURE").as_deref() {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(other) => anyhow::bail!("SMTP_SECURE must be true or false, got '{}'", other),
        };

        let config = Self {
            port,
            smtp: SmtpSettings {
                host: optional_var("SMTP_HOST"),
                port: smtp_port,
                secure,
                user: optional_var("SMTP_USER"),
                pass: optional_var("SMTP_PASS"),
                from: optional_var("SMTP_FROM"),
                recipient: optional_var("INTERVENTION_RECIPIENT"),
            },
        };

        // Log without sensitive values
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Relay Port: {}", config.port);
        if let Some(ref host) = config.smtp.host {
            tracing::debug!(
                "SMTP: {}:{} (secure: {})",
                host,
                config.smtp.port,
                config.smtp.secure
            );
        }
        if !config.smtp.is_complete() {
            tracing::warn!("SMTP configuration is incomplete; intervention emails will be rejected");
        }

        Ok(config)
    }
}
