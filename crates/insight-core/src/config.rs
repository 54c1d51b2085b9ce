use crate::error::{InsightError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides `api.server_base_url`.
pub const ENV_SERVER_BASE_URL: &str = "INSIGHT_API_BASE_URL";
/// Overrides `api.client_base_url`.
pub const ENV_CLIENT_BASE_URL: &str = "INSIGHT_PUBLIC_API_BASE";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Where the API lives, as seen from each execution context.
///
/// A process inside the service network (the worker, a server-side renderer)
/// reaches the API by its service name; an operator's terminal reaches it via
/// the published address. Resolved once at startup and handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_server_base_url")]
    pub server_base_url: String,
    #[serde(default = "default_client_base_url")]
    pub client_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    Client,
}

fn default_server_base_url() -> String {
    "http://api:8000".to_string()
}

fn default_client_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_base_url: default_server_base_url(),
            client_base_url: default_client_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn base_url(&self, ctx: ExecutionContext) -> &str {
        match ctx {
            ExecutionContext::Server => &self.server_base_url,
            ExecutionContext::Client => &self.client_base_url,
        }
    }

    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_BASE_URL).filter(|u| !u.is_empty()) {
            self.server_base_url = url;
        }
        if let Some(url) = lookup(ENV_CLIENT_BASE_URL).filter(|u| !u.is_empty()) {
            self.client_base_url = url;
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Run the executor loop inside `insight serve`.
    #[serde(default = "default_true")]
    pub embedded_worker: bool,
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            embedded_worker: true,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// `executing` actions older than this are failed on worker startup.
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_stale_after_minutes() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            stale_after_minutes: default_stale_after_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// JiraConfig / KubernetesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_jira_token_env")]
    pub api_token_env: String,
}

fn default_jira_token_env() -> String {
    "JIRA_API_TOKEN".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KubeMode {
    #[default]
    Incluster,
    Kubeconfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub mode: KubeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            api: ApiConfig::default(),
            server: ServerConfig::default(),
            worker: WorkerConfig::default(),
            jira: JiraConfig::default(),
            kubernetes: KubernetesConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(InsightError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load the file and apply process environment overrides. This is the
    /// single point where ambient settings are read.
    pub fn resolve(root: &Path) -> Result<Self> {
        let mut cfg = Self::load(root)?;
        cfg.api.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, url) in [
            ("api.server_base_url", &self.api.server_base_url),
            ("api.client_base_url", &self.api.client_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} '{url}' must start with http:// or https://"),
                });
            }
        }

        if self.api.request_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "api.request_timeout_secs is 0; requests will time out immediately"
                    .to_string(),
            });
        }

        if self.jira.base_url.is_some() && self.jira.email.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "jira.base_url is set but jira.email is missing; close_jira_tickets actions will fail"
                    .to_string(),
            });
        }

        if self.kubernetes.mode == KubeMode::Kubeconfig && self.kubernetes.kubeconfig_path.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "kubernetes.mode is kubeconfig but kubeconfig_path is unset; the default kubeconfig will be used"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
