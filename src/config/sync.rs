use serde::Deserialize;
use serde::Serialize;

/// Identity and polling parameters for one engine instance
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Application id registered with the remote configuration service
    #[serde(default)]
    pub app_id: String,

    /// Cluster the application is deployed in
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Base URL of the remote configuration service
    #[serde(default = "default_config_server_url")]
    pub config_server_url: String,

    /// Namespaces registered before the first poll
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Server-side hold window for a notification long poll, in seconds.
    /// Also the fixed backoff delay after a failed poll.
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_in_secs: u64,

    /// Address reported for grey-release rules; auto-detected when unset
    #[serde(default)]
    pub client_ip: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            cluster: default_cluster(),
            config_server_url: default_config_server_url(),
            namespaces: default_namespaces(),
            long_poll_timeout_in_secs: default_long_poll_timeout(),
            client_ip: None,
        }
    }
}

fn default_cluster() -> String {
    "default".to_string()
}
fn default_config_server_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_namespaces() -> Vec<String> {
    vec!["application".to_string()]
}
fn default_long_poll_timeout() -> u64 {
    60
}
