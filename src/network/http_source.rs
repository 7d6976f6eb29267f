use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::LongPollOutcome;
use super::NotificationChange;
use super::RemoteConfigSource;
use crate::constants::LONG_POLL_SLACK_SECS;
use crate::utils::net;
use crate::ConfigSnapshot;
use crate::NetworkError;
use crate::NotificationId;
use crate::Settings;

/// Wire shape of an authoritative namespace fetch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigsResponse {
    #[serde(default)]
    configurations: HashMap<String, String>,
    #[serde(default)]
    release_key: String,
}

/// Wire shape of one long-poll notification entry, both directions.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationEntry {
    namespace_name: String,
    notification_id: NotificationId,
}

/// HTTP adapter for the remote configuration service.
///
/// Three endpoints back the [`RemoteConfigSource`] contract:
/// - `/configfiles/json/{app}/{cluster}/{namespace}`: cached fetch
/// - `/configs/{app}/{cluster}/{namespace}`: authoritative fetch
/// - `/notifications/v2`: notification long poll (304 = no change)
pub struct HttpConfigSource {
    client: Client,
    base_url: String,
    app_id: String,
    cluster: String,
    client_ip: String,
    long_poll_timeout: Duration,
    request_timeout: Duration,
}

impl HttpConfigSource {
    pub fn new(settings: &Settings) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(
                settings.network.connect_timeout_in_ms,
            ))
            .build()?;
        let client_ip = settings
            .sync
            .client_ip
            .clone()
            .or_else(net::local_ip)
            .unwrap_or_default();
        Ok(Self {
            client,
            base_url: settings
                .sync
                .config_server_url
                .trim_end_matches('/')
                .to_string(),
            app_id: settings.sync.app_id.clone(),
            cluster: settings.sync.cluster.clone(),
            client_ip,
            long_poll_timeout: Duration::from_secs(settings.sync.long_poll_timeout_in_secs),
            request_timeout: Duration::from_millis(settings.network.request_timeout_in_ms),
        })
    }

    pub(crate) fn configfiles_url(&self, namespace: &str) -> String {
        format!(
            "{}/configfiles/json/{}/{}/{}",
            self.base_url, self.app_id, self.cluster, namespace
        )
    }

    pub(crate) fn configs_url(&self, namespace: &str) -> String {
        format!(
            "{}/configs/{}/{}/{}",
            self.base_url, self.app_id, self.cluster, namespace
        )
    }

    pub(crate) fn notifications_url(&self) -> String {
        format!("{}/notifications/v2", self.base_url)
    }

    /// JSON array the server expects in the `notifications` query parameter.
    pub(crate) fn notifications_payload(notifications: &[(String, NotificationId)]) -> String {
        let entries: Vec<NotificationEntry> = notifications
            .iter()
            .map(|(namespace, id)| NotificationEntry {
                namespace_name: namespace.clone(),
                notification_id: *id,
            })
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

#[async_trait]
impl RemoteConfigSource for HttpConfigSource {
    async fn fetch_cached(&self, namespace: &str) -> Result<ConfigSnapshot, NetworkError> {
        let resp = self
            .client
            .get(self.configfiles_url(namespace))
            .query(&[("ip", self.client_ip.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Server {
                status: status.as_u16(),
            });
        }
        let configurations: HashMap<String, String> = resp
            .json()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))?;
        Ok(ConfigSnapshot::new(configurations, ""))
    }

    async fn fetch_uncached(&self, namespace: &str) -> Result<ConfigSnapshot, NetworkError> {
        let resp = self
            .client
            .get(self.configs_url(namespace))
            .query(&[("ip", self.client_ip.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Server {
                status: status.as_u16(),
            });
        }
        let body: ConfigsResponse = resp
            .json()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))?;
        Ok(ConfigSnapshot::new(body.configurations, body.release_key))
    }

    async fn long_poll(
        &self,
        notifications: &[(String, NotificationId)],
    ) -> Result<LongPollOutcome, NetworkError> {
        let payload = Self::notifications_payload(notifications);
        let resp = self
            .client
            .get(self.notifications_url())
            .query(&[
                ("appId", self.app_id.as_str()),
                ("cluster", self.cluster.as_str()),
                ("notifications", payload.as_str()),
            ])
            .timeout(self.long_poll_timeout + Duration::from_secs(LONG_POLL_SLACK_SECS))
            .send()
            .await?;
        let status = resp.status();
        debug!("long poll returned {}", status);

        if status == StatusCode::NOT_MODIFIED {
            return Ok(LongPollOutcome::NoChange);
        }
        if !status.is_success() {
            return Err(NetworkError::Server {
                status: status.as_u16(),
            });
        }
        let entries: Vec<NotificationEntry> = resp
            .json()
            .await
            .map_err(|e| NetworkError::Decode(e.to_string()))?;
        Ok(LongPollOutcome::Changed(
            entries
                .into_iter()
                .map(|entry| NotificationChange {
                    namespace: entry.namespace_name,
                    notification_id: entry.notification_id,
                })
                .collect(),
        ))
    }
}
