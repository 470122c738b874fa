//! # Ingest endpoint provisioning.
//!
//! Before supervision starts, each pipeline needs a target URI. This module
//! talks to a Graph-style live-video API: create an unpublished live video,
//! then fetch its ingest details. The supervision core only ever sees the
//! resulting `(name, source, target)` tuples; a live whose target cannot be
//! obtained is dropped with a logged reason and never retried.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::command::FfmpegCommand;
use crate::error::RuntimeError;
use crate::worker::PipelineSpec;

const GRAPH_BASE: &str = "https://graph.facebook.com";
const DETAIL_FIELDS: &str = "id,stream_url,secure_stream_url,stream_key,dash_preview_url";

/// Ingest details of one live video, as returned by the API.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LiveDetails {
    pub id: String,
    pub stream_url: Option<String>,
    pub secure_stream_url: Option<String>,
    pub stream_key: Option<String>,
    pub dash_preview_url: Option<String>,
}

/// One successfully provisioned ingest endpoint.
#[derive(Clone, Debug)]
pub struct ProvisionedLive {
    pub id: String,
    pub target: String,
    pub dash_preview_url: Option<String>,
}

#[derive(Deserialize)]
struct CreateLiveResponse {
    id: Option<String>,
}

/// Minimal Graph API client for live-video provisioning.
pub struct GraphClient {
    http: Client,
    base: String,
    token: String,
}

impl GraphClient {
    pub fn new(token: impl Into<String>, api_version: &str) -> Self {
        Self::with_base_url(token, format!("{GRAPH_BASE}/{api_version}"))
    }

    /// Override the API base URL (alternate deployments, tests).
    pub fn with_base_url(token: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into(),
            token: token.into(),
        }
    }

    /// Creates `count` unpublished live videos and resolves their ingest
    /// targets. Per-item failures are logged and dropped; the returned list
    /// holds only the lives that produced a usable target.
    pub async fn provision(&self, count: usize) -> Vec<ProvisionedLive> {
        let mut lives = Vec::with_capacity(count);
        for i in 1..=count {
            let title = format!("AutoStream #{i}");
            match self.provision_one(&title).await {
                Ok(Some(live)) => {
                    info!(id = %live.id, target = %live.target, "provisioned live video");
                    lives.push(live);
                }
                Ok(None) => {
                    warn!(title = %title, "live video has no stream_url or stream_key, dropping");
                }
                Err(err) => {
                    warn!(title = %title, error = %err, "failed to provision live video, dropping");
                }
            }
        }
        lives
    }

    async fn provision_one(&self, title: &str) -> Result<Option<ProvisionedLive>, RuntimeError> {
        let id = self.create_live(title).await?;
        let details = self.fetch_live(&id).await?;
        Ok(select_target(&details).map(|target| ProvisionedLive {
            id: details.id,
            target,
            dash_preview_url: details.dash_preview_url,
        }))
    }

    async fn create_live(&self, title: &str) -> Result<String, RuntimeError> {
        let url = format!("{}/me/live_videos", self.base);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("access_token", self.token.as_str()),
                ("published", "false"),
                ("title", title),
            ])
            .send()
            .await
            .map_err(|e| provisioning("create live video", e))?;
        let created: CreateLiveResponse = json_checked(resp, "create live video").await?;
        created.id.ok_or_else(|| RuntimeError::Provisioning {
            action: "create live video".into(),
            reason: "response missing id".into(),
        })
    }

    async fn fetch_live(&self, id: &str) -> Result<LiveDetails, RuntimeError> {
        let url = format!("{}/{id}", self.base);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("access_token", self.token.as_str()),
                ("fields", DETAIL_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| provisioning("fetch live details", e))?;
        json_checked(resp, "fetch live details").await
    }
}

/// Picks the ingest target: `stream_url`, then `secure_stream_url`, then the
/// RTMPS fallback built from `stream_key`.
pub fn select_target(details: &LiveDetails) -> Option<String> {
    details
        .stream_url
        .clone()
        .or_else(|| details.secure_stream_url.clone())
        .or_else(|| {
            details
                .stream_key
                .as_ref()
                .map(|key| format!("rtmps://live-api-s.facebook.com:443/rtmp/{key}"))
        })
}

/// Pairs each provisioned target with a source (cycling over the source
/// list) and builds the pipeline specs to register.
pub fn pair_pipelines(
    sources: &[String],
    lives: &[ProvisionedLive],
    builder: &FfmpegCommand,
) -> Vec<PipelineSpec> {
    if sources.is_empty() {
        return Vec::new();
    }
    lives
        .iter()
        .enumerate()
        .map(|(i, live)| {
            let source = sources[i % sources.len()].clone();
            PipelineSpec::ffmpeg(
                format!("ffmpeg#{}", i + 1),
                source,
                live.target.clone(),
                builder,
            )
        })
        .collect()
}

fn provisioning(action: &str, err: reqwest::Error) -> RuntimeError {
    RuntimeError::Provisioning {
        action: action.into(),
        reason: err.to_string(),
    }
}

async fn json_checked<T: DeserializeOwned>(
    resp: reqwest::Response,
    action: &str,
) -> Result<T, RuntimeError> {
    let status = resp.status();
    let body: serde_json::Value =
        resp.json().await.map_err(|e| RuntimeError::Provisioning {
            action: action.into(),
            reason: format!("invalid JSON response: {e}"),
        })?;
    if !status.is_success() || body.get("error").is_some() {
        return Err(RuntimeError::Provisioning {
            action: action.into(),
            reason: body
                .get("error")
                .map(|v| v.to_string())
                .unwrap_or_else(|| format!("http status {status}")),
        });
    }
    serde_json::from_value(body).map_err(|e| RuntimeError::Provisioning {
        action: action.into(),
        reason: format!("unexpected response shape: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(
        stream_url: Option<&str>,
        secure: Option<&str>,
        key: Option<&str>,
    ) -> LiveDetails {
        LiveDetails {
            id: "123".into(),
            stream_url: stream_url.map(Into::into),
            secure_stream_url: secure.map(Into::into),
            stream_key: key.map(Into::into),
            dash_preview_url: None,
        }
    }

    #[test]
    fn prefers_stream_url() {
        let d = details(Some("rtmp://a"), Some("rtmps://b"), Some("key"));
        assert_eq!(select_target(&d).as_deref(), Some("rtmp://a"));
    }

    #[test]
    fn falls_back_to_secure_url_then_key() {
        let d = details(None, Some("rtmps://b"), Some("key"));
        assert_eq!(select_target(&d).as_deref(), Some("rtmps://b"));

        let d = details(None, None, Some("key"));
        assert_eq!(
            select_target(&d).as_deref(),
            Some("rtmps://live-api-s.facebook.com:443/rtmp/key")
        );
    }

    #[test]
    fn no_target_means_dropped() {
        assert!(select_target(&details(None, None, None)).is_none());
    }

    #[test]
    fn pairing_cycles_sources() {
        let sources = vec!["s1".to_string(), "s2".to_string()];
        let lives: Vec<ProvisionedLive> = (0..3)
            .map(|i| ProvisionedLive {
                id: format!("id{i}"),
                target: format!("t{i}"),
                dash_preview_url: None,
            })
            .collect();
        let specs = pair_pipelines(&sources, &lives, &FfmpegCommand::new("ffmpeg"));

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].source, "s1");
        assert_eq!(specs[1].source, "s2");
        assert_eq!(specs[2].source, "s1");
        assert_eq!(&*specs[0].name, "ffmpeg#1");
        assert_eq!(specs[2].target, "t2");
    }

    #[test]
    fn pairing_with_no_sources_is_empty() {
        let lives = vec![ProvisionedLive {
            id: "id".into(),
            target: "t".into(),
            dash_preview_url: None,
        }];
        assert!(pair_pipelines(&[], &lives, &FfmpegCommand::new("ffmpeg")).is_empty());
    }
}
