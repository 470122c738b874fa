//! # Environment-driven configuration.
//!
//! [`Config`] bundles everything the binary needs: the ffmpeg path, the
//! source list, provisioning credentials, and the supervision knobs handed
//! to the [`Supervisor`](crate::Supervisor).
//!
//! ## Environment variables
//! - `SOURCES` — comma-separated source URIs (required)
//! - `ACCESS_TOKEN` — Graph API access token (required)
//! - `FB_API_VERSION` — Graph API version (default `v24.0`)
//! - `CREATE_COUNT` — how many unpublished live videos to create (default 3)
//! - `FFMPEG_PATH` — ffmpeg binary (default `/usr/bin/ffmpeg`)
//! - `MAX_RESTARTS` — optional restart cap per pipeline (default unlimited)
//! - `ERRORS_ONLY` — forward only error stderr lines (default false)
//! - `COPY_CODECS` — restream without re-encoding (default false)

use std::env;

use crate::error::RuntimeError;
use crate::policies::RestartLimit;
use crate::supervisor::SupervisorConfig;

/// Top-level runtime configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the ffmpeg binary.
    pub ffmpeg_path: String,
    /// Source URIs; targets cycle over these.
    pub sources: Vec<String>,
    /// Graph API access token.
    pub access_token: String,
    /// Graph API version segment.
    pub api_version: String,
    /// How many ingest endpoints to provision.
    pub create_count: usize,
    /// Pass streams through instead of re-encoding.
    pub copy_codecs: bool,
    /// Supervision knobs (backoff, grace, polling, classifier).
    pub supervisor: SupervisorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: "/usr/bin/ffmpeg".into(),
            sources: Vec::new(),
            access_token: String::new(),
            api_version: "v24.0".into(),
            create_count: 3,
            copy_codecs: false,
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Config {
    /// Builds a config from the process environment.
    ///
    /// `SOURCES` and `ACCESS_TOKEN` are required; everything else has the
    /// defaults documented on the module.
    pub fn from_env() -> Result<Self, RuntimeError> {
        let mut cfg = Config::default();

        cfg.access_token = require("ACCESS_TOKEN")?;
        cfg.sources = require("SOURCES")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if cfg.sources.is_empty() {
            return Err(RuntimeError::Config {
                name: "SOURCES",
                reason: "no non-empty source URIs".into(),
            });
        }

        if let Some(v) = optional("FB_API_VERSION") {
            cfg.api_version = v;
        }
        if let Some(v) = optional("FFMPEG_PATH") {
            cfg.ffmpeg_path = v;
        }
        if let Some(v) = optional("CREATE_COUNT") {
            cfg.create_count = v.parse().map_err(|_| RuntimeError::Config {
                name: "CREATE_COUNT",
                reason: format!("not a non-negative integer: {v:?}"),
            })?;
        }
        if let Some(v) = optional("MAX_RESTARTS") {
            let max = v.parse().map_err(|_| RuntimeError::Config {
                name: "MAX_RESTARTS",
                reason: format!("not a non-negative integer: {v:?}"),
            })?;
            cfg.supervisor.worker.restarts = RestartLimit::AtMost(max);
        }
        cfg.supervisor.worker.errors_only = flag("ERRORS_ONLY");
        cfg.copy_codecs = flag("COPY_CODECS");

        Ok(cfg)
    }
}

fn require(name: &'static str) -> Result<String, RuntimeError> {
    optional(name).ok_or(RuntimeError::Config {
        name,
        reason: "required but not set".into(),
    })
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str) -> bool {
    matches!(
        optional(name).as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("True") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-global, so these tests key off unique
    // variable names only where possible and otherwise assert pure helpers.

    #[test]
    fn default_values_are_the_documented_ones() {
        let cfg = Config::default();
        assert_eq!(cfg.ffmpeg_path, "/usr/bin/ffmpeg");
        assert_eq!(cfg.api_version, "v24.0");
        assert_eq!(cfg.create_count, 3);
        assert!(!cfg.copy_codecs);
        assert_eq!(cfg.supervisor.worker.restarts, RestartLimit::Unlimited);
    }

    #[test]
    fn flag_parses_common_truthy_values() {
        env::set_var("STREAMVISOR_TEST_FLAG", "true");
        assert!(flag("STREAMVISOR_TEST_FLAG"));
        env::set_var("STREAMVISOR_TEST_FLAG", "0");
        assert!(!flag("STREAMVISOR_TEST_FLAG"));
        env::remove_var("STREAMVISOR_TEST_FLAG");
        assert!(!flag("STREAMVISOR_TEST_FLAG"));
    }
}
