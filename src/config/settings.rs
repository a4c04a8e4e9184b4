use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::{Serialize, Deserialize};

use crate::cloud::s3::S3Options;
use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_POOL_LIMIT, DEFAULT_REGION,
    ENV_ACCESS_KEY_ID, ENV_BUCKET_KEY, ENV_BUCKET_NAME, ENV_ENDPOINT,
    ENV_REGION, ENV_SECRET_ACCESS_KEY,
};
use crate::errors::ConfigurationError;
use crate::scheduler::ConcurrencyPolicy;
use crate::scheduler::process::WorkerCommand;

lazy_static! {
    static ref ENV_REFERENCE: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Which concurrency policy to run with.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Pool,
    FanOut,
    Cooperative,
    Isolated,
}

/// One layer of settings.
///
/// Layers come from the environment, an optional YAML file and the command
/// line; [`Settings::merge`] stacks them and [`Settings::resolve`] turns the
/// result into a [`RunConfig`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Validated, plain values handed to the enumerator, the uploader and the
/// scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub policy: PolicyKind,
    /// `None` means the policy's own default.
    pub concurrency: Option<usize>,
    pub retries: usize,
    pub task_timeout: Option<Duration>,
    pub s3: S3Options,
}

impl RunConfig {
    /// The scheduler policy these settings ask for.
    ///
    /// The isolated policy re-runs this executable's worker subcommand and
    /// hands it the resolved connection settings through its environment, so
    /// values from a settings file or the command line reach the children.
    pub fn concurrency_policy(&self) -> io::Result<ConcurrencyPolicy> {
        Ok(match self.policy {
            PolicyKind::Pool => ConcurrencyPolicy::BoundedPool {
                limit: self.concurrency.unwrap_or(DEFAULT_POOL_LIMIT),
            },
            PolicyKind::FanOut => ConcurrencyPolicy::FanOut,
            PolicyKind::Cooperative => ConcurrencyPolicy::Cooperative,
            PolicyKind::Isolated => {
                let mut worker = WorkerCommand::current_exe()?
                    .arg("--retries")
                    .arg(self.retries.to_string());

                let connection = [
                    (ENV_REGION, &self.s3.region),
                    (ENV_ENDPOINT, &self.s3.endpoint),
                    (ENV_ACCESS_KEY_ID, &self.s3.access_key_id),
                    (ENV_SECRET_ACCESS_KEY, &self.s3.secret_access_key),
                ];
                for (name, value) in connection {
                    if let Some(value) = value {
                        worker = worker.env(name, value);
                    }
                }

                ConcurrencyPolicy::Isolated {
                    worker,
                    limit: self.concurrency.unwrap_or_else(num_cpus::get),
                }
            },
        })
    }
}

impl Settings {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a layer from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            bucket: get(ENV_BUCKET_NAME),
            key_prefix: get(ENV_BUCKET_KEY),
            region: get(ENV_REGION),
            endpoint: get(ENV_ENDPOINT),
            access_key_id: get(ENV_ACCESS_KEY_ID),
            secret_access_key: get(ENV_SECRET_ACCESS_KEY),
            ..Default::default()
        }
    }

    /// Load a YAML settings file. `${VAR}` references in string values are
    /// expanded from the environment; a value that expands to nothing is unset.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigurationError::Io { path: path.to_path_buf(), source })?;

        let mut settings: Settings = serde_yaml::from_str(&content)
            .map_err(|source| ConfigurationError::Parse { path: path.to_path_buf(), source })?;

        settings.expand_env_references(|name| std::env::var(name).ok());
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize settings to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Starting point written by `init-config`.
    ///
    /// Credentials are left out; they belong in the environment.
    pub fn template() -> Self {
        Self {
            bucket: Some("my-bucket".to_string()),
            key_prefix: Some("backups".to_string()),
            region: Some(DEFAULT_REGION.to_string()),
            policy: Some(PolicyKind::Pool),
            concurrency: Some(DEFAULT_POOL_LIMIT),
            retries: Some(DEFAULT_MAX_RETRIES),
            ..Default::default()
        }
    }

    pub fn create_template_file(path: &Path) -> Result<()> {
        Self::template().save_to_yaml_file(path)?;
        info!("Created settings template at {}", path.display());
        Ok(())
    }

    /// Stack `over` on top of `self`: every value set in `over` wins.
    pub fn merge(self, over: Settings) -> Settings {
        Settings {
            bucket: over.bucket.or(self.bucket),
            key_prefix: over.key_prefix.or(self.key_prefix),
            region: over.region.or(self.region),
            endpoint: over.endpoint.or(self.endpoint),
            access_key_id: over.access_key_id.or(self.access_key_id),
            secret_access_key: over.secret_access_key.or(self.secret_access_key),
            policy: over.policy.or(self.policy),
            concurrency: over.concurrency.or(self.concurrency),
            retries: over.retries.or(self.retries),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return Err(ConfigurationError::Missing(ENV_BUCKET_NAME));
        }

        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) => return Err(ConfigurationError::Missing(ENV_SECRET_ACCESS_KEY)),
            (None, Some(_)) => return Err(ConfigurationError::Missing(ENV_ACCESS_KEY_ID)),
            _ => {},
        }

        if self.concurrency == Some(0) {
            return Err(ConfigurationError::Invalid {
                name: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigurationError::Invalid {
                name: "timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigurationError::Invalid {
                    name: ENV_ENDPOINT,
                    reason: format!("expected an http(s) URL, got {:?}", endpoint),
                });
            }
        }

        Ok(())
    }

    /// Connection settings for the uploader; needs no bucket.
    pub fn s3_options(&self) -> S3Options {
        S3Options {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    pub fn resolve(self) -> Result<RunConfig, ConfigurationError> {
        self.validate()?;

        let s3 = self.s3_options();
        Ok(RunConfig {
            bucket: self.bucket.unwrap_or_default(),
            key_prefix: self.key_prefix.unwrap_or_default(),
            policy: self.policy.unwrap_or_default(),
            concurrency: self.concurrency,
            retries: self.retries.unwrap_or(DEFAULT_MAX_RETRIES),
            task_timeout: self.timeout_secs.map(Duration::from_secs),
            s3,
        })
    }

    fn expand_env_references<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |value: &mut Option<String>| {
            if let Some(text) = value.take() {
                let expanded = ENV_REFERENCE
                    .replace_all(&text, |caps: &Captures| lookup(&caps[1]).unwrap_or_default())
                    .into_owned();
                *value = Some(expanded).filter(|v| !v.is_empty());
            }
        };

        expand(&mut self.bucket);
        expand(&mut self.key_prefix);
        expand(&mut self.region);
        expand(&mut self.endpoint);
        expand(&mut self.access_key_id);
        expand(&mut self.secret_access_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_bucket_variables() {
        let settings = Settings::from_lookup(lookup(&[
            ("BUCKET_NAME", "logs"),
            ("BUCKET_KEY", "2024/03"),
            ("ACCESS_KEY_ID", "AKIAEXAMPLE"),
            ("SECRET_ACCESS_KEY", "secret"),
            ("S3_ENDPOINT", ""),
        ]));

        assert_eq!(settings.bucket.as_deref(), Some("logs"));
        assert_eq!(settings.key_prefix.as_deref(), Some("2024/03"));
        assert_eq!(settings.access_key_id.as_deref(), Some("AKIAEXAMPLE"));
        assert_eq!(settings.endpoint, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, ConfigurationError::Missing("BUCKET_NAME")));

        let blank = Settings { bucket: Some("  ".to_string()), ..Default::default() };
        assert!(matches!(blank.validate(), Err(ConfigurationError::Missing(_))));
    }

    #[test]
    fn test_half_credential_pair_rejected() {
        let settings = Settings {
            bucket: Some("b".to_string()),
            access_key_id: Some("id".to_string()),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigurationError::Missing("SECRET_ACCESS_KEY"))));

        let settings = Settings {
            bucket: Some("b".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigurationError::Missing("ACCESS_KEY_ID"))));
    }

    #[test]
    fn test_invalid_values() {
        let base = Settings { bucket: Some("b".to_string()), ..Default::default() };

        let zero = Settings { concurrency: Some(0), ..base.clone() };
        assert!(matches!(zero.validate(), Err(ConfigurationError::Invalid { name: "concurrency", .. })));

        let endpoint = Settings { endpoint: Some("minio:9000".to_string()), ..base };
        assert!(matches!(endpoint.validate(), Err(ConfigurationError::Invalid { .. })));
    }

    #[test]
    fn test_merge_prefers_upper_layer() {
        let env = Settings {
            bucket: Some("env-bucket".to_string()),
            key_prefix: Some("env".to_string()),
            ..Default::default()
        };
        let cli = Settings {
            bucket: Some("cli-bucket".to_string()),
            retries: Some(2),
            ..Default::default()
        };

        let merged = env.merge(cli);
        assert_eq!(merged.bucket.as_deref(), Some("cli-bucket"));
        assert_eq!(merged.key_prefix.as_deref(), Some("env"));
        assert_eq!(merged.retries, Some(2));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Settings { bucket: Some("b".to_string()), ..Default::default() }
            .resolve()
            .unwrap();

        assert_eq!(config.bucket, "b");
        assert_eq!(config.key_prefix, "");
        assert_eq!(config.policy, PolicyKind::Pool);
        assert_eq!(config.retries, 0);
        assert_eq!(config.task_timeout, None);
        assert_eq!(config.s3.access_key_id, None);
    }

    #[test]
    fn test_concurrency_policy_mapping() {
        let base = Settings { bucket: Some("b".to_string()), ..Default::default() };

        let pool = base.clone().resolve().unwrap().concurrency_policy().unwrap();
        assert_eq!(pool, ConcurrencyPolicy::BoundedPool { limit: DEFAULT_POOL_LIMIT });

        let sized = Settings { concurrency: Some(4), ..base.clone() }.resolve().unwrap();
        assert_eq!(sized.concurrency_policy().unwrap().limit(), Some(4));

        let fan_out = Settings { policy: Some(PolicyKind::FanOut), ..base.clone() }.resolve().unwrap();
        assert_eq!(fan_out.concurrency_policy().unwrap(), ConcurrencyPolicy::FanOut);

        let isolated = Settings {
            policy: Some(PolicyKind::Isolated),
            concurrency: Some(2),
            ..base
        }.resolve().unwrap();
        let policy = isolated.concurrency_policy().unwrap();
        assert_eq!(policy.name(), "isolated");
        assert_eq!(policy.limit(), Some(2));
    }

    #[test]
    fn test_save_and_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dirpush.yaml");

        Settings::create_template_file(&path).unwrap();
        let loaded = Settings::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, Settings::template());

        let yaml = fs::read_to_string(&path).unwrap();
        assert!(yaml.contains("policy: pool"));
        assert!(!yaml.contains("secret_access_key"));
    }

    #[test]
    fn test_yaml_policy_names() {
        let settings: Settings = serde_yaml::from_str("bucket: b\npolicy: fan-out\nconcurrency: 4\n").unwrap();
        assert_eq!(settings.policy, Some(PolicyKind::FanOut));
        assert_eq!(settings.concurrency, Some(4));
    }

    #[test]
    fn test_env_references_expanded() {
        let mut settings = Settings {
            bucket: Some("${TEAM}-artifacts".to_string()),
            secret_access_key: Some("${MISSING_VAR}".to_string()),
            ..Default::default()
        };
        settings.expand_env_references(lookup(&[("TEAM", "infra")]));

        assert_eq!(settings.bucket.as_deref(), Some("infra-artifacts"));
        assert_eq!(settings.secret_access_key, None);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "bucket: [unclosed").unwrap();

        assert!(matches!(Settings::from_yaml_file(&path), Err(ConfigurationError::Parse { .. })));
        assert!(matches!(
            Settings::from_yaml_file(&temp_dir.path().join("absent.yaml")),
            Err(ConfigurationError::Io { .. })
        ));
    }
}
