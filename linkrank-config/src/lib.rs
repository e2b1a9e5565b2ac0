//! Loader for linkrank configuration with YAML + environment overlays.
//!
//! Sources are merged in order: an optional YAML file, then `LINKRANK__`-prefixed
//! environment variables (`LINKRANK__CROWDTANGLE__API_TOKEN` overrides
//! `crowdtangle.api_token`). String values may reference `${VAR}` placeholders, which are
//! expanded after merging. Every section has defaults, so an empty source set yields a
//! usable [`LinkrankConfig`] apart from the API token.
use config::{Config, ConfigError, Environment, File};
use linkrank_common::LinkrankError;
use linkrank_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct LinkrankConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub crowdtangle: CrowdTangleConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search API access and fixed request parameters.
#[derive(Debug, Deserialize)]
pub struct CrowdTangleConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_platforms")]
    pub platforms: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for CrowdTangleConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            endpoint: default_endpoint(),
            platforms: default_platforms(),
            language: default_language(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl CrowdTangleConfig {
    /// The API token, or a configuration error when none was supplied.
    pub fn require_token(&self) -> Result<&str, LinkrankError> {
        let token = self.api_token.trim();
        if token.is_empty() || token.contains("${") {
            return Err(LinkrankError::Config(
                "crowdtangle.api_token is not set (use LINKRANK__CROWDTANGLE__API_TOKEN or the config file)"
                    .into(),
            ));
        }
        Ok(token)
    }
}

/// How long to wait after a rate-limited response, and how often.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// `None` keeps retrying for as long as the API keeps answering 429.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            max_retries: None,
        }
    }
}

impl RateLimitConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_emit_stderr")]
    pub emit_stderr: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            emit_stderr: default_emit_stderr(),
            dir: None,
            filter: default_filter(),
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.emit_stderr,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

fn default_endpoint() -> String {
    "https://api.crowdtangle.com/posts/search".into()
}
fn default_platforms() -> String {
    "facebook".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_delay_secs() -> u64 {
    60
}
fn default_emit_stderr() -> bool {
    true
}
fn default_filter() -> String {
    "info".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct LinkrankConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for LinkrankConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkrankConfigLoader {
    /// Start with no file sources. `LINKRANK__` environment overrides are applied last, in
    /// [`load`](Self::load).
    ///
    /// ```
    /// use linkrank_config::LinkrankConfigLoader;
    ///
    /// let config = LinkrankConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(config.crowdtangle.platforms, "facebook");
    /// assert_eq!(config.crowdtangle.rate_limit.delay_secs, 60);
    /// assert!(config.crowdtangle.rate_limit.max_retries.is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a config file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a config file that is skipped when missing, so environment-only setups work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use linkrank_config::LinkrankConfigLoader;
    ///
    /// let cfg = LinkrankConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "test"
    /// crowdtangle:
    ///   api_token: "example"
    ///   platforms: "instagram"
    ///   rate_limit:
    ///     delay_secs: 5
    ///     max_retries: 3
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("test"));
    /// assert_eq!(cfg.crowdtangle.require_token().unwrap(), "example");
    /// assert_eq!(cfg.crowdtangle.platforms, "instagram");
    /// assert_eq!(cfg.crowdtangle.rate_limit.max_retries, Some(3));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources with the environment on top, expand `${VAR}` placeholders and
    /// deserialize.
    ///
    /// ```
    /// use linkrank_config::LinkrankConfigLoader;
    ///
    /// unsafe { std::env::set_var("CT_DOC_TOKEN", "injected-from-env"); }
    ///
    /// let config = LinkrankConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// crowdtangle:
    ///   api_token: "${CT_DOC_TOKEN}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.crowdtangle.api_token, "injected-from-env");
    /// assert_eq!(config.crowdtangle.endpoint, "https://api.crowdtangle.com/posts/search");
    ///
    /// unsafe { std::env::remove_var("CT_DOC_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<LinkrankConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("LINKRANK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
