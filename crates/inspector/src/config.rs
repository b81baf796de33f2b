//! Configuration for the [`Interceptor`](crate::Interceptor).
//!
//! [`InspectorConfig`] is built once and is immutable afterwards. Path
//! patterns are compiled at build time; anything that is not a valid
//! regular expression fails the whole build.
//!
//! ```ignore
//! use inspector::InspectorConfig;
//!
//! let config = InspectorConfig::builder()
//!     .app_name("billing")
//!     .path("^/invoices")
//!     .method("POST")
//!     .status(500)
//!     .key("billing-reports")
//!     .build()?;
//! ```

use crate::error::{ConfigError, InspectorError};
use crate::filter::Filters;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Default list/channel name for delivered reports.
pub const DEFAULT_KEY: &str = "reports";

/// Prefix for environment-supplied configuration.
pub const ENV_PREFIX: &str = "INSPECT_";

/// Callback invoked when reporting a call fails.
pub type ErrorCallback = Arc<dyn Fn(&InspectorError) + Send + Sync>;

/// When delivery happens relative to returning the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Push and publish complete before the response is returned.
    #[default]
    Inline,
    /// Push and publish run on a spawned task; one attempt per report.
    Background,
}

impl FromStr for Delivery {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(Self::Inline),
            "background" => Ok(Self::Background),
            other => Err(ConfigError::InvalidDelivery(other.to_string())),
        }
    }
}

/// A path filter element, either source text or an already compiled regex.
#[derive(Debug, Clone)]
pub enum PathPattern {
    Source(String),
    Compiled(Regex),
}

impl PathPattern {
    fn compile(self) -> Result<Regex, ConfigError> {
        match self {
            PathPattern::Compiled(re) => Ok(re),
            PathPattern::Source(pattern) => {
                Regex::new(&pattern).map_err(|source| ConfigError::InvalidPathPattern {
                    pattern,
                    source,
                })
            }
        }
    }
}

impl From<&str> for PathPattern {
    fn from(s: &str) -> Self {
        PathPattern::Source(s.to_string())
    }
}

impl From<String> for PathPattern {
    fn from(s: String) -> Self {
        PathPattern::Source(s)
    }
}

impl From<Regex> for PathPattern {
    fn from(re: Regex) -> Self {
        PathPattern::Compiled(re)
    }
}

impl From<&Regex> for PathPattern {
    fn from(re: &Regex) -> Self {
        PathPattern::Compiled(re.clone())
    }
}

/// Immutable interceptor configuration.
#[derive(Clone)]
pub struct InspectorConfig {
    pub(crate) hostname: String,
    pub(crate) app_name: String,
    pub(crate) filters: Filters,
    pub(crate) key: String,
    pub(crate) delivery: Delivery,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl InspectorConfig {
    /// Start building a configuration.
    pub fn builder() -> InspectorConfigBuilder {
        InspectorConfigBuilder::default()
    }

    /// Configuration that reports every exchange, with all defaults.
    pub fn report_all() -> Self {
        Self {
            hostname: default_hostname(),
            app_name: default_app_name(),
            filters: Filters::default(),
            key: DEFAULT_KEY.to_string(),
            delivery: Delivery::Inline,
            on_error: None,
        }
    }

    /// Load configuration from `INSPECT_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, without
    /// overriding variables that are already set. List values
    /// (`INSPECT_PATH`, `INSPECT_METHOD`, `INSPECT_STATUS`) are
    /// comma-separated, so path patterns containing a comma cannot be
    /// supplied this way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = envy::prefixed(ENV_PREFIX).from_env::<EnvSettings>()?;
        settings.into_builder()?.build()
    }

    /// Load configuration from explicit `(name, value)` pairs, using the
    /// same names as [`InspectorConfig::from_env`].
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let settings = envy::prefixed(ENV_PREFIX).from_iter::<_, EnvSettings>(vars)?;
        settings.into_builder()?.build()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// List and channel name used for delivery.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub(crate) fn on_error(&self) -> Option<&ErrorCallback> {
        self.on_error.as_ref()
    }
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self::report_all()
    }
}

impl std::fmt::Debug for InspectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorConfig")
            .field("hostname", &self.hostname)
            .field("app_name", &self.app_name)
            .field("filters", &self.filters)
            .field("key", &self.key)
            .field("delivery", &self.delivery)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Builder for [`InspectorConfig`].
#[derive(Default)]
pub struct InspectorConfigBuilder {
    hostname: Option<String>,
    app_name: Option<String>,
    paths: Vec<PathPattern>,
    methods: Vec<String>,
    statuses: Vec<u16>,
    key: Option<String>,
    delivery: Delivery,
    on_error: Option<ErrorCallback>,
}

impl InspectorConfigBuilder {
    /// Name of the reporting node. Defaults to the machine's hostname.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Name of the logical application. Defaults to the executable name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Add a path pattern. A request is reportable on this dimension when
    /// any pattern matches its path. Repeated source text is kept once;
    /// prebuilt regexes are always kept.
    pub fn path(mut self, pattern: impl Into<PathPattern>) -> Self {
        self.paths.push(pattern.into());
        self
    }

    /// Add multiple path patterns.
    pub fn paths(mut self, patterns: impl IntoIterator<Item = impl Into<PathPattern>>) -> Self {
        self.paths.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add an HTTP verb. Matching is case-sensitive.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    /// Add multiple HTTP verbs.
    pub fn methods(mut self, methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Add a response status code.
    pub fn status(mut self, status: u16) -> Self {
        self.statuses.push(status);
        self
    }

    /// Add multiple response status codes.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    /// List and channel name for delivery. Defaults to `"reports"`.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Inline (default) or background delivery.
    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Set a callback invoked whenever reporting a call fails.
    ///
    /// The response returned to the caller is never affected; this is
    /// where an integrator decides what a failed report means.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InspectorError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<InspectorConfig, ConfigError> {
        // Source text identifies a pattern only when it was compiled here;
        // a prebuilt regex may carry flags that `as_str` does not show.
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for pattern in self.paths {
            match pattern {
                PathPattern::Source(source) => {
                    if seen.insert(source.clone()) {
                        paths.push(PathPattern::Source(source).compile()?);
                    }
                }
                compiled @ PathPattern::Compiled(_) => paths.push(compiled.compile()?),
            }
        }

        if let Some(bad) = self.statuses.iter().find(|s| !(100..=999).contains(*s)) {
            return Err(ConfigError::InvalidStatus(*bad));
        }

        Ok(InspectorConfig {
            hostname: self.hostname.unwrap_or_else(default_hostname),
            app_name: self.app_name.unwrap_or_else(default_app_name),
            filters: Filters {
                paths,
                methods: self.methods.into_iter().collect(),
                statuses: self.statuses.into_iter().collect(),
            },
            key: self.key.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            delivery: self.delivery,
            on_error: self.on_error,
        })
    }
}

/// `INSPECT_*` environment variables.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    hostname: Option<String>,
    app_name: Option<String>,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    method: Vec<String>,
    #[serde(default)]
    status: Vec<u16>,
    key: Option<String>,
    delivery: Option<String>,
}

impl EnvSettings {
    fn into_builder(self) -> Result<InspectorConfigBuilder, ConfigError> {
        let mut builder = InspectorConfig::builder()
            .paths(self.path.into_iter().filter(|p| !p.is_empty()))
            .methods(self.method.into_iter().filter(|m| !m.is_empty()))
            .statuses(self.status);
        if let Some(hostname) = self.hostname {
            builder = builder.hostname(hostname);
        }
        if let Some(app_name) = self.app_name {
            builder = builder.app_name(app_name);
        }
        if let Some(key) = self.key {
            builder = builder.key(key);
        }
        if let Some(delivery) = self.delivery {
            builder = builder.delivery(delivery.trim().parse()?);
        }
        Ok(builder)
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "inspector".to_string())
}
