//! Configuration management

use std::{net::IpAddr, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Port's EU egress addresses, the only callers admitted by default.
pub const DEFAULT_ALLOWED_IPS: [&str; 3] = ["35.156.37.90", "3.71.36.69", "52.58.133.79"];

/// Bare numeric environment names honoured for compatibility with existing deployments.
const LEGACY_ENV_KEYS: [&str; 2] = ["PORT", "RATE_LIMIT"];

/// Variables read verbatim as strings, skipping figment's value sniffing,
/// in merge order. An all-digit secret must stay a string.
const VERBATIM_ENV: [&str; 3] = [
    "MOCK_MCP_SECURITY__MCP_SECRET",
    "MCP_SECRET",
    "ENFORCE_IP_WHITELIST",
];

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before secrets are resolved.
    /// Paths support ~ expansion; later files override earlier ones.
    pub env_files: Vec<String>,
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Gate configuration (allow-list, rate limit, shared secret)
    pub security: SecurityConfig,
    /// Authorization-code stub configuration
    pub oauth: OAuthStubConfig,
    /// Text-generation backend configuration
    pub llm: LlmConfig,
    /// Prompt template configuration
    pub prompts: PromptsConfig,
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and the environment
    ///
    /// Precedence (lowest to highest): defaults, YAML file, `MOCK_MCP_*`
    /// variables (`__` separates nested keys), then the bare `PORT`,
    /// `RATE_LIMIT`, `MCP_SECRET` and `ENFORCE_IP_WHITELIST` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment
            .merge(
                Env::prefixed("MOCK_MCP_")
                    .ignore(&["security__mcp_secret"])
                    .split("__"),
            )
            .merge(
                Env::raw()
                    .only(&LEGACY_ENV_KEYS)
                    .map(|key| legacy_env_key(key.as_str()).into()),
            );
        for name in VERBATIM_ENV {
            if let Ok(value) = std::env::var(name) {
                figment = figment.merge(Serialized::default(legacy_env_key(name), value));
            }
        }

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.security.rate_limit_window.is_zero() {
            return Err(Error::Config(
                "security.rate_limit_window must be greater than zero".to_string(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::Config(
                "llm.max_tokens must be greater than zero".to_string(),
            ));
        }
        self.security.allowed_ip_set()?;
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Map a bare legacy variable name to its figment key path
fn legacy_env_key(name: &str) -> &'static str {
    match name.to_ascii_uppercase().as_str() {
        "PORT" => "server.port",
        "RATE_LIMIT" => "security.rate_limit",
        "MCP_SECRET" | "MOCK_MCP_SECURITY__MCP_SECRET" => "security.mcp_secret",
        "ENFORCE_IP_WHITELIST" => "security.enforce_ip_allowlist",
        _ => "unmapped",
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally visible base URL used as the OAuth issuer.
    /// Derived from `X-Forwarded-Proto`/`Host` when unset.
    pub public_url: Option<String>,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: None,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Optional shared secret; an empty value disables the check
    #[serde(deserialize_with = "lenient::text")]
    pub mcp_secret: Option<String>,
    /// Requests admitted per caller within `rate_limit_window`
    pub rate_limit: u32,
    /// Trailing window for the rate limit
    #[serde(with = "humantime_serde")]
    pub rate_limit_window: Duration,
    /// Reject callers outside `allowed_ips` (loopback is always admitted).
    /// Only `true`, in any case, switches it on.
    #[serde(deserialize_with = "lenient::flag")]
    pub enforce_ip_allowlist: bool,
    /// Admitted caller addresses
    pub allowed_ips: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mcp_secret: None,
            rate_limit: 60,
            rate_limit_window: Duration::from_secs(60),
            enforce_ip_allowlist: true,
            allowed_ips: DEFAULT_ALLOWED_IPS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SecurityConfig {
    /// The shared secret, if one is configured and non-empty
    #[must_use]
    pub fn shared_secret(&self) -> Option<&str> {
        self.mcp_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Parse `allowed_ips` into addresses
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for the first entry that is not an IP address.
    pub fn allowed_ip_set(&self) -> Result<Vec<IpAddr>> {
        self.allowed_ips
            .iter()
            .map(|raw| {
                raw.trim().parse::<IpAddr>().map_err(|e| {
                    Error::Config(format!("security.allowed_ips entry '{raw}': {e}"))
                })
            })
            .collect()
    }
}

/// Authorization-code stub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthStubConfig {
    /// Reject unknown or replayed codes at `/token` instead of issuing a token anyway
    pub strict_code_exchange: bool,
}

/// Text-generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Messages API endpoint
    pub api_url: String,
    /// Model used for every generation
    pub model: String,
    /// Output token bound
    pub max_tokens: u32,
    /// `anthropic-version` header value
    pub anthropic_version: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Secrets Manager id consulted when the variable is unset
    pub secret_id: String,
    /// Secrets Manager region
    pub secret_region: String,
    /// Optional request timeout; unset means the call may wait indefinitely
    #[serde(with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1000,
            anthropic_version: "2023-06-01".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            secret_id: "mock-mcp-server/anthropic-api-key".to_string(),
            secret_region: "eu-west-1".to_string(),
            timeout: None,
        }
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory whose `<vendor>.md` files replace the bundled prompts
    pub directory: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            directory: "prompts".to_string(),
        }
    }
}

/// Scalars as the legacy deployment read them, whatever type figment sniffed
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        UInt(u64),
        Float(f64),
        Text(String),
    }

    impl Scalar {
        fn into_text(self) -> String {
            match self {
                Self::Bool(b) => b.to_string(),
                Self::Int(n) => n.to_string(),
                Self::UInt(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
                Self::Text(s) => s,
            }
        }
    }

    /// `true` in any case is on; every other value is off
    pub(super) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => b,
            Scalar::Text(s) => s.eq_ignore_ascii_case("true"),
            Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_) => false,
        })
    }

    /// Optional string that may have been sniffed as a number or boolean
    pub(super) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parse "30s", "5m", "100ms" or a bare number of seconds
    pub(crate) fn parse(s: &str) -> Result<Duration, std::num::ParseIntError> {
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>().map(|m| Duration::from_secs(m * 60))
        } else {
            s.parse::<u64>().map(Duration::from_secs)
        }
    }

    /// `Option<Duration>` variant
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional duration
        ///
        /// # Errors
        ///
        /// Returns a serialization error if the serializer fails.
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional duration
        ///
        /// # Errors
        ///
        /// Returns a deserialization error if the string cannot be parsed as a duration.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
