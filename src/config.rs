//! Configuration for REPLYAI backends and generation defaults
//!
//! Read once (environment, JSON file, or code) into an immutable
//! [`ReplyAiConfig`] that is passed by value into the router.

use serde::{Deserialize, Serialize};
use log::debug;

pub const DEFAULT_GATEWAY_BASE_URL: &str
  = "https://openrouter.ai/api/v1";
pub const DEFAULT_EDGE_BASE_URL: &str
  = "https://ondemand.thetaedgecloud.com/infer_request";

pub const ENV_USE_GATEWAY: &str = "REPLYAI_USE_GATEWAY";
pub const ENV_GATEWAY_API_KEY: &str = "REPLYAI_GATEWAY_API_KEY";
pub const ENV_EDGE_API_KEY: &str = "REPLYAI_EDGE_API_KEY";
pub const ENV_GATEWAY_BASE_URL: &str = "REPLYAI_GATEWAY_BASE_URL";
pub const ENV_EDGE_BASE_URL: &str = "REPLYAI_EDGE_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "REPLYAI_TIMEOUT_SECS";
pub const ENV_MAX_TOKENS: &str = "REPLYAI_MAX_TOKENS";
pub const ENV_TEMPERATURE: &str = "REPLYAI_TEMPERATURE";
pub const ENV_CONCURRENCY: &str = "REPLYAI_CONCURRENCY";

/// Backend selection and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings
{   /// Route to the gateway instead of the edge backend
    #[serde(default)]
    pub use_gateway: bool
  , #[serde(default)]
    pub gateway_api_key: Option<String>
  , #[serde(default)]
    pub edge_api_key: Option<String>
}

/// Endpoint configuration for one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig
{   /// API base URL
    pub base_url: String
  , /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>
}

impl EndpointConfig
{   pub fn new(base_url: impl Into<String>) -> Self
    {   EndpointConfig
        {   base_url: base_url.into()
          , timeout_secs: None
        }
    }
}

/// Sampling defaults and variation fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults
{   pub max_tokens: u32
  , pub temperature: f32
  , /// Max variations in flight; 1 keeps generation strictly sequential
    pub concurrency: usize
}

impl Default for GenerationDefaults
{   fn default() -> Self
    {   GenerationDefaults
        {   max_tokens: 512
          , temperature: 0.8
          , concurrency: 1
        }
    }
}

/// REPLYAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyAiConfig
{   #[serde(default)]
    pub provider: ProviderSettings
  , #[serde(default = "default_gateway_endpoint")]
    pub gateway: EndpointConfig
  , #[serde(default = "default_edge_endpoint")]
    pub edge: EndpointConfig
  , #[serde(default)]
    pub generation: GenerationDefaults
}

fn default_gateway_endpoint() -> EndpointConfig
{   EndpointConfig::new(DEFAULT_GATEWAY_BASE_URL)
}

fn default_edge_endpoint() -> EndpointConfig
{   EndpointConfig::new(DEFAULT_EDGE_BASE_URL)
}

impl Default for ReplyAiConfig
{   fn default() -> Self
    {   ReplyAiConfig
        {   provider: ProviderSettings::default()
          , gateway: default_gateway_endpoint()
          , edge: default_edge_endpoint()
          , generation: GenerationDefaults::default()
        }
    }
}

impl ReplyAiConfig
{   /// Read the process environment once
    pub fn from_env() -> crate::error::Result<Self>
    {   Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> crate::error::Result<Self>
    where
      F: Fn(&str) -> Option<String>
    {   let get = |key: &str| {
          lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        };

        let mut config = ReplyAiConfig::default();

        if let Some(flag) = get(ENV_USE_GATEWAY)
        {   config.provider.use_gateway = parse_flag(&flag);
        }
        config.provider.gateway_api_key = get(ENV_GATEWAY_API_KEY);
        config.provider.edge_api_key = get(ENV_EDGE_API_KEY);

        if let Some(url) = get(ENV_GATEWAY_BASE_URL)
        {   config.gateway.base_url = url;
        }
        if let Some(url) = get(ENV_EDGE_BASE_URL)
        {   config.edge.base_url = url;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS)
        {   let secs: u64 = parse_number(ENV_TIMEOUT_SECS, &raw)?;
            config.gateway.timeout_secs = Some(secs);
            config.edge.timeout_secs = Some(secs);
        }
        if let Some(raw) = get(ENV_MAX_TOKENS)
        {   config.generation.max_tokens
              = parse_number(ENV_MAX_TOKENS, &raw)?;
        }
        if let Some(raw) = get(ENV_TEMPERATURE)
        {   config.generation.temperature
              = parse_number(ENV_TEMPERATURE, &raw)?;
        }
        if let Some(raw) = get(ENV_CONCURRENCY)
        {   config.generation.concurrency
              = parse_number(ENV_CONCURRENCY, &raw)?;
        }

        debug!(
          "Loaded config: use_gateway={}, concurrency={}",
          config.provider.use_gateway,
          config.generation.concurrency
        );
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<std::path::Path>)
      -> crate::error::Result<Self>
    {   let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
          crate::error::Error::Configuration(
            format!("cannot read {}: {}", path.display(), e)
          )
        })?;
        serde_json::from_str(&raw).map_err(|e| {
          crate::error::Error::Configuration(
            format!("invalid config {}: {}", path.display(), e)
          )
        })
    }

    /// Backend kind selected by the flag; edge when unset
    pub fn selected_kind(&self) -> crate::ProviderKind
    {   if self.provider.use_gateway
        {   crate::ProviderKind::Gateway
        } else
        {   crate::ProviderKind::Edge
        }
    }
}

fn parse_flag(raw: &str) -> bool
{   matches!(
      raw.to_ascii_lowercase().as_str(),
      "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str)
  -> crate::error::Result<T>
{   raw.parse::<T>().map_err(|_| {
      crate::error::Error::Configuration(
        format!("{} is not a valid number: {}", key, raw)
      )
    })
}
