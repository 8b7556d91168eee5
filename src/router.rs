//! Backend and model selection
//!
//! Pure read of an injected [`ReplyAiConfig`]: idempotent and safe to
//! call per request.

use std::sync::Arc;
use log::{debug, warn, error};

use crate::config::ReplyAiConfig;
use crate::ProviderKind;

/// Sent to the edge backend when no key is configured; it accepts
/// anonymous free-tier calls.
pub const EDGE_PLACEHOLDER_CREDENTIAL: &str = "anonymous";

/// Known free/default model ids; the first entry per kind is the default
pub const DEFAULT_MODELS: &[(ProviderKind, &str)] = &[
  (ProviderKind::Gateway, "meta-llama/llama-3.3-70b-instruct:free"),
  (ProviderKind::Gateway, "mistralai/mistral-7b-instruct:free"),
  (ProviderKind::Gateway, "google/gemma-2-9b-it:free"),
  (ProviderKind::Edge, "llama_3_1_70b"),
  (ProviderKind::Edge, "llama_3_8b"),
];

/// Default model id for a backend kind
pub fn default_model(kind: ProviderKind) -> &'static str
{   DEFAULT_MODELS
      .iter()
      .find(|(k, _)| *k == kind)
      .map(|(_, m)| *m)
      .unwrap_or("")
}

/// Known model ids for every backend kind
pub fn known_models() -> Vec<(ProviderKind, String)>
{   DEFAULT_MODELS
      .iter()
      .map(|(k, m)| (*k, m.to_string()))
      .collect()
}

/// Opaque secret; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential
{   pub fn new(secret: impl Into<String>) -> Self
    {   Credential(secret.into())
    }

    pub fn expose(&self) -> &str
    {   &self.0
    }
}

impl std::fmt::Debug for Credential
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.write_str("Credential(***)")
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider
{   pub kind: ProviderKind
  , pub credential: Credential
  , pub model_id: String
  , /// Running on the placeholder credential
    pub degraded: bool
}

pub struct ProviderRouter
{   config: ReplyAiConfig
}

impl ProviderRouter
{   pub fn new(config: ReplyAiConfig) -> Self
    {   ProviderRouter
        {   config
        }
    }

    pub fn config(&self) -> &ReplyAiConfig
    {   &self.config
    }

    /// Pick backend, credential and model; explicit ids are used verbatim
    pub fn resolve(&self, explicit_model_id: Option<&str>)
      -> crate::error::Result<ResolvedProvider>
    {   let kind = self.config.selected_kind();
        let settings = &self.config.provider;

        let (credential, degraded) = match kind
        {   ProviderKind::Gateway => {
              let key = settings.gateway_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                  error!("Gateway selected but no API key configured");
                  crate::error::Error::Configuration(
                    "gateway API key is not configured".to_string()
                  )
                })?;
              (Credential::new(key), false)
            }
          , ProviderKind::Edge => {
              match settings.edge_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
              {   Some(key) => (Credential::new(key), false)
                , None => {
                    warn!(
                      "No edge API key configured; \
                       continuing with placeholder credential"
                    );
                    (Credential::new(EDGE_PLACEHOLDER_CREDENTIAL), true)
                  }
              }
            }
        };

        let model_id = match explicit_model_id
          .filter(|m| !m.trim().is_empty())
        {   Some(m) => m.to_string()
          , None => default_model(kind).to_string()
        };

        debug!("Resolved {} backend, model {}", kind, model_id);
        Ok(ResolvedProvider
        {   kind
          , credential
          , model_id
          , degraded
        })
    }

    /// Resolve and bind the matching backend client into an adapter
    pub fn connect(&self, explicit_model_id: Option<&str>)
      -> crate::error::Result<crate::adapter::ModelAdapter>
    {   let resolved = self.resolve(explicit_model_id)?;
        let client: Arc<dyn crate::providers::BackendClient>
          = match resolved.kind
          {   ProviderKind::Gateway => Arc::new(
                crate::providers::GatewayClient::new(
                  resolved.credential,
                  &self.config.gateway
                )?
              )
            , ProviderKind::Edge => Arc::new(
                crate::providers::EdgeClient::new(
                  resolved.credential,
                  &self.config.edge
                )?
              )
          };
        Ok(crate::adapter::ModelAdapter::new(client, resolved.model_id))
    }
}
