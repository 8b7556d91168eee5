//! Uniform language-model capability over one backend client
//!
//! After construction nothing above this layer branches on the
//! backend kind again.

use std::sync::Arc;
use log::{debug, error};

use crate::providers::{BackendClient, EventStream};
use crate::request::{GenerationParams, Prompt};
use crate::response::NormalizedResult;

#[derive(Clone)]
pub struct ModelAdapter
{   client: Arc<dyn BackendClient>
  , model_id: String
}

impl std::fmt::Debug for ModelAdapter
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("ModelAdapter")
          .field("kind", &self.client.kind())
          .field("model_id", &self.model_id)
          .finish()
    }
}

impl ModelAdapter
{   pub fn new(
      client: Arc<dyn BackendClient>
    , model_id: impl Into<String>
    ) -> Self
    {   ModelAdapter
        {   client
          , model_id: model_id.into()
        }
    }

    pub fn kind(&self) -> crate::ProviderKind
    {   self.client.kind()
    }

    pub fn model_id(&self) -> &str
    {   &self.model_id
    }

    /// Generate once and normalize
    pub async fn generate(
      &self
    , prompt: impl Into<Prompt>
    , params: &GenerationParams
    ) -> crate::error::Result<NormalizedResult>
    {   let text = prompt_text(prompt.into())?;
        debug!(
          "Generating with {} model {}",
          self.kind(),
          self.model_id
        );
        let raw = self.client.call(&self.model_id, &text, params).await?;
        crate::response::normalize(raw)
    }

    /// Generate as a sequence of partial events; see
    /// [`BackendClient::call_stream`] for per-backend semantics
    pub async fn stream(
      &self
    , prompt: impl Into<Prompt>
    , params: &GenerationParams
    ) -> crate::error::Result<EventStream>
    {   let text = prompt_text(prompt.into())?;
        debug!(
          "Streaming with {} model {}",
          self.kind(),
          self.model_id
        );
        self.client.call_stream(&self.model_id, &text, params).await
    }
}

fn prompt_text(prompt: Prompt) -> crate::error::Result<String>
{   match prompt.to_text()
    {   Some(text) if !text.trim().is_empty() => Ok(text)
      , _ => {
          error!("Prompt has no user text");
          Err(crate::error::Error::Validation(
            "prompt has no user text".to_string()
          ))
        }
    }
}
