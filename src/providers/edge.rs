//! Edge inference backend
//!
//! One authenticated POST per call to `{base_url}/{model_id}`. No
//! retries and no incremental streaming; `call_stream` falls back to
//! the one-shot stream of [`super::BackendClient`].

use async_trait::async_trait;
use serde::Serialize;
use log::{debug, trace, error};

use crate::error::{BackendErrorKind, Error};
use crate::request::GenerationParams;
use crate::response::{EdgeResponse, RawBackendResponse};
use crate::router::Credential;

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
pub struct EdgeMessage
{   pub role: &'static str
  , pub content: String
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeInput
{   pub messages: Vec<EdgeMessage>
  , pub max_tokens: u32
  , pub temperature: f32
  , pub stream: bool
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeInferRequest
{   pub input: EdgeInput
}

impl EdgeInferRequest
{   pub fn new(prompt: &str, params: &GenerationParams) -> Self
    {   EdgeInferRequest
        {   input: EdgeInput
            {   messages: vec![
                  EdgeMessage
                  {   role: "user"
                    , content: prompt.to_string()
                  }
                ]
              , max_tokens: params.max_tokens
              , temperature: params.temperature
              , stream: false
            }
        }
    }
}

// ===== Client =====

pub struct EdgeClient
{   credential: Credential
  , base_url: String
  , http_client: reqwest::Client
}

impl EdgeClient
{   pub fn new(
      credential: Credential
    , endpoint: &crate::config::EndpointConfig
    ) -> crate::error::Result<Self>
    {   debug!("Creating EdgeClient for {}", endpoint.base_url);
        Ok(EdgeClient
        {   credential
          , base_url: endpoint.base_url.clone()
          , http_client: super::build_http_client(endpoint)?
        })
    }

    /// POST the prompt to the model's inference path
    pub async fn infer(
      &self
    , model_id: &str
    , input: &str
    , params: &GenerationParams
    ) -> crate::error::Result<EdgeResponse>
    {   debug!("Edge infer for model: {}", model_id);
        let request = EdgeInferRequest::new(input, params);
        trace!("Edge request: {:?}", request);

        let url = super::join_url(&self.base_url, model_id);
        let response = self.http_client
          .post(&url)
          .bearer_auth(self.credential.expose())
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("Edge HTTP error: {}", e);
            Error::backend(BackendErrorKind::Edge, None, e.to_string())
          })?;

        let status = response.status();
        trace!("Edge response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Edge API error {}: {}", status, error_text);
            return Err(Error::backend(
              BackendErrorKind::Edge,
              Some(status.as_u16()),
              error_text
            ));
        }

        let body = response.text().await.map_err(|e| {
          error!("Edge body read error: {}", e);
          Error::backend(BackendErrorKind::Edge, None, e.to_string())
        })?;

        serde_json::from_str::<EdgeResponse>(&body).map_err(|e| {
          error!("Edge parse error: {}", e);
          Error::malformed(format!("edge response: {}", e))
        })
    }
}

#[async_trait]
impl super::BackendClient for EdgeClient
{   fn kind(&self) -> crate::ProviderKind
    {   crate::ProviderKind::Edge
    }

    async fn call(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<RawBackendResponse>
    {   self.infer(model_id, prompt, params)
          .await
          .map(RawBackendResponse::Edge)
    }
}
