//! Chat-completion gateway backend
//!
//! Speaks the `/chat/completions` convention: bearer auth, `model` +
//! `messages` body, `choices[]` envelope. Streaming uses server-sent
//! events terminated by `data: [DONE]`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use log::{debug, trace, error};

use crate::error::{BackendErrorKind, Error};
use crate::request::GenerationParams;
use crate::response::{
  ChatCompletionResponse, FinishReason, GatewayMetadata,
  ProviderMetadata, RawBackendResponse, StreamEvent, Usage,
};
use crate::router::Credential;

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage
{   pub role: &'static str
  , pub content: String
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayChatRequest
{   pub model: String
  , pub messages: Vec<GatewayMessage>
  , pub max_tokens: u32
  , pub temperature: f32
  , pub stream: bool
}

impl GatewayChatRequest
{   pub fn new(
      model_id: &str
    , prompt: &str
    , params: &GenerationParams
    , stream: bool
    ) -> Self
    {   GatewayChatRequest
        {   model: model_id.to_string()
          , messages: vec![
              GatewayMessage
              {   role: "user"
                , content: prompt.to_string()
              }
            ]
          , max_tokens: params.max_tokens
          , temperature: params.temperature
          , stream
        }
    }
}

// ===== Client =====

pub struct GatewayClient
{   credential: Credential
  , base_url: String
  , http_client: reqwest::Client
}

impl GatewayClient
{   pub fn new(
      credential: Credential
    , endpoint: &crate::config::EndpointConfig
    ) -> crate::error::Result<Self>
    {   debug!("Creating GatewayClient for {}", endpoint.base_url);
        Ok(GatewayClient
        {   credential
          , base_url: endpoint.base_url.clone()
          , http_client: super::build_http_client(endpoint)?
        })
    }

    /// Non-streaming chat completion
    pub async fn complete(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<ChatCompletionResponse>
    {   debug!("Gateway complete for model: {}", model_id);
        let response = self.send(model_id, prompt, params, false).await?;

        let body = response.text().await.map_err(|e| {
          error!("Gateway body read error: {}", e);
          Error::backend(BackendErrorKind::Gateway, None, e.to_string())
        })?;

        serde_json::from_str::<ChatCompletionResponse>(&body)
          .map_err(|e| {
            error!("Gateway parse error: {}", e);
            Error::malformed(format!("gateway response: {}", e))
          })
    }

    /// POST and check status; error bodies become `Backend` errors
    async fn send(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    , stream: bool
    ) -> crate::error::Result<reqwest::Response>
    {   let request
          = GatewayChatRequest::new(model_id, prompt, params, stream);
        trace!("Gateway request: {:?}", request);

        let url = super::join_url(&self.base_url, CHAT_COMPLETIONS_PATH);
        let response = self.http_client
          .post(&url)
          .bearer_auth(self.credential.expose())
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("Gateway HTTP error: {}", e);
            Error::backend(BackendErrorKind::Gateway, None, e.to_string())
          })?;

        let status = response.status();
        trace!("Gateway response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gateway API error {}: {}", status, error_text);
            return Err(Error::backend(
              BackendErrorKind::Gateway,
              Some(status.as_u16()),
              error_message(&error_text)
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl super::BackendClient for GatewayClient
{   fn kind(&self) -> crate::ProviderKind
    {   crate::ProviderKind::Gateway
    }

    async fn call(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<RawBackendResponse>
    {   self.complete(model_id, prompt, params)
          .await
          .map(RawBackendResponse::Gateway)
    }

    async fn call_stream(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<super::EventStream>
    {   debug!("Gateway stream for model: {}", model_id);
        let response = self.send(model_id, prompt, params, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
          let mut acc = SseAccumulator::default();
          let mut buffer: Vec<u8> = Vec::new();

          'read: while let Some(chunk) = bytes.next().await
          {   match chunk
              {   Ok(chunk) => buffer.extend_from_slice(&chunk)
                , Err(e) => {
                    error!("Gateway stream read error: {}", e);
                    yield Err(Error::backend(
                      BackendErrorKind::Gateway, None, e.to_string()
                    ));
                    return;
                  }
              }

              while let Some(pos) = buffer.iter().position(|b| *b == b'\n')
              {   let line: Vec<u8> = buffer.drain(..=pos).collect();
                  match acc.feed_line(&String::from_utf8_lossy(&line))
                  {   Ok(Some(delta)) => {
                        yield Ok(StreamEvent::TextDelta(delta));
                      }
                    , Ok(None) => {}
                    , Err(e) => {
                        yield Err(e);
                        return;
                      }
                  }
                  if acc.is_done()
                  {   break 'read;
                  }
              }
          }

          // trailing line without a newline
          if !acc.is_done() && !buffer.is_empty()
          {   match acc.feed_line(&String::from_utf8_lossy(&buffer))
              {   Ok(Some(delta)) => {
                      yield Ok(StreamEvent::TextDelta(delta));
                    }
                , Ok(None) => {}
                , Err(e) => {
                    yield Err(e);
                    return;
                  }
              }
          }

          yield Ok(acc.finish());
        };

        Ok(Box::pin(stream))
    }
}

/// Pull `error.message` out of an error body when present
fn error_message(body: &str) -> String
{   serde_json::from_str::<Value>(body)
      .ok()
      .and_then(|v| {
        v["error"]["message"].as_str().map(String::from)
      })
      .unwrap_or_else(|| body.to_string())
}

// ===== SSE =====

/// Folds gateway SSE lines into text deltas and a final event
#[derive(Debug, Default)]
pub struct SseAccumulator
{   done: bool
  , finish_reason: Option<String>
  , native_finish_reason: Option<String>
  , usage: Usage
  , response_id: Option<String>
  , model: Option<String>
}

impl SseAccumulator
{   pub fn is_done(&self) -> bool
    {   self.done
    }

    /// Returns the text delta carried by a `data:` line, if any
    pub fn feed_line(&mut self, line: &str)
      -> crate::error::Result<Option<String>>
    {   let line = line.trim_end();
        if line.is_empty() || line.starts_with(':')
        {   return Ok(None);
        }
        let data = match line.strip_prefix("data:")
        {   Some(d) => d.trim()
          , None => return Ok(None)
        };
        if data == "[DONE]"
        {   self.done = true;
            return Ok(None);
        }

        let v: Value = serde_json::from_str(data).map_err(|e| {
          error!("Invalid JSON in gateway stream: {}", e);
          Error::malformed(format!("gateway stream chunk: {}", e))
        })?;

        if let Some(message) = v["error"]["message"].as_str()
        {   error!("Gateway stream error: {}", message);
            let status = v["error"]["code"].as_u64()
              .and_then(|c| u16::try_from(c).ok());
            return Err(Error::backend(
              BackendErrorKind::Gateway, status, message
            ));
        }

        if self.response_id.is_none()
        {   self.response_id = v["id"].as_str().map(String::from);
        }
        if self.model.is_none()
        {   self.model = v["model"].as_str().map(String::from);
        }
        if let Some(usage) = v.get("usage").filter(|u| !u.is_null())
        {   self.usage = Usage::new(
              usage["prompt_tokens"].as_u64().unwrap_or(0),
              usage["completion_tokens"].as_u64().unwrap_or(0)
            );
        }

        let choice = &v["choices"][0];
        if let Some(reason) = choice["finish_reason"].as_str()
        {   self.finish_reason = Some(reason.to_string());
        }
        if let Some(reason) = choice["native_finish_reason"].as_str()
        {   self.native_finish_reason = Some(reason.to_string());
        }

        Ok(choice["delta"]["content"]
          .as_str()
          .filter(|s| !s.is_empty())
          .map(String::from))
    }

    pub fn finish(self) -> StreamEvent
    {   StreamEvent::Finish
        {   finish_reason: FinishReason::from_raw(
              self.finish_reason.as_deref()
            )
          , usage: self.usage
          , provider_metadata: ProviderMetadata::Gateway(GatewayMetadata
            {   response_id: self.response_id
              , model: self.model
              , native_finish_reason: self.native_finish_reason
                  .or(self.finish_reason)
            })
        }
    }
}
