//! Backend client implementations
//!
//! Both variants implement [`BackendClient`]; which one is used is
//! decided once, at construction time, by the router.

pub mod edge;
pub mod gateway;

pub use edge::EdgeClient;
pub use gateway::GatewayClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use log::debug;

use crate::request::GenerationParams;
use crate::response::{RawBackendResponse, StreamEvent};

pub type EventStream
  = BoxStream<'static, crate::error::Result<StreamEvent>>;

/// Capability shared by every upstream inference API
#[async_trait]
pub trait BackendClient: Send + Sync
{   fn kind(&self) -> crate::ProviderKind;

    /// One authenticated non-streaming call
    async fn call(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<RawBackendResponse>;

    /// Streamed call. The default is a one-shot stream: one
    /// `TextDelta` with the full text, then `Finish`. It does not
    /// deliver anything incrementally.
    async fn call_stream(
      &self
    , model_id: &str
    , prompt: &str
    , params: &GenerationParams
    ) -> crate::error::Result<EventStream>
    {   debug!("{} backend streaming as a single chunk", self.kind());
        let raw = self.call(model_id, prompt, params).await?;
        let result = crate::response::normalize(raw)?;
        Ok(one_shot_stream(result))
    }
}

/// Wrap a finished result as the two-event stream
pub fn one_shot_stream(
  result: crate::response::NormalizedResult
) -> EventStream
{   let events = vec![
      Ok(StreamEvent::TextDelta(result.text))
    , Ok(StreamEvent::Finish
      {   finish_reason: result.finish_reason
        , usage: result.usage
        , provider_metadata: result.provider_metadata
      })
    ];
    Box::pin(futures::stream::iter(events))
}

/// Shared HTTP client with an optional per-call timeout
pub(crate) fn build_http_client(
  endpoint: &crate::config::EndpointConfig
) -> crate::error::Result<reqwest::Client>
{   let mut builder = reqwest::Client::builder();
    if let Some(secs) = endpoint.timeout_secs
    {   builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    builder.build().map_err(|e| {
      crate::error::Error::Configuration(
        format!("cannot build HTTP client: {}", e)
      )
    })
}

/// Join a base URL and a path segment with exactly one slash
pub(crate) fn join_url(base: &str, path: &str) -> String
{   format!(
      "{}/{}",
      base.trim_end_matches('/'),
      path.trim_start_matches('/')
    )
}
