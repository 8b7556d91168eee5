//! Response normalization
//!
//! Every backend answer is translated into one [`NormalizedResult`]
//! whose shape does not depend on which backend served the call.
//! Missing optional fields fall back to `0`, `stop` or `""`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use log::{debug, error};

// ===== Raw Envelopes =====

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUsage
{   #[serde(default)]
    pub prompt_tokens: Option<u64>
  , #[serde(default)]
    pub completion_tokens: Option<u64>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage
{   #[serde(default)]
    pub content: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChoice
{   #[serde(default)]
    pub message: RawMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
  , /// Upstream-specific reason some gateways forward
    #[serde(default)]
    pub native_finish_reason: Option<String>
}

/// Chat-completion envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse
{   #[serde(default)]
    pub id: Option<String>
  , #[serde(default)]
    pub model: Option<String>
  , pub choices: Vec<RawChoice>
  , #[serde(default)]
    pub usage: Option<RawUsage>
}

/// Legacy edge job envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeJobResponse
{   #[serde(default)]
    pub output: Option<String>
  , /// String or numeric id depending on deployment
    #[serde(default)]
    pub job_id: Option<Value>
  , /// Integer or fractional milliseconds
    #[serde(default)]
    pub latency_ms: Option<Value>
  , #[serde(default)]
    pub cost_milli: Option<Value>
}

/// Edge answers come in two shapes; the chat one is tried first
#[derive(Debug, Clone)]
pub enum EdgeResponse
{   Chat(ChatCompletionResponse)
  , Job(EdgeJobResponse)
}

impl<'de> Deserialize<'de> for EdgeResponse
{   fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
      D: Deserializer<'de>
    {   let value = Value::deserialize(deserializer)?;
        match serde_json::from_value::<ChatCompletionResponse>(value.clone())
        {   Ok(chat) => Ok(EdgeResponse::Chat(chat))
          , Err(e) => {
              if value.get("choices").is_some()
              {   debug!("Edge body has choices but is not chat-shaped: {}", e);
              }
              serde_json::from_value::<EdgeJobResponse>(value)
                .map(EdgeResponse::Job)
                .map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Backend-specific answer, consumed immediately by [`normalize`]
#[derive(Debug, Clone)]
pub enum RawBackendResponse
{   Gateway(ChatCompletionResponse)
  , Edge(EdgeResponse)
}

impl RawBackendResponse
{   pub fn kind(&self) -> crate::ProviderKind
    {   match self
        {   RawBackendResponse::Gateway(_) => crate::ProviderKind::Gateway
          , RawBackendResponse::Edge(_) => crate::ProviderKind::Edge
        }
    }
}

// ===== Canonical Result =====

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage
{   pub prompt_tokens: u64
  , pub completion_tokens: u64
  , pub total_tokens: u64
}

impl Usage
{   pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self
    {   Usage
        {   prompt_tokens
          , completion_tokens
          , total_tokens: prompt_tokens.saturating_add(completion_tokens)
        }
    }
}

impl From<Option<&RawUsage>> for Usage
{   fn from(raw: Option<&RawUsage>) -> Self
    {   match raw
        {   Some(u) => Usage::new(
              u.prompt_tokens.unwrap_or(0),
              u.completion_tokens.unwrap_or(0)
            )
          , None => Usage::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason
{   #[default]
    Stop
  , Length
  , ContentFilter
  , Other
}

impl FinishReason
{   /// Absent or unrecognized reasons map to `Stop`; tool and
    /// error signals map to `Other`.
    pub fn from_raw(raw: Option<&str>) -> Self
    {   match raw.map(|r| r.to_ascii_lowercase())
        {   Some(r) => match r.as_str()
            {   "stop" | "end_turn" | "eos" => FinishReason::Stop
              , "length" | "max_tokens" => FinishReason::Length
              , "content_filter" | "content-filter" => {
                  FinishReason::ContentFilter
                }
              , "tool_calls" | "function_call" | "error" => {
                  FinishReason::Other
                }
              , _ => FinishReason::Stop
            }
          , None => FinishReason::Stop
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMetadata
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_finish_reason: Option<String>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata
{   pub job_id: String
  , pub latency: u64
  , pub cost: f64
}

/// Backend-tagged metadata bag, e.g. `{"edge": {"jobId": ..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMetadata
{   Gateway(GatewayMetadata)
  , Edge(EdgeMetadata)
}

impl ProviderMetadata
{   pub fn edge(&self) -> Option<&EdgeMetadata>
    {   match self
        {   ProviderMetadata::Edge(m) => Some(m)
          , _ => None
        }
    }

    pub fn gateway(&self) -> Option<&GatewayMetadata>
    {   match self
        {   ProviderMetadata::Gateway(m) => Some(m)
          , _ => None
        }
    }
}

/// Canonical generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult
{   pub text: String
  , pub usage: Usage
  , pub finish_reason: FinishReason
  , pub provider_metadata: ProviderMetadata
}

/// Partial events of a streamed generation
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent
{   TextDelta(String)
  , Finish
    {   finish_reason: FinishReason
      , usage: Usage
      , provider_metadata: ProviderMetadata
    }
}

// ===== Normalizer =====

/// Translate a raw backend answer into the canonical result
pub fn normalize(raw: RawBackendResponse)
  -> crate::error::Result<NormalizedResult>
{   debug!("Normalizing {} response", raw.kind());
    match raw
    {   RawBackendResponse::Gateway(chat) => normalize_chat(chat, false)
      , RawBackendResponse::Edge(EdgeResponse::Chat(chat)) => {
          normalize_chat(chat, true)
        }
      , RawBackendResponse::Edge(EdgeResponse::Job(job)) => {
          Ok(normalize_job(job))
        }
    }
}

fn normalize_chat(chat: ChatCompletionResponse, from_edge: bool)
  -> crate::error::Result<NormalizedResult>
{   let usage = Usage::from(chat.usage.as_ref());
    let choice = chat.choices.into_iter().next().ok_or_else(|| {
      error!("Response contained no choices");
      crate::error::Error::malformed("response contained no choices")
    })?;

    let finish_reason
      = FinishReason::from_raw(choice.finish_reason.as_deref());
    let provider_metadata = if from_edge
    {   ProviderMetadata::Edge(EdgeMetadata
        {   job_id: chat.id.unwrap_or_default()
          , ..EdgeMetadata::default()
        })
    } else
    {   ProviderMetadata::Gateway(GatewayMetadata
        {   response_id: chat.id
          , model: chat.model
          , native_finish_reason: choice.native_finish_reason
              .or(choice.finish_reason)
        })
    };

    Ok(NormalizedResult
    {   text: choice.message.content.unwrap_or_default()
      , usage
      , finish_reason
      , provider_metadata
    })
}

fn normalize_job(job: EdgeJobResponse) -> NormalizedResult
{   NormalizedResult
    {   text: job.output.unwrap_or_default()
      , usage: Usage::default()
      , finish_reason: FinishReason::Stop
      , provider_metadata: ProviderMetadata::Edge(EdgeMetadata
        {   job_id: job_id_text(job.job_id)
          , latency: latency_millis(job.latency_ms.as_ref())
          , cost: job.cost_milli.as_ref().and_then(Value::as_f64).unwrap_or(0.0)
        })
    }
}

fn job_id_text(raw: Option<Value>) -> String
{   match raw
    {   Some(Value::String(s)) => s
      , Some(Value::Null) | None => String::new()
      , Some(other) => other.to_string()
    }
}

/// Rounded non-negative milliseconds; anything else is 0
fn latency_millis(raw: Option<&Value>) -> u64
{   raw.and_then(|v| {
      v.as_u64().or_else(|| {
        v.as_f64()
          .filter(|f| f.is_finite() && *f >= 0.0)
          .map(|f| f.round() as u64)
      })
    }).unwrap_or(0)
}
