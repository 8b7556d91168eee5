//! Unified request types for REPLYAI

use serde::{Deserialize, Serialize};

pub const MIN_VARIATIONS: u8 = 1;
pub const MAX_VARIATIONS: u8 = 5;
pub const DEFAULT_MAX_LENGTH: u32 = 280;

/// Voice of the generated reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone
{   Professional
  , #[default]
    Casual
  , Humorous
  , Supportive
  , Promotional
}

impl Tone
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   Tone::Professional => "professional"
          , Tone::Casual => "casual"
          , Tone::Humorous => "humorous"
          , Tone::Supportive => "supportive"
          , Tone::Promotional => "promotional"
        }
    }
}

impl std::fmt::Display for Tone
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.write_str(self.as_str())
    }
}

/// Options for one reply-generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions
{   /// The post being replied to
    pub source_text: String
  , #[serde(default)]
    pub context: Option<String>
  , #[serde(default)]
    pub tone: Tone
  , /// Maximum reply length in characters
    #[serde(default = "default_max_length")]
    pub max_length: u32
  , #[serde(default)]
    pub include_hashtags: bool
  , #[serde(default)]
    pub include_emojis: bool
  , #[serde(default)]
    pub custom_instructions: Option<String>
  , /// Number of independent replies, 1..=5
    #[serde(default = "default_variation_count")]
    pub variation_count: u8
  , /// Explicit model id; overrides the backend default
    #[serde(default)]
    pub model_id: Option<String>
}

fn default_max_length() -> u32
{   DEFAULT_MAX_LENGTH
}

fn default_variation_count() -> u8
{   MIN_VARIATIONS
}

impl GenerationOptions
{   pub fn new(source_text: impl Into<String>) -> Self
    {   GenerationOptions
        {   source_text: source_text.into()
          , context: None
          , tone: Tone::default()
          , max_length: DEFAULT_MAX_LENGTH
          , include_hashtags: false
          , include_emojis: false
          , custom_instructions: None
          , variation_count: MIN_VARIATIONS
          , model_id: None
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self
    {   self.tone = tone;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self
    {   self.context = Some(context.into());
        self
    }

    pub fn with_variations(mut self, count: u8) -> Self
    {   self.variation_count = count;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self
    {   self.model_id = Some(model_id.into());
        self
    }

    /// Boundary check; runs before any network call
    pub fn validate(&self) -> crate::error::Result<()>
    {   if self.source_text.trim().is_empty()
        {   return Err(crate::error::Error::Validation(
              "source text is required".to_string()
            ));
        }
        if !(MIN_VARIATIONS..=MAX_VARIATIONS)
          .contains(&self.variation_count)
        {   return Err(crate::error::Error::Validation(format!(
              "variation count must be between {} and {}, got {}",
              MIN_VARIATIONS, MAX_VARIATIONS, self.variation_count
            )));
        }
        if self.max_length == 0
        {   return Err(crate::error::Error::Validation(
              "max length must be positive".to_string()
            ));
        }
        Ok(())
    }
}

/// Sampling parameters forwarded to a backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams
{   pub max_tokens: u32
  , pub temperature: f32
}

impl Default for GenerationParams
{   fn default() -> Self
    {   let defaults = crate::config::GenerationDefaults::default();
        GenerationParams
        {   max_tokens: defaults.max_tokens
          , temperature: defaults.temperature
        }
    }
}

impl From<&crate::config::GenerationDefaults> for GenerationParams
{   fn from(d: &crate::config::GenerationDefaults) -> Self
    {   GenerationParams
        {   max_tokens: d.max_tokens
          , temperature: d.temperature
        }
    }
}

// ===== Message Types =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
  , Tool
}

/// One part of a structured message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart
{   #[serde(rename = "type")]
    pub kind: String
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>
}

/// Plain string or list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent
{   Text(String)
  , Parts(Vec<ContentPart>)
}

impl MessageContent
{   /// Text parts joined in order; non-text parts are skipped
    pub fn text(&self) -> String
    {   match self
        {   MessageContent::Text(t) => t.clone()
          , MessageContent::Parts(parts) => parts
              .iter()
              .filter(|p| p.kind == "text")
              .filter_map(|p| p.text.as_deref())
              .collect::<Vec<_>>()
              .join("")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: MessageContent
}

impl ChatMessage
{   pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: Role::User
          , content: MessageContent::Text(content.into())
        }
    }

    pub fn system(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: Role::System
          , content: MessageContent::Text(content.into())
        }
    }
}

/// Prompt as handed to a model adapter
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt
{   Text(String)
  , Messages(Vec<ChatMessage>)
}

impl Prompt
{   /// Verbatim text, or the last user message's text content
    pub fn to_text(&self) -> Option<String>
    {   match self
        {   Prompt::Text(t) => Some(t.clone())
          , Prompt::Messages(messages) => messages
              .iter()
              .rev()
              .find(|m| m.role == Role::User)
              .map(|m| m.content.text())
        }
    }
}

impl From<String> for Prompt
{   fn from(s: String) -> Self
    {   Prompt::Text(s)
    }
}

impl From<&str> for Prompt
{   fn from(s: &str) -> Self
    {   Prompt::Text(s.to_string())
    }
}

impl From<Vec<ChatMessage>> for Prompt
{   fn from(m: Vec<ChatMessage>) -> Self
    {   Prompt::Messages(m)
    }
}

// ===== Output =====

/// Replies produced for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBatch
{   pub replies: Vec<String>
  , pub model_used: String
  , pub provider: crate::ProviderKind
  , pub characters_used: Vec<usize>
}

impl ReplyBatch
{   pub fn new(
      replies: Vec<String>
    , model_used: String
    , provider: crate::ProviderKind
    ) -> Self
    {   let characters_used = replies
          .iter()
          .map(|r| r.chars().count())
          .collect();
        ReplyBatch
        {   replies
          , model_used
          , provider
          , characters_used
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn options_deserialize_with_defaults()
    {   let opts: GenerationOptions = serde_json::from_str(
          r#"{"sourceText": "gm"}"#
        ).unwrap();
        assert_eq!(opts.tone, Tone::Casual);
        assert_eq!(opts.max_length, 280);
        assert_eq!(opts.variation_count, 1);
        assert!(!opts.include_hashtags);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_counts_and_blank_source()
    {   for count in [0u8, 6, 200]
        {   let opts = GenerationOptions::new("hi").with_variations(count);
            assert!(matches!(
              opts.validate(),
              Err(crate::error::Error::Validation(_))
            ));
        }
        let opts = GenerationOptions::new("   ");
        assert!(matches!(
          opts.validate(),
          Err(crate::error::Error::Validation(_))
        ));
    }

    #[test]
    fn zero_max_length_is_rejected()
    {   let mut opts = GenerationOptions::new("hi");
        opts.max_length = 0;
        assert!(matches!(
          opts.validate(),
          Err(crate::error::Error::Validation(_))
        ));
        opts.max_length = 1;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn last_user_message_wins()
    {   let prompt = Prompt::Messages(vec![
          ChatMessage::system("be nice"),
          ChatMessage::user("first"),
          ChatMessage
          {   role: Role::User
            , content: MessageContent::Parts(vec![
                ContentPart { kind: "text".into(), text: Some("sec".into()) },
                ContentPart { kind: "image_url".into(), text: None },
                ContentPart { kind: "text".into(), text: Some("ond".into()) },
              ])
          },
          ChatMessage
          {   role: Role::Assistant
            , content: MessageContent::Text("ignored".into())
          },
        ]);
        assert_eq!(prompt.to_text().as_deref(), Some("second"));
        assert_eq!(Prompt::from("plain").to_text().as_deref(), Some("plain"));
        assert_eq!(
          Prompt::Messages(vec![ChatMessage::system("x")]).to_text(),
          None
        );
    }

    #[test]
    fn batch_counts_characters_not_bytes()
    {   let batch = ReplyBatch::new(
          vec!["héllo".to_string(), "🚀".to_string()],
          "m".to_string(),
          crate::ProviderKind::Edge
        );
        assert_eq!(batch.characters_used, vec![5, 1]);
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("modelUsed").is_some());
        assert!(json.get("charactersUsed").is_some());
    }
}
