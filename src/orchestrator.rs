//! Reply generation
//!
//! Builds one deterministic prompt per request and runs it once per
//! requested variation. Fail-fast: the first failing call aborts the
//! batch and nothing produced before it is returned.

use futures::{StreamExt, TryStreamExt};
use log::{debug, info, error};

use crate::adapter::ModelAdapter;
use crate::request::{GenerationOptions, GenerationParams, ReplyBatch};
use crate::router::ProviderRouter;

/// Fixed reply prompt template
pub fn build_prompt(options: &GenerationOptions) -> String
{   let yes_no = |b: bool| if b { "yes" } else { "no" };

    let mut prompt = String::from(
      "You are writing a reply to a post on X (Twitter).\n\n"
    );
    prompt.push_str(&format!(
      "Original post: \"{}\"\n",
      options.source_text.trim()
    ));
    if let Some(context) = options.context
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty())
    {   prompt.push_str(&format!("Context: {}\n", context));
    }
    prompt.push_str(&format!("Tone: {}\n", options.tone));
    prompt.push_str(&format!(
      "Maximum length: {} characters\n",
      options.max_length
    ));
    prompt.push_str(&format!(
      "Include hashtags: {}\n",
      yes_no(options.include_hashtags)
    ));
    prompt.push_str(&format!(
      "Include emojis: {}\n",
      yes_no(options.include_emojis)
    ));
    if let Some(extra) = options.custom_instructions
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty())
    {   prompt.push_str(&format!("Additional instructions: {}\n", extra));
    }
    prompt.push_str(
      "\nWrite exactly one reply. Respond with the reply text only, \
       without quotes or commentary."
    );
    prompt
}

/// Trim and drop one pair of wrapping quotes
fn clean_reply(text: &str) -> String
{   let trimmed = text.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')]
    {   if trimmed.chars().count() >= 2
          && trimmed.starts_with(open)
          && trimmed.ends_with(close)
        {   let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

pub struct ReplyOrchestrator
{   router: ProviderRouter
}

impl ReplyOrchestrator
{   pub fn new(router: ProviderRouter) -> Self
    {   ReplyOrchestrator
        {   router
        }
    }

    pub fn from_config(config: crate::config::ReplyAiConfig) -> Self
    {   ReplyOrchestrator::new(ProviderRouter::new(config))
    }

    pub fn router(&self) -> &ProviderRouter
    {   &self.router
    }

    /// Validate, resolve, then generate `variation_count` replies
    pub async fn generate_replies(&self, options: &GenerationOptions)
      -> crate::error::Result<ReplyBatch>
    {   options.validate()?;
        let adapter = self.router.connect(options.model_id.as_deref())?;
        self.generate_with(&adapter, options).await
    }

    /// Same as [`Self::generate_replies`] against a prepared adapter
    pub async fn generate_with(
      &self
    , adapter: &ModelAdapter
    , options: &GenerationOptions
    ) -> crate::error::Result<ReplyBatch>
    {   options.validate()?;

        let defaults = &self.router.config().generation;
        let params = GenerationParams::from(defaults);
        let prompt = build_prompt(options);
        let count = usize::from(options.variation_count);
        let concurrency = defaults.concurrency.max(1);

        debug!(
          "Generating {} variation(s) with {} model {} (concurrency {})",
          count, adapter.kind(), adapter.model_id(), concurrency
        );

        let replies = if concurrency == 1
        {   let mut replies = Vec::with_capacity(count);
            for index in 0..count
            {   replies.push(
                  generate_one(adapter, &prompt, &params, index).await?
                );
            }
            replies
        } else
        {   let prompt = prompt.as_str();
            let params = &params;
            futures::stream::iter(0..count)
              .map(|index| generate_one(adapter, prompt, params, index))
              .buffered(concurrency)
              .try_collect::<Vec<_>>()
              .await?
        };

        info!(
          "Generated {} replies with {} model {}",
          replies.len(), adapter.kind(), adapter.model_id()
        );
        Ok(ReplyBatch::new(
          replies,
          adapter.model_id().to_string(),
          adapter.kind()
        ))
    }
}

async fn generate_one(
  adapter: &ModelAdapter
, prompt: &str
, params: &GenerationParams
, index: usize
) -> crate::error::Result<String>
{   let result = adapter.generate(prompt, params).await.map_err(|e| {
      error!("Variation {} failed: {}", index + 1, e);
      e
    })?;
    let reply = clean_reply(&result.text);
    if reply.is_empty()
    {   error!("Variation {} came back empty", index + 1);
        return Err(crate::error::Error::malformed(
          "backend returned an empty reply"
        ));
    }
    Ok(reply)
}
