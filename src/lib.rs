pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod response;
pub mod router;
pub mod adapter;
pub mod orchestrator;
pub mod client;
use serde::{Deserialize, Serialize};

/*

replyai: async reply generation over two structurally different
inference backends, behind one "generate text" contract.

replyai/
├── Cargo.toml
├── src/
│   ├── lib.rs           # Re-exports and channel API types
│   ├── error.rs         # Error taxonomy
│   ├── config.rs        # Immutable configuration
│   ├── request.rs       # Options, prompts, reply batch
│   ├── response.rs      # Raw envelopes + normalizer
│   ├── providers/       # BackendClient variants
│   │   ├── mod.rs
│   │   ├── gateway.rs   # chat-completion gateway
│   │   └── edge.rs      # edge inference service
│   ├── router.rs        # backend/model selection
│   ├── adapter.rs       # uniform model capability
│   ├── orchestrator.rs  # prompt template + variation loop
│   └── client.rs        # channel-driven service handle
└── tests/

request flow:
  ReplyOrchestrator::generate_replies
    -> ProviderRouter::connect
    -> ModelAdapter::generate
    -> BackendClient::call
    -> response::normalize

*/

pub use adapter::ModelAdapter;
pub use client::ReplyBackend;
pub use config::ReplyAiConfig;
pub use error::{BackendErrorKind, Error};
pub use orchestrator::ReplyOrchestrator;
pub use request::{GenerationOptions, ReplyBatch, Tone};
pub use response::{FinishReason, NormalizedResult, StreamEvent, Usage};
pub use router::{ProviderRouter, ResolvedProvider};

/// REPLYAI API INTERFACE:

// ===== GenerateReplies =====

pub type GenerateRepliesReply = Result<ReplyBatch, crate::error::Error>;
pub type GenerateRepliesReplySender
  = tokio::sync::mpsc::UnboundedSender<GenerateRepliesReply>;

pub struct GenerateRepliesArgs
{   pub options: GenerationOptions
  , pub reply: GenerateRepliesReplySender
}

// ===== GetModelLists =====

pub type GetModelListsReply
  = Result<Vec<(crate::ProviderKind, String)>, crate::error::Error>;
pub type GetModelListsReplySender
  = tokio::sync::mpsc::UnboundedSender<GetModelListsReply>;

pub struct GetModelListsArgs
{   pub reply: GetModelListsReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== ReplyHand (sender side) =====

pub struct ReplyHand
{   pub generate_replies_tx
      : tokio::sync::mpsc::UnboundedSender<GenerateRepliesArgs>
  , pub get_model_lists_tx
      : tokio::sync::mpsc::UnboundedSender<GetModelListsArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== ReplyFoot (receiver side) =====

pub struct ReplyFoot
{   pub generate_replies_rx
      : tokio::sync::mpsc::UnboundedReceiver<GenerateRepliesArgs>
  , pub get_model_lists_rx
      : tokio::sync::mpsc::UnboundedReceiver<GetModelListsArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// REPLYAI STRUCTURES:

/// The two upstream inference services requests can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind
{   /// Chat-completion API aggregator
    Gateway
  , /// Edge inference service with its own job envelope
    Edge
}

impl ProviderKind
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   ProviderKind::Gateway => "gateway"
          , ProviderKind::Edge => "edge"
        }
    }
}

impl std::fmt::Display for ProviderKind
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.write_str(self.as_str())
    }
}
