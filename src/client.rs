use std::sync::Arc;
use tokio::sync::mpsc;
use log::{debug, error, info};
use crate::ReplyFoot;

/// Public API for REPLYAI - owns the task
pub struct ReplyBackend
{   hand: crate::ReplyHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl ReplyBackend
{   /// Create and spawn a new backend
    /// Returns immediately - spawns background task
    pub fn new(config: crate::config::ReplyAiConfig) -> Self
    {   debug!("Creating ReplyBackend with task ownership");

        let (generate_replies_tx, generate_replies_rx)
          = mpsc::unbounded_channel();
        let (get_model_lists_tx, get_model_lists_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::ReplyHand
        {   generate_replies_tx
          , get_model_lists_tx
          , kill_process_tx
        };

        let foot = crate::ReplyFoot
        {   generate_replies_rx
          , get_model_lists_rx
          , kill_process_rx
        };

        let orchestrator = Arc::new(
          crate::orchestrator::ReplyOrchestrator::from_config(config)
        );
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, orchestrator).await
        });

        ReplyBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue a generation request - returns almost immediately
    pub async fn generate_replies(
      &self
    , options: crate::request::GenerationOptions
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GenerateRepliesReply>,
        crate::error::Error
      >
    {   debug!(
          "generate_replies queuing {} variation(s)",
          options.variation_count
        );
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::GenerateRepliesArgs
        {   options
          , reply: reply_tx
        };

        self.hand.generate_replies_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Disconnected(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Get known model ids - returns almost immediately
    pub async fn get_model_lists(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GetModelListsReply>,
        crate::error::Error
      >
    {   debug!("get_model_lists queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::GetModelListsArgs
        {   reply: reply_tx
        };

        self.hand.get_model_lists_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Disconnected(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down ReplyBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Disconnected(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend closed without confirming shutdown");
            Err(crate::error::Error::Disconnected(
              "Backend closed without confirming shutdown".to_string()
            ))
        }
    }
}

/// Main backend event loop
///
/// tokio::select! only routes. Each generate command gets its own
/// task, so requests never share mutable state or wait on each other.
async fn run_backend_loop(
  foot: crate::ReplyFoot
, orchestrator: Arc<crate::orchestrator::ReplyOrchestrator>
)
{   debug!("Starting ReplyBackend event loop");
    let ReplyFoot
    {   mut generate_replies_rx
      , mut get_model_lists_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = generate_replies_rx.recv() => {
          debug!("Received GenerateReplies");
          let orchestrator = orchestrator.clone();
          tokio::spawn(async move {
            let result = orchestrator
              .generate_replies(&cmd.options)
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = get_model_lists_rx.recv() => {
          debug!("Received GetModelLists");
          let _ = cmd.reply.send(Ok(crate::router::known_models()));
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("ReplyBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
