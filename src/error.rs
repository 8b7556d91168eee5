use thiserror::Error as ThisError;

/// Which upstream failed, or how its answer was unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind
{   /// Chat-completion gateway
    Gateway
  , /// Edge inference service
    Edge
  , /// 2xx answer missing required fields (e.g. zero choices)
    MalformedResponse
}

impl std::fmt::Display for BackendErrorKind
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   match self
        {   BackendErrorKind::Gateway => write!(f, "gateway")
          , BackendErrorKind::Edge => write!(f, "edge")
          , BackendErrorKind::MalformedResponse => {
              write!(f, "malformed-response")
            }
        }
    }
}

/// Custom error type for REPLYAI operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error
{   /// Credential missing or settings unusable for the selected backend
    #[error("Configuration error: {0}")]
    Configuration(String)
  , /// Caller-supplied options violate constraints
    #[error("Validation error: {0}")]
    Validation(String)
  , /// Upstream call failed or answered with something unusable
    #[error("Backend error ({kind}{}): {message}", status_suffix(.status))]
    Backend
    {   kind: BackendErrorKind
      , status: Option<u16>
      , message: String
    }
  , /// Service handle channel closed
    #[error("Disconnected: {0}")]
    Disconnected(String)
}

impl Error
{   pub fn backend(
      kind: BackendErrorKind
    , status: Option<u16>
    , message: impl Into<String>
    ) -> Self
    {   Error::Backend
        {   kind
          , status
          , message: message.into()
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self
    {   Error::backend(
          BackendErrorKind::MalformedResponse,
          None,
          message
        )
    }

    /// True when the caller is at fault (4xx territory);
    /// every other variant is a server-side failure.
    pub fn is_client_error(&self) -> bool
    {   matches!(self, Error::Validation(_))
    }

    /// Backend kind carried by a `Backend` error
    pub fn backend_kind(&self) -> Option<BackendErrorKind>
    {   match self
        {   Error::Backend { kind, .. } => Some(*kind)
          , _ => None
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String
{   match status
    {   Some(code) => format!(", status {}", code)
      , None => String::new()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
