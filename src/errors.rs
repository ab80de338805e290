use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired, sign in again")]
    AuthExpired,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{action} is already in progress")]
    Busy { action: String },
    #[error("remote request failed with status {status}")]
    Remote {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error payload the backend sends alongside non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl ClientError {
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::AuthExpired)
    }

    /// Text for the error banner of a failed action.
    ///
    /// Returns `None` for [`ClientError::AuthExpired`]: the session redirect
    /// replaces any banner. Remote failures prefer the server's own message.
    #[must_use]
    pub fn banner_text(&self, fallback: &str) -> Option<String> {
        match self {
            ClientError::AuthExpired => None,
            ClientError::Validation(msg) => Some(msg.clone()),
            ClientError::Busy { .. } => Some(self.to_string()),
            ClientError::Remote {
                message: Some(msg), ..
            } if !msg.trim().is_empty() => Some(msg.clone()),
            _ => Some(fallback.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Settle two concurrently awaited results as one; see [`settle3`].
pub fn settle2<A, B>(a: ClientResult<A>, b: ClientResult<B>) -> ClientResult<(A, B)> {
    let (a, b, ()) = settle3(a, b, Ok(()))?;
    Ok((a, b))
}

/// Settle three concurrently awaited results as one.
///
/// An expired session anywhere wins over every other failure, otherwise the
/// first failure in argument order is reported and the successes are dropped.
pub fn settle3<A, B, C>(
    a: ClientResult<A>,
    b: ClientResult<B>,
    c: ClientResult<C>,
) -> ClientResult<(A, B, C)> {
    let auth_expired = [
        a.as_ref().err(),
        b.as_ref().err(),
        c.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    .any(ClientError::is_auth_expired);
    if auth_expired {
        return Err(ClientError::AuthExpired);
    }
    Ok((a?, b?, c?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle3_prefers_auth_expired_over_earlier_failures() {
        let res: ClientResult<((), (), ())> = settle3(
            Err(ClientError::Validation("x".into())),
            Ok(()),
            Err(ClientError::AuthExpired),
        );
        assert!(matches!(res, Err(ClientError::AuthExpired)));
    }

    #[test]
    fn settle3_reports_first_failure() {
        let res: ClientResult<((), (), ())> = settle3(
            Ok(()),
            Err(ClientError::NotFound("member".into())),
            Err(ClientError::Validation("x".into())),
        );
        assert!(matches!(res, Err(ClientError::NotFound(_))));
    }

    #[test]
    fn banner_text_uses_server_message_when_present() {
        let err = ClientError::Remote {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: Some("no_ktp sudah terdaftar".into()),
        };
        assert_eq!(
            err.banner_text("Failed to save member.").as_deref(),
            Some("no_ktp sudah terdaftar")
        );

        let err = ClientError::Remote {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert_eq!(
            err.banner_text("Failed to save member.").as_deref(),
            Some("Failed to save member.")
        );
        assert_eq!(ClientError::AuthExpired.banner_text("x"), None);
    }
}
