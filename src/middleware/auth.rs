//! Bearer session authentication
//!
//! Runs after the region router has decided the request is local, so the
//! bearer token always belongs to this region's session store here.

use crate::domain::{Account, Session, StringUuid};
use crate::error::{AppError, Result};
use crate::routing::CapturedRequest;
use crate::state::HasAccounts;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct SessionAuth {
    /// Encoded bearer token as presented
    pub session_token: String,
    pub session: Session,
    pub account: Account,
}

impl SessionAuth {
    pub fn identity_id(&self) -> StringUuid {
        self.account.identity_id
    }

    /// Tenant of the caller, required for domain management.
    pub fn tenant_id(&self) -> Result<StringUuid> {
        self.account
            .tenant_id
            .ok_or_else(|| AppError::Forbidden("Tenant membership required".to_string()))
    }
}

pub async fn require_session<S: HasAccounts>(
    state: &S,
    request: &CapturedRequest,
) -> Result<SessionAuth> {
    let session_token = request.require_bearer()?;

    let authenticated = state
        .session_service()
        .authenticate(&session_token)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                AppError::Unauthorized("Invalid or expired session".to_string())
            } else {
                e
            }
        })?;

    Ok(SessionAuth {
        session_token,
        session: authenticated.session,
        account: authenticated.account,
    })
}
