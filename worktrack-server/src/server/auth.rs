use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;
use worktrack_shared::auth::Role;
use worktrack_shared::jwt::JwtClaims;

use super::{AppError, AppState};
use crate::storage::models::User;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

impl AuthCtx {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn is_admin(&self) -> bool {
        self.claims.role == Role::Admin
    }

    /// Loads the caller's current user row. A token for a user that no
    /// longer exists is treated as unauthenticated.
    pub async fn load_user(&self, state: &AppState) -> Result<User, AppError> {
        match state.store.get_user(&self.claims.sub).await {
            Ok(Some(u)) => Ok(u),
            Ok(None) => {
                warn!(user_id = %self.claims.sub, "auth: token for unknown user");
                Err(AppError::unauthorized())
            }
            Err(e) => Err(AppError::internal(e)),
        }
    }
}

pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let Some(token) = header_str.strip_prefix("Bearer ") else {
        return unauthorized();
    };

    let claims = match state.identity.verify_access(token.trim()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "auth: bearer token rejected");
            return unauthorized();
        }
    };

    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}
