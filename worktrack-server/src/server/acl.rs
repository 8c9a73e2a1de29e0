use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use percent_encoding::percent_decode_str;
use worktrack_shared::auth::Role;
use worktrack_shared::jwt::JwtClaims;

pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let segs = segmented(&path);
    let prefix = ["api", "v1"];
    if !segs.as_slice().starts_with(&prefix) {
        tracing::warn!(?segs, "ACL: path outside API scope");
        return Err(AppError::forbidden());
    }
    let rest = &segs[prefix.len()..];

    let decision = allow_any(&method, rest).or_else(|_| match claims.role {
        Role::Admin => allow_admin(&method, rest, claims),
        Role::Worker => allow_worker(&method, rest, claims),
    });

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            user_id = %claims.sub,
            role = %claims.role,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

/// Routes every authenticated user may call; handlers scope them to the
/// caller.
fn allow_any(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["tasks"] if *method == Method::GET => Ok(()),
        ["tasks", id] if *method == Method::GET && is_id(id) => Ok(()),
        ["notifications"] if *method == Method::GET => Ok(()),
        ["notifications", "count"] if *method == Method::GET => Ok(()),
        ["notifications", id, "read"] if *method == Method::POST && is_id(id) => Ok(()),
        ["push", "subscriptions"] if *method == Method::POST => Ok(()),
        ["push", "subscriptions", "unsubscribe"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn allow_admin(method: &Method, rest: &[&str], claims: &JwtClaims) -> Result<(), AppError> {
    match rest {
        ["users"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["users", _, "performance"] if *method == Method::GET => Ok(()),
        ["users", _, "qr"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["users", _, "qr", "scans"] if *method == Method::GET => Ok(()),
        ["users", _, "attendance"] if *method == Method::GET => Ok(()),
        ["users", user, "attendance"] if *method == Method::POST => ensure_self(claims, user),
        ["tasks"] if *method == Method::POST => Ok(()),
        ["tasks", id, action]
            if *method == Method::POST
                && (action == &"approve" || action == &"reject")
                && is_id(id) =>
        {
            Ok(())
        }
        ["admin", "pending-approvals"] if *method == Method::GET => Ok(()),
        ["admin", "performance-metrics"] if *method == Method::GET => Ok(()),
        ["admin", "performance-metrics", "rebuild"] if *method == Method::POST => Ok(()),
        ["admin", "qr-scans"] if *method == Method::GET => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn allow_worker(method: &Method, rest: &[&str], claims: &JwtClaims) -> Result<(), AppError> {
    match rest {
        ["tasks", id, action]
            if *method == Method::POST
                && (action == &"start" || action == &"submit-report")
                && is_id(id) =>
        {
            Ok(())
        }
        ["users", user, "performance"] if *method == Method::GET => ensure_self(claims, user),
        ["users", user, "qr"] if *method == Method::GET || *method == Method::POST => {
            ensure_self(claims, user)
        }
        ["users", user, "qr", "scans"] if *method == Method::GET => ensure_self(claims, user),
        ["users", user, "attendance"] if *method == Method::GET || *method == Method::POST => {
            ensure_self(claims, user)
        }
        _ => Err(AppError::forbidden()),
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn decode(seg: &str) -> String {
    percent_decode_str(seg).decode_utf8_lossy().to_string()
}

// Range checks happen in the handler's path extractor.
fn is_id(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())
}

fn ensure_self(claims: &JwtClaims, seg: &str) -> Result<(), AppError> {
    if claims.sub == decode(seg) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
