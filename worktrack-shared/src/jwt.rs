use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by access and refresh tokens.
///
/// `name`, `email` and `role` are a snapshot taken at issue time; the server
/// re-reads them from storage whenever a refresh token is exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id.
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
}

/// Payload encoded into a user's QR credential image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QrClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub token: String,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

pub fn decode_and_verify(token: &str, secret: &[u8]) -> Result<JwtClaims, JwtError> {
    let validation = Validation::new(Algorithm::HS256);
    decode_with(token, secret, &validation)
}

/// Verifies a QR payload signature. QR payloads carry no expiry; they stay
/// valid for as long as the stored credential does.
pub fn decode_qr_payload(payload: &str, secret: &[u8]) -> Result<QrClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    decode_with(payload, secret, &validation)
}

fn decode_with<T: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    validation: &Validation,
) -> Result<T, JwtError> {
    let key = DecodingKey::from_secret(secret);
    jsonwebtoken::decode::<T>(token, &key, validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))
}

pub fn encode<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}
