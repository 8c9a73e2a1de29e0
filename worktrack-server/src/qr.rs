use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use tracing::{info, warn};
use worktrack_shared::jwt::{self, QrClaims};

use crate::error::CoreError;
use crate::storage::models::{QrCredential, QrScanRecord};
use crate::storage::{ScanFilter, Store};

/// Smallest edge of the rendered QR image, in pixels.
const QR_MIN_DIMENSION: u32 = 300;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("qr encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("png encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Result of an accepted scan.
#[derive(Debug, Clone)]
pub struct ScanReceipt {
    pub user_id: String,
    pub scanned_at: DateTime<Utc>,
    pub scan_count: i32,
}

#[derive(Clone)]
pub struct QrManager {
    store: Store,
    jwt_secret: Arc<str>,
}

impl QrManager {
    pub fn new(store: Store, jwt_secret: &str) -> Self {
        Self {
            store,
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    /// Returns the user's credential, creating it on first call. Existing
    /// credentials are returned unchanged.
    pub async fn issue_credential(&self, user_id: &str) -> Result<QrCredential, CoreError> {
        if let Some(existing) = self.store.get_credential(user_id).await? {
            return Ok(existing);
        }
        let Some(user) = self.store.get_user(user_id).await? else {
            return Err(CoreError::not_found(format!("user not found: {}", user_id)));
        };

        let now = Utc::now();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let claims = QrClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            token: token.clone(),
            iat: now.timestamp(),
        };
        let payload = jwt::encode(&claims, self.jwt_secret.as_bytes())?;
        let image = render_png_data_url(&payload)?;

        let stored = self
            .store
            .create_credential_if_absent(&user.id, &token, &payload, &image, now.naive_utc())
            .await?;
        if stored.qr_token == token {
            info!(user_id = %user.id, "qr: credential issued");
        }
        Ok(stored)
    }

    /// Records a scan of the exact `(user_id, token)` pair.
    pub async fn record_scan(
        &self,
        user_id: &str,
        token: &str,
        scanner_ip: &str,
    ) -> Result<ScanReceipt, CoreError> {
        if user_id.trim().is_empty() || token.trim().is_empty() {
            return Err(CoreError::validation("user_id and qr_token are required"));
        }
        let scanned_at = Utc::now();
        let Some(credential) = self
            .store
            .record_scan(user_id, token, scanner_ip, scanned_at.naive_utc())
            .await?
        else {
            warn!(user_id, scanner_ip, "qr: scan did not match any credential");
            return Err(CoreError::CredentialNotFound);
        };
        info!(
            user_id,
            scanner_ip,
            scan_count = credential.scan_count,
            "qr: scan recorded"
        );
        Ok(ScanReceipt {
            user_id: credential.user_id,
            scanned_at,
            scan_count: credential.scan_count,
        })
    }

    /// Verifies the signed payload read from a QR image and records a scan
    /// for the pair it carries.
    pub async fn scan_payload(
        &self,
        payload: &str,
        scanner_ip: &str,
    ) -> Result<ScanReceipt, CoreError> {
        let claims =
            jwt::decode_qr_payload(payload.trim(), self.jwt_secret.as_bytes()).map_err(|e| {
                warn!(error = %e, scanner_ip, "qr: payload signature rejected");
                CoreError::validation("invalid QR payload")
            })?;
        self.record_scan(&claims.sub, &claims.token, scanner_ip)
            .await
    }

    pub async fn list_scans(&self, filter: ScanFilter) -> Result<Vec<QrScanRecord>, CoreError> {
        Ok(self.store.list_scans(filter).await?)
    }

    /// The user's credential (if issued) and their scan history.
    pub async fn user_scans(
        &self,
        user_id: &str,
        filter: ScanFilter,
    ) -> Result<(Option<QrCredential>, Vec<QrScanRecord>), CoreError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(CoreError::not_found(format!("user not found: {}", user_id)));
        }
        let credential = self.store.get_credential(user_id).await?;
        let scans = self
            .store
            .list_scans(ScanFilter {
                user_id: Some(user_id.to_string()),
                ..filter
            })
            .await?;
        Ok((credential, scans))
    }
}

/// Renders `data` into a high error-correction QR code and returns it as a
/// `data:image/png;base64,` URL.
pub fn render_png_data_url(data: &str) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_png_data_url() {
        let url = render_png_data_url("hello").unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert!(img.width() >= QR_MIN_DIMENSION);
    }
}
