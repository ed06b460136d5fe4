//! HTTP binding of the relay API.
//!
//! Authentication is by owner identifier plus signature, not account
//! login: each request body is signed with the owner's Ed25519 key, and
//! the key and signature ride in headers the relay verifies against the
//! owner's registered public key.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{ExchangeRequest, ExchangeResponse, FingerprintRequest, TreeFingerprint};
use async_trait::async_trait;
use offgrid_crypto::{Owner, SigningKey};
use offgrid_types::OwnerId;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Header carrying the owner's public key, hex-encoded.
pub const KEY_HEADER: &str = "x-offgrid-key";
/// Header carrying the request body signature, hex-encoded.
pub const SIGNATURE_HEADER: &str = "x-offgrid-signature";

/// A [`RelayClient`](crate::RelayClient) speaking JSON over HTTPS.
pub struct HttpRelayClient {
    base_url: String,
    http: reqwest::Client,
    signer: SigningKey,
    public_key_hex: String,
}

impl HttpRelayClient {
    /// Creates a client for the given relay base URL, authenticating as
    /// the given owner.
    pub fn new(base_url: impl Into<String>, owner: &Owner) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            signer: owner.signing_key().clone(),
            public_key_hex: owner.verifying_key().to_hex(),
        })
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> SyncResult<Resp> {
        let body = serde_json::to_vec(request)?;
        let signature = self.signer.sign(&body).to_hex();

        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(KEY_HEADER, &self.public_key_hex)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout
                } else {
                    SyncError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SyncError::Auth(format!("relay returned {status}")));
        }
        if !status.is_success() {
            return Err(SyncError::Network(format!("relay returned {status}")));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| SyncError::Protocol(format!("unreadable relay response: {e}")))
    }
}

#[async_trait]
impl crate::relay::RelayClient for HttpRelayClient {
    async fn get_fingerprint(
        &self,
        owner: OwnerId,
        request: FingerprintRequest,
    ) -> SyncResult<TreeFingerprint> {
        self.post(&format!("/v1/owners/{owner}/fingerprint"), &request)
            .await
    }

    async fn exchange_buckets(
        &self,
        owner: OwnerId,
        request: ExchangeRequest,
    ) -> SyncResult<ExchangeResponse> {
        self.post(&format!("/v1/owners/{owner}/exchange"), &request)
            .await
    }
}
