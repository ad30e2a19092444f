use alloy_primitives::Address;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::common::error::EscrowError;
use crate::trade::{CreateTradeRequest, TradeRecord};

/// Runtime configuration served by the backend. Only the escrow contract
/// address is consumed; a missing value keeps the built-in default.
#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub escrow_contract_address: Option<Address>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(serde::Serialize)]
struct JoinBody {
    buyer_wallet: Address,
}

/// REST consumer for the authoritative trade-record service. All requests
/// and responses are JSON; a non-success response carries a human-readable
/// `detail` surfaced verbatim.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn api_url(&self, path: &str) -> Result<Url, EscrowError> {
        self.base_url
            .join(path)
            .map_err(|e| EscrowError::Simple(format!("Bad backend path {} - {}", path, e)))
    }

    /// Push-channel endpoint for a trade, derived from the backend base URL
    /// with the matching ws/wss scheme.
    pub fn ws_url(&self, trade_id: Uuid) -> Result<Url, EscrowError> {
        let mut url = self.api_url(&format!("/ws/{}", trade_id))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| EscrowError::Simple(format!("Cannot derive ws scheme for {}", url)))?;
        Ok(url)
    }

    pub async fn create_trade(
        &self,
        request: &CreateTradeRequest,
    ) -> Result<TradeRecord, EscrowError> {
        let url = self.api_url("/api/trades")?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| EscrowError::NetworkUnavailable(e.to_string()))?;
        Self::decode(response, None).await
    }

    pub async fn get_trade(&self, trade_id: Uuid) -> Result<TradeRecord, EscrowError> {
        let url = self.api_url(&format!("/api/trades/{}", trade_id))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EscrowError::NetworkUnavailable(e.to_string()))?;
        Self::decode(response, Some(trade_id)).await
    }

    pub async fn join_trade(
        &self,
        trade_id: Uuid,
        buyer_wallet: Address,
    ) -> Result<TradeRecord, EscrowError> {
        let url = self.api_url(&format!("/api/trades/{}/join", trade_id))?;
        let response = self
            .http
            .post(url)
            .json(&JoinBody { buyer_wallet })
            .send()
            .await
            .map_err(|e| EscrowError::NetworkUnavailable(e.to_string()))?;
        Self::decode(response, Some(trade_id)).await
    }

    pub async fn get_runtime_config(&self) -> Result<RuntimeConfig, EscrowError> {
        let url = self.api_url("/api/trades/config")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EscrowError::NetworkUnavailable(e.to_string()))?;
        Self::decode(response, None).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        trade_id: Option<Uuid>,
    ) -> Result<T, EscrowError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            let id = trade_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<none>".to_string());
            return Err(EscrowError::NotFound(id));
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.detail)
            .unwrap_or_else(|_| format!("Backend returned {}", status));
        Err(EscrowError::Validation(detail))
    }
}
