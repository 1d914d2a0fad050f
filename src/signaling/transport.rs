//! One-shot HTTP signaling transport

use tracing::{debug, info};

use super::types::{IceCandidateExchange, SdpExchange};
use crate::config::ClientConfig;
use crate::error::{AppError, Result};

/// HTTP transport for the offer/answer exchange and the candidate push
pub struct SignalingTransport {
    client: reqwest::Client,
    offer_url: String,
    candidate_url: String,
}

impl SignalingTransport {
    /// Create a transport from the client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| AppError::Signaling(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            offer_url: config.signaling_url.clone(),
            candidate_url: config.signaling_ice_url.clone(),
        })
    }

    /// Send the local offer and return the parsed answer
    ///
    /// Non-2xx status, an empty body, an unparseable body and an empty
    /// answer SDP are each a signaling failure. There is no retry; the
    /// caller aborts the negotiation attempt.
    pub async fn exchange_offer(&self, sdp: &str) -> Result<SdpExchange> {
        let body = SdpExchange::offer(sdp);

        let response = self
            .client
            .post(&self.offer_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Offer request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Offer rejected: {}", e)))?;

        let text = response
            .text()
            .await
            .map_err(|e| AppError::Signaling(format!("Failed to read answer body: {}", e)))?;

        if text.trim().is_empty() {
            return Err(AppError::Signaling("Answer body is empty".to_string()));
        }

        debug!("Answer body: {}", text);

        let answer: SdpExchange = serde_json::from_str(&text)
            .map_err(|e| AppError::Signaling(format!("Unparseable answer body: {}", e)))?;

        if answer.sdp.trim().is_empty() {
            return Err(AppError::InvalidAnswer("Answer SDP is empty".to_string()));
        }

        info!("Received SDP answer ({} bytes)", answer.sdp.len());
        Ok(answer)
    }

    /// Push one locally discovered ICE candidate
    ///
    /// Fire-and-forget from the session's point of view: the caller
    /// logs a failure and moves on, it never retries and never touches
    /// negotiation state.
    pub async fn push_candidate(&self, candidate: &IceCandidateExchange) -> Result<()> {
        self.client
            .post(&self.candidate_url)
            .json(candidate)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Candidate push failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Candidate rejected: {}", e)))?;

        // No response body is consumed
        Ok(())
    }
}
