//! External link reachability
//!
//! A best-effort liveness check, not a security control. One HEAD request,
//! then one GET if the HEAD did not answer with a success status. Network
//! errors and timeouts count as unreachable; there are no retries.

use async_trait::async_trait;
use reqwest::{Client, Method};
use sdk::errors::MarketError;
use std::time::Duration;
use tracing::debug;

use crate::config::SubmissionConfig;

/// Check whether an external URL answers
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Returns true when the URL responded with a success status
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Link probe over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpLinkProbe {
    client: Client,
}

impl HttpLinkProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, MarketError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| MarketError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &SubmissionConfig) -> Result<Self, MarketError> {
        Self::new(config.link_check_timeout(), &config.link_check_user_agent)
    }

    async fn attempt(&self, method: Method, url: &str) -> bool {
        match self.client.request(method.clone(), url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!("{} {} -> {}", method, url, response.status());
                ok
            }
            Err(e) => {
                debug!("{} {} failed: {}", method, url, e);
                false
            }
        }
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        if self.attempt(Method::HEAD, url).await {
            return true;
        }
        self.attempt(Method::GET, url).await
    }
}
