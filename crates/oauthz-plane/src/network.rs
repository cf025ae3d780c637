//! Storage network epoch source
//!
//! The issuance path needs one fact from the storage network: its current
//! epoch. Where that comes from is behind [`EpochSource`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Epoch query failure
#[derive(Error, Debug)]
pub enum EpochError {
    #[error("Epoch request failed: {0}")]
    Request(String),

    #[error("Malformed epoch response: {0}")]
    Malformed(String),

    #[error("Epoch source not configured")]
    NotConfigured,
}

/// Anything that can report the network's current epoch
#[async_trait]
pub trait EpochSource: Send + Sync {
    async fn current_epoch(&self) -> Result<u64, EpochError>;
}

/// Fixed epoch, settable at runtime
#[derive(Debug, Default)]
pub struct FixedEpoch {
    epoch: AtomicU64,
}

impl FixedEpoch {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch: AtomicU64::new(epoch),
        }
    }

    pub fn set(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }
}

#[async_trait]
impl EpochSource for FixedEpoch {
    async fn current_epoch(&self) -> Result<u64, EpochError> {
        Ok(self.epoch.load(Ordering::SeqCst))
    }
}

/// Source used when no epoch endpoint is configured; every query fails
#[derive(Debug, Default)]
pub struct Unconfigured;

#[async_trait]
impl EpochSource for Unconfigured {
    async fn current_epoch(&self) -> Result<u64, EpochError> {
        Err(EpochError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct NetworkInfo {
    current_epoch: u64,
}

/// Queries a network info endpoint returning `{"current_epoch": <n>}`
#[derive(Debug, Clone)]
pub struct HttpEpochSource {
    url: String,
    http_client: reqwest::Client,
}

impl HttpEpochSource {
    pub fn new(url: impl Into<String>) -> Result<Self, EpochError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| EpochError::Request(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl EpochSource for HttpEpochSource {
    async fn current_epoch(&self) -> Result<u64, EpochError> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EpochError::Request(e.to_string()))?;

        let info: NetworkInfo = response
            .json()
            .await
            .map_err(|e| EpochError::Malformed(e.to_string()))?;

        debug!(epoch = info.current_epoch, "Fetched current epoch");
        Ok(info.current_epoch)
    }
}
