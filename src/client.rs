//! Draw history source
//!
//! The engine only needs an ordered list of recent draws; where they come
//! from is a transport detail behind [`HistorySource`]. The HTTP client
//! talks to the external collector, the in-memory source feeds tests and
//! offline runs.

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::types::{Draw, DrawId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Recent draws, newest first
    async fn recent_draws(&self, limit: usize) -> Result<Vec<Draw>>;
}

#[derive(Debug, Deserialize)]
struct DrawDto {
    id: String,
    digit: u8,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// JSON client for the collector endpoint
pub struct HttpHistoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryClient {
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl HistorySource for HttpHistoryClient {
    async fn recent_draws(&self, limit: usize) -> Result<Vec<Draw>> {
        let url = format!("{}?limit={}", self.base_url, limit);
        let dtos: Vec<DrawDto> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut draws = Vec::with_capacity(dtos.len());
        for dto in dtos {
            match DrawId::parse(&dto.id) {
                Some(id) => draws.push(Draw {
                    id,
                    digit: dto.digit.min(9),
                    timestamp: dto.timestamp.unwrap_or_else(Utc::now),
                }),
                None => {
                    tracing::warn!("skipping draw with malformed id {:?}", dto.id);
                }
            }
        }
        Ok(draws)
    }
}

/// In-memory history for tests and replay. Clones share the same backing
/// list, so a test can keep a handle and feed draws between cycles.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    draws: std::sync::Arc<parking_lot::RwLock<Vec<Draw>>>,
}

impl StaticHistory {
    pub fn new(draws: Vec<Draw>) -> Self {
        Self {
            draws: std::sync::Arc::new(parking_lot::RwLock::new(draws)),
        }
    }

    /// Insert a newly observed draw at the newest position
    pub fn push_front(&self, draw: Draw) {
        self.draws.write().insert(0, draw);
    }
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn recent_draws(&self, limit: usize) -> Result<Vec<Draw>> {
        Ok(self.draws.read().iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_history_respects_limit() {
        let draws: Vec<Draw> = (0..5)
            .map(|i| Draw {
                id: DrawId::parse(&format!("20250509100{}", i)).unwrap(),
                digit: i as u8,
                timestamp: Utc::now(),
            })
            .collect();
        let source = StaticHistory::new(draws);

        let fetched = source.recent_draws(3).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].digit, 0);
    }

    #[test]
    fn test_draw_dto_parses_without_timestamp() {
        let dto: DrawDto = serde_json::from_str(r#"{"id":"202505091001","digit":7}"#).unwrap();
        assert_eq!(dto.id, "202505091001");
        assert_eq!(dto.digit, 7);
        assert!(dto.timestamp.is_none());
    }
}
