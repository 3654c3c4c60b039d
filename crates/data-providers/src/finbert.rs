use analysis_core::{
    DataProvider, FetchOptions, FetchResult, ProviderFailure, RateLimits, SentimentDomain, SentimentPayload,
};
use async_trait::async_trait;
use polygon_client::PolygonClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::polygon::{polygon_limits, POLYGON_QUOTA};

const PROVIDER_NAME: &str = "finbert";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSentimentResponse {
    pub overall_sentiment: String,
    pub score: f64,
    pub confidence: f64,
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub neutral_ratio: f64,
    pub article_count: usize,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
struct NewsSentimentRequest {
    headlines: Vec<String>,
    descriptions: Option<Vec<String>>,
    symbol: Option<String>,
}

/// Client for the FinBERT sentiment service
#[derive(Clone)]
pub struct FinbertClient {
    client: reqwest::Client,
    base_url: String,
}

impl FinbertClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Analyze news headlines with optional descriptions
    pub async fn analyze_news(
        &self,
        headlines: Vec<String>,
        descriptions: Option<Vec<String>>,
        symbol: Option<String>,
    ) -> Result<NewsSentimentResponse, ProviderFailure> {
        let request = NewsSentimentRequest {
            headlines,
            descriptions,
            symbol,
        };

        let response = self
            .client
            .post(format!("{}/analyze-news", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderFailure::status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(response.json().await?)
    }
}

fn to_payload(response: &NewsSentimentResponse) -> Result<SentimentPayload, ProviderFailure> {
    if !response.score.is_finite() || !response.confidence.is_finite() {
        return Err(ProviderFailure::Format("non-numeric score from sentiment service".to_string()));
    }
    Ok(SentimentPayload::new(response.score, response.confidence, response.article_count))
}

/// Polygon news scored by the FinBERT service
pub struct FinbertSentiment {
    finbert: Option<FinbertClient>,
    news: Arc<PolygonClient>,
}

impl FinbertSentiment {
    /// `finbert` is `None` when no service URL is configured.
    pub fn new(finbert: Option<FinbertClient>, news: Arc<PolygonClient>) -> Self {
        Self { finbert, news }
    }

    async fn load(&self, key: &str, options: &FetchOptions) -> Result<SentimentPayload, ProviderFailure> {
        let finbert = self
            .finbert
            .as_ref()
            .ok_or_else(|| ProviderFailure::Unavailable("ML_SENTIMENT_URL not set".to_string()))?;

        let articles = self.news.get_news(Some(key), crate::news_limit(options)).await?;
        if articles.is_empty() {
            return Err(ProviderFailure::Format(format!("no news for {}", key)));
        }

        let headlines = articles.iter().map(|a| a.title.clone()).collect();
        let descriptions = articles
            .iter()
            .map(|a| a.description.clone().unwrap_or_default())
            .collect();

        let response = finbert
            .analyze_news(headlines, Some(descriptions), Some(key.to_string()))
            .await?;
        to_payload(&response)
    }
}

#[async_trait]
impl DataProvider<SentimentDomain> for FinbertSentiment {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        self.finbert.is_some() && self.news.has_credentials()
    }

    fn rate_limits(&self) -> RateLimits {
        polygon_limits(&self.news)
    }

    fn quota_key(&self) -> &str {
        POLYGON_QUOTA
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, _context: &()) -> FetchResult<SentimentPayload> {
        FetchResult::from_outcome(key, PROVIDER_NAME, self.load(key, options).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::SentimentLabel;

    fn response(score: f64, count: usize) -> NewsSentimentResponse {
        NewsSentimentResponse {
            overall_sentiment: "negative".to_string(),
            score,
            confidence: 0.8,
            positive_ratio: 0.1,
            negative_ratio: 0.7,
            neutral_ratio: 0.2,
            article_count: count,
            processing_time_ms: 12.0,
        }
    }

    #[test]
    fn test_to_payload() {
        let p = to_payload(&response(-0.6, 5)).unwrap();
        assert_eq!(p.label, SentimentLabel::Negative);
        assert_eq!(p.article_count, 5);
    }

    #[test]
    fn test_to_payload_rejects_nan() {
        assert!(to_payload(&response(f64::NAN, 5)).is_err());
    }

    #[test]
    fn test_unavailable_without_url() {
        let news = Arc::new(PolygonClient::new("key".to_string(), 5));
        let provider = FinbertSentiment::new(None, news.clone());
        assert!(!provider.is_available());

        let client = FinbertClient::new("http://localhost:8003/".to_string(), Duration::from_secs(5));
        let provider = FinbertSentiment::new(Some(client), news);
        assert!(provider.is_available());
    }
}
