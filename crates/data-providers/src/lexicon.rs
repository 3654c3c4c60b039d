use analysis_core::{
    DataProvider, FetchOptions, FetchResult, NewsArticle, ProviderFailure, RateLimits, SentimentDomain,
    SentimentPayload,
};
use async_trait::async_trait;
use polygon_client::PolygonClient;
use std::collections::HashSet;
use std::sync::Arc;

use crate::polygon::{polygon_limits, POLYGON_QUOTA};

const PROVIDER_NAME: &str = "lexicon";

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "profit", "growth", "beat", "upgrade", "outperform", "strong",
    "positive", "rise", "increase", "breakthrough", "success", "exceed", "momentum", "record", "advance",
    "dividend", "buyback", "repurchase", "accretive", "upside", "recovery", "rebound", "expansion", "robust",
    "accelerating", "overweight", "raised", "upgraded", "outpacing", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "fall", "plunge", "crash", "miss", "downgrade", "underperform", "weak",
    "negative", "drop", "decrease", "concern", "fail", "disappoint", "slump", "warning", "pessimistic",
    "retreat", "fear", "trouble", "dilution", "dilutive", "headwind", "lawsuit", "litigation", "recall",
    "investigation", "probe", "default", "bankruptcy", "layoff", "downside", "overvalued", "underweight",
    "lowered", "suspended",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't", "won't",
    "hardly", "barely", "without",
];

const NEGATION_WINDOW: usize = 3;

/// Upper bound on confidence for word-list scoring
const MAX_CONFIDENCE: f64 = 0.7;

/// Word-list sentiment. Runs locally over whatever news it is handed.
pub struct LexiconScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Net count of positive minus negative hits, flipping words preceded by a negation.
    pub fn analyze_text(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':'))
            .filter(|w| !w.is_empty())
            .collect();

        let mut score = 0i32;
        for (i, word) in words.iter().enumerate() {
            let polarity = if self.positive.contains(word) {
                1
            } else if self.negative.contains(word) {
                -1
            } else {
                continue;
            };

            let negated = words[i.saturating_sub(NEGATION_WINDOW)..i]
                .iter()
                .any(|w| self.negation.contains(w));
            score += if negated { -polarity } else { polarity };
        }
        score as f64
    }

    /// Title counts double, keywords half.
    pub fn analyze_article(&self, article: &NewsArticle) -> f64 {
        let mut total = self.analyze_text(&article.title) * 2.0;
        if let Some(desc) = &article.description {
            total += self.analyze_text(desc);
        }
        for keyword in &article.keywords {
            total += self.analyze_text(keyword) * 0.5;
        }
        total
    }

    /// `None` when there is nothing to score; a missing reading is not a neutral one.
    pub fn score_articles(&self, articles: &[NewsArticle]) -> Option<SentimentPayload> {
        if articles.is_empty() {
            return None;
        }

        let scores: Vec<f64> = articles.iter().map(|a| self.analyze_article(a)).collect();
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let opinionated = scores.iter().filter(|s| s.abs() > 0.0).count() as f64 / n;

        let score = (mean / 3.0).tanh();
        let confidence = (0.6 * (n / 10.0).min(1.0) + 0.4 * opinionated) * MAX_CONFIDENCE;
        Some(SentimentPayload::new(score, confidence, articles.len()))
    }
}

/// Lexicon scoring over Polygon news
pub struct LexiconSentiment {
    scorer: LexiconScorer,
    news: Arc<PolygonClient>,
}

impl LexiconSentiment {
    pub fn new(news: Arc<PolygonClient>) -> Self {
        Self {
            scorer: LexiconScorer::new(),
            news,
        }
    }

    async fn load(&self, key: &str, options: &FetchOptions) -> Result<SentimentPayload, ProviderFailure> {
        let articles = self.news.get_news(Some(key), crate::news_limit(options)).await?;
        self.scorer
            .score_articles(&articles)
            .ok_or_else(|| ProviderFailure::Format(format!("no news for {}", key)))
    }
}

#[async_trait]
impl DataProvider<SentimentDomain> for LexiconSentiment {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        self.news.has_credentials()
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
