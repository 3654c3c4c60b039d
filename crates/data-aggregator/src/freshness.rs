use analysis_core::MarketInputs;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 0-100 quality signal for the inputs behind an analysis, independent of whether
/// the analysis call itself succeeded.
#[derive(Debug, Clone)]
pub struct FreshnessScorer {
    pub price_penalty_per_day: u32,
    pub max_price_age_penalty: u32,
    pub missing_price_penalty: u32,
    pub news_max_age_days: i64,
    pub stale_news_penalty: u32,
    pub missing_fundamentals_penalty: u32,
}

impl Default for FreshnessScorer {
    fn default() -> Self {
        Self {
            price_penalty_per_day: 5,
            max_price_age_penalty: 30,
            missing_price_penalty: 30,
            news_max_age_days: 7,
            stale_news_penalty: 15,
            missing_fundamentals_penalty: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreshnessReport {
    pub score: u8,
    pub price_age_days: Option<i64>,
    pub news_age_days: Option<i64>,
    pub has_fundamentals: bool,
}

impl FreshnessScorer {
    pub fn score(&self, inputs: &MarketInputs, now: DateTime<Utc>) -> FreshnessReport {
        let mut penalty: u32 = 0;

        let price_age_days = inputs.latest_bar().map(|b| (now - b.timestamp).num_days().max(0));
        match price_age_days {
            Some(age) if age > 1 => {
                let per_day = (age as u32).saturating_mul(self.price_penalty_per_day);
                penalty += per_day.min(self.max_price_age_penalty);
            }
            Some(_) => {}
            None => penalty += self.missing_price_penalty,
        }

        let news_age_days = inputs.newest_article().map(|a| (now - a.published_utc).num_days().max(0));
        match news_age_days {
            Some(age) if age <= self.news_max_age_days => {}
            _ => penalty += self.stale_news_penalty,
        }

        let has_fundamentals = !inputs.financials.is_empty();
        if !has_fundamentals {
            penalty += self.missing_fundamentals_penalty;
        }

        FreshnessReport {
            score: 100u32.saturating_sub(penalty) as u8,
            price_age_days,
            news_age_days,
            has_fundamentals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, Financials, NewsArticle};
    use chrono::Duration;

    fn bar(at: DateTime<Utc>) -> Bar {
        Bar {
            timestamp: at,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            vwap: None,
        }
    }

    fn article(at: DateTime<Utc>) -> NewsArticle {
        NewsArticle {
            id: "1".to_string(),
            title: "t".to_string(),
            author: None,
            published_utc: at,
            article_url: String::new(),
            description: None,
            keywords: Vec::new(),
            tickers: Vec::new(),
        }
    }

    fn quarter() -> Financials {
        Financials {
            symbol: "AAPL".to_string(),
            fiscal_period: "Q1".to_string(),
            fiscal_year: 2025,
            revenue: Some(1.0),
            gross_profit: None,
            operating_income: None,
            net_income: None,
            eps: None,
            total_assets: None,
            total_liabilities: None,
            current_assets: None,
            current_liabilities: None,
            shareholders_equity: None,
            cash_flow_operating: None,
        }
    }

    fn inputs(price_age: Option<i64>, news_age: Option<i64>, fundamentals: bool) -> MarketInputs {
        let now = Utc::now();
        MarketInputs {
            symbol: "AAPL".to_string(),
            bars: price_age.map(|d| vec![bar(now - Duration::days(d))]).unwrap_or_default(),
            news: news_age.map(|d| vec![article(now - Duration::days(d))]).unwrap_or_default(),
            financials: if fundamentals { vec![quarter()] } else { Vec::new() },
        }
    }

    #[test]
    fn test_all_fresh_scores_100() {
        let report = FreshnessScorer::default().score(&inputs(Some(0), Some(1), true), Utc::now());
        assert_eq!(report.score, 100);
        assert!(report.has_fundamentals);
    }

    #[test]
    fn test_price_age_penalty_is_bounded() {
        let scorer = FreshnessScorer::default();
        assert_eq!(scorer.score(&inputs(Some(1), Some(0), true), Utc::now()).score, 100);
        assert_eq!(scorer.score(&inputs(Some(3), Some(0), true), Utc::now()).score, 85);
        assert_eq!(scorer.score(&inputs(Some(40), Some(0), true), Utc::now()).score, 70);
    }

    #[test]
    fn test_missing_and_week_old_news() {
        let scorer = FreshnessScorer::default();
        assert_eq!(scorer.score(&inputs(Some(0), None, true), Utc::now()).score, 85);
        assert_eq!(scorer.score(&inputs(Some(0), Some(10), true), Utc::now()).score, 85);
    }

    #[test]
    fn test_missing_inputs_and_floor() {
        let report = FreshnessScorer::default().score(&inputs(None, None, false), Utc::now());
        assert_eq!(report.score, 30);
        assert!(report.price_age_days.is_none());

        let harsh = FreshnessScorer {
            missing_fundamentals_penalty: 90,
            ..Default::default()
        };
        assert_eq!(harsh.score(&inputs(None, None, false), Utc::now()).score, 0);
    }
}
