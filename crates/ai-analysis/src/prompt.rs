use analysis_core::MarketInputs;
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You are a financial analyst. You receive recent market data for one stock \
and answer with a single JSON object only, no prose outside it.";

const RESPONSE_SHAPE: &str = r#"Respond with exactly this JSON shape:
{
  "fundamental_score": <number 0-100>,
  "technical_score": <number 0-100>,
  "momentum_score": <number 0-100>,
  "sentiment_score": <number 0-100>,
  "overall_score": <number 0-100>,
  "confidence": <number 0.0-1.0>,
  "sentiment_label": "POSITIVE" | "NEGATIVE" | "NEUTRAL",
  "summary": "<two to four sentences>",
  "risks": ["<short risk>", ...]
}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
}

/// Builds the analysis request, embedding only a bounded window of recent inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    pub max_bars: usize,
    pub max_news: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_bars: 30,
            max_news: 10,
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

impl PromptBuilder {
    pub fn build(&self, inputs: &MarketInputs) -> AnalysisPrompt {
        let mut user = String::new();
        let _ = writeln!(user, "Symbol: {}", inputs.symbol);

        let mut bars: Vec<_> = inputs.bars.iter().collect();
        bars.sort_by_key(|b| b.timestamp);
        let recent = &bars[bars.len().saturating_sub(self.max_bars)..];

        let _ = writeln!(user, "\nDaily bars (oldest first, last {}):", recent.len());
        if recent.is_empty() {
            let _ = writeln!(user, "none available");
        }
        for bar in recent {
            let _ = writeln!(
                user,
                "{} O {:.2} H {:.2} L {:.2} C {:.2} V {:.0}",
                bar.timestamp.format("%Y-%m-%d"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            );
        }
        if let (Some(first), Some(last)) = (recent.first(), recent.last()) {
            if first.close > 0.0 {
                let change = (last.close - first.close) / first.close * 100.0;
                let _ = writeln!(user, "Change over window: {:.2}%", change);
            }
        }

        let mut news: Vec<_> = inputs.news.iter().collect();
        news.sort_by(|a, b| b.published_utc.cmp(&a.published_utc));
        news.truncate(self.max_news);

        let _ = writeln!(user, "\nRecent headlines (newest first):");
        if news.is_empty() {
            let _ = writeln!(user, "none available");
        }
        for article in news {
            let _ = writeln!(user, "- [{}] {}", article.published_utc.format("%Y-%m-%d"), article.title);
        }

        let _ = writeln!(user, "\nLatest reported quarter:");
        match inputs.financials.first() {
            Some(f) => {
                let _ = writeln!(
                    user,
                    "{} {}: revenue {}, net income {}, EPS {}, equity {}",
                    f.fiscal_period,
                    f.fiscal_year,
                    fmt_opt(f.revenue),
                    fmt_opt(f.net_income),
                    fmt_opt(f.eps),
                    fmt_opt(f.shareholders_equity)
                );
            }
            None => {
                let _ = writeln!(user, "none available");
            }
        }

        let _ = write!(user, "\n{}", RESPONSE_SHAPE);

        AnalysisPrompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, NewsArticle};
    use chrono::{Duration, Utc};

    fn inputs(bar_count: usize, news_count: usize) -> MarketInputs {
        let now = Utc::now();
        MarketInputs {
            symbol: "AAPL".to_string(),
            bars: (0..bar_count)
                .map(|i| Bar {
                    timestamp: now - Duration::days((bar_count - i) as i64),
                    open: 100.0,
                    high: 101.0,
                    low: 99.0,
                    close: 100.0 + i as f64,
                    volume: 1000.0,
                    vwap: None,
                })
                .collect(),
            news: (0..news_count)
                .map(|i| NewsArticle {
                    id: i.to_string(),
                    title: format!("Headline {}", i),
                    author: None,
                    published_utc: now - Duration::hours(i as i64),
                    article_url: String::new(),
                    description: None,
                    keywords: Vec::new(),
                    tickers: Vec::new(),
                })
                .collect(),
            financials: Vec::new(),
        }
    }

    #[test]
    fn test_prompt_is_bounded() {
        let prompt = PromptBuilder::default().build(&inputs(90, 40));
        let bar_lines = prompt.user.lines().filter(|l| l.contains(" O ") && l.contains(" C ")).count();
        let news_lines = prompt.user.lines().filter(|l| l.contains("Headline")).count();
        assert_eq!(bar_lines, 30);
        assert_eq!(news_lines, 10);
        // newest headline survives the cut
        assert!(prompt.user.contains("Headline 0"));
        assert!(!prompt.user.contains("Headline 39"));
    }

    #[test]
    fn test_prompt_describes_reply_shape() {
        let prompt = PromptBuilder::default().build(&inputs(0, 0));
        assert!(prompt.user.contains("\"sentiment_label\""));
        assert!(prompt.user.contains("none available"));
        assert!(prompt.system.contains("JSON"));
    }
}
