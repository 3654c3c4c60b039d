//! data-loader: Fetch fundamentals, news sentiment and AI analysis for a set of symbols.
//!
//! Each domain walks its provider chain (cache first, stale data as a last resort) and
//! every symbol gets an outcome, even when all providers fail. Ctrl-C cancels the
//! remaining work but still reports what finished.
//!
//! Usage:
//!   cargo run -p data-loader -- --symbols AAPL MSFT GOOGL
//!   cargo run -p data-loader -- --symbols AAPL --domain sentiment --json
//!   cargo run -p data-loader -- --symbols TSLA --domain all --no-cache

use analysis_core::{
    AnalysisPayload, Availability, FetchOptions, FetchResult, FundamentalsPayload, Payload, SentimentPayload,
};
use data_aggregator::{AggregatorConfig, CacheStats, DataServices};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const DEFAULT_LOG_FILTER: &str = "data_loader=info,data_aggregator=info,data_providers=warn,ai_analysis=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainArg {
    Fundamentals,
    Sentiment,
    Analysis,
    All,
}

impl DomainArg {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fundamentals" => Some(DomainArg::Fundamentals),
            "sentiment" => Some(DomainArg::Sentiment),
            "analysis" => Some(DomainArg::Analysis),
            "all" => Some(DomainArg::All),
            _ => None,
        }
    }

    fn includes(self, other: DomainArg) -> bool {
        self == DomainArg::All || self == other
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  data-loader --symbols AAPL MSFT ...    Symbols to fetch");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --domain D     fundamentals | sentiment | analysis | all (default: all)");
    eprintln!("  --no-cache     Skip fresh cache entries and query providers");
    eprintln!("  --json         Print full results as JSON");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let use_cache = !args.iter().any(|a| a == "--no-cache");
    let as_json = args.iter().any(|a| a == "--json");

    let domain = match args.iter().position(|a| a == "--domain").map(|i| args.get(i + 1)) {
        None => DomainArg::All,
        Some(value) => match value.and_then(|v| DomainArg::parse(v)) {
            Some(d) => d,
            None => {
                print_usage();
                std::process::exit(1);
            }
        },
    };

    let symbols: Vec<String> = match args.iter().position(|a| a == "--symbols") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(|s| s.to_uppercase())
            .collect(),
        None => Vec::new(),
    };
    if symbols.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    let config = AggregatorConfig::from_env()?;
    let services = DataServices::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding fetches");
            on_interrupt.cancel();
        }
    });

    tracing::info!(
        "data-loader: {} symbols, domain={:?}, use_cache={}",
        symbols.len(),
        domain,
        use_cache
    );

    let options = FetchOptions::new();
    let mut report = serde_json::Map::new();

    if domain.includes(DomainArg::Fundamentals) {
        let results = services
            .fundamentals
            .get_batch_result_cancellable(&symbols, &options, use_cache, &cancel)
            .await;
        let stats = services.fundamentals.get_cache_stats().await;
        emit("fundamentals", &results, &stats, as_json, &mut report, describe_fundamentals)?;
    }

    if domain.includes(DomainArg::Sentiment) {
        let results = services
            .sentiment
            .get_batch_result_cancellable(&symbols, &options, use_cache, &cancel)
            .await;
        let stats = services.sentiment.get_cache_stats().await;
        emit("sentiment", &results, &stats, as_json, &mut report, describe_sentiment)?;
    }

    if domain.includes(DomainArg::Analysis) {
        let results = services
            .analysis
            .get_batch_result(&symbols, &options, use_cache, &cancel)
            .await;
        let stats = services.analysis.engine().get_cache_stats().await;
        emit("analysis", &results, &stats, as_json, &mut report, describe_analysis)?;
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn emit<P: Payload>(
    label: &str,
    results: &BTreeMap<String, FetchResult<P>>,
    stats: &CacheStats,
    as_json: bool,
    report: &mut serde_json::Map<String, serde_json::Value>,
    describe: fn(&P) -> String,
) -> anyhow::Result<()> {
    if as_json {
        report.insert(
            label.to_string(),
            serde_json::json!({ "results": results, "cache": stats }),
        );
        return Ok(());
    }

    println!("== {} ==", label);
    for (symbol, result) in results {
        match (result.availability(), result.payload()) {
            (Availability::NoData { reason }, _) => println!("{:<8} no data: {}", symbol, reason),
            (availability, Some(payload)) => println!(
                "{:<8} [{}] {} via {}",
                symbol,
                availability,
                describe(payload),
                result.provider()
            ),
            (availability, None) => println!("{:<8} [{}]", symbol, availability),
        }
    }
    println!(
        "cache: {} entries ({} valid, {} stale, {} invalid)",
        stats.total, stats.valid, stats.stale, stats.invalid
    );
    println!();
    Ok(())
}

fn describe_fundamentals(p: &FundamentalsPayload) -> String {
    let shown: Vec<String> = p
        .ratios
        .iter()
        .take(4)
        .map(|(name, value)| format!("{}={:.2}", name, value))
        .collect();
    format!(
        "{} ({} ratios) {}",
        p.fiscal_period.as_deref().unwrap_or("latest"),
        p.ratios.len(),
        shown.join(" ")
    )
}

fn describe_sentiment(p: &SentimentPayload) -> String {
    format!(
        "{} {:+.3} (confidence {:.2}, {} articles)",
        p.label, p.score, p.confidence, p.article_count
    )
}

fn describe_analysis(p: &AnalysisPayload) -> String {
    format!(
        "overall {:.0}/100 (confidence {:.2}) {}",
        p.overall_score, p.confidence, p.summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_arg_parsing() {
        assert_eq!(DomainArg::parse("Sentiment"), Some(DomainArg::Sentiment));
        assert_eq!(DomainArg::parse("all"), Some(DomainArg::All));
        assert_eq!(DomainArg::parse("prices"), None);
        assert!(DomainArg::All.includes(DomainArg::Analysis));
        assert!(!DomainArg::Fundamentals.includes(DomainArg::Sentiment));
    }

    #[test]
    fn test_describe_sentiment() {
        let text = describe_sentiment(&SentimentPayload::new(0.42, 0.8, 5));
        assert!(text.starts_with("POSITIVE +0.420"), "{}", text);
    }
}
