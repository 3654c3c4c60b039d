//! Parsing of the model's textual reply.
//!
//! Any failure here is a `ProviderFailure::Format`, handled by the engine exactly like a
//! network failure. Nothing is filled in with a default score.

use analysis_core::{AnalysisPayload, ProviderFailure, SentimentLabel};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawReply {
    fundamental_score: Option<f64>,
    technical_score: Option<f64>,
    momentum_score: Option<f64>,
    sentiment_score: Option<f64>,
    overall_score: Option<f64>,
    confidence: Option<f64>,
    sentiment_label: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    risks: Vec<String>,
}

/// Locate the JSON object in a reply: a ```json fence first, then the first balanced `{...}`.
pub fn extract_json(content: &str) -> Option<&str> {
    if let Some(start) = content.find("```json") {
        let start = start + 7;
        if let Some(end) = content[start..].find("```") {
            return Some(content[start..start + end].trim());
        }
    }

    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in content[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn score(name: &str, value: Option<f64>) -> Result<f64, ProviderFailure> {
    let value = value.ok_or_else(|| ProviderFailure::Format(format!("reply is missing {}", name)))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(ProviderFailure::Format(format!("{} out of range: {}", name, value)));
    }
    Ok(value)
}

fn parse_label(raw: &str) -> Result<SentimentLabel, ProviderFailure> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "POSITIVE" | "BULLISH" => Ok(SentimentLabel::Positive),
        "NEGATIVE" | "BEARISH" => Ok(SentimentLabel::Negative),
        "NEUTRAL" => Ok(SentimentLabel::Neutral),
        other => Err(ProviderFailure::Format(format!("unknown sentiment_label '{}'", other))),
    }
}

/// Decode and validate a reply into an [`AnalysisPayload`].
///
/// A missing `overall_score` is computed from the four component scores; a missing
/// `sentiment_label` is derived from `sentiment_score` (50 is neutral).
pub fn parse_reply(content: &str) -> Result<AnalysisPayload, ProviderFailure> {
    let json = extract_json(content).ok_or_else(|| ProviderFailure::Format("no JSON object in reply".to_string()))?;
    let raw: RawReply = serde_json::from_str(json)?;

    let fundamental_score = score("fundamental_score", raw.fundamental_score)?;
    let technical_score = score("technical_score", raw.technical_score)?;
    let momentum_score = score("momentum_score", raw.momentum_score)?;
    let sentiment_score = score("sentiment_score", raw.sentiment_score)?;
    let overall_score = match raw.overall_score {
        Some(v) => score("overall_score", Some(v))?,
        None => AnalysisPayload::weighted_overall(fundamental_score, technical_score, momentum_score, sentiment_score),
    };

    let confidence = raw
        .confidence
        .ok_or_else(|| ProviderFailure::Format("reply is missing confidence".to_string()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ProviderFailure::Format(format!("confidence out of range: {}", confidence)));
    }

    let sentiment_label = match raw.sentiment_label.as_deref() {
        Some(label) => parse_label(label)?,
        None => SentimentLabel::from_score((sentiment_score - 50.0) / 50.0),
    };

    let summary = raw.summary.map(|s| s.trim().to_string()).unwrap_or_default();
    if summary.is_empty() {
        return Err(ProviderFailure::Format("reply has an empty summary".to_string()));
    }

    Ok(AnalysisPayload {
        fundamental_score,
        technical_score,
        momentum_score,
        sentiment_score,
        overall_score,
        confidence,
        sentiment_label,
        summary,
        risks: raw.risks.into_iter().filter(|r| !r.trim().is_empty()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::FailureClass;

    const GOOD: &str = r#"{"fundamental_score": 72, "technical_score": 55, "momentum_score": 60,
        "sentiment_score": 65, "overall_score": 64, "confidence": 0.7, "sentiment_label": "positive",
        "summary": "Solid margins {with braces} and steady momentum.", "risks": ["valuation", ""]}"#;

    #[test]
    fn test_extract_json_from_fence() {
        let reply = format!("Here you go:\n```json\n{}\n```\nThanks", GOOD);
        assert_eq!(extract_json(&reply), Some(GOOD));
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let reply = format!("Analysis follows. {} trailing text", GOOD);
        assert_eq!(extract_json(&reply), Some(GOOD));
    }

    #[test]
    fn test_parse_reply() {
        let payload = parse_reply(GOOD).unwrap();
        assert_eq!(payload.fundamental_score, 72.0);
        assert_eq!(payload.sentiment_label, SentimentLabel::Positive);
        assert_eq!(payload.risks, vec!["valuation".to_string()]);
    }

    #[test]
    fn test_missing_overall_is_weighted() {
        let reply = r#"{"fundamental_score": 80, "technical_score": 60, "momentum_score": 50,
            "sentiment_score": 40, "confidence": 0.5, "summary": "Mixed."}"#;
        let payload = parse_reply(reply).unwrap();
        assert!((payload.overall_score - 64.0).abs() < 1e-9);
        assert_eq!(payload.sentiment_label, SentimentLabel::Negative);
    }

    #[test]
    fn test_invalid_replies_are_format_failures() {
        let cases = [
            "I cannot analyse this stock.",
            r#"{"fundamental_score": 72"#,
            r#"{"fundamental_score": 140, "technical_score": 55, "momentum_score": 60, "sentiment_score": 65, "confidence": 0.7, "summary": "x"}"#,
            r#"{"fundamental_score": 72, "technical_score": 55, "momentum_score": 60, "sentiment_score": 65, "confidence": 7, "summary": "x"}"#,
            r#"{"fundamental_score": 72, "technical_score": 55, "momentum_score": 60, "sentiment_score": 65, "confidence": 0.7, "summary": "  "}"#,
            r#"{"technical_score": 55, "momentum_score": 60, "sentiment_score": 65, "confidence": 0.7, "summary": "x"}"#,
        ];
        for case in cases {
            let err = parse_reply(case).unwrap_err();
            assert_eq!(err.class(), FailureClass::ProviderFormatFailure, "case: {}", case);
        }
    }
}
