//! Fundamental ratios derived from raw quarterly statements.

use analysis_core::{Financials, FundamentalsPayload};

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    ratio(numerator, denominator).map(|r| r * 100.0)
}

/// Sum a field across quarters, `None` if no quarter reports it
fn sum_ttm(quarters: &[Financials], accessor: fn(&Financials) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = quarters.iter().filter_map(accessor).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

/// Year-over-year revenue growth: trailing four quarters against the four before.
///
/// Requires at least three reported quarters on each side and normalizes when counts differ.
pub fn revenue_growth_yoy(financials: &[Financials]) -> Option<f64> {
    if financials.len() < 5 {
        return None;
    }
    let current = &financials[..4];
    let prior = &financials[4..financials.len().min(8)];

    let current_count = current.iter().filter(|f| f.revenue.is_some()).count();
    let prior_count = prior.iter().filter(|f| f.revenue.is_some()).count();
    if current_count < 3 || prior_count < 3 {
        return None;
    }

    let current_norm = sum_ttm(current, |f| f.revenue)? / current_count as f64 * 4.0;
    let prior_norm = sum_ttm(prior, |f| f.revenue)? / prior_count as f64 * 4.0;
    if prior_norm <= 0.0 {
        return None;
    }
    Some((current_norm - prior_norm) / prior_norm * 100.0)
}

/// Flow metrics use TTM sums of the latest four quarters; balance-sheet items use the latest quarter.
/// `financials` must be ordered most recent first.
pub fn derive_ratios(financials: &[Financials]) -> FundamentalsPayload {
    let mut payload = FundamentalsPayload::default();
    let Some(latest) = financials.first() else {
        return payload;
    };

    let ttm = &financials[..financials.len().min(4)];
    let revenue = sum_ttm(ttm, |f| f.revenue);
    let gross_profit = sum_ttm(ttm, |f| f.gross_profit);
    let operating_income = sum_ttm(ttm, |f| f.operating_income);
    let net_income = sum_ttm(ttm, |f| f.net_income);

    payload.fiscal_period = Some(format!("{} {}", latest.fiscal_period, latest.fiscal_year));
    payload.set("eps", sum_ttm(ttm, |f| f.eps));

    if let Some(revenue) = revenue {
        payload.set("gross_margin", gross_profit.and_then(|g| percent(g, revenue)));
        payload.set("operating_margin", operating_income.and_then(|o| percent(o, revenue)));
        payload.set("profit_margin", net_income.and_then(|n| percent(n, revenue)));
    }
    if let Some(net_income) = net_income {
        payload.set("roe", latest.shareholders_equity.and_then(|e| percent(net_income, e)));
        payload.set("roa", latest.total_assets.and_then(|a| percent(net_income, a)));
    }
    if let (Some(liabilities), Some(equity)) = (latest.total_liabilities, latest.shareholders_equity) {
        payload.set("debt_to_equity", ratio(liabilities, equity));
    }
    if let (Some(assets), Some(liabilities)) = (latest.current_assets, latest.current_liabilities) {
        payload.set("current_ratio", ratio(assets, liabilities));
    }
    payload.set("revenue_growth_yoy", revenue_growth_yoy(financials));

    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter(period: &str, year: i32, revenue: f64, net_income: f64) -> Financials {
        Financials {
            symbol: "TEST".to_string(),
            fiscal_period: period.to_string(),
            fiscal_year: year,
            revenue: Some(revenue),
            gross_profit: Some(revenue * 0.4),
            operating_income: Some(revenue * 0.2),
            net_income: Some(net_income),
            eps: Some(1.0),
            total_assets: Some(2000.0),
            total_liabilities: Some(600.0),
            current_assets: Some(300.0),
            current_liabilities: Some(150.0),
            shareholders_equity: Some(1000.0),
            cash_flow_operating: None,
        }
    }

    #[test]
    fn test_derive_ratios_ttm() {
        let fins: Vec<Financials> = (0..4).map(|i| quarter(&format!("Q{}", 4 - i), 2024, 100.0, 25.0)).collect();
        let p = derive_ratios(&fins);

        assert_eq!(p.get("eps"), Some(4.0));
        assert_eq!(p.get("profit_margin"), Some(25.0));
        assert_eq!(p.get("roe"), Some(10.0));
        assert_eq!(p.get("roa"), Some(5.0));
        assert_eq!(p.get("debt_to_equity"), Some(0.6));
        assert_eq!(p.get("current_ratio"), Some(2.0));
        assert!(p.get("revenue_growth_yoy").is_none());
        assert_eq!(p.fiscal_period.as_deref(), Some("Q4 2024"));
    }

    #[test]
    fn test_revenue_growth_yoy() {
        let mut fins: Vec<Financials> = (0..4).map(|_| quarter("Q", 2024, 110.0, 10.0)).collect();
        fins.extend((0..4).map(|_| quarter("Q", 2023, 100.0, 10.0)));
        let growth = revenue_growth_yoy(&fins).unwrap();
        assert!((growth - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_financials_is_empty() {
        let p = derive_ratios(&[]);
        assert!(p.ratios.is_empty());
    }

    #[test]
    fn test_negative_equity_skips_roe() {
        let mut q = quarter("Q1", 2024, 100.0, 10.0);
        q.shareholders_equity = Some(-50.0);
        let p = derive_ratios(&[q]);
        assert!(p.get("roe").is_none());
        assert!(p.get("debt_to_equity").is_none());
        assert!(p.get("profit_margin").is_some());
    }
}
