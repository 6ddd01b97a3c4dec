//! Industry aggregation and market-wide gainers/losers.
//!
//! Pure functions over a request's quotes; nothing here is cached or
//! persisted.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::Quote;

/// Bucket for quotes whose symbol has no registry industry.
pub const UNMAPPED_INDUSTRY: &str = "N/A";

/// Per-industry summary for one response.
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryAggregate {
    pub industry: String,
    /// Mean percent change rounded to 2 dp
    pub average_percent_change: f64,
    pub constituent_count: usize,
    /// Constituents, descending by percent change
    pub ranked_stocks: Vec<Quote>,
    pub top_stock: Option<Quote>,
}

impl IndustryAggregate {
    /// Average formatted with exactly two decimals ("3.00").
    pub fn average_display(&self) -> String {
        format!("{:.2}", self.average_percent_change)
    }
}

/// Market-wide movers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSummary {
    pub gainers: Vec<Quote>,
    pub losers: Vec<Quote>,
}

fn descending(a: &Quote, b: &Quote) -> Ordering {
    b.percent_change
        .partial_cmp(&a.percent_change)
        .unwrap_or(Ordering::Equal)
}

/// Group quotes by industry and rank the industries.
///
/// A quote counts toward every industry its symbol maps to. Industries
/// appear in first-seen order before ranking; the sort is stable so ties
/// keep that order. Ranking compares the rounded averages.
pub fn aggregate_by_industry(
    quotes: &[Quote],
    symbol_to_industries: &HashMap<String, Vec<String>>,
) -> Vec<IndustryAggregate> {
    let unmapped = vec![UNMAPPED_INDUSTRY.to_string()];
    let mut groups: Vec<(String, Vec<Quote>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for quote in quotes {
        let industries = match symbol_to_industries.get(&quote.symbol) {
            Some(list) if !list.is_empty() => list,
            _ => &unmapped,
        };

        for industry in industries {
            let pos = *positions.entry(industry.clone()).or_insert_with(|| {
                groups.push((industry.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[pos].1.push(quote.clone());
        }
    }

    let mut aggregates: Vec<IndustryAggregate> = groups
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(industry, mut members)| {
            let sum: f64 = members.iter().map(|q| q.percent_change).sum();
            let count = members.len();
            let average = format!("{:.2}", sum / count as f64)
                .parse::<f64>()
                .unwrap_or(0.0);

            members.sort_by(descending);
            let top_stock = members.first().cloned();

            IndustryAggregate {
                industry,
                average_percent_change: average,
                constituent_count: count,
                ranked_stocks: members,
                top_stock,
            }
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.average_percent_change
            .partial_cmp(&a.average_percent_change)
            .unwrap_or(Ordering::Equal)
    });

    aggregates
}

/// Top `limit` gainers (descending) and losers (strictly negative, ascending).
pub fn summarize_market(quotes: &[Quote], limit: usize) -> MarketSummary {
    let mut gainers = quotes.to_vec();
    gainers.sort_by(descending);
    gainers.truncate(limit);

    let mut losers: Vec<Quote> = quotes
        .iter()
        .filter(|q| q.percent_change < 0.0)
        .cloned()
        .collect();
    losers.sort_by(|a, b| descending(b, a));
    losers.truncate(limit);

    MarketSummary { gainers, losers }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, pct: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            percent_change: pct,
            last_price: 100.0,
            company_name: symbol.to_string(),
            fetched_at_ms: 0,
        }
    }

    fn mapping(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(s, inds)| (s.to_string(), inds.iter().map(|i| i.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_average_and_top_stock() {
        let map = mapping(&[("A", &["Tech"]), ("B", &["Tech"])]);
        let result = aggregate_by_industry(&[quote("A", 2.0), quote("B", 4.0)], &map);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].average_display(), "3.00");
        assert_eq!(result[0].constituent_count, 2);
        assert_eq!(result[0].top_stock.as_ref().unwrap().symbol, "B");
        assert_eq!(result[0].ranked_stocks[1].symbol, "A");
    }

    #[test]
    fn test_industries_ranked_descending() {
        let map = mapping(&[
            ("A", &["Banks"]),
            ("B", &["Tech"]),
            ("C", &["Power"]),
        ]);
        let result = aggregate_by_industry(
            &[quote("A", -1.0), quote("B", 2.5), quote("C", 0.4)],
            &map,
        );

        let order: Vec<&str> = result.iter().map(|a| a.industry.as_str()).collect();
        assert_eq!(order, vec!["Tech", "Power", "Banks"]);
    }

    #[test]
    fn test_unmapped_goes_to_sentinel() {
        let map = mapping(&[("A", &["Tech"])]);
        let result = aggregate_by_industry(&[quote("A", 1.0), quote("Z", 5.0)], &map);

        assert_eq!(result[0].industry, UNMAPPED_INDUSTRY);
        assert_eq!(result[0].ranked_stocks[0].symbol, "Z");
    }

    #[test]
    fn test_multi_industry_attribution() {
        let map = mapping(&[("R", &["Energy", "Retail"]), ("D", &["Retail"])]);
        let result = aggregate_by_industry(&[quote("R", 1.0), quote("D", 3.0)], &map);

        let retail = result.iter().find(|a| a.industry == "Retail").unwrap();
        let energy = result.iter().find(|a| a.industry == "Energy").unwrap();
        assert_eq!(retail.constituent_count, 2);
        assert_eq!(retail.average_display(), "2.00");
        assert_eq!(energy.constituent_count, 1);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let map = mapping(&[("A", &["First"]), ("B", &["Second"])]);
        let result = aggregate_by_industry(&[quote("A", 1.001), quote("B", 1.004)], &map);

        // Both round to 1.00
        assert_eq!(result[0].industry, "First");
        assert_eq!(result[1].industry, "Second");
    }

    #[test]
    fn test_tied_leaders_overtake_lower_industry() {
        let map = mapping(&[("C", &["Cement"]), ("A", &["Autos"]), ("B", &["Banks"])]);
        let result = aggregate_by_industry(
            &[quote("C", 1.5), quote("A", 3.0), quote("B", 3.0)],
            &map,
        );

        let ranked: Vec<(&str, String)> = result
            .iter()
            .map(|a| (a.industry.as_str(), a.average_display()))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("Autos", "3.00".to_string()),
                ("Banks", "3.00".to_string()),
                ("Cement", "1.50".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_by_industry(&[], &HashMap::new()).is_empty());
    }

    #[test]
    fn test_losers_strictly_negative_ascending() {
        let quotes = [quote("A", -5.0), quote("B", -1.0), quote("C", -8.0), quote("D", 2.0)];
        let summary = summarize_market(&quotes, 2);

        let losers: Vec<f64> = summary.losers.iter().map(|q| q.percent_change).collect();
        assert_eq!(losers, vec![-8.0, -5.0]);
        assert_eq!(summary.gainers[0].symbol, "D");
        assert_eq!(summary.gainers[1].symbol, "B");
    }

    #[test]
    fn test_summary_limit_and_no_losers() {
        let quotes: Vec<Quote> = (0..15).map(|i| quote(&format!("S{}", i), i as f64)).collect();
        let summary = summarize_market(&quotes, 10);

        assert_eq!(summary.gainers.len(), 10);
        assert_eq!(summary.gainers[0].symbol, "S14");
        assert!(summary.losers.is_empty());
    }
}
