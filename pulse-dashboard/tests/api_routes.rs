//! HTTP API tests against the full router with a scripted quote provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use pulse_common::Config;
use pulse_dashboard::data::{ProviderError, QuoteProvider, RawQuote, RegistryRow, SymbolRegistry};
use pulse_dashboard::routes::build_router;
use pulse_dashboard::storage::Storage;
use pulse_dashboard::AppState;

// ============================================================================
// Fixtures
// ============================================================================

/// Provider serving a fixed percent change per symbol
struct TableProvider {
    changes: HashMap<&'static str, f64>,
    down: bool,
}

#[async_trait]
impl QuoteProvider for TableProvider {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError> {
        if self.down {
            return Err(ProviderError::Unavailable("maintenance".into()));
        }
        let change = self
            .changes
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        Ok(RawQuote {
            company_name: Some(format!("{} Ltd", symbol)),
            percent_change: Some(change),
            last_price: Some(1000.0 + change),
        })
    }
}

fn state(down: bool) -> Arc<AppState> {
    let registry = SymbolRegistry::from_rows(vec![
        RegistryRow::new("TCS", "IT"),
        RegistryRow::new("INFY", "IT"),
        RegistryRow::new("NTPC", "Power"),
        RegistryRow::new("POWERGRID", "Power"),
    ])
    .unwrap();

    let provider = TableProvider {
        changes: HashMap::from([
            ("TCS", 2.0),
            ("INFY", 4.0),
            ("NTPC", -1.0),
            ("POWERGRID", -3.5),
        ]),
        down,
    };

    let mut config = Config::default();
    config.market.inter_batch_delay_ms = 0;
    config.market.max_retries = 1;
    config.jobs.enabled = false;

    let storage = Arc::new(Storage::in_memory().unwrap());
    Arc::new(AppState::with_parts(config, Arc::new(registry), Arc::new(provider), storage).unwrap())
}

async fn send(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    send(state, "GET", uri).await
}

fn symbols(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|q| q["symbol"].as_str().unwrap())
        .collect()
}

// ============================================================================
// Health & Registry
// ============================================================================

#[tokio::test]
async fn test_health() {
    let state = state(false);
    let (status, body) = get(&state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pulse-dashboard");
    assert_eq!(body["symbols"], 4);
    assert_eq!(body["storage"]["priceRows"], 0);
}

#[tokio::test]
async fn test_industries_listing() {
    let state = state(false);
    let (status, body) = get(&state, "/api/industries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["fallback"], false);
    assert_eq!(body["industries"][0]["industry"], "IT");
    assert_eq!(body["industries"][0]["symbols"], serde_json::json!(["TCS", "INFY"]));
}

// ============================================================================
// Market & Industry Data
// ============================================================================

#[tokio::test]
async fn test_market_data_movers() {
    let state = state(false);
    let (status, body) = get(&state, "/api/market-data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(symbols(&body["gainers"]), vec!["INFY", "TCS", "NTPC", "POWERGRID"]);
    assert_eq!(symbols(&body["losers"]), vec!["POWERGRID", "NTPC"]);
    assert_eq!(body["gainers"][0]["priceInfo"]["pChange"], 4.0);
    assert_eq!(body["gainers"][0]["info"]["companyName"], "INFY Ltd");
    assert_eq!(body["cached"], false);

    let (_, again) = get(&state, "/api/market-data").await;
    assert_eq!(again["cached"], true);

    let (_, forced) = get(&state, "/api/market-data?refresh=true").await;
    assert_eq!(forced["cached"], false);
}

#[tokio::test]
async fn test_market_data_without_quotes() {
    let state = state(true);
    let (status, body) = get(&state, "/api/market-data").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No valid market data available");
}

#[tokio::test]
async fn test_industry_data_ranked() {
    let state = state(false);
    let (status, body) = get(&state, "/api/industry-data?timeframe=1w").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeframe"], "1w");
    assert!(body.get("warning").is_none());

    let industries = body["industries"].as_array().unwrap();
    assert_eq!(industries.len(), 2);
    assert_eq!(industries[0]["industry"], "IT");
    assert_eq!(industries[0]["avgPChange"], "3.00");
    assert_eq!(industries[0]["stockCount"], 2);
    assert_eq!(industries[0]["topStock"]["symbol"], "INFY");
    assert_eq!(industries[1]["avgPChange"], "-2.25");
}

#[tokio::test]
async fn test_industry_data_rejects_unknown_timeframe() {
    let state = state(false);
    let (status, body) = get(&state, "/api/industry-data?timeframe=5y").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("5y"));
}

#[tokio::test]
async fn test_industry_data_warns_when_empty() {
    let state = state(true);
    let (status, body) = get(&state, "/api/industry-data").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["industries"].as_array().unwrap().is_empty());
    assert!(body["warning"].is_string());
    assert_eq!(body["timeframe"], "1d");
}

// ============================================================================
// Synthetic Endpoints
// ============================================================================

#[tokio::test]
async fn test_delivery_data_by_industry() {
    let state = state(false);
    let (status, body) = get(&state, "/api/delivery-data?industry=Power").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synthetic"], true);
    assert_eq!(symbols(&body["stocks"]), vec!["NTPC", "POWERGRID"]);
}

#[tokio::test]
async fn test_delivery_data_validation() {
    let state = state(false);

    let (status, _) = get(&state, "/api/delivery-data?symbol=WIPRO").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/delivery-data?industry=Cement").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&state, "/api/delivery-data?symbol=tcs.ns").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(symbols(&body["stocks"]), vec!["TCS"]);
}

#[tokio::test]
async fn test_ai_analysis() {
    let state = state(false);

    let (status, body) = get(&state, "/api/ai-analysis?symbol1=TCS&symbol2=INFY").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synthetic"], true);
    assert_eq!(body["symbol1"], "TCS");
    assert!(body["signal"].is_string());

    let (status, _) = get(&state, "/api/ai-analysis?symbol1=TCS").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/ai-analysis?symbol1=TCS&symbol2=tcs").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Persistence & Jobs
// ============================================================================

#[tokio::test]
async fn test_price_snapshot_job_feeds_history() {
    let state = state(false);

    let (_, body) = get(&state, "/api/db/prices").await;
    assert_eq!(body["count"], 0);

    let (status, body) = send(&state, "POST", "/api/jobs/price_snapshot/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["records"], 4);

    let (_, body) = get(&state, "/api/db/prices?symbol=NTPC&days=7").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["records"][0]["industry"], "Power");

    let (_, body) = get(&state, "/api/db/job-logs").await;
    assert_eq!(body["logs"][0]["jobName"], "price_snapshot");
}

#[tokio::test]
async fn test_delivery_snapshot_job() {
    let state = state(false);

    let (status, _) = send(&state, "POST", "/api/jobs/delivery_snapshot/run").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&state, "/api/db/delivery?symbol=INFY").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let state = state(true);
    let (status, body) = send(&state, "POST", "/api/jobs/price_snapshot/run").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("price_snapshot"));

    let (_, body) = get(&state, "/api/db/job-logs?limit=1").await;
    assert_eq!(body["logs"][0]["status"], "failed");
}

#[tokio::test]
async fn test_unknown_job() {
    let state = state(false);
    let (status, _) = send(&state, "POST", "/api/jobs/rebalance/run").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_jobs_listing() {
    let state = state(false);
    let (status, body) = get(&state, "/api/jobs").await;

    assert_eq!(status, StatusCode::OK);
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0]["job"], "price_snapshot");
    assert_eq!(jobs[0]["scheduled"], false);
}

#[tokio::test]
async fn test_history_parameter_validation() {
    let state = state(false);

    let (status, _) = get(&state, "/api/db/delivery").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/db/prices?days=week").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/db/job-logs?limit=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_with_maximum_day_window() {
    let state = state(false);
    send(&state, "POST", "/api/jobs/price_snapshot/run").await;

    let (status, body) = get(&state, "/api/db/prices?days=4294967295").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);

    let (status, _) = get(&state, "/api/db/delivery?symbol=TCS&days=4294967295").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_latest_snapshot() {
    let state = state(false);
    send(&state, "POST", "/api/jobs/price_snapshot/run").await;

    let (status, body) = get(&state, "/api/db/latest?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["symbol"], "INFY");
    assert_eq!(body["records"][1]["symbol"], "TCS");

    let (_, body) = get(&state, "/health").await;
    assert_eq!(body["storage"]["priceRows"], 4);
}
