//! HTTP routes for the dashboard service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::analytics::{DeliveryStats, PairAnalysis};
use crate::data::{
    aggregate_by_industry, normalize_symbol, now_ms, summarize_market, CacheStats,
    IndustryAggregate, Quote, Timeframe,
};
use crate::error::ApiError;
use crate::jobs::{JobKind, JobStatus};
use crate::storage::{DeliveryRecord, JobLog, JobRunStatus, PriceRecord, StorageStats};
use crate::AppState;
use pulse_common::config::parse_bool_flag;

/// Gainers/losers returned by `/api/market-data`
const MOVERS_LIMIT: usize = 10;

const DEFAULT_HISTORY_DAYS: u32 = 30;
const DEFAULT_JOB_LOG_LIMIT: usize = 50;
const DEFAULT_LATEST_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

/// Upper bound on a single request, covering a full uncached registry fetch
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The API takes no request bodies
const MAX_BODY_BYTES: usize = 16 * 1024;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/market-data", get(market_data))
        .route("/api/industry-data", get(industry_data))
        .route("/api/industries", get(industries))
        .route("/api/delivery-data", get(delivery_data))
        .route("/api/ai-analysis", get(ai_analysis))
        .route("/api/db/prices", get(db_prices))
        .route("/api/db/latest", get(db_latest))
        .route("/api/db/delivery", get(db_delivery))
        .route("/api/db/job-logs", get(db_job_logs))
        .route("/api/jobs", get(jobs_status))
        .route("/api/jobs/:name/run", post(run_job))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
        .with_state(state)
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub symbols: usize,
    pub registry_fallback: bool,
    pub cache: CacheStats,
    pub storage: Option<StorageStats>,
}

/// Quote in the provider's wire shape.
#[derive(Debug, Serialize)]
pub struct QuoteBody {
    pub symbol: String,
    #[serde(rename = "priceInfo")]
    pub price_info: PriceInfoBody,
    pub info: InfoBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfoBody {
    pub p_change: f64,
    pub last_price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBody {
    pub company_name: String,
}

impl From<&Quote> for QuoteBody {
    fn from(q: &Quote) -> Self {
        Self {
            symbol: q.symbol.clone(),
            price_info: PriceInfoBody {
                p_change: q.percent_change,
                last_price: q.last_price,
            },
            info: InfoBody {
                company_name: q.company_name.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryBody {
    pub industry: String,
    pub avg_p_change: String,
    pub stock_count: usize,
    pub stocks: Vec<QuoteBody>,
    pub top_stock: Option<QuoteBody>,
}

impl From<&IndustryAggregate> for IndustryBody {
    fn from(a: &IndustryAggregate) -> Self {
        Self {
            industry: a.industry.clone(),
            avg_p_change: a.average_display(),
            stock_count: a.constituent_count,
            stocks: a.ranked_stocks.iter().map(QuoteBody::from).collect(),
            top_stock: a.top_stock.as_ref().map(QuoteBody::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarketDataResponse {
    pub gainers: Vec<QuoteBody>,
    pub losers: Vec<QuoteBody>,
    pub cached: bool,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct IndustryDataResponse {
    pub industries: Vec<IndustryBody>,
    pub cached: bool,
    pub timestamp: i64,
    pub timeframe: Timeframe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndustryMembers {
    pub industry: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IndustriesResponse {
    pub industries: Vec<IndustryMembers>,
    pub count: usize,
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct DeliveryDataResponse {
    pub synthetic: bool,
    pub date: NaiveDate,
    pub stocks: Vec<DeliveryStats>,
}

#[derive(Debug, Serialize)]
pub struct AiAnalysisResponse {
    pub synthetic: bool,
    #[serde(flatten)]
    pub analysis: PairAnalysis,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse<T> {
    pub records: Vec<T>,
    pub count: usize,
}

impl<T> RecordsResponse<T> {
    fn new(records: Vec<T>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobLogsResponse {
    pub logs: Vec<JobLog>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJobResponse {
    pub job: JobKind,
    pub status: JobRunStatus,
    pub records: usize,
    pub log_id: i64,
}

// ============================================================================
// Query Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub refresh: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndustryQuery {
    pub timeframe: Option<String>,
    pub refresh: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryQuery {
    pub symbol: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiAnalysisQuery {
    pub symbol1: Option<String>,
    pub symbol2: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub symbol: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

fn is_refresh(value: Option<&str>) -> bool {
    value.map(parse_bool_flag).unwrap_or(false)
}

/// Parse an optional numeric query parameter.
fn parse_param<T: FromStr>(name: &str, value: Option<&str>, default: T) -> Result<T, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", name, raw))),
    }
}

/// Normalize a symbol parameter and require registry membership.
fn registered_symbol(state: &AppState, name: &str, value: Option<&str>) -> Result<String, ApiError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required parameter: {}", name)))?;

    let symbol = normalize_symbol(raw);
    if !state.registry.contains(&symbol) {
        return Err(ApiError::BadRequest(format!("Unknown symbol: {}", raw)));
    }
    Ok(symbol)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = match state.storage.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Storage stats unavailable");
            None
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "pulse-dashboard".to_string(),
        symbols: state.registry.len(),
        registry_fallback: state.registry.is_fallback(),
        cache: state.cache.stats(),
        storage,
    })
}

/// Market-wide top gainers and losers
pub async fn market_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<MarketDataResponse> {
    let outcome = state
        .fetcher
        .fetch_registry(is_refresh(query.refresh.as_deref()))
        .await?;

    if outcome.quotes.is_empty() {
        tracing::error!(requested = outcome.requested, "No quotes available for market summary");
        return Err(ApiError::NoData("No valid market data available".into()));
    }

    let summary = summarize_market(&outcome.quotes, MOVERS_LIMIT);

    Ok(Json(MarketDataResponse {
        gainers: summary.gainers.iter().map(QuoteBody::from).collect(),
        losers: summary.losers.iter().map(QuoteBody::from).collect(),
        cached: outcome.served_from_cache,
        timestamp: now_ms(),
    }))
}

/// Per-industry aggregates, best industry first
pub async fn industry_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndustryQuery>,
) -> ApiResult<IndustryDataResponse> {
    let timeframe = match query.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => Timeframe::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid timeframe: {}", raw)))?,
    };

    let outcome = state
        .fetcher
        .fetch_registry(is_refresh(query.refresh.as_deref()))
        .await?;

    let aggregates = aggregate_by_industry(&outcome.quotes, state.registry.symbol_to_industries());
    let warning = if aggregates.is_empty() {
        tracing::warn!(timeframe = %timeframe, "No industry data available");
        Some("No industry data currently available".to_string())
    } else {
        None
    };

    Ok(Json(IndustryDataResponse {
        industries: aggregates.iter().map(IndustryBody::from).collect(),
        cached: outcome.served_from_cache,
        timestamp: now_ms(),
        timeframe,
        warning,
    }))
}

/// Registry contents
pub async fn industries(State(state): State<Arc<AppState>>) -> Json<IndustriesResponse> {
    let industries: Vec<IndustryMembers> = state
        .registry
        .industries()
        .map(|(industry, symbols)| IndustryMembers {
            industry: industry.to_string(),
            symbols: symbols.to_vec(),
        })
        .collect();

    Json(IndustriesResponse {
        count: industries.len(),
        industries,
        fallback: state.registry.is_fallback(),
    })
}

/// Synthetic delivery statistics for a symbol, an industry, or everything
pub async fn delivery_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeliveryQuery>,
) -> ApiResult<DeliveryDataResponse> {
    let symbols: Vec<String> = if query.symbol.is_some() {
        vec![registered_symbol(&state, "symbol", query.symbol.as_deref())?]
    } else if let Some(industry) = query.industry.as_deref().map(str::trim) {
        state
            .registry
            .members(industry)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown industry: {}", industry)))?
            .to_vec()
    } else {
        state.registry.symbols().to_vec()
    };

    let date = Local::now().date_naive();
    let stocks = symbols
        .iter()
        .map(|s| state.analytics.delivery_stats(s, date))
        .collect();

    Ok(Json(DeliveryDataResponse {
        synthetic: true,
        date,
        stocks,
    }))
}

/// Synthetic pairwise analysis
pub async fn ai_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AiAnalysisQuery>,
) -> ApiResult<AiAnalysisResponse> {
    let symbol1 = registered_symbol(&state, "symbol1", query.symbol1.as_deref())?;
    let symbol2 = registered_symbol(&state, "symbol2", query.symbol2.as_deref())?;

    if symbol1 == symbol2 {
        return Err(ApiError::BadRequest(
            "symbol1 and symbol2 must be different".into(),
        ));
    }

    let analysis = state
        .analytics
        .pair_analysis(&symbol1, &symbol2, Local::now().date_naive());

    Ok(Json(AiAnalysisResponse {
        synthetic: true,
        analysis,
    }))
}

/// Persisted price history
pub async fn db_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<RecordsResponse<PriceRecord>> {
    let days = parse_param("days", query.days.as_deref(), DEFAULT_HISTORY_DAYS)?;
    let symbol = query
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol);

    let records = state.storage.price_history(symbol.as_deref(), days).await?;
    Ok(Json(RecordsResponse::new(records)))
}

/// Most recent price snapshot, best performers first
pub async fn db_latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<RecordsResponse<PriceRecord>> {
    let limit = parse_param("limit", query.limit.as_deref(), DEFAULT_LATEST_LIMIT)?
        .clamp(1, MAX_LIMIT);

    let records = state.storage.latest_prices(limit).await?;
    Ok(Json(RecordsResponse::new(records)))
}

/// Persisted delivery history for one symbol
pub async fn db_delivery(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<RecordsResponse<DeliveryRecord>> {
    let days = parse_param("days", query.days.as_deref(), DEFAULT_HISTORY_DAYS)?;
    let symbol = query
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol)
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter: symbol".into()))?;

    let records = state.storage.delivery_history(&symbol, days).await?;
    Ok(Json(RecordsResponse::new(records)))
}

/// Recent job runs
pub async fn db_job_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<JobLogsResponse> {
    let limit = parse_param("limit", query.limit.as_deref(), DEFAULT_JOB_LOG_LIMIT)?
        .clamp(1, MAX_LIMIT);

    let logs = state.storage.job_logs(limit).await?;
    Ok(Json(JobLogsResponse { logs }))
}

/// Job schedules and last/next runs
pub async fn jobs_status(State(state): State<Arc<AppState>>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.scheduler.status().await,
    })
}

/// Trigger a job manually
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<RunJobResponse> {
    let kind = JobKind::from_name(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown job: {}", name)))?;

    tracing::info!(job = kind.name(), "Manual job trigger");
    let report = state.jobs.run(kind).await?;

    if report.status == JobRunStatus::Failed {
        return Err(ApiError::NoData(format!(
            "Job {} failed; see job logs",
            kind.name()
        )));
    }

    Ok(Json(RunJobResponse {
        job: report.job,
        status: report.status,
        records: report.records,
        log_id: report.log_id,
    }))
}
