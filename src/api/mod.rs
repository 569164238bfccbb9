use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    Allocation, AllocationKind, AllocationRequest, CORE_PERCENTAGE_RANGE, CryptoSubAllocation,
    DEFAULT_CORE_PERCENTAGE,
    GoldSubAllocation, HistoryPoint, MAX_AGE, PriceObservation, PriceTable, RebalanceFrequency,
    RebalanceResult, RetirementProjectionPoint, StrategyComparisonResult, StrategyId, StrategyInfo,
    SubAllocations, allocation_percentages, calculate, calculate_portfolio_history, clamp_age,
    compare_strategies, generate_retirement_projection, is_valid_age, retirement_milestones,
    simulate_rebalancing, validate_sub_allocations,
};

#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("unknown rebalance frequency '{0}'")]
    UnknownFrequency(String),
}

/// Values used for any field a request leaves out.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub age: f64,
    pub initial_investment: f64,
    pub start_year: u32,
    pub frequency: RebalanceFrequency,
    pub strategies: Vec<StrategyId>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            age: 40.0,
            initial_investment: 10_000.0,
            start_year: 2015,
            frequency: RebalanceFrequency::Annual,
            strategies: vec![
                StrategyId::Mattison,
                StrategyId::SixtyForty,
                StrategyId::Sp500,
            ],
        }
    }
}

#[derive(Clone)]
struct AppState {
    prices: Arc<PriceTable>,
    defaults: Arc<RequestDefaults>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ApiAllocationKind {
    Basic,
    Detailed,
    #[serde(alias = "with-subs", alias = "with_subs", alias = "subs")]
    WithSubs,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AllocationPayload {
    age: Option<f64>,
    portfolio_value: Option<f64>,
    kind: Option<ApiAllocationKind>,
    core_percentage: Option<f64>,

    physical_gold: Option<f64>,
    gold_etf: Option<f64>,
    silver: Option<f64>,
    platinum: Option<f64>,
    bitcoin: Option<f64>,
    ethereum: Option<f64>,
    other_crypto: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BacktestPayload {
    age: Option<f64>,
    gold_percentage: Option<f64>,
    btc_percentage: Option<f64>,
    initial_investment: Option<f64>,
    start_year: Option<u32>,
    frequency: Option<String>,
    /// Comma-separated strategy ids, e.g. `mattison,60_40`.
    strategies: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    age: Option<f64>,
    retirement_age: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BacktestRequest {
    initial_investment: f64,
    start_year: u32,
    gold_percentage: f64,
    btc_percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocationResponse {
    #[serde(flatten)]
    allocation: Allocation,
    age_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_allocations_valid: Option<bool>,
    /// Whether a detailed request's core slice sits in the advised 35-60 band.
    #[serde(skip_serializing_if = "Option::is_none")]
    core_percentage_advised: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    start_year: u32,
    initial_investment: f64,
    gold_percentage: f64,
    btc_percentage: f64,
    points: Vec<HistoryPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RebalanceResponse {
    start_year: u32,
    frequency: RebalanceFrequency,
    gold_percentage: f64,
    btc_percentage: f64,
    #[serde(flatten)]
    result: RebalanceResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    start_year: u32,
    strategies: Vec<&'static StrategyInfo>,
    #[serde(flatten)]
    result: StrategyComparisonResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    current_age: u32,
    retirement_age: u32,
    points: Vec<RetirementProjectionPoint>,
    milestones: Vec<RetirementProjectionPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PricesResponse<'a> {
    earliest_year: Option<u32>,
    latest_year: Option<u32>,
    observations: &'a [PriceObservation],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn finite(name: &str, value: Option<f64>) -> Result<Option<f64>, ApiError> {
    match value {
        Some(v) if !v.is_finite() => Err(ApiError::InvalidRequest(format!(
            "{name} must be a finite number"
        ))),
        other => Ok(other),
    }
}

fn allocation_request_from_payload(
    payload: AllocationPayload,
    defaults: &RequestDefaults,
) -> Result<AllocationRequest, ApiError> {
    let age = finite("age", payload.age)?.unwrap_or(defaults.age);
    let portfolio_value = finite("portfolioValue", payload.portfolio_value)?;

    let kind = match payload.kind.unwrap_or(ApiAllocationKind::Basic) {
        ApiAllocationKind::Basic => AllocationKind::Basic,
        ApiAllocationKind::Detailed => AllocationKind::Detailed {
            core_percentage: finite("corePercentage", payload.core_percentage)?
                .unwrap_or(DEFAULT_CORE_PERCENTAGE),
        },
        ApiAllocationKind::WithSubs => {
            let fallback = SubAllocations::default();
            let weight = |name: &str, value: Option<f64>, default: f64| {
                finite(name, value).map(|v| v.unwrap_or(default))
            };
            AllocationKind::WithSubs(SubAllocations {
                gold: GoldSubAllocation {
                    physical_gold: weight(
                        "physicalGold",
                        payload.physical_gold,
                        fallback.gold.physical_gold,
                    )?,
                    gold_etf: weight("goldEtf", payload.gold_etf, fallback.gold.gold_etf)?,
                    silver: weight("silver", payload.silver, fallback.gold.silver)?,
                    platinum: weight("platinum", payload.platinum, fallback.gold.platinum)?,
                },
                crypto: CryptoSubAllocation {
                    bitcoin: weight("bitcoin", payload.bitcoin, fallback.crypto.bitcoin)?,
                    ethereum: weight("ethereum", payload.ethereum, fallback.crypto.ethereum)?,
                    other: weight("otherCrypto", payload.other_crypto, fallback.crypto.other)?,
                },
            })
        }
    };

    Ok(AllocationRequest {
        age,
        portfolio_value,
        kind,
    })
}

fn backtest_request_from_payload(
    payload: &BacktestPayload,
    defaults: &RequestDefaults,
) -> Result<BacktestRequest, ApiError> {
    let initial_investment = finite("initialInvestment", payload.initial_investment)?
        .unwrap_or(defaults.initial_investment);
    if initial_investment <= 0.0 {
        return Err(ApiError::InvalidRequest(
            "initialInvestment must be > 0".to_string(),
        ));
    }

    let gold = finite("goldPercentage", payload.gold_percentage)?;
    let btc = finite("btcPercentage", payload.btc_percentage)?;
    let (gold_percentage, btc_percentage) = match (gold, btc) {
        (Some(gold), Some(btc)) => {
            if gold < 0.0 || btc < 0.0 || (gold + btc - 100.0).abs() > 0.01 {
                return Err(ApiError::InvalidRequest(
                    "goldPercentage and btcPercentage must be >= 0 and sum to 100".to_string(),
                ));
            }
            (gold, btc)
        }
        (None, None) => {
            let age = finite("age", payload.age)?.unwrap_or(defaults.age);
            let (gold, btc) = allocation_percentages(age);
            (gold as f64, btc as f64)
        }
        _ => {
            return Err(ApiError::InvalidRequest(
                "goldPercentage and btcPercentage must be given together".to_string(),
            ));
        }
    };

    Ok(BacktestRequest {
        initial_investment,
        start_year: payload.start_year.unwrap_or(defaults.start_year),
        gold_percentage,
        btc_percentage,
    })
}

fn frequency_from_payload(
    payload: &BacktestPayload,
    defaults: &RequestDefaults,
) -> Result<RebalanceFrequency, ApiError> {
    match payload.frequency.as_deref() {
        None => Ok(defaults.frequency),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::UnknownFrequency(raw.to_string())),
    }
}

fn strategies_from_payload(
    payload: &BacktestPayload,
    defaults: &RequestDefaults,
) -> Result<Vec<StrategyId>, ApiError> {
    let Some(raw) = payload.strategies.as_deref() else {
        return Ok(defaults.strategies.clone());
    };

    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<StrategyId>()
                .map_err(|_| ApiError::UnknownStrategy(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ApiError::InvalidRequest(
            "strategies must name at least one strategy".to_string(),
        ));
    }
    Ok(ids)
}

pub fn default_retirement_age(current_age: u32) -> f64 {
    (current_age + 30).clamp(60, MAX_AGE) as f64
}

pub fn router(prices: PriceTable, defaults: RequestDefaults) -> Router {
    let state = AppState {
        prices: Arc::new(prices),
        defaults: Arc::new(defaults),
    };

    Router::new()
        .route(
            "/api/allocation",
            get(allocation_get_handler).post(allocation_post_handler),
        )
        .route(
            "/api/history",
            get(history_get_handler).post(history_post_handler),
        )
        .route(
            "/api/rebalance",
            get(rebalance_get_handler).post(rebalance_post_handler),
        )
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route("/api/prices", get(prices_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, prices: PriceTable) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    match (prices.earliest_year(), prices.latest_year()) {
        (Some(first), Some(last)) => info!("loaded price table covering {first}-{last}"),
        _ => warn!("price table is empty; every backtest will return no data"),
    }
    let app = router(prices, RequestDefaults::default());

    let listener = TcpListener::bind(addr).await?;
    info!("allocation API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/allocation");

    axum::serve(listener, app).await
}

// Extractor failures go through the same JSON error path as validation errors.
fn from_query<P>(payload: Result<Query<P>, QueryRejection>) -> Result<P, ApiError> {
    payload
        .map(|Query(payload)| payload)
        .map_err(|rej| ApiError::InvalidRequest(rej.body_text()))
}

fn from_json<P>(payload: Result<Json<P>, JsonRejection>) -> Result<P, ApiError> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|rej| ApiError::InvalidRequest(rej.body_text()))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn allocation_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<AllocationPayload>, QueryRejection>,
) -> Response {
    match from_query(payload) {
        Ok(payload) => allocation_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

async fn allocation_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<AllocationPayload>, JsonRejection>,
) -> Response {
    match from_json(payload) {
        Ok(payload) => allocation_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

fn allocation_handler_impl(state: &AppState, payload: AllocationPayload) -> Response {
    debug!("allocation request: {payload:?}");
    let request = match allocation_request_from_payload(payload, &state.defaults) {
        Ok(request) => request,
        Err(err) => return rejected(err),
    };

    let core_percentage_advised = match request.kind {
        AllocationKind::Detailed { core_percentage } => {
            let advised = CORE_PERCENTAGE_RANGE.contains(&core_percentage);
            if !advised {
                debug!("core slice {core_percentage}% is outside the advised range");
            }
            Some(advised)
        }
        _ => None,
    };
    let sub_allocations_valid = match request.kind {
        AllocationKind::WithSubs(subs) => Some(validate_sub_allocations(&subs)),
        _ => None,
    };
    json_response(
        StatusCode::OK,
        AllocationResponse {
            allocation: calculate(&request),
            age_valid: is_valid_age(request.age),
            sub_allocations_valid,
            core_percentage_advised,
        },
    )
}

async fn history_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<BacktestPayload>, QueryRejection>,
) -> Response {
    match from_query(payload) {
        Ok(payload) => history_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

async fn history_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<BacktestPayload>, JsonRejection>,
) -> Response {
    match from_json(payload) {
        Ok(payload) => history_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

fn history_handler_impl(state: &AppState, payload: BacktestPayload) -> Response {
    debug!("history request: {payload:?}");
    let request = match backtest_request_from_payload(&payload, &state.defaults) {
        Ok(request) => request,
        Err(err) => return rejected(err),
    };

    let points = calculate_portfolio_history(
        &state.prices,
        request.initial_investment,
        request.start_year,
        request.gold_percentage,
        request.btc_percentage,
    );
    json_response(
        StatusCode::OK,
        HistoryResponse {
            start_year: request.start_year,
            initial_investment: request.initial_investment,
            gold_percentage: request.gold_percentage,
            btc_percentage: request.btc_percentage,
            points,
        },
    )
}

async fn rebalance_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<BacktestPayload>, QueryRejection>,
) -> Response {
    match from_query(payload) {
        Ok(payload) => rebalance_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

async fn rebalance_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<BacktestPayload>, JsonRejection>,
) -> Response {
    match from_json(payload) {
        Ok(payload) => rebalance_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

fn rebalance_handler_impl(state: &AppState, payload: BacktestPayload) -> Response {
    debug!("rebalance request: {payload:?}");
    let parsed = backtest_request_from_payload(&payload, &state.defaults).and_then(|request| {
        frequency_from_payload(&payload, &state.defaults).map(|frequency| (request, frequency))
    });
    let (request, frequency) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return rejected(err),
    };

    let result = simulate_rebalancing(
        &state.prices,
        request.initial_investment,
        request.gold_percentage,
        request.btc_percentage,
        frequency,
        request.start_year,
    );
    json_response(
        StatusCode::OK,
        RebalanceResponse {
            start_year: request.start_year,
            frequency,
            gold_percentage: request.gold_percentage,
            btc_percentage: request.btc_percentage,
            result,
        },
    )
}

async fn compare_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<BacktestPayload>, QueryRejection>,
) -> Response {
    match from_query(payload) {
        Ok(payload) => compare_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

async fn compare_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<BacktestPayload>, JsonRejection>,
) -> Response {
    match from_json(payload) {
        Ok(payload) => compare_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

fn compare_handler_impl(state: &AppState, payload: BacktestPayload) -> Response {
    debug!("compare request: {payload:?}");
    let parsed = backtest_request_from_payload(&payload, &state.defaults).and_then(|request| {
        strategies_from_payload(&payload, &state.defaults).map(|ids| (request, ids))
    });
    let (request, ids) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return rejected(err),
    };

    let result = compare_strategies(
        &state.prices,
        &ids,
        request.initial_investment,
        request.start_year,
        request.gold_percentage,
        request.btc_percentage,
    );
    let strategies = result
        .metrics
        .iter()
        .map(|m| m.strategy_id.info())
        .collect();
    json_response(
        StatusCode::OK,
        CompareResponse {
            start_year: request.start_year,
            strategies,
            result,
        },
    )
}

async fn projection_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<ProjectionPayload>, QueryRejection>,
) -> Response {
    match from_query(payload) {
        Ok(payload) => projection_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

async fn projection_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProjectionPayload>, JsonRejection>,
) -> Response {
    match from_json(payload) {
        Ok(payload) => projection_handler_impl(&state, payload),
        Err(err) => rejected(err),
    }
}

fn projection_handler_impl(state: &AppState, payload: ProjectionPayload) -> Response {
    debug!("projection request: {payload:?}");
    let ages = finite("age", payload.age).and_then(|age| {
        finite("retirementAge", payload.retirement_age).map(|retirement| (age, retirement))
    });
    let (age, retirement_age) = match ages {
        Ok(ages) => ages,
        Err(err) => return rejected(err),
    };

    let age = age.unwrap_or(state.defaults.age);
    let retirement_age =
        retirement_age.unwrap_or_else(|| default_retirement_age(clamp_age(age)));
    let points = generate_retirement_projection(age, retirement_age);
    let milestones = retirement_milestones(&points);
    let (current_age, retirement_age) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.age, last.age),
        _ => (clamp_age(age), clamp_age(retirement_age)),
    };

    json_response(
        StatusCode::OK,
        ProjectionResponse {
            current_age,
            retirement_age,
            points,
            milestones,
        },
    )
}

async fn prices_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        PricesResponse {
            earliest_year: state.prices.earliest_year(),
            latest_year: state.prices.latest_year(),
            observations: state.prices.observations(),
        },
    )
}

fn rejected(err: ApiError) -> Response {
    warn!("rejected request: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
