use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Asset {
    Gold,
    Bitcoin,
    Sp500,
    Ethereum,
    Silver,
    Platinum,
    Bonds,
}

/// One calendar year of reference prices (January 1st close).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceObservation {
    pub year: u32,
    pub gold: f64,
    pub bitcoin: f64,
    pub sp500: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethereum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silver: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platinum: Option<f64>,
    pub bonds: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub gold_percentage: u32,
    pub btc_percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_amount: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldSubAllocation {
    pub physical_gold: f64,
    pub gold_etf: f64,
    pub silver: f64,
    pub platinum: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoSubAllocation {
    pub bitcoin: f64,
    pub ethereum: f64,
    pub other: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubAllocations {
    pub gold: GoldSubAllocation,
    pub crypto: CryptoSubAllocation,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAllocationAmounts {
    pub physical_gold_amount: f64,
    pub gold_etf_amount: f64,
    pub silver_amount: f64,
    pub platinum_amount: f64,
    pub bitcoin_amount: f64,
    pub ethereum_amount: f64,
    pub other_crypto_amount: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAllocation {
    #[serde(flatten)]
    pub base: AllocationResult,
    pub core_percentage: f64,
    pub satellite_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_gold_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_btc_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellite_amount: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationWithSubs {
    #[serde(flatten)]
    pub base: AllocationResult,
    pub sub_allocations: SubAllocations,
    pub gold_sub_valid: bool,
    pub crypto_sub_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_amounts: Option<SubAllocationAmounts>,
}

/// The three result shapes the formula engine produces, tagged so callers
/// match on the variant instead of probing for optional fields.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Allocation {
    Basic(AllocationResult),
    Detailed(DetailedAllocation),
    WithSubs(AllocationWithSubs),
}

impl Allocation {
    pub fn base(&self) -> &AllocationResult {
        match self {
            Allocation::Basic(result) => result,
            Allocation::Detailed(detailed) => &detailed.base,
            Allocation::WithSubs(with_subs) => &with_subs.base,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AllocationKind {
    Basic,
    Detailed { core_percentage: f64 },
    WithSubs(SubAllocations),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AllocationRequest {
    pub age: f64,
    pub portfolio_value: Option<f64>,
    pub kind: AllocationKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjectionPoint {
    pub age: u32,
    pub gold_percentage: u32,
    pub btc_percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_label: Option<&'static str>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub year: u32,
    pub mattison_value: f64,
    pub sp500_value: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    None,
    Annual,
    Quarterly,
    Monthly,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePoint {
    pub year: u32,
    pub rebalanced_value: f64,
    pub buy_hold_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceResult {
    pub data_points: Vec<RebalancePoint>,
    pub final_rebalanced: f64,
    pub final_buy_hold: f64,
    pub difference_percent: f64,
    pub total_rebalance_events: u32,
}

impl RebalanceResult {
    pub fn empty() -> Self {
        Self {
            data_points: Vec::new(),
            final_rebalanced: 0.0,
            final_buy_hold: 0.0,
            difference_percent: 0.0,
            total_rebalance_events: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    #[serde(rename = "mattison")]
    Mattison,
    #[serde(rename = "sp500")]
    Sp500,
    #[serde(rename = "60_40")]
    SixtyForty,
    #[serde(rename = "all_weather")]
    AllWeather,
    #[serde(rename = "permanent")]
    Permanent,
    #[serde(rename = "gold_only")]
    GoldOnly,
    #[serde(rename = "bitcoin_only")]
    BitcoinOnly,
}

/// Percent weights over the asset classes a strategy can hold.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationWeights {
    pub stocks: f64,
    pub bonds: f64,
    pub gold: f64,
    pub bitcoin: f64,
    pub commodities: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub id: StrategyId,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    /// `None` for strategies whose weights are supplied per request.
    pub allocation: Option<AllocationWeights>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub year: u32,
    #[serde(flatten)]
    pub values: BTreeMap<StrategyId, f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetrics {
    pub strategy_id: StrategyId,
    pub final_value: f64,
    pub total_return: i64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparisonResult {
    pub data_points: Vec<ComparisonPoint>,
    pub metrics: Vec<StrategyMetrics>,
}
