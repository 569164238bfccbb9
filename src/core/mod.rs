mod allocation;
mod backtest;
mod format;
mod prices;
mod rebalance;
mod strategies;
mod types;

pub use allocation::{
    CORE_PERCENTAGE_RANGE, DEFAULT_CORE_PERCENTAGE, DEFAULT_CRYPTO_SUB, DEFAULT_GOLD_SUB,
    DEFAULT_SUB_ALLOCATIONS, GOLD_AGE_OFFSET, MAX_AGE, MIN_AGE, SUB_ALLOCATION_TOLERANCE,
    allocation_percentages, calculate, calculate_allocation, calculate_allocation_with_subs,
    calculate_detailed_allocation, clamp_age, generate_retirement_projection, is_valid_age,
    retirement_milestones, validate_crypto_sub_allocation, validate_gold_sub_allocation,
    validate_sub_allocations,
};
pub use backtest::calculate_portfolio_history;
pub use format::{format_currency, format_percentage};
pub use prices::{PriceTable, units_for};
pub use rebalance::simulate_rebalancing;
pub use strategies::{
    STRATEGIES, annualized_return, calculate_max_drawdown, calculate_volatility,
    compare_strategies, round_to, total_return,
};
pub use types::{
    Allocation, AllocationKind, AllocationRequest, AllocationResult, AllocationWeights,
    AllocationWithSubs, Asset, ComparisonPoint, CryptoSubAllocation, DetailedAllocation,
    GoldSubAllocation, HistoryPoint, PriceObservation, RebalanceFrequency, RebalancePoint,
    RebalanceResult, RetirementProjectionPoint, StrategyComparisonResult, StrategyId,
    StrategyInfo, StrategyMetrics, SubAllocationAmounts, SubAllocations,
};
