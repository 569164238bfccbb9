use std::ops::RangeInclusive;

use super::types::{
    Allocation, AllocationKind, AllocationRequest, AllocationResult, AllocationWithSubs,
    CryptoSubAllocation, DetailedAllocation, GoldSubAllocation, RetirementProjectionPoint,
    SubAllocationAmounts, SubAllocations,
};

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 85;
pub const GOLD_AGE_OFFSET: u32 = 15;
pub const DEFAULT_CORE_PERCENTAGE: f64 = 50.0;
/// Advertised range for the core slice. Enforced by callers, not by the engine.
pub const CORE_PERCENTAGE_RANGE: RangeInclusive<f64> = 35.0..=60.0;
pub const SUB_ALLOCATION_TOLERANCE: f64 = 0.01;

pub const DEFAULT_GOLD_SUB: GoldSubAllocation = GoldSubAllocation {
    physical_gold: 100.0,
    gold_etf: 0.0,
    silver: 0.0,
    platinum: 0.0,
};

pub const DEFAULT_CRYPTO_SUB: CryptoSubAllocation = CryptoSubAllocation {
    bitcoin: 100.0,
    ethereum: 0.0,
    other: 0.0,
};

pub const DEFAULT_SUB_ALLOCATIONS: SubAllocations = SubAllocations {
    gold: DEFAULT_GOLD_SUB,
    crypto: DEFAULT_CRYPTO_SUB,
};

impl Default for SubAllocations {
    fn default() -> Self {
        DEFAULT_SUB_ALLOCATIONS
    }
}

/// Clamps to `[MIN_AGE, MAX_AGE]` and drops any fractional part.
pub fn clamp_age(age: f64) -> u32 {
    if !age.is_finite() {
        return MIN_AGE;
    }
    age.clamp(MIN_AGE as f64, MAX_AGE as f64) as u32
}

/// Gold/BTC percentages for an age: gold = age + 15, capped at 100.
pub fn allocation_percentages(age: f64) -> (u32, u32) {
    let gold = (clamp_age(age) + GOLD_AGE_OFFSET).min(100);
    (gold, 100 - gold)
}

fn positive_value(portfolio_value: Option<f64>) -> Option<f64> {
    portfolio_value.filter(|v| v.is_finite() && *v > 0.0)
}

fn share(amount: f64, percentage: f64) -> f64 {
    (amount * (percentage / 100.0)).round()
}

// Both amounts are rounded on their own, so their sum may miss
// round(portfolio_value) by one unit.
pub fn calculate_allocation(age: f64, portfolio_value: Option<f64>) -> AllocationResult {
    let (gold_percentage, btc_percentage) = allocation_percentages(age);
    let value = positive_value(portfolio_value);

    AllocationResult {
        gold_percentage,
        btc_percentage,
        gold_amount: value.map(|v| share(v, gold_percentage as f64)),
        btc_amount: value.map(|v| share(v, btc_percentage as f64)),
    }
}

pub fn calculate_detailed_allocation(
    age: f64,
    portfolio_value: Option<f64>,
    core_percentage: f64,
) -> DetailedAllocation {
    let base = calculate_allocation(age, portfolio_value);
    let satellite_percentage = 100.0 - core_percentage;

    let mut result = DetailedAllocation {
        base,
        core_percentage,
        satellite_percentage,
        core_gold_amount: None,
        core_btc_amount: None,
        satellite_amount: None,
    };

    if let Some(value) = positive_value(portfolio_value) {
        let core_amount = value * (core_percentage / 100.0);
        result.core_gold_amount = Some(share(core_amount, base.gold_percentage as f64));
        result.core_btc_amount = Some(share(core_amount, base.btc_percentage as f64));
        result.satellite_amount = Some(share(value, satellite_percentage));
    }

    result
}

pub fn calculate_allocation_with_subs(
    age: f64,
    portfolio_value: Option<f64>,
    sub_allocations: SubAllocations,
) -> AllocationWithSubs {
    let base = calculate_allocation(age, portfolio_value);
    let gold = sub_allocations.gold;
    let crypto = sub_allocations.crypto;

    let sub_amounts = match (base.gold_amount, base.btc_amount) {
        (Some(gold_amount), Some(btc_amount)) => Some(SubAllocationAmounts {
            physical_gold_amount: share(gold_amount, gold.physical_gold),
            gold_etf_amount: share(gold_amount, gold.gold_etf),
            silver_amount: share(gold_amount, gold.silver),
            platinum_amount: share(gold_amount, gold.platinum),
            bitcoin_amount: share(btc_amount, crypto.bitcoin),
            ethereum_amount: share(btc_amount, crypto.ethereum),
            other_crypto_amount: share(btc_amount, crypto.other),
        }),
        _ => None,
    };

    AllocationWithSubs {
        base,
        sub_allocations,
        gold_sub_valid: validate_gold_sub_allocation(&gold),
        crypto_sub_valid: validate_crypto_sub_allocation(&crypto),
        sub_amounts,
    }
}

pub fn calculate(request: &AllocationRequest) -> Allocation {
    match request.kind {
        AllocationKind::Basic => {
            Allocation::Basic(calculate_allocation(request.age, request.portfolio_value))
        }
        AllocationKind::Detailed { core_percentage } => Allocation::Detailed(
            calculate_detailed_allocation(request.age, request.portfolio_value, core_percentage),
        ),
        AllocationKind::WithSubs(subs) => Allocation::WithSubs(calculate_allocation_with_subs(
            request.age,
            request.portfolio_value,
            subs,
        )),
    }
}

pub fn is_valid_age(age: f64) -> bool {
    age.is_finite() && age.fract() == 0.0 && (MIN_AGE as f64..=MAX_AGE as f64).contains(&age)
}

fn sums_to_hundred(sum: f64) -> bool {
    (sum - 100.0).abs() < SUB_ALLOCATION_TOLERANCE
}

pub fn validate_gold_sub_allocation(sub: &GoldSubAllocation) -> bool {
    sums_to_hundred(sub.physical_gold + sub.gold_etf + sub.silver + sub.platinum)
}

pub fn validate_crypto_sub_allocation(sub: &CryptoSubAllocation) -> bool {
    sums_to_hundred(sub.bitcoin + sub.ethereum + sub.other)
}

pub fn validate_sub_allocations(subs: &SubAllocations) -> bool {
    validate_gold_sub_allocation(&subs.gold) && validate_crypto_sub_allocation(&subs.crypto)
}

/// Yearly glide path of the formula between today and retirement.
pub fn generate_retirement_projection(
    current_age: f64,
    retirement_age: f64,
) -> Vec<RetirementProjectionPoint> {
    let start = clamp_age(current_age);
    let end = clamp_age(retirement_age).max(start);

    (start..=end)
        .map(|age| {
            let (gold_percentage, btc_percentage) = allocation_percentages(age as f64);
            let milestone_label = if age == start {
                Some("Today")
            } else if age == end {
                Some("Retirement")
            } else if age % 10 == 0 {
                Some(decade_label(age))
            } else {
                None
            };

            RetirementProjectionPoint {
                age,
                gold_percentage,
                btc_percentage,
                milestone_label,
            }
        })
        .collect()
}

fn decade_label(age: u32) -> &'static str {
    match age {
        20 => "Age 20",
        30 => "Age 30",
        40 => "Age 40",
        50 => "Age 50",
        60 => "Age 60",
        70 => "Age 70",
        _ => "Age 80",
    }
}

pub fn retirement_milestones(
    points: &[RetirementProjectionPoint],
) -> Vec<RetirementProjectionPoint> {
    points
        .iter()
        .filter(|p| p.milestone_label.is_some())
        .copied()
        .collect()
}
