use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::prices::{PriceTable, units_for};
use super::types::{
    AllocationWeights, Asset, ComparisonPoint, PriceObservation, StrategyComparisonResult,
    StrategyId, StrategyInfo, StrategyMetrics,
};

const fn weights(
    stocks: f64,
    bonds: f64,
    gold: f64,
    bitcoin: f64,
    commodities: f64,
) -> AllocationWeights {
    AllocationWeights {
        stocks,
        bonds,
        gold,
        bitcoin,
        commodities,
    }
}

pub const STRATEGIES: [StrategyInfo; 7] = [
    StrategyInfo {
        id: StrategyId::Mattison,
        name: "Mattison",
        description: "Age-based Gold/Bitcoin split: gold = age + 15, the rest in bitcoin.",
        color: "#FFD700",
        allocation: None,
    },
    StrategyInfo {
        id: StrategyId::Sp500,
        name: "S&P 500",
        description: "100% US large-cap stocks.",
        color: "#3B82F6",
        allocation: Some(weights(100.0, 0.0, 0.0, 0.0, 0.0)),
    },
    StrategyInfo {
        id: StrategyId::SixtyForty,
        name: "60/40",
        description: "Classic balanced portfolio: 60% stocks, 40% bonds.",
        color: "#8B5CF6",
        allocation: Some(weights(60.0, 40.0, 0.0, 0.0, 0.0)),
    },
    StrategyInfo {
        id: StrategyId::AllWeather,
        name: "All Weather",
        description: "Risk-parity mix: 30% stocks, 55% bonds, 7.5% gold, 7.5% commodities.",
        color: "#10B981",
        allocation: Some(weights(30.0, 55.0, 7.5, 0.0, 7.5)),
    },
    StrategyInfo {
        id: StrategyId::Permanent,
        name: "Permanent Portfolio",
        description: "25% stocks, 25% gold, 50% bonds (the cash quarter is held as bonds).",
        color: "#EC4899",
        allocation: Some(weights(25.0, 50.0, 25.0, 0.0, 0.0)),
    },
    StrategyInfo {
        id: StrategyId::GoldOnly,
        name: "Gold Only",
        description: "100% gold bullion.",
        color: "#D4A017",
        allocation: Some(weights(0.0, 0.0, 100.0, 0.0, 0.0)),
    },
    StrategyInfo {
        id: StrategyId::BitcoinOnly,
        name: "Bitcoin Only",
        description: "100% bitcoin.",
        color: "#F7931A",
        allocation: Some(weights(0.0, 0.0, 0.0, 100.0, 0.0)),
    },
];

impl StrategyId {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::Mattison => "mattison",
            StrategyId::Sp500 => "sp500",
            StrategyId::SixtyForty => "60_40",
            StrategyId::AllWeather => "all_weather",
            StrategyId::Permanent => "permanent",
            StrategyId::GoldOnly => "gold_only",
            StrategyId::BitcoinOnly => "bitcoin_only",
        }
    }

    pub fn info(self) -> &'static StrategyInfo {
        STRATEGIES
            .iter()
            .find(|s| s.id == self)
            .unwrap_or(&STRATEGIES[0])
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        STRATEGIES
            .iter()
            .map(|info| info.id)
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown strategy '{wanted}'"))
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Largest peak-to-trough decline, in percent. Never negative.
pub fn calculate_max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown: f64 = 0.0;

    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak * 100.0);
        }
    }

    round_to(max_drawdown, 1)
}

/// Sample standard deviation of year-over-year returns, in percent.
pub fn calculate_volatility(values: &[f64]) -> f64 {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    round_to(variance.sqrt() * 100.0, 1)
}

pub fn annualized_return(initial: f64, final_value: f64, years: u32) -> f64 {
    if years == 0 || initial <= 0.0 || final_value < 0.0 {
        return 0.0;
    }
    let growth = (final_value / initial).powf(1.0 / years as f64) - 1.0;
    round_to(growth * 100.0, 1)
}

pub fn total_return(initial: f64, final_value: f64) -> i64 {
    if initial <= 0.0 {
        return 0;
    }
    ((final_value - initial) / initial * 100.0).round() as i64
}

/// Units per bucket. Commodities are valued as gold.
#[derive(Debug, Clone, Copy)]
struct Buckets {
    gold: f64,
    bitcoin: f64,
    stocks: f64,
    bonds: f64,
}

impl Buckets {
    fn buy(amount: f64, w: AllocationWeights, at: &PriceObservation) -> Self {
        let slice = |pct: f64| amount * (pct / 100.0);
        Self {
            gold: units_for(slice(w.gold + w.commodities), at.price(Asset::Gold)),
            bitcoin: units_for(slice(w.bitcoin), at.price(Asset::Bitcoin)),
            stocks: units_for(slice(w.stocks), at.price(Asset::Sp500)),
            bonds: units_for(slice(w.bonds), at.price(Asset::Bonds)),
        }
    }

    fn value(self, at: &PriceObservation) -> f64 {
        self.gold * at.gold
            + self.bitcoin * at.bitcoin
            + self.stocks * at.sp500
            + self.bonds * at.bonds
    }
}

fn strategy_weights(
    info: &StrategyInfo,
    mattison_gold_percentage: f64,
    mattison_btc_percentage: f64,
) -> AllocationWeights {
    info.allocation.unwrap_or(AllocationWeights {
        gold: mattison_gold_percentage,
        bitcoin: mattison_btc_percentage,
        ..AllocationWeights::default()
    })
}

/// Unrounded buy-and-hold series, one `(year, value)` per observation from `start_year`.
fn strategy_series(
    prices: &PriceTable,
    weights: AllocationWeights,
    initial_investment: f64,
    start_year: u32,
) -> Vec<(u32, f64)> {
    let Some(start) = prices.lookup(start_year) else {
        return Vec::new();
    };
    let units = Buckets::buy(initial_investment, weights, start);
    prices
        .since(start_year)
        .map(|o| (o.year, units.value(o)))
        .collect()
}

fn strategy_metrics(
    id: StrategyId,
    initial_investment: f64,
    series: &[(u32, f64)],
) -> Option<StrategyMetrics> {
    let (first_year, _) = *series.first()?;
    let (last_year, final_value) = *series.last()?;
    let values: Vec<f64> = series.iter().map(|&(_, v)| v).collect();

    Some(StrategyMetrics {
        strategy_id: id,
        final_value: final_value.round(),
        total_return: total_return(initial_investment, final_value),
        annualized_return: annualized_return(
            initial_investment,
            final_value,
            last_year - first_year,
        ),
        max_drawdown: calculate_max_drawdown(&values),
        volatility: calculate_volatility(&values),
    })
}

/// Buy-and-hold comparison of the selected strategies from `start_year`.
/// Duplicate ids are ignored; the Mattison weights come from the caller.
pub fn compare_strategies(
    prices: &PriceTable,
    selected: &[StrategyId],
    initial_investment: f64,
    start_year: u32,
    mattison_gold_percentage: f64,
    mattison_btc_percentage: f64,
) -> StrategyComparisonResult {
    let mut seen = Vec::with_capacity(selected.len());
    let mut rows: BTreeMap<u32, BTreeMap<StrategyId, f64>> = BTreeMap::new();
    let mut metrics = Vec::new();

    for &id in selected {
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);

        let weights =
            strategy_weights(id.info(), mattison_gold_percentage, mattison_btc_percentage);
        let series = strategy_series(prices, weights, initial_investment, start_year);
        for &(year, value) in &series {
            rows.entry(year).or_default().insert(id, value.round());
        }
        if let Some(m) = strategy_metrics(id, initial_investment, &series) {
            metrics.push(m);
        }
    }

    StrategyComparisonResult {
        data_points: rows
            .into_iter()
            .map(|(year, values)| ComparisonPoint { year, values })
            .collect(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn catalog_ids_round_trip_through_strings() {
        for info in &STRATEGIES {
            assert_eq!(info.id.as_str().parse::<StrategyId>(), Ok(info.id));
            assert_eq!(info.id.info().name, info.name);
        }
        assert_eq!("60_40".parse::<StrategyId>(), Ok(StrategyId::SixtyForty));
        assert!("crypto_maxi".parse::<StrategyId>().is_err());
    }

    #[test]
    fn static_weights_sum_to_hundred() {
        for info in STRATEGIES.iter().filter(|s| s.allocation.is_some()) {
            let w = info.allocation.unwrap();
            assert_approx(w.stocks + w.bonds + w.gold + w.bitcoin + w.commodities, 100.0);
        }
        assert!(StrategyId::Mattison.info().allocation.is_none());
    }

    #[test]
    fn drawdown_is_zero_for_rising_series() {
        assert_eq!(calculate_max_drawdown(&[]), 0.0);
        assert_eq!(calculate_max_drawdown(&[100.0, 100.0, 120.0, 150.0]), 0.0);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let values = [100.0, 110.0, 105.0, 108.0, 95.0, 100.0];
        // (110 - 95) / 110 = 13.636...%
        assert_eq!(calculate_max_drawdown(&values), 13.6);
        assert_eq!(calculate_max_drawdown(&[200.0, 100.0, 300.0, 150.0]), 50.0);
    }

    #[test]
    fn volatility_uses_sample_deviation() {
        assert_eq!(calculate_volatility(&[100.0]), 0.0);
        assert_eq!(calculate_volatility(&[100.0, 110.0]), 0.0);
        // Returns +10% and -10%: mean 0, sample variance 0.02.
        let vol = calculate_volatility(&[100.0, 110.0, 99.0]);
        assert_eq!(vol, round_to(0.02f64.sqrt() * 100.0, 1));
        assert_eq!(calculate_volatility(&[100.0, 110.0, 121.0]), 0.0);
    }

    #[test]
    fn return_helpers() {
        assert_eq!(total_return(10_000.0, 25_000.0), 150);
        assert_eq!(total_return(0.0, 25_000.0), 0);
        assert_eq!(annualized_return(100.0, 121.0, 2), 10.0);
        assert_eq!(annualized_return(100.0, 121.0, 0), 0.0);
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(-2.25, 1), -2.3);
    }

    #[test]
    fn compare_builds_one_column_per_strategy() {
        let prices = PriceTable::builtin();
        let selected = [StrategyId::Mattison, StrategyId::SixtyForty, StrategyId::Sp500];
        let result = compare_strategies(&prices, &selected, 10_000.0, 2015, 55.0, 45.0);

        assert_eq!(result.data_points.len(), 11);
        assert_eq!(result.metrics.len(), 3);
        let first = &result.data_points[0];
        assert_eq!(first.year, 2015);
        for id in selected {
            assert_eq!(first.values.get(&id), Some(&10_000.0), "{id}");
        }
        assert_eq!(
            result.metrics.iter().map(|m| m.strategy_id).collect::<Vec<_>>(),
            selected.to_vec()
        );
    }

    #[test]
    fn sp500_strategy_matches_benchmark_math() {
        let prices = PriceTable::builtin();
        let result =
            compare_strategies(&prices, &[StrategyId::Sp500], 10_000.0, 2015, 55.0, 45.0);
        let metrics = result.metrics[0];
        let final_value = 10_000.0_f64 / 2059.0 * 5881.0;
        assert_eq!(metrics.final_value, final_value.round());
        assert_eq!(metrics.total_return, ((final_value - 10_000.0) / 100.0).round() as i64);
        assert_eq!(
            metrics.annualized_return,
            round_to(((final_value / 10_000.0).powf(0.1) - 1.0) * 100.0, 1)
        );
        // 2022 -> 2023: 4766 -> 3839.
        assert_eq!(metrics.max_drawdown, round_to((4766.0 - 3839.0) / 4766.0 * 100.0, 1));
        assert!(metrics.volatility > 0.0);
    }

    #[test]
    fn mattison_uses_caller_weights() {
        let prices = PriceTable::builtin();
        let all_gold =
            compare_strategies(&prices, &[StrategyId::Mattison], 10_000.0, 2015, 100.0, 0.0);
        let gold_only =
            compare_strategies(&prices, &[StrategyId::GoldOnly], 10_000.0, 2015, 55.0, 45.0);
        assert_eq!(all_gold.metrics[0].final_value, gold_only.metrics[0].final_value);
        assert_eq!(all_gold.metrics[0].volatility, gold_only.metrics[0].volatility);
    }

    #[test]
    fn commodities_are_valued_as_gold() {
        let prices = PriceTable::builtin();
        let start = prices.lookup(2015).unwrap();
        let end = prices.lookup(2025).unwrap();
        let with_commodities = Buckets::buy(1_000.0, weights(0.0, 0.0, 50.0, 0.0, 50.0), start);
        let gold = Buckets::buy(1_000.0, weights(0.0, 0.0, 100.0, 0.0, 0.0), start);
        assert_approx(with_commodities.value(end), gold.value(end));
    }

    #[test]
    fn duplicate_selection_is_ignored() {
        let prices = PriceTable::builtin();
        let result = compare_strategies(
            &prices,
            &[StrategyId::Sp500, StrategyId::Sp500, StrategyId::GoldOnly],
            10_000.0,
            2020,
            55.0,
            45.0,
        );
        assert_eq!(result.metrics.len(), 2);
        assert!(result.data_points.iter().all(|p| p.values.len() == 2));
    }

    #[test]
    fn missing_start_year_yields_empty_comparison() {
        let prices = PriceTable::builtin();
        let result =
            compare_strategies(&prices, &[StrategyId::Sp500], 10_000.0, 1999, 55.0, 45.0);
        assert_eq!(result, StrategyComparisonResult::default());
    }

    #[test]
    fn comparison_point_serializes_flat_columns() {
        let prices = PriceTable::builtin();
        let result = compare_strategies(
            &prices,
            &[StrategyId::Mattison, StrategyId::SixtyForty],
            10_000.0,
            2024,
            55.0,
            45.0,
        );
        let json = serde_json::to_value(&result.data_points[0]).expect("serializes");
        assert_eq!(json["year"], 2024);
        assert_eq!(json["mattison"], 10_000.0);
        assert_eq!(json["60_40"], 10_000.0);
    }

    proptest! {
        #[test]
        fn prop_drawdown_is_bounded(values in vec(0.0f64..1e7, 0..40)) {
            let dd = calculate_max_drawdown(&values);
            prop_assert!(dd >= 0.0);
            prop_assert!(dd <= 100.0);
        }

        #[test]
        fn prop_sorted_series_has_no_drawdown(mut values in vec(0.0f64..1e7, 0..40)) {
            values.sort_by(|a, b| a.total_cmp(b));
            prop_assert_eq!(calculate_max_drawdown(&values), 0.0);
        }

        #[test]
        fn prop_volatility_is_finite(values in vec(1.0f64..1e7, 0..40)) {
            let vol = calculate_volatility(&values);
            prop_assert!(vol.is_finite());
            prop_assert!(vol >= 0.0);
        }
    }
}
