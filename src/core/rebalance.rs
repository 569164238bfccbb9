use std::fmt;
use std::str::FromStr;

use super::prices::{PriceTable, units_for};
use super::strategies::round_to;
use super::types::{Asset, PriceObservation, RebalanceFrequency, RebalancePoint, RebalanceResult};

impl RebalanceFrequency {
    pub const ALL: [RebalanceFrequency; 4] = [
        RebalanceFrequency::None,
        RebalanceFrequency::Annual,
        RebalanceFrequency::Quarterly,
        RebalanceFrequency::Monthly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RebalanceFrequency::None => "none",
            RebalanceFrequency::Annual => "annual",
            RebalanceFrequency::Quarterly => "quarterly",
            RebalanceFrequency::Monthly => "monthly",
        }
    }

    /// Months between rebalances; `None` never rebalances.
    pub fn months(self) -> Option<u32> {
        match self {
            RebalanceFrequency::None => None,
            RebalanceFrequency::Annual => Some(12),
            RebalanceFrequency::Quarterly => Some(3),
            RebalanceFrequency::Monthly => Some(1),
        }
    }

    pub fn events_per_year(self) -> f64 {
        self.months().map_or(0.0, |m| 12.0 / m as f64)
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebalanceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RebalanceFrequency::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rebalance frequency '{s}'"))
    }
}

#[derive(Debug, Clone, Copy)]
struct Holdings {
    gold_units: f64,
    btc_units: f64,
}

impl Holdings {
    fn buy(amount: f64, gold_percentage: f64, btc_percentage: f64, at: &PriceObservation) -> Self {
        Self {
            gold_units: units_for(amount * (gold_percentage / 100.0), at.price(Asset::Gold)),
            btc_units: units_for(amount * (btc_percentage / 100.0), at.price(Asset::Bitcoin)),
        }
    }

    fn value(self, at: &PriceObservation) -> f64 {
        self.gold_units * at.gold + self.btc_units * at.bitcoin
    }
}

/// Rebalanced vs buy-and-hold Gold/BTC portfolio over the annual series.
///
/// The price data is annual, so every non-`None` frequency rebalances once
/// per year boundary. `total_rebalance_events` extrapolates the count the
/// chosen frequency would have produced over the same span. Each point is
/// valued before that year's rebalance; the final year is never rebalanced.
pub fn simulate_rebalancing(
    prices: &PriceTable,
    initial_investment: f64,
    gold_percentage: f64,
    btc_percentage: f64,
    frequency: RebalanceFrequency,
    start_year: u32,
) -> RebalanceResult {
    let Some(start) = prices.lookup(start_year) else {
        return RebalanceResult::empty();
    };

    let buy_hold = Holdings::buy(initial_investment, gold_percentage, btc_percentage, start);
    let mut rebalanced = buy_hold;
    let events_per_year = frequency.events_per_year();
    let mut events = 0.0;

    let observations: Vec<&PriceObservation> = prices.since(start_year).collect();
    let last_index = observations.len() - 1;
    let mut data_points = Vec::with_capacity(observations.len());

    for (idx, o) in observations.into_iter().enumerate() {
        let rebalanced_value = rebalanced.value(o);
        data_points.push(RebalancePoint {
            year: o.year,
            rebalanced_value: rebalanced_value.round(),
            buy_hold_value: buy_hold.value(o).round(),
        });

        if frequency != RebalanceFrequency::None && idx < last_index {
            rebalanced = Holdings::buy(rebalanced_value, gold_percentage, btc_percentage, o);
            events += events_per_year;
        }
    }

    let (final_rebalanced, final_buy_hold) = data_points
        .last()
        .map_or((0.0, 0.0), |p| (p.rebalanced_value, p.buy_hold_value));
    let difference_percent = if final_buy_hold > 0.0 {
        round_to((final_rebalanced - final_buy_hold) / final_buy_hold * 100.0, 1)
    } else {
        0.0
    };

    RebalanceResult {
        data_points,
        final_rebalanced,
        final_buy_hold,
        difference_percent,
        total_rebalance_events: events.round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(u32, f64, f64)]) -> PriceTable {
        PriceTable::new(
            rows.iter()
                .map(|&(year, gold, bitcoin)| PriceObservation {
                    year,
                    gold,
                    bitcoin,
                    sp500: 1000.0,
                    ethereum: None,
                    silver: None,
                    platinum: None,
                    bonds: 100.0,
                })
                .collect(),
        )
    }

    #[test]
    fn frequency_event_counts() {
        assert_eq!(RebalanceFrequency::None.events_per_year(), 0.0);
        assert_eq!(RebalanceFrequency::Annual.events_per_year(), 1.0);
        assert_eq!(RebalanceFrequency::Quarterly.events_per_year(), 4.0);
        assert_eq!(RebalanceFrequency::Monthly.events_per_year(), 12.0);
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Quarterly".parse::<RebalanceFrequency>(), Ok(RebalanceFrequency::Quarterly));
        assert_eq!(" none ".parse::<RebalanceFrequency>(), Ok(RebalanceFrequency::None));
        assert!("weekly".parse::<RebalanceFrequency>().is_err());
    }

    #[test]
    fn no_rebalancing_tracks_buy_and_hold() {
        let prices = PriceTable::builtin();
        let result =
            simulate_rebalancing(&prices, 10_000.0, 55.0, 45.0, RebalanceFrequency::None, 2015);
        assert_eq!(result.data_points.len(), 11);
        for point in &result.data_points {
            assert_eq!(point.rebalanced_value, point.buy_hold_value, "year {}", point.year);
        }
        assert_eq!(result.total_rebalance_events, 0);
        assert_eq!(result.difference_percent, 0.0);
    }

    #[test]
    fn rebalance_applies_after_the_recorded_year() {
        // Gold doubles then halves; bitcoin stays flat.
        let prices = table(&[(2000, 100.0, 10.0), (2001, 200.0, 10.0), (2002, 100.0, 10.0)]);
        let result =
            simulate_rebalancing(&prices, 1_000.0, 50.0, 50.0, RebalanceFrequency::Annual, 2000);

        let values: Vec<(f64, f64)> = result
            .data_points
            .iter()
            .map(|p| (p.rebalanced_value, p.buy_hold_value))
            .collect();
        // 2001: both drifted to 1500. Rebalancing at 2001 moves to 750/750,
        // i.e. 3.75 oz gold, which is worth 375 in 2002.
        assert_eq!(values, vec![(1_000.0, 1_000.0), (1_500.0, 1_500.0), (1_125.0, 1_000.0)]);
        assert_eq!(result.final_rebalanced, 1_125.0);
        assert_eq!(result.final_buy_hold, 1_000.0);
        assert_eq!(result.difference_percent, 12.5);
        assert_eq!(result.total_rebalance_events, 2);
    }

    #[test]
    fn sub_annual_frequency_only_scales_event_count() {
        let prices = PriceTable::builtin();
        let annual =
            simulate_rebalancing(&prices, 10_000.0, 55.0, 45.0, RebalanceFrequency::Annual, 2018);
        let monthly =
            simulate_rebalancing(&prices, 10_000.0, 55.0, 45.0, RebalanceFrequency::Monthly, 2018);
        assert_eq!(annual.data_points, monthly.data_points);
        assert_eq!(annual.total_rebalance_events, 7);
        assert_eq!(monthly.total_rebalance_events, 84);
    }

    #[test]
    fn missing_start_year_gives_empty_result() {
        let prices = PriceTable::builtin();
        let result =
            simulate_rebalancing(&prices, 10_000.0, 55.0, 45.0, RebalanceFrequency::Annual, 1999);
        assert_eq!(result, RebalanceResult::empty());
    }

    #[test]
    fn single_year_series_never_rebalances() {
        let prices = PriceTable::builtin();
        let result =
            simulate_rebalancing(&prices, 10_000.0, 55.0, 45.0, RebalanceFrequency::Monthly, 2025);
        assert_eq!(result.data_points.len(), 1);
        assert_eq!(result.total_rebalance_events, 0);
        assert_eq!(result.final_rebalanced, 10_000.0);
    }

    #[test]
    fn zero_initial_investment_has_no_difference() {
        let prices = PriceTable::builtin();
        let result =
            simulate_rebalancing(&prices, 0.0, 55.0, 45.0, RebalanceFrequency::Annual, 2015);
        assert_eq!(result.final_buy_hold, 0.0);
        assert_eq!(result.difference_percent, 0.0);
    }
}
