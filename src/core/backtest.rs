use super::prices::{PriceTable, units_for};
use super::types::{Asset, HistoryPoint};

/// Buy-and-hold replay of a Gold/BTC split bought in `start_year`, next to
/// the same amount put into the S&P 500. Empty when the year has no prices.
pub fn calculate_portfolio_history(
    prices: &PriceTable,
    initial_investment: f64,
    start_year: u32,
    gold_percentage: f64,
    btc_percentage: f64,
) -> Vec<HistoryPoint> {
    let Some(start) = prices.lookup(start_year) else {
        return Vec::new();
    };

    let gold_units = units_for(
        initial_investment * (gold_percentage / 100.0),
        start.price(Asset::Gold),
    );
    let btc_units = units_for(
        initial_investment * (btc_percentage / 100.0),
        start.price(Asset::Bitcoin),
    );
    let sp500_units = units_for(initial_investment, start.price(Asset::Sp500));

    prices
        .since(start_year)
        .map(|o| HistoryPoint {
            year: o.year,
            mattison_value: (gold_units * o.gold + btc_units * o.bitcoin).round(),
            sp500_value: (sp500_units * o.sp500).round(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PriceObservation;

    fn flat_table() -> PriceTable {
        PriceTable::new(
            (2000..2004)
                .map(|year| PriceObservation {
                    year,
                    gold: 100.0 * (1 + year - 2000) as f64,
                    bitcoin: if year == 2000 { 0.0 } else { 10.0 },
                    sp500: 1000.0,
                    ethereum: None,
                    silver: None,
                    platinum: None,
                    bonds: 50.0,
                })
                .collect(),
        )
    }

    #[test]
    fn first_point_equals_initial_investment() {
        let prices = PriceTable::builtin();
        let history = calculate_portfolio_history(&prices, 10_000.0, 2015, 50.0, 50.0);
        assert_eq!(history.len(), 11);
        assert_eq!(history[0].year, 2015);
        assert_eq!(history[0].mattison_value, 10_000.0);
        assert_eq!(history[0].sp500_value, 10_000.0);
        assert_eq!(history.last().map(|p| p.year), Some(2025));
    }

    #[test]
    fn replay_is_deterministic() {
        let prices = PriceTable::builtin();
        let first = calculate_portfolio_history(&prices, 10_000.0, 2015, 50.0, 50.0);
        let second = calculate_portfolio_history(&prices, 10_000.0, 2015, 50.0, 50.0);
        assert_eq!(first, second);
    }

    #[test]
    fn units_are_held_constant() {
        let prices = PriceTable::builtin();
        let history = calculate_portfolio_history(&prices, 10_000.0, 2020, 100.0, 0.0);
        // 10_000 / 1517 oz of gold valued at 2025's 2650.
        let expected = (10_000.0 / 1517.0 * 2650.0_f64).round();
        assert_eq!(history.last().map(|p| p.mattison_value), Some(expected));
        let sp500 = (10_000.0 / 3231.0 * 5881.0_f64).round();
        assert_eq!(history.last().map(|p| p.sp500_value), Some(sp500));
    }

    #[test]
    fn missing_start_year_yields_empty_series() {
        let prices = PriceTable::builtin();
        assert!(calculate_portfolio_history(&prices, 10_000.0, 1999, 50.0, 50.0).is_empty());
        assert!(calculate_portfolio_history(&prices, 10_000.0, 2040, 50.0, 50.0).is_empty());
    }

    #[test]
    fn zero_start_price_means_zero_exposure() {
        let history = calculate_portfolio_history(&flat_table(), 1_000.0, 2000, 50.0, 50.0);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].mattison_value, 500.0);
        assert_eq!(history[3].mattison_value, 2_000.0);
        assert!(history.iter().all(|p| p.mattison_value.is_finite()));
    }
}
