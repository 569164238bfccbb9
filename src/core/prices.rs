use super::types::{Asset, PriceObservation};

#[allow(clippy::too_many_arguments)]
const fn obs(
    year: u32,
    gold: f64,
    bitcoin: f64,
    sp500: f64,
    ethereum: Option<f64>,
    silver: f64,
    platinum: f64,
    bonds: f64,
) -> PriceObservation {
    PriceObservation {
        year,
        gold,
        bitcoin,
        sp500,
        ethereum,
        silver: Some(silver),
        platinum: Some(platinum),
        bonds,
    }
}

// January 1st of each year. Gold/silver/platinum: USD per troy ounce.
// Bitcoin/ethereum: USD per coin. S&P 500: index level. Bonds: aggregate
// bond index fund price. New years are appended; past rows never change.
const BUILTIN_PRICES: [PriceObservation; 16] = [
    obs(2010, 1096.0, 0.003, 1115.0, None, 16.99, 1470.0, 103.0),
    obs(2011, 1421.0, 0.30, 1258.0, None, 30.63, 1755.0, 105.7),
    obs(2012, 1566.0, 5.27, 1258.0, None, 28.18, 1400.0, 110.2),
    obs(2013, 1664.0, 13.30, 1426.0, None, 30.00, 1530.0, 111.0),
    obs(2014, 1205.0, 770.0, 1848.0, None, 19.50, 1360.0, 106.4),
    obs(2015, 1184.0, 314.0, 2059.0, None, 15.70, 1200.0, 110.2),
    obs(2016, 1061.0, 434.0, 2044.0, Some(0.95), 13.82, 890.0, 108.1),
    obs(2017, 1151.0, 998.0, 2239.0, Some(8.17), 15.99, 905.0, 108.0),
    obs(2018, 1303.0, 13412.0, 2674.0, Some(772.0), 17.05, 930.0, 109.3),
    obs(2019, 1282.0, 3843.0, 2507.0, Some(140.0), 15.47, 795.0, 106.5),
    obs(2020, 1517.0, 7200.0, 3231.0, Some(130.0), 17.85, 965.0, 112.6),
    obs(2021, 1898.0, 29374.0, 3756.0, Some(737.0), 26.40, 1070.0, 118.0),
    obs(2022, 1800.0, 47686.0, 4766.0, Some(3683.0), 23.35, 965.0, 117.9),
    obs(2023, 1824.0, 16548.0, 3839.0, Some(1196.0), 23.95, 1070.0, 97.0),
    obs(2024, 2063.0, 42258.0, 4770.0, Some(2282.0), 23.79, 1000.0, 99.2),
    obs(2025, 2650.0, 94500.0, 5881.0, Some(3353.0), 28.90, 905.0, 97.4),
];

impl Asset {
    pub const ALL: [Asset; 7] = [
        Asset::Gold,
        Asset::Bitcoin,
        Asset::Sp500,
        Asset::Ethereum,
        Asset::Silver,
        Asset::Platinum,
        Asset::Bonds,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Asset::Gold => "Gold",
            Asset::Bitcoin => "Bitcoin",
            Asset::Sp500 => "S&P 500",
            Asset::Ethereum => "Ethereum",
            Asset::Silver => "Silver",
            Asset::Platinum => "Platinum",
            Asset::Bonds => "Bonds",
        }
    }
}

impl PriceObservation {
    pub fn price(&self, asset: Asset) -> Option<f64> {
        match asset {
            Asset::Gold => Some(self.gold),
            Asset::Bitcoin => Some(self.bitcoin),
            Asset::Sp500 => Some(self.sp500),
            Asset::Ethereum => self.ethereum,
            Asset::Silver => self.silver,
            Asset::Platinum => self.platinum,
            Asset::Bonds => Some(self.bonds),
        }
    }
}

/// Annual price series, one observation per year in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    observations: Vec<PriceObservation>,
}

impl PriceTable {
    /// Sorts by year; when a year repeats, the first observation wins.
    pub fn new(mut observations: Vec<PriceObservation>) -> Self {
        observations.sort_by_key(|o| o.year);
        observations.dedup_by_key(|o| o.year);
        Self { observations }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_PRICES.to_vec())
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn lookup(&self, year: u32) -> Option<&PriceObservation> {
        self.observations
            .binary_search_by_key(&year, |o| o.year)
            .ok()
            .map(|idx| &self.observations[idx])
    }

    pub fn earliest_year(&self) -> Option<u32> {
        self.observations.first().map(|o| o.year)
    }

    pub fn latest_year(&self) -> Option<u32> {
        self.observations.last().map(|o| o.year)
    }

    /// Observations from `start_year` onwards, inclusive.
    pub fn since(&self, start_year: u32) -> impl Iterator<Item = &PriceObservation> {
        let start = self.observations.partition_point(|o| o.year < start_year);
        self.observations[start..].iter()
    }
}

/// Units bought with `amount` at `price`. Missing or degenerate prices buy
/// nothing so the result is always finite.
pub fn units_for(amount: f64, price: Option<f64>) -> f64 {
    match price {
        Some(p) if p.is_finite() && p > 0.0 && amount.is_finite() => amount / p,
        _ => 0.0,
    }
}
