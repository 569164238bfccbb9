use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::api::default_retirement_age;
use crate::core::{
    Allocation, AllocationKind, AllocationRequest, Asset, CORE_PERCENTAGE_RANGE,
    CryptoSubAllocation, GoldSubAllocation, PriceTable, RebalanceFrequency, StrategyId,
    SubAllocations, allocation_percentages, calculate, calculate_portfolio_history, clamp_age,
    compare_strategies, format_currency, format_percentage, generate_retirement_projection,
    is_valid_age, retirement_milestones, simulate_rebalancing,
};

#[derive(Parser, Debug)]
#[command(
    name = "hardfolio",
    about = "Age-based Gold/Bitcoin allocation calculator with historical backtests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Gold/BTC split for an age, optionally with dollar amounts
    Allocate(AllocateArgs),
    /// Buy-and-hold replay against the S&P 500
    History(BacktestArgs),
    /// Rebalanced vs buy-and-hold comparison
    Rebalance {
        #[command(flatten)]
        backtest: BacktestArgs,
        #[arg(long, value_enum, default_value_t = CliFrequency::Annual)]
        frequency: CliFrequency,
    },
    /// Compare named strategies over the same period
    Compare {
        #[command(flatten)]
        backtest: BacktestArgs,
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "mattison,60_40,sp500",
            help = "Comma-separated strategy ids"
        )]
        strategies: Vec<String>,
    },
    /// Year-by-year glide path until retirement
    Projection {
        #[arg(long)]
        age: f64,
        #[arg(long, help = "Defaults to age + 30, kept within 60..=85")]
        retirement_age: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Dump the reference price table
    Prices {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AllocateArgs {
    #[arg(long)]
    pub age: f64,
    #[arg(long)]
    pub portfolio_value: Option<f64>,
    #[arg(long, help = "Core slice in percent (35-60 advised); enables the core/satellite view")]
    pub core_percentage: Option<f64>,
    #[arg(long, help = "Break the buckets down by sub-allocation weights")]
    pub subs: bool,
    #[arg(long, default_value_t = 100.0)]
    pub physical_gold: f64,
    #[arg(long, default_value_t = 0.0)]
    pub gold_etf: f64,
    #[arg(long, default_value_t = 0.0)]
    pub silver: f64,
    #[arg(long, default_value_t = 0.0)]
    pub platinum: f64,
    #[arg(long, default_value_t = 100.0)]
    pub bitcoin: f64,
    #[arg(long, default_value_t = 0.0)]
    pub ethereum: f64,
    #[arg(long, default_value_t = 0.0)]
    pub other_crypto: f64,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    #[arg(long, default_value_t = 40.0)]
    pub age: f64,
    #[arg(long, default_value_t = 10_000.0)]
    pub initial_investment: f64,
    #[arg(long, default_value_t = 2015)]
    pub start_year: u32,
    #[arg(long)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFrequency {
    None,
    Annual,
    Quarterly,
    Monthly,
}

impl From<CliFrequency> for RebalanceFrequency {
    fn from(value: CliFrequency) -> Self {
        match value {
            CliFrequency::None => RebalanceFrequency::None,
            CliFrequency::Annual => RebalanceFrequency::Annual,
            CliFrequency::Quarterly => RebalanceFrequency::Quarterly,
            CliFrequency::Monthly => RebalanceFrequency::Monthly,
        }
    }
}

impl AllocateArgs {
    fn request(&self) -> AllocationRequest {
        let kind = if self.subs {
            AllocationKind::WithSubs(SubAllocations {
                gold: GoldSubAllocation {
                    physical_gold: self.physical_gold,
                    gold_etf: self.gold_etf,
                    silver: self.silver,
                    platinum: self.platinum,
                },
                crypto: CryptoSubAllocation {
                    bitcoin: self.bitcoin,
                    ethereum: self.ethereum,
                    other: self.other_crypto,
                },
            })
        } else if let Some(core_percentage) = self.core_percentage {
            AllocationKind::Detailed { core_percentage }
        } else {
            AllocationKind::Basic
        };

        AllocationRequest {
            age: self.age,
            portfolio_value: self.portfolio_value,
            kind,
        }
    }
}

impl BacktestArgs {
    fn validate(&self) -> Result<(f64, f64)> {
        if !self.initial_investment.is_finite() || self.initial_investment <= 0.0 {
            bail!("--initial-investment must be > 0");
        }
        if !self.age.is_finite() {
            bail!("--age must be a finite number");
        }
        let (gold, btc) = allocation_percentages(self.age);
        Ok((gold as f64, btc as f64))
    }
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}

fn amount_or_dash(amount: Option<f64>) -> String {
    amount.map_or_else(|| "-".to_string(), format_currency)
}

/// Runs every command except `serve`, writing a report to `out`.
pub fn run_report<W: Write>(command: &Command, prices: &PriceTable, out: &mut W) -> Result<()> {
    match command {
        Command::Serve { .. } => bail!("serve is handled by the async entry point"),
        Command::Allocate(args) => allocate_report(args, out),
        Command::History(args) => {
            let (gold, btc) = args.validate()?;
            let points = calculate_portfolio_history(
                prices,
                args.initial_investment,
                args.start_year,
                gold,
                btc,
            );
            if args.json {
                return write_json(out, &points);
            }
            if points.is_empty() {
                writeln!(out, "No price data for {}", args.start_year)?;
                return Ok(());
            }
            writeln!(out, "Year  Mattison ({gold}/{btc})  S&P 500")?;
            for p in &points {
                writeln!(
                    out,
                    "{}  {:>18}  {:>10}",
                    p.year,
                    format_currency(p.mattison_value),
                    format_currency(p.sp500_value)
                )?;
            }
            Ok(())
        }
        Command::Rebalance {
            backtest,
            frequency,
        } => {
            let (gold, btc) = backtest.validate()?;
            let frequency = RebalanceFrequency::from(*frequency);
            let result = simulate_rebalancing(
                prices,
                backtest.initial_investment,
                gold,
                btc,
                frequency,
                backtest.start_year,
            );
            if backtest.json {
                return write_json(out, &result);
            }
            if result.data_points.is_empty() {
                writeln!(out, "No price data for {}", backtest.start_year)?;
                return Ok(());
            }
            writeln!(out, "Year  Rebalanced ({frequency})  Buy & hold")?;
            for p in &result.data_points {
                writeln!(
                    out,
                    "{}  {:>12}  {:>12}",
                    p.year,
                    format_currency(p.rebalanced_value),
                    format_currency(p.buy_hold_value)
                )?;
            }
            writeln!(
                out,
                "Difference: {:+}%  Rebalance events: {}",
                result.difference_percent, result.total_rebalance_events
            )?;
            Ok(())
        }
        Command::Compare {
            backtest,
            strategies,
        } => {
            let (gold, btc) = backtest.validate()?;
            let ids = strategies
                .iter()
                .map(|s| s.parse::<StrategyId>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;
            if ids.is_empty() {
                bail!("--strategies must name at least one strategy");
            }
            let result = compare_strategies(
                prices,
                &ids,
                backtest.initial_investment,
                backtest.start_year,
                gold,
                btc,
            );
            if backtest.json {
                return write_json(out, &result);
            }
            if result.metrics.is_empty() {
                writeln!(out, "No price data for {}", backtest.start_year)?;
                return Ok(());
            }
            writeln!(out, "Strategy              Total   Annual  Max DD  Vol     Final")?;
            for m in &result.metrics {
                writeln!(
                    out,
                    "{:<20} {:>6}% {:>6}% {:>6}% {:>6}% {:>10}",
                    m.strategy_id.info().name,
                    m.total_return,
                    m.annualized_return,
                    m.max_drawdown,
                    m.volatility,
                    format_currency(m.final_value)
                )?;
            }
            Ok(())
        }
        Command::Projection {
            age,
            retirement_age,
            json,
        } => {
            let retirement_age =
                retirement_age.unwrap_or_else(|| default_retirement_age(clamp_age(*age)));
            let points = generate_retirement_projection(*age, retirement_age);
            if *json {
                return write_json(out, &points);
            }
            for m in retirement_milestones(&points) {
                writeln!(
                    out,
                    "{:<12} age {}: {} gold / {} bitcoin",
                    m.milestone_label.unwrap_or_default(),
                    m.age,
                    format_percentage(m.gold_percentage as f64),
                    format_percentage(m.btc_percentage as f64)
                )?;
            }
            Ok(())
        }
        Command::Prices { json } => {
            if *json {
                return write_json(out, &prices.observations());
            }
            write!(out, "Year")?;
            for asset in Asset::ALL {
                write!(out, "  {:>9}", asset.label())?;
            }
            writeln!(out)?;
            for o in prices.observations() {
                write!(out, "{}", o.year)?;
                for asset in Asset::ALL {
                    match o.price(asset) {
                        Some(price) => write!(out, "  {price:>9}")?,
                        None => write!(out, "  {:>9}", "-")?,
                    }
                }
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn allocate_report<W: Write>(args: &AllocateArgs, out: &mut W) -> Result<()> {
    if !args.age.is_finite() {
        bail!("--age must be a finite number");
    }
    let allocation = calculate(&args.request());
    if args.json {
        return write_json(out, &allocation);
    }

    if !is_valid_age(args.age) {
        writeln!(out, "note: age outside 18-85 was clamped")?;
    }
    let base = allocation.base();
    writeln!(
        out,
        "Gold:    {:>4}  {}",
        format_percentage(base.gold_percentage as f64),
        amount_or_dash(base.gold_amount)
    )?;
    writeln!(
        out,
        "Bitcoin: {:>4}  {}",
        format_percentage(base.btc_percentage as f64),
        amount_or_dash(base.btc_amount)
    )?;

    match allocation {
        Allocation::Basic(_) => {}
        Allocation::Detailed(d) => {
            if !CORE_PERCENTAGE_RANGE.contains(&d.core_percentage) {
                writeln!(out, "note: a core slice of 35-60% is advised")?;
            }
            writeln!(
                out,
                "Core {} -> gold {}, bitcoin {}",
                format_percentage(d.core_percentage),
                amount_or_dash(d.core_gold_amount),
                amount_or_dash(d.core_btc_amount)
            )?;
            writeln!(
                out,
                "Satellite {} -> {}",
                format_percentage(d.satellite_percentage),
                amount_or_dash(d.satellite_amount)
            )?;
        }
        Allocation::WithSubs(w) => {
            if !w.gold_sub_valid {
                writeln!(out, "warning: gold sub-allocation does not sum to 100%")?;
            }
            if !w.crypto_sub_valid {
                writeln!(out, "warning: crypto sub-allocation does not sum to 100%")?;
            }
            if let Some(a) = w.sub_amounts {
                for (label, amount) in [
                    ("Physical gold", a.physical_gold_amount),
                    ("Gold ETFs", a.gold_etf_amount),
                    ("Silver", a.silver_amount),
                    ("Platinum", a.platinum_amount),
                    ("Bitcoin", a.bitcoin_amount),
                    ("Ethereum", a.ethereum_amount),
                    ("Other crypto", a.other_crypto_amount),
                ] {
                    writeln!(out, "  {label:<14} {}", format_currency(amount))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args).expect("valid arguments");
        let mut out = Vec::new();
        run_report(&cli.command, &PriceTable::builtin(), &mut out)?;
        Ok(String::from_utf8(out).expect("utf8 output"))
    }

    #[test]
    fn allocate_prints_split_and_amounts() {
        let text = render(&[
            "hardfolio",
            "allocate",
            "--age",
            "40",
            "--portfolio-value",
            "10000",
        ])
        .expect("report");
        assert!(text.contains("Gold:     55%  $5,500"), "{text}");
        assert!(text.contains("Bitcoin:  45%  $4,500"), "{text}");
    }

    #[test]
    fn allocate_notes_clamped_age() {
        let text = render(&["hardfolio", "allocate", "--age", "12"]).expect("report");
        assert!(text.starts_with("note: age outside 18-85 was clamped"));
        assert!(text.contains("33%"));
    }

    #[test]
    fn allocate_subs_warns_on_bad_sums() {
        let text = render(&[
            "hardfolio",
            "allocate",
            "--age",
            "40",
            "--portfolio-value",
            "10000",
            "--subs",
            "--physical-gold",
            "60",
            "--gold-etf",
            "20",
        ])
        .expect("report");
        assert!(text.contains("warning: gold sub-allocation"));
        assert!(text.contains("Gold ETFs      $1,100"), "{text}");
    }

    #[test]
    fn allocate_json_is_tagged() {
        let text = render(&[
            "hardfolio",
            "allocate",
            "--age",
            "40",
            "--core-percentage",
            "40",
            "--json",
        ])
        .expect("report");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json output");
        assert_eq!(value["kind"], "detailed");
        assert_eq!(value["corePercentage"], 40.0);
    }

    #[test]
    fn allocate_notes_core_slice_outside_advised_band() {
        let wide = render(&["hardfolio", "allocate", "--age", "40", "--core-percentage", "80"])
            .expect("report");
        assert!(wide.contains("note: a core slice of 35-60% is advised"), "{wide}");
        assert!(wide.contains("Satellite 20%"), "{wide}");

        let advised = render(&["hardfolio", "allocate", "--age", "40", "--core-percentage", "50"])
            .expect("report");
        assert!(!advised.contains("advised"), "{advised}");
    }

    #[test]
    fn prices_table_marks_missing_assets() {
        let text = render(&["hardfolio", "prices"]).expect("report");
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        assert!(header.contains("Ethereum") && header.contains("Platinum"), "{header}");
        let first = lines.next().unwrap_or_default();
        assert!(first.starts_with("2010"), "{first}");
        // No ethereum price before 2016.
        assert!(first.contains("        -"), "{first}");
        assert_eq!(text.lines().count(), 17);
    }

    #[test]
    fn history_reports_missing_year() {
        let text = render(&["hardfolio", "history", "--start-year", "1990"]).expect("report");
        assert_eq!(text, "No price data for 1990\n");
    }

    #[test]
    fn rebalance_summary_line() {
        let text = render(&[
            "hardfolio",
            "rebalance",
            "--start-year",
            "2018",
            "--frequency",
            "monthly",
        ])
        .expect("report");
        assert!(text.contains("Rebalance events: 84"), "{text}");
    }

    #[test]
    fn compare_rejects_unknown_strategy() {
        let err = render(&["hardfolio", "compare", "--strategies", "mattison,moon"])
            .expect_err("must reject");
        assert!(err.to_string().contains("moon"));
    }

    #[test]
    fn compare_lists_each_strategy() {
        let text = render(&["hardfolio", "compare", "--strategies", "gold_only,bitcoin_only"])
            .expect("report");
        assert!(text.contains("Gold Only"));
        assert!(text.contains("Bitcoin Only"));
    }

    #[test]
    fn history_rejects_non_positive_investment() {
        let err = render(&["hardfolio", "history", "--initial-investment", "0"])
            .expect_err("must reject");
        assert!(err.to_string().contains("--initial-investment"));
    }

    #[test]
    fn projection_prints_milestones() {
        let text = render(&["hardfolio", "projection", "--age", "35"]).expect("report");
        let first = text.lines().next().unwrap_or_default();
        assert!(first.starts_with("Today"), "{text}");
        assert!(text.contains("age 65: 80% gold / 20% bitcoin"), "{text}");
    }

    #[test]
    fn serve_is_not_a_report() {
        let cli = Cli::try_parse_from(["hardfolio", "serve", "--port", "9000"]).expect("valid");
        assert!(matches!(cli.command, Command::Serve { port: 9000 }));
        let mut out = Vec::new();
        assert!(run_report(&cli.command, &PriceTable::builtin(), &mut out).is_err());
    }
}
