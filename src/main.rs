use anyhow::Context;
use clap::Parser;
use hardfolio::cli::{Cli, Command, run_report};
use hardfolio::core::PriceTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let prices = PriceTable::builtin();

    match cli.command {
        Command::Serve { port } => hardfolio::api::run_http_server(port, prices)
            .await
            .with_context(|| format!("server on port {port} failed")),
        command => {
            let mut stdout = std::io::stdout().lock();
            run_report(&command, &prices, &mut stdout)
        }
    }
}
