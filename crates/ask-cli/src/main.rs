use anyhow::Result;
use ask_cli::bootstrap_helpers::init_tracing;
use ask_cli::{run, Cli, RunOutcome};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match run(&cli).await? {
        RunOutcome::Rendered(output) => println!("{output}"),
        RunOutcome::Skipped(reason) => {
            tracing::info!(%reason, "no question to answer");
            eprintln!("skipped: {reason}");
        }
    }
    Ok(())
}
