use hashledger::cli::commands::run_cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging and configuration are set up inside the CLI once flags are parsed
    run_cli().await?;

    Ok(())
}
