use anyhow::{Context, bail};
use clap::Parser;
use cohort_logging::CohortSubscriberBuilder;
use cohort_server::config::{Cli, Command};
use cohort_server::{run_serve, verify};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = CohortSubscriberBuilder::new()
        .with_config(cli.logging.log_config())
        .init()
        .context("failed to initialize logging")?;

    match cli.command {
        Command::Serve(args) => {
            run_serve(args).await.context("server failed")?;
        }
        Command::Verify(args) => {
            let report = verify::run_verify(&args)
                .await
                .context("verification failed")?;
            if !report.is_clean() {
                bail!(
                    "store does not match {}: {} missing, {} extra, {} mismatched",
                    args.verify_file.display(),
                    report.missing.len(),
                    report.extra.len(),
                    report.mismatched.len()
                );
            }
            println!("store matches verification file ({} customers)", report.matched);
        }
    }

    Ok(())
}
