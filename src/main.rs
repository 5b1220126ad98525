use clap::Parser;

use commands::Cli;
use sync::SyncEngine;

#[derive(Clone)]
struct Data {
    engine: SyncEngine,
}

mod commands;
mod constants;
mod init;
mod models;
mod notion;
mod store;
mod sync;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let telemetry = telemetry::init_telemetry()?;

    let result = async {
        let data = init::init().await?;
        let result = commands::run(&data, cli.command).await;

        // background notion pushes must finish before the runtime shuts down.
        data.engine.wait_for_pushes().await;

        result
    }
    .await;

    telemetry.shutdown();

    result
}
