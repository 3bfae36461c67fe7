//! model-runner: run the recalculation or forward-forecast engine against a
//! model in the local database and print the result as JSON.
//!
//! Usage:
//!   cargo run -p model-runner -- recalc <model-id>
//!   cargo run -p model-runner -- forecast <model-id>
//!
//! DATABASE_URL selects the database (defaults to sqlite:models.db).

use anyhow::{bail, Result};
use forecast_engine::ForecastEngine;
use model_store::{ModelDb, ModelStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_runner=info,forecast_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, model_id) = match args.as_slice() {
        [command, id] => (command.as_str(), id.parse::<i64>()?),
        _ => bail!("usage: model-runner <recalc|forecast> <model-id>"),
    };

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:models.db".to_string());
    let store = ModelStore::new(ModelDb::new(&database_url).await?);
    let engine = ForecastEngine::new(store);

    match command {
        "recalc" => {
            let result = engine.recalculate(model_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "forecast" => {
            let result = engine.forecast_forward(model_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        other => bail!("unknown command: {}", other),
    }

    Ok(())
}
