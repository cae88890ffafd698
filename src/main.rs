use std::process::ExitCode;

use pack_advisor::api::{self, ApiState};
use pack_advisor::catalog::CatalogSnapshot;
use pack_advisor::config::{AppConfig, LoggingConfig};
use pack_advisor::logging;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_result = dotenvy::dotenv();

    logging::init(&LoggingConfig::from_env());

    if let Err(err) = dotenv_result {
        let missing = matches!(
            err,
            dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound
        );
        if !missing {
            warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();

    let catalog = match app_config.catalog.path() {
        Some(path) => match CatalogSnapshot::load_from_path(path) {
            Ok(catalog) => catalog,
            Err(err) => {
                error!(error = %err, "could not load catalog");
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("PACK_ADVISOR_CATALOG_PATH is not set, starting with an empty catalog");
            CatalogSnapshot::default()
        }
    };
    let summary = catalog.summary();
    info!(
        products = summary.products,
        containers = summary.containers,
        prohibited_pairs = summary.prohibited_pairs,
        rates = summary.rates,
        "catalog loaded"
    );

    let state = ApiState::new(app_config.engine.settings().clone(), catalog);
    info!("pack-advisor starting");
    match api::start_api_server(app_config.api, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "API server terminated with an error");
            ExitCode::FAILURE
        }
    }
}
