use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use env_logger::Env;
use log::{info, warn};
use reqwest::Client;

use valut::config::{Config, ProviderConfig, StorageConfig};
use valut::http::{self, AppState};
use valut::source::{CbrDailySource, ExchangeRateApiSource, RateSource};
use valut::store::{MemoryStore, PostgresStore};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let source = build_source(&config)?;
    let state = build_state(&config, source).await?;
    let data = web::Data::new(state);

    info!(
        "Listening on {} (miss policy {:?})",
        config.bind_addr, config.miss_policy
    );

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .configure(http::configure)
    })
    .bind(config.bind_addr)
    .with_context(|| format!("Can't bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}

fn build_source(config: &Config) -> Result<Arc<dyn RateSource>> {
    let client = Client::builder().timeout(config.http_timeout).build()?;

    let source: Arc<dyn RateSource> = match &config.provider {
        ProviderConfig::ExchangeRateApi { base_url, api_key } => {
            info!("Using ExchangeRate-API at {}", base_url);
            Arc::new(ExchangeRateApiSource::new(client, base_url, api_key))
        }
        ProviderConfig::Cbr { url } => {
            info!("Using CBR daily feed at {}", url);
            Arc::new(CbrDailySource::new(client, url))
        }
    };

    Ok(source)
}

async fn build_state(config: &Config, source: Arc<dyn RateSource>) -> Result<AppState> {
    let state = match &config.storage {
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            let store = PostgresStore::connect(url, *max_connections)
                .await
                .context("Can't connect to the database")?;
            store
                .run_migrations()
                .await
                .context("Can't apply migrations")?;
            AppState::new(
                Arc::new(store),
                source,
                config.miss_policy,
                config.stream_delay,
            )
        }
        StorageConfig::Memory => {
            warn!("Using in-memory storage, data will not survive a restart");
            AppState::new(
                Arc::new(MemoryStore::new()),
                source,
                config.miss_policy,
                config.stream_delay,
            )
        }
    };

    Ok(state)
}
