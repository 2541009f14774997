//! Formyard entry event relay worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use formyard_application::{DEFAULT_MAX_DELIVERY_ATTEMPTS, EntryEventRelayService};
use formyard_core::{AppError, AppResult};
use formyard_infrastructure::{HttpEntryEventDispatcher, PostgresEntryEventOutbox};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

static MIGRATOR: Migrator = sqlx::migrate!("../../crates/infrastructure/migrations");

#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkerConfig {
    database_url: String,
    webhook_url: String,
    worker_id: String,
    claim_limit: usize,
    lease_seconds: u32,
    poll_interval_ms: u64,
    dispatch_max_attempts: u8,
    dispatch_backoff_ms: u64,
    max_delivery_attempts: i32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    if env::args().nth(1).as_deref() == Some("migrate") {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let pool = connect_pool(database_url.as_str()).await?;
        MIGRATOR.run(&pool).await.map_err(|error| {
            AppError::Internal(format!("failed to run database migrations: {error}"))
        })?;
        info!("formyard migrations applied");
        return Ok(());
    }

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let relay = build_relay_service(pool, http_client, &config);

    info!(
        worker_id = %config.worker_id,
        webhook_url = %config.webhook_url,
        claim_limit = config.claim_limit,
        lease_seconds = config.lease_seconds,
        poll_interval_ms = config.poll_interval_ms,
        max_delivery_attempts = config.max_delivery_attempts,
        "formyard-worker started"
    );

    loop {
        match relay
            .relay_batch(
                config.worker_id.as_str(),
                config.claim_limit,
                config.lease_seconds,
            )
            .await
        {
            Ok(report) if report.claimed == 0 => {
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
            Ok(report) => {
                info!(
                    worker_id = %config.worker_id,
                    claimed = report.claimed,
                    delivered = report.delivered,
                    retried = report.retried,
                    dead = report.dead,
                    "entry event batch relayed"
                );
            }
            Err(error) => {
                warn!(
                    worker_id = %config.worker_id,
                    error = %error,
                    "failed to relay entry events"
                );
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_relay_service(
    pool: PgPool,
    http_client: reqwest::Client,
    config: &WorkerConfig,
) -> EntryEventRelayService {
    let outbox = Arc::new(PostgresEntryEventOutbox::new(pool));
    let dispatcher = Arc::new(HttpEntryEventDispatcher::new(
        http_client,
        config.webhook_url.clone(),
        config.dispatch_max_attempts,
        config.dispatch_backoff_ms,
    ));

    EntryEventRelayService::new(outbox, dispatcher)
        .with_max_delivery_attempts(config.max_delivery_attempts)
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };

        let database_url = required("DATABASE_URL")?;
        let webhook_url = required("EVENT_WEBHOOK_URL")?;
        let worker_id = lookup("WORKER_ID")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "formyard-worker".to_owned());

        let claim_limit: usize = parse_positive(&lookup, "EVENT_CLAIM_LIMIT", 25)?;
        let lease_seconds: u32 = parse_positive(&lookup, "EVENT_LEASE_SECONDS", 60)?;
        let poll_interval_ms: u64 = parse_positive(&lookup, "EVENT_POLL_INTERVAL_MS", 1000)?;
        let dispatch_max_attempts: u8 = parse_positive(&lookup, "EVENT_DISPATCH_MAX_ATTEMPTS", 3)?;
        let dispatch_backoff_ms: u64 = parse_positive(&lookup, "EVENT_DISPATCH_BACKOFF_MS", 250)?;
        let max_delivery_attempts: i32 = parse_positive(
            &lookup,
            "EVENT_MAX_DELIVERY_ATTEMPTS",
            DEFAULT_MAX_DELIVERY_ATTEMPTS,
        )?;

        Ok(Self {
            database_url,
            webhook_url,
            worker_id,
            claim_limit,
            lease_seconds,
            poll_interval_ms,
            dispatch_max_attempts,
            dispatch_backoff_ms,
            max_delivery_attempts,
        })
    }
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> AppResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{raw}': {error}"))
        })?,
        None => default,
    };

    if value <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::WorkerConfig;

    fn config_from(pairs: &[(&str, &str)]) -> Result<WorkerConfig, String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| values.get(name).cloned())
            .map_err(|error| error.to_string())
    }

    #[test]
    fn defaults_apply_when_only_urls_are_set() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/formyard"),
            ("EVENT_WEBHOOK_URL", "http://localhost:9000/events"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.worker_id, "formyard-worker");
        assert_eq!(config.claim_limit, 25);
        assert_eq!(config.lease_seconds, 60);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.dispatch_max_attempts, 3);
        assert_eq!(config.dispatch_backoff_ms, 250);
        assert_eq!(config.max_delivery_attempts, 10);
    }

    #[test]
    fn webhook_url_is_required() {
        let error = config_from(&[("DATABASE_URL", "postgres://localhost/formyard")]);
        assert_eq!(
            error.err().as_deref(),
            Some("validation error: EVENT_WEBHOOK_URL is required")
        );
    }

    #[test]
    fn zero_and_malformed_numbers_are_rejected() {
        let base = [
            ("DATABASE_URL", "postgres://localhost/formyard"),
            ("EVENT_WEBHOOK_URL", "http://localhost:9000/events"),
        ];

        let zero = config_from(&[base[0], base[1], ("EVENT_CLAIM_LIMIT", "0")]);
        assert!(zero.is_err_and(|error| error.contains("EVENT_CLAIM_LIMIT")));

        let malformed = config_from(&[base[0], base[1], ("EVENT_LEASE_SECONDS", "soon")]);
        assert!(malformed.is_err_and(|error| error.contains("EVENT_LEASE_SECONDS")));
    }
}
