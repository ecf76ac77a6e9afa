//! Reference-data right assignment worker runtime.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;
use std::time::Duration;

use refdata_application::{RebuildReport, RightAssignmentService};
use refdata_core::{AppError, AppResult};
use refdata_infrastructure::{PostgresRightAssignmentRepository, PostgresRoleAssignmentRepository};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;
    run_migrations(&pool).await?;

    if std::env::args().nth(1).as_deref() == Some("migrate") {
        info!("migrations applied");
        return Ok(());
    }

    let service = build_right_assignment_service(pool, &config);
    info!(
        batch_size = config.right_assignment.batch_size(),
        partition_size = config.right_assignment.partition_size(),
        core_pool_size = config.right_assignment.worker_pool().core_pool_size(),
        max_pool_size = config.right_assignment.worker_pool().max_pool_size(),
        program_scope = %config.right_assignment.program_scope().as_str(),
        rebuild_interval_seconds = config.rebuild_interval.map(|interval| interval.as_secs()),
        "refdata-worker started"
    );

    match config.rebuild_interval {
        None => service.rebuild_right_assignments().await.map(log_report),
        Some(interval) => run_on_interval(&service, interval).await,
    }
}

async fn run_on_interval(service: &RightAssignmentService, interval: Duration) -> AppResult<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.rebuild_right_assignments().await {
                    Ok(report) => log_report(report),
                    Err(error) => warn!(error = %error, "scheduled right assignment rebuild failed"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|error| {
                    AppError::Internal(format!("failed to listen for shutdown signal: {error}"))
                })?;
                info!("refdata-worker stopping");
                return Ok(());
            }
        }
    }
}

fn log_report(report: RebuildReport) {
    info!(
        run_id = %report.run_id,
        rows_written = report.rows_written,
        peak_workers = report.peak_workers,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "right assignments regenerated"
    );
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Persistence(format!("failed to connect to database: {error}")))
}

async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to run migrations: {error}")))
}

fn build_right_assignment_service(pool: PgPool, config: &WorkerConfig) -> RightAssignmentService {
    RightAssignmentService::new(
        Arc::new(PostgresRoleAssignmentRepository::new(pool.clone())),
        Arc::new(PostgresRightAssignmentRepository::new(pool)),
        config.right_assignment.clone(),
    )
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
