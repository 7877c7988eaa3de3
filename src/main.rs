use std::net::SocketAddr;

use futures::future::join_all;
use thiserror::Error;

use crate::points::{PointService, WeeklyRewardScheduler};
use crate::util::telemetry;

mod api;
mod constants;
mod db;
mod points;
mod storage;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] db::PgError),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    tracing::info!("starting main application");

    let (tx_server_ready, rx_server_ready) = tokio::sync::mpsc::unbounded_channel::<SocketAddr>();

    let mut handles = Vec::new();

    let server_handles = api::server::start_server(tx_server_ready, rx_server_ready)
        .await
        .unwrap();
    handles.extend(server_handles);

    // the payout job is owned here, not by the router, so the http surface
    // stays a pure request/response layer
    let scheduler = WeeklyRewardScheduler::new(PointService::new(db::db_pool().await?));
    handles.push(scheduler.spawn());

    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}
