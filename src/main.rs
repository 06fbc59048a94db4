use cat_emails::cat_emails_version;
use cat_emails::modules::{
    common::signal::SignalManager,
    context::Initialize,
    database::manager::DatabaseManager,
    error::PipelineResult,
    logger,
    publisher::PUBLISHER,
    rest::start_http_server,
    scheduler::SCHEDULER,
    settings::dir::DataDirManager,
};
use mimalloc::MiMalloc;
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> PipelineResult<()> {
    logger::initialize_logging();
    info!("Starting cat-emails");
    info!("Version:  {}", cat_emails_version!());
    info!("Git:      [{}]", env!("GIT_HASH"));

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    let result = start_http_server().await;
    info!("HTTP server stopped, shutting down the scheduler");
    SCHEDULER.stop().await;
    result
}

/// Brings up the embedded store and background drivers before the HTTP
/// surface starts accepting requests.
async fn initialize() -> PipelineResult<()> {
    SignalManager::initialize().await?;
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    PUBLISHER.start_heartbeat();
    SCHEDULER.start();
    Ok(())
}
