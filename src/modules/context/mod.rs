use crate::modules::error::PipelineResult;

/// Components that need async setup before the server starts accepting work
/// implement this and are driven, in order, from `main`.
pub trait Initialize {
    async fn initialize() -> PipelineResult<()>;
}

/// A named background task spawned once at startup and left running for the
/// life of the process (the scheduler loop, the publisher fan-out task, ...).
pub trait BackgroundTask {
    fn start();
}
