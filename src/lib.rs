pub mod app;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod logging;
pub mod notification;
pub mod state;
pub mod storage;
pub use error::{AppError, AppResult};

/// Entrypoint used by the binary: parses arguments and runs the session to completion.
pub fn run() -> AppResult<()> {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting snapline");

    let mut app = app::App::from_args();
    app.start()?;

    tracing::info!(state = ?app.state(), "session complete");
    Ok(())
}
