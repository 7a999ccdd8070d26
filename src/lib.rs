pub mod annotation;
mod console;
pub mod error;
pub mod export;
pub mod job;
pub mod notify;
pub mod paths;
pub mod remote;
pub mod settings;

use std::sync::Arc;

use log::info;

use annotation::AnnotationStore;
use job::JobController;
use notify::Notifier;
use remote::RemoteSyncClient;
use settings::Settings;

pub use console::{parse_command, Command, IdentifyArgs};
pub use error::SyncError;

fn init_logger() -> Result<std::path::PathBuf, fern::InitError> {
    let log_file = paths::log_file_path()
        .map_err(|e| fern::InitError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let format = |out: fern::FormatCallback<'_>, message: &std::fmt::Arguments<'_>, record: &log::Record| {
        out.finish(format_args!(
            "[{}][{}][{}][{:?}] {}",
            chrono::Local::now().format("%Y-%m-%d"),
            chrono::Local::now().format("%H:%M:%S"),
            record.target(),
            record.level(),
            message
        ))
    };

    // stdout belongs to the console; only warnings and errors go to stderr.
    fern::Dispatch::new()
        .format(format)
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Info)
        .chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Warn)
                .chain(std::io::stderr()),
        )
        .chain(fern::log_file(&log_file)?)
        .apply()?;

    Ok(log_file)
}

/// Wire the store, job controller and HTTP client together and run the console.
pub fn run() -> Result<(), String> {
    let log_path = init_logger().ok();
    let settings = Settings::load_or_init(&paths::settings_path()).with_env();
    if let Some(path) = &log_path {
        info!("[speaker-labeler] logging to {}", path.display());
    }
    info!("[speaker-labeler] server {}", settings.server_url);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async move {
        let client = RemoteSyncClient::new(settings.remote_config()).map_err(|e| e.to_string())?;
        let (notifier, events) = Notifier::channel(settings.status_dismiss_after());
        let jobs = JobController::new(settings.job_timeout(), notifier.clone());
        let store = AnnotationStore::new(
            Arc::new(client),
            jobs,
            notifier,
            settings.mutation_policy,
        );
        console::run_console(store, settings, events).await
    })
}
