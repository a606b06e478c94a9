use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;

/// Map the `-v` count to a tracing level; zero keeps the ERROR default.
const fn get_verbosity_level(verbosity: u8) -> Option<tracing::Level> {
    match verbosity {
        0 => None,
        1 => Some(tracing::Level::WARN),
        2 => Some(tracing::Level::INFO),
        3 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse arguments, install telemetry and build the action to run.
///
/// # Errors
/// Returns an error if telemetry initialization or dispatch fails.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = get_verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    telemetry::init(verbosity_level)?;

    dispatch::handler(&matches)
}
