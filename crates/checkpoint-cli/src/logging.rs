use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Filter directives are read from this variable, e.g. `CHECKPOINT_LOG=debug`.
pub const LOG_ENV: &str = "CHECKPOINT_LOG";

/// Install the stderr subscriber. Stdout is reserved for command output.
///
/// `verbose` raises the default level to `debug` when `CHECKPOINT_LOG` is unset.
pub fn enable_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
