use doclib_core::DOCLIB_LOG_VAR;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Install the global subscriber.
///
/// `DOCLIB_LOG` takes `EnvFilter` directives such as
/// `doclib_service=debug,info`; without it `level` applies to every target.
/// Output goes to stderr so stdout stays valid JSON.
pub fn init(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .with_env_var(DOCLIB_LOG_VAR)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_target(true)
                .with_thread_ids(true),
        )
        .with(filter)
        .init();
}
