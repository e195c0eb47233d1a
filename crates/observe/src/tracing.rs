use {
    crate::Config,
    std::{io::IsTerminal, panic::PanicHookInfo, sync::Once},
    time::macros::format_description,
    tracing::level_filters::LevelFilter,
    tracing_subscriber::{
        EnvFilter,
        Layer,
        fmt::{time::UtcTime, writer::MakeWriterExt as _},
        prelude::*,
        util::SubscriberInitExt,
    },
};

/// Initializes tracing setup that is shared between the binaries. Can be
/// called multiple times in a row, later calls are ignored so tests can call it
/// too.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn initialize(config: &Config) {
    // The tracing subscriber below is global object so initializing it again in the
    // same process by a different thread would fail.
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        set_tracing_subscriber(config);
        std::panic::set_hook(Box::new(tracing_panic_hook));
    });
}

fn set_tracing_subscriber(config: &Config) {
    let stderr_threshold = config
        .stderr_threshold
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::ERROR);

    // Events at or above the threshold go to stderr, everything else to stdout.
    macro_rules! fmt_layer {
        () => {
            tracing_subscriber::fmt::layer()
                .with_writer(
                    std::io::stdout
                        .with_min_level(stderr_threshold.into_level().unwrap_or(tracing::Level::ERROR))
                        .or_else(std::io::stderr),
                )
                .with_timer(UtcTime::new(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                )))
        };
    }

    let env_filter = EnvFilter::new(&config.env_filter);
    if config.use_json_format {
        tracing_subscriber::registry()
            .with(fmt_layer!().json().with_filter(env_filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt_layer!()
                    .with_ansi(std::io::stdout().is_terminal())
                    .with_filter(env_filter),
            )
            .init();
    }
    tracing::info!(json = config.use_json_format, "initialized tracing");
}

/// Panic hook that prints roughly the same message as the default panic hook
/// but uses tracing:error instead of stderr.
fn tracing_panic_hook(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!("thread '{name}' {panic}\nstack backtrace:\n{backtrace}");
}
