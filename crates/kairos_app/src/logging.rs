//! Logger setup.

/// Installs `env_logger` with an `info` default filter. `RUST_LOG` overrides
/// it. Calling this more than once is harmless.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).format_timestamp_millis().try_init().is_ok() {
        log::debug!("Logger initialized");
    }
}
