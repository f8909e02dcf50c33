use env_logger::Env;

const DEFAULT_FILTER: &str = "tabwerk=info";

/// Installs `env_logger` as the `log` backend. `RUST_LOG` wins over the
/// default filter. Safe to call more than once.
pub fn init_logging() {
    let env = Env::default().default_filter_or(DEFAULT_FILTER);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}
