use rbp_common::LogConfig;
use tracing_subscriber::fmt;

/// Directives used unless `RBP_LOG_LEVEL` or `RUST_LOG` says otherwise.
const TEST_LOG_DIRECTIVES: &str = "rbp_test=info,rbp=debug,rbp_common=debug";

/// Route test tracing into the libtest capture, filtered the way the CLI is.
pub fn init_test_logging() {
    let Ok(filter) = LogConfig::from_env(TEST_LOG_DIRECTIVES).filter() else {
        return;
    };
    let _ = fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

#[macro_export]
macro_rules! test_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "rbp_test", $($arg)*);
    };
}
