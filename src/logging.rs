//! ログ初期化
//!
//! フィルタの優先順位: `BILL_SCAN_LOG` > `--verbose`(debug) > 設定ファイルの log_level

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BILL_SCAN_LOG";

pub fn init(default_level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    // 二重初期化（テストなど）は無視
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
