use std::io::Write as _;

use colored::Colorize as _;
use judge_core::style::ColorTheme as _;

/// Log to stderr at `info` unless `RUST_LOG` says otherwise.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level = record.level();
            let tag = format!("[{}]", level).color(level.color()).bold();
            writeln!(buf, "{} {}", tag, record.args())
        })
        .init();
}
