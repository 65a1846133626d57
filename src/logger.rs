use env_logger::{Builder, Env};
use std::io::Write;

/// 初始化日志系统
///
/// 输出到 stderr，格式为 `LEVEL - message`。`RUST_LOG` 优先于 `debug` 参数。
pub fn init(debug: bool) -> Result<(), log::SetLoggerError> {
    let level = if debug { "debug" } else { "info" };

    Builder::from_env(Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{} - {}", record.level(), record.args()))
        .try_init()
}
