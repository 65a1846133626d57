use crate::errors::{MachineError, Result};
use clap::ArgMatches;
use std::io::Write;

pub mod active;
pub mod create;
pub mod help;
pub mod inspect;
pub mod lifecycle;
pub mod ls;
pub mod rm;
pub mod router;
pub mod ssh;

pub use router::{normalize_verb, Handler, Router};

/// 命令执行的通用trait
pub trait Command {
    /// 执行命令
    fn execute(&self, router: &Router<'_>, streams: &mut Streams<'_>) -> Result<()>;
}

/// 命令的输出流。`out` 是结果，`err` 是诊断和帮助信息
pub struct Streams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Streams<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// 为子命令创建参数解析器
pub fn sub_command(name: &str, signature: &str, description: &str) -> clap::Command {
    clap::Command::new(format!("machine {}", name))
        .no_binary_name(true)
        .disable_version_flag(true)
        .override_usage(format!("machine {} [OPTIONS] {}", name, signature))
        .about(description.to_string())
}

/// 解析子命令参数。`--help` 和解析失败都输出用法并返回用法错误
pub fn parse(cmd: clap::Command, streams: &mut Streams<'_>, args: &[String]) -> Result<ArgMatches> {
    let name = cmd.get_name().to_string();
    match cmd.try_get_matches_from(args) {
        Ok(matches) => Ok(matches),
        Err(e) => {
            write!(streams.err, "{}", e.render())?;
            Err(MachineError::Usage(name))
        }
    }
}
