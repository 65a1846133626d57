//! 远程命令描述
//!
//! 驱动只负责构造描述，真正的连接由 [`Transport`] 完成。

use crate::errors::{MachineError, Result};
use log::debug;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub key: Option<PathBuf>,
    pub connect_timeout: Option<Duration>,
    pub args: Vec<String>,
}

impl RemoteCommand {
    pub fn new(host: &str, port: u16, user: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            key: None,
            connect_timeout: None,
            args: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: Option<PathBuf>) -> Self {
        self.key = key;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// 没有参数时为交互式会话
    pub fn is_interactive(&self) -> bool {
        self.args.is_empty()
    }

    /// 传给 ssh 可执行文件的参数
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=quiet",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(timeout) = self.connect_timeout {
            // ssh 只接受整秒，不足一秒按一秒算
            let secs = timeout.as_secs().max(1);
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={}", secs));
        }
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args.push(format!("{}@{}", self.user, self.host));
        args.extend(self.args.iter().cloned());
        args
    }

    /// 构造系统 ssh 命令，不执行
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args());
        cmd
    }
}

/// 执行远程命令，返回远端退出码
pub trait Transport {
    fn run(&self, command: &RemoteCommand) -> Result<i32>;
}

/// 调用系统的 ssh 可执行文件，继承当前进程的标准输入输出
#[derive(Debug, Default)]
pub struct SystemTransport;

impl Transport for SystemTransport {
    fn run(&self, command: &RemoteCommand) -> Result<i32> {
        debug!("执行 ssh {:?}", command.ssh_args());
        let status = command.to_command().status()?;
        status
            .code()
            .ok_or_else(|| MachineError::Generic("ssh terminated by signal".to_string()))
    }
}
