//! `generic` 驱动：通过 SSH 管理一台已经存在的主机
//!
//! 远端状态通过 TCP 连接 SSH 端口来探测，停止、重启、升级都在远端执行命令完成。

use super::{with_retries, Deadline, Driver, DriverResult, RemoteCommand, State};
use crate::errors::{ConfigError, DriverError};
use clap::{value_parser, Arg, ArgMatches};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DRIVER_NAME: &str = "generic";

const IP_FLAG: &str = "generic-ip-address";
const USER_FLAG: &str = "generic-ssh-user";
const KEY_FLAG: &str = "generic-ssh-key";
const SSH_PORT_FLAG: &str = "generic-ssh-port";
const ENGINE_PORT_FLAG: &str = "generic-engine-port";

const CONFIG_FILE: &str = "generic.json";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_ATTEMPTS: u32 = 3;

const UPGRADE_SCRIPT: &str = "curl -fsSL https://get.docker.com | sudo sh";

pub fn register_create_flags(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        Arg::new(IP_FLAG)
            .long(IP_FLAG)
            .value_name("ADDRESS")
            .help("IP address or hostname of the host"),
    )
    .arg(
        Arg::new(USER_FLAG)
            .long(USER_FLAG)
            .value_name("USER")
            .default_value("root")
            .help("SSH user"),
    )
    .arg(
        Arg::new(KEY_FLAG)
            .long(KEY_FLAG)
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf))
            .help("SSH private key path"),
    )
    .arg(
        Arg::new(SSH_PORT_FLAG)
            .long(SSH_PORT_FLAG)
            .value_name("PORT")
            .value_parser(value_parser!(u16))
            .default_value("22")
            .help("SSH port"),
    )
    .arg(
        Arg::new(ENGINE_PORT_FLAG)
            .long(ENGINE_PORT_FLAG)
            .value_name("PORT")
            .value_parser(value_parser!(u16))
            .default_value("2376")
            .help("Docker engine port"),
    )
}

pub fn new_driver(store_path: &Path) -> DriverResult<Box<dyn Driver>> {
    Ok(Box::new(GenericDriver::new(store_path)?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericConfig {
    pub ip_address: String,
    pub ssh_user: String,
    pub ssh_key: Option<PathBuf>,
    pub ssh_port: u16,
    pub engine_port: u16,
}

impl GenericConfig {
    pub fn from_matches(flags: &ArgMatches) -> Result<Self, ConfigError> {
        let ip_address = flags
            .try_get_one::<String>(IP_FLAG)
            .ok()
            .flatten()
            .ok_or_else(|| ConfigError::MissingFlag(IP_FLAG.to_string()))?
            .clone();
        let ssh_user = flags
            .try_get_one::<String>(USER_FLAG)
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| "root".to_string());
        let ssh_key = flags.try_get_one::<PathBuf>(KEY_FLAG).ok().flatten().cloned();
        let ssh_port = flags.try_get_one::<u16>(SSH_PORT_FLAG).ok().flatten().copied().unwrap_or(22);
        let engine_port = flags
            .try_get_one::<u16>(ENGINE_PORT_FLAG)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(2376);

        let config = Self {
            ip_address,
            ssh_user,
            ssh_key,
            ssh_port,
            engine_port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ip_address.is_empty() || self.ip_address.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                flag: IP_FLAG.to_string(),
                reason: format!("{:?} is not a valid address", self.ip_address),
            });
        }
        if self.ssh_user.is_empty() {
            return Err(ConfigError::InvalidValue {
                flag: USER_FLAG.to_string(),
                reason: "user cannot be empty".to_string(),
            });
        }
        for (flag, port) in [(SSH_PORT_FLAG, self.ssh_port), (ENGINE_PORT_FLAG, self.engine_port)] {
            if port == 0 {
                return Err(ConfigError::InvalidValue {
                    flag: flag.to_string(),
                    reason: "port cannot be 0".to_string(),
                });
            }
        }
        if let Some(key) = &self.ssh_key {
            if !key.exists() {
                return Err(ConfigError::InvalidValue {
                    flag: KEY_FLAG.to_string(),
                    reason: format!("{} does not exist", key.display()),
                });
            }
        }
        Ok(())
    }
}

pub struct GenericDriver {
    store_path: PathBuf,
    config: Option<GenericConfig>,
    deadline: Deadline,
}

impl GenericDriver {
    pub fn new(store_path: &Path) -> DriverResult<Self> {
        let mut driver = Self {
            store_path: store_path.to_path_buf(),
            config: None,
            deadline: Deadline::none(),
        };
        let path = driver.config_file();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            driver.config = Some(serde_json::from_str(&content)?);
        }
        Ok(driver)
    }

    fn config_file(&self) -> PathBuf {
        self.store_path.join(CONFIG_FILE)
    }

    fn config(&self) -> DriverResult<&GenericConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| DriverError::Permanent("generic driver is not configured".to_string()))
    }

    fn ssh_addr(&self) -> DriverResult<SocketAddr> {
        let config = self.config()?;
        (config.ip_address.as_str(), config.ssh_port)
            .to_socket_addrs()
            .map_err(|e| DriverError::Network(format!("resolve {}: {}", config.ip_address, e)))?
            .next()
            .ok_or_else(|| DriverError::Permanent(format!("no address for {}", config.ip_address)))
    }

    /// 连接 SSH 端口，等待时间受截止时间约束。
    /// 主机应答但拒绝连接视为已关机的 Stopped
    fn connect(&self) -> DriverResult<State> {
        self.deadline.check("ssh probe")?;
        let addr = self.ssh_addr()?;
        let timeout = self
            .deadline
            .bounded(PROBE_TIMEOUT)
            .max(Duration::from_millis(1));
        debug!("探测 {} (超时 {:?})", addr, timeout);
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => Ok(State::Running),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => Ok(State::Stopped),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Err(DriverError::Timeout(format!("connect {}", addr)))
            }
            Err(e) => Err(DriverError::Network(format!("connect {}: {}", addr, e))),
        }
    }

    /// 要求 SSH 端口可以连接
    fn probe(&self) -> DriverResult<()> {
        match self.connect()? {
            State::Running => Ok(()),
            state => Err(DriverError::Network(format!(
                "ssh port of {} refused the connection ({})",
                self.config()?.ip_address,
                state
            ))),
        }
    }

    /// 在远端 shell 中执行命令。255 是 ssh 自身的连接错误
    fn run_remote(&self, command: &str) -> DriverResult<()> {
        self.deadline.check(command)?;
        let remote = self.get_ssh_command(&[command.to_string()])?;
        info!("在 {} 上执行: {}", remote.host, command);
        let status = remote.to_command().status()?;
        match status.code() {
            Some(0) => Ok(()),
            Some(255) => Err(DriverError::Network(format!("ssh to {} failed", remote.host))),
            Some(code) => Err(DriverError::Permanent(format!(
                "`{}` exited with status {}",
                command, code
            ))),
            None => Err(DriverError::Permanent(format!("`{}` was terminated", command))),
        }
    }
}

impl Driver for GenericDriver {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn set_config_from_flags(&mut self, flags: &ArgMatches) -> Result<(), ConfigError> {
        self.config = Some(GenericConfig::from_matches(flags)?);
        Ok(())
    }

    fn get_url(&self) -> DriverResult<String> {
        let config = self.config()?;
        Ok(format!("tcp://{}:{}", config.ip_address, config.engine_port))
    }

    fn get_ip(&self) -> DriverResult<String> {
        Ok(self.config()?.ip_address.clone())
    }

    fn get_state(&self) -> DriverResult<State> {
        if self.config.is_none() || !self.config_file().exists() {
            return Ok(State::Nonexistent);
        }
        match self.connect() {
            Ok(state) => Ok(state),
            Err(DriverError::Timeout(_)) => Ok(State::Timeout),
            Err(e) => {
                debug!("探测失败: {}", e);
                Ok(State::Error)
            }
        }
    }

    /// 主机本身已经存在，只需确认可达并保存配置
    fn create(&mut self) -> DriverResult<()> {
        let config = self.config()?.clone();
        info!("generic 驱动: 检查 {}:{} 是否可达", config.ip_address, config.ssh_port);
        with_retries(PROBE_ATTEMPTS, "ssh probe", || self.probe())?;

        fs::create_dir_all(&self.store_path)?;
        fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// 不会销毁远端主机，只忘记它
    fn remove(&mut self) -> DriverResult<()> {
        let path = self.config_file();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        match self.probe() {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => Err(DriverError::Permanent(format!(
                "{} is not reachable and the generic driver cannot power it on",
                self.config()?.ip_address
            ))),
            Err(e) => Err(e),
        }
    }

    fn stop(&mut self) -> DriverResult<()> {
        self.run_remote("sudo shutdown -h now")
    }

    fn restart(&mut self) -> DriverResult<()> {
        self.run_remote("sudo reboot")
    }

    fn kill(&mut self) -> DriverResult<()> {
        self.run_remote("sudo poweroff -f")
    }

    fn upgrade(&mut self) -> DriverResult<()> {
        self.run_remote(UPGRADE_SCRIPT)?;
        self.run_remote("sudo systemctl restart docker")
    }

    fn get_ssh_command(&self, args: &[String]) -> DriverResult<RemoteCommand> {
        let config = self.config()?;
        Ok(RemoteCommand::new(&config.ip_address, config.ssh_port, &config.ssh_user)
            .with_key(config.ssh_key.clone())
            .with_connect_timeout(self.deadline.remaining())
            .with_args(args.to_vec()))
    }

    fn set_deadline(&mut self, deadline: Deadline) {
        self.deadline = deadline;
    }
}
