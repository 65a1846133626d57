//! `none` 驱动：管理一个已经存在的 Docker 主机
//!
//! 生命周期转换在本地模拟，状态保存在机器存储目录下的 `none.json` 中。

use super::{Driver, DriverResult, RemoteCommand, State};
use crate::errors::{ConfigError, DriverError};
use clap::{Arg, ArgMatches};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DRIVER_NAME: &str = "none";

const URL_FLAG: &str = "none-url";
const STATE_FILE: &str = "none.json";

pub fn register_create_flags(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        Arg::new(URL_FLAG)
            .long(URL_FLAG)
            .value_name("URL")
            .help("URL of host when no driver is selected, e.g. tcp://10.0.0.5:2376"),
    )
}

pub fn new_driver(store_path: &Path) -> DriverResult<Box<dyn Driver>> {
    Ok(Box::new(NoneDriver::new(store_path)?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoneConfig {
    pub url: String,
}

impl NoneConfig {
    pub fn from_matches(flags: &ArgMatches) -> Result<Self, ConfigError> {
        let url = flags
            .try_get_one::<String>(URL_FLAG)
            .ok()
            .flatten()
            .ok_or_else(|| ConfigError::MissingFlag(URL_FLAG.to_string()))?;
        Self::new(url)
    }

    pub fn new(url: &str) -> Result<Self, ConfigError> {
        if !(url.starts_with("tcp://") || url.starts_with("unix://")) {
            return Err(ConfigError::InvalidValue {
                flag: URL_FLAG.to_string(),
                reason: format!("{} must start with tcp:// or unix://", url),
            });
        }
        if url.split("://").nth(1).map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidValue {
                flag: URL_FLAG.to_string(),
                reason: format!("{} has no host", url),
            });
        }
        Ok(Self { url: url.to_string() })
    }

    /// tcp URL 中的主机部分，unix socket 视为本机
    pub fn host(&self) -> String {
        match self.url.strip_prefix("tcp://") {
            Some(rest) => {
                let authority = rest.split('/').next().unwrap_or(rest);
                match authority.rsplit_once(':') {
                    Some((host, _port)) => host.trim_matches(|c| c == '[' || c == ']').to_string(),
                    None => authority.to_string(),
                }
            }
            None => "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoneHost {
    config: NoneConfig,
    state: State,
}

pub struct NoneDriver {
    store_path: PathBuf,
    config: Option<NoneConfig>,
}

impl NoneDriver {
    /// 已经创建过的机器会从存储目录恢复配置
    pub fn new(store_path: &Path) -> DriverResult<Self> {
        let mut driver = Self {
            store_path: store_path.to_path_buf(),
            config: None,
        };
        if let Some(host) = driver.load()? {
            driver.config = Some(host.config);
        }
        Ok(driver)
    }

    fn state_file(&self) -> PathBuf {
        self.store_path.join(STATE_FILE)
    }

    fn load(&self) -> DriverResult<Option<NoneHost>> {
        let path = self.state_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn config(&self) -> DriverResult<&NoneConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| DriverError::Permanent("none driver is not configured".to_string()))
    }

    fn save(&self, state: State) -> DriverResult<()> {
        let host = NoneHost {
            config: self.config()?.clone(),
            state,
        };
        fs::create_dir_all(&self.store_path)?;
        fs::write(self.state_file(), serde_json::to_string_pretty(&host)?)?;
        Ok(())
    }

    /// 把状态切换到 `to`，要求主机已经创建
    fn transition(&self, to: State) -> DriverResult<()> {
        if self.load()?.is_none() {
            return Err(DriverError::Permanent(format!(
                "host {} does not exist",
                self.store_path.display()
            )));
        }
        info!("none 驱动: 状态切换为 {}", to);
        self.save(to)
    }
}

impl Driver for NoneDriver {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn set_config_from_flags(&mut self, flags: &ArgMatches) -> Result<(), ConfigError> {
        self.config = Some(NoneConfig::from_matches(flags)?);
        Ok(())
    }

    fn get_url(&self) -> DriverResult<String> {
        Ok(self.config()?.url.clone())
    }

    fn get_ip(&self) -> DriverResult<String> {
        Ok(self.config()?.host())
    }

    fn get_state(&self) -> DriverResult<State> {
        Ok(self.load()?.map_or(State::Nonexistent, |host| host.state))
    }

    fn create(&mut self) -> DriverResult<()> {
        info!("none 驱动: 接管主机 {}", self.config()?.url);
        self.save(State::Running)
    }

    fn remove(&mut self) -> DriverResult<()> {
        let path = self.state_file();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        self.transition(State::Running)
    }

    fn stop(&mut self) -> DriverResult<()> {
        self.transition(State::Stopped)
    }

    fn kill(&mut self) -> DriverResult<()> {
        self.transition(State::Stopped)
    }

    fn upgrade(&mut self) -> DriverResult<()> {
        match self.get_state()? {
            State::Running => Ok(()),
            state => Err(DriverError::Permanent(format!(
                "cannot upgrade a host in state {}",
                state
            ))),
        }
    }

    fn get_ssh_command(&self, _args: &[String]) -> DriverResult<RemoteCommand> {
        Err(DriverError::Permanent(
            "the none driver does not support ssh".to_string(),
        ))
    }
}
