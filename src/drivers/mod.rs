//! 驱动定义了主机如何被创建和控制。
//!
//! 不同的驱动对应不同的创建方式（不同的虚拟化平台、不同的云厂商）。
//! 路由器和注册表只依赖这里的 [`Driver`] trait，不依赖任何具体后端的类型。

use crate::errors::{ConfigError, DriverError};
use clap::ArgMatches;
use log::warn;
use std::time::{Duration, Instant};

pub mod generic;
pub mod none;
pub mod registry;
pub mod ssh;
pub mod state;

pub use registry::{RegisteredDriver, Registry};
pub use ssh::RemoteCommand;
pub use state::State;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// 默认 `restart` 对 stop + start 组合的尝试次数
pub const RESTART_ATTEMPTS: u32 = 3;

/// 每个后端必须实现的能力集合
///
/// 所有方法只能在驱动实例构造成功之后调用。
/// `set_config_from_flags` 必须在任何生命周期操作之前调用且只调用一次。
pub trait Driver: Send {
    /// 注册时使用的驱动名称，不能为空
    fn driver_name(&self) -> &str;

    /// 使用本驱动 flag binder 注册的参数完成配置
    fn set_config_from_flags(&mut self, flags: &ArgMatches) -> Result<(), ConfigError>;

    /// 兼容 Docker 的主机 URL，例如 tcp://1.2.3.4:2376
    fn get_url(&self) -> DriverResult<String>;

    /// 主机的 IP 或主机名
    fn get_ip(&self) -> DriverResult<String>;

    fn get_state(&self) -> DriverResult<State>;

    /// 创建远端资源。失败时必须保证后续的 `remove` 能够清理
    fn create(&mut self) -> DriverResult<()>;

    /// 删除远端资源。资源已经不存在时视为成功
    fn remove(&mut self) -> DriverResult<()>;

    fn start(&mut self) -> DriverResult<()>;

    /// 优雅停止
    fn stop(&mut self) -> DriverResult<()>;

    /// 没有原子重启能力的后端退化为 stop 然后 start。
    /// 临时错误时整个组合从 stop 开始重试，永久错误原样返回，机器停留在 Stopped。
    fn restart(&mut self) -> DriverResult<()> {
        with_retries(RESTART_ATTEMPTS, "restart", || {
            self.stop()?;
            self.start()
        })
    }

    /// 强制停止
    fn kill(&mut self) -> DriverResult<()>;

    /// 升级主机上的 Docker 到最新版本，成功后主机处于运行且可达的状态
    fn upgrade(&mut self) -> DriverResult<()>;

    /// 构造（不执行）指向正确用户、主机、密钥的远程命令。
    /// `args` 为空表示交互式会话。
    fn get_ssh_command(&self, args: &[String]) -> DriverResult<RemoteCommand>;

    /// 本次调用的截止时间，会阻塞的驱动需要遵守
    fn set_deadline(&mut self, _deadline: Deadline) {}
}

/// 外部传入的截止时间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    /// 超出 `Instant` 表示范围的时长视为没有限制
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// 剩余时间，`None` 表示没有限制
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().map_or(false, |left| left.is_zero())
    }

    /// 取剩余时间和 `cap` 中较小的一个
    pub fn bounded(&self, cap: Duration) -> Duration {
        self.remaining().map_or(cap, |left| left.min(cap))
    }

    pub fn check(&self, what: &str) -> DriverResult<()> {
        if self.is_expired() {
            return Err(DriverError::Timeout(what.to_string()));
        }
        Ok(())
    }
}

/// 对临时错误整体重试 `op`，永久错误立即返回
///
/// 供驱动实现自己的重试策略使用，路由器本身从不重试。
pub fn with_retries<T, F>(attempts: u32, what: &str, mut op: F) -> DriverResult<T>
where
    F: FnMut() -> DriverResult<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!("{} 失败 (第 {}/{} 次): {}，重试", what, attempt, attempts, e);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// 构造包含所有内置驱动的注册表
pub fn builtin_registry() -> Result<Registry, crate::errors::RegistryError> {
    let mut registry = Registry::new();
    registry.register(
        generic::DRIVER_NAME,
        Box::new(generic::new_driver),
        generic::register_create_flags,
    )?;
    registry.register(
        none::DRIVER_NAME,
        Box::new(none::new_driver),
        none::register_create_flags,
    )?;
    Ok(registry)
}

/// 测试用的内存驱动
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// 所有实例共享的"远端"，以存储路径为键
    pub type Backend = Arc<Mutex<HashMap<PathBuf, State>>>;

    pub struct MemoryDriver {
        pub name: String,
        pub path: PathBuf,
        pub backend: Backend,
        pub fail_start: bool,
        /// 前几次 start 返回的临时错误数
        pub transient_start_failures: u32,
        pub starts: u32,
        pub configured: bool,
    }

    impl MemoryDriver {
        fn set(&self, state: State) {
            self.backend.lock().unwrap().insert(self.path.clone(), state);
        }
    }

    impl Driver for MemoryDriver {
        fn driver_name(&self) -> &str {
            &self.name
        }

        fn set_config_from_flags(&mut self, _flags: &ArgMatches) -> Result<(), ConfigError> {
            assert!(!self.configured, "set_config_from_flags called twice");
            self.configured = true;
            Ok(())
        }

        fn get_url(&self) -> DriverResult<String> {
            Ok(format!("tcp://{}:2376", self.get_ip()?))
        }

        fn get_ip(&self) -> DriverResult<String> {
            Ok("10.0.0.1".to_string())
        }

        fn get_state(&self) -> DriverResult<State> {
            let backend = self.backend.lock().unwrap();
            Ok(backend.get(&self.path).copied().unwrap_or(State::Nonexistent))
        }

        fn create(&mut self) -> DriverResult<()> {
            self.set(State::Running);
            Ok(())
        }

        fn remove(&mut self) -> DriverResult<()> {
            self.backend.lock().unwrap().remove(&self.path);
            Ok(())
        }

        fn start(&mut self) -> DriverResult<()> {
            self.starts += 1;
            if self.transient_start_failures > 0 {
                self.transient_start_failures -= 1;
                return Err(DriverError::Network("connection reset".to_string()));
            }
            if self.fail_start {
                return Err(DriverError::Permanent("start refused".to_string()));
            }
            self.set(State::Running);
            Ok(())
        }

        fn stop(&mut self) -> DriverResult<()> {
            self.set(State::Stopped);
            Ok(())
        }

        fn kill(&mut self) -> DriverResult<()> {
            self.set(State::Stopped);
            Ok(())
        }

        fn upgrade(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn get_ssh_command(&self, args: &[String]) -> DriverResult<RemoteCommand> {
            Ok(RemoteCommand::new("10.0.0.1", 22, "docker").with_args(args.to_vec()))
        }
    }

    fn no_flags(cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// 注册一个内存驱动，返回其共享后端
    pub fn register(registry: &mut Registry, name: &str, fail_start: bool) -> Backend {
        let backend: Backend = Arc::default();
        let shared = backend.clone();
        let driver_name = name.to_string();
        registry
            .register(
                name,
                Box::new(move |path: &Path| -> DriverResult<Box<dyn Driver>> {
                    Ok(Box::new(MemoryDriver {
                        name: driver_name.clone(),
                        path: path.to_path_buf(),
                        backend: shared.clone(),
                        fail_start,
                        transient_start_failures: 0,
                        starts: 0,
                        configured: false,
                    }) as Box<dyn Driver>)
                }),
                no_flags,
            )
            .unwrap();
        backend
    }
}
