//! 驱动注册表
//!
//! 进程启动时一次性填充，之后只读。填充完成后可以在线程间共享，不需要加锁。

use super::{Driver, DriverResult};
use crate::errors::RegistryError;
use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// 给定机器存储路径，构造一个新的驱动实例
pub type DriverFactory = Box<dyn Fn(&Path) -> DriverResult<Box<dyn Driver>> + Send + Sync>;

/// 把驱动自己的参数挂到 `create` 命令上
pub type FlagBinder = fn(clap::Command) -> clap::Command;

pub struct RegisteredDriver {
    name: String,
    new: DriverFactory,
    register_create_flags: FlagBinder,
}

impl RegisteredDriver {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_driver(&self, store_path: &Path) -> DriverResult<Box<dyn Driver>> {
        debug!("构造驱动 {}: {}", self.name, store_path.display());
        (self.new)(store_path)
    }

    pub fn register_create_flags(&self, cmd: clap::Command) -> clap::Command {
        (self.register_create_flags)(cmd)
    }
}

#[derive(Default)]
pub struct Registry {
    drivers: HashMap<String, RegisteredDriver>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册驱动，名称重复时保留先注册的那个
    pub fn register(
        &mut self,
        name: &str,
        factory: DriverFactory,
        flag_binder: FlagBinder,
    ) -> Result<(), RegistryError> {
        if self.drivers.contains_key(name) {
            return Err(RegistryError::DuplicateDriver(name.to_string()));
        }
        debug!("注册驱动 {}", name);
        self.drivers.insert(
            name.to_string(),
            RegisteredDriver {
                name: name.to_string(),
                new: factory,
                register_create_flags: flag_binder,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredDriver> {
        self.drivers.get(name)
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredDriver, RegistryError> {
        self.lookup(name)
            .ok_or_else(|| RegistryError::DriverNotFound(name.to_string()))
    }

    /// 按字典序排列的驱动名称
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// 按名称顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredDriver> {
        self.list_names()
            .into_iter()
            .filter_map(move |name| self.drivers.get(&name))
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
