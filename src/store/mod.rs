//! 机器记录的本地存储
//!
//! 目录结构:
//! - `<root>/machines/<name>/config.json` 机器记录
//! - `<root>/machines/<name>/` 同时也是交给驱动的存储路径
//! - `<root>/active` 当前活动机器的名称

use crate::errors::{MachineError, Result};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

pub mod machine;

pub use machine::{validate_name, MachineRecord};

const MACHINES_DIR: &str = "machines";
const RECORD_FILE: &str = "config.json";
const ACTIVE_FILE: &str = "active";

/// 默认存储路径 `$HOME/.machine`
pub fn default_root() -> PathBuf {
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home_dir).join(".machine")
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// 机器的存储目录，也是驱动的存储路径
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.root.join(MACHINES_DIR).join(name)
    }

    fn record_file(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(RECORD_FILE)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.record_file(name).exists()
    }

    pub fn save(&self, record: &MachineRecord) -> Result<()> {
        validate_name(&record.name)?;
        let dir = self.machine_dir(&record.name);
        fs::create_dir_all(&dir)?;
        fs::write(self.record_file(&record.name), serde_json::to_string_pretty(record)?)?;
        debug!("保存机器记录: {}", dir.display());
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<MachineRecord> {
        validate_name(name)?;
        let path = self.record_file(name);
        if !path.exists() {
            return Err(MachineError::MachineNotFound(name.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 所有机器名称，按字典序排列
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.root.join(MACHINES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if self.exists(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// 删除机器目录，目录不存在时视为成功
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.machine_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!("删除机器目录: {}", dir.display());
        }
        if self.get_active()?.as_deref() == Some(name) {
            self.clear_active()?;
        }
        Ok(())
    }

    pub fn get_active(&self) -> Result<Option<String>> {
        let path = self.root.join(ACTIVE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(&path)?.trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(name))
    }

    pub fn set_active(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(MachineError::MachineNotFound(name.to_string()));
        }
        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(ACTIVE_FILE), name)?;
        info!("活动机器设置为 {}", name);
        Ok(())
    }

    pub fn clear_active(&self) -> Result<()> {
        let path = self.root.join(ACTIVE_FILE);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// 给定名称时直接使用，否则退回到活动机器
    pub fn resolve_name(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(name) => Ok(name.to_string()),
            None => self.get_active()?.ok_or(MachineError::NoActiveMachine),
        }
    }
}
