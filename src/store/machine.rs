use crate::errors::{MachineError, Result};
use serde::{Deserialize, Serialize};

/// 持久化的机器记录。状态不保存，每次都向驱动查询
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub name: String,
    pub driver_name: String,
}

impl MachineRecord {
    pub fn new(name: &str, driver_name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            driver_name: driver_name.to_string(),
        })
    }
}

/// 机器名称同时用作目录名: `[A-Za-z0-9][A-Za-z0-9._-]*`
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        }
        _ => false,
    };
    if !valid {
        return Err(MachineError::InvalidName(name.to_string()));
    }
    Ok(())
}
