use thiserror::Error;

/// 驱动配置错误，用户可修正，不重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required flag --{0}")]
    MissingFlag(String),

    #[error("invalid value for --{flag}: {reason}")]
    InvalidValue { flag: String, reason: String },
}

/// 驱动执行错误
///
/// 只有 `Network` 和 `Timeout` 属于临时错误，调用方可以选择重试。
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Permanent(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid driver configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl DriverError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Network(_) | DriverError::Timeout(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("driver {0} is already registered")]
    DuplicateDriver(String),

    #[error("unknown driver: {0}")]
    DriverNotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("command doesn't exist - {0}")]
    UnknownCommand(String),
}

#[derive(Error, Debug)]
pub enum MachineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Router(#[from] RouterError),

    /// 用法错误，帮助信息已经输出
    #[error("usage error: {0}")]
    Usage(String),

    #[error("machine {0} does not exist")]
    MachineNotFound(String),

    #[error("machine {0} already exists")]
    MachineExists(String),

    #[error("invalid machine name: {0:?}")]
    InvalidName(String),

    #[error("no active machine, pass a machine name or set one with `machine active NAME`")]
    NoActiveMachine,

    #[error("remote command exited with status {0}")]
    RemoteCommandFailed(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Generic(String),
}

impl MachineError {
    /// 进程退出码: 用法错误为 2，远程命令透传其退出码，其余为 1
    pub fn exit_code(&self) -> i32 {
        match self {
            MachineError::Usage(_) => 2,
            MachineError::RemoteCommandFailed(code) if *code != 0 => *code,
            _ => 1,
        }
    }

    /// 诊断信息是否已经由路由器输出
    pub fn is_reported(&self) -> bool {
        matches!(self, MachineError::Usage(_) | MachineError::Router(_))
    }
}

pub type Result<T> = std::result::Result<T, MachineError>;

#[macro_export]
macro_rules! bail {
    ($msg:expr) => {
        return Err($crate::errors::MachineError::Generic($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::MachineError::Generic(format!($fmt, $($arg)*)))
    };
}
