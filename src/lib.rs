pub mod commands;
pub mod drivers;
pub mod errors;
pub mod logger;
pub mod store;

// 重新导出主要的类型和函数
pub use commands::Router;
pub use drivers::{Driver, Registry, State};
pub use errors::{MachineError, Result};
pub use store::Store;
