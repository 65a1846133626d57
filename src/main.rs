use clap::Parser;
use log::{debug, error};
use machine::commands::{Router, Streams};
use machine::drivers::{builtin_registry, Deadline};
use machine::logger;
use machine::store::{self, Store};
use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "machine")]
#[command(about = "Create and manage machines running Docker.")]
#[command(version)]
#[command(override_usage = "machine [OPTIONS] COMMAND [arg...]")]
struct Cli {
    /// Enable debug mode
    #[arg(short = 'D', long)]
    debug: bool,

    /// Configures storage path
    #[arg(short = 's', long, env = "MACHINE_STORAGE_PATH", value_name = "PATH")]
    storage_path: Option<PathBuf>,

    /// Deadline for driver operations
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    // 初始化日志
    logger::init(cli.debug).unwrap_or_else(|e| {
        eprintln!("初始化日志失败: {}", e);
        process::exit(1);
    });

    // 注册内置驱动，重复注册属于启动错误
    let registry = builtin_registry().unwrap_or_else(|e| {
        error!("注册驱动失败: {}", e);
        process::exit(1);
    });

    let root = cli.storage_path.unwrap_or_else(store::default_root);
    debug!("存储路径: {}", root.display());

    let mut router = Router::new(&registry, Store::new(root));
    if let Some(seconds) = cli.timeout {
        router = router.with_deadline(Deadline::after(Duration::from_secs(seconds)));
    }

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let result = {
        let mut streams = Streams::new(&mut stdout, &mut stderr);
        router.dispatch(&cli.args, &mut streams)
    };

    if let Err(e) = result {
        if !e.is_reported() {
            eprintln!("{}", router.diagnostic(&cli.args, &e));
        }
        process::exit(e.exit_code());
    }
}
