use super::{parse, sub_command, Router, Streams};
use crate::errors::{MachineError, Result};
use clap::{Arg, ArgAction};
use log::{debug, info, warn};

pub struct RmCommand {
    pub names: Vec<String>,
    pub force: bool,
}

impl RmCommand {
    pub fn new(names: Vec<String>, force: bool) -> Self {
        Self { names, force }
    }

    /// 先删除远端资源，再删除本地记录。`force` 时驱动的错误只记录日志
    fn remove(&self, router: &Router<'_>, name: &str) -> Result<()> {
        let store = router.store();
        match router.load_machine(name) {
            Ok((_, mut driver)) => {
                if let Err(e) = driver.remove() {
                    if !self.force {
                        return Err(e.into());
                    }
                    warn!("强制删除: 忽略机器 {} 的驱动错误: {}", name, e);
                }
            }
            Err(MachineError::MachineNotFound(_)) if self.force => {
                info!("机器 {} 不存在，跳过", name);
            }
            Err(e) => {
                if !self.force {
                    return Err(e);
                }
                warn!("强制删除: 无法加载机器 {}: {}", name, e);
            }
        }
        store.remove(name)?;
        info!("机器 {} 已删除", name);
        Ok(())
    }
}

pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command("rm", "NAME [NAME...]", "Remove a machine")
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Remove local configuration even if the machine cannot be removed"),
        )
        .arg(
            Arg::new("names")
                .value_name("NAME")
                .num_args(1..)
                .required(true)
                .help("Machines to remove"),
        );
    let matches = parse(cmd, streams, args)?;
    let names = matches
        .get_many::<String>("names")
        .map(|names| names.cloned().collect())
        .unwrap_or_default();
    let cmd = RmCommand::new(names, matches.get_flag("force"));
    super::Command::execute(&cmd, router, streams)
}

impl super::Command for RmCommand {
    /// 逐个删除，全部尝试之后返回第一个错误
    fn execute(&self, router: &Router<'_>, _streams: &mut Streams<'_>) -> Result<()> {
        let mut first_error = None;
        let mut failed_driver = None;
        for name in &self.names {
            if let Err(e) = self.remove(router, name) {
                debug!("删除机器 {} 失败: {}", name, e);
                if first_error.is_none() {
                    failed_driver = router.driver_in_use();
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => {
                if let Some(driver) = failed_driver {
                    router.note_driver(&driver);
                }
                Err(e)
            }
            None => Ok(()),
        }
    }
}
