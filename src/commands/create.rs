use super::{parse, sub_command, Router, Streams};
use crate::drivers::Registry;
use crate::errors::{MachineError, Result};
use crate::store::{validate_name, MachineRecord};
use clap::{Arg, ArgGroup, ArgMatches};
use log::{debug, info};

pub const DEFAULT_DRIVER: &str = "none";

pub struct CreateCommand {
    pub name: String,
    pub driver: String,
    /// 包含所有驱动注册的参数，交给所选驱动的 `set_config_from_flags`
    pub flags: ArgMatches,
}

impl CreateCommand {
    pub fn new(name: String, driver: String, flags: ArgMatches) -> Self {
        Self { name, driver, flags }
    }
}

/// `create` 的参数解析器，附带每个已注册驱动自己的参数
fn command(registry: &Registry) -> clap::Command {
    let mut cmd = sub_command("create", "NAME", "Create a machine")
        .arg(Arg::new("name").value_name("NAME").help("Machine name"))
        .arg(
            Arg::new("name-flag")
                .long("name")
                .value_name("NAME")
                .help("Machine name"),
        )
        .group(
            ArgGroup::new("machine-name")
                .args(["name", "name-flag"])
                .required(true),
        )
        .arg(
            Arg::new("driver")
                .short('d')
                .long("driver")
                .value_name("DRIVER")
                .default_value(DEFAULT_DRIVER)
                .help("Driver to create machine with"),
        )
        .after_help(format!(
            "Available drivers: {}",
            registry.list_names().join(", ")
        ));

    for driver in registry.iter() {
        cmd = driver.register_create_flags(cmd);
    }
    cmd
}

pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let matches = parse(command(router.registry()), streams, args)?;

    let name = matches
        .get_one::<String>("name")
        .or_else(|| matches.get_one::<String>("name-flag"))
        .cloned()
        .unwrap_or_default();
    let driver = matches
        .get_one::<String>("driver")
        .cloned()
        .unwrap_or_else(|| DEFAULT_DRIVER.to_string());

    let cmd = CreateCommand::new(name, driver, matches);
    super::Command::execute(&cmd, router, streams)
}

impl super::Command for CreateCommand {
    fn execute(&self, router: &Router<'_>, _streams: &mut Streams<'_>) -> Result<()> {
        info!("创建机器: 名称={}, 驱动={}", self.name, self.driver);

        validate_name(&self.name)?;

        // 驱动必须已注册，在任何副作用之前检查
        let registered = router.registry().get(&self.driver)?;
        router.note_driver(registered.name());

        let store = router.store();
        if store.exists(&self.name) {
            return Err(MachineError::MachineExists(self.name.clone()));
        }

        let store_path = store.machine_dir(&self.name);
        let mut driver = registered.new_driver(&store_path)?;
        driver.set_deadline(router.deadline());
        driver.set_config_from_flags(&self.flags)?;

        // 先保存记录，驱动创建失败时可以用 rm 清理
        let record = MachineRecord::new(&self.name, registered.name())?;
        store.save(&record)?;

        if let Err(e) = driver.create() {
            debug!(
                "创建机器 {} 失败，可以使用 `machine rm {}` 清理: {}",
                self.name, self.name, e
            );
            return Err(e.into());
        }

        store.set_active(&self.name)?;
        info!("机器 {} 创建成功", self.name);
        Ok(())
    }
}
