//! start、stop、restart、kill、upgrade 共用同一个处理流程，只是调用驱动的不同操作

use super::{parse, sub_command, Router, Streams};
use crate::drivers::{Driver, DriverResult};
use crate::errors::Result;
use clap::Arg;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Kill,
    Upgrade,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Kill => "kill",
            Action::Upgrade => "upgrade",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Action::Start => "Start a machine",
            Action::Stop => "Stop a machine",
            Action::Restart => "Restart a machine",
            Action::Kill => "Kill a machine",
            Action::Upgrade => "Upgrade a machine to the latest version of Docker",
        }
    }

    fn apply(&self, driver: &mut dyn Driver) -> DriverResult<()> {
        match self {
            Action::Start => driver.start(),
            Action::Stop => driver.stop(),
            Action::Restart => driver.restart(),
            Action::Kill => driver.kill(),
            Action::Upgrade => driver.upgrade(),
        }
    }
}

pub struct LifecycleCommand {
    pub action: Action,
    pub name: Option<String>,
}

impl LifecycleCommand {
    pub fn new(action: Action, name: Option<String>) -> Self {
        Self { action, name }
    }
}

fn run(action: Action, router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command(action.verb(), "[NAME]", action.description())
        .arg(Arg::new("name").value_name("NAME").help("Machine name, defaults to the active machine"));
    let matches = parse(cmd, streams, args)?;
    let cmd = LifecycleCommand::new(action, matches.get_one::<String>("name").cloned());
    super::Command::execute(&cmd, router, streams)
}

pub fn run_start(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Action::Start, router, streams, args)
}

pub fn run_stop(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Action::Stop, router, streams, args)
}

pub fn run_restart(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Action::Restart, router, streams, args)
}

pub fn run_kill(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Action::Kill, router, streams, args)
}

pub fn run_upgrade(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Action::Upgrade, router, streams, args)
}

impl super::Command for LifecycleCommand {
    fn execute(&self, router: &Router<'_>, _streams: &mut Streams<'_>) -> Result<()> {
        let name = router.store().resolve_name(self.name.as_deref())?;
        let (_, mut driver) = router.load_machine(&name)?;

        info!("{} 机器 {}", self.action.verb(), name);
        self.action.apply(driver.as_mut())?;
        info!("机器 {} {} 完成", name, self.action.verb());
        Ok(())
    }
}
