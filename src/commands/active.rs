use super::{parse, sub_command, Router, Streams};
use crate::errors::{MachineError, Result};
use clap::Arg;
use log::info;
use std::io::Write;

pub struct ActiveCommand {
    pub name: Option<String>,
}

impl ActiveCommand {
    pub fn new(name: Option<String>) -> Self {
        Self { name }
    }
}

pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command("active", "[NAME]", "Get or set the active machine")
        .arg(Arg::new("name").value_name("NAME").help("Machine to make active"));
    let matches = parse(cmd, streams, args)?;
    let cmd = ActiveCommand::new(matches.get_one::<String>("name").cloned());
    super::Command::execute(&cmd, router, streams)
}

impl super::Command for ActiveCommand {
    fn execute(&self, router: &Router<'_>, streams: &mut Streams<'_>) -> Result<()> {
        match &self.name {
            Some(name) => {
                info!("设置活动机器: {}", name);
                router.store().set_active(name)
            }
            None => {
                let name = router
                    .store()
                    .get_active()?
                    .ok_or(MachineError::NoActiveMachine)?;
                writeln!(streams.out, "{}", name)?;
                Ok(())
            }
        }
    }
}
