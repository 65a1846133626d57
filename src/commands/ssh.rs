use super::{parse, sub_command, Router, Streams};
use crate::bail;
use crate::errors::{MachineError, Result};
use clap::Arg;
use log::{debug, info};

pub struct SshCommand {
    pub name: Option<String>,
    /// 为空时打开交互式会话
    pub command: Vec<String>,
}

impl SshCommand {
    pub fn new(name: Option<String>, command: Vec<String>) -> Self {
        Self { name, command }
    }
}

pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command(
        "ssh",
        "[NAME] [-- COMMAND...]",
        "Log into or run a command on a machine with SSH",
    )
    .arg(Arg::new("name").value_name("NAME").help("Machine name, defaults to the active machine"))
    .arg(
        Arg::new("command")
            .value_name("COMMAND")
            .num_args(1..)
            .last(true)
            .help("Command to run on the machine"),
    );
    let matches = parse(cmd, streams, args)?;
    let command = matches
        .get_many::<String>("command")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let cmd = SshCommand::new(matches.get_one::<String>("name").cloned(), command);
    super::Command::execute(&cmd, router, streams)
}

impl super::Command for SshCommand {
    fn execute(&self, router: &Router<'_>, _streams: &mut Streams<'_>) -> Result<()> {
        let name = router.store().resolve_name(self.name.as_deref())?;
        let (_, driver) = router.load_machine(&name)?;

        let state = driver.get_state()?;
        if !state.is_running() {
            bail!("machine {} is not running (state: {})", name, state);
        }

        let remote = driver.get_ssh_command(&self.command)?;
        if remote.is_interactive() {
            info!("打开到机器 {} 的 SSH 会话", name);
        } else {
            debug!("在机器 {} 上执行: {:?}", name, remote.args);
        }

        match router.transport().run(&remote)? {
            0 => Ok(()),
            code => Err(MachineError::RemoteCommandFailed(code)),
        }
    }
}
