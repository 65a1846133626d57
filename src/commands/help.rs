use super::{Router, Streams};
use crate::drivers::Registry;
use crate::errors::{MachineError, Result};
use log::debug;
use std::io::{self, Write};

/// 用法中列出的顶层命令
pub const COMMANDS: &[(&str, &str)] = &[
    ("active", "Get or set the active machine"),
    ("create", "Create a machine"),
    ("inspect", "Inspect information about a machine"),
    ("ip", "Get the IP address of a machine"),
    ("kill", "Kill a machine"),
    ("ls", "List machines"),
    ("restart", "Restart a machine"),
    ("rm", "Remove a machine"),
    ("ssh", "Log into or run a command on a machine with SSH"),
    ("start", "Start a machine"),
    ("stop", "Stop a machine"),
    ("upgrade", "Upgrade a machine to the latest version of Docker"),
    ("url", "Get the URL of a machine"),
];

const OPTIONS: &[(&str, &str)] = &[
    ("-D, --debug", "Enable debug mode"),
    ("-s, --storage-path <PATH>", "Configures storage path [env: MACHINE_STORAGE_PATH]"),
    ("--timeout <SECONDS>", "Deadline for driver operations"),
    ("-h, --help", "Print help"),
    ("-V, --version", "Print version information"),
];

pub fn write_usage<W: Write + ?Sized>(w: &mut W, registry: &Registry) -> io::Result<()> {
    writeln!(w, "Usage: machine [OPTIONS] COMMAND [arg...]")?;
    writeln!(w)?;
    writeln!(w, "Create and manage machines running Docker.")?;
    writeln!(w)?;
    writeln!(w, "Options:")?;
    for (flag, description) in OPTIONS {
        writeln!(w, "  {:<28}{}", flag, description)?;
    }
    writeln!(w)?;
    writeln!(w, "Commands:")?;
    for (name, description) in COMMANDS {
        writeln!(w, "    {:<10.10}{}", name, description)?;
    }
    writeln!(w)?;
    writeln!(w, "Available drivers: {}", registry.list_names().join(", "))?;
    writeln!(w)?;
    writeln!(w, "Run 'machine COMMAND --help' for more information on a command.")?;
    Ok(())
}

fn write_help_usage<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    writeln!(w, "Usage: machine help [COMMAND]")?;
    writeln!(w)?;
    writeln!(w, "Show help for a command")
}

/// `help [COMMAND]`
///
/// 找不到子命令时只输出诊断，仍然返回成功。
/// 子命令的用法错误在这里被吞掉，help 本身不会让进程失败。
pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    if let Some(verb) = args.first() {
        if verb == "--help" || verb == "-h" {
            write_help_usage(&mut *streams.err)?;
            return Err(MachineError::Usage("machine help".to_string()));
        }

        match router.resolve(verb) {
            Some(handler) => {
                if let Err(e) = handler(router, streams, &["--help".to_string()]) {
                    if !matches!(e, MachineError::Usage(_)) {
                        debug!("{} --help 返回错误: {}", verb, e);
                    }
                }
                return Ok(());
            }
            None => writeln!(streams.err, "Error: command not found - {}", verb)?,
        }
    }

    write_usage(&mut *streams.err, router.registry())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_lists_commands_and_drivers() {
        let registry = crate::drivers::builtin_registry().unwrap();
        let mut buf = Vec::<u8>::new();
        write_usage(&mut buf, &registry).unwrap();
        let usage = String::from_utf8(buf).unwrap();

        assert!(usage.contains("    upgrade   Upgrade a machine to the latest version of Docker\n"));
        assert!(usage.contains("    ls        List machines\n"));
        assert!(usage.contains("Available drivers: generic, none\n"));
        assert!(usage.ends_with("Run 'machine COMMAND --help' for more information on a command.\n"));
    }
}
