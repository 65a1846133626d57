use super::{parse, sub_command, Router, Streams};
use crate::drivers::{Driver, State};
use crate::errors::Result;
use clap::{Arg, ArgAction};
use log::{debug, warn};
use std::io::Write;
use std::thread;

pub struct LsCommand {
    pub quiet: bool,
}

impl LsCommand {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

/// 列表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineRow {
    pub name: String,
    pub active: bool,
    pub driver_name: String,
    pub state: State,
    pub url: String,
}

impl MachineRow {
    fn broken(name: &str, active: bool, driver_name: &str) -> Self {
        Self {
            name: name.to_string(),
            active,
            driver_name: driver_name.to_string(),
            state: State::Error,
            url: String::new(),
        }
    }
}

pub fn run(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command("ls", "", "List machines").arg(
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("Only display machine names"),
    );
    let matches = parse(cmd, streams, args)?;
    let cmd = LsCommand::new(matches.get_flag("quiet"));
    super::Command::execute(&cmd, router, streams)
}

/// 在驱动自己的线程里查询状态和 URL
fn probe(name: String, active: bool, driver: Box<dyn Driver>) -> MachineRow {
    let driver_name = driver.driver_name().to_string();
    let state = match driver.get_state() {
        Ok(state) => state,
        Err(e) => {
            warn!("获取机器 {} 的状态失败: {}", name, e);
            State::Error
        }
    };
    let url = if state.is_running() {
        driver.get_url().unwrap_or_else(|e| {
            debug!("获取机器 {} 的 URL 失败: {}", name, e);
            String::new()
        })
    } else {
        String::new()
    };
    MachineRow {
        name,
        active,
        driver_name,
        state,
        url,
    }
}

/// 收集所有机器的信息，各驱动的探测并发进行，结果按名称排序
pub fn collect_rows(router: &Router<'_>) -> Result<Vec<MachineRow>> {
    let store = router.store();
    let active = store.get_active()?;

    let mut rows = Vec::new();
    let mut probes = Vec::new();
    for name in store.list()? {
        let is_active = active.as_deref() == Some(name.as_str());
        match router.load_machine(&name) {
            Ok((_, driver)) => probes.push((name, is_active, driver)),
            Err(e) => {
                warn!("加载机器 {} 失败: {}", name, e);
                let driver_name = store.load(&name).map(|r| r.driver_name).unwrap_or_default();
                rows.push(MachineRow::broken(&name, is_active, &driver_name));
            }
        }
    }

    thread::scope(|s| {
        let handles: Vec<_> = probes
            .into_iter()
            .map(|(name, is_active, driver)| {
                let fallback = MachineRow::broken(&name, is_active, driver.driver_name());
                (fallback, s.spawn(move || probe(name, is_active, driver)))
            })
            .collect();
        for (fallback, handle) in handles {
            rows.push(handle.join().unwrap_or(fallback));
        }
    });

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}

impl super::Command for LsCommand {
    fn execute(&self, router: &Router<'_>, streams: &mut Streams<'_>) -> Result<()> {
        if self.quiet {
            for name in router.store().list()? {
                writeln!(streams.out, "{}", name)?;
            }
            return Ok(());
        }

        let rows = collect_rows(router)?;
        let header = format!("{:<20} {:<7} {:<10} {:<12} {}", "NAME", "ACTIVE", "DRIVER", "STATE", "URL");
        writeln!(streams.out, "{}", header.trim_end())?;
        for row in rows {
            let line = format!(
                "{:<20} {:<7} {:<10} {:<12} {}",
                row.name,
                if row.active { "*" } else { "" },
                row.driver_name,
                row.state,
                row.url
            );
            writeln!(streams.out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}
