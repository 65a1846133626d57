use super::{parse, sub_command, Router, Streams};
use crate::drivers::State;
use crate::errors::Result;
use clap::Arg;
use log::debug;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// 查询类命令输出的内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Inspect,
    Ip,
    Url,
}

impl Query {
    fn verb(&self) -> &'static str {
        match self {
            Query::Inspect => "inspect",
            Query::Ip => "ip",
            Query::Url => "url",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Query::Inspect => "Inspect information about a machine",
            Query::Ip => "Get the IP address of a machine",
            Query::Url => "Get the URL of a machine",
        }
    }
}

/// `inspect` 的 JSON 输出
#[derive(Debug, Serialize)]
pub struct MachineInfo {
    pub name: String,
    pub driver_name: String,
    pub store_path: PathBuf,
    pub state: State,
}

pub struct InspectCommand {
    pub query: Query,
    pub name: Option<String>,
}

impl InspectCommand {
    pub fn new(query: Query, name: Option<String>) -> Self {
        Self { query, name }
    }
}

fn run(query: Query, router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    let cmd = sub_command(query.verb(), "[NAME]", query.description())
        .arg(Arg::new("name").value_name("NAME").help("Machine name, defaults to the active machine"));
    let matches = parse(cmd, streams, args)?;
    let cmd = InspectCommand::new(query, matches.get_one::<String>("name").cloned());
    super::Command::execute(&cmd, router, streams)
}

pub fn run_inspect(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Query::Inspect, router, streams, args)
}

pub fn run_ip(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Query::Ip, router, streams, args)
}

pub fn run_url(router: &Router<'_>, streams: &mut Streams<'_>, args: &[String]) -> Result<()> {
    run(Query::Url, router, streams, args)
}

impl super::Command for InspectCommand {
    fn execute(&self, router: &Router<'_>, streams: &mut Streams<'_>) -> Result<()> {
        let name = router.store().resolve_name(self.name.as_deref())?;
        let (record, driver) = router.load_machine(&name)?;
        debug!("查询机器 {}: {:?}", name, self.query);

        match self.query {
            Query::Inspect => {
                let info = MachineInfo {
                    store_path: router.store().machine_dir(&record.name),
                    name: record.name,
                    driver_name: record.driver_name,
                    state: driver.get_state()?,
                };
                writeln!(streams.out, "{}", serde_json::to_string_pretty(&info)?)?;
            }
            Query::Ip => writeln!(streams.out, "{}", driver.get_ip()?)?,
            Query::Url => writeln!(streams.out, "{}", driver.get_url()?)?,
        }
        Ok(())
    }
}
