//! 命令路由
//!
//! 动词先规范化（每个以 `-` 或空白分隔的片段首字母大写，其余小写，然后拼接），
//! 再在静态的处理函数表中查找。`create`、`Create`、`CREATE` 都得到 `Create`。

use super::{active, create, help, inspect, lifecycle, ls, rm, ssh, Streams};
use crate::drivers::ssh::{SystemTransport, Transport};
use crate::drivers::{Deadline, Driver, Registry};
use crate::errors::{MachineError, Result, RouterError};
use crate::store::{MachineRecord, Store};
use log::debug;
use std::cell::RefCell;
use std::io::Write;

/// 绑定到规范化动词的处理函数，参数是动词之后的剩余参数
pub type Handler = fn(&Router<'_>, &mut Streams<'_>, &[String]) -> Result<()>;

const HANDLERS: &[(&str, Handler)] = &[
    ("Active", active::run),
    ("Create", create::run),
    ("Help", help::run),
    ("Inspect", inspect::run_inspect),
    ("Ip", inspect::run_ip),
    ("Kill", lifecycle::run_kill),
    ("Ls", ls::run),
    ("Restart", lifecycle::run_restart),
    ("Rm", rm::run),
    ("Ssh", ssh::run),
    ("Start", lifecycle::run_start),
    ("Stop", lifecycle::run_stop),
    ("Upgrade", lifecycle::run_upgrade),
    ("Url", inspect::run_url),
];

/// 规范化动词，任何片段为空时返回 `None`
pub fn normalize_verb(verb: &str) -> Option<String> {
    let mut normalized = String::with_capacity(verb.len());
    for token in verb.split(|c: char| c == '-' || c.is_whitespace()) {
        let mut chars = token.chars();
        let first = chars.next()?;
        normalized.extend(first.to_uppercase());
        normalized.extend(chars.flat_map(char::to_lowercase));
    }
    Some(normalized)
}

pub struct Router<'a> {
    registry: &'a Registry,
    store: Store,
    deadline: Deadline,
    transport: Box<dyn Transport + 'a>,
    /// 本次调用最近使用的驱动，用于错误诊断
    driver_in_use: RefCell<Option<String>>,
}

impl<'a> Router<'a> {
    /// 注册表必须在构造路由器之前填充完毕
    pub fn new(registry: &'a Registry, store: Store) -> Self {
        Self {
            registry,
            store,
            deadline: Deadline::none(),
            transport: Box::new(SystemTransport),
            driver_in_use: RefCell::new(None),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport + 'a>) -> Self {
        self.transport = transport;
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn note_driver(&self, name: &str) {
        *self.driver_in_use.borrow_mut() = Some(name.to_string());
    }

    pub fn driver_in_use(&self) -> Option<String> {
        self.driver_in_use.borrow().clone()
    }

    /// 失败时输出的单行诊断。驱动产生的错误附带驱动名称
    pub fn diagnostic(&self, args: &[String], err: &MachineError) -> String {
        let verb = args.first().map(String::as_str).unwrap_or("help");
        match (err, self.driver_in_use()) {
            (MachineError::Driver(_) | MachineError::Config(_), Some(driver)) => {
                format!("Error: {} ({} driver): {}", verb, driver, err)
            }
            _ => format!("Error: {}: {}", verb, err),
        }
    }

    /// 顶层动词表中的处理函数
    pub fn resolve(&self, verb: &str) -> Option<Handler> {
        let normalized = normalize_verb(verb)?;
        HANDLERS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, handler)| *handler)
    }

    /// 分发一次调用。没有参数等同于 `help`；未知动词输出诊断和帮助后返回错误。
    /// 处理函数的错误原样返回
    pub fn dispatch(&self, args: &[String], streams: &mut Streams<'_>) -> Result<()> {
        let Some((verb, rest)) = args.split_first() else {
            return help::run(self, streams, &[]);
        };

        match self.resolve(verb) {
            Some(handler) => {
                debug!("分发命令 {} {:?}", verb, rest);
                handler(self, streams, rest)
            }
            None => {
                writeln!(streams.err, "Error: command doesn't exist - {}", verb)?;
                help::run(self, streams, &[])?;
                Err(RouterError::UnknownCommand(verb.clone()).into())
            }
        }
    }

    /// 读取机器记录并构造其驱动。驱动未注册时在任何副作用之前失败
    pub fn load_machine(&self, name: &str) -> Result<(MachineRecord, Box<dyn Driver>)> {
        let record = self.store.load(name)?;
        let registered = self.registry.get(&record.driver_name)?;
        self.note_driver(registered.name());
        let mut driver = registered.new_driver(&self.store.machine_dir(&record.name))?;
        driver.set_deadline(self.deadline);
        Ok((record, driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ssh::RemoteCommand;
    use crate::drivers::{testing, State};
    use crate::errors::{MachineError, RegistryError};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Output {
        result: Result<()>,
        out: String,
        err: String,
    }

    fn run(router: &Router<'_>, args: &[&str]) -> Output {
        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let result = {
            let mut streams = Streams::new(&mut out, &mut err);
            router.dispatch(&args, &mut streams)
        };
        Output {
            result,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn registry() -> (Registry, testing::Backend) {
        let mut registry = Registry::new();
        let backend = testing::register(&mut registry, "null", false);
        testing::register(&mut registry, "flaky", true);
        (registry, backend)
    }

    #[test]
    fn test_normalize_verb() {
        assert_eq!(normalize_verb("create").as_deref(), Some("Create"));
        assert_eq!(normalize_verb("CREATE").as_deref(), Some("Create"));
        assert_eq!(normalize_verb("cReAtE").as_deref(), Some("Create"));
        assert_eq!(normalize_verb("ls").as_deref(), Some("Ls"));
        assert_eq!(normalize_verb("set-active").as_deref(), Some("SetActive"));
        assert_eq!(normalize_verb(""), None);
        assert_eq!(normalize_verb("--help"), None);
        assert_eq!(normalize_verb("a--b"), None);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        for (name, _) in HANDLERS {
            let lower = name.to_lowercase();
            let upper = name.to_uppercase();
            let expected = router.resolve(&lower).unwrap() as usize;
            assert_eq!(router.resolve(&upper).unwrap() as usize, expected);
            assert_eq!(router.resolve(name).unwrap() as usize, expected);
        }
        assert!(router.resolve("bogus").is_none());
    }

    #[test]
    fn test_zero_args_same_as_help() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let empty = run(&router, &[]);
        let help = run(&router, &["help"]);
        assert!(empty.result.is_ok());
        assert!(help.result.is_ok());
        assert_eq!(empty.out, help.out);
        assert_eq!(empty.err, help.err);
        assert!(empty.err.contains("Usage: machine [OPTIONS] COMMAND [arg...]"));
        assert!(empty.err.contains("flaky, null"));
    }

    #[test]
    fn test_unknown_verb() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let output = run(&router, &["bogus", "ls"]);
        assert!(output.err.starts_with("Error: command doesn't exist - bogus\n"));
        assert!(output.err.contains("Commands:"));
        let err = output.result.unwrap_err();
        assert!(matches!(err, MachineError::Router(RouterError::UnknownCommand(ref verb)) if verb == "bogus"));
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_help_for_unknown_sub_verb() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let output = run(&router, &["help", "bogus"]);
        assert!(output.result.is_ok());
        assert!(output.err.contains("command not found - bogus"));
    }

    #[test]
    fn test_help_for_known_sub_verb() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let output = run(&router, &["help", "CREATE"]);
        assert!(output.result.is_ok());
        assert!(output.err.contains("machine create [OPTIONS] NAME"));
        assert!(output.err.contains("Available drivers: flaky, null"));
    }

    #[test]
    fn test_handler_help_exits_with_usage() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        for verb in ["active", "create", "inspect", "ip", "kill", "ls", "restart", "rm", "ssh", "start", "stop", "upgrade", "url", "help"] {
            let output = run(&router, &[verb, "--help"]);
            let err = output.result.unwrap_err();
            assert_eq!(err.exit_code(), 2, "{}", verb);
            assert!(output.err.contains("Usage: machine"), "{}", verb);
        }
    }

    #[test]
    fn test_create_then_state_running() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let output = run(&router, &["create", "--name=m1", "--driver=null"]);
        assert!(output.result.is_ok(), "{}", output.err);

        let (record, driver) = router.load_machine("m1").unwrap();
        assert_eq!(record.driver_name, "null");
        assert_eq!(driver.get_state().unwrap(), State::Running);
        assert_eq!(router.store().get_active().unwrap().as_deref(), Some("m1"));

        let duplicate = run(&router, &["create", "--driver", "null", "m1"]);
        assert!(matches!(duplicate.result, Err(MachineError::MachineExists(_))));
    }

    #[test]
    fn test_create_unknown_driver_has_no_side_effects() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        let output = run(&router, &["create", "--driver", "virtualbox", "m1"]);
        assert!(matches!(
            output.result,
            Err(MachineError::Registry(RegistryError::DriverNotFound(ref name))) if name == "virtualbox"
        ));
        assert!(!router.store().exists("m1"));
        assert!(router.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle_verbs() {
        let (registry, backend) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));
        let machine_dir = router.store().machine_dir("m1");

        assert!(run(&router, &["create", "-d", "null", "m1"]).result.is_ok());
        assert!(run(&router, &["stop"]).result.is_ok());
        assert_eq!(backend.lock().unwrap().get(&machine_dir), Some(&State::Stopped));
        assert!(run(&router, &["START", "m1"]).result.is_ok());
        assert_eq!(backend.lock().unwrap().get(&machine_dir), Some(&State::Running));
        assert!(run(&router, &["kill", "m1"]).result.is_ok());
        assert!(run(&router, &["restart", "m1"]).result.is_ok());
        assert!(run(&router, &["upgrade", "m1"]).result.is_ok());
        assert_eq!(backend.lock().unwrap().get(&machine_dir), Some(&State::Running));

        assert_eq!(run(&router, &["url", "m1"]).out, "tcp://10.0.0.1:2376\n");
        assert_eq!(run(&router, &["ip"]).out, "10.0.0.1\n");

        let missing = run(&router, &["start", "m2"]);
        assert!(matches!(missing.result, Err(MachineError::MachineNotFound(_))));
    }

    #[test]
    fn test_restart_failure_leaves_machine_stopped() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        assert!(run(&router, &["create", "--driver", "flaky", "m1"]).result.is_ok());
        let output = run(&router, &["restart", "m1"]);
        let err = output.result.unwrap_err();
        assert_eq!(err.to_string(), "start refused");
        assert!(matches!(err, MachineError::Driver(_)));

        let (_, driver) = router.load_machine("m1").unwrap();
        assert_eq!(driver.get_state().unwrap(), State::Stopped);
    }

    #[test]
    fn test_diagnostic_names_verb_and_driver() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));
        let args = |values: &[&str]| values.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let missing = run(&router, &["stop", "m1"]).result.unwrap_err();
        assert_eq!(
            router.diagnostic(&args(&["stop", "m1"]), &missing),
            "Error: stop: machine m1 does not exist"
        );

        assert!(run(&router, &["create", "--driver", "flaky", "m1"]).result.is_ok());
        let err = run(&router, &["restart", "m1"]).result.unwrap_err();
        let line = router.diagnostic(&args(&["restart", "m1"]), &err);
        assert_eq!(line, "Error: restart (flaky driver): start refused");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_rm_is_idempotent_on_absent_resource() {
        let (registry, backend) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        assert!(run(&router, &["create", "--driver", "null", "m1"]).result.is_ok());
        // 远端资源已经被带外删除
        backend.lock().unwrap().clear();

        assert!(run(&router, &["rm", "m1"]).result.is_ok());
        assert!(!router.store().exists("m1"));
        assert_eq!(router.store().get_active().unwrap(), None);

        let again = run(&router, &["rm", "m1"]);
        assert!(matches!(again.result, Err(MachineError::MachineNotFound(_))));
        assert!(run(&router, &["rm", "-f", "m1"]).result.is_ok());
    }

    #[test]
    fn test_unregistered_driver_on_existing_machine() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        store.save(&MachineRecord::new("old", "virtualbox").unwrap()).unwrap();
        let router = Router::new(&registry, store);

        let output = run(&router, &["stop", "old"]);
        assert!(matches!(
            output.result,
            Err(MachineError::Registry(RegistryError::DriverNotFound(_)))
        ));
    }

    #[test]
    fn test_ls_and_active() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        store.save(&MachineRecord::new("legacy", "virtualbox").unwrap()).unwrap();
        let router = Router::new(&registry, store);

        assert!(run(&router, &["create", "--driver", "null", "web"]).result.is_ok());
        assert!(run(&router, &["create", "--driver", "flaky", "db"]).result.is_ok());
        assert!(run(&router, &["stop", "db"]).result.is_ok());

        let listing = run(&router, &["ls"]);
        assert!(listing.result.is_ok());
        let lines: Vec<&str> = listing.out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME"));
        // 最后创建的机器成为活动机器
        assert!(lines[1].starts_with("db ") && lines[1].contains("Stopped") && lines[1].contains('*'));
        assert!(!lines[1].contains("tcp://"));
        assert!(lines[2].starts_with("legacy ") && lines[2].contains("Error"));
        assert!(lines[3].starts_with("web ") && !lines[3].contains('*'));
        assert!(lines[3].contains("Running") && lines[3].contains("tcp://10.0.0.1:2376"));

        assert_eq!(run(&router, &["ls", "-q"]).out, "db\nlegacy\nweb\n");

        assert_eq!(run(&router, &["active"]).out, "db\n");
        assert!(run(&router, &["active", "web"]).result.is_ok());
        assert_eq!(run(&router, &["active"]).out, "web\n");
        assert!(run(&router, &["active", "nope"]).result.is_err());
    }

    #[test]
    fn test_inspect_reports_live_state() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let router = Router::new(&registry, Store::new(dir.path()));

        assert!(run(&router, &["create", "--driver", "null", "m1"]).result.is_ok());
        assert!(run(&router, &["stop", "m1"]).result.is_ok());

        let output = run(&router, &["inspect", "m1"]);
        let value: serde_json::Value = serde_json::from_str(&output.out).unwrap();
        assert_eq!(value["name"], "m1");
        assert_eq!(value["driver_name"], "null");
        assert_eq!(value["state"], "stopped");
    }

    struct RecordingTransport {
        calls: Rc<RefCell<Vec<RemoteCommand>>>,
        code: i32,
    }

    impl Transport for RecordingTransport {
        fn run(&self, command: &RemoteCommand) -> Result<i32> {
            self.calls.borrow_mut().push(command.clone());
            Ok(self.code)
        }
    }

    #[test]
    fn test_ssh_hands_descriptor_to_transport() {
        let (registry, _) = registry();
        let dir = TempDir::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let router = Router::new(&registry, Store::new(dir.path())).with_transport(Box::new(
            RecordingTransport {
                calls: calls.clone(),
                code: 3,
            },
        ));

        assert!(run(&router, &["create", "--driver", "null", "m1"]).result.is_ok());
        assert!(run(&router, &["ssh", "m1"]).result.is_err());

        let output = run(&router, &["ssh", "m1", "--", "docker", "ps"]);
        assert!(matches!(output.result, Err(MachineError::RemoteCommandFailed(3))));

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].is_interactive());
        assert_eq!(calls[1].args, vec!["docker", "ps"]);
    }
}
