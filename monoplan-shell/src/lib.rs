//! System shell execution for planned task calls.
//!
//! Implements the [`Shell`] boundary by spawning real processes: command
//! actions go through the system shell, script actions through the package
//! manager that invoked the tool (resolved from `npm_execpath`).

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tracing::debug;

use monoplan::{ExecError, ExecResult, Job, Shell, Task, TaskParams};

/// Shell spawning real system processes.
pub struct SystemShell {
    npm_execpath: Option<String>,
}

impl SystemShell {
    /// Resolves the package manager from the `npm_execpath` environment
    /// variable, the way npm and yarn expose themselves to scripts.
    pub fn new() -> Self {
        Self {
            npm_execpath: std::env::var("npm_execpath").ok(),
        }
    }

    pub fn with_npm_execpath(npm_execpath: impl Into<String>) -> Self {
        Self {
            npm_execpath: Some(npm_execpath.into()),
        }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell for SystemShell {
    fn exec_command(&self, task: &Task, command: &str, params: &TaskParams) -> Box<dyn Job> {
        let mut line = vec![command.to_string()];
        line.extend(params.action_args.iter().cloned());
        line.extend(params.args.iter().cloned());
        let line = line.join(" ");
        debug!(task = %task.id(), %line, "spawning command");

        let mut command = shell_command(&line);
        if let Some(location) = task.target().location() {
            command.current_dir(location);
        }
        ProcessJob::spawn(command)
    }

    fn exec_script(&self, task: &Task, params: &TaskParams) -> Box<dyn Job> {
        let invocation = script_invocation(task.name(), params, self.npm_execpath.as_deref());
        debug!(task = %task.id(), ?invocation, "spawning script");

        let mut command = Command::new(&invocation[0]);
        command.args(&invocation[1..]);
        if let Some(location) = task.target().location() {
            command.current_dir(location);
        }
        ProcessJob::spawn(command)
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

/// Command line invoking the package script named after a task.
///
/// A `.js`/`.mjs`/`.cjs` package manager path is re-executed through node.
/// Yarn passes script arguments straight through, everything else needs the
/// `--` separator.
fn script_invocation(name: &str, params: &TaskParams, npm_execpath: Option<&str>) -> Vec<String> {
    let path = npm_execpath.unwrap_or("npm");
    let extension = Path::new(path).extension().and_then(OsStr::to_str);
    let mut invocation = match extension {
        Some("js") | Some("mjs") | Some("cjs") => {
            vec!["node".to_string(), path.to_string(), "run".to_string()]
        }
        _ => vec![path.to_string(), "run".to_string()],
    };
    invocation.push(name.to_string());

    if !params.args.is_empty() {
        let yarn = Path::new(path)
            .file_stem()
            .and_then(OsStr::to_str)
            .map_or(false, |stem| stem.starts_with("yarn"));
        if !yarn {
            invocation.push("--".to_string());
        }
        invocation.extend(params.args.iter().cloned());
    }
    invocation
}

/// A spawned process supervised by a background task.
struct ProcessJob {
    done: watch::Receiver<Option<ExecResult<()>>>,
    kill: Arc<Notify>,
}

impl ProcessJob {
    fn spawn(mut command: Command) -> Box<dyn Job> {
        command.kill_on_drop(true);
        let (done_tx, done_rx) = watch::channel(None);
        let kill = Arc::new(Notify::new());

        match command.spawn() {
            Err(err) => {
                let _ = done_tx.send(Some(Err(ExecError::Spawn(err.to_string()))));
            }
            Ok(child) => {
                let kill = Arc::clone(&kill);
                tokio::spawn(async move {
                    let outcome = supervise(child, &kill).await;
                    let _ = done_tx.send(Some(outcome));
                });
            }
        }
        Box::new(Self {
            done: done_rx,
            kill,
        })
    }
}

async fn supervise(mut child: Child, kill: &Notify) -> ExecResult<()> {
    tokio::select! {
        status = child.wait() => map_status(status),
        _ = kill.notified() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(ExecError::Aborted("killed".to_string()))
        }
    }
}

fn map_status(status: std::io::Result<std::process::ExitStatus>) -> ExecResult<()> {
    let status = match status {
        Ok(status) => status,
        Err(err) => return Err(ExecError::Spawn(err.to_string())),
    };
    if status.success() {
        return Ok(());
    }
    match status.code() {
        // Exit codes past 127 stand for termination by signal.
        Some(code) if code > 127 => Err(ExecError::Aborted(format!("exit code {code}"))),
        Some(code) => Err(ExecError::Failed(code)),
        None => Err(ExecError::Aborted("terminated by signal".to_string())),
    }
}

#[async_trait]
impl Job for ProcessJob {
    async fn when_done(&self) -> ExecResult<()> {
        let mut done = self.done.clone();
        // Bound first: the received `Ref` borrows `done` and must not reach
        // the function's tail expression.
        let received = done.wait_for(|outcome| outcome.is_some()).await;
        match received {
            Ok(outcome) => outcome.clone().unwrap_or(Ok(())),
            Err(_) => Err(ExecError::Aborted("job supervisor gone".to_string())),
        }
    }

    fn abort(&self) {
        self.kill.notify_one();
    }
}
