//! Child-process manager: spawn, write-to-stdin, kill, and stdout/stderr
//! pumps that forward output lines as events.
//!
//! Wraps `tokio::process` behind a descriptor table exposing a
//! `child_process.spawn/write/kill` trio plus a timeout-kill path.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::RouteError;
use crate::result::IdGenerator;

#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Stdout(Bytes),
    Stderr(Bytes),
    Exit(Option<i32>),
}

/// Buffered result of `child_process.exec`: stdout/stderr fully collected,
/// rather than pumped as events, since `exec` callers want one reply.
#[derive(Debug)]
pub struct ExecOutcome {
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub exit_code: Option<i32>,
}

struct ProcessEntry {
    child: Child,
    stdin: Option<ChildStdin>,
    events: UnboundedReceiver<ProcessEvent>,
}

#[derive(Default)]
pub struct ProcessService {
    ids: IdGenerator,
    processes: Mutex<HashMap<u64, ProcessEntry>>,
}

impl ProcessService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, command: &str, args: &[String], cwd: Option<&str>) -> Result<u64, RouteError> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(RouteError::from)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, rx) = unbounded_channel();
        spawn_pump(stdout, tx.clone(), ProcessEvent::Stdout);
        spawn_pump(stderr, tx.clone(), ProcessEvent::Stderr);

        let id = self.ids.next();
        self.processes.lock().insert(
            id,
            ProcessEntry {
                child,
                stdin,
                events: rx,
            },
        );
        let _ = tx;
        Ok(id)
    }

    pub async fn write(&self, id: u64, data: &[u8]) -> Result<(), RouteError> {
        let mut stdin = {
            let mut table = self.processes.lock();
            let entry = table
                .get_mut(&id)
                .ok_or_else(|| RouteError::not_found(format!("no process {id}")))?;
            entry.stdin.take()
        };
        if let Some(ref mut pipe) = stdin {
            pipe.write_all(data).await.map_err(RouteError::from)?;
        }
        let mut table = self.processes.lock();
        if let Some(entry) = table.get_mut(&id) {
            entry.stdin = stdin;
        }
        Ok(())
    }

    /// Runs `command` to completion and buffers its stdout/stderr, the way
    /// a one-shot `exec` call differs from the `spawn`/`write`/`kill` trio's
    /// long-lived, event-pumped descriptor. `timeout` + `kill_signal` send
    /// the given signal (default `SIGKILL`) and report `ETIMEDOUT` if the
    /// process hasn't exited by then.
    pub async fn exec(
        &self,
        command: &str,
        args: &[String],
        cwd: Option<&str>,
        timeout: Option<std::time::Duration>,
        kill_signal: Option<i32>,
    ) -> Result<ExecOutcome, RouteError> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(RouteError::from)?;
        let pid = child.id();
        let mut stdout = child.stdout.take().expect("stdout piped at spawn");
        let mut stderr = child.stderr.take().expect("stderr piped at spawn");

        let mut out = Vec::new();
        let mut err = Vec::new();
        let collect = async {
            let (r1, r2) = tokio::join!(
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err)
            );
            r1.map_err(RouteError::from)?;
            r2.map_err(RouteError::from)?;
            child.wait().await.map_err(RouteError::from)
        };

        let status = match timeout {
            Some(duration) => match tokio::time::timeout(duration, collect).await {
                Ok(result) => result?,
                Err(_elapsed) => {
                    if let Some(pid) = pid {
                        let signal = kill_signal.unwrap_or(libc::SIGKILL);
                        unsafe {
                            libc::kill(pid as libc::pid_t, signal);
                        }
                    }
                    let _ = child.wait().await;
                    return Err(RouteError::timed_out("ETIMEDOUT"));
                }
            },
            None => collect.await?,
        };

        Ok(ExecOutcome {
            stdout: Bytes::from(out),
            stderr: Bytes::from(err),
            exit_code: status.code(),
        })
    }

    pub fn kill(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.processes.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no process {id}")))?;
        entry.child.start_kill().map_err(RouteError::from)
    }

    pub async fn poll_exit(&self, id: u64) -> Option<i32> {
        let mut table = self.processes.lock();
        let entry = table.get_mut(&id)?;
        match entry.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    /// Drains buffered stdout/stderr/exit events without blocking.
    pub fn poll_events(&self, id: u64) -> Vec<ProcessEvent> {
        let mut table = self.processes.lock();
        let mut out = Vec::new();
        if let Some(entry) = table.get_mut(&id) {
            while let Ok(event) = entry.events.try_recv() {
                out.push(event);
            }
        }
        out
    }

    pub fn remove(&self, id: u64) {
        self.processes.lock().remove(&id);
    }

    pub fn process_count(&self) -> usize {
        self.processes.lock().len()
    }
}

fn spawn_pump(
    pipe: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
    tx: UnboundedSender<ProcessEvent>,
    wrap: fn(Bytes) -> ProcessEvent,
) {
    let Some(mut pipe) = pipe else { return };
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(wrap(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

pub type SharedProcessService = Arc<ProcessService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_observe_exit() {
        let svc = ProcessService::new();
        let id = svc.spawn("true", &[], None).unwrap();
        for _ in 0..50 {
            if svc.poll_exit(id).await.is_some() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("process did not exit in time");
    }

    #[tokio::test]
    async fn exec_buffers_stdout_and_reports_exit_code() {
        let svc = ProcessService::new();
        let outcome = svc
            .exec("echo", &["hi".to_string()], None, None, None)
            .await
            .unwrap();
        assert_eq!(outcome.stdout.as_ref(), b"hi\n");
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn exec_reports_etimedout_and_kills_on_timeout() {
        let svc = ProcessService::new();
        let err = svc
            .exec(
                "sleep",
                &["5".to_string()],
                None,
                Some(std::time::Duration::from_millis(50)),
                Some(15),
            )
            .await
            .unwrap_err();
        match err.code {
            Some(crate::error::ErrorCode::Symbol(s)) => assert_eq!(s, "ETIMEDOUT"),
            other => panic!("expected symbolic ETIMEDOUT code, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn kill_stops_a_sleeping_process() {
        let svc = ProcessService::new();
        let id = svc.spawn("sleep", &["5".to_string()], None).unwrap();
        svc.kill(id).unwrap();
        for _ in 0..50 {
            if svc.poll_exit(id).await.is_some() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("killed process did not exit in time");
    }
}
