//! Local execution of command lines as chained child processes.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;
use wait_timeout::ChildExt;

use super::context::ExecutionContext;
use super::options::RunOptions;
use super::result::ExecutionResult;
use crate::error::FleetShellError;
use crate::output::{normalize, RawOutput};
use crate::parse::{split_pipeline, split_words, Command, Pipeline};
use crate::Result;

/// Runs command lines on the local machine.
///
/// Holds no state between calls: every call snapshots the process
/// environment into a fresh [`ExecutionContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor.
    pub fn new() -> Self {
        Self
    }

    /// Run one compound line such as `cd /tmp; ls | grep log`.
    ///
    /// Every non-builtin stage is spawned before the final one is awaited,
    /// pipe-linked stages are connected through OS pipes, and all spawned
    /// processes are killed once the final stage finishes or times out.
    /// Only the final stage's output and exit code are reported.
    pub fn run_line(&self, line: &str, options: &RunOptions) -> Result<ExecutionResult> {
        let start = Instant::now();
        let pipeline = split_pipeline(line)?;
        let mut ctx = ExecutionContext::from_options(options);
        let mut group = ProcessGroup::default();

        let Some(last) = spawn_pipeline(&pipeline, &mut ctx, options, &mut group)? else {
            debug!(line, "final stage is a builtin; nothing to wait for");
            return Ok(ExecutionResult::new(String::new(), String::new(), start.elapsed())
                .with_exit_code(0));
        };

        let captured = capture(group.get_mut(last), options.timeout)?;
        drop(group);

        captured.into_result(start.elapsed())
    }

    /// Run independent lines one after another.
    ///
    /// A line starting with `cd ` only moves the tracked working directory.
    /// Output of all executed lines is concatenated; the exit code is the
    /// last executed line's. No piping happens across lines.
    pub fn run_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut ctx = ExecutionContext::from_options(options);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut timed_out = false;
        let mut input = options.input.clone();

        for line in lines {
            let line = line.as_ref().trim();
            if let Some(target) = line.strip_prefix("cd ") {
                ctx.change_dir(Some(target.trim()));
                continue;
            }

            let words = split_words(line)?;
            let Some((program, args)) = words.split_first() else {
                continue;
            };

            let mut process = ctx.process(program, args);
            process
                .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            debug!(line, cwd = ?ctx.cwd(), "running line");
            let mut group = ProcessGroup::default();
            let child = group.spawn(&mut process, program)?;
            if let (Some(stdin), Some(payload)) = (child.stdin.take(), input.take()) {
                feed_input(stdin, payload);
            }

            let captured = capture(group.get_mut(0), options.timeout)?;
            if !captured.stdout.is_empty() {
                stdout.push(RawOutput::Bytes(captured.stdout));
            }
            if !captured.stderr.is_empty() {
                stderr.push(RawOutput::Bytes(captured.stderr));
            }
            exit_code = captured.status.and_then(exit_code_of);
            if captured.timed_out {
                timed_out = true;
                break;
            }
        }

        let stdout = normalize(stdout)?;
        let stderr = normalize(stderr)?;
        let result = if timed_out {
            ExecutionResult::timeout(stdout, stderr, start.elapsed())
        } else {
            ExecutionResult::new(stdout, stderr, start.elapsed())
        };
        Ok(match exit_code {
            Some(code) => result.with_exit_code(code),
            None => result,
        })
    }
}

/// Spawn every process stage left to right, applying `cd`/`export` to the
/// context as they are met. Returns the group index of the final stage's
/// process, or `None` when the final stage is a builtin.
fn spawn_pipeline(
    pipeline: &Pipeline,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    group: &mut ProcessGroup,
) -> Result<Option<usize>> {
    let last = pipeline.len() - 1;
    let mut upstream: Option<ChildStdout> = None;
    let mut final_index = None;

    for (i, stage) in pipeline.iter().enumerate() {
        let feeds_next = pipeline
            .stages
            .get(i + 1)
            .is_some_and(|next| next.reads_previous);
        let previous = upstream.take().filter(|_| stage.reads_previous);

        match stage.command.program() {
            Some("cd") => {
                ctx.change_dir(stage.args().get(1).map(String::as_str));
                debug!(cwd = ?ctx.cwd(), "cd");
                continue;
            }
            Some("export") => {
                ctx.export(&stage.args()[1..]);
                debug!(vars = ?&stage.args()[1..], "export");
                continue;
            }
            _ => {}
        }

        let command: Command = stage.command.expand_first(ctx.env());
        let Some((program, args)) = command.args().split_first() else {
            continue;
        };
        let feed = i == 0 && options.input.is_some();

        let mut process = ctx.process(program, args);
        process.stdin(match previous {
            Some(out) => Stdio::from(out),
            None if feed => Stdio::piped(),
            None => Stdio::null(),
        });
        process.stdout(if i == last || feeds_next {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        process.stderr(if i == last { Stdio::piped() } else { Stdio::null() });

        debug!(stage = i, args = ?command.args(), "spawning stage");
        let child = group.spawn(&mut process, program)?;

        if feed {
            if let (Some(stdin), Some(payload)) = (child.stdin.take(), options.input.clone()) {
                feed_input(stdin, payload);
            }
        }
        if i == last {
            final_index = Some(group.len() - 1);
        } else if feeds_next {
            upstream = child.stdout.take();
        }
    }

    Ok(final_index)
}

/// Every process spawned for one call. Dropping the group kills and reaps
/// all of them, whether the call succeeded, failed or timed out.
#[derive(Default)]
struct ProcessGroup {
    children: Vec<Child>,
}

impl ProcessGroup {
    fn spawn(&mut self, process: &mut std::process::Command, program: &str) -> Result<&mut Child> {
        let child = process.spawn().map_err(|e| {
            FleetShellError::ExecutionFailed(format!("failed to spawn `{program}`: {e}"))
        })?;
        self.children.push(child);
        let index = self.children.len() - 1;
        Ok(&mut self.children[index])
    }

    fn get_mut(&mut self, index: usize) -> &mut Child {
        &mut self.children[index]
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        for child in &mut self.children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
    timed_out: bool,
}

impl Captured {
    fn into_result(self, duration: Duration) -> Result<ExecutionResult> {
        let stdout = normalize(self.stdout)?;
        let stderr = normalize(self.stderr)?;
        if self.timed_out {
            return Ok(ExecutionResult::timeout(stdout, stderr, duration));
        }
        let result = ExecutionResult::new(stdout, stderr, duration);
        Ok(match self.status.and_then(exit_code_of) {
            Some(code) => result.with_exit_code(code),
            None => result,
        })
    }
}

/// Drain a child's output while waiting for it, bounded by `timeout`.
/// On timeout the child is killed and whatever was read is kept.
fn capture(child: &mut Child, timeout: Option<Duration>) -> Result<Captured> {
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = match timeout {
        Some(limit) => child.wait_timeout(limit)?,
        None => Some(child.wait()?),
    };
    let timed_out = status.is_none();
    if timed_out {
        debug!(pid = child.id(), "final stage timed out");
        let _ = child.kill();
        let _ = child.wait();
    }

    Ok(Captured {
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
        status,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Write the payload from a helper thread so a stage that never reads its
/// input cannot stall the call. A closed pipe is not an error.
fn feed_input(mut stdin: ChildStdin, payload: Vec<u8>) {
    std::thread::spawn(move || {
        if let Err(e) = stdin.write_all(&payload) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                debug!(error = %e, "writing stage input failed");
            }
        }
    });
}

fn exit_code_of(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|sig| 128 + sig)
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn run(line: &str) -> ExecutionResult {
        LocalExecutor::new().run_line(line, &RunOptions::new()).unwrap()
    }

    #[test]
    fn test_single_command() {
        let result = run("echo hello");
        assert_eq!(result.stdout, "hello");
        assert!(result.success());
    }

    #[test]
    fn test_only_final_stage_reported() {
        let result = run("echo a; echo b && echo c | grep c");
        assert_eq!(result.stdout, "c");
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn test_cd_then_pwd() {
        assert_eq!(run("cd /tmp; pwd").stdout, "/tmp");
    }

    #[test]
    fn test_export_then_echo() {
        assert_eq!(run("export a=bcd && echo $a").stdout, "bcd");
    }

    #[test]
    fn test_unknown_variable_passed_through() {
        assert_eq!(run("echo $FLEET_SHELL_SURELY_UNSET_VAR").stdout, "$FLEET_SHELL_SURELY_UNSET_VAR");
    }

    #[test]
    fn test_exit_code_and_stderr() {
        let result = run("sh -c 'echo oops >&2; exit 3'");
        assert_eq!(result.stderr, "oops");
        assert_eq!(result.exit_code, Some(3));
        assert!(result.failed());
    }

    #[test]
    fn test_input_to_first_stage() {
        let opts = RunOptions::new().input("hello\n");
        let result = LocalExecutor::new().run_line("cat | tr a-z A-Z", &opts).unwrap();
        assert_eq!(result.stdout, "HELLO");
    }

    #[test]
    fn test_builtin_last_stage() {
        let result = run("echo hi; cd /tmp");
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn test_timeout_yields_partial_result() {
        let opts = RunOptions::new().timeout(Duration::from_millis(200));
        let result = LocalExecutor::new().run_line("sleep 5", &opts).unwrap();
        assert!(result.timed_out);
        assert!(result.exit_code.is_none());
        assert!(result.duration < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let err = LocalExecutor::new()
            .run_line("fleet-shell-no-such-program --x", &RunOptions::new())
            .unwrap_err();
        assert!(matches!(err, FleetShellError::ExecutionFailed(_)));
    }

    #[test]
    fn test_run_lines() {
        let result = LocalExecutor::new()
            .run_lines(&["cd /tmp", "pwd", "echo done"], &RunOptions::new())
            .unwrap();
        assert_eq!(result.stdout, "/tmp\ndone");
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn test_run_lines_keeps_last_exit_code() {
        let result = LocalExecutor::new()
            .run_lines(&["false", "true"], &RunOptions::new())
            .unwrap();
        assert_eq!(result.exit_code, Some(0));

        let result = LocalExecutor::new()
            .run_lines(&["true", "false"], &RunOptions::new())
            .unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.stdout, "");
    }
}
