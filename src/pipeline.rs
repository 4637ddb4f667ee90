//! Process orchestration for parsed pipelines.
//!
//! A lone builtin runs inside the shell process with its output streams
//! pointed at the stage's redirection targets. Everything else is spawned
//! with `fork`: each stage gets its own process, stages are chained with
//! pipes, and the shell waits for all of them before returning.

use crate::command::{Context, ExitCode};
use crate::external;
use crate::io_adapters::{self, Sink};
use crate::parser::{Pipeline, Redirection, Stage};
use anyhow::{Context as _, Result};
use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

/// Exit status reported for a stage that could not be started at all.
const SPAWN_FAILED: ExitCode = 1;

/// What running one pipeline produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Set when an in-process `exit` ran.
    pub should_exit: bool,
    /// Exit status of every stage that was started, in stage order.
    pub statuses: Vec<ExitCode>,
}

impl PipelineOutcome {
    fn failed() -> Self {
        Self {
            should_exit: false,
            statuses: vec![SPAWN_FAILED],
        }
    }

    /// Status of the last stage, the conventional status of a pipeline.
    pub fn status(&self) -> Option<ExitCode> {
        self.statuses.last().copied()
    }
}

/// Descriptors a child binds to its standard streams; `None` keeps the inherited one.
#[derive(Debug, Default)]
struct StageIo {
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
    stderr: Option<OwnedFd>,
}

impl StageIo {
    /// Duplicate every descriptor onto its standard slot and close the original.
    fn rebind(self) -> nix::Result<()> {
        let slots = [
            (self.stdin, libc::STDIN_FILENO),
            (self.stdout, libc::STDOUT_FILENO),
            (self.stderr, libc::STDERR_FILENO),
        ];
        for (fd, slot) in slots {
            let Some(fd) = fd else {
                continue;
            };
            if fd.as_raw_fd() == slot {
                // Already in place; dropping it would close the slot.
                let _: RawFd = fd.into_raw_fd();
                continue;
            }
            unistd::dup2(fd.as_raw_fd(), slot)?;
        }
        Ok(())
    }
}

/// Run `pipeline` to completion.
pub fn execute(pipeline: &Pipeline, ctx: &mut Context<'_>) -> PipelineOutcome {
    if let [stage] = pipeline.stages.as_slice() {
        if ctx.builtins.contains(&stage.name) {
            return run_builtin_in_place(stage, ctx);
        }
    }
    spawn_pipeline(pipeline, ctx)
}

fn report(err: &anyhow::Error) {
    warn!("{:#}", err);
    eprintln!("tinysh: {:#}", err);
}

fn run_builtin_in_place(stage: &Stage, ctx: &mut Context<'_>) -> PipelineOutcome {
    let sinks = open_sink(stage.redirections.stdout.as_ref(), Sink::stdout).and_then(|out| {
        open_sink(stage.redirections.stderr.as_ref(), Sink::stderr).map(|err| (out, err))
    });
    let (mut stdout, mut stderr) = match sinks {
        Ok(sinks) => sinks,
        Err(e) => {
            report(&e);
            return PipelineOutcome::failed();
        }
    };

    let status = run_builtin(stage, &mut stdout, &mut stderr, ctx);
    debug!("builtin {} finished with status {}", stage.name, status);
    PipelineOutcome {
        should_exit: std::mem::take(&mut ctx.env.should_exit),
        statuses: vec![status],
    }
}

fn open_sink(
    redirection: Option<&Redirection>,
    open: fn(Option<&Redirection>) -> io::Result<Sink>,
) -> Result<Sink> {
    open(redirection).with_context(|| {
        redirection.map_or_else(|| "standard stream".to_string(), |r| r.path.clone())
    })
}

fn run_builtin(
    stage: &Stage,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    ctx: &mut Context<'_>,
) -> ExitCode {
    let args: Vec<&str> = stage.args.iter().map(String::as_str).collect();
    let Some(cmd) = ctx.builtins.create(&stage.name, &args) else {
        return external::NOT_FOUND;
    };
    let status = cmd.execute(stdout, stderr, ctx).unwrap_or_else(|e| {
        let _ = writeln!(stderr, "{}: {:#}", stage.name, e);
        1
    });
    let _ = stdout.flush();
    let _ = stderr.flush();
    status
}

/// Open every redirection target of the pipeline up front.
///
/// The stdout of a non-final stage is its pipe, so its stdout redirection is
/// never opened.
fn open_redirections(pipeline: &Pipeline) -> Result<Vec<StageIo>> {
    let last = pipeline.stages.len() - 1;
    pipeline
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let stdout = match &stage.redirections.stdout {
                Some(r) if i == last => Some(open_fd(r)?),
                Some(r) => {
                    debug!("stage {} writes to a pipe; ignoring > {}", i, r.path);
                    None
                }
                None => None,
            };
            let stderr = stage.redirections.stderr.as_ref().map(open_fd).transpose()?;
            Ok(StageIo {
                stdin: None,
                stdout,
                stderr,
            })
        })
        .collect()
}

fn open_fd(redirection: &Redirection) -> Result<OwnedFd> {
    io_adapters::open_target(redirection)
        .map(OwnedFd::from)
        .with_context(|| redirection.path.clone())
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

fn spawn_pipeline(pipeline: &Pipeline, ctx: &mut Context<'_>) -> PipelineOutcome {
    let stage_io = match open_redirections(pipeline) {
        Ok(stage_io) => stage_io,
        Err(e) => {
            report(&e);
            return PipelineOutcome::failed();
        }
    };

    // Anything still buffered would otherwise be written again by every child.
    flush_std_streams();

    let last = pipeline.stages.len() - 1;
    let mut children: Vec<Pid> = Vec::with_capacity(pipeline.stages.len());
    let mut upstream: Option<OwnedFd> = None;

    for (i, (stage, mut stage_io)) in pipeline.stages.iter().zip(stage_io).enumerate() {
        stage_io.stdin = upstream.take();
        let mut downstream: Option<OwnedFd> = None;
        if i < last {
            match unistd::pipe2(OFlag::O_CLOEXEC) {
                Ok((read, write)) => {
                    stage_io.stdout = Some(write);
                    downstream = Some(read);
                }
                Err(e) => {
                    report(&anyhow::Error::new(e).context("cannot create pipe"));
                    break;
                }
            }
        }

        // SAFETY: the shell is single-threaded; the child only rebinds
        // descriptors and then either execs or runs a builtin and exits.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                drop(downstream);
                let status = run_child(stage, stage_io, ctx);
                // SAFETY: leaving the child without running the parent's exit
                // handlers or flushing buffers it inherited is the intent here.
                unsafe { libc::_exit(status) }
            }
            Ok(ForkResult::Parent { child }) => {
                debug!("stage {} ({}) started as pid {}", i, stage.name, child);
                children.push(child);
                // The child owns its ends now; keeping the write end open here
                // would stop the next stage from ever seeing end of input.
                drop(stage_io);
                upstream = downstream;
            }
            Err(e) => {
                report(&anyhow::Error::new(e).context(format!("cannot start {}", stage.name)));
                break;
            }
        }
    }
    drop(upstream);

    let statuses: Vec<ExitCode> = children.into_iter().map(reap).collect();
    debug!("pipeline finished with statuses {:?}", statuses);
    PipelineOutcome {
        should_exit: false,
        statuses,
    }
}

/// Body of a forked stage. The returned status becomes the process exit code.
fn run_child(stage: &Stage, stage_io: StageIo, ctx: &mut Context<'_>) -> ExitCode {
    // Rust ignores SIGPIPE at startup and exec keeps ignored signals ignored.
    // SAFETY: restoring the default disposition installs no handler code.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
    if let Err(e) = stage_io.rebind() {
        eprintln!("tinysh: {}: cannot set up streams: {}", stage.name, e.desc());
        return SPAWN_FAILED;
    }
    if ctx.builtins.contains(&stage.name) {
        run_builtin(stage, &mut io::stdout(), &mut io::stderr(), ctx)
    } else {
        external::exec(ctx.env, &stage.name, &stage.args)
    }
}

fn reap(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    debug!("pid {} exited with {}", pid, code);
                    return code;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("waitpid({}) failed: {}", pid, e);
                return -1;
            }
        }
    }
}

/// Shell-style exit code of a terminated child; `None` while it is still running.
fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}
