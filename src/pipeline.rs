//! Process orchestration for a parsed pipeline.
//!
//! A pipeline of `k` stages is run in three steps:
//!
//! 1. **Build**: resolve every stage's redirections, look up its program and
//!    allocate `k - 1` pipes. Nothing has been forked yet, so any failure here
//!    leaves no trace besides the descriptors this step already dropped.
//! 2. **Spawn**: fork one child per stage. Each child gets its explicit
//!    redirection if it has one, otherwise the adjacent pipe end, otherwise the
//!    shell's default stream. The parent closes every end it handed over right
//!    after the fork, so each pipe descriptor is closed exactly once.
//! 3. **Wait**: close whatever pipe ends are left, then wait on the spawned
//!    pids, and only those, in stage order.
//!
//! A pipeline consisting of a single builtin skips all of this and runs inside
//! the shell, since `cd`, `export` and `exit` must mutate the shell itself.

use crate::builtin::Builtin;
use crate::command::{EXEC_FAILURE, ExitCode, Pipeline};
use crate::error::ExecError;
use crate::external::Program;
use crate::interpreter::ShellContext;
use crate::io_adapters::{Binding, StdStreams, raw_writer};
use crate::redirect::{self, ResolvedStage};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::stat::fstat;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

/// Descriptor numbers and inode of one allocated pipe, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeRecord {
    pub read: RawFd,
    pub write: RawFd,
    pub inode: u64,
}

/// What happened when a pipeline ran.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Children forked, in stage order. Empty for an in-process builtin.
    pub pids: Vec<Pid>,
    /// Exit status per stage.
    pub statuses: Vec<ExitCode>,
    /// Pipes allocated between stages.
    pub pipes: Vec<PipeRecord>,
}

impl PipelineOutcome {
    fn in_process(status: ExitCode) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    /// The pipeline's status is the status of its last stage.
    pub fn status(&self) -> ExitCode {
        self.statuses.last().copied().unwrap_or(0)
    }
}

/// The `k - 1` pipes of a pipeline. Every end is taken at most once; whatever
/// has not been taken is closed when the set is dropped.
struct PipeSet {
    reads: Vec<Option<OwnedFd>>,
    writes: Vec<Option<OwnedFd>>,
    records: Vec<PipeRecord>,
}

impl PipeSet {
    fn allocate(count: usize) -> Result<Self, ExecError> {
        let mut set = PipeSet {
            reads: Vec::with_capacity(count),
            writes: Vec::with_capacity(count),
            records: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
            let inode = fstat(read.as_raw_fd()).map_or(0, |st| st.st_ino as u64);
            set.records.push(PipeRecord {
                read: read.as_raw_fd(),
                write: write.as_raw_fd(),
                inode,
            });
            set.reads.push(Some(read));
            set.writes.push(Some(write));
        }
        tracing::debug!(pipes = ?set.records, "allocated pipes");
        Ok(set)
    }

    fn take_read(&mut self, index: usize) -> Option<OwnedFd> {
        self.reads.get_mut(index).and_then(Option::take)
    }

    fn take_write(&mut self, index: usize) -> Option<OwnedFd> {
        self.writes.get_mut(index).and_then(Option::take)
    }

    fn open_count(&self) -> usize {
        self.reads
            .iter()
            .chain(self.writes.iter())
            .filter(|fd| fd.is_some())
            .count()
    }

    fn close_all(&mut self) {
        self.reads.iter_mut().for_each(|fd| drop(fd.take()));
        self.writes.iter_mut().for_each(|fd| drop(fd.take()));
    }
}

/// Run `pipeline` to completion and report every stage's status.
///
/// `Err` means the pipeline could not be started (a redirection failed, a pipe
/// or fork could not be created); any child already forked has been reaped.
pub fn run_pipeline(
    pipeline: &Pipeline,
    ctx: &mut ShellContext,
    streams: &StdStreams,
) -> Result<PipelineOutcome, ExecError> {
    if pipeline.is_empty() {
        return Ok(PipelineOutcome::default());
    }

    let mut stages = pipeline
        .stages
        .iter()
        .map(|stage| redirect::resolve(stage, &ctx.env))
        .collect::<Result<Vec<_>, _>>()?;

    if stages.len() == 1 {
        let stage = stages.remove(0);
        if stage.argv.is_empty() {
            // Redirections only: files were opened (and created) above.
            return Ok(PipelineOutcome::in_process(0));
        }
        if let Some(builtin) = stage.command_name().and_then(Builtin::lookup) {
            return run_in_process(builtin, stage, ctx, streams);
        }
        stages.push(stage);
    }

    if let Some(index) = stages.iter().position(|s| s.argv.is_empty()) {
        return Err(ExecError::MissingCommand(index + 1));
    }

    let envp = ctx.env.envp();
    let programs = stages
        .iter_mut()
        .map(|stage| Program::prepare(std::mem::take(&mut stage.argv), &ctx.env))
        .collect::<Result<Vec<_>, _>>()?;
    let mut pipes = PipeSet::allocate(stages.len() - 1)?;

    let mut outcome = PipelineOutcome {
        pipes: pipes.records.clone(),
        ..Default::default()
    };
    let spawned = spawn_all(stages, &programs, &envp, &mut pipes, ctx, streams, &mut outcome.pids);
    pipes.close_all();
    debug_assert_eq!(pipes.open_count(), 0);
    outcome.statuses = outcome.pids.iter().map(|&pid| wait_for(pid)).collect();
    tracing::debug!(pids = ?outcome.pids, statuses = ?outcome.statuses, "pipeline finished");
    spawned?;
    Ok(outcome)
}

fn run_in_process(
    builtin: Builtin,
    stage: ResolvedStage,
    ctx: &mut ShellContext,
    streams: &StdStreams,
) -> Result<PipelineOutcome, ExecError> {
    let ResolvedStage { argv, input, output } = stage;
    drop(input);
    let mut stdout: Box<dyn Write> = match output {
        Some(file) => Box::new(file),
        None => streams.writer()?,
    };
    let status = builtin.run(&argv, &mut stdout, &mut io::stderr(), ctx);
    Ok(PipelineOutcome::in_process(status))
}

fn spawn_all(
    stages: Vec<ResolvedStage>,
    programs: &[Program],
    envp: &[CString],
    pipes: &mut PipeSet,
    ctx: &mut ShellContext,
    streams: &StdStreams,
    pids: &mut Vec<Pid>,
) -> Result<(), ExecError> {
    let last = stages.len() - 1;
    for (index, (stage, program)) in stages.into_iter().zip(programs).enumerate() {
        let pipe_in = if index > 0 { pipes.take_read(index - 1) } else { None };
        let pipe_out = if index < last { pipes.take_write(index) } else { None };
        let input = match (stage.input, pipe_in) {
            (Some(file), _) => Binding::from(file),
            (None, Some(fd)) => Binding::from(fd),
            (None, None) => streams.stdin_binding()?,
        };
        let output = match (stage.output, pipe_out) {
            (Some(file), _) => Binding::from(file),
            (None, Some(fd)) => Binding::from(fd),
            (None, None) => streams.stdout_binding()?,
        };
        let pid = spawn_stage(index, program, input, output, envp, pipes, ctx)?;
        pids.push(pid);
    }
    Ok(())
}

fn spawn_stage(
    index: usize,
    program: &Program,
    input: Binding,
    output: Binding,
    envp: &[CString],
    pipes: &mut PipeSet,
    ctx: &mut ShellContext,
) -> Result<Pid, ExecError> {
    #[cfg(test)]
    if fault::FAIL_FORK_AT.get() == Some(index) {
        return Err(ExecError::Fork(Errno::EAGAIN));
    }
    // SAFETY: the child only rebinds descriptors, then execs or runs a builtin,
    // and always leaves through `_exit` without returning to the caller.
    match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
        ForkResult::Parent { child } => {
            tracing::debug!(stage = index, pid = %child, program = program.name(), "spawned");
            #[cfg(test)]
            fault::SPAWNED.with_borrow_mut(|pids| pids.push(child));
            drop(input);
            drop(output);
            Ok(child)
        }
        ForkResult::Child => enter_child(program, input, output, envp, pipes, ctx),
    }
}

fn enter_child(
    program: &Program,
    input: Binding,
    output: Binding,
    envp: &[CString],
    pipes: &mut PipeSet,
    ctx: &mut ShellContext,
) -> ! {
    let mut stderr = raw_writer(io::stderr().as_fd());
    for sig in [Signal::SIGINT, Signal::SIGPIPE] {
        // SAFETY: restoring the default disposition installs no handler.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }

    let bound = input
        .install(libc::STDIN_FILENO)
        .and_then(|()| output.install(libc::STDOUT_FILENO));
    if let Err(errno) = bound {
        let _ = writeln!(stderr, "{}: {}", program.name(), errno.desc());
        exit_child(EXEC_FAILURE);
    }
    pipes.close_all();

    let code = match program {
        Program::External { name, path, argv } => match unistd::execve(path, argv, envp) {
            Ok(never) => match never {},
            Err(errno) => {
                let _ = writeln!(stderr, "{name}: {}", errno.desc());
                EXEC_FAILURE
            }
        },
        Program::NotFound { name } => {
            let _ = writeln!(stderr, "{name}: command not found");
            EXEC_FAILURE
        }
        Program::Builtin { builtin, argv } => {
            let mut stdout = raw_writer(io::stdout().as_fd());
            builtin.run(argv, &mut stdout, &mut stderr, ctx)
        }
    };
    exit_child(code)
}

/// Terminate a forked child without running exit handlers or flushing stdio
/// buffers inherited from the shell.
fn exit_child(code: ExitCode) -> ! {
    // SAFETY: `_exit` only ends the calling process.
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod fault {
    use nix::unistd::Pid;
    use std::cell::{Cell, RefCell};

    thread_local! {
        /// Stage whose fork is made to fail.
        pub(super) static FAIL_FORK_AT: Cell<Option<usize>> = const { Cell::new(None) };
        /// Every child forked on this thread.
        pub(super) static SPAWNED: RefCell<Vec<Pid>> = const { RefCell::new(Vec::new()) };
    }
}

/// Block until `pid` terminates. A child killed by a signal reports `128 + signal`.
fn wait_for(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
            Ok(status) => tracing::debug!(?status, "child still running"),
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                tracing::warn!(%pid, %errno, "waitpid failed");
                return EXEC_FAILURE;
            }
        }
    }
}
