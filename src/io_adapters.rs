use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd::dup2;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};

/// The stream a stage's standard input or output is bound to.
#[derive(Debug)]
pub enum Binding {
    /// The process's own stream is left in place.
    Inherit,
    /// A pipe end, a redirection file, or a copy of an overridden default stream.
    Fd(OwnedFd),
}

impl From<File> for Binding {
    fn from(file: File) -> Self {
        Binding::Fd(file.into())
    }
}

impl From<OwnedFd> for Binding {
    fn from(fd: OwnedFd) -> Self {
        Binding::Fd(fd)
    }
}

impl Binding {
    /// Make this binding the descriptor `target` of the calling process.
    ///
    /// The original descriptor is closed; the installed one survives `exec`.
    pub(crate) fn install(self, target: RawFd) -> nix::Result<()> {
        let Binding::Fd(fd) = self else {
            return Ok(());
        };
        if fd.as_raw_fd() == target {
            fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
            let _ = fd.into_raw_fd();
            return Ok(());
        }
        dup2(fd.as_raw_fd(), target)?;
        Ok(())
    }

    /// Writer for output produced inside the shell process.
    pub fn into_writer(self) -> Box<dyn Write> {
        match self {
            Binding::Inherit => Box::new(io::stdout()),
            Binding::Fd(fd) => Box::new(File::from(fd)),
        }
    }
}

/// An owned, unbuffered writer on a duplicate of `fd`.
///
/// Used in forked children, where the buffered global handles of `std::io` must
/// not be relied upon.
pub(crate) fn raw_writer(fd: BorrowedFd<'_>) -> Box<dyn Write> {
    match fd.try_clone_to_owned() {
        Ok(owned) => Box::new(File::from(owned)),
        Err(_) => Box::new(io::sink()),
    }
}

/// The shell's default standard input and output.
///
/// By default both are the process's own streams. An embedder may replace
/// either with any descriptor; every stage bound to a default receives its
/// own duplicate, so the original stays owned here.
#[derive(Debug, Default)]
pub struct StdStreams {
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
}

impl StdStreams {
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn with_stdin(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.stdin = Some(fd.into());
        self
    }

    pub fn with_stdout(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.stdout = Some(fd.into());
        self
    }

    pub fn stdin_binding(&self) -> io::Result<Binding> {
        duplicate(self.stdin.as_ref())
    }

    pub fn stdout_binding(&self) -> io::Result<Binding> {
        duplicate(self.stdout.as_ref())
    }

    /// Writer for the shell's own output (builtins, recall echo).
    pub fn writer(&self) -> io::Result<Box<dyn Write>> {
        Ok(self.stdout_binding()?.into_writer())
    }
}

fn duplicate(fd: Option<&OwnedFd>) -> io::Result<Binding> {
    match fd {
        Some(fd) => Ok(Binding::Fd(fd.as_fd().try_clone_to_owned()?)),
        None => Ok(Binding::Inherit),
    }
}
