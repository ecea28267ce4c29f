//! SIGINT handling for the interactive shell.
//!
//! The shell survives Ctrl-C: the handler only records that it fired. The
//! foreground children share the terminal's process group and receive the same
//! signal; they run with the default disposition restored.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the shell's SIGINT handler. Interrupted `read`/`waitpid` calls are
/// restarted.
pub fn install_sigint_handler() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores into an atomic flag.
    unsafe { sigaction(Signal::SIGINT, &action) }.map(drop)
}

/// Whether SIGINT arrived since the last call; clears the flag.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}
