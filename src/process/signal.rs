#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

/// Signals every process in the group led by `pgid`. Returns whether the
/// signal was delivered.
pub fn signal_process_group(pgid: u32, signal: Signal) -> bool {
    if pgid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal as NixSignal};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pgid) else {
            return false;
        };
        let nix_signal = match signal {
            Signal::Term => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
        };
        match killpg(Pid::from_raw(raw), nix_signal) {
            Ok(()) => true,
            Err(errno) => {
                tracing::debug!(pgid, ?signal, %errno, "process group signal not delivered");
                false
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal;
        false
    }
}

/// Whether a process with `pid` exists (a zombie still counts).
pub fn process_exists(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal as NixSignal};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(raw), None::<NixSignal>) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        false
    }
}
