use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use thiserror::Error;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const WAIT_SLICE: Duration = Duration::from_millis(100);
const STDIN_POLL_MS: libc::c_int = 250;

#[derive(Debug, Clone, Copy, Error)]
#[error("interrupted")]
pub(crate) struct Interrupted;

/// Blocking pause that an interrupt can cut short.
pub(crate) trait Waiter {
    fn wait(&self, duration: Duration) -> Result<(), Interrupted>;
    fn interrupted(&self) -> bool;
}

extern "C" fn on_signal(_signum: libc::c_int) {
    // Second Ctrl-C while shutting down exits without cleanup.
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        unsafe { libc::_exit(130) };
    }
}

/// Routes SIGINT and SIGTERM into the process-wide interrupt flag.
pub(crate) fn install_handlers() -> Result<Interrupt> {
    for signum in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            if libc::sigaction(signum, &action, std::ptr::null_mut()) != 0 {
                return Err(anyhow!(
                    "failed to install handler for signal {signum}: {}",
                    io::Error::last_os_error()
                ));
            }
        }
    }
    Ok(Interrupt::process())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Interrupt {
    flag: &'static AtomicBool,
}

impl Interrupt {
    fn process() -> Self {
        Self { flag: &INTERRUPTED }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            flag: Box::leak(Box::new(AtomicBool::new(false))),
        }
    }

    #[cfg(test)]
    pub(crate) fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Waiter for Interrupt {
    fn wait(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_set() {
                return Err(Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }

    fn interrupted(&self) -> bool {
        self.is_set()
    }
}

/// Stdin reader that reports end-of-stream once an interrupt is observed,
/// so a dispatcher blocked on input still reaches the shutdown path.
pub(crate) struct InterruptibleStdin {
    interrupt: Interrupt,
}

impl InterruptibleStdin {
    pub(crate) fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

impl Read for InterruptibleStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.interrupt.is_set() {
                return Ok(0);
            }
            let mut pfd = libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&mut pfd, 1, STDIN_POLL_MS) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if ready == 0 {
                continue;
            }
            let read =
                unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
            if read < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            return Ok(read as usize);
        }
    }
}
