// SPDX-License-Identifier: GPL-3.0-only

//! Interactive keys and OS signals turned into capture commands
//!
//! Signal handlers only ever store the signal number in a single atomic
//! word. [`ControlSignals::poll`] swaps it back to zero, so each signal is
//! acted on exactly once.

use std::io::{BufRead, BufReader, Stdin};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, warn};

/// What the user asked for since the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    None,
    /// Start a new output segment
    SplitOutput,
    /// End the recording
    Quit,
}

/// Last signal received, written from signal context
#[derive(Debug)]
pub struct SignalCell(AtomicI32);

impl SignalCell {
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Async-signal-safe: a single atomic store
    pub fn record(&self, signum: i32) {
        self.0.store(signum, Ordering::SeqCst);
    }

    /// Consume the pending signal, if any
    pub fn take(&self) -> Option<i32> {
        match self.0.swap(0, Ordering::SeqCst) {
            0 => None,
            signum => Some(signum),
        }
    }

    pub fn peek(&self) -> Option<i32> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            signum => Some(signum),
        }
    }
}

impl Default for SignalCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide cell the installed handlers write to
pub static PENDING_SIGNAL: SignalCell = SignalCell::new();

extern "C" fn on_signal(signum: libc::c_int) {
    PENDING_SIGNAL.record(signum);
}

/// Route SIGINT (always) and SIGUSR1/SIGUSR2 (signal mode only) into
/// [`PENDING_SIGNAL`]
pub fn install_signal_handlers(signal_mode: bool) -> std::io::Result<()> {
    ctrlc::set_handler(|| PENDING_SIGNAL.record(libc::SIGINT))
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    if signal_mode {
        for signum in [libc::SIGUSR1, libc::SIGUSR2] {
            let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            // SAFETY: the handler performs a single atomic store, which is
            // async-signal-safe.
            let previous = unsafe { libc::signal(signum, handler) };
            if previous == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error());
            }
        }
        debug!("SIGUSR1 splits output, SIGUSR2 stops recording");
    }

    Ok(())
}

/// Non-blocking source of interactive keys
pub trait KeySource {
    /// The first character of a pending input line, or `None` if nothing is
    /// ready. Must never block.
    fn poll_key(&mut self) -> Option<char>;
}

/// Keys typed on standard input, one line at a time
///
/// Any readable descriptor works; `fd` is probed for readiness and `reader`
/// is read from once it is ready. End of input or a read error turns key
/// polling off for the rest of the session.
#[derive(Debug)]
pub struct StdinKeys<R = BufReader<Stdin>> {
    fd: RawFd,
    reader: R,
    exhausted: bool,
}

impl StdinKeys {
    pub fn new() -> Self {
        Self::from_reader(libc::STDIN_FILENO, BufReader::new(std::io::stdin()))
    }
}

impl Default for StdinKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead> StdinKeys<R> {
    /// Read keys from `reader`, probing `fd` for pending input
    pub fn from_reader(fd: RawFd, reader: R) -> Self {
        Self {
            fd,
            reader,
            exhausted: false,
        }
    }

    /// True once input has ended or failed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn input_ready(&self) -> bool {
        let mut fds = [libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        }];
        // SAFETY: `fds` is a valid array of one pollfd for the duration of
        // the call; a zero timeout never blocks.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), 1, 0) };
        ready > 0 && fds[0].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
    }
}

impl<R: BufRead> KeySource for StdinKeys<R> {
    fn poll_key(&mut self) -> Option<char> {
        if self.exhausted || !self.input_ready() {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                debug!("End of keyboard input");
                self.exhausted = true;
                None
            }
            Ok(_) => line.chars().next(),
            Err(e) => {
                warn!(error = %e, "Failed to read keyboard input, ignoring keys");
                self.exhausted = true;
                None
            }
        }
    }
}

/// Maps pending keys and signals to a [`Command`]
pub struct ControlSignals {
    keypress: bool,
    signal_mode: bool,
    cell: &'static SignalCell,
    keys: Option<Box<dyn KeySource>>,
}

impl ControlSignals {
    /// Reads [`PENDING_SIGNAL`] and, with `keypress`, standard input
    pub fn new(keypress: bool, signal_mode: bool) -> Self {
        let keys: Option<Box<dyn KeySource>> = if keypress {
            Some(Box::new(StdinKeys::new()))
        } else {
            None
        };
        Self {
            keypress,
            signal_mode,
            cell: &PENDING_SIGNAL,
            keys,
        }
    }

    /// Neither keys nor signal mode; SIGINT is still honoured
    pub fn disabled() -> Self {
        Self::new(false, false)
    }

    pub fn with_cell(mut self, cell: &'static SignalCell) -> Self {
        self.cell = cell;
        self
    }

    pub fn with_keys(mut self, keys: Box<dyn KeySource>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Non-blocking; consumes at most one key and one signal
    pub fn poll(&mut self) -> Command {
        let signal = self.cell.take();
        if signal == Some(libc::SIGINT) {
            debug!("Consumed SIGINT");
            return Command::Quit;
        }

        let mut command = Command::None;
        if self.keypress
            && let Some(key) = self.keys.as_mut().and_then(|keys| keys.poll_key())
        {
            command = command_for_key(key);
        }

        if let Some(signum) = signal {
            if !self.signal_mode {
                debug!(signal = signum, "Ignoring signal outside signal mode");
            } else if signum == libc::SIGUSR1 {
                debug!("Consumed SIGUSR1");
                command = Command::SplitOutput;
            } else if signum == libc::SIGUSR2 {
                debug!("Consumed SIGUSR2");
                command = Command::Quit;
            }
        }

        command
    }
}

fn command_for_key(key: char) -> Command {
    match key {
        '\n' => Command::SplitOutput,
        'x' | 'X' | 'q' | 'Q' => Command::Quit,
        _ => Command::None,
    }
}
