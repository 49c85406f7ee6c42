//! Operator key input.
//!
//! Keys are read unbuffered from the controlling terminal: canonical mode and
//! echo are switched off for the lifetime of [`KeyReader`] and restored on
//! drop. Signal generation stays on, so Ctrl+C still reaches the interrupt
//! handler. Without a terminal on stdin no keys are read.

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd;
use std::io::{self, IsTerminal, Stdin};
use std::os::fd::{AsFd, BorrowedFd};
use tracing::{debug, warn};

const ESC: u8 = 0x1b;

/// An operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// `Q`, `q` or a lone Escape.
    Stop,
    /// `V` or `v`.
    ToggleDashboard,
}

/// Decode the first command in one read's worth of input.
///
/// An Escape followed by more bytes starts an escape sequence (arrow keys,
/// function keys) and ends decoding.
pub fn decode(bytes: &[u8]) -> Option<Key> {
    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'q' | b'Q' => return Some(Key::Stop),
            b'v' | b'V' => return Some(Key::ToggleDashboard),
            ESC if i + 1 == bytes.len() => return Some(Key::Stop),
            ESC => return None,
            _ => {}
        }
    }
    None
}

/// Restores the saved terminal settings on drop.
struct RawMode {
    saved: Termios,
}

impl RawMode {
    fn enable(stdin: &Stdin) -> nix::Result<Self> {
        let saved = termios::tcgetattr(stdin.as_fd())?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;
        Ok(Self { saved })
    }

    fn restore(&self, stdin: &Stdin) {
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.saved) {
            warn!("Failed to restore terminal settings: {}", e);
        }
    }
}

/// Polls stdin for operator keys.
pub struct KeyReader {
    stdin: Stdin,
    raw: Option<RawMode>,
}

impl KeyReader {
    /// Open the reader, or `None` when stdin is not a terminal.
    pub fn open() -> Option<Self> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            debug!("stdin is not a terminal; console keys disabled");
            return None;
        }
        let raw = match RawMode::enable(&stdin) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Cannot switch terminal to unbuffered input: {}", e);
                None
            }
        };
        Some(Self { stdin, raw })
    }

    /// Wait up to `timeout_ms` for a key.
    ///
    /// # Errors
    /// `UnexpectedEof` once stdin is closed, or the underlying poll/read
    /// failure.
    pub fn poll_key(&mut self, timeout_ms: u16) -> io::Result<Option<Key>> {
        read_key(self.stdin.as_fd(), timeout_ms)
    }

    /// Discard everything already typed.
    pub fn drain(&mut self) {
        drain_fd(self.stdin.as_fd());
    }
}

// Reads bypass `Stdin`'s buffer: bytes left in userspace are invisible to
// `poll`.
fn read_key(fd: BorrowedFd<'_>, timeout_ms: u16) -> io::Result<Option<Key>> {
    if !wait_readable(fd, PollTimeout::from(timeout_ms))? {
        return Ok(None);
    }
    let mut buf = [0u8; 64];
    let n = unistd::read(fd, &mut buf).map_err(io::Error::from)?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(decode(&buf[..n]))
}

fn drain_fd(fd: BorrowedFd<'_>) {
    let mut buf = [0u8; 64];
    while matches!(wait_readable(fd, PollTimeout::ZERO), Ok(true)) {
        match unistd::read(fd, &mut buf) {
            Ok(n) if n > 0 => {}
            _ => break,
        }
    }
}

fn wait_readable(fd: BorrowedFd<'_>, timeout: PollTimeout) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    let ready = poll(&mut fds, timeout).map_err(io::Error::from)?;
    Ok(ready > 0)
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            raw.restore(&self.stdin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operator_keys() {
        assert_eq!(decode(b"q"), Some(Key::Stop));
        assert_eq!(decode(b"Q"), Some(Key::Stop));
        assert_eq!(decode(b"v"), Some(Key::ToggleDashboard));
        assert_eq!(decode(b"V"), Some(Key::ToggleDashboard));
        assert_eq!(decode(b"x"), None);
        assert_eq!(decode(b""), None);
    }

    #[test]
    fn first_command_wins() {
        assert_eq!(decode(b"xvq"), Some(Key::ToggleDashboard));
        assert_eq!(decode(b"aQv"), Some(Key::Stop));
    }

    #[test]
    fn lone_escape_stops() {
        assert_eq!(decode(&[ESC]), Some(Key::Stop));
        assert_eq!(decode(&[b'x', ESC]), Some(Key::Stop));
    }

    #[test]
    fn drain_empties_long_bursts() {
        let (rx, tx) = unistd::pipe().unwrap();
        unistd::write(&tx, &[b'x'; 200]).unwrap();
        unistd::write(&tx, b"vq").unwrap();

        drain_fd(rx.as_fd());
        assert!(!wait_readable(rx.as_fd(), PollTimeout::ZERO).unwrap());
        assert_eq!(read_key(rx.as_fd(), 0).unwrap(), None);
    }

    #[test]
    fn keys_read_from_fd() {
        let (rx, tx) = unistd::pipe().unwrap();
        unistd::write(&tx, b"xV").unwrap();
        assert_eq!(read_key(rx.as_fd(), 10).unwrap(), Some(Key::ToggleDashboard));

        drop(tx);
        let err = read_key(rx.as_fd(), 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn escape_sequences_are_ignored() {
        // Up arrow, then F1.
        assert_eq!(decode(b"\x1b[A"), None);
        assert_eq!(decode(b"\x1bOP"), None);
        assert_eq!(decode(b"\x1b[Aq"), None);
    }
}
