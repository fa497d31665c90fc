//! Keypad and display seams, plus terminal adapters.

use std::{collections::VecDeque, io};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use crate::{key::Key, screen::Screen};

/// Blocking single-key input.
#[async_trait]
pub trait Keypad: Send {
    /// Wait for the next key. `None` once input is exhausted.
    async fn next_key(&mut self) -> io::Result<Option<Key>>;
}

/// Fire-and-forget two-row display.
pub trait Display: Send {
    /// Clear and draw `screen`.
    fn show(&mut self, screen: &Screen);
}

/// Keypad reading characters from a line-buffered stream such as stdin.
///
/// Every character of a line is a key press, and the line end is the confirm
/// key.
pub struct TerminalKeypad<R> {
    lines: Lines<BufReader<R>>,
    pending: VecDeque<Key>,
}

impl<R: AsyncRead + Unpin + Send> TerminalKeypad<R> {
    /// Keypad over `reader`.
    pub fn new(reader: R) -> Self {
        Self { lines: BufReader::new(reader).lines(), pending: VecDeque::new() }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Keypad for TerminalKeypad<R> {
    async fn next_key(&mut self) -> io::Result<Option<Key>> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                return Ok(Some(key));
            }
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.pending.extend(line.chars().filter(|c| !c.is_whitespace()).map(Key::from_char));
            self.pending.push_back(Key::Enter);
        }
    }
}

/// Display writing each frame as two lines to a writer.
pub struct TerminalDisplay<W> {
    out: W,
}

impl<W: io::Write + Send> TerminalDisplay<W> {
    /// Display writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: io::Write + Send> Display for TerminalDisplay<W> {
    fn show(&mut self, screen: &Screen) {
        let (top, bottom) = screen.rows();
        let result = writeln!(self.out, "+----------------+\n|{top:<16}|\n|{bottom:<16}|\n+----------------+")
            .and_then(|()| self.out.flush());
        if let Err(err) = result {
            tracing::warn!(error = %err, "display write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use latchkey_proto::Digit;

    use super::*;

    #[tokio::test]
    async fn terminal_keypad_splits_lines_into_keys() {
        let input: &[u8] = b"12\n+\n";
        let mut keypad = TerminalKeypad::new(input);

        let mut keys = Vec::new();
        while let Some(key) = keypad.next_key().await.expect("read") {
            keys.push(key);
        }
        assert_eq!(keys, vec![
            Key::Digit(Digit::new(1).expect("1")),
            Key::Digit(Digit::new(2).expect("2")),
            Key::Enter,
            Key::Plus,
            Key::Enter,
        ]);
    }

    #[test]
    fn terminal_display_draws_both_rows() {
        let mut out = Vec::new();
        TerminalDisplay::new(&mut out).show(&Screen::Menu);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("|+ : Open Door   |"));
        assert!(text.contains("|- : Change Pass |"));
    }
}
