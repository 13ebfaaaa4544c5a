//! Terminal side of a conversation: raw key input, the one-line input buffer, and the transcript
//! printed above it.
//!
//! The event loop only talks to the [`Frontend`] trait, so it can be driven without a terminal.

use std::io::{self, BufRead, Stdout, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode, ClearType};
use futures::StreamExt;
use tracing::debug;

use crate::handshake::Prompt;
use crate::message::MAX_BODY_LEN;
use crate::PROGRAM;

/// What a keystroke (or the end of input) means to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Ctrl+C, Ctrl+D, or end of input.
    Quit,
    /// The input line changed and should be redrawn.
    Edit,
    /// Enter was pressed; carries the current input line, which may be empty.
    Submit(String),
}

/// Input source and output sink of the event loop.
#[allow(async_fn_in_trait)]
pub trait Frontend {
    /// Wait for the next input event. Must be cancel safe: the event loop drops the future whenever
    /// another source becomes ready first.
    async fn next_input(&mut self) -> io::Result<InputEvent>;

    /// Print `from: body` above the input line.
    fn show_message(&mut self, from: &str, body: &str) -> io::Result<()>;

    /// Print a program-prefixed notice above the input line.
    fn notice(&mut self, text: &str) -> io::Result<()>;

    /// Repaint the input line.
    fn redraw(&mut self) -> io::Result<()>;

    /// Erase and empty the input line.
    fn clear_line(&mut self) -> io::Result<()>;

    /// Leave whatever was typed on screen, move past it and empty the buffer.
    fn finalize_line(&mut self) -> io::Result<()>;
}

/// The input buffer, edited one key at a time.
#[derive(Debug, Default)]
pub struct LineEditor {
    buf: String,
}

impl LineEditor {
    pub fn new() -> LineEditor {
        LineEditor::default()
    }

    pub fn line(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Apply one key. Keys that change nothing visible return `None`.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<InputEvent> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(InputEvent::Quit),
            KeyCode::Char('h') | KeyCode::Char('w') if ctrl => {
                self.delete_word();
                Some(InputEvent::Edit)
            }
            KeyCode::Backspace if ctrl || alt => {
                self.delete_word();
                Some(InputEvent::Edit)
            }
            KeyCode::Backspace => {
                self.buf.pop();
                Some(InputEvent::Edit)
            }
            KeyCode::Enter => Some(InputEvent::Submit(self.buf.clone())),
            KeyCode::Char(c) if !ctrl && !alt && !c.is_control() => {
                if self.buf.len() + c.len_utf8() > MAX_BODY_LEN {
                    return None;
                }
                self.buf.push(c);
                Some(InputEvent::Edit)
            }
            _ => None,
        }
    }

    /// Remove characters back to (but not including) the previous space.
    fn delete_word(&mut self) {
        while self.buf.pop().is_some() {
            if self.buf.is_empty() || self.buf.ends_with(' ') {
                break;
            }
        }
    }

    /// The end of the line that fits in `width` columns, leaving one for the cursor.
    pub fn visible_tail(&self, width: u16) -> &str {
        let room = usize::from(width.saturating_sub(1));
        let len = self.buf.chars().count();
        if len <= room {
            return &self.buf;
        }
        match self.buf.char_indices().nth(len - room) {
            Some((start, _)) => &self.buf[start..],
            None => "",
        }
    }
}

/// Keeps the terminal in raw mode until dropped.
///
/// Dropping restores the previous mode, so every way out of the event loop, unwinding included,
/// leaves the terminal usable.
#[derive(Debug)]
pub struct RawMode(());

impl RawMode {
    pub fn enable() -> io::Result<RawMode> {
        enable_raw_mode()?;
        Ok(RawMode(()))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            debug!(error = %err, "failed to restore terminal mode");
        }
    }
}

/// The interactive terminal. Expects a [`RawMode`] guard to be held while it is in use.
pub struct Terminal {
    events: EventStream,
    editor: LineEditor,
    stdout: Stdout,
}

impl Terminal {
    pub fn new() -> Terminal {
        Terminal {
            events: EventStream::new(),
            editor: LineEditor::new(),
            stdout: io::stdout(),
        }
    }

    fn hide(&mut self) -> io::Result<()> {
        queue!(
            self.stdout,
            MoveToColumn(0),
            terminal::Clear(ClearType::UntilNewLine)
        )
    }

    fn show(&mut self) -> io::Result<()> {
        let width = terminal::size().map(|(cols, _)| cols).unwrap_or(80);
        write!(self.stdout, "{}", self.editor.visible_tail(width))?;
        self.stdout.flush()
    }

    /// Raw mode turns off output post-processing, so lines need an explicit carriage return.
    fn print_above(&mut self, line: &str) -> io::Result<()> {
        self.hide()?;
        write!(self.stdout, "{line}\r\n")?;
        self.show()
    }
}

impl Default for Terminal {
    fn default() -> Terminal {
        Terminal::new()
    }
}

impl Frontend for Terminal {
    async fn next_input(&mut self) -> io::Result<InputEvent> {
        loop {
            let event = match self.events.next().await {
                Some(event) => event?,
                None => return Ok(InputEvent::Quit),
            };
            let input = match event {
                Event::Key(key) => self.editor.handle_key(key),
                Event::Resize(..) => Some(InputEvent::Edit),
                _ => None,
            };
            if let Some(input) = input {
                return Ok(input);
            }
        }
    }

    fn show_message(&mut self, from: &str, body: &str) -> io::Result<()> {
        self.print_above(&format!("{from}: {body}"))
    }

    fn notice(&mut self, text: &str) -> io::Result<()> {
        self.print_above(&format!("{PROGRAM}: {text}"))
    }

    fn redraw(&mut self) -> io::Result<()> {
        self.hide()?;
        self.show()
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.editor.clear();
        self.hide()?;
        self.stdout.flush()
    }

    fn finalize_line(&mut self) -> io::Result<()> {
        if !self.editor.line().is_empty() {
            write!(self.stdout, "\r\n")?;
            self.editor.clear();
        }
        self.stdout.flush()
    }
}

/// Asks yes/no questions on stdin, before raw mode is enabled.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&mut self, question: &str) -> io::Result<Option<bool>> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut line = String::new();
        loop {
            write!(stdout, "{PROGRAM}: {question}")?;
            stdout.flush()?;
            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if let Some(answer) = parse_answer(&line) {
                return Ok(Some(answer));
            }
        }
    }
}

/// The first `y` or `n` on the line decides, in either case.
fn parse_answer(line: &str) -> Option<bool> {
    line.chars().find_map(|c| match c.to_ascii_lowercase() {
        'y' => Some(true),
        'n' => Some(false),
        _ => None,
    })
}
