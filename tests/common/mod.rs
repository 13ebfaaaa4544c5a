#![allow(dead_code)]

use std::io;

use tokio::io::DuplexStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tim::config::{BusyReply, SessionConfig};
use tim::handshake::Prompt;
use tim::peer::{framed, Connection, Role};
use tim::terminal::{Frontend, InputEvent};
use tim::PROGRAM;

/// Front end fed from a channel. Rendered lines are recorded as the terminal would print them.
pub struct ScriptedFrontend {
    inputs: UnboundedReceiver<InputEvent>,
    lines: UnboundedSender<String>,
}

/// The test's end of a [`ScriptedFrontend`].
pub struct Script {
    pub input: UnboundedSender<InputEvent>,
    pub output: UnboundedReceiver<String>,
}

impl Script {
    pub fn type_line(&self, line: &str) {
        self.input
            .send(InputEvent::Submit(line.to_string()))
            .expect("front end dropped");
    }

    pub fn quit(&self) {
        self.input.send(InputEvent::Quit).expect("front end dropped");
    }

    /// Wait for the next rendered line.
    pub async fn next_line(&mut self) -> String {
        self.output.recv().await.expect("front end dropped")
    }

    /// Everything rendered so far.
    pub fn lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.output.try_recv() {
            lines.push(line);
        }
        lines
    }
}

pub fn scripted() -> (ScriptedFrontend, Script) {
    let (input, inputs) = mpsc::unbounded_channel();
    let (lines, output) = mpsc::unbounded_channel();
    (ScriptedFrontend { inputs, lines }, Script { input, output })
}

impl ScriptedFrontend {
    fn record(&mut self, line: String) -> io::Result<()> {
        // The test may have stopped listening; that is not the session's problem.
        let _ = self.lines.send(line);
        Ok(())
    }
}

impl Frontend for ScriptedFrontend {
    async fn next_input(&mut self) -> io::Result<InputEvent> {
        match self.inputs.recv().await {
            Some(input) => Ok(input),
            // An idle user, not a closed terminal.
            None => std::future::pending().await,
        }
    }

    fn show_message(&mut self, from: &str, body: &str) -> io::Result<()> {
        self.record(format!("{from}: {body}"))
    }

    fn notice(&mut self, text: &str) -> io::Result<()> {
        self.record(format!("{PROGRAM}: {text}"))
    }

    fn redraw(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn finalize_line(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// For sessions that must never ask.
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn confirm(&mut self, question: &str) -> io::Result<Option<bool>> {
        panic!("unexpected prompt: {question}");
    }
}

pub fn config(role: Role, nick: &str) -> SessionConfig {
    SessionConfig {
        nick: nick.to_string(),
        role,
        assume_yes: true,
        busy_reply: BusyReply::Established,
    }
}

/// Two framed ends of an in-memory connection.
pub fn pipe() -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    let (a, b) = tokio::io::duplex(16 * 1024);
    (framed(a), framed(b))
}
