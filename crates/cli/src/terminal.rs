//! Raw-mode terminal plumbing: a full-screen frame sink and a key reader.

use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use metalstack_core::dashboard::frame::Frame;
use metalstack_core::dashboard::runtime::FrameSink;
use metalstack_core::CoreError;

/// Size assumed when the terminal cannot report one.
const FALLBACK_SIZE: (usize, usize) = (80, 24);

/// Draws frames on the alternate screen in raw mode.
///
/// The terminal is restored when the sink is dropped, including on early
/// returns and panics that unwind.
pub struct TerminalSink {
    stdout: Stdout,
}

impl TerminalSink {
    pub fn enter() -> Result<Self, CoreError> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().map_err(terminal_error)?;
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(terminal_error(e));
        }
        Ok(Self { stdout })
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl FrameSink for TerminalSink {
    fn size(&self) -> (usize, usize) {
        terminal::size()
            .map(|(cols, rows)| (cols as usize, rows as usize))
            .unwrap_or(FALLBACK_SIZE)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), CoreError> {
        let (cols, rows) = self.size();
        queue!(self.stdout, MoveTo(0, 0), Clear(ClearType::All)).map_err(terminal_error)?;
        // Raw mode: '\n' does not return the carriage, so position each line.
        for (row, line) in frame.visible_lines(cols, rows).enumerate() {
            queue!(self.stdout, MoveTo(0, row as u16), Print(line)).map_err(terminal_error)?;
        }
        self.stdout.flush().map_err(terminal_error)
    }
}

/// Forward key presses as characters until the receiver is dropped.
///
/// Esc and Ctrl-C arrive as `'q'` so they quit like the `q` key.
pub fn spawn_key_reader() -> (mpsc::UnboundedReceiver<char>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            let key = match event {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("terminal input failed: {e}");
                    break;
                }
            };
            let ch = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => 'q',
                KeyCode::Esc => 'q',
                KeyCode::Char(ch) => ch,
                _ => continue,
            };
            if tx.send(ch).is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

fn terminal_error(e: io::Error) -> CoreError {
    CoreError::Terminal(e.to_string())
}
