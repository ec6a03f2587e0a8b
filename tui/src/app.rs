//! Main Application
//!
//! The App owns the terminal lifecycle for a tutor conversation:
//! - Event loop (keyboard, mouse)
//! - Frame tick that flushes streamed text at the configured rate
//! - Reply tasks that stream from the relay off the UI loop
//! - Rendering of the conversation, input line and status bar
//!
//! Streamed text reaches the screen only through the frame tick. Each reply
//! gets its own [`PublishScheduler`]; the tick takes the latest snapshot, the
//! auto-scroll policy decides whether the view follows it, then the frame is
//! drawn.

use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use relay_core::{RelayResult, ResponseId, Role, Turn};

use crate::config::ClientConfig;
use crate::consumer::ConsumeOutcome;
use crate::scheduler::PublishScheduler;
use crate::scroll::{AutoScrollPolicy, Viewport};
use crate::tutor::{stream_reply, TutorSession};

/// Input box height (lines), separator included
const INPUT_HEIGHT: u16 = 4;

/// Rows moved per mouse wheel notch
const WHEEL_STEP: i64 = 3;

/// Shown while a reply streams
const STREAM_CURSOR: char = '▌';

const USER_PREFIX: &str = "You: ";
const TUTOR_PREFIX: &str = "Tutor: ";

/// Tutor accent color
pub const TUTOR_ACCENT: Color = Color::Rgb(94, 129, 244);

/// Result of a reply task
#[derive(Debug)]
struct Reply {
    response_id: ResponseId,
    outcome: RelayResult<ConsumeOutcome>,
}

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    config: ClientConfig,
    session: TutorSession,

    // === Streaming ===
    /// Scheduler of the reply being streamed
    scheduler: Option<PublishScheduler>,
    /// Latest published snapshot of the streaming reply
    streaming: Option<String>,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,

    // === Input & View ===
    input_buffer: String,
    viewport: Viewport,
    auto_scroll: AutoScrollPolicy,
    /// Last error, cleared by the next successful send
    status: Option<String>,
}

impl App {
    /// Create an App around a loaded session
    #[must_use]
    pub fn new(config: ClientConfig, session: TutorSession) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let auto_scroll = AutoScrollPolicy::new(config.scroll_threshold);
        Self {
            running: true,
            config,
            session,
            scheduler: None,
            streaming: None,
            replies_tx,
            replies_rx,
            input_buffer: String::new(),
            viewport: Viewport::default(),
            auto_scroll,
            status: None,
        }
    }

    /// Tutor session
    #[must_use]
    pub fn session(&self) -> &TutorSession {
        &self.session
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();
        let mut frames = tokio::time::interval(self.config.frame_interval());
        frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.draw(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events first so typing stays responsive mid-stream
                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => {
                        warn!(error = %e, "Terminal event error");
                        self.running = false;
                    }
                    None => self.running = false,
                },

                Some(reply) = self.replies_rx.recv() => self.handle_reply(reply).await,

                _ = frames.tick() => {
                    self.flush_stream();
                    self.draw(terminal)?;
                }
            }
        }

        self.session.cancel();
        Ok(())
    }

    /// Draw one frame
    pub fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.render(frame))?;
        Ok(())
    }

    /// Take the newest streamed snapshot, if any arrived since the last frame
    fn flush_stream(&mut self) {
        if let Some(snapshot) = self.scheduler.as_ref().and_then(PublishScheduler::take) {
            self.streaming = Some(snapshot);
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    /// Handle keyboard input
    async fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if ctrl => self.running = false,

            KeyCode::Char('n') if ctrl => self.new_conversation().await,

            KeyCode::Enter => self.submit().await,

            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            KeyCode::PageUp => self.scroll_by(-self.half_page()),
            KeyCode::PageDown => self.scroll_by(self.half_page()),
            KeyCode::Home if ctrl => self.scroll_by(i64::MIN / 2),
            KeyCode::End if ctrl => self.scroll_by(i64::MAX / 2),

            _ => {}
        }
    }

    /// Handle mouse input
    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll_by(-WHEEL_STEP),
            MouseEventKind::ScrollDown => self.scroll_by(WHEEL_STEP),
            _ => {}
        }
    }

    fn half_page(&self) -> i64 {
        i64::from((self.viewport.client_height / 2).max(1))
    }

    fn scroll_by(&mut self, delta: i64) {
        self.viewport = self.viewport.scrolled_by(delta);
        self.auto_scroll.observe(&self.viewport);
    }

    /// Send the input line
    async fn submit(&mut self) {
        if self.input_buffer.trim().is_empty() {
            return;
        }

        let pending = match self.session.begin_send(&self.input_buffer).await {
            Ok(pending) => pending,
            Err(e) => {
                self.status = Some(e.to_string());
                return;
            }
        };

        self.input_buffer.clear();
        self.status = None;
        self.auto_scroll.force_follow();

        let scheduler = PublishScheduler::new();
        self.scheduler = Some(scheduler.clone());
        self.streaming = Some(String::new());

        let client = self.session.client().clone();
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let outcome = stream_reply(&client, &pending, &scheduler).await;
            // The app may already be gone
            let _ = replies.send(Reply {
                response_id: pending.response_id,
                outcome,
            });
        });
    }

    /// Commit or discard a finished reply
    async fn handle_reply(&mut self, reply: Reply) {
        if !self.session.is_awaiting(&reply.response_id) {
            debug!(response_id = %reply.response_id, "Dropping reply for an abandoned request");
            return;
        }

        // The closing publish lands here even if no frame ticked since
        self.flush_stream();
        self.scheduler = None;
        self.streaming = None;

        if let Err(e) = self.session.finish_send(&reply.response_id, reply.outcome).await {
            warn!(error = %e, "Reply failed");
            self.status = Some(e.to_string());
        }
    }

    async fn new_conversation(&mut self) {
        self.session.new_conversation().await;
        self.scheduler = None;
        self.streaming = None;
        self.status = None;
        self.viewport = Viewport::default();
        self.auto_scroll.force_follow();
    }

    fn render(&mut self, frame: &mut Frame) {
        let [conversation, input, status] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.render_conversation(frame, conversation);
        self.render_input(frame, input);
        self.render_status(frame, status);
    }

    /// Render the conversation, applying the auto-scroll policy
    fn render_conversation(&mut self, frame: &mut Frame, area: Rect) {
        let lines = conversation_lines(
            self.session.conversation().turns(),
            self.streaming.as_deref(),
            usize::from(area.width.max(1)),
        );

        let before = Viewport {
            client_height: u32::from(area.height),
            ..self.viewport
        };
        let total = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        self.viewport = self.auto_scroll.apply(before, total);

        let visible: Vec<Line<'static>> = lines
            .into_iter()
            .skip(self.viewport.scroll_top as usize)
            .take(usize::from(area.height))
            .collect();
        frame.render_widget(Paragraph::new(visible), area);
    }

    /// Render the input box
    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let width = usize::from(area.width);
        let text_height = usize::from(area.height.saturating_sub(1));
        if width < 5 || text_height == 0 {
            return;
        }

        let mut lines = vec![Line::styled(
            "─".repeat(width),
            Style::default().fg(Color::DarkGray),
        )];

        let full_input = format!("{USER_PREFIX}{}{STREAM_CURSOR}", self.input_buffer);
        let wrapped = textwrap::wrap(&full_input, width.saturating_sub(1));
        let skip = wrapped.len().saturating_sub(text_height);
        lines.extend(
            wrapped
                .iter()
                .skip(skip)
                .map(|l| Line::styled(l.to_string(), Style::default().fg(Color::Green))),
        );

        frame.render_widget(Paragraph::new(lines), area);
    }

    /// Render the status bar
    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let (state, style) = if let Some(error) = &self.status {
            (format!("Error: {error}"), Style::default().fg(Color::Red))
        } else if self.session.is_streaming() {
            ("Thinking...".to_string(), Style::default().fg(TUTOR_ACCENT))
        } else {
            ("Ready".to_string(), Style::default().fg(Color::DarkGray))
        };

        let scroll_info = if self.auto_scroll.is_following() {
            String::new()
        } else {
            format!(" [{} more below]", self.viewport.distance_from_bottom())
        };

        let status = format!(
            " {state} | Enter send | Ctrl-N new chat | PgUp/PgDn scroll | Esc quit{scroll_info}"
        );
        let status = truncate_to_width(&status, usize::from(area.width));
        frame.render_widget(Paragraph::new(Line::styled(status, style)), area);
    }
}

/// Wrap the conversation into display lines
///
/// A streaming reply is drawn after the committed turns with a cursor.
#[must_use]
pub fn conversation_lines(
    turns: &[Turn],
    streaming: Option<&str>,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let mut push_message = |prefix: &str, content: &str, style: Style| {
        let text = format!("{prefix}{content}");
        for line in textwrap::wrap(&text, width) {
            lines.push(Line::styled(line.into_owned(), style));
        }
        lines.push(Line::default());
    };

    for turn in turns {
        let (prefix, style) = match turn.role() {
            Role::User => (USER_PREFIX, Style::default().fg(Color::Green)),
            Role::Assistant => (TUTOR_PREFIX, Style::default().fg(TUTOR_ACCENT)),
            Role::System => ("", Style::default().fg(Color::DarkGray)),
        };
        push_message(prefix, turn.content(), style);
    }

    if let Some(partial) = streaming {
        push_message(
            TUTOR_PREFIX,
            &format!("{partial}{STREAM_CURSOR}"),
            Style::default().fg(TUTOR_ACCENT).add_modifier(Modifier::ITALIC),
        );
    }

    lines
}

/// Cut `text` to at most `width` terminal columns
fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect()
}
