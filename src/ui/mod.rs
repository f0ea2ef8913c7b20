use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    config::{ConfigError, SimConfig},
    core::{
        Simulation,
        frame_loop::{FramePacer, RenderSink, SimulationLoop},
    },
    input::{self, InputAction},
    render::{self, Camera, FrameBuffer, Scene, Viewport},
    types::ColorId,
};

type Backend = CrosstermBackend<Stdout>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Runs the session until Esc or Ctrl+C. The terminal is restored whether the
/// loop ends cleanly or with an error.
pub fn run(config: SimConfig) -> Result<(), AppError> {
    let mut terminal = setup_terminal()?;
    let outcome = run_session(&mut terminal, config);
    let restored = shutdown_terminal(&mut terminal);
    if let Err(err) = &outcome {
        error!(error = %err, "session_failed");
    }
    outcome?;
    restored?;
    Ok(())
}

fn run_session(terminal: &mut Terminal<Backend>, config: SimConfig) -> Result<(), AppError> {
    let mut sim = Simulation::new(config);
    let pacer = FramePacer::new(sim.config().target_fps);
    let mut frame_loop = SimulationLoop::new();
    let mut sink = TerminalSink::new(terminal);

    sim.request_initial_glyph();
    info!(frame_target = ?pacer.frame_target(), "session_started");

    loop {
        let frame_start = Instant::now();
        sim.poll_glyphs();
        frame_loop.run_frame(&mut sim, &mut sink)?;

        while event::poll(pacer.sleep_for(frame_start.elapsed()))? {
            if let CrosstermEvent::Key(key) = event::read()? {
                match input::translate(&key) {
                    Some(InputAction::Quit) => {
                        info!(
                            frames = frame_loop.frames(),
                            live = sim.working_set().len(),
                            pending = sim.pending_glyphs(),
                            "session_ended"
                        );
                        sim.teardown();
                        return Ok(());
                    }
                    Some(InputAction::Spawn(press)) => sim.handle_key(&press),
                    None => {}
                }
            }
        }
    }
}

fn setup_terminal() -> io::Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn shutdown_terminal(terminal: &mut Terminal<Backend>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Frames per second averaged over roughly one second.
struct FpsMeter {
    frames: u32,
    last_sample: Instant,
    fps: f32,
}

impl FpsMeter {
    fn new() -> Self {
        Self {
            frames: 0,
            last_sample: Instant::now(),
            fps: 0.0,
        }
    }

    fn record(&mut self) {
        self.frames += 1;
        if self.last_sample.elapsed() >= Duration::from_secs(1) {
            let secs = self.last_sample.elapsed().as_secs_f32();
            self.fps = self.frames as f32 / secs;
            self.frames = 0;
            self.last_sample = Instant::now();
        }
    }
}

struct TerminalSink<'t> {
    terminal: &'t mut Terminal<Backend>,
    camera: Camera,
    framebuf: FrameBuffer,
    fps: FpsMeter,
}

impl<'t> TerminalSink<'t> {
    fn new(terminal: &'t mut Terminal<Backend>) -> Self {
        Self {
            terminal,
            camera: Camera::default(),
            framebuf: FrameBuffer::new(0, 0),
            fps: FpsMeter::new(),
        }
    }
}

impl RenderSink for TerminalSink<'_> {
    fn render(&mut self, scene: &Scene<'_>) -> io::Result<()> {
        self.fps.record();
        let Self {
            terminal,
            camera,
            framebuf,
            fps,
        } = self;

        terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(3),
                    Constraint::Length(3),
                ])
                .split(frame.size());

            let header = Paragraph::new(header_text(scene, fps.fps))
                .block(Block::default().borders(Borders::ALL).title("glyphfall"));
            frame.render_widget(header, chunks[0]);

            let inner = Block::default().borders(Borders::ALL).inner(chunks[1]);
            let viewport = Viewport {
                width: inner.width,
                height: inner.height,
            };
            render::draw(scene, camera, viewport, framebuf);
            let view = Paragraph::new(frame_lines(framebuf))
                .block(Block::default().borders(Borders::ALL).title("Desk"));
            frame.render_widget(view, chunks[1]);

            let footer = Paragraph::new(footer_text(scene))
                .block(Block::default().borders(Borders::ALL).title("Controls"));
            frame.render_widget(footer, chunks[2]);
        })?;
        Ok(())
    }
}

fn header_text(scene: &Scene<'_>, fps: f32) -> String {
    format!(
        "glyphs: {}/{} | elapsed: {:.1}s | fps: {:.1}",
        scene.working_set.len(),
        scene.working_set.capacity(),
        scene.elapsed,
        fps
    )
}

fn footer_text(scene: &Scene<'_>) -> String {
    let side = scene.working_set.side_display();
    let label = side.label.as_ref().map_or("-", |v| v.text.as_str());
    let code = side.code.as_ref().map_or("-", |v| v.text.as_str());
    format!("last: {label} ({code}) | any key: drop a glyph | Esc: quit")
}

/// One line per framebuffer row, with runs of the same colour merged into a
/// single span.
fn frame_lines(framebuf: &FrameBuffer) -> Vec<Line<'static>> {
    (0..framebuf.height())
        .map(|y| {
            let mut spans: Vec<Span<'static>> = Vec::new();
            let mut run = String::new();
            let mut run_color = None;
            for x in 0..framebuf.width() {
                let cell = framebuf.get(x, y);
                if run_color.is_some_and(|color| color != cell.color) {
                    spans.push(styled_run(std::mem::take(&mut run), run_color));
                }
                run_color = Some(cell.color);
                run.push(cell.ch);
            }
            if !run.is_empty() {
                spans.push(styled_run(run, run_color));
            }
            Line::from(spans)
        })
        .collect()
}

fn styled_run(text: String, color: Option<ColorId>) -> Span<'static> {
    let color = color.map_or(Color::Reset, color_for);
    Span::styled(text, Style::default().fg(color))
}

fn color_for(color: ColorId) -> Color {
    match color {
        ColorId::White => Color::White,
        ColorId::Cyan => Color::Cyan,
        ColorId::Blue => Color::Blue,
        ColorId::Yellow => Color::Yellow,
        ColorId::Magenta => Color::Magenta,
        ColorId::Gray => Color::Gray,
        ColorId::Floor => Color::DarkGray,
        ColorId::Prop => Color::LightBlue,
    }
}
