mod feed;
mod render;
mod sound;

use std::fs::File;
use std::io::{self, Stdout, stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, terminal,
};
use pose_runner::readiness::{self, Posture, SignalWatch, Watch};
use pose_runner::{Config, Controls, LandmarkSet, PoseControl, Session, SessionEvent};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::feed::Frame;
use crate::render::PixelBuf;
use crate::sound::{Effect, Sound};

const LOG_ENV: &str = "POSE_RUNNER_LOG";
const DEFAULT_LOG: &str = "pose-runner.log";

const FRAME: Duration = Duration::from_millis(33); // ~30 fps

/// Without key-release reports, a press holds "advance" this long.
const HOLD_LATCH: Duration = Duration::from_millis(180);

// ── Terminal ────────────────────────────────────────────────────────────────

/// Raw mode and the alternate screen, restored on drop.
struct Terminal {
    out: Stdout,
    releases: bool,
}

impl Terminal {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        execute!(
            out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::DisableLineWrap,
        )?;
        let releases = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if releases {
            execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        info!(releases, "terminal ready");
        Ok(Self { out, releases })
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.releases {
            let _ = execute!(self.out, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(
            self.out,
            terminal::LeaveAlternateScreen,
            cursor::Show,
            terminal::EnableLineWrap,
        );
        let _ = terminal::disable_raw_mode();
    }
}

// ── Keyboard ────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Start,
    Quit,
}

/// Arrow keys and space as discrete controls. Up holds "advance".
struct Keyboard {
    releases: bool,
    pending: Controls,
    held: bool,
    held_until: Option<Instant>,
}

impl Keyboard {
    fn new(releases: bool) -> Self {
        Self {
            releases,
            pending: Controls::default(),
            held: false,
            held_until: None,
        }
    }

    fn on_key(&mut self, key: KeyEvent, now: Instant) -> KeyAction {
        if key.kind == KeyEventKind::Release {
            if key.code == KeyCode::Up {
                self.held = false;
            }
            return KeyAction::None;
        }
        let repeat = key.kind == KeyEventKind::Repeat;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return KeyAction::Quit;
            }
            KeyCode::Enter => return KeyAction::Start,
            KeyCode::Left if !repeat => self.pending.move_left = true,
            KeyCode::Right if !repeat => self.pending.move_right = true,
            KeyCode::Char(' ') if !repeat => self.pending.jump = true,
            KeyCode::Up if self.releases => self.held = true,
            KeyCode::Up => self.held_until = Some(now + HOLD_LATCH),
            _ => {}
        }
        KeyAction::None
    }

    fn take(&mut self, now: Instant) -> Controls {
        let edges = std::mem::take(&mut self.pending);
        Controls {
            advance: self.held || self.held_until.is_some_and(|t| now < t),
            ..edges
        }
    }
}

// ── Game ────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Lobby,
    Playing,
}

struct Game {
    cfg: Config,
    session: Session,
    pose: PoseControl,
    watch: SignalWatch,
    keys: Keyboard,
    feed: Option<Receiver<Frame>>,
    sound: Option<Sound>,
    phase: Phase,
    note: String,
}

impl Game {
    fn new(
        cfg: Config,
        feed: Option<Receiver<Frame>>,
        sound: Option<Sound>,
        releases: bool,
    ) -> pose_runner::Result<Self> {
        let watch = SignalWatch::new(
            cfg.tracking.min_confidence,
            cfg.tracking.lost_signal_frames,
            cfg.tracking.device_count,
        );
        let note = if feed.is_some() {
            "raise both arms or press Enter".to_string()
        } else {
            "press Enter to start".to_string()
        };
        Ok(Self {
            session: Session::new(&cfg)?,
            pose: PoseControl::new(&cfg),
            watch,
            keys: Keyboard::new(releases),
            feed,
            sound,
            phase: Phase::Lobby,
            note,
            cfg,
        })
    }

    fn start(&mut self) {
        if self.phase == Phase::Playing {
            return;
        }
        info!("run started");
        self.pose.reset();
        self.phase = Phase::Playing;
        self.note.clear();
    }

    fn drain_feed(&mut self) {
        let Some(rx) = &self.feed else {
            return;
        };
        let mut frames = Vec::new();
        let closed = loop {
            match rx.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };
        if closed {
            warn!("landmark source ended, keyboard only");
            self.feed = None;
            self.note = "tracker disconnected".to_string();
        }
        for frame in frames {
            self.on_frame(frame.as_ref());
        }
    }

    fn on_frame(&mut self, frame: Option<&LandmarkSet>) {
        match self.watch.observe(frame) {
            Watch::Tracking if self.phase == Phase::Playing => self.note.clear(),
            Watch::Tracking => {}
            Watch::Searching => return,
            Watch::SwitchDevice(device) => {
                self.note = format!("no one in view, trying camera {device}");
                return;
            }
        }
        let Some(frame) = frame else {
            return;
        };
        let min = self.cfg.tracking.min_confidence;
        match self.phase {
            Phase::Lobby => {
                if readiness::arms_raised(frame, min) {
                    self.start();
                    return;
                }
                self.note = match readiness::posture(frame, min) {
                    Some(Posture::Sitting) => "stand up to play",
                    Some(Posture::Standing) => "raise both arms to start",
                    None => "step back so your legs are in view",
                }
                .to_string();
            }
            Phase::Playing => {
                if let Some(raw) = self.pose.on_frame(frame) {
                    debug!(%raw, "frame");
                }
            }
        }
    }

    fn step(&mut self, dt: Duration, now: Instant) {
        let keys = self.keys.take(now);
        if self.phase != Phase::Playing {
            return;
        }
        let controls = keys.merge(self.pose.take());
        self.session.set_stable_action(self.pose.stable());
        self.session.advance(dt, controls);

        for event in self.session.take_events() {
            let effect = match event {
                SessionEvent::Jumped => Effect::Jump,
                SessionEvent::Reset(_) => Effect::Death,
            };
            if let Some(sound) = &self.sound {
                sound.play(effect);
            }
        }
    }

    fn draw(&self, buf: &mut PixelBuf, out: &mut Stdout) -> io::Result<()> {
        let snap = self.session.snapshot();
        let field = self.session.world().field();
        match self.phase {
            Phase::Lobby => render::draw_lobby(buf, field, &snap),
            Phase::Playing => render::draw_scene(buf, field, &snap),
        }
        let raw = match self.phase {
            Phase::Playing => self.pose.last_raw(),
            Phase::Lobby => None,
        };
        buf.render(out, &render::status_line(&snap, raw, &self.note))
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn log_path() -> PathBuf {
    std::env::var_os(LOG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG))
}

/// Install the file subscriber. Must run before anything else logs.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run(game: &mut Game, term: &mut Terminal) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    let mut buf = PixelBuf::for_terminal(cols, rows);
    let mut last = Instant::now();

    loop {
        let frame_start = Instant::now();

        // Input
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) => match game.keys.on_key(key, frame_start) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Start => game.start(),
                    KeyAction::None => {}
                },
                Event::Resize(c, r) => buf.fit_terminal(c, r),
                _ => {}
            }
        }
        game.drain_feed();

        // Update
        game.step(frame_start - last, frame_start);
        last = frame_start;

        // Render
        game.draw(&mut buf, &mut term.out)?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME {
            std::thread::sleep(FRAME - elapsed);
        }
    }
}

fn main() -> Result<()> {
    let log = log_path();
    init_logging(&log)?;
    let cfg = Config::from_env().context("loading configuration")?;
    let feed = feed::from_env()?;
    let sound = Sound::open();

    let mut term = Terminal::enter().context("setting up terminal")?;
    let mut game = Game::new(cfg, feed, sound, term.releases).context("starting session")?;
    let result = run(&mut game, &mut term);

    game.session.shutdown();
    drop(game); // closes the landmark channel
    drop(term);
    info!(log = %log.display(), "bye");
    result
}
