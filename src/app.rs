//! Ties the countdown together: owns the phase clock, both effects, the
//! overlay, the prophecy and the music, routes keys and composes each frame.
//!
//! Every method that depends on time takes `now` in ms since the epoch so
//! the whole sequence can be driven from tests.

use crate::audio::{AudioBackend, MusicPlayer, PlaybackState};
use crate::canvas::{self, Canvas, Rgb};
use crate::clock::{CLIMAX_SECONDS, Phase, PhaseClock, TimeRemaining};
use crate::config::Config;
use crate::effects::Effect;
use crate::effects::backdrop::{Backdrop, Mood};
use crate::effects::fireworks::Finale;
use crate::glyphs;
use crate::overlay::{OverlaySequencer, OverlayText};
use crate::prediction::{Oracle, PredictionStatus, Prophecy};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use std::io::{self, Write};
use std::sync::Arc;

const CHIP: Rgb = (74, 222, 128);
const LABEL: Rgb = (148, 163, 184);
const TITLE_TOP: Rgb = (0x81, 0x8c, 0xf8);
const TITLE_BOTTOM: Rgb = (0xec, 0x48, 0x99);
const DIGIT: Rgb = (255, 255, 255);
const DIGIT_SHADOW: Rgb = (0x31, 0x2e, 0x81);
const ALERT: Rgb = (239, 68, 68);
const ALERT_TEXT: Rgb = (248, 113, 113);
const ALERT_SHADOW: Rgb = (69, 10, 10);
const PANEL: Rgb = (10, 10, 25);
const PANEL_TEXT: Rgb = (0xc7, 0xd2, 0xfe);
const PROMPT: Rgb = (0x67, 0xe8, 0xf9);

const UNIT_LABELS: [&str; 4] = ["DAYS", "HOURS", "MINUTES", "SECONDS"];
const PANEL_MAX_WIDTH: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    started: bool,
    fixed_target: Option<i64>,
    lead_ms: i64,
    music_enabled: bool,
    clock: PhaseClock,
    backdrop: Backdrop,
    finale: Finale,
    overlay: OverlaySequencer,
    text: OverlayText,
    prophecy: Prophecy,
    music: MusicPlayer,
    panel_open: bool,
    // Effect surface plus text for the current frame; the effects' own
    // surfaces never carry overlay pixels.
    frame: Canvas,
}

impl App {
    /// Builds the app for a terminal of `cols x rows` cells.
    pub fn new(
        config: &Config,
        oracle: Arc<dyn Oracle>,
        backend: Box<dyn AudioBackend>,
        cols: u16,
        rows: u16,
    ) -> Self {
        let (width, height) = (cols as usize, rows as usize * 2);
        Self {
            started: false,
            fixed_target: config.target,
            lead_ms: config.lead.as_millis() as i64,
            music_enabled: config.music,
            clock: PhaseClock::new(config.target.unwrap_or(0), config.poll),
            backdrop: Backdrop::new(width, height, config.background),
            finale: Finale::new(width, height, config.background),
            overlay: OverlaySequencer::new(),
            text: config.overlay.clone(),
            prophecy: Prophecy::new(oracle),
            music: MusicPlayer::new(backend, config.tracks.clone()),
            panel_open: false,
            frame: Canvas::new(width, height),
        }
    }

    /// Leaves the start screen. This is the first user interaction, so music
    /// is attempted here.
    pub fn start(&mut self, now: i64) {
        if self.started {
            return;
        }
        self.started = true;
        let target = self.fixed_target.unwrap_or(now + self.lead_ms);
        info!("Countdown started, target in {} ms", target - now);
        self.clock.reset(target);
        if self.music_enabled {
            self.music.start();
        }
    }

    /// Restarts the countdown `lead` from `now`.
    pub fn reset(&mut self, now: i64) {
        let target = now + self.lead_ms;
        info!("Sequence reset from {}, new target in {} ms", self.clock.phase(), self.lead_ms);
        self.clock.reset(target);
        self.finale.deactivate();
        self.overlay.cancel();
        self.backdrop.set_mood(Mood::Calm);
        self.panel_open = false;
    }

    /// Samples the clock and applies any transition, then moves the overlay.
    /// Runs before rendering so a new phase is never drawn before it is
    /// handled.
    pub fn tick(&mut self, now: i64) {
        if !self.started {
            return;
        }
        if let Some(phase) = self.clock.poll(now) {
            self.enter(phase, now);
        }
        self.overlay.advance(now);
    }

    fn enter(&mut self, phase: Phase, now: i64) {
        info!("Phase -> {phase}");
        match phase {
            Phase::Normal | Phase::Climax => {
                // Only reachable from celebration when the wall clock jumps back.
                if self.finale.is_active() {
                    self.finale.deactivate();
                    self.overlay.cancel();
                }
                let mood = if phase == Phase::Climax { Mood::Climax } else { Mood::Calm };
                self.backdrop.set_mood(mood);
                if phase == Phase::Climax {
                    self.panel_open = false;
                }
            }
            Phase::Celebration => {
                self.panel_open = false;
                self.finale.activate();
                self.overlay.start(now);
            }
        }
    }

    /// Advances whichever effect is on screen by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.started && self.clock.phase() == Phase::Celebration {
            self.finale.update(dt);
        } else {
            self.backdrop.update(dt);
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let (width, height) = (cols as usize, rows as usize * 2);
        debug!("resize to {cols}x{rows} cells");
        self.backdrop.resize(width, height);
        self.finale.resize(width, height);
        self.frame.resize(width, height);
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: i64) -> Control {
        if key.kind == KeyEventKind::Release {
            return Control::Continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Control::Quit;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Control::Quit,
            KeyCode::Esc if self.panel_open => self.panel_open = false,
            KeyCode::Esc => return Control::Quit,
            KeyCode::Enter => self.start(now),
            _ if !self.started => {}
            KeyCode::Char('r') | KeyCode::Char('R') => self.reset(now),
            KeyCode::Char('p') | KeyCode::Char('P') => self.toggle_panel(),
            KeyCode::Char('m') | KeyCode::Char('M') if self.music_enabled => {
                let state = self.music.toggle();
                debug!("music toggled: {state:?}");
            }
            _ => {}
        }
        Control::Continue
    }

    fn toggle_panel(&mut self) {
        if self.panel_open {
            self.panel_open = false;
            return;
        }
        if self.clock.phase() != Phase::Normal {
            return;
        }
        self.panel_open = true;
        self.prophecy.request();
    }

    pub fn render<W: Write>(&mut self, out: &mut W, now: i64) -> io::Result<()> {
        let music = self.music.state();

        let celebrating = self.started && self.clock.phase() == Phase::Celebration;
        let surface = if celebrating { self.finale.draw() } else { self.backdrop.draw() };
        self.frame.copy_from(surface);
        let canvas = &mut self.frame;

        if celebrating {
            self.overlay.draw(canvas, &self.text, now);
        } else if !self.started {
            draw_start(canvas, &self.text.title);
        } else if self.clock.phase() == Phase::Climax {
            draw_climax(canvas, self.clock.remaining_seconds(now));
        } else {
            draw_normal(canvas, &self.text.title, self.clock.remaining(now));
            if self.panel_open {
                draw_panel(canvas, &self.text.title, &self.prophecy.status());
            }
        }
        draw_music(canvas, music);
        canvas.present(out)
    }
}

fn put_centered_on(canvas: &mut Canvas, cx: i32, row: i32, text: &str, color: Rgb) {
    let col = cx - canvas::text_width(text) as i32 / 2;
    canvas.put_text(col, row, text, color);
}

fn draw_title(canvas: &mut Canvas, title: &str, y: i32, max_scale: i32) -> i32 {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    let scale = glyphs::fit_scale(title, w / 2, h / 5).min(max_scale);
    let x = w / 2 - glyphs::number_width(title, scale) / 2;
    glyphs::draw_number_gradient(canvas, x, y, title, scale, (TITLE_TOP, TITLE_BOTTOM), 1.0);
    y + glyphs::number_height(scale)
}

fn draw_start(canvas: &mut Canvas, title: &str) {
    let top = canvas.height() as i32 / 2 - 6;
    canvas.put_text_centered(top / 2 - 2, "P R O J E C T", LABEL);
    let bottom = draw_title(canvas, title, top, 4);
    canvas.put_text_centered(bottom / 2 + 2, "press ENTER to initialize system", PROMPT);
}

fn draw_normal(canvas: &mut Canvas, title: &str, remaining: TimeRemaining) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    let rows = canvas.rows() as i32;

    canvas.put_text_centered(1, "● SYSTEM ONLINE", CHIP);
    let title_bottom = draw_title(canvas, title, 6, 3);
    canvas.put_text_centered(title_bottom / 2 + 1, "COUNTDOWN INITIATED", LABEL);

    let values = [remaining.days, remaining.hours, remaining.minutes, remaining.seconds];
    let cell = w / 4;
    let scale = glyphs::fit_scale("00", cell - 4, h / 4).min(6);
    let y = (h - glyphs::number_height(scale)) / 2 + 2;
    let label_row = (y + glyphs::number_height(scale)) / 2 + 1;
    for (i, (value, label)) in values.iter().zip(UNIT_LABELS).enumerate() {
        let cx = cell / 2 + i as i32 * cell;
        let digits = format!("{value:02}");
        glyphs::draw_number_centered(canvas, cx, y, &digits, scale, DIGIT, Some(DIGIT_SHADOW));
        put_centered_on(canvas, cx, label_row, label, LABEL);
    }

    canvas.put_text_centered(rows - 3, "[p] CONSULT THE ORACLE", PROMPT);
}

fn draw_climax(canvas: &mut Canvas, seconds: i64) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    // Between samples the clock can briefly read zero; never show it.
    let digits = seconds.clamp(1, CLIMAX_SECONDS).to_string();
    let scale = glyphs::fit_scale(&digits, w * 4 / 5, h * 3 / 5);
    let y = (h - glyphs::number_height(scale)) / 2;

    canvas.put_text_centered(1, "⚠ FINAL SEQUENCE ⚠", ALERT_TEXT);
    glyphs::draw_number_centered(canvas, w / 2, y, &digits, scale, ALERT, Some(ALERT_SHADOW));
    canvas.put_text_centered((y + glyphs::number_height(scale)) / 2 + 1, "T - M I N U S", ALERT_TEXT);
}

fn draw_panel(canvas: &mut Canvas, title: &str, status: &PredictionStatus) {
    let cols = canvas.width() as i32;
    let rows = canvas.rows() as i32;
    let width = (cols - 4).min(PANEL_MAX_WIDTH);
    if width < 8 {
        return;
    }

    let body = match status.text() {
        Some(text) => wrap(text, (width - 4) as usize),
        None => vec!["Consulting the oracle...".to_string()],
    };
    let height = body.len() as i32 + 6;
    let left = (cols - width) / 2;
    let top = (rows - height) / 2;

    canvas.fill_rect(left, top * 2, width, height * 2, PANEL, 0.9);
    canvas.clear_text_rect(left, top, width, height);
    canvas.put_text_centered(top + 1, &format!("ORACLE // {title}"), PROMPT);
    for (i, line) in body.iter().enumerate() {
        canvas.put_text_centered(top + 3 + i as i32, line, PANEL_TEXT);
    }
    canvas.put_text_centered(top + height - 2, "[p] close", LABEL);
}

fn draw_music(canvas: &mut Canvas, state: PlaybackState) {
    let label = match state {
        PlaybackState::Playing => "♪ [m] pause",
        PlaybackState::Paused => "♪ [m] play",
        PlaybackState::Idle | PlaybackState::Exhausted => return,
    };
    canvas.put_text(1, canvas.rows() as i32 - 1, label, LABEL);
}

/// Greedy word wrap by display width. Words wider than `width` get a line
/// of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && canvas::text_width(&line) + 1 + canvas::text_width(word) > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
impl App {
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn clock(&self) -> &PhaseClock {
        &self.clock
    }

    pub fn finale(&self) -> &Finale {
        &self.finale
    }

    pub fn overlay(&self) -> &OverlaySequencer {
        &self.overlay
    }

    pub fn music_state(&self) -> PlaybackState {
        self.music.state()
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullBackend;
    use crate::prediction::PredictionError;
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    const START: i64 = 1_767_225_589_000;

    struct FixedOracle;

    impl Oracle for FixedOracle {
        fn generate(&self, _prompt: &str) -> Result<String, PredictionError> {
            Ok("Your code compiles on the first try in 2026.".into())
        }
    }

    fn config(target: Option<i64>) -> Config {
        Config {
            target,
            lead: Duration::from_secs(11),
            poll: Duration::from_millis(50),
            overlay: OverlayText::default(),
            tracks: vec![PathBuf::from("luck.mp3")],
            music: true,
            api_key: None,
            model: "test".into(),
            background: (0, 0, 0),
            log_file: PathBuf::from("finale.log"),
            log_level: log::LevelFilter::Off,
        }
    }

    fn app(target: Option<i64>) -> App {
        App::new(&config(target), Arc::new(FixedOracle), Box::new(NullBackend), 80, 30)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn screen(app: &mut App, now: i64) -> String {
        let mut out = Vec::new();
        app.render(&mut out, now).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn nothing_runs_before_start() {
        let mut app = app(None);
        app.tick(START);
        app.handle_key(key(KeyCode::Char('r')), START);
        assert!(!app.is_started());
        assert_eq!(app.phase(), Phase::Normal);
        assert!(screen(&mut app, START).contains("press ENTER"));
    }

    #[test]
    fn eleven_second_countdown_runs_through_every_phase() {
        let mut app = app(None);
        assert_eq!(app.handle_key(key(KeyCode::Enter), START), Control::Continue);
        assert!(app.is_started());
        assert_eq!(app.clock().target(), START + 11_000);
        // NullBackend refuses every source.
        assert_eq!(app.music_state(), PlaybackState::Exhausted);

        app.tick(START);
        assert_eq!(app.phase(), Phase::Normal);
        let shown = screen(&mut app, START);
        assert!(shown.contains("SYSTEM ONLINE"));
        assert!(shown.contains("SECONDS"));

        app.tick(START + 1_000);
        assert_eq!(app.phase(), Phase::Climax);
        assert!(screen(&mut app, START + 1_000).contains("FINAL SEQUENCE"));

        app.tick(START + 11_000);
        assert_eq!(app.phase(), Phase::Celebration);
        assert!(app.finale().is_active());
        assert!(app.overlay().is_running());
        assert_eq!(app.overlay().stage().index(), 0);
        assert!(screen(&mut app, START + 11_000).contains('新'));

        app.tick(START + 16_000);
        assert_eq!(app.overlay().stage().index(), 1);
        app.tick(START + 19_000);
        assert_eq!(app.overlay().stage().index(), 2);
        assert!(screen(&mut app, START + 21_000).contains("REPLAY"));
    }

    #[test]
    fn past_target_celebrates_immediately() {
        let mut app = app(Some(START - 5_000));
        app.start(START);
        app.tick(START);
        assert_eq!(app.phase(), Phase::Celebration);
        assert!(app.clock().remaining(START).is_zero());
        assert!(app.finale().is_active());
        for now in (START..START + 3_000).step_by(50) {
            app.tick(now);
            assert_eq!(app.phase(), Phase::Celebration);
        }
    }

    #[test]
    fn reset_during_celebration_starts_over() {
        let mut app = app(None);
        app.start(START);
        app.tick(START);
        app.tick(START + 11_000);
        for _ in 0..300 {
            app.update(1.0 / 60.0);
        }
        app.tick(START + 17_000);
        assert_eq!(app.overlay().stage().index(), 1);

        app.handle_key(key(KeyCode::Char('r')), START + 17_000);
        assert_eq!(app.phase(), Phase::Normal);
        assert_eq!(app.clock().target(), START + 28_000);
        assert!(!app.overlay().is_running());
        assert_eq!(app.overlay().stage().index(), 0);
        assert!(!app.finale().is_active());
        assert_eq!(app.finale().rocket_count(), 0);
        assert_eq!(app.finale().particle_count(), 0);

        app.tick(START + 17_000);
        assert_eq!(app.phase(), Phase::Normal);
        app.tick(START + 18_000);
        assert_eq!(app.phase(), Phase::Climax);
        app.tick(START + 28_000);
        assert_eq!(app.phase(), Phase::Celebration);
        assert!(app.finale().is_active());
    }

    #[test]
    fn prophecy_panel_only_opens_in_normal() {
        let mut app = app(None);
        app.start(START);
        app.tick(START);

        app.handle_key(key(KeyCode::Char('p')), START);
        assert!(app.panel_open());
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.prophecy.status() == PredictionStatus::Pending && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(screen(&mut app, START).contains("compiles"));

        app.handle_key(key(KeyCode::Esc), START);
        assert!(!app.panel_open());

        app.tick(START + 2_000);
        assert_eq!(app.phase(), Phase::Climax);
        app.handle_key(key(KeyCode::Char('p')), START + 2_000);
        assert!(!app.panel_open());
    }

    #[test]
    fn climax_closes_an_open_panel() {
        let mut app = app(None);
        app.start(START);
        app.tick(START);
        app.handle_key(key(KeyCode::Char('p')), START);
        app.tick(START + 1_000);
        assert!(!app.panel_open());
    }

    #[test]
    fn quit_keys() {
        let mut app = app(None);
        assert_eq!(app.handle_key(key(KeyCode::Char('q')), START), Control::Quit);
        assert_eq!(app.handle_key(key(KeyCode::Esc), START), Control::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c, START), Control::Quit);
        assert_eq!(app.handle_key(key(KeyCode::Char('c')), START), Control::Continue);
    }

    #[test]
    fn resize_keeps_phase_and_overlay() {
        let mut app = app(Some(START - 1));
        app.start(START);
        app.tick(START);
        app.resize(40, 12);
        assert_eq!(app.phase(), Phase::Celebration);
        assert!(app.overlay().is_running());
        assert!(app.finale().is_active());
        screen(&mut app, START + 100);
    }

    #[test]
    fn overlay_is_stamped_on_the_frame_not_the_fireworks() {
        let mut app = app(Some(START - 1));
        app.start(START);
        app.tick(START);
        let before: Vec<Rgb> = (0..60).map(|y| app.finale.draw().get(40, y)).collect();
        let shown = screen(&mut app, START + 1_500);
        assert!(shown.contains('新'));
        let after: Vec<Rgb> = (0..60).map(|y| app.finale.draw().get(40, y)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn wrapping() {
        assert_eq!(wrap("a bb ccc", 4), vec!["a bb", "ccc"]);
        assert_eq!(wrap("  ", 10), Vec::<String>::new());
        assert_eq!(wrap("unbreakable word", 5), vec!["unbreakable", "word"]);
    }
}
