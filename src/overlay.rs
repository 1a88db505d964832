//! Timed text reveal shown over the fireworks.
//!
//! Stage 0 (the title, an optional name and the greeting) appears as soon as
//! the celebration starts, the first message line joins 5 s in and the
//! second 8 s in. Stages only move forward until [`OverlaySequencer::cancel`].

use crate::canvas::{self, Canvas, Rgb};
use crate::glyphs;
use log::debug;

const FIRST_LINE_AT: i64 = 5_000;
const SECOND_LINE_AT: i64 = 8_000;
const REPLAY_HINT_AT: i64 = 10_000;
const FADE_MS: f32 = 1_000.0;

const TITLE_TOP: Rgb = (0xfd, 0xe0, 0x47);
const TITLE_BOTTOM: Rgb = (0xdc, 0x26, 0x26);
const TITLE_SHADOW: Rgb = (90, 30, 0);
const NAME_COLOR: Rgb = (255, 255, 255);
const GREETING_COLOR: Rgb = (0xec, 0x48, 0x99);
const FIRST_LINE_COLOR: Rgb = (0x67, 0xe8, 0xf9);
const SECOND_LINE_COLOR: Rgb = (0xf0, 0xab, 0xfc);
const HINT_COLOR: Rgb = (150, 150, 150);
const DIM: Rgb = (0, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Reveal,
    FirstLine,
    SecondLine,
}

impl Stage {
    fn at(elapsed: i64) -> Self {
        if elapsed >= SECOND_LINE_AT {
            Stage::SecondLine
        } else if elapsed >= FIRST_LINE_AT {
            Stage::FirstLine
        } else {
            Stage::Reveal
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayText {
    pub title: String,
    pub name: Option<String>,
    pub greeting: String,
    pub first_line: String,
    pub second_line: String,
}

impl Default for OverlayText {
    fn default() -> Self {
        Self {
            title: "2026".to_string(),
            name: None,
            greeting: "新年快乐".to_string(),
            first_line: "愿你心有山海，步履坚定".to_string(),
            second_line: "所求皆如愿，所行皆坦途".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlaySequencer {
    started_at: Option<i64>,
    stage: Stage,
}

impl Default for OverlaySequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySequencer {
    pub fn new() -> Self {
        Self { started_at: None, stage: Stage::Reveal }
    }

    /// Starts the sequence at `now`. A running sequence is left alone.
    pub fn start(&mut self, now: i64) {
        if self.started_at.is_none() {
            debug!("overlay started");
            self.started_at = Some(now);
            self.stage = Stage::Reveal;
        }
    }

    /// Drops the pending stage deadlines and returns to stage 0.
    pub fn cancel(&mut self) {
        self.started_at = None;
        self.stage = Stage::Reveal;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fires every stage whose deadline has passed. Returns the new stage
    /// when it moved.
    pub fn advance(&mut self, now: i64) -> Option<Stage> {
        let started = self.started_at?;
        let next = Stage::at(now - started);
        if next <= self.stage {
            return None;
        }
        debug!("overlay stage {} -> {}", self.stage.index(), next.index());
        self.stage = next;
        Some(next)
    }

    pub fn replay_hint_visible(&self, now: i64) -> bool {
        self.started_at.is_some_and(|started| now - started >= REPLAY_HINT_AT)
    }

    fn fade_in(&self, now: i64, from: i64) -> f32 {
        match self.started_at {
            Some(started) => ((now - started - from) as f32 / FADE_MS).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    pub fn draw(&self, canvas: &mut Canvas, text: &OverlayText, now: i64) {
        if !self.is_running() {
            return;
        }
        let rows = canvas.rows() as i32;
        let mid = rows / 2;

        if self.stage == Stage::Reveal {
            let title_scale = glyphs::fit_scale(&text.title, canvas.width() as i32 * 2 / 3, canvas.height() as i32 / 3);
            let title_h = glyphs::number_height(title_scale);
            let title_y = (canvas.height() as i32 / 2 - title_h).max(1);
            draw_gradient_number(canvas, &text.title, title_y, title_scale, self.fade_in(now, 0));

            let mut row = (title_y + title_h) / 2 + 2;
            if let Some(name) = &text.name {
                let color = canvas::mix(DIM, NAME_COLOR, self.fade_in(now, 300));
                canvas.put_text_centered(row, name, color);
                row += 2;
            }
            let color = canvas::mix(DIM, GREETING_COLOR, self.fade_in(now, 1_000));
            canvas.put_text_centered(row, &spaced(&text.greeting), color);
        } else {
            let first = canvas::mix(DIM, FIRST_LINE_COLOR, self.fade_in(now, FIRST_LINE_AT));
            canvas.put_text_centered(mid - 2, &text.first_line, first);
            if self.stage >= Stage::SecondLine {
                let second = canvas::mix(DIM, SECOND_LINE_COLOR, self.fade_in(now, SECOND_LINE_AT + 300));
                canvas.put_text_centered(mid + 2, &text.second_line, second);
            }
        }

        if self.replay_hint_visible(now) {
            let hint = canvas::mix(DIM, HINT_COLOR, self.fade_in(now, REPLAY_HINT_AT));
            canvas.put_text_centered(rows - 2, "PRESS R TO REPLAY SEQUENCE", hint);
        }
    }
}

// Letter-spaced ASCII reads better at terminal scale; wide glyphs are left as is.
fn spaced(text: &str) -> String {
    if !text.is_ascii() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() * 2);
    for (i, ch) in text.chars().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

fn draw_gradient_number(canvas: &mut Canvas, digits: &str, y: i32, scale: i32, alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let x = canvas.width() as i32 / 2 - glyphs::number_width(digits, scale) / 2;
    let offset = scale.max(2) / 2;
    glyphs::draw_number(canvas, x + offset, y + offset, digits, scale, TITLE_SHADOW, 0.8 * alpha);
    glyphs::draw_number_gradient(canvas, x, y, digits, scale, (TITLE_TOP, TITLE_BOTTOM), alpha);
}
