//! Ambient background for the countdown: a slow noise nebula with drifting
//! motes. Switching to the climax mood tints everything deep red and makes
//! the motes pulse faster; the change is eased over about a second.

use super::Effect;
use crate::canvas::{self, Canvas, Rgb};
use noise::{NoiseFn, Perlin};

const ACCENTS: [Rgb; 4] = [
    (0x4f, 0x46, 0xe5), // indigo
    (0x93, 0x33, 0xea), // purple
    (0x06, 0xb6, 0xd4), // cyan
    (0xec, 0x48, 0x99), // pink
];

const CLIMAX_BASE: Rgb = (0x1a, 0x05, 0x05);
const CLIMAX_ACCENT: Rgb = (220, 38, 38);
const NEBULA_TINT: Rgb = (0x31, 0x2e, 0x81);

// Screen pixels per mote, so larger terminals get more of them.
const PIXELS_PER_MOTE: usize = 90;
const MOOD_EASE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Calm,
    Climax,
}

struct Mote {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    color: Rgb,
    twinkle_phase: f32,
    twinkle_speed: f32,
}

impl Mote {
    fn spawn(rng: &mut fastrand::Rng, width: usize, height: usize, anywhere: bool) -> Self {
        let y = if anywhere { rng.f32() * height as f32 } else { height as f32 + 1.0 };
        Self {
            x: rng.f32() * width as f32,
            y,
            vx: (rng.f32() - 0.5) * 1.5,
            vy: -(0.5 + rng.f32() * 2.0),
            color: ACCENTS[rng.usize(0..ACCENTS.len())],
            twinkle_phase: rng.f32() * std::f32::consts::TAU,
            twinkle_speed: 0.8 + rng.f32() * 1.6,
        }
    }
}

pub struct Backdrop {
    width: usize,
    height: usize,
    base: Rgb,
    time: f32,
    mood: Mood,
    // 0.0 is calm, 1.0 is climax.
    heat: f32,
    perlin: Perlin,
    rng: fastrand::Rng,
    motes: Vec<Mote>,
    canvas: Canvas,
}

impl Backdrop {
    pub fn new(width: usize, height: usize, base: Rgb) -> Self {
        let mut rng = fastrand::Rng::new();
        let perlin = Perlin::new(rng.u32(..));
        let mut backdrop = Self {
            width,
            height,
            base,
            time: 0.0,
            mood: Mood::Calm,
            heat: 0.0,
            perlin,
            rng,
            motes: Vec::new(),
            canvas: Canvas::new(width, height),
        };
        backdrop.populate();
        backdrop
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
    }

    fn populate(&mut self) {
        let count = (self.width * self.height / PIXELS_PER_MOTE).max(8);
        self.motes.clear();
        for _ in 0..count {
            let mote = Mote::spawn(&mut self.rng, self.width, self.height, true);
            self.motes.push(mote);
        }
    }
}

impl Effect for Backdrop {
    fn update(&mut self, dt: f32) {
        self.time += dt;
        // Wrap time to prevent floating point precision issues
        if self.time > 10000.0 {
            self.time -= 10000.0;
        }

        let target = match self.mood {
            Mood::Calm => 0.0,
            Mood::Climax => 1.0,
        };
        let step = MOOD_EASE * dt;
        self.heat += (target - self.heat).clamp(-step, step);

        let speed = 1.0 + self.heat * 2.0;
        let (w, h) = (self.width, self.height);
        for mote in &mut self.motes {
            mote.x += mote.vx * speed * dt;
            mote.y += mote.vy * speed * dt;
            mote.twinkle_phase += mote.twinkle_speed * speed * dt;
            if mote.y < -1.0 || mote.x < -1.0 || mote.x > w as f32 + 1.0 {
                *mote = Mote::spawn(&mut self.rng, w, h, false);
            }
        }
    }

    fn draw(&mut self) -> &Canvas {
        let base = canvas::mix(self.base, CLIMAX_BASE, self.heat);
        let tint = canvas::mix(NEBULA_TINT, CLIMAX_ACCENT, self.heat);
        let t = self.time as f64 * 0.05;

        for y in 0..self.height {
            for x in 0..self.width {
                let n = self.perlin.get([x as f64 * 0.04, y as f64 * 0.06, t]) as f32;
                let density = ((n + 0.2) * 0.35).clamp(0.0, 0.3);
                let color = canvas::mix(base, tint, density);
                self.canvas.blend(x as i32, y as i32, color, 1.0);
            }
        }

        // Climax pulses the whole screen once a second.
        if self.heat > 0.0 {
            let pulse = (self.time * std::f32::consts::TAU).sin() * 0.5 + 0.5;
            self.canvas.wash(CLIMAX_ACCENT, 0.08 * pulse * self.heat);
        }

        for mote in &self.motes {
            let twinkle = mote.twinkle_phase.sin() * 0.5 + 0.5;
            let color = canvas::mix(mote.color, CLIMAX_ACCENT, self.heat);
            self.canvas.glow_dot(mote.x, mote.y, 0.5, color, 0.25 + twinkle * 0.5);
        }

        &self.canvas
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.canvas.resize(width, height);
        self.populate();
    }
}
