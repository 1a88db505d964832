//! The celebration fireworks.
//!
//! Rockets launch from the bottom edge, slow under gravity and burst near
//! their apex into a fixed number of particles that fan out, sag, slow down
//! and fade. The surface is washed with translucent background every frame
//! instead of being cleared, which leaves motion trails.
//!
//! Speeds and accelerations are per 1/60 s frame in reference pixels, where
//! the surface is 1080 reference pixels tall.

use super::Effect;
use crate::arena::{Arena, Handle};
use crate::canvas::{self, Canvas, Rgb, WHITE};
use log::debug;

pub const FRAME_DT: f32 = 1.0 / 60.0;
pub const BURST_PARTICLES: usize = 150;

const REFERENCE_HEIGHT: f32 = 1080.0;

const TRAIL_ALPHA: f32 = 0.15;
const FLASH_ALPHA: f32 = 0.3;

// Two independent draws per frame.
const LAUNCH_CHANCES: [f32; 2] = [0.10, 0.05];

const ROCKET_MAX_VX: f32 = 3.0;
const ROCKET_MIN_LIFT: f32 = 12.0;
const ROCKET_LIFT_SPREAD: f32 = 5.0;
const ROCKET_GRAVITY: f32 = 0.15;
// Bursts once the climb has slowed to this vertical speed.
const APEX_VY: f32 = -1.5;

const PARTICLE_MIN_SPEED: f32 = 2.0;
const PARTICLE_SPEED_SPREAD: f32 = 8.0;
const PARTICLE_GRAVITY: f32 = 0.08;
const PARTICLE_FRICTION: f32 = 0.96;
pub const PARTICLE_MIN_DECAY: f32 = 0.005;
const PARTICLE_DECAY_SPREAD: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct Rocket {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Rgb,
    pub exploded: bool,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub alpha: f32,
    pub decay: f32,
    pub color: Rgb,
    /// Radius in reference pixels, 1 to 4.
    pub size: f32,
}

pub struct Finale {
    width: usize,
    height: usize,
    scale: f32,
    background: Rgb,
    rng: fastrand::Rng,
    launch_chances: [f32; 2],
    rockets: Arena<Rocket>,
    particles: Arena<Particle>,
    // Bursts since the last paint, one white flash each.
    flashes: u32,
    active: bool,
    canvas: Canvas,
}

impl Finale {
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        Self::with_rng(width, height, background, fastrand::Rng::new())
    }

    pub fn with_rng(width: usize, height: usize, background: Rgb, rng: fastrand::Rng) -> Self {
        let mut canvas = Canvas::new(width, height);
        canvas.fill(background);
        Self {
            width,
            height,
            scale: height as f32 / REFERENCE_HEIGHT,
            background,
            rng,
            launch_chances: LAUNCH_CHANCES,
            rockets: Arena::new(),
            particles: Arena::with_capacity(BURST_PARTICLES * 8),
            flashes: 0,
            active: false,
            canvas,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        if !self.active {
            debug!("fireworks started on {}x{} px", self.width, self.height);
            self.canvas.fill(self.background);
        }
        self.active = true;
    }

    /// Stops the show and drops every rocket and particle.
    pub fn deactivate(&mut self) {
        if self.active {
            debug!(
                "fireworks stopped with {} rockets and {} particles in flight",
                self.rockets.len(),
                self.particles.len()
            );
        }
        self.active = false;
        self.flashes = 0;
        self.rockets.clear();
        self.particles.clear();
        self.canvas.fill(self.background);
    }

    /// Launches a rocket from the bottom edge at horizontal pixel `x`.
    pub fn launch(&mut self, x: f32) -> Handle {
        let s = self.scale;
        let hue = self.rng.u32(0..360) as f32;
        let rocket = Rocket {
            x,
            y: self.height as f32,
            vx: (self.rng.f32() - 0.5) * 2.0 * ROCKET_MAX_VX * s,
            vy: -(self.rng.f32() * ROCKET_LIFT_SPREAD + ROCKET_MIN_LIFT) * s,
            color: canvas::hsl(hue, 1.0, 0.6),
            exploded: false,
        };
        self.rockets.insert(rocket)
    }

    /// Advances the simulation by `dt` seconds and paints the result. Does
    /// nothing while inactive.
    pub fn tick(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        let k = (dt / FRAME_DT).max(0.0);
        if k == 0.0 {
            return;
        }
        let s = self.scale;

        // Rockets that burst on the previous tick leave now.
        self.rockets.retain(|_, rocket| !rocket.exploded);

        for chance in self.launch_chances {
            let p = 1.0 - (1.0 - chance).powf(k);
            if self.rng.f32() < p {
                let x = self.rng.f32() * self.width as f32;
                self.launch(x);
            }
        }

        let mut bursts = Vec::new();
        for rocket in self.rockets.values_mut() {
            rocket.x += rocket.vx * k;
            rocket.y += rocket.vy * k;
            rocket.vy += ROCKET_GRAVITY * s * k;
            if rocket.vy >= APEX_VY * s && !rocket.exploded {
                rocket.exploded = true;
                bursts.push((rocket.x, rocket.y, rocket.color));
            }
        }
        for (x, y, color) in bursts {
            self.burst(x, y, color);
        }

        let friction = PARTICLE_FRICTION.powf(k);
        self.particles.retain(|_, p| {
            p.x += p.vx * k;
            p.y += p.vy * k;
            p.vy += PARTICLE_GRAVITY * s * k;
            p.alpha -= p.decay * k;
            p.vx *= friction;
            p.vy *= friction;
            p.alpha > 0.0
        });

        self.paint(k);
    }

    fn burst(&mut self, x: f32, y: f32, color: Rgb) {
        let s = self.scale;
        for _ in 0..BURST_PARTICLES {
            let angle = self.rng.f32() * std::f32::consts::TAU;
            let speed = (self.rng.f32() * PARTICLE_SPEED_SPREAD + PARTICLE_MIN_SPEED) * s;
            self.particles.insert(Particle {
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                alpha: 1.0,
                decay: self.rng.f32() * PARTICLE_DECAY_SPREAD + PARTICLE_MIN_DECAY,
                color,
                size: self.rng.f32() * 3.0 + 1.0,
            });
        }
        self.flashes += 1;
    }

    /// One frame of trails: fades the previous picture by `k` frames' worth
    /// and draws every live entity on top.
    fn paint(&mut self, k: f32) {
        self.canvas.wash(self.background, 1.0 - (1.0 - TRAIL_ALPHA).powf(k));
        for _ in 0..std::mem::take(&mut self.flashes) {
            self.canvas.wash(WHITE, FLASH_ALPHA);
        }

        for rocket in self.rockets.values() {
            if rocket.exploded {
                continue;
            }
            self.canvas.glow_dot(rocket.x, rocket.y, 1.0, rocket.color, 1.0);
            self.canvas.glow_dot(
                rocket.x - rocket.vx * 2.0,
                rocket.y - rocket.vy * 2.0,
                0.5,
                WHITE,
                0.5,
            );
        }

        for p in self.particles.values() {
            let radius = 0.5 + (p.size - 1.0) * 0.2;
            self.canvas.glow_dot(p.x, p.y, radius, p.color, p.alpha);
        }
    }
}

impl Effect for Finale {
    fn update(&mut self, dt: f32) {
        self.tick(dt);
    }

    fn draw(&mut self) -> &Canvas {
        &self.canvas
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.scale = height as f32 / REFERENCE_HEIGHT;
        self.canvas.resize(width, height);
        self.canvas.fill(self.background);
    }
}

#[cfg(test)]
impl Finale {
    pub fn rocket_count(&self) -> usize {
        self.rockets.len()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn rocket(&self, handle: Handle) -> Option<&Rocket> {
        self.rockets.get(handle)
    }

    pub fn particle(&self, handle: Handle) -> Option<&Particle> {
        self.particles.get(handle)
    }

    pub fn particles(&self) -> impl Iterator<Item = (Handle, &Particle)> {
        self.particles.iter()
    }
}
