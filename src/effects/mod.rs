use crate::canvas::Canvas;

pub mod backdrop;
pub mod fireworks;

/// A simulated scene that owns the surface it draws on.
pub trait Effect {
    /// Advances the simulation by `dt` seconds.
    fn update(&mut self, dt: f32);
    /// Brings the surface up to date with the simulation and hands it out.
    /// Calling it again without an update yields the same picture.
    fn draw(&mut self) -> &Canvas;
    fn resize(&mut self, width: usize, height: usize);
}
