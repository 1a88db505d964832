//! Half-block pixel surface with a text layer on top.
//!
//! Each terminal cell shows two vertically stacked pixels using `▄` with the
//! background color as the top pixel and the foreground color as the bottom
//! one, so a `cols x rows` terminal is a `cols x rows*2` canvas.

use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

pub type Rgb = (u8, u8, u8);

pub const WHITE: Rgb = (255, 255, 255);
pub const BLACK: Rgb = (0, 0, 0);

#[derive(Debug, Clone, Copy)]
enum TextCell {
    Glyph { ch: char, fg: Rgb },
    /// Right half of a double-width glyph.
    Tail,
}

pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 3]>,
    text: Vec<Option<TextCell>>,
    output_buf: Vec<u8>,
}

fn to_f32(color: Rgb) -> [f32; 3] {
    [color.0 as f32, color.1 as f32, color.2 as f32]
}

fn to_rgb(pixel: [f32; 3]) -> Rgb {
    (
        pixel[0].clamp(0.0, 255.0) as u8,
        pixel[1].clamp(0.0, 255.0) as u8,
        pixel[2].clamp(0.0, 255.0) as u8,
    )
}

pub fn mix(from: Rgb, to: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    (
        (from.0 as f32 * (1.0 - t) + to.0 as f32 * t) as u8,
        (from.1 as f32 * (1.0 - t) + to.1 as f32 * t) as u8,
        (from.2 as f32 * (1.0 - t) + to.2 as f32 * t) as u8,
    )
}

/// HSL to RGB with `h` in degrees and `s`, `l` in `0..=1`.
pub fn hsl(h: f32, s: f32, l: f32) -> Rgb {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    (
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        let rows = height.div_ceil(2);
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width * height],
            text: vec![None; width * rows],
            output_buf: Vec::with_capacity(width * height * 25),
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Terminal rows covered by the canvas.
    pub fn rows(&self) -> usize {
        self.height.div_ceil(2)
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb {
        to_rgb(self.pixels[y * self.width + x])
    }

    /// Copies the pixels of `other` and drops all text. Sizes must match;
    /// on a mismatch the surface is resized first.
    pub fn copy_from(&mut self, other: &Canvas) {
        if self.width != other.width || self.height != other.height {
            self.resize(other.width, other.height);
        }
        self.pixels.copy_from_slice(&other.pixels);
        self.clear_text();
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(to_f32(color));
    }

    /// Paints `color` over the whole surface at `alpha` opacity.
    pub fn wash(&mut self, color: Rgb, alpha: f32) {
        let c = to_f32(color);
        let a = alpha.clamp(0.0, 1.0);
        for pixel in &mut self.pixels {
            for i in 0..3 {
                pixel[i] += (c[i] - pixel[i]) * a;
            }
        }
    }

    pub fn blend(&mut self, x: i32, y: i32, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let c = to_f32(color);
        let pixel = &mut self.pixels[y as usize * self.width + x as usize];
        for i in 0..3 {
            pixel[i] += (c[i] - pixel[i]) * a;
        }
    }

    #[cfg(test)]
    pub fn set(&mut self, x: i32, y: i32, color: Rgb) {
        self.blend(x, y, color, 1.0);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb, alpha: f32) {
        for dy in 0..h {
            for dx in 0..w {
                self.blend(x + dx, y + dy, color, alpha);
            }
        }
    }

    /// A solid dot of `radius` pixels with a one pixel halo, the terminal
    /// stand-in for a blurred glow.
    pub fn glow_dot(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
        let cx = x.floor() as i32;
        let cy = y.floor() as i32;
        let r = radius.max(0.5);
        let reach = r.ceil() as i32 + 1;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let dist = ((dx * dx + dy * dy) as f32).sqrt();
                if dist < r {
                    self.blend(cx + dx, cy + dy, color, alpha);
                } else if dist < r + 1.0 {
                    self.blend(cx + dx, cy + dy, color, alpha * 0.35);
                }
            }
        }
    }

    pub fn clear_text(&mut self) {
        self.text.fill(None);
    }

    /// Drops the text in a rectangle of terminal cells.
    pub fn clear_text_rect(&mut self, col: i32, row: i32, w: i32, h: i32) {
        for r in row.max(0)..(row + h).min(self.rows() as i32) {
            for c in col.max(0)..(col + w).min(self.width as i32) {
                self.release(r as usize * self.width + c as usize);
            }
        }
    }

    /// Writes `text` starting at terminal cell `(col, row)`, clipping at the
    /// right edge. Double-width glyphs take two cells.
    pub fn put_text(&mut self, col: i32, row: i32, text: &str, fg: Rgb) {
        let rows = self.rows() as i32;
        if row < 0 || row >= rows {
            return;
        }
        let mut col = col;
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0) as i32;
            if w == 0 {
                continue;
            }
            if col >= 0 && col + w <= self.width as i32 {
                let idx = row as usize * self.width + col as usize;
                for cell in idx..idx + w as usize {
                    self.release(cell);
                }
                self.text[idx] = Some(TextCell::Glyph { ch, fg });
                if w == 2 {
                    self.text[idx + 1] = Some(TextCell::Tail);
                }
            }
            col += w;
        }
    }

    /// Empties a text cell along with the other half of a wide glyph it
    /// belongs to.
    fn release(&mut self, idx: usize) {
        match self.text[idx] {
            Some(TextCell::Tail) if idx % self.width > 0 => self.text[idx - 1] = None,
            Some(TextCell::Glyph { ch, .. }) if ch.width() == Some(2) && (idx + 1) % self.width != 0 => {
                self.text[idx + 1] = None;
            }
            _ => {}
        }
        self.text[idx] = None;
    }

    pub fn put_text_centered(&mut self, row: i32, text: &str, fg: Rgb) {
        let col = (self.width as i32 - text_width(text) as i32) / 2;
        self.put_text(col, row, text, fg);
    }

    pub fn present<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.output_buf.clear();
        self.output_buf.extend_from_slice(b"\x1b[H");

        let mut prev_top: Option<Rgb> = None;
        let mut prev_bot: Option<Rgb> = None;
        let rows = self.rows();

        for row in 0..rows {
            let y = row * 2;
            // A run of text keeps the background of its first cell.
            let mut in_text = false;
            for x in 0..self.width {
                let top = self.get(x, y);
                let bot = if y + 1 < self.height { self.get(x, y + 1) } else { top };

                match self.text[row * self.width + x] {
                    Some(TextCell::Tail) => continue,
                    Some(TextCell::Glyph { ch, fg }) => {
                        let bg = mix(top, bot, 0.5);
                        if !in_text && prev_top != Some(bg) {
                            write!(self.output_buf, "\x1b[48;2;{};{};{}m", bg.0, bg.1, bg.2)?;
                            prev_top = Some(bg);
                        }
                        in_text = true;
                        if prev_bot != Some(fg) {
                            write!(self.output_buf, "\x1b[38;2;{};{};{}m", fg.0, fg.1, fg.2)?;
                            prev_bot = Some(fg);
                        }
                        let mut utf8 = [0u8; 4];
                        self.output_buf.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                    }
                    None => {
                        in_text = false;
                        // Only emit color codes if changed
                        if prev_top != Some(top) {
                            write!(self.output_buf, "\x1b[48;2;{};{};{}m", top.0, top.1, top.2)?;
                            prev_top = Some(top);
                        }
                        if prev_bot != Some(bot) {
                            write!(self.output_buf, "\x1b[38;2;{};{};{}m", bot.0, bot.1, bot.2)?;
                            prev_bot = Some(bot);
                        }
                        self.output_buf.extend_from_slice("▄".as_bytes());
                    }
                }
            }
            self.output_buf.extend_from_slice(b"\x1b[0m");
            prev_top = None;
            prev_bot = None;
            if row + 1 < rows {
                self.output_buf.extend_from_slice(b"\r\n");
            }
        }

        out.write_all(&self.output_buf)?;
        out.flush()
    }
}

/// Display width in terminal cells.
pub fn text_width(text: &str) -> usize {
    text.chars().map(|ch| ch.width().unwrap_or(0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wash_converges_to_color() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill(WHITE);
        for _ in 0..200 {
            canvas.wash(BLACK, 0.15);
        }
        assert_eq!(canvas.get(0, 0), BLACK);
        assert_eq!(canvas.get(1, 1), BLACK);
    }

    #[test]
    fn blend_ignores_out_of_bounds() {
        let mut canvas = Canvas::new(3, 4);
        canvas.set(-1, 0, WHITE);
        canvas.set(3, 0, WHITE);
        canvas.set(0, 4, WHITE);
        canvas.set(1, 2, WHITE);
        assert_eq!(canvas.get(1, 2), WHITE);
        assert_eq!(canvas.get(0, 0), BLACK);
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl(0.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl(120.0, 1.0, 0.5), (0, 255, 0));
        assert_eq!(hsl(240.0, 1.0, 0.5), (0, 0, 255));
        assert_eq!(hsl(360.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl(0.0, 1.0, 0.6), (255, 51, 51));
    }

    #[test]
    fn present_emits_half_blocks_and_text() {
        let mut canvas = Canvas::new(4, 4);
        canvas.set(0, 0, (10, 20, 30));
        canvas.put_text(2, 1, "ok", WHITE);
        let mut out = Vec::new();
        canvas.present(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.starts_with("\x1b[H\x1b[48;2;10;20;30m\x1b[38;2;0;0;0m▄"));
        assert_eq!(s.matches('▄').count(), 6);
        assert!(s.contains("ok"));
        assert_eq!(s.matches("\r\n").count(), 1);
    }

    #[test]
    fn text_runs_are_not_split_by_background_changes() {
        let mut canvas = Canvas::new(6, 2);
        for x in 0..6 {
            canvas.set(x, 0, (x as u8 * 40, 0, 0));
        }
        canvas.put_text(0, 0, "hello", WHITE);
        let mut out = Vec::new();
        canvas.present(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("hello"));
    }

    #[test]
    fn overwriting_half_of_a_wide_glyph_clears_the_other_half() {
        for col in [0, 1] {
            let mut canvas = Canvas::new(4, 2);
            canvas.put_text(0, 0, "新", WHITE);
            canvas.put_text(col, 0, "x", WHITE);
            let mut out = Vec::new();
            canvas.present(&mut out).unwrap();
            let s = String::from_utf8(out).unwrap();
            assert!(s.contains('x') && !s.contains('新'), "col {col}");
            // Four cells in the row: one glyph and three half blocks.
            assert_eq!(s.matches('▄').count(), 3, "col {col}");
        }
    }

    #[test]
    fn copy_from_takes_pixels_but_not_text() {
        let mut source = Canvas::new(3, 2);
        source.fill((1, 2, 3));
        let mut frame = Canvas::new(3, 2);
        frame.put_text(0, 0, "a", WHITE);
        frame.copy_from(&source);
        assert_eq!(frame.get(2, 1), (1, 2, 3));
        let mut out = Vec::new();
        frame.present(&mut out).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains('a'));
    }

    #[test]
    fn wide_glyphs_take_two_cells() {
        let mut canvas = Canvas::new(6, 2);
        assert_eq!(text_width("新年"), 4);
        canvas.put_text_centered(0, "新年", WHITE);
        let mut out = Vec::new();
        canvas.present(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("新"));
        assert_eq!(s.matches('▄').count(), 2);
    }

    #[test]
    fn text_is_clipped_at_the_edge() {
        let mut canvas = Canvas::new(3, 2);
        canvas.put_text(1, 0, "abcd", WHITE);
        canvas.put_text(0, 5, "x", WHITE);
        let mut out = Vec::new();
        canvas.present(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains('a') && s.contains('b'));
        assert!(!s.contains('c'));
        assert_eq!(s.matches('▄').count(), 1);
    }
}
