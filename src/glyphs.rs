//! 3x5 bitmap digits drawn into a [`Canvas`] at integer scale.

use crate::canvas::{Canvas, Rgb, mix};

pub const DIGIT_W: i32 = 3;
pub const DIGIT_H: i32 = 5;

#[rustfmt::skip]
const DIGITS: [[u8; 15]; 10] = [
    [1,1,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // 0
    [0,1,0, 1,1,0, 0,1,0, 0,1,0, 1,1,1], // 1
    [1,1,1, 0,0,1, 1,1,1, 1,0,0, 1,1,1], // 2
    [1,1,1, 0,0,1, 0,1,1, 0,0,1, 1,1,1], // 3
    [1,0,1, 1,0,1, 1,1,1, 0,0,1, 0,0,1], // 4
    [1,1,1, 1,0,0, 1,1,1, 0,0,1, 1,1,1], // 5
    [1,1,1, 1,0,0, 1,1,1, 1,0,1, 1,1,1], // 6
    [1,1,1, 0,0,1, 0,1,0, 0,1,0, 0,1,0], // 7
    [1,1,1, 1,0,1, 1,1,1, 1,0,1, 1,1,1], // 8
    [1,1,1, 1,0,1, 1,1,1, 0,0,1, 1,1,1], // 9
];

/// Pixel width of `digits` drawn at `scale`, one scaled pixel between glyphs.
pub fn number_width(digits: &str, scale: i32) -> i32 {
    let n = digits.chars().filter(char::is_ascii_digit).count() as i32;
    if n == 0 {
        return 0;
    }
    (n * (DIGIT_W + 1) - 1) * scale.max(1)
}

pub fn number_height(scale: i32) -> i32 {
    DIGIT_H * scale.max(1)
}

pub fn draw_digit(canvas: &mut Canvas, x: i32, y: i32, digit: u8, scale: i32, color: Rgb, alpha: f32) {
    let Some(glyph) = DIGITS.get(digit as usize) else {
        return;
    };
    let s = scale.max(1);
    for row in 0..DIGIT_H {
        for col in 0..DIGIT_W {
            if glyph[(row * DIGIT_W + col) as usize] == 1 {
                canvas.fill_rect(x + col * s, y + row * s, s, s, color, alpha);
            }
        }
    }
}

/// Draws the ASCII digits of `digits` with the top-left corner at `(x, y)`.
/// Non-digit characters are skipped.
pub fn draw_number(canvas: &mut Canvas, x: i32, y: i32, digits: &str, scale: i32, color: Rgb, alpha: f32) {
    let s = scale.max(1);
    let mut cx = x;
    for ch in digits.chars() {
        if let Some(d) = ch.to_digit(10) {
            draw_digit(canvas, cx, y, d as u8, s, color, alpha);
            cx += (DIGIT_W + 1) * s;
        }
    }
}

/// Draws `digits` with glyph rows shaded from `top` to `bottom`.
pub fn draw_number_gradient(
    canvas: &mut Canvas,
    x: i32,
    y: i32,
    digits: &str,
    scale: i32,
    (top, bottom): (Rgb, Rgb),
    alpha: f32,
) {
    let s = scale.max(1);
    let mut gx = x;
    for ch in digits.chars() {
        let Some(d) = ch.to_digit(10) else { continue };
        let glyph = &DIGITS[d as usize];
        for row in 0..DIGIT_H {
            let color = mix(top, bottom, row as f32 / (DIGIT_H - 1) as f32);
            for col in 0..DIGIT_W {
                if glyph[(row * DIGIT_W + col) as usize] == 1 {
                    canvas.fill_rect(gx + col * s, y + row * s, s, s, color, alpha);
                }
            }
        }
        gx += (DIGIT_W + 1) * s;
    }
}

/// Like [`draw_number`] but centered horizontally on `cx`, with a drop
/// shadow one scaled pixel down and right.
pub fn draw_number_centered(
    canvas: &mut Canvas,
    cx: i32,
    y: i32,
    digits: &str,
    scale: i32,
    color: Rgb,
    shadow: Option<Rgb>,
) {
    let x = cx - number_width(digits, scale) / 2;
    if let Some(shadow) = shadow {
        let s = scale.max(1);
        draw_number(canvas, x + s.max(2) / 2, y + s.max(2) / 2, digits, scale, shadow, 0.8);
    }
    draw_number(canvas, x, y, digits, scale, color, 1.0);
}

/// Largest scale at which `digits` fits in `max_w x max_h` pixels, at least 1.
pub fn fit_scale(digits: &str, max_w: i32, max_h: i32) -> i32 {
    let unit_w = number_width(digits, 1).max(1);
    (max_w / unit_w).min(max_h / DIGIT_H).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, WHITE};

    #[test]
    fn widths_and_fit() {
        assert_eq!(number_width("7", 1), 3);
        assert_eq!(number_width("10", 1), 7);
        assert_eq!(number_width("10", 4), 28);
        assert_eq!(number_width("", 4), 0);
        assert_eq!(fit_scale("10", 80, 48), 9);
        assert_eq!(fit_scale("10", 3, 3), 1);
    }

    #[test]
    fn one_is_drawn_where_expected() {
        let mut canvas = Canvas::new(8, 12);
        draw_number(&mut canvas, 1, 1, "1", 2, WHITE, 1.0);
        // Row 0 of the glyph is 0,1,0: only the middle column is lit.
        assert_eq!(canvas.get(1, 1), BLACK);
        assert_eq!(canvas.get(3, 1), WHITE);
        assert_eq!(canvas.get(4, 2), WHITE);
        assert_eq!(canvas.get(5, 1), BLACK);
        // Bottom row is 1,1,1.
        assert_eq!(canvas.get(1, 9), WHITE);
        assert_eq!(canvas.get(6, 10), WHITE);
    }
}
