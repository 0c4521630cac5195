//! Half-block pixel renderer. Each terminal cell shows two vertical pixels
//! via `▀` with separate foreground and background colours. Drawing is a
//! pure projection of a [`Snapshot`]; nothing here feeds back into the game.

use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{self, Color as CColor},
    terminal,
};
use pose_runner::ActionCode;
use pose_runner::session::{Snapshot, format_countdown};
use pose_runner::world::Field;

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }

    const fn dim(self) -> Rgb {
        Rgb(self.0 / 2, self.1 / 2, self.2 / 2)
    }

    fn term(self) -> CColor {
        CColor::Rgb {
            r: self.0,
            g: self.1,
            b: self.2,
        }
    }
}

const VERGE: Rgb = Rgb(40, 70, 45);
const ROAD_FAR: Rgb = Rgb(58, 58, 66);
const ROAD_NEAR: Rgb = Rgb(92, 92, 104);
const LANE_MARK: Rgb = Rgb(225, 215, 150);
const PLAYER: Rgb = Rgb(70, 160, 235);
const PLAYER_HI: Rgb = Rgb(140, 205, 255);
const CRATE: Rgb = Rgb(170, 110, 50);
const CRATE_DARK: Rgb = Rgb(120, 75, 30);
const ENEMY: Rgb = Rgb(210, 60, 70);
const ENEMY_EYE: Rgb = Rgb(255, 240, 120);
const WHITE: Rgb = Rgb(255, 255, 255);
const SHADOW: Rgb = Rgb(25, 25, 30);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

pub struct PixelBuf {
    w: usize,
    h: usize, // pixel height = terminal rows * 2
    px: Vec<Rgb>,
}

impl PixelBuf {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            px: vec![VERGE; w * h],
        }
    }

    /// Buffer covering the terminal minus its bottom row, kept for status text.
    pub fn for_terminal(cols: u16, rows: u16) -> Self {
        let mut buf = Self::new(0, 0);
        buf.fit_terminal(cols, rows);
        buf
    }

    pub fn fit_terminal(&mut self, cols: u16, rows: u16) {
        self.w = cols as usize;
        self.h = rows.saturating_sub(1) as usize * 2;
        self.px.resize(self.w * self.h, VERGE);
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    fn fill(&mut self, c: Rgb) {
        self.px.fill(c);
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    fn darken(&mut self) {
        for c in &mut self.px {
            *c = c.dim();
        }
    }

    /// Write the buffer and a status line below it.
    pub fn render(&self, out: &mut impl Write, status: &str) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut fg: Option<Rgb> = None;
        let mut bg: Option<Rgb> = None;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);

                if bg != Some(bot) {
                    queue!(out, style::SetBackgroundColor(bot.term()))?;
                    bg = Some(bot);
                }
                if top == bot {
                    queue!(out, style::Print(' '))?;
                    continue;
                }
                if fg != Some(top) {
                    queue!(out, style::SetForegroundColor(top.term()))?;
                    fg = Some(top);
                }
                queue!(out, style::Print('\u{2580}'))?; // ▀
            }
            queue!(out, style::ResetColor, style::Print("\r\n"))?;
            fg = None;
            bg = None;
        }

        let status: String = status.chars().take(self.w).collect();
        queue!(
            out,
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(status),
            style::ResetColor
        )?;
        out.flush()
    }
}

// ── Field → pixel mapping ───────────────────────────────────────────────────

/// Uniform scale that fits the play field inside the buffer, centred.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scale: f64,
    ox: f64,
    oy: f64,
}

impl Viewport {
    pub fn fit(field: &Field, pw: usize, ph: usize) -> Self {
        let scale = (pw as f64 / field.width)
            .min(ph as f64 / field.height)
            .max(0.0);
        Self {
            scale,
            ox: (pw as f64 - field.width * scale) / 2.0,
            oy: (ph as f64 - field.height * scale) / 2.0,
        }
    }

    fn x(&self, x: f64) -> i32 {
        (self.ox + x * self.scale).round() as i32
    }

    fn y(&self, y: f64) -> i32 {
        (self.oy + y * self.scale).round() as i32
    }

    fn len(&self, v: f64) -> i32 {
        (v * self.scale).round().max(1.0) as i32
    }

    /// Pixel rect `(x, y, w, h)` for a field rect.
    fn rect(&self, left: f64, top: f64, w: f64, h: f64) -> (i32, i32, i32, i32) {
        (self.x(left), self.y(top), self.len(w), self.len(h))
    }
}

// ── 3x5 bitmap digits ──────────────────────────────────────────────────────

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

fn draw_digit(buf: &mut PixelBuf, x: i32, y: i32, d: u8, fg: Rgb) {
    let glyph = &DIGITS[d as usize % 10];
    for row in 0..5 {
        for col in 0..3 {
            if glyph[row * 3 + col] == 1 {
                let px = x + col as i32;
                let py = y + row as i32;
                buf.set(px + 1, py + 1, SHADOW);
                buf.set(px, py, fg);
            }
        }
    }
}

/// Pixel width of `n` drawn with [`draw_number`].
fn number_width(n: u64) -> i32 {
    n.to_string().len() as i32 * 4 - 1 // 3px per digit + 1px spacing
}

fn draw_number(buf: &mut PixelBuf, cx: i32, y: i32, n: u64, fg: Rgb) {
    let start_x = cx - number_width(n) / 2;
    for (i, ch) in n.to_string().bytes().enumerate() {
        draw_digit(buf, start_x + i as i32 * 4, y, ch - b'0', fg);
    }
}

// ── Scene ───────────────────────────────────────────────────────────────────

pub fn draw_scene(buf: &mut PixelBuf, field: &Field, snap: &Snapshot) {
    let vp = Viewport::fit(field, buf.width(), buf.height());
    draw_road(buf, &vp, field, snap.elapsed_ms);
    for o in &snap.obstacles {
        let (x, y, w, h) = vp.rect(field.lane_left(o.lane), o.y, field.sprite_w, field.sprite_h);
        draw_crate(buf, x, y, w, h);
    }
    draw_enemy(buf, &vp, field, snap);
    draw_player(buf, &vp, field, snap);
    let cx = buf.width() as i32 / 2;
    draw_number(buf, cx, 2, snap.score, WHITE);
}

/// The scene, dimmed, with a figure showing the start gesture.
pub fn draw_lobby(buf: &mut PixelBuf, field: &Field, snap: &Snapshot) {
    draw_scene(buf, field, snap);
    buf.darken();

    let vp = Viewport::fit(field, buf.width(), buf.height());
    let cx = vp.x(field.width / 2.0);
    let top = vp.y(field.height * 0.3);
    let u = vp.len(20.0);
    // head, body, arms up
    buf.fill_rect(cx - u, top, u * 2, u * 2, PLAYER_HI);
    buf.fill_rect(cx - u / 2, top + u * 2, u, u * 4, PLAYER);
    buf.fill_rect(cx - u * 3, top - u * 2, u, u * 4, PLAYER);
    buf.fill_rect(cx + u * 2, top - u * 2, u, u * 4, PLAYER);
    buf.fill_rect(cx - u * 3, top + u * 2, u * 6, u / 2 + 1, PLAYER);
}

fn draw_road(buf: &mut PixelBuf, vp: &Viewport, field: &Field, elapsed_ms: u64) {
    buf.fill(VERGE);
    let (x0, y0, w, h) = vp.rect(0.0, 0.0, field.width, field.height);
    for dy in 0..h {
        let c = Rgb::lerp(ROAD_FAR, ROAD_NEAR, (dy * 256 / h.max(1)) as u16);
        buf.fill_rect(x0, y0 + dy, w, 1, c);
    }

    // dashed lane markings, drifting with session time
    let dash = vp.len(40.0);
    let shift = ((elapsed_ms / 20) as i32) % (dash * 2);
    for lane in 1..3 {
        let x = vp.x(field.lane_width() * lane as f64);
        let mut y = y0 - dash * 2 + shift;
        while y < y0 + h {
            let top = y.max(y0);
            let bot = (y + dash).min(y0 + h);
            if bot > top {
                buf.fill_rect(x, top, 1, bot - top, LANE_MARK);
            }
            y += dash * 2;
        }
    }
}

fn draw_crate(buf: &mut PixelBuf, x: i32, y: i32, w: i32, h: i32) {
    buf.fill_rect(x, y, w, h, CRATE);
    buf.fill_rect(x, y, w, 1, CRATE_DARK);
    buf.fill_rect(x, y + h - 1, w, 1, CRATE_DARK);
    buf.fill_rect(x, y, 1, h, CRATE_DARK);
    buf.fill_rect(x + w - 1, y, 1, h, CRATE_DARK);
    // cross brace
    for i in 0..w.min(h) {
        buf.set(x + i, y + i * h / w.max(1), CRATE_DARK);
        buf.set(x + w - 1 - i, y + i * h / w.max(1), CRATE_DARK);
    }
}

fn draw_player(buf: &mut PixelBuf, vp: &Viewport, field: &Field, snap: &Snapshot) {
    let (x, y, w, h) = vp.rect(snap.player_left, snap.player_top, field.sprite_w, field.sprite_h);
    if !snap.grounded {
        let ground = vp.y(field.baseline_top() + field.sprite_h) - 1;
        buf.fill_rect(x + w / 4, ground, w / 2, 1, SHADOW);
    }
    buf.fill_rect(x, y, w, h, PLAYER);
    buf.fill_rect(x + 1, y, (w - 2).max(1), (h / 5).max(1), PLAYER_HI);
}

fn draw_enemy(buf: &mut PixelBuf, vp: &Viewport, field: &Field, snap: &Snapshot) {
    let (x, y, w, h) = vp.rect(snap.enemy.x, snap.enemy.y, field.sprite_w, field.sprite_h);
    buf.fill_rect(x, y, w, h, ENEMY);
    let eye = (w / 5).max(1);
    buf.fill_rect(x + w / 4 - eye / 2, y + h / 3, eye, eye, ENEMY_EYE);
    buf.fill_rect(x + w * 3 / 4 - eye / 2, y + h / 3, eye, eye, ENEMY_EYE);
}

// ── Status line ─────────────────────────────────────────────────────────────

/// `raw` is the latest unfiltered classification, shown while it differs
/// from the stable action.
pub fn status_line(snap: &Snapshot, raw: Option<ActionCode>, note: &str) -> String {
    let action = snap.stable_action.map_or("-", |a| a.label());
    let mut line = format!(
        " score {}  time {}  lane {}  pose {}",
        snap.score,
        format_countdown(snap.time_remaining_secs),
        snap.player_lane,
        action,
    );
    if let Some(raw) = raw.filter(|r| Some(*r) != snap.stable_action) {
        line.push_str(&format!(" (seeing {})", raw.label()));
    }
    if !note.is_empty() {
        line.push_str("  | ");
        line.push_str(note);
    }
    line
}
