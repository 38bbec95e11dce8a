//! Screen text and layout for the 128×64 OLED (6×10 font).
//!
//! Pure functions only; `ui::display` turns the results into pixels.

use core::fmt::Write;
use heapless::{String, Vec};

/// Display width in pixels.
pub const SCREEN_WIDTH: i32 = 128;
/// Display height in pixels.
pub const SCREEN_HEIGHT: i32 = 64;
/// Glyph cell of `FONT_6X10`.
pub const CHAR_WIDTH: i32 = 6;
pub const LINE_HEIGHT: i32 = 10;
/// Characters that fit on one line.
pub const LINE_CHARS: usize = (SCREEN_WIDTH / CHAR_WIDTH) as usize;
/// Lines that fit on the screen.
pub const MAX_LINES: usize = (SCREEN_HEIGHT / LINE_HEIGHT) as usize;

/// One rendered line of text.
pub type Line = String<LINE_CHARS>;

/// Status messages shown by the lifecycle controller.
pub mod text {
    pub const SETUP_MODE: &str = "Setup Mode\nJoin WiFi\nIoT-Node-Setup";
    pub const RESTARTING: &str = "Restarting...";
    pub const REGISTERING: &str = "Registering...";
    pub const DATA_SENT: &str = "Data Sent";
    pub const SEND_FAILED: &str = "Send Failed";
    pub const REG_FAILED: &str = "Reg. Failed";
    pub const WIFI_FAILED: &str = "WiFi Failed";
    pub const SLEEPING: &str = "Sleeping...";
    pub const FACTORY_RESET: &str = "Factory Reset";
    pub const SAVE_FAILED: &str = "Save Failed";
}

/// Values shown on the info screen.
#[derive(Clone, Copy, Debug)]
pub struct InfoScreen<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub server_url: &'a str,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl InfoScreen<'_> {
    /// Lines of the info screen, each clipped to the display width.
    pub fn lines(&self) -> [Line; 5] {
        let id = if self.id.is_empty() { "unregistered" } else { self.id };
        [
            labelled("Name: ", self.name),
            labelled("ID: ", id),
            labelled("", self.server_url),
            reading("Temp: ", self.temperature_c, " C"),
            reading("Hum:  ", self.humidity_pct, " %"),
        ]
    }
}

fn labelled(label: &str, value: &str) -> Line {
    let mut line = Line::new();
    for c in label.chars().chain(value.chars()) {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

fn reading(label: &str, value: f32, unit: &str) -> Line {
    let mut line = Line::new();
    // Every label and unit here fits well inside LINE_CHARS.
    let _ = line.push_str(label);
    if value.is_finite() {
        let _ = write!(line, "{:.1}", value);
    } else {
        let _ = line.push_str("--");
    }
    let _ = line.push_str(unit);
    line
}

/// Split status text on `\n`, dropping lines that do not fit on screen and
/// clipping each line to the display width.
pub fn split_lines(text: &str) -> Vec<&str, MAX_LINES> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let clipped = match line.char_indices().nth(LINE_CHARS) {
            Some((idx, _)) => &line[..idx],
            None => line,
        };
        if lines.push(clipped).is_err() {
            break;
        }
    }
    lines
}

/// Top-left origin of line `index` of a block of `count` centered lines.
///
/// Coordinates follow embedded-graphics' top-left text baseline.
pub fn centered_origin(line: &str, index: usize, count: usize) -> (i32, i32) {
    let width = line.chars().count() as i32 * CHAR_WIDTH;
    let block_height = count as i32 * LINE_HEIGHT;
    let x = ((SCREEN_WIDTH - width) / 2).max(0);
    let y = ((SCREEN_HEIGHT - block_height) / 2).max(0) + index as i32 * LINE_HEIGHT;
    (x, y)
}
