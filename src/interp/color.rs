//! VGA-style 4-bit color palette and ANSI escape helpers.

/// Resolve a palette name to its 4-bit index, honoring the `BRIGHT*` aliases
/// for the high half of the palette.
pub fn color_index(name: &str) -> Option<u8> {
    let upper = name.trim().to_ascii_uppercase();
    let base = upper.strip_prefix("BRIGHT").unwrap_or(&upper);
    let idx = match base {
        "BLACK" => 0,
        "BLUE" => 1,
        "GREEN" => 2,
        "CYAN" => 3,
        "RED" => 4,
        "MAGENTA" => 5,
        "BROWN" => 6,
        "LIGHTGRAY" => 7,
        "DARKGRAY" => 8,
        "LIGHTBLUE" => 9,
        "LIGHTGREEN" => 10,
        "LIGHTCYAN" => 11,
        "LIGHTRED" => 12,
        "LIGHTMAGENTA" => 13,
        "YELLOW" => 14,
        "WHITE" => 15,
        _ => return None,
    };
    if upper.starts_with("BRIGHT") && idx < 8 {
        Some(idx + 8)
    } else {
        Some(idx)
    }
}

pub fn fg_code(index: u8) -> u32 {
    if index < 8 {
        30 + index as u32
    } else {
        90 + (index as u32 - 8)
    }
}

pub fn bg_code(index: u8) -> u32 {
    if index < 8 {
        40 + index as u32
    } else {
        100 + (index as u32 - 8)
    }
}

pub const RESET: &str = "\x1b[0m";
pub const CLEAR: &str = "\x1b[2J\x1b[H";

pub fn cursor_seq(row: u32, col: u32) -> String {
    format!("\x1b[{};{}H", row, col)
}
