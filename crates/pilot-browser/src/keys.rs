//! WebDriver key codepoints.
//!
//! Modifier keys stay pressed for the rest of a `send_keys` sequence until
//! `NULL` releases them.

pub const NULL: char = '\u{E000}';
pub const BACKSPACE: char = '\u{E003}';
pub const RETURN: char = '\u{E006}';
pub const ENTER: char = '\u{E007}';
pub const CONTROL: char = '\u{E009}';
pub const ALT: char = '\u{E00A}';
pub const ARROW_UP: char = '\u{E013}';
pub const ARROW_DOWN: char = '\u{E015}';
pub const META: char = '\u{E03D}';

/// Modifier used for "select all" on this platform.
pub fn select_all_modifier() -> char {
    if cfg!(target_os = "macos") {
        META
    } else {
        CONTROL
    }
}

/// Press `key` while `modifier` is held, then release everything.
pub fn chord(modifier: char, key: char) -> String {
    [modifier, key, NULL].iter().collect()
}

/// Select the whole field, overwrite it with a space and delete that.
pub fn select_all_and_erase() -> String {
    let mut keys = chord(select_all_modifier(), 'a');
    keys.push(' ');
    keys.push(BACKSPACE);
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_releases_modifier() {
        assert_eq!(chord(ALT, ARROW_DOWN), "\u{E00A}\u{E015}\u{E000}");
    }

    #[test]
    fn test_select_all_and_erase() {
        let keys = select_all_and_erase();
        assert!(keys.starts_with(select_all_modifier()));
        assert!(keys.ends_with(" \u{E003}"));
    }
}
