//! Input device state the sensing and event blocks read.
//!
//! This is passive state only. Feeding events in (and firing the hats they
//! trigger) goes through the runtime's `post_*` methods, which update these
//! devices and start scripts as a side effect.

use compact_str::CompactString;

use crate::util::Timer;

/// Normalizes a raw key name (a DOM-style key value or a menu option) into
/// the canonical form key hats and `key pressed?` compare against.
pub fn normalize_key(raw: &str) -> CompactString {
    match raw {
        " " | "space" | "Space" => "space".into(),
        "ArrowUp" | "up arrow" => "up arrow".into(),
        "ArrowDown" | "down arrow" => "down arrow".into(),
        "ArrowLeft" | "left arrow" => "left arrow".into(),
        "ArrowRight" | "right arrow" => "right arrow".into(),
        "Enter" | "enter" => "enter".into(),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                // single characters match case-insensitively
                (Some(ch), None) => ch.to_lowercase().collect::<String>().into(),
                _ => raw.into(),
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Mouse {
    pub x: f64,
    pub y: f64,
    pub down: bool,
}

#[derive(Debug, Default)]
pub struct Keyboard {
    keys_down: Vec<CompactString>,
}
impl Keyboard {
    pub fn press(&mut self, key: CompactString) {
        if !self.keys_down.contains(&key) {
            self.keys_down.push(key);
        }
    }
    pub fn release(&mut self, key: &str) {
        self.keys_down.retain(|k| k != key);
    }
    /// Checks a key by its canonical name. `"any"` matches any held key.
    pub fn is_down(&self, key: &str) -> bool {
        if key == "any" {
            return !self.keys_down.is_empty();
        }
        let key = normalize_key(key);
        self.keys_down.iter().any(|k| *k == key)
    }
}

/// All input device state owned by a runtime.
#[derive(Debug)]
pub struct Io {
    pub mouse: Mouse,
    pub keyboard: Keyboard,
    /// The user-visible project timer, read by `timer` and reset by
    /// `reset timer` and the green flag.
    pub timer: Timer,
    /// Microphone loudness in `[0, 100]`, or `-1` when no audio source is
    /// attached. Fed by the embedder.
    pub loudness: f64,
}
impl Default for Io {
    fn default() -> Self {
        Self {
            mouse: Mouse::default(),
            keyboard: Keyboard::default(),
            timer: Timer::start(),
            loudness: -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        assert_eq!(normalize_key(" "), "space");
        assert_eq!(normalize_key("ArrowUp"), "up arrow");
        assert_eq!(normalize_key("up arrow"), "up arrow");
        assert_eq!(normalize_key("A"), "a");
        assert_eq!(normalize_key("a"), "a");
        assert_eq!(normalize_key("enter"), "enter");
    }

    #[test]
    fn test_keyboard() {
        let mut kb = Keyboard::default();
        assert!(!kb.is_down("any"));
        kb.press(normalize_key("A"));
        assert!(kb.is_down("a"));
        assert!(kb.is_down("A"));
        assert!(kb.is_down("any"));
        kb.press(normalize_key(" "));
        assert!(kb.is_down("space"));
        kb.release("a");
        assert!(!kb.is_down("a"));
        assert!(kb.is_down("any"));
    }
}
