//! Key translation for hosted sessions.
//!
//! Input reaches a session either as raw bytes (pasted text, bytes read from a
//! real terminal) or as a typed [`Key`] from the UI. Both end up as a
//! [`Delivery`]: literal text typed into the pane, or a named key that tmux
//! delivers through its key table. Control characters must always take the
//! named path; hosted programs only see them as control input that way.

use std::fmt;
use std::str::FromStr;

const ESC: u8 = 0x1b;

/// Keys delivered through `tmux send-keys <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    /// Ctrl-A
    LineStart,
    /// Ctrl-C
    Interrupt,
    /// Ctrl-D
    EndOfInput,
    /// Ctrl-E
    LineEnd,
    /// Ctrl-K
    KillLine,
    /// Ctrl-L
    ClearScreen,
    /// Ctrl-U
    CancelLine,
    /// Ctrl-W
    CancelWord,
    /// Ctrl-Z
    Suspend,
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
}

impl NamedKey {
    /// Key name as understood by `tmux send-keys`.
    pub fn tmux_name(&self) -> &'static str {
        match self {
            NamedKey::LineStart => "C-a",
            NamedKey::Interrupt => "C-c",
            NamedKey::EndOfInput => "C-d",
            NamedKey::LineEnd => "C-e",
            NamedKey::KillLine => "C-k",
            NamedKey::ClearScreen => "C-l",
            NamedKey::CancelLine => "C-u",
            NamedKey::CancelWord => "C-w",
            NamedKey::Suspend => "C-z",
            NamedKey::Enter => "Enter",
            NamedKey::Tab => "Tab",
            NamedKey::Backspace => "BSpace",
            NamedKey::Escape => "Escape",
            NamedKey::Up => "Up",
            NamedKey::Down => "Down",
            NamedKey::Left => "Left",
            NamedKey::Right => "Right",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::PageUp => "PPage",
            NamedKey::PageDown => "NPage",
            NamedKey::Delete => "DC",
        }
    }

    /// Named key for a single control byte, if it has one.
    pub fn from_control_byte(byte: u8) -> Option<Self> {
        let key = match byte {
            0x01 => NamedKey::LineStart,
            0x03 => NamedKey::Interrupt,
            0x04 => NamedKey::EndOfInput,
            0x05 => NamedKey::LineEnd,
            0x0b => NamedKey::KillLine,
            0x0c => NamedKey::ClearScreen,
            0x15 => NamedKey::CancelLine,
            0x17 => NamedKey::CancelWord,
            0x1a => NamedKey::Suspend,
            b'\r' => NamedKey::Enter,
            b'\t' => NamedKey::Tab,
            0x7f => NamedKey::Backspace,
            ESC => NamedKey::Escape,
            _ => return None,
        };
        Some(key)
    }

    /// Named key for a recognized CSI sequence (`ESC [ ...`).
    pub fn from_csi(sequence: &[u8]) -> Option<Self> {
        let key = match sequence {
            [ESC, b'[', b'A'] => NamedKey::Up,
            [ESC, b'[', b'B'] => NamedKey::Down,
            [ESC, b'[', b'C'] => NamedKey::Right,
            [ESC, b'[', b'D'] => NamedKey::Left,
            [ESC, b'[', b'H'] => NamedKey::Home,
            [ESC, b'[', b'F'] => NamedKey::End,
            [ESC, b'[', b'5', b'~'] => NamedKey::PageUp,
            [ESC, b'[', b'6', b'~'] => NamedKey::PageDown,
            [ESC, b'[', b'3', b'~'] => NamedKey::Delete,
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tmux_name())
    }
}

/// How a payload reaches the hosted program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// `send-keys -l`: typed verbatim.
    Literal(String),
    /// `send-keys <name>`
    Named(NamedKey),
}

/// Translate a raw input payload.
pub fn translate_bytes(input: &[u8]) -> Delivery {
    if let [byte] = input {
        if let Some(key) = NamedKey::from_control_byte(*byte) {
            return Delivery::Named(key);
        }
    }
    if let Some(key) = NamedKey::from_csi(input) {
        return Delivery::Named(key);
    }
    Delivery::Literal(String::from_utf8_lossy(input).into_owned())
}

/// A key event coming from the dashboard UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// Ctrl held with a letter, e.g. `Ctrl('c')`.
    Ctrl(char),
    Enter,
    Tab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    /// Bracketed paste or any multi-character input.
    Paste(String),
}

/// Direction of a locally handled paging key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// What the session should do with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Handled by the viewport; never reaches the hosted program.
    Scroll(ScrollDirection),
    /// Subject to the double-escape debounce when enabled.
    Escape,
    Deliver(Delivery),
}

/// Classify a key. Paging keys are intercepted before any translation.
pub fn classify(key: &Key) -> KeyAction {
    match key {
        Key::PageUp => KeyAction::Scroll(ScrollDirection::Up),
        Key::PageDown => KeyAction::Scroll(ScrollDirection::Down),
        Key::Esc => KeyAction::Escape,
        other => KeyAction::Deliver(translate_key(other)),
    }
}

/// Translate a key event to its delivery, ignoring local interception.
pub fn translate_key(key: &Key) -> Delivery {
    match key {
        Key::Char(c) => {
            let mut buf = [0u8; 4];
            translate_bytes(c.encode_utf8(&mut buf).as_bytes())
        }
        Key::Ctrl(c) => {
            let lower = c.to_ascii_lowercase();
            if lower.is_ascii_lowercase() {
                translate_bytes(&[(lower as u8) & 0x1f])
            } else {
                Delivery::Literal(c.to_string())
            }
        }
        Key::Enter => Delivery::Named(NamedKey::Enter),
        Key::Tab => Delivery::Named(NamedKey::Tab),
        Key::Backspace => Delivery::Named(NamedKey::Backspace),
        Key::Esc => Delivery::Named(NamedKey::Escape),
        Key::Up => Delivery::Named(NamedKey::Up),
        Key::Down => Delivery::Named(NamedKey::Down),
        Key::Left => Delivery::Named(NamedKey::Left),
        Key::Right => Delivery::Named(NamedKey::Right),
        Key::Home => Delivery::Named(NamedKey::Home),
        Key::End => Delivery::Named(NamedKey::End),
        Key::PageUp => Delivery::Named(NamedKey::PageUp),
        Key::PageDown => Delivery::Named(NamedKey::PageDown),
        Key::Delete => Delivery::Named(NamedKey::Delete),
        Key::Paste(text) => translate_bytes(text.as_bytes()),
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let key = match lower.as_str() {
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "backspace" | "bspace" => Key::Backspace,
            "esc" | "escape" => Key::Esc,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pgup" | "pageup" => Key::PageUp,
            "pgdown" | "pagedown" => Key::PageDown,
            "delete" | "del" => Key::Delete,
            "space" => Key::Char(' '),
            _ => {
                if let Some(rest) = lower.strip_prefix("ctrl+") {
                    let mut chars = rest.chars();
                    return match (chars.next(), chars.next()) {
                        (Some(c), None) if c.is_ascii_alphabetic() => Ok(Key::Ctrl(c)),
                        _ => Err(format!("Invalid control key: '{}'", s)),
                    };
                }
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    (Some(_), Some(_)) => Key::Paste(s.to_string()),
                    _ => return Err("Empty key name".to_string()),
                }
            }
        };
        Ok(key)
    }
}
