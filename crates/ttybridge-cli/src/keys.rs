//! Key event encoding.
//!
//! Converts crossterm key events into the byte sequences an xterm-compatible
//! terminal would send, so the remote program sees the same input it would
//! from a browser terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Local escape key (`Ctrl-]`), never forwarded.
pub const ESCAPE_BYTE: u8 = 0x1d;

/// What a key press means locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Bytes to forward to the remote terminal.
    Bytes(Vec<u8>),
    /// The local escape key.
    Escape,
}

/// Encode a key press, or `None` for keys with no terminal encoding.
pub fn encode(key: &KeyEvent) -> Option<KeyInput> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let bytes = match key.code {
        KeyCode::Char(c) if ctrl => control_byte(c).map(|byte| vec![byte])?,
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => b"\x1b".to_vec(),
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::F(n) => function_key(n)?.to_vec(),
        _ => return None,
    };

    if bytes == [ESCAPE_BYTE] {
        return Some(KeyInput::Escape);
    }
    if alt {
        let mut prefixed = Vec::with_capacity(bytes.len() + 1);
        prefixed.push(0x1b);
        prefixed.extend(bytes);
        return Some(KeyInput::Bytes(prefixed));
    }
    Some(KeyInput::Bytes(bytes))
}

fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        '@' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '/' | '7' => Some(0x1f),
        '?' | '8' => Some(0x7f),
        _ => None,
    }
}

fn function_key(n: u8) -> Option<&'static [u8]> {
    Some(match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn render(keys: &[KeyEvent]) -> String {
        keys.iter()
            .map(|k| match encode(k) {
                Some(KeyInput::Bytes(bytes)) => bytes.escape_ascii().to_string(),
                Some(KeyInput::Escape) => "<escape>".to_string(),
                None => "<none>".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn common_keys() {
        let none = KeyModifiers::NONE;
        let keys = [
            key(KeyCode::Char('a'), none),
            key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            key(KeyCode::Char('x'), KeyModifiers::ALT),
            key(KeyCode::Enter, none),
            key(KeyCode::Backspace, none),
            key(KeyCode::Up, none),
            key(KeyCode::F(5), none),
            key(KeyCode::Char(']'), KeyModifiers::CONTROL),
            key(KeyCode::CapsLock, none),
        ];

        insta::assert_snapshot!(
            render(&keys),
            @r"a \x03 \x1bx \r \x7f \x1b[A \x1b[15~ <escape> <none>"
        );
    }

    #[test]
    fn unicode_is_utf8() {
        assert_eq!(
            encode(&key(KeyCode::Char('é'), KeyModifiers::NONE)),
            Some(KeyInput::Bytes("é".as_bytes().to_vec()))
        );
    }
}
