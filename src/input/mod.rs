use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A key press reduced to what a glyph needs: the label to shape and the
/// numeric key code shown beside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub label: String,
    pub code: u32,
}

impl KeyPress {
    pub fn new(label: impl Into<String>, code: u32) -> Self {
        Self {
            label: label.into(),
            code,
        }
    }

    pub fn code_label(&self) -> String {
        self.code.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputAction {
    Spawn(KeyPress),
    Quit,
}

/// Maps a terminal key event onto an action. Releases, repeats and keys
/// without a sensible label yield `None`.
pub fn translate(event: &KeyEvent) -> Option<InputAction> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    if event.code == KeyCode::Esc
        || (event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL))
    {
        return Some(InputAction::Quit);
    }
    key_press(event.code).map(InputAction::Spawn)
}

pub fn key_press(code: KeyCode) -> Option<KeyPress> {
    let press = match code {
        KeyCode::Char(' ') => KeyPress::new("Space", 32),
        KeyCode::Char(ch) => KeyPress::new(ch.to_string(), char_key_code(ch)),
        KeyCode::Enter => KeyPress::new("Enter", 13),
        KeyCode::Tab | KeyCode::BackTab => KeyPress::new("Tab", 9),
        KeyCode::Backspace => KeyPress::new("Backspace", 8),
        KeyCode::Left => KeyPress::new("ArrowLeft", 37),
        KeyCode::Up => KeyPress::new("ArrowUp", 38),
        KeyCode::Right => KeyPress::new("ArrowRight", 39),
        KeyCode::Down => KeyPress::new("ArrowDown", 40),
        KeyCode::Insert => KeyPress::new("Insert", 45),
        KeyCode::Delete => KeyPress::new("Delete", 46),
        KeyCode::Home => KeyPress::new("Home", 36),
        KeyCode::End => KeyPress::new("End", 35),
        KeyCode::PageUp => KeyPress::new("PageUp", 33),
        KeyCode::PageDown => KeyPress::new("PageDown", 34),
        KeyCode::F(n @ 1..=12) => KeyPress::new(format!("F{n}"), 111 + u32::from(n)),
        _ => return None,
    };
    Some(press)
}

/// Legacy DOM `keyCode` for a character on a US layout. Shifted symbols share
/// the code of their unshifted key; anything off the layout is 0.
pub fn char_key_code(ch: char) -> u32 {
    match ch {
        'a'..='z' => ch.to_ascii_uppercase() as u32,
        'A'..='Z' | '0'..='9' => ch as u32,
        ')' => 48,
        '!' => 49,
        '@' => 50,
        '#' => 51,
        '$' => 52,
        '%' => 53,
        '^' => 54,
        '&' => 55,
        '*' => 56,
        '(' => 57,
        ' ' => 32,
        ';' | ':' => 186,
        '=' | '+' => 187,
        ',' | '<' => 188,
        '-' | '_' => 189,
        '.' | '>' => 190,
        '/' | '?' => 191,
        '`' | '~' => 192,
        '[' | '{' => 219,
        '\\' | '|' => 220,
        ']' | '}' => 221,
        '\'' | '"' => 222,
        _ => 0,
    }
}
