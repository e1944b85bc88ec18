#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Space,
    Char(char),
}

pub const KEY_BINDINGS: &[(Key, &str)] = &[
    (Key::Up, "ADELANTE"),
    (Key::Down, "ATRAS"),
    (Key::Left, "G 90 IZQ"),
    (Key::Right, "G 90 DER"),
    (Key::Space, "DETENER"),
    (Key::Char('s'), "SUBIR VEL"),
    (Key::Char('b'), "BAJAR VEL"),
];

/// Case-sensitive: `'S'` is not bound.
pub fn action_for(key: Key) -> Option<&'static str> {
    KEY_BINDINGS
        .iter()
        .find(|(bound, _)| *bound == key)
        .map(|&(_, action)| action)
}

pub fn key_label(key: Key) -> String {
    match key {
        Key::Up => "Up".to_string(),
        Key::Down => "Down".to_string(),
        Key::Left => "Left".to_string(),
        Key::Right => "Right".to_string(),
        Key::Space => "Space".to_string(),
        Key::Char(c) => format!("'{c}'"),
    }
}
