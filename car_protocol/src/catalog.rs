/// Action name to firmware operation code. Names are matched verbatim.
pub const ACTIONS: &[(&str, u32)] = &[
    ("ADELANTE", 1),
    ("ATRAS", 2),
    ("DETENER", 3),
    ("V ADE DER", 100),
    ("V ADE IZQ", 200),
    ("V ATR DER", 300),
    ("V ATR IZQ", 400),
    ("G 90 DER", 500),
    ("G 90 IZQ", 600),
    ("G 360 DER", 700),
    ("G 360 IZQ", 800),
    ("SUBIR VEL", 12),
    ("BAJAR VEL", 13),
    ("GUARDAR MOV", 14),
    ("REPLICAR MOV", 15),
];

pub fn operation_id(action: &str) -> Option<u32> {
    ACTIONS
        .iter()
        .find(|(name, _)| *name == action)
        .map(|&(_, id)| id)
}
