const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const ID_SLICE: usize = 8;

/// Keeps characters tmux accepts in a target name. `.` and `:` are target
/// separators for tmux, so they never survive.
pub fn sanitize_handle_component(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

pub fn handle_hash(raw: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in raw.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Backing-process handle for a session: `{prefix}-{id head}~{fnv32 of id}`.
/// The hash covers the full id so two ids sharing a prefix still differ.
pub fn session_handle_name(prefix: &str, session_id: &str) -> String {
    let sanitized = sanitize_handle_component(session_id);
    let head: String = sanitized.chars().take(ID_SLICE).collect();
    format!(
        "{}-{head}~{:08x}",
        sanitize_handle_component(prefix),
        handle_hash(session_id)
    )
}
