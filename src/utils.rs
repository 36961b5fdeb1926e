/// Generate a compact correlation ID (8 hex characters) from the first 4 bytes of a UUID v4.
///
/// Short enough for log lines while still offering ~4 billion unique values,
/// so collisions are not a concern in practice.
pub fn generate_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}
