//! Validation helpers for DTOs.

use validator::ValidationErrors;

/// Map the first failing request field (in field-name order) to the error
/// tag clients receive for the matching game rule.
///
/// # Examples
///
/// ```ignore
/// // `playerCount: 9` fails the DTO range check
/// validation_kind(&errors) // "invalid_player_count"
/// ```
pub fn validation_kind(errors: &ValidationErrors) -> &'static str {
    let field_errors = errors.field_errors();
    let mut fields = field_errors.keys().map(|field| &**field).collect::<Vec<&str>>();
    fields.sort_unstable();

    match fields.first().copied() {
        Some("player_count") => "invalid_player_count",
        Some("countdown_seconds") => "invalid_countdown",
        Some("player_index") => "invalid_player_index",
        Some("name") => "invalid_player_name",
        Some("etag") => "invalid_etag",
        _ => "validation_failed",
    }
}
