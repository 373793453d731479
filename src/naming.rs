//! Field-name normalization
//!
//! Fixture headers arrive as free-form text ("Meetup ID", "country-code",
//! "Random  Date"). Queries and schemas need a stable attribute name, so
//! every raw name is folded once into lower-case with non-alphanumeric runs
//! collapsed to a single underscore.

/// Normalize a raw field name into an attribute-safe identifier.
///
/// Rules:
/// - ASCII lower-case
/// - any run of non-alphanumeric characters becomes one `_`
/// - leading and trailing separators are trimmed
pub fn normalize_field_name(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
        } else if !result.is_empty() && !result.ends_with('_') {
            result.push('_');
        }
    }

    result.trim_end_matches('_').to_string()
}
