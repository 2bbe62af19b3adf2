//! Field name sanitization for MongoDB compatibility.
//!
//! MongoDB restricts field names (keys) from containing dots and dollar signs, which
//! carry meaning in its query syntax. Keys are escaped on the way in and restored on
//! the way out. Values are stored untouched, so filters can compare against them as-is.

use bson::{Bson, Document};


/// Escapes and restores document keys.
///
/// Replaced characters:
/// - Dots (`.`) - used for nested field access in queries
/// - Dollar signs (`$`) - used for operators in queries
/// - Null bytes (`\0`) - field name terminators
pub(crate) struct ValueSanitizer;

impl ValueSanitizer {
    /// Character replacements for sanitization
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Recursively escapes every key inside `value`.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::sanitize_value).collect()),
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_document(doc: &Document) -> Document {
        doc.iter()
            .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
            .collect()
    }

    /// Escapes one key.
    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    /// Escapes each segment of a dotted field path, keeping the dots as separators.
    pub(crate) fn sanitize_path(path: &str) -> String {
        path.split('.')
            .map(Self::sanitize_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Inverse of [`ValueSanitizer::sanitize_value`].
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::restore_value).collect()),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    /// Restores one key.
    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn keys_are_escaped_and_values_kept() {
        let original = Bson::Document(doc! {
            "name": "Dr. Smith $",
            "prices.usd": 3,
            "nested": { "$weird": ["a.b"] },
        });

        let sanitized = ValueSanitizer::sanitize_value(&original);

        assert_eq!(
            sanitized,
            Bson::Document(doc! {
                "name": "Dr. Smith $",
                "prices__dot__usd": 3,
                "nested": { "__dollar__weird": ["a.b"] },
            })
        );
        assert_eq!(ValueSanitizer::restore_value(&sanitized), original);
    }

    #[test]
    fn paths_keep_their_separators() {
        assert_eq!(ValueSanitizer::sanitize_path("address.$city"), "address.__dollar__city");
        assert_eq!(ValueSanitizer::sanitize_path("favoriteFoods"), "favoriteFoods");
    }
}
