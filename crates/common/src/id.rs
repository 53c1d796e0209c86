//! ID generation utilities.

use ulid::Ulid;

/// Generate a new ULID-based entity ID.
///
/// ULIDs are lexicographically sortable and shorter than UUIDs when
/// represented as strings.
#[must_use]
pub fn generate_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }
}
