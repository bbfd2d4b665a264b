//! Run identifier minting.

use uuid::Uuid;

/// Mints a random run id suitable for logs and API responses.
///
/// Format: `"run_"` + 32 lowercase hex chars (16 bytes of entropy).
pub fn new_run_id() -> String {
    format!("run_{}", Uuid::new_v4().simple())
}

/// True when `value` has the shape produced by [`new_run_id`].
pub fn is_valid_run_id(value: &str) -> bool {
    match value.strip_prefix("run_") {
        Some(rest) => {
            rest.len() == 32
                && rest
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_has_expected_shape() {
        let id = new_run_id();
        assert!(is_valid_run_id(&id), "unexpected run id: {id}");
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }

    #[test]
    fn validation_rejects_malformed_ids() {
        assert!(!is_valid_run_id(""));
        assert!(!is_valid_run_id("run_"));
        assert!(!is_valid_run_id("run_XYZ"));
        assert!(!is_valid_run_id("other_0123456789abcdef0123456789abcdef"));
        assert!(!is_valid_run_id("run_0123456789ABCDEF0123456789ABCDEF"));
    }
}
