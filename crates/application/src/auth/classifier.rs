//! Auth-failure classification.

use authlink_domain::CombinedError;
use authlink_domain::response::FORBIDDEN_CODE;

/// Returns true if any GraphQL error carries `extensions.code == "FORBIDDEN"`.
///
/// Network failures and every other error shape are not auth errors.
#[must_use]
pub fn is_auth_error(error: &CombinedError) -> bool {
    error
        .graphql_errors
        .iter()
        .any(|e| e.code() == Some(FORBIDDEN_CODE))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use authlink_domain::GraphQLError;

    fn parse(errors: &str) -> CombinedError {
        CombinedError::graphql(serde_json::from_str(errors).unwrap_or_default())
    }

    #[test]
    fn test_forbidden_code_is_auth_error() {
        assert!(is_auth_error(&parse(
            r#"[{"extensions":{"code":"FORBIDDEN"}}]"#
        )));
        assert!(is_auth_error(&parse(
            r#"[{"message":"a"},{"message":"b","extensions":{"code":"FORBIDDEN"}}]"#
        )));
    }

    #[test]
    fn test_other_shapes_are_not() {
        assert!(!is_auth_error(&parse(r#"[{"message":"timeout"}]"#)));
        assert!(!is_auth_error(&parse("[]")));
        assert!(!is_auth_error(&parse(
            r#"[{"extensions":{"code":"forbidden"}}]"#
        )));
        assert!(!is_auth_error(&parse(
            r#"[{"extensions":{"code":"INTERNAL_SERVER_ERROR"}}]"#
        )));
        assert!(!is_auth_error(&parse(r#"[{"extensions":{"code":403}}]"#)));
    }

    #[test]
    fn test_network_error_is_not() {
        assert!(!is_auth_error(&CombinedError::network("connection refused")));
        let mut mixed = CombinedError::network("reset");
        mixed.graphql_errors.push(GraphQLError::new("x").with_code("FORBIDDEN"));
        assert!(is_auth_error(&mixed));
    }
}
