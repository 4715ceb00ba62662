use serde::Serialize;
use std::collections::BTreeMap;

/// Collects every violated field instead of stopping at the first, so a form
/// can re-render with the complete picture.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let fields: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        format!("Validation failed for: {}", fields.join(", "))
    }
}

pub const MAX_FIELD_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Required, non-blank, at most 255 characters.
pub fn check_required_text(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("The {field} field is required"));
    } else if value.chars().count() > MAX_FIELD_LEN {
        errors.add(
            field,
            format!("The {field} may not be greater than {MAX_FIELD_LEN} characters"),
        );
    }
}

pub fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "The password field is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("The password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

/// Minimal structural check: exactly one `@`, non-empty local part, and a
/// dotted domain without whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    let mut labels = domain.split('.');
    domain.contains('.') && labels.all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("admin@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co.jp"));
        assert!(!is_valid_email("admin"));
        assert!(!is_valid_email("admin@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("admin@example"));
        assert!(!is_valid_email("admin@exa mple.com"));
        assert!(!is_valid_email("admin@example..com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn test_required_text_collects_all() {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", "");
        check_required_text(&mut errors, "account", &"x".repeat(300));
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.errors["name"][0].contains("required"));
        assert!(errors.errors["account"][0].contains("255"));
    }

    #[test]
    fn test_password_rules() {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "short");
        assert!(errors.errors["password"][0].contains("at least 8"));

        let mut ok = ValidationErrors::new();
        check_password(&mut ok, "longenough");
        assert!(ok.is_empty());
    }

    #[test]
    fn test_summary_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "bad");
        errors.add("name", "bad");
        assert_eq!(errors.summary(), "Validation failed for: email, name");
    }
}
