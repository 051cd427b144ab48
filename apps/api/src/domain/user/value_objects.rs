use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Email value object representing a normalized email address
///
/// # Invariants
/// - Must contain '@' character
/// - Must be at least 3 characters long
/// - Stored trimmed and lowercased, so equality is case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Creates a new Email value object
    ///
    /// # Arguments
    /// * `email` - The email string to validate
    ///
    /// # Returns
    /// * `Ok(Email)` - If email is valid
    /// * `Err(String)` - If email is invalid
    ///
    /// # Example
    /// ```
    /// use accounts_api::domain::user::value_objects::Email;
    ///
    /// let email = Email::new("Test@Example.com").expect("valid email");
    /// assert_eq!(email.as_str(), "test@example.com");
    /// ```
    pub fn new(email: impl Into<String>) -> Result<Self, String> {
        let email = email.into();
        let normalized = Self::normalize(&email);
        if Self::is_valid(&normalized) {
            Ok(Email(normalized))
        } else {
            Err(format!("Invalid email: {}", email))
        }
    }

    /// Lowercases and trims an email string without validating it
    pub fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Validates an email string
    ///
    /// # Validation Rules
    /// - Must contain '@' character
    /// - Must be at least 3 characters long
    fn is_valid(email: &str) -> bool {
        email.contains('@') && email.len() >= 3
    }

    /// Returns the email as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::new(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Seller,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Customer => write!(f, "customer"),
            UserRole::Seller => write!(f, "seller"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserRole::Customer),
            "seller" => Ok(UserRole::Seller),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Inactive => write!(f, "inactive"),
            UserStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

/// A lookup key that is either a numeric primary key or an email address
///
/// Numeric input resolves by id first and falls back to an email match;
/// anything else resolves by email only.
///
/// # Example
/// ```
/// use accounts_api::domain::user::value_objects::UserIdentifier;
///
/// assert_eq!(UserIdentifier::parse("42"), UserIdentifier::Id(42));
/// assert_eq!(
///     UserIdentifier::parse("Jane@Example.com"),
///     UserIdentifier::Email("jane@example.com".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentifier {
    Id(i64),
    Email(String),
}

impl UserIdentifier {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let numeric = !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit());
        match trimmed.parse::<i64>() {
            Ok(id) if numeric => UserIdentifier::Id(id),
            _ => UserIdentifier::Email(Email::normalize(trimmed)),
        }
    }

    /// Email to try when the primary lookup misses
    pub fn email_fallback(&self) -> String {
        match self {
            UserIdentifier::Id(id) => id.to_string(),
            UserIdentifier::Email(email) => email.clone(),
        }
    }
}

impl fmt::Display for UserIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserIdentifier::Id(id) => write!(f, "{}", id),
            UserIdentifier::Email(email) => write!(f, "{}", email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email() {
        assert!(Email::new("test@example.com").is_ok());
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let email = Email::new("  Mixed.Case@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "mixed.case@example.com");
    }

    #[test]
    fn emails_differing_in_case_are_equal() {
        assert_eq!(
            Email::new("A@B.com").unwrap(),
            Email::new("a@b.COM").unwrap()
        );
    }

    #[test]
    fn invalid_email_no_at_symbol() {
        assert!(Email::new("invalid").is_err());
    }

    #[test]
    fn invalid_email_empty() {
        assert!(Email::new("").is_err());
    }

    #[test]
    fn email_deserialization_validates() {
        let parsed: Result<Email, _> = serde_json::from_str("\"nope\"");
        assert!(parsed.is_err());

        let parsed: Email = serde_json::from_str("\"X@Y.io\"").unwrap();
        assert_eq!(parsed.as_str(), "x@y.io");
    }

    #[test]
    fn role_and_status_round_trip_through_strings() {
        assert_eq!("seller".parse::<UserRole>().unwrap(), UserRole::Seller);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(
            "suspended".parse::<UserStatus>().unwrap(),
            UserStatus::Suspended
        );
        assert!("banned".parse::<UserStatus>().is_err());
    }

    #[test]
    fn defaults_match_new_account_state() {
        assert_eq!(UserRole::default(), UserRole::Customer);
        assert_eq!(UserStatus::default(), UserStatus::Active);
    }

    #[test]
    fn identifier_numeric_is_id() {
        assert_eq!(UserIdentifier::parse("007"), UserIdentifier::Id(7));
    }

    #[test]
    fn identifier_with_sign_or_space_is_email() {
        assert!(matches!(
            UserIdentifier::parse("-5"),
            UserIdentifier::Email(_)
        ));
        assert!(matches!(
            UserIdentifier::parse("12a"),
            UserIdentifier::Email(_)
        ));
    }

    #[test]
    fn identifier_overflowing_i64_is_email() {
        assert!(matches!(
            UserIdentifier::parse("99999999999999999999999"),
            UserIdentifier::Email(_)
        ));
    }

    #[test]
    fn identifier_email_fallback_uses_raw_digits() {
        assert_eq!(UserIdentifier::Id(999).email_fallback(), "999");
    }
}
