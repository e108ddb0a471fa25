//! Contact-key validation.

use crate::IdentityError;
use serde::{Deserialize, Serialize};

/// Default length of a contact key (a ten-digit phone number).
pub const DEFAULT_CONTACT_DIGITS: usize = 10;

/// The contact-key format: exactly `digits` ASCII digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRule {
    digits: usize,
}

impl ContactRule {
    /// Creates a rule requiring exactly `digits` ASCII digits.
    pub fn new(digits: usize) -> Self {
        Self { digits }
    }

    /// Number of digits a contact key must have.
    pub fn digits(&self) -> usize {
        self.digits
    }

    /// Returns `true` if `contact` satisfies the rule as given.
    pub fn is_valid(&self, contact: &str) -> bool {
        contact.len() == self.digits && contact.bytes().all(|b| b.is_ascii_digit())
    }

    /// Trims `contact` and validates it, returning the stored form.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidContact` if the trimmed contact is not
    /// exactly `digits` ASCII digits.
    pub fn normalize(&self, contact: &str) -> Result<String, IdentityError> {
        let contact = contact.trim();
        if !self.is_valid(contact) {
            return Err(IdentityError::InvalidContact {
                expected_digits: self.digits,
            });
        }
        Ok(contact.to_string())
    }
}

impl Default for ContactRule {
    fn default() -> Self {
        Self::new(DEFAULT_CONTACT_DIGITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_length_digits() {
        let rule = ContactRule::default();
        assert!(rule.is_valid("0123456789"));
        assert_eq!(rule.normalize(" 0123456789\n").unwrap(), "0123456789");
    }

    #[test]
    fn rejects_wrong_length_or_non_digits() {
        let rule = ContactRule::default();
        for bad in ["", "012345678", "01234567890", "01234x6789", "+123456789", "٠١٢٣٤٥٦٧٨٩"] {
            assert!(!rule.is_valid(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn custom_length() {
        let rule = ContactRule::new(4);
        assert!(rule.is_valid("1234"));
        assert!(!rule.is_valid("0123456789"));
        match rule.normalize("12") {
            Err(IdentityError::InvalidContact { expected_digits }) => {
                assert_eq!(expected_digits, 4)
            }
            other => panic!("expected InvalidContact, got {other:?}"),
        }
    }
}
