//! Shared types and access policy for the MChannel platform.
//!
//! This crate holds the cross-cutting pieces every other crate agrees on:
//! the coarse error taxonomy surfaced to callers ([`ErrorKind`]) and the
//! access policy that decides who may moderate and which live events a
//! participant may see ([`AccessPolicy`], [`ModeratorAllowList`]).

mod policy;

pub use policy::{visible_events, AccessPolicy, CourseScoped, ModeratorAllowList};

use serde::{Deserialize, Serialize};

/// Coarse classification of a failed store operation.
///
/// Every crate-level error maps onto exactly one kind so the presentation
/// layer can pick a corrective message without knowing each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Empty or malformed input (name, contact, title, body).
    Validation,
    /// A uniqueness rule was violated, or a one-shot mutation already happened.
    Conflict,
    /// A referenced participant, course, event or message does not exist.
    NotFound,
    /// The underlying store failed.
    Storage,
}

impl ErrorKind {
    /// Returns the string label for this kind.
    pub fn label(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_labels_are_distinct() {
        let labels = [
            ErrorKind::Validation.label(),
            ErrorKind::Conflict.label(),
            ErrorKind::NotFound.label(),
            ErrorKind::Storage.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn error_kind_serializes_as_variant_name() {
        let json = serde_json::to_string(&ErrorKind::NotFound).expect("should serialize");
        assert_eq!(json, "\"NotFound\"");
    }
}
