//! Access policy: role checks and live-event visibility.
//!
//! Everything here is pure. Callers load the data (participant name,
//! live events, interest set) and hand it in; no I/O happens in this module.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Decides which capabilities a participant holds.
///
/// The only primitive is [`AccessPolicy::is_moderator`]; the other checks
/// derive from it so a replacement policy (e.g. backed by a real auth
/// system) only has to answer one question.
pub trait AccessPolicy: Send + Sync {
    /// Returns `true` if the display name belongs to a moderator.
    fn is_moderator(&self, name: &str) -> bool;

    /// Returns `true` if the participant may attach replies to messages.
    fn can_reply(&self, name: &str) -> bool {
        self.is_moderator(name)
    }

    /// Returns `true` if the participant may create or remove courses and
    /// create or close events.
    fn can_manage_courses_and_events(&self, name: &str) -> bool {
        self.is_moderator(name)
    }
}

/// Anything optionally linked to a course.
pub trait CourseScoped {
    /// The linked course, or `None` for a general item visible to everyone.
    fn course_id(&self) -> Option<i64>;
}

/// Filters live events down to those visible to `viewer`.
///
/// An event is visible iff it has no course link, its course is in
/// `interests`, or the viewer is a moderator. Each input event is kept or
/// dropped once, so nothing is listed twice and input order is preserved.
pub fn visible_events<E: CourseScoped>(
    policy: &dyn AccessPolicy,
    viewer: &str,
    live_events: Vec<E>,
    interests: &HashSet<i64>,
) -> Vec<E> {
    if policy.is_moderator(viewer) {
        return live_events;
    }
    live_events
        .into_iter()
        .filter(|event| match event.course_id() {
            None => true,
            Some(course_id) => interests.contains(&course_id),
        })
        .collect()
}

/// Static moderator allow-list loaded from configuration.
///
/// Membership is an exact, case-sensitive match on the display name.
/// Display names are not unique, so whoever registers a listed name holds
/// its capabilities; deployments that need more swap in another
/// [`AccessPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorAllowList {
    names: BTreeSet<String>,
}

impl ModeratorAllowList {
    /// Builds an allow-list from display names. Surrounding whitespace is
    /// trimmed and blank entries are ignored.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Number of moderators on the list.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no moderators are configured.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates the moderator names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl AccessPolicy for ModeratorAllowList {
    fn is_moderator(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
