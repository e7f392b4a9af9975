use serde::{Deserialize, Serialize};

use crate::Monitor;

/// A titled group of monitors within a status page, ordered by weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorGroup {
    /// Group identifier, scoped to its owning status page.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Sort key within the section (ascending).
    pub weight: i64,
    /// Monitors claimed by this group, in the order the page listed them.
    pub monitors: Vec<Monitor>,
}

/// One status page's resolved view over the current monitor list.
///
/// The synthetic default section collects monitors not claimed by any group
/// on any configured page; it carries no groups of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPageSection {
    /// Status-page slug ("default" for the synthetic section).
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Groups sorted by (weight, title, id).
    pub groups: Vec<MonitorGroup>,
    /// Unclaimed monitors, only populated for the default section.
    pub monitors: Vec<Monitor>,
    /// Whether this is the synthetic default section.
    pub is_default: bool,
}
