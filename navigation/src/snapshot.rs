use serde::Deserialize;
use serde::Serialize;

/// A department as reported by a backend together with a search batch.
///
/// Snapshots are partial: a backend usually sends the chain from the root to
/// the active department, with only the departments along that chain carrying
/// their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub id: String,

    #[serde(default)]
    pub label: String,

    /// Label used for the "all of this department" entry.
    #[serde(default)]
    pub alt_label: String,

    /// The department has children even if none were sent.
    #[serde(default)]
    pub has_subdepartments: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavigationSnapshot>,
}

impl NavigationSnapshot {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_alt_label(mut self, alt_label: impl Into<String>) -> Self {
        self.alt_label = alt_label.into();
        self
    }

    pub fn with_children(mut self, children: Vec<NavigationSnapshot>) -> Self {
        self.children = children;
        self
    }

    /// Mark the department as having children that were not sent.
    pub fn with_subdepartments(mut self) -> Self {
        self.has_subdepartments = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn has_children(&self) -> bool {
        self.has_subdepartments || !self.children.is_empty()
    }

    /// Depth-first search for the department with the given id.
    pub fn find(&self, id: &str) -> Option<&NavigationSnapshot> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// One option of a sort-order filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub id: String,
    pub label: String,
}

/// A single-choice filter presented as an alternate navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrderFilter {
    pub id: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub options: Vec<FilterOption>,

    /// Option selected in the filter state the backend answered with.
    #[serde(default)]
    pub active: Option<String>,
}

impl SortOrderFilter {
    pub fn active_option(&self) -> Option<&FilterOption> {
        let active = self.active.as_deref()?;
        self.options.iter().find(|option| option.id == active)
    }
}
