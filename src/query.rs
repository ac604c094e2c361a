//! Work item filtering and sorting.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::{Priority, Status, WorkItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Earliest due date first; items without one go last.
    #[default]
    DueDate,
    Priority,
    Status,
    Title,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "due" | "duedate" => Ok(SortKey::DueDate),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            "title" => Ok(SortKey::Title),
            _ => Err(Error::InvalidArgument(format!("unknown sort key '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Case-insensitive match on title or assignee.
    pub search: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub board: Option<String>,
    pub sort: SortKey,
}

impl ItemQuery {
    pub fn matches(&self, item: &WorkItem) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());
        if let Some(needle) = search {
            let in_title = item.title.to_lowercase().contains(&needle);
            let in_assignee = item
                .assignee
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !in_title && !in_assignee {
                return false;
            }
        }
        self.status.map_or(true, |status| item.status == status)
            && self.priority.map_or(true, |priority| item.priority == priority)
            && self
                .board
                .as_deref()
                .map_or(true, |board| item.board == board)
    }

    /// Matching items in sort order. The sort is stable.
    pub fn run<'a>(&self, items: &'a [WorkItem]) -> Vec<&'a WorkItem> {
        let mut found: Vec<&WorkItem> = items.iter().filter(|item| self.matches(item)).collect();
        found.sort_by(|a, b| compare(self.sort, a, b));
        found
    }
}

fn compare(key: SortKey, a: &WorkItem, b: &WorkItem) -> Ordering {
    match key {
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Priority => a.priority.cmp(&b.priority),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::Title => a.title.cmp(&b.title),
    }
}
