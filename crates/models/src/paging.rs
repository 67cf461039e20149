use serde::{Deserialize, Serialize};

use super::InvalidEnum;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl std::str::FromStr for Direction {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Direction::Ascending),
            "desc" | "descending" => Ok(Direction::Descending),
            _ => Err(InvalidEnum::new(s, "sort direction")),
        }
    }
}

/// One ordering criterion, e.g. sort by `ctime` descending.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Order {
    pub fn by(field: &str, direction: Direction) -> Order {
        Order {
            field: field.to_string(),
            direction,
        }
    }
}

/// Page request: zero-based page number, page size, and ordering.
/// A `page_size` of `None` means unlimited: the whole result is returned
/// and pagination headers are omitted entirely.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub order: Vec<Order>,
}

impl Pager {
    pub fn unlimited() -> Pager {
        Pager::default()
    }

    pub fn single_page(page: usize, page_size: usize) -> Pager {
        Pager {
            page,
            page_size: Some(page_size),
            order: Vec::new(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.page_size.is_none()
    }
}

/// One page of results plus the total, unpaginated result size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: Option<usize>,
    pub total_size: usize,
}

impl<T> Page<T> {
    /// Slice an already-ordered, already-filtered result into the page the
    /// pager asks for.
    pub fn slice(items: Vec<T>, pager: &Pager) -> Page<T> {
        let total_size = items.len();
        let items = match pager.page_size {
            None => items,
            Some(size) => items
                .into_iter()
                .skip(pager.page.saturating_mul(size))
                .take(size)
                .collect(),
        };
        Page {
            items,
            page: pager.page,
            page_size: pager.page_size,
            total_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_size: self.total_size,
        }
    }
}
