//! Catalog interaction types.
//!
//! Wire shapes of the two endpoints and the domain model they resolve into.

use std::borrow::Borrow;

use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reference list
// ---------------------------------------------------------------------------

/// A lightweight entry of the list endpoint, dereferenced via `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub name: String,
    pub url: String,
}

/// Body of the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePage {
    /// Total number of references the catalog holds.
    pub count: u64,
    pub results: Vec<ItemReference>,
}

/// Query parameters of the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u64,
}

impl ListQuery {
    /// Query string entries in the order they are sent.
    pub fn pairs(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Item detail
// ---------------------------------------------------------------------------

/// Identity of an [Item], compared case-sensitively.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, Deref,
)]
#[serde(transparent)]
pub struct ItemName(String);

impl ItemName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ItemName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Borrow<str> for ItemName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A fully resolved catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: ItemName,
    /// Reference to the default image, if the catalog has one.
    pub image: Option<String>,
    /// Category tags in catalog order.
    pub categories: Vec<String>,
}

impl Item {
    pub fn new(
        name: impl Into<ItemName>,
        image: Option<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            image,
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Name with its first character upper-cased, for display.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn has_second_category(&self) -> bool {
        self.categories.len() > 1
    }
}

/// Body of a detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemPayload {
    name: String,
    #[serde(default)]
    sprites: Option<Sprites>,
    #[serde(default)]
    types: Vec<TypeSlot>,
}

#[derive(Debug, Clone, Deserialize)]
struct Sprites {
    #[serde(default)]
    front_default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedResource {
    name: String,
}

impl From<ItemPayload> for Item {
    fn from(payload: ItemPayload) -> Self {
        Item {
            name: payload.name.into(),
            image: payload.sprites.and_then(|sprites| sprites.front_default),
            categories: payload
                .types
                .into_iter()
                .map(|slot| slot.kind.name)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// One fetch-and-resolve cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Resolved items, in the order the list endpoint returned them.
    pub items: Vec<Item>,
    /// Total number of references reported by the list endpoint.
    pub total_count: u64,
}
