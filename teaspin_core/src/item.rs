use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque item identifier handed out by an item store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

// Table stores hand out integer keys; accept them as well as strings.
impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(id) => ItemId(id),
            Raw::Number(id) => ItemId::from(id),
        })
    }
}

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder for items that never reached a remote store.
    pub fn local() -> Self {
        Self(format!("local-{}", uuid::Uuid::new_v4()))
    }

    /// Stable stand-in for the `index`-th default item when the store
    /// refused it. The same index always yields the same id.
    pub fn placeholder(index: usize) -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }

    /// True for ids minted by [`ItemId::placeholder`]; no store holds them.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}

const PLACEHOLDER_PREFIX: &str = "local-default-";

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BlackTea,
    GreenTea,
    ColdDew,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::BlackTea,
        Category::GreenTea,
        Category::ColdDew,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::BlackTea => "black_tea",
            Category::GreenTea => "green_tea",
            Category::ColdDew => "cold_dew",
            Category::Other => "other",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A prize on the reel. Items are never edited in place; a rename is a
/// delete followed by an insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub category: Option<Category>,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>, category: Option<Category>) -> Self {
        Self {
            id,
            name: name.into(),
            category,
        }
    }

    /// Category the item manager files this item under.
    pub fn shelf(&self) -> Category {
        self.category.unwrap_or(Category::Other)
    }
}

/// Trims a display name, rejecting blank input.
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Seed for an empty core library: the house menu.
pub fn default_library() -> Vec<(&'static str, Category)> {
    vec![
        ("陳年紅茶半糖去冰", Category::BlackTea),
        ("瑞順紅茶", Category::BlackTea),
        ("胭脂紅茶", Category::BlackTea),
        ("近美紅茶", Category::BlackTea),
        ("春芽綠茶", Category::GreenTea),
        ("雪花冷露", Category::ColdDew),
        ("陳年寒露", Category::ColdDew),
        ("春芽冷露", Category::ColdDew),
    ]
}
