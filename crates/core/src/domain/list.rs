use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::MessageId;

const ITEM_ID_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Short opaque identifier drawn from a v4 UUID. No ordering semantics.
    pub fn generate() -> Self {
        let mut raw = Uuid::new_v4().simple().to_string();
        raw.truncate(ITEM_ID_LEN);
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub text: String,
    pub checked: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: ItemId::generate(), text: text.into(), checked: false, created_at: Utc::now() }
    }

    /// Item text with the quantity folded in, e.g. `eggs (3)`. A quantity of
    /// one or less leaves the text untouched.
    pub fn with_quantity(text: &str, quantity: u32) -> Self {
        Self::new(quantity_label(text, quantity))
    }
}

pub fn quantity_label(text: &str, quantity: u32) -> String {
    if quantity > 1 {
        format!("{text} ({quantity})")
    } else {
        text.to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub title: String,
    pub items: Vec<Item>,
    /// Message currently displaying this list, once rendered.
    #[serde(alias = "messageId")]
    pub render_target: Option<MessageId>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ShoppingList {
    pub fn new<I, S>(title: impl Into<String>, item_texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            title: title.into(),
            items: item_texts.into_iter().map(|text| Item::new(text.as_ref().trim())).collect(),
            render_target: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_checked_items(&self) -> bool {
        self.items.iter().any(|item| item.checked)
    }

    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|item| item.checked).count()
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn item_at(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Drops checked items and returns how many were removed.
    pub fn remove_checked(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.checked);
        before - self.items.len()
    }
}
