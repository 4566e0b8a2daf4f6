//! Marker catalog and allocation.
//!
//! Item positions map onto a fixed ordered catalog of 50 distinct reaction
//! symbols: keycaps 1-10, regional indicators A-Z, then enclosed letters and
//! ideographs. Assignment depends only on the current position, so removing
//! an item shifts every marker after it.

use std::hash::{Hash, Hasher};

use crate::domain::list::ShoppingList;

const VARIATION_SELECTOR_16: char = '\u{fe0f}';

pub const ITEM_MARKERS: [&str; 50] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
    "6\u{fe0f}\u{20e3}",
    "7\u{fe0f}\u{20e3}",
    "8\u{fe0f}\u{20e3}",
    "9\u{fe0f}\u{20e3}",
    "\u{1f51f}",
    "\u{1f1e6}",
    "\u{1f1e7}",
    "\u{1f1e8}",
    "\u{1f1e9}",
    "\u{1f1ea}",
    "\u{1f1eb}",
    "\u{1f1ec}",
    "\u{1f1ed}",
    "\u{1f1ee}",
    "\u{1f1ef}",
    "\u{1f1f0}",
    "\u{1f1f1}",
    "\u{1f1f2}",
    "\u{1f1f3}",
    "\u{1f1f4}",
    "\u{1f1f5}",
    "\u{1f1f6}",
    "\u{1f1f7}",
    "\u{1f1f8}",
    "\u{1f1f9}",
    "\u{1f1fa}",
    "\u{1f1fb}",
    "\u{1f1fc}",
    "\u{1f1fd}",
    "\u{1f1fe}",
    "\u{1f1ff}",
    "\u{1f170}\u{fe0f}",
    "\u{1f171}\u{fe0f}",
    "\u{1f18e}",
    "\u{1f191}",
    "\u{1f192}",
    "\u{1f193}",
    "\u{1f194}",
    "\u{1f195}",
    "\u{1f196}",
    "\u{1f197}",
    "\u{1f198}",
    "\u{1f199}",
    "\u{1f19a}",
    "\u{1f201}",
];

pub const MAX_ADDRESSABLE_ITEMS: usize = ITEM_MARKERS.len();

pub const CLEAR_COMPLETED_MARKER: &str = "\u{1f9f9}";
pub const ADD_ITEM_MARKER: &str = "\u{2795}";
pub const EDIT_MARKER: &str = "\u{270f}\u{fe0f}";

/// A reaction symbol attached to a rendered message.
///
/// Equality and hashing ignore emoji presentation selectors and surrounding
/// colons, since platforms echo back symbols with or without them.
#[derive(Clone, Debug)]
pub struct Marker(String);

impl Marker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }

    fn key_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.0.trim().trim_matches(':').chars().filter(|ch| *ch != VARIATION_SELECTOR_16)
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.key_chars().eq(other.key_chars())
    }
}

impl Eq for Marker {}

impl Hash for Marker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for ch in self.key_chars() {
            ch.hash(state);
        }
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Marker {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionMarker {
    ClearCompleted,
    AddItem,
    Edit,
}

impl ActionMarker {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::ClearCompleted => CLEAR_COMPLETED_MARKER,
            Self::AddItem => ADD_ITEM_MARKER,
            Self::Edit => EDIT_MARKER,
        }
    }

    pub fn marker(self) -> Marker {
        Marker::new(self.symbol())
    }
}

/// What a marker means for a given list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Item(usize),
    Action(ActionMarker),
}

pub fn item_marker(position: usize) -> Option<Marker> {
    ITEM_MARKERS.get(position).map(|symbol| Marker::new(*symbol))
}

pub fn classify(marker: &Marker) -> Option<MarkerKind> {
    if let Some(position) =
        ITEM_MARKERS.iter().position(|symbol| Marker::new(*symbol) == *marker)
    {
        return Some(MarkerKind::Item(position));
    }

    [ActionMarker::ClearCompleted, ActionMarker::AddItem, ActionMarker::Edit]
        .into_iter()
        .find(|action| action.marker() == *marker)
        .map(MarkerKind::Action)
}

/// Markers the list's render target should carry, in application order.
///
/// An empty list requires nothing at all, action markers included.
pub fn required_markers(list: &ShoppingList) -> Vec<Marker> {
    if list.is_empty() {
        return Vec::new();
    }

    let mut required: Vec<Marker> =
        (0..list.items.len()).map_while(item_marker).collect();

    if list.has_checked_items() {
        required.push(ActionMarker::ClearCompleted.marker());
    }
    required.push(ActionMarker::AddItem.marker());
    required.push(ActionMarker::Edit.marker());
    required
}
