use std::path::PathBuf;

use crate::config::ItemAction;
use crate::status::StatusSlot;

/// Ordered, renderable menu built from one config snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSpec {
    pub items: Vec<MenuItem>,
}

impl MenuSpec {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    /// Action bound to the node with this id, if any.
    pub fn action(&self, id: u16) -> Option<&ItemAction> {
        self.items.iter().find_map(|item| match item {
            MenuItem::Action { id: node, action, .. } if *node == id => Some(action),
            _ => None,
        })
    }

    pub fn status_slots(&self) -> impl Iterator<Item = StatusSlot> + '_ {
        self.items.iter().filter_map(|item| match item {
            MenuItem::Status { slot, .. } => Some(*slot),
            _ => None,
        })
    }

    /// Replaces the text of an existing placeholder. Returns false when the
    /// slot is not part of this menu.
    pub fn set_status_text(&mut self, slot: StatusSlot, text: String) -> bool {
        for item in &mut self.items {
            if let MenuItem::Status { slot: s, text: t } = item {
                if *s == slot {
                    *t = text;
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuItem {
    /// Disabled title row.
    Header(String),
    Separator,
    /// Disabled row whose text is refreshed in place.
    Status { slot: StatusSlot, text: String },
    Action {
        id: u16,
        title: String,
        enabled: bool,
        key_equivalent: String,
        action: ItemAction,
    },
}

/// What the status item shows in the menu bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpec {
    pub image: IconImage,
    pub tooltip: String,
    /// Shown as text when the image cannot be drawn.
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconImage {
    File(PathBuf),
    Symbol(String),
}
