//! Sidebar navigation order.
//!
//! The stored payload is a JSON array whose entries are either bare item ids
//! (`"todos"`) or item objects (`{"id": "todos", "label": "Todos", "icon": "ListTodo"}`).
//! Resolution never fails: malformed entries are skipped, unknown icons fall
//! back to [`SidebarIcon::FALLBACK`], and built-in items missing from the
//! stored order are appended.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use ts_rs::TS;

use crate::prefs::{PreferenceKey, PreferenceStore, SaveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
pub enum SidebarIcon {
    LayoutGrid,
    ListTodo,
    Calendar,
    StickyNote,
    BarChart3,
    Settings,
    Timer,
    Star,
    Circle,
}

impl SidebarIcon {
    pub const FALLBACK: SidebarIcon = SidebarIcon::Circle;

    pub const ALL: &'static [SidebarIcon] = &[
        SidebarIcon::LayoutGrid,
        SidebarIcon::ListTodo,
        SidebarIcon::Calendar,
        SidebarIcon::StickyNote,
        SidebarIcon::BarChart3,
        SidebarIcon::Settings,
        SidebarIcon::Timer,
        SidebarIcon::Star,
        SidebarIcon::Circle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SidebarIcon::LayoutGrid => "LayoutGrid",
            SidebarIcon::ListTodo => "ListTodo",
            SidebarIcon::Calendar => "Calendar",
            SidebarIcon::StickyNote => "StickyNote",
            SidebarIcon::BarChart3 => "BarChart3",
            SidebarIcon::Settings => "Settings",
            SidebarIcon::Timer => "Timer",
            SidebarIcon::Star => "Star",
            SidebarIcon::Circle => "Circle",
        }
    }

    pub fn parse(name: &str) -> Option<SidebarIcon> {
        SidebarIcon::ALL
            .iter()
            .copied()
            .find(|icon| icon.as_str() == name)
    }
}

impl fmt::Display for SidebarIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SidebarItem {
    pub id: String,
    pub label: String,
    pub icon: SidebarIcon,
}

impl SidebarItem {
    fn builtin(id: &str, label: &str, icon: SidebarIcon) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon,
        }
    }
}

pub fn default_items() -> Vec<SidebarItem> {
    vec![
        SidebarItem::builtin("matrix", "Matrix", SidebarIcon::LayoutGrid),
        SidebarItem::builtin("todos", "Todos", SidebarIcon::ListTodo),
        SidebarItem::builtin("calendar", "Calendar", SidebarIcon::Calendar),
        SidebarItem::builtin("notes", "Notes", SidebarIcon::StickyNote),
        SidebarItem::builtin("stats", "Stats", SidebarIcon::BarChart3),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Id(String),
    Item {
        id: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        icon: Option<String>,
    },
}

fn coerce_icon(item_id: &str, raw: Option<&str>, fallback: SidebarIcon) -> SidebarIcon {
    match raw {
        None => fallback,
        Some(name) => SidebarIcon::parse(name).unwrap_or_else(|| {
            debug!(
                target: "matrix_prefs",
                event = "sidebar_icon_coerced",
                id = %item_id,
                icon = %name,
                fallback = %fallback
            );
            fallback
        }),
    }
}

/// Turn a stored payload into the items to render.
pub fn resolve_items(value: &Value) -> Vec<SidebarItem> {
    let defaults = default_items();
    let entries: &[Value] = match value {
        Value::Array(entries) => entries.as_slice(),
        Value::Null => &[],
        other => {
            warn!(
                target: "matrix_prefs",
                event = "sidebar_order_coerced",
                reason = "not_an_array",
                kind = %json_kind(other)
            );
            &[]
        }
    };

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(defaults.len());
    for entry in entries {
        let parsed = match serde_json::from_value::<StoredEntry>(entry.clone()) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!(target: "matrix_prefs", event = "sidebar_entry_skipped", reason = "malformed");
                continue;
            }
        };
        let item = match parsed {
            StoredEntry::Id(id) => match defaults.iter().find(|d| d.id == id) {
                Some(builtin) => builtin.clone(),
                None => {
                    debug!(target: "matrix_prefs", event = "sidebar_entry_skipped", reason = "unknown_id", id = %id);
                    continue;
                }
            },
            StoredEntry::Item { id, label, icon } => {
                let builtin = defaults.iter().find(|d| d.id == id);
                let fallback_icon = builtin.map(|b| b.icon).unwrap_or(SidebarIcon::FALLBACK);
                let label = label
                    .filter(|l| !l.trim().is_empty())
                    .or_else(|| builtin.map(|b| b.label.clone()))
                    .unwrap_or_else(|| id.clone());
                let icon = coerce_icon(&id, icon.as_deref(), fallback_icon);
                SidebarItem { id, label, icon }
            }
        };
        if item.id.is_empty() || !seen.insert(item.id.clone()) {
            continue;
        }
        items.push(item);
    }

    for builtin in defaults {
        if !seen.contains(&builtin.id) {
            seen.insert(builtin.id.clone());
            items.push(builtin);
        }
    }
    items
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Move the item with `id` to `to_index` (clamped). Returns whether it moved.
pub fn move_item(items: &mut Vec<SidebarItem>, id: &str, to_index: usize) -> bool {
    let Some(from) = items.iter().position(|item| item.id == id) else {
        return false;
    };
    let target = to_index.min(items.len().saturating_sub(1));
    if from == target {
        return false;
    }
    let item = items.remove(from);
    items.insert(target, item);
    true
}

pub async fn load_sidebar(store: &PreferenceStore, owner_id: &str) -> Vec<SidebarItem> {
    let value = store
        .get_preference(owner_id, &PreferenceKey::sidebar_order(), Value::Null)
        .await;
    resolve_items(&value)
}

pub async fn save_sidebar(
    store: &PreferenceStore,
    owner_id: &str,
    items: &[SidebarItem],
) -> SaveOutcome {
    store
        .set_typed(owner_id, &PreferenceKey::sidebar_order(), &items)
        .await
}
