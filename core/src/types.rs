//! Domain types for folders, lists, subscriber statuses, and campaigns.
//!
//! # Design
//! `DISPLAY-FOLDERS-LISTS` returns a JSON object keyed by entity ID where
//! folders and lists are told apart only by their `type` tag. The ID is not
//! part of the record itself, so entities are built by `Entity::from_wire`
//! with the key supplied separately instead of through a serde derive. IDs
//! arrive as numbers or numeric strings depending on the action.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Type tag of a folder.
pub const TYPE_FOLDER: &str = "FOLDER";

/// Type tag of a list.
pub const TYPE_LIST: &str = "LIST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Folder,
    List,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Folder => TYPE_FOLDER,
            EntityKind::List => TYPE_LIST,
        }
    }

    fn from_wire(tag: &Value) -> Option<Self> {
        Self::deserialize(tag).ok()
    }
}

/// A folder or a mailing list.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: u64,
    pub name: String,
    pub kind: EntityKind,
    /// Parent folder of a list, when the service reports it.
    pub folder_id: Option<u64>,
    /// Child lists of a folder, keyed by list ID.
    pub lists: BTreeMap<u64, Entity>,
    /// Every other field of the wire record, untouched.
    pub extra: Map<String, Value>,
}

impl Entity {
    /// Build an entity from its wire record. Records without a recognised
    /// `type` tag are rejected.
    pub fn from_wire(id: u64, record: &Value) -> Option<Self> {
        let kind = record.get("type").and_then(EntityKind::from_wire)?;
        Some(Self::build(id, kind, record))
    }

    /// Child lists sometimes omit their tag; they are lists regardless.
    fn child_from_wire(id: u64, parent: u64, record: &Value) -> Option<Self> {
        let kind = match record.get("type").filter(|tag| tag.is_string()) {
            Some(tag) => EntityKind::from_wire(tag)?,
            None => EntityKind::List,
        };
        let mut child = Self::build(id, kind, record);
        child.folder_id.get_or_insert(parent);
        Some(child)
    }

    fn build(id: u64, kind: EntityKind, record: &Value) -> Self {
        let name = record
            .get("name")
            .map(|name| match name {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let mut lists = BTreeMap::new();
        match record.get("lists") {
            Some(Value::Object(children)) => {
                for (key, child) in children {
                    if let Some(child_id) = key.parse().ok().or_else(|| child.get("id").and_then(parse_id)) {
                        if let Some(child) = Self::child_from_wire(child_id, id, child) {
                            lists.insert(child_id, child);
                        }
                    }
                }
            }
            Some(Value::Array(children)) => {
                for child in children {
                    if let Some(child_id) = child.get("id").and_then(parse_id) {
                        if let Some(child) = Self::child_from_wire(child_id, id, child) {
                            lists.insert(child_id, child);
                        }
                    }
                }
            }
            _ => {}
        }

        let extra = record
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| !matches!(key.as_str(), "id" | "name" | "type" | "folder_id" | "lists"))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id,
            name,
            kind,
            folder_id: record.get("folder_id").and_then(parse_id),
            lists,
            extra,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntityKind::Folder
    }

    pub fn is_list(&self) -> bool {
        self.kind == EntityKind::List
    }
}

/// Parse an entity payload keyed by ID. Entries with a non-numeric key or an
/// unknown type tag are skipped.
pub fn entities_from_wire(payload: &Map<String, Value>) -> BTreeMap<u64, Entity> {
    payload
        .iter()
        .filter_map(|(key, record)| {
            let id = key.parse().ok()?;
            Entity::from_wire(id, record).map(|entity| (id, entity))
        })
        .collect()
}

/// A positive integer ID from a JSON number or numeric string.
pub fn parse_id(value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id != 0).then_some(id)
}

/// Blacklist status of a subscriber as reported by `USERS-STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserStatus {
    Active,
    Blocked,
    /// The service knows nothing about this address.
    Unknown,
}

impl UserStatus {
    /// The numeric form used by the service: 0, 1, or -1.
    pub fn code(self) -> i8 {
        match self {
            UserStatus::Active => 0,
            UserStatus::Blocked => 1,
            UserStatus::Unknown => -1,
        }
    }

    pub fn from_wire(value: &Value) -> Self {
        let code = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(flag) => Some(i64::from(*flag)),
            _ => None,
        };
        match code {
            Some(0) => UserStatus::Active,
            Some(1) => UserStatus::Blocked,
            _ => UserStatus::Unknown,
        }
    }
}

/// Which recipients of a campaign a user-statistics query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientType {
    All,
    NonClicker,
    NonOpener,
}

impl RecipientType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientType::All => "all",
            RecipientType::NonClicker => "non_clicker",
            RecipientType::NonOpener => "non_opener",
        }
    }
}
