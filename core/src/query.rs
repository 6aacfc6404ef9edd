//! Structured calls and their flat wire form.
//!
//! # Design
//! The Mailin service takes every request as a flat list of string pairs
//! posted to one endpoint; the operation is selected by the `webaction` pair.
//! Facade methods describe a request as a `Call` (an action plus typed
//! `Field`s) and `Call::normalize` turns it into a `Query`:
//!
//! - list fields are joined with their separator (`|` unless overridden),
//! - null fields, empty strings, and empty lists are dropped,
//! - `key` and `webaction` are appended unless the call already set them.
//!
//! Normalization is pure, so everything the facade sends can be asserted in
//! unit tests without a transport.

use std::fmt;
use std::str::FromStr;

/// Separator used when a list field does not specify one.
pub const DEFAULT_SEPARATOR: &str = "|";

/// Remote operations understood by the Mailin service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FolderAdd,
    FolderDelete,
    FolderGet,
    ListAdd,
    AttributeDisplay,
    AttributeAdd,
    AttributeDelete,
    UserDetails,
    UserStatus,
    UserSave,
    UserAddMultiple,
    UserBlock,
    UserUnblock,
    CampaignStats,
    CampaignUserStats,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::FolderAdd,
        Action::FolderDelete,
        Action::FolderGet,
        Action::ListAdd,
        Action::AttributeDisplay,
        Action::AttributeAdd,
        Action::AttributeDelete,
        Action::UserDetails,
        Action::UserStatus,
        Action::UserSave,
        Action::UserAddMultiple,
        Action::UserBlock,
        Action::UserUnblock,
        Action::CampaignStats,
        Action::CampaignUserStats,
    ];

    /// The `webaction` identifier sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::FolderAdd => "ADDFOLDER",
            Action::FolderDelete => "DELETE-FOLDER",
            Action::FolderGet => "DISPLAY-FOLDERS-LISTS",
            Action::ListAdd => "NEWLIST",
            Action::AttributeDisplay => "DISPLAY-ATTRIBUTES",
            Action::AttributeAdd => "CREATE-ATTRIBUTES",
            Action::AttributeDelete => "DELETE-ATTRIBUTES",
            Action::UserDetails => "SUBSCRIBER-DETAILS",
            Action::UserStatus => "USERS-STATUS",
            Action::UserSave => "USERCREADIT",
            Action::UserAddMultiple => "MULTI-USERCREADIT",
            Action::UserBlock => "EMAILBLACKLIST",
            Action::UserUnblock => "EMAILUNBLACKLIST",
            Action::CampaignStats => "CAMPAIGNDETAIL",
            Action::CampaignUserStats => "CAMPUSERDETAIL",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown webaction: {s}"))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a structured call, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Null,
    Text(String),
    Int(i64),
    /// A sequence flattened into one string. `separator: None` means `|`.
    List {
        items: Vec<String>,
        separator: Option<String>,
    },
}

impl Field {
    /// A list joined with the default separator.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Field::List {
            items: items.into_iter().map(Into::into).collect(),
            separator: None,
        }
    }

    /// A list joined with a custom separator.
    pub fn joined<I, S>(items: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Field::List {
            items: items.into_iter().map(Into::into).collect(),
            separator: Some(separator.to_string()),
        }
    }

    /// The flattened wire value, or `None` if the field must not be sent.
    pub fn flatten(&self) -> Option<String> {
        match self {
            Field::Null => None,
            Field::Text(text) if text.is_empty() => None,
            Field::Text(text) => Some(text.clone()),
            Field::Int(n) => Some(n.to_string()),
            Field::List { items, .. } if items.is_empty() => None,
            Field::List { items, separator } => {
                Some(items.join(separator.as_deref().unwrap_or(DEFAULT_SEPARATOR)))
            }
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<&String> for Field {
    fn from(value: &String) -> Self {
        Field::Text(value.clone())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Field::Text(value.to_string()), Field::Int)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Int(i64::from(value))
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Null, Into::into)
    }
}

/// A request as the facade describes it: an action and ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    action: Action,
    fields: Vec<(String, Field)>,
}

impl Call {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            fields: Vec::new(),
        }
    }

    /// Append a field. A later field with the same name replaces the earlier
    /// one in place.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }

    /// Flatten the call into the pairs the service expects.
    pub fn normalize(&self, api_key: &str) -> Query {
        let mut pairs: Vec<(String, String)> = self
            .fields
            .iter()
            .filter_map(|(name, field)| field.flatten().map(|value| (name.clone(), value)))
            .collect();

        for (name, value) in [("key", api_key), ("webaction", self.action.as_str())] {
            if !pairs.iter().any(|(existing, _)| existing == name) {
                pairs.push((name.to_string(), value.to_string()));
            }
        }

        Query {
            action: self.action,
            pairs,
        }
    }
}

/// The flat, normalized request handed to a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    action: Action,
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The pairs with the API key masked, for logs and call records.
    pub fn redacted(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .map(|(key, value)| {
                if key == "key" {
                    (key.clone(), "***".to_string())
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }
}
