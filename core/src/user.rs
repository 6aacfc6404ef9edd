//! Subscriber records returned by `SUBSCRIBER-DETAILS`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use crate::attribute::{all_types, search, Attribute, AttributeSet, Context, Filter, FilterCriterium, Property};
use crate::types::parse_id;

/// A Mailin subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: Option<u64>,
    email: String,
    blacklisted: bool,
    created: Option<NaiveDateTime>,
    lists: BTreeMap<u64, String>,
    attributes: Filter,
}

impl User {
    /// `list_ids` entries look like `"<listId>:<label>"`; entries that do
    /// not are ignored.
    pub fn new<'a>(
        id: Option<u64>,
        email: impl Into<String>,
        blacklisted: bool,
        entered: Option<&str>,
        list_ids: impl IntoIterator<Item = &'a str>,
        attributes: AttributeSet,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            blacklisted,
            created: entered.and_then(parse_timestamp),
            lists: list_ids.into_iter().filter_map(parse_list_entry).collect(),
            attributes: in_user_order(attributes),
        }
    }

    /// Build a user from its wire record, reading attributes from every
    /// user-context collection present in it.
    pub fn from_wire(record: &Value) -> Option<Self> {
        let record = record.as_object()?;

        let mut attributes = AttributeSet::new();
        for (type_key, kind) in all_types(Context::User) {
            let Some(Value::Object(values)) = record.get(*type_key) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            let group = values
                .iter()
                .map(|(name, value)| {
                    Attribute::from_definition(*kind, &json!({ "name": name }), Some(value.clone()))
                })
                .collect();
            attributes.insert((*type_key).to_string(), group);
        }

        let list_ids: Vec<&str> = match record.get("listid") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(item)) => vec![item.as_str()],
            _ => Vec::new(),
        };

        Some(Self::new(
            record.get("id").and_then(parse_id),
            record.get("email").and_then(Value::as_str).unwrap_or_default(),
            record.get("blacklisted").is_some_and(is_truthy),
            record.get("entered").and_then(Value::as_str),
            list_ids,
            attributes,
        ))
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub fn created(&self) -> Option<NaiveDateTime> {
        self.created
    }

    /// The registration date rendered with a `strftime`-style format.
    pub fn created_formatted(&self, format: &str) -> Option<String> {
        self.created.map(|created| created.format(format).to_string())
    }

    /// List ID → label of every list the user is registered to.
    pub fn lists(&self) -> &BTreeMap<u64, String> {
        &self.lists
    }

    pub fn is_registered(&self, list_id: u64) -> bool {
        self.lists.contains_key(&list_id)
    }

    pub fn attributes(&self) -> &Filter {
        &self.attributes
    }

    /// Find an attribute by its user-context collection key and name.
    pub fn attribute(&self, type_key: &str, name: &str) -> Option<&Attribute> {
        let predicates = [
            (Property::Type(Context::User), FilterCriterium::equals(type_key)),
            (Property::Name, FilterCriterium::equals(name)),
        ];
        let found = search(self.attributes.attributes(), &predicates).next();
        found
    }
}

/// Flatten grouped attributes in user-context type order. Keys outside that
/// context keep their sorted order at the end.
fn in_user_order(mut grouped: AttributeSet) -> Filter {
    let mut ordered: Vec<(String, Vec<Attribute>)> = Vec::with_capacity(grouped.len());
    for (type_key, _) in all_types(Context::User) {
        if let Some(group) = grouped.remove(*type_key) {
            ordered.push(((*type_key).to_string(), group));
        }
    }
    ordered.extend(grouped);
    Filter::new(ordered)
}

fn parse_list_entry(entry: &str) -> Option<(u64, String)> {
    let (id, label) = entry.split_once(':')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || label.is_empty() {
        return None;
    }
    Some((id.parse().ok()?, label.trim().to_string()))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    }
}
