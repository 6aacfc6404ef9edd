//! The Mailin facade.
//!
//! # Design
//! `MailinClient` holds the API key, a `Transport`, and a `CallLog`. Every
//! operation follows the same path: describe the request as a `Call`,
//! normalize it, record the start, send it, wrap the body in a `Response`,
//! record the end, then post-process the envelope into a domain value.
//!
//! Nothing below the facade leaks out. Transport errors become failed
//! envelopes (logged at `warn`), and every operation reports failure through
//! its sentinel: `None`, `false`, or an empty collection. Requests that fail
//! local validation are never sent, which callers can observe through the
//! call log.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::attribute::{all_types, Attribute, AttributeKind, AttributeSet, Context};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpTransport, Transport};
use crate::log::CallLog;
use crate::query::{Action, Call, Field};
use crate::response::{is_blank, Response};
use crate::types::{entities_from_wire, parse_id, Entity, EntityKind, RecipientType, UserStatus};
use crate::user::User;

const ATTRIBUTES_ADDED: &str = "OK";
const ATTRIBUTES_DELETED: &str = "Attributes deleted successfully";
const FOLDER_DELETED: &str = "success";
const USERS_SAVED: &str = "OK";
const USER_BLACKLIST_UPDATED: &str = "OK";

/// Client for the Mailin web service.
pub struct MailinClient<T = HttpTransport> {
    api_key: String,
    transport: T,
    log: CallLog,
}

impl MailinClient<HttpTransport> {
    /// A client talking to the public endpoint with default settings.
    pub fn new(api_key: &str) -> Self {
        let transport = HttpTransport::from_config(&ClientConfig::new(api_key));
        Self::with_transport(api_key, transport)
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_transport(&config.api_key, HttpTransport::from_config(config)))
    }
}

impl<T: Transport> MailinClient<T> {
    pub fn with_transport(api_key: &str, transport: T) -> Self {
        Self {
            api_key: api_key.to_string(),
            transport,
            log: CallLog::new(),
        }
    }

    /// Record calls into `log` instead of a private one.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn set_transport(&mut self, transport: T) -> &mut Self {
        self.transport = transport;
        self
    }

    fn query(&self, call: Call) -> Response {
        let query = call.normalize(&self.api_key);
        let handle = self.log.start_call(&query);

        let response = match self.transport.send(&query) {
            Ok(body) => Response::from_body(&body),
            Err(error) => {
                tracing::warn!(target: "mailin", action = %query.action(), %error, "transport failed");
                Response::from_error(&error)
            }
        };

        self.log.end_call(handle, &response);
        response
    }

    // Folders and lists

    /// Folders keyed by ID, each with its child lists. An empty `ids`
    /// requests every folder.
    pub fn get_folders(&self, ids: &[u64]) -> BTreeMap<u64, Entity> {
        let call = Call::new(Action::FolderGet).field("ids", Field::list(ids.iter().map(u64::to_string)));
        entities_from_wire(&self.query(call).into_data_on_success())
    }

    pub fn find_folder(&self, id: u64) -> Option<Entity> {
        self.find_entity(id, EntityKind::Folder)
    }

    /// Every folder whose name is exactly `name`.
    pub fn find_folders_by_name(&self, name: &str) -> BTreeMap<u64, Entity> {
        self.get_folders(&[])
            .into_iter()
            .filter(|(_, folder)| folder.is_folder() && folder.name == name)
            .collect()
    }

    /// Create a folder and return its ID. Unless `force` is set, nothing is
    /// created when a folder with the same name already exists.
    pub fn add_folder(&self, name: &str, force: bool) -> Option<u64> {
        if !force && !self.find_folders_by_name(name).is_empty() {
            tracing::debug!(target: "mailin", name, "folder already exists");
            return None;
        }
        let call = Call::new(Action::FolderAdd).field("foldername", name);
        self.query(call).result_for("folder_id").and_then(parse_id)
    }

    pub fn delete_folder(&self, id: u64) -> bool {
        let call = Call::new(Action::FolderDelete).field("list_id", id);
        self.query(call).result_is(FOLDER_DELETED)
    }

    /// Lists of the requested folders, keyed by list ID. When two folders
    /// report the same list the first one wins.
    pub fn get_lists(&self, ids: &[u64]) -> BTreeMap<u64, Entity> {
        let mut lists = BTreeMap::new();
        for folder in self.get_folders(ids).into_values() {
            for (id, list) in folder.lists {
                lists.entry(id).or_insert(list);
            }
        }
        lists
    }

    pub fn get_list(&self, id: u64) -> Option<Entity> {
        self.get_lists(&[id]).into_values().next()
    }

    pub fn get_lists_from_folder(&self, parent_id: u64) -> BTreeMap<u64, Entity> {
        self.find_folder(parent_id)
            .map(|folder| folder.lists)
            .unwrap_or_default()
    }

    pub fn find_lists_by_name(&self, name: &str, parent_id: u64) -> BTreeMap<u64, Entity> {
        self.get_lists_from_folder(parent_id)
            .into_iter()
            .filter(|(_, list)| list.is_list() && list.name == name)
            .collect()
    }

    /// Create a list under `parent_id` and return its ID. Unless `force` is
    /// set, nothing is created when the folder already has a list with that
    /// name.
    pub fn add_list(&self, name: &str, parent_id: u64, force: bool) -> Option<u64> {
        if !force && !self.find_lists_by_name(name, parent_id).is_empty() {
            tracing::debug!(target: "mailin", name, parent_id, "list already exists");
            return None;
        }
        let call = Call::new(Action::ListAdd)
            .field("listname", name)
            .field("list_parent", parent_id);
        self.query(call).result().and_then(parse_id)
    }

    /// Lists are deleted through the folder action.
    pub fn delete_list(&self, id: u64) -> bool {
        self.delete_folder(id)
    }

    pub fn find_list(&self, id: u64) -> Option<Entity> {
        self.find_entity(id, EntityKind::List)
    }

    fn find_entity(&self, id: u64, kind: EntityKind) -> Option<Entity> {
        self.get_folders(&[id])
            .remove(&id)
            .filter(|entity| entity.kind == kind)
    }

    // Attributes

    /// Attribute definitions grouped by list-context type key. An empty
    /// `types` requests every type; unknown types are ignored, and if none
    /// remain no request is made.
    pub fn get_attributes(&self, types: &[&str]) -> AttributeSet {
        let types: Vec<&str> = if types.is_empty() {
            all_types(Context::List).iter().map(|(key, _)| *key).collect()
        } else {
            types
                .iter()
                .copied()
                .filter(|key| AttributeKind::from_type_key(Context::List, key).is_some())
                .collect()
        };

        if types.is_empty() {
            tracing::debug!(target: "mailin", "no known attribute type requested");
            return AttributeSet::new();
        }

        let call = types
            .into_iter()
            .fold(Call::new(Action::AttributeDisplay), |call, key| call.field(key, 1_i64));

        let mut attributes = AttributeSet::new();
        for (type_key, records) in self.query(call).into_data_on_success() {
            let Some(kind) = AttributeKind::from_type_key(Context::List, &type_key) else {
                continue;
            };
            let group = entries(&records)
                .into_iter()
                .map(|raw| attribute_from_display(kind, raw))
                .collect();
            attributes.insert(type_key, group);
        }
        attributes
    }

    /// Create attributes. Entries under unknown type keys and invalid
    /// attributes are skipped; if nothing remains no request is made.
    pub fn add_attributes(&self, attributes: &AttributeSet) -> bool {
        let mut call = Call::new(Action::AttributeAdd);
        let mut pending = false;

        for (type_key, group) in attributes {
            if AttributeKind::from_type_key(Context::List, type_key).is_none() {
                tracing::debug!(target: "mailin", type_key = type_key.as_str(), "skipping unknown attribute type");
                continue;
            }
            let definitions: Vec<String> = group
                .iter()
                .filter(|attribute| attribute.is_valid())
                .map(ToString::to_string)
                .collect();
            if definitions.is_empty() {
                continue;
            }
            call = call.field(type_key.as_str(), Field::joined(definitions, " | "));
            pending = true;
        }

        if !pending {
            tracing::debug!(target: "mailin", "no valid attribute to add");
            return false;
        }
        self.query(call).result_is(ATTRIBUTES_ADDED)
    }

    /// Delete attributes by name, grouped by list-context type key.
    pub fn delete_attributes<K, I, N>(&self, attributes: impl IntoIterator<Item = (K, I)>) -> bool
    where
        K: AsRef<str>,
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut call = Call::new(Action::AttributeDelete);
        let mut pending = false;

        for (type_key, names) in attributes {
            let type_key = type_key.as_ref();
            if AttributeKind::from_type_key(Context::List, type_key).is_none() {
                tracing::debug!(target: "mailin", type_key, "skipping unknown attribute type");
                continue;
            }
            let names: Vec<String> = names
                .into_iter()
                .map(|name| name.as_ref().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if names.is_empty() {
                continue;
            }
            call = call.field(type_key, Field::joined(names, ", "));
            pending = true;
        }

        if !pending {
            tracing::debug!(target: "mailin", "no attribute to delete");
            return false;
        }
        self.query(call).result_is(ATTRIBUTES_DELETED)
    }

    // Users

    pub fn get_users(&self, emails: &[&str]) -> Vec<User> {
        let call = Call::new(Action::UserDetails).field("email", Field::joined(emails.iter().copied(), ","));
        self.query(call)
            .into_data_on_success()
            .values()
            .filter_map(|entry| User::from_wire(unwrap_entry(entry, "email")))
            .collect()
    }

    pub fn get_user(&self, email: &str) -> Option<User> {
        self.get_users(&[email]).into_iter().next()
    }

    /// Blacklist status of each address. Addresses the service does not
    /// report are `UserStatus::Unknown`.
    pub fn get_user_status(&self, emails: &[&str]) -> Option<BTreeMap<String, UserStatus>> {
        let call = Call::new(Action::UserStatus).field("email", Field::joined(emails.iter().copied(), ","));
        let response = self.query(call);
        let reported = response
            .result()
            .filter(|result| !is_blank(result))
            .and_then(Value::as_object)?;

        let mut statuses: BTreeMap<String, UserStatus> = reported
            .iter()
            .map(|(email, status)| (email.clone(), UserStatus::from_wire(status)))
            .collect();
        for email in emails {
            statuses.entry((*email).to_string()).or_insert(UserStatus::Unknown);
        }
        Some(statuses)
    }

    /// Create or update a subscriber and return its ID.
    ///
    /// Zero list IDs are ignored; a user must belong to at least one list,
    /// so without any no request is made. Attribute names and values are
    /// joined with `|` and are not escaped.
    pub fn save_user(
        &self,
        email: &str,
        list_ids: &[u64],
        attributes: &[(&str, &str)],
        blacklisted: bool,
    ) -> Option<u64> {
        let list_ids: Vec<String> = list_ids
            .iter()
            .filter(|id| **id != 0)
            .map(u64::to_string)
            .collect();
        if list_ids.is_empty() {
            tracing::debug!(target: "mailin", "user saved without any list");
            return None;
        }

        // Joined up front so an all-empty value string is dropped like any
        // other empty text.
        let names: Vec<&str> = attributes.iter().map(|(name, _)| *name).collect();
        let values: Vec<&str> = attributes.iter().map(|(_, value)| *value).collect();

        let call = Call::new(Action::UserSave)
            .field("email", email)
            .field("blacklisted", blacklisted)
            .field("listid", Field::list(list_ids))
            .field("attributes_name", names.join("|"))
            .field("attributes_value", values.join("|"));

        self.query(call)
            .result()
            .and_then(|result| result.get("id"))
            .and_then(parse_id)
    }

    /// Create several subscribers at once. `users` is sent JSON-encoded.
    pub fn save_users<S: Serialize + ?Sized>(&self, users: &S, list_ids: &[u64]) -> bool {
        let encoded = match serde_json::to_string(users) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(target: "mailin", %error, "could not encode users");
                return false;
            }
        };
        let call = Call::new(Action::UserAddMultiple)
            .field("attributes", encoded)
            .field("listid", Field::list(list_ids.iter().map(u64::to_string)));
        self.query(call).result_is(USERS_SAVED)
    }

    pub fn block_user(&self, email: &str) -> bool {
        let call = Call::new(Action::UserBlock).field("email", email);
        self.query(call).result_is(USER_BLACKLIST_UPDATED)
    }

    pub fn unblock_user(&self, email: &str) -> bool {
        let call = Call::new(Action::UserUnblock).field("email", email);
        self.query(call).result_is(USER_BLACKLIST_UPDATED)
    }

    // Campaigns

    pub fn campaign_stats(&self, id: u64) -> Option<Value> {
        let call = Call::new(Action::CampaignStats).field("id", id);
        self.query(call).result().cloned()
    }

    pub fn campaign_user_stats(&self, id: u64, recipients: RecipientType) -> Option<Value> {
        let call = Call::new(Action::CampaignUserStats)
            .field("id", id)
            .field("type", recipients.as_str());
        self.query(call).result().cloned()
    }
}

impl<T> fmt::Debug for MailinClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailinClient")
            .field("api_key", &"***")
            .field("calls", &self.log.count())
            .finish_non_exhaustive()
    }
}

/// The members of a JSON array or object.
fn entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Some payloads wrap each record in a one-entry container. A value that
/// already carries `marker` is taken as the record itself.
fn unwrap_entry<'a>(value: &'a Value, marker: &str) -> &'a Value {
    match value {
        Value::Object(map) if !map.contains_key(marker) => map.values().next().unwrap_or(value),
        Value::Array(items) => items.first().unwrap_or(value),
        _ => value,
    }
}

fn attribute_from_display(kind: AttributeKind, raw: &Value) -> Attribute {
    let mut record = unwrap_entry(raw, "name").clone();
    if kind == AttributeKind::Category {
        let enumeration = record.get("enumeration").map(|items| {
            entries(items)
                .into_iter()
                .map(|item| unwrap_entry(item, "label").clone())
                .collect::<Vec<_>>()
        });
        if let (Some(items), Some(fields)) = (enumeration, record.as_object_mut()) {
            fields.insert("enumeration".to_string(), Value::Array(items));
        }
    }
    Attribute::from_definition(kind, &record, None)
}
