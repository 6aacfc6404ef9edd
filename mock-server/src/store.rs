//! In-memory emulation of the Mailin actions.
//!
//! Every handler takes the decoded form and returns the JSON body the
//! service would answer with. Errors are reported the way Mailin reports
//! them: a 200 response carrying `errorMsg`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{json, Map, Value};

pub type Form = HashMap<String, String>;

/// Campaign present in every fresh store.
pub const SEEDED_CAMPAIGN: u64 = 1;

/// Registration date reported for every subscriber.
pub const ENTERED: &str = "2014-05-21 10:12:33";

const LIST_ATTRIBUTE_TYPES: [&str; 5] = [
    "normal_attributes",
    "category_attributes",
    "transactional_attributes",
    "calculated_value",
    "global_computation_value",
];

const RECIPIENT_TYPES: [&str; 3] = ["all", "non_clicker", "non_opener"];

#[derive(Debug, Clone)]
struct Entity {
    name: String,
    /// `None` for folders.
    parent: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct Subscriber {
    id: u64,
    blacklisted: bool,
    lists: BTreeSet<u64>,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
struct Campaign {
    id: u64,
    campaign_name: String,
    subject: String,
    status: String,
    sent: u32,
    delivered: u32,
    viewed: u32,
    clicks: u32,
}

#[derive(Debug)]
pub struct Store {
    next_id: u64,
    entities: BTreeMap<u64, Entity>,
    attributes: BTreeMap<String, Vec<Value>>,
    subscribers: BTreeMap<String, Subscriber>,
    campaigns: BTreeMap<u64, Campaign>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let welcome = Campaign {
            id: SEEDED_CAMPAIGN,
            campaign_name: "Welcome".to_string(),
            subject: "Hello".to_string(),
            status: "sent".to_string(),
            sent: 2,
            delivered: 2,
            viewed: 1,
            clicks: 1,
        };
        Self {
            next_id: 1,
            entities: BTreeMap::new(),
            attributes: BTreeMap::new(),
            subscribers: BTreeMap::new(),
            campaigns: BTreeMap::from([(SEEDED_CAMPAIGN, welcome)]),
        }
    }

    pub fn handle(&mut self, action: &str, form: &Form) -> Value {
        match action {
            "ADDFOLDER" => self.add_folder(form),
            "DELETE-FOLDER" => self.delete_folder(form),
            "DISPLAY-FOLDERS-LISTS" => self.display_folders(form),
            "NEWLIST" => self.add_list(form),
            "DISPLAY-ATTRIBUTES" => self.display_attributes(form),
            "CREATE-ATTRIBUTES" => self.create_attributes(form),
            "DELETE-ATTRIBUTES" => self.delete_attributes(form),
            "SUBSCRIBER-DETAILS" => self.subscriber_details(form),
            "USERS-STATUS" => self.users_status(form),
            "USERCREADIT" => self.save_user(form),
            "MULTI-USERCREADIT" => self.save_users(form),
            "EMAILBLACKLIST" => self.set_blacklisted(form, true),
            "EMAILUNBLACKLIST" => self.set_blacklisted(form, false),
            "CAMPAIGNDETAIL" => self.campaign_detail(form),
            "CAMPUSERDETAIL" => self.campaign_user_detail(form),
            "" => failure("webaction is required"),
            other => failure(format!("Unknown webaction {other}")),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn is_folder(&self, id: u64) -> bool {
        self.entities.get(&id).is_some_and(|entity| entity.parent.is_none())
    }

    fn is_list(&self, id: u64) -> bool {
        self.entities.get(&id).is_some_and(|entity| entity.parent.is_some())
    }

    fn add_folder(&mut self, form: &Form) -> Value {
        let Some(name) = field(form, "foldername") else {
            return failure("Folder name is required");
        };
        let id = self.allocate();
        self.entities.insert(
            id,
            Entity {
                name: name.to_string(),
                parent: None,
            },
        );
        json!({ "folder_id": id })
    }

    fn delete_folder(&mut self, form: &Form) -> Value {
        let Some(id) = field(form, "list_id").and_then(|raw| raw.parse::<u64>().ok()) else {
            return failure("list_id is required");
        };
        if !self.entities.contains_key(&id) {
            return failure("Folder or list not found");
        }

        let removed: Vec<u64> = self
            .entities
            .iter()
            .filter(|(entity_id, entity)| **entity_id == id || entity.parent == Some(id))
            .map(|(entity_id, _)| *entity_id)
            .collect();
        for entity_id in &removed {
            self.entities.remove(entity_id);
        }
        for subscriber in self.subscribers.values_mut() {
            subscriber.lists.retain(|list| !removed.contains(list));
        }
        success(json!("success"))
    }

    /// Requested folders come with all their lists. A requested list comes
    /// back on its own and inside its parent folder.
    fn display_folders(&self, form: &Form) -> Value {
        let requested = ids(field(form, "ids"));

        // Folder ID -> the children to include, `None` meaning all of them.
        let mut folders: BTreeMap<u64, Option<BTreeSet<u64>>> = BTreeMap::new();
        let mut out = Map::new();

        if requested.is_empty() {
            for (id, entity) in &self.entities {
                if entity.parent.is_none() {
                    folders.insert(*id, None);
                }
            }
        }
        for id in requested {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            match entity.parent {
                None => {
                    folders.insert(id, None);
                }
                Some(parent) => {
                    out.insert(id.to_string(), list_record(parent, entity));
                    if let Some(children) = folders.entry(parent).or_insert_with(|| Some(BTreeSet::new())) {
                        children.insert(id);
                    }
                }
            }
        }

        for (id, children) in folders {
            let Some(folder) = self.entities.get(&id) else {
                continue;
            };
            let lists: Map<String, Value> = self
                .entities
                .iter()
                .filter(|(child_id, child)| {
                    child.parent == Some(id)
                        && children.as_ref().map_or(true, |only| only.contains(child_id))
                })
                .map(|(child_id, child)| (child_id.to_string(), list_record(id, child)))
                .collect();
            out.insert(
                id.to_string(),
                json!({ "name": folder.name, "type": "FOLDER", "lists": lists }),
            );
        }

        Value::Object(out)
    }

    fn add_list(&mut self, form: &Form) -> Value {
        let Some(name) = field(form, "listname") else {
            return failure("List name is required");
        };
        let Some(parent) = field(form, "list_parent").and_then(|raw| raw.parse::<u64>().ok()) else {
            return failure("list_parent is required");
        };
        if !self.is_folder(parent) {
            return failure("Parent folder not found");
        }
        let id = self.allocate();
        self.entities.insert(
            id,
            Entity {
                name: name.to_string(),
                parent: Some(parent),
            },
        );
        success(json!(id))
    }

    /// Each definition, and each enumeration entry of a category, comes
    /// wrapped in a one-element array, as the live service does.
    fn display_attributes(&self, form: &Form) -> Value {
        let requested: Vec<&str> = LIST_ATTRIBUTE_TYPES
            .into_iter()
            .filter(|key| form.contains_key(*key))
            .collect();
        if requested.is_empty() {
            return failure("No attribute type requested");
        }

        let mut out = Map::new();
        for key in requested {
            let records = self
                .attributes
                .get(key)
                .map(|definitions| definitions.iter().map(wrap_definition).collect())
                .unwrap_or_default();
            out.insert(key.to_string(), Value::Array(records));
        }
        Value::Object(out)
    }

    fn create_attributes(&mut self, form: &Form) -> Value {
        let mut created = 0;
        for key in LIST_ATTRIBUTE_TYPES {
            for definition in split(field(form, key), "|") {
                let mut parts = definition.split(',').map(str::trim);
                let Some(name) = parts.next().filter(|name| !name.is_empty()) else {
                    continue;
                };
                let rest: Vec<&str> = parts.collect();
                let record = match key {
                    "category_attributes" => {
                        let enumeration: Vec<Value> = rest
                            .iter()
                            .enumerate()
                            .map(|(index, label)| json!({ "label": label, "value": index + 1 }))
                            .collect();
                        json!({ "name": name, "enumeration": enumeration })
                    }
                    "calculated_value" | "global_computation_value" => {
                        json!({ "name": name, "value": rest.join(", ") })
                    }
                    _ => json!({ "name": name, "type": rest.first().copied().unwrap_or("TEXT") }),
                };

                let definitions = self.attributes.entry(key.to_string()).or_default();
                definitions.retain(|existing| existing["name"] != name);
                definitions.push(record);
                created += 1;
            }
        }

        if created == 0 {
            return failure("No attribute definition given");
        }
        success(json!("OK"))
    }

    fn delete_attributes(&mut self, form: &Form) -> Value {
        let mut requested = 0;
        for key in LIST_ATTRIBUTE_TYPES {
            let names = split(field(form, key), ",");
            requested += names.len();
            if let Some(definitions) = self.attributes.get_mut(key) {
                definitions.retain(|existing| {
                    !names.iter().any(|name| existing["name"] == *name)
                });
            }
        }

        if requested == 0 {
            return failure("No attribute given");
        }
        success(json!("Attributes deleted successfully"))
    }

    /// Records are keyed by address, each wrapped in a one-element array.
    fn subscriber_details(&self, form: &Form) -> Value {
        let mut out = Map::new();
        for email in split(field(form, "email"), ",") {
            if let Some(subscriber) = self.subscribers.get(email) {
                out.insert(email.to_string(), json!([self.subscriber_record(email, subscriber)]));
            }
        }
        if out.is_empty() {
            return failure("User not found");
        }
        Value::Object(out)
    }

    fn subscriber_record(&self, email: &str, subscriber: &Subscriber) -> Value {
        let lists: Vec<String> = subscriber
            .lists
            .iter()
            .filter_map(|id| self.entities.get(id).map(|list| format!("{id}:{}", list.name)))
            .collect();
        json!({
            "id": subscriber.id,
            "email": email,
            "blacklisted": u8::from(subscriber.blacklisted),
            "entered": ENTERED,
            "listid": lists,
            "normal_attribute": subscriber.attributes,
        })
    }

    fn users_status(&self, form: &Form) -> Value {
        let statuses: Map<String, Value> = split(field(form, "email"), ",")
            .into_iter()
            .filter_map(|email| {
                self.subscribers
                    .get(email)
                    .map(|subscriber| (email.to_string(), json!(u8::from(subscriber.blacklisted))))
            })
            .collect();
        if statuses.is_empty() {
            return failure("User not found");
        }
        success(Value::Object(statuses))
    }

    fn save_user(&mut self, form: &Form) -> Value {
        let Some(email) = field(form, "email") else {
            return failure("Email is required");
        };
        let lists = ids(field(form, "listid"));
        if lists.is_empty() {
            return failure("At least one list is required");
        }
        if let Some(missing) = lists.iter().find(|id| !self.is_list(**id)) {
            return failure(format!("List {missing} not found"));
        }

        let names = split(field(form, "attributes_name"), "|");
        let values: Vec<&str> = form
            .get("attributes_value")
            .map(|raw| raw.split('|').collect())
            .unwrap_or_default();
        if names.len() != values.len() {
            return failure("Attribute names and values do not match");
        }

        let subscriber = self.subscriber_mut(email);
        subscriber.blacklisted = field(form, "blacklisted") == Some("1");
        subscriber.lists.extend(lists);
        for (name, value) in names.into_iter().zip(values) {
            subscriber.attributes.insert(name.to_ascii_uppercase(), value.to_string());
        }
        success(json!({ "id": subscriber.id }))
    }

    fn save_users(&mut self, form: &Form) -> Value {
        let Some(raw) = field(form, "attributes") else {
            return failure("attributes is required");
        };
        let Ok(Value::Array(users)) = serde_json::from_str::<Value>(raw) else {
            return failure("attributes must be a JSON array");
        };
        let lists: Vec<u64> = ids(field(form, "listid"))
            .into_iter()
            .filter(|id| self.is_list(*id))
            .collect();

        for user in users {
            let Some(fields) = user.as_object() else {
                continue;
            };
            let Some(email) = fields.get("email").and_then(Value::as_str) else {
                continue;
            };
            let subscriber = self.subscriber_mut(email);
            subscriber.lists.extend(lists.iter().copied());
            for (name, value) in fields.iter().filter(|(name, _)| *name != "email") {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                subscriber.attributes.insert(name.to_ascii_uppercase(), value);
            }
        }
        success(json!("OK"))
    }

    fn subscriber_mut(&mut self, email: &str) -> &mut Subscriber {
        if !self.subscribers.contains_key(email) {
            let id = self.allocate();
            self.subscribers.insert(
                email.to_string(),
                Subscriber {
                    id,
                    ..Subscriber::default()
                },
            );
        }
        self.subscribers
            .entry(email.to_string())
            .or_default()
    }

    fn set_blacklisted(&mut self, form: &Form, blacklisted: bool) -> Value {
        let Some(email) = field(form, "email") else {
            return failure("Email is required");
        };
        let Some(subscriber) = self.subscribers.get_mut(email) else {
            return failure("User not found");
        };
        subscriber.blacklisted = blacklisted;
        success(json!("OK"))
    }

    fn campaign_detail(&self, form: &Form) -> Value {
        let campaign = field(form, "id")
            .and_then(|raw| raw.parse::<u64>().ok())
            .and_then(|id| self.campaigns.get(&id));
        match campaign.map(serde_json::to_value) {
            Some(Ok(campaign)) => success(campaign),
            Some(Err(error)) => failure(error.to_string()),
            None => failure("Campaign not found"),
        }
    }

    fn campaign_user_detail(&self, form: &Form) -> Value {
        let Some(id) = field(form, "id")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|id| self.campaigns.contains_key(id))
        else {
            return failure("Campaign not found");
        };
        let Some(recipients) = field(form, "type").filter(|kind| RECIPIENT_TYPES.contains(kind)) else {
            return failure("Invalid recipient type");
        };
        let emails: Vec<&str> = self
            .subscribers
            .iter()
            .filter(|(_, subscriber)| !subscriber.blacklisted)
            .map(|(email, _)| email.as_str())
            .collect();
        success(json!({ "id": id, "type": recipients, "emails": emails }))
    }
}

fn list_record(parent: u64, list: &Entity) -> Value {
    json!({ "name": list.name, "type": "LIST", "folder_id": parent })
}

fn wrap_definition(definition: &Value) -> Value {
    let mut definition = definition.clone();
    if let Some(Value::Array(items)) = definition.get_mut("enumeration") {
        for item in items.iter_mut() {
            *item = json!([item.take()]);
        }
    }
    json!([definition])
}

fn failure(message: impl Into<String>) -> Value {
    json!({ "errorMsg": message.into() })
}

fn success(result: Value) -> Value {
    json!({ "result": result })
}

fn field<'a>(form: &'a Form, name: &str) -> Option<&'a str> {
    form.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
}

fn split<'a>(raw: Option<&'a str>, separator: &str) -> Vec<&'a str> {
    raw.map(|raw| {
        raw.split(separator)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn ids(raw: Option<&str>) -> Vec<u64> {
    split(raw, "|")
        .into_iter()
        .filter_map(|id| id.parse().ok())
        .collect()
}
