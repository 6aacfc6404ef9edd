//! Facade behavior against a scripted transport.
//!
//! Each test queues the bodies the service would answer with, runs one or
//! more operations, then checks the sentinels returned, the exact pairs that
//! were sent, and the number of round-trips recorded in the call log.

use std::cell::RefCell;
use std::collections::VecDeque;

use mailin_core::{
    ApiError, Attribute, AttributeKind, AttributeSet, MailinClient, Query, RecipientType, Transport,
    UserStatus,
};
use serde_json::json;

const KEY: &str = "test-key";

/// Answers queries from a queue and remembers what was sent.
#[derive(Default)]
struct Scripted {
    bodies: RefCell<VecDeque<Result<String, String>>>,
    sent: RefCell<Vec<Query>>,
}

impl Scripted {
    fn answering(bodies: &[&str]) -> Self {
        let scripted = Self::default();
        for body in bodies {
            scripted.bodies.borrow_mut().push_back(Ok(body.to_string()));
        }
        scripted
    }

    fn failing(message: &str) -> Self {
        let scripted = Self::default();
        scripted.bodies.borrow_mut().push_back(Err(message.to_string()));
        scripted
    }

    fn sent(&self) -> Vec<Query> {
        self.sent.borrow().clone()
    }
}

impl Transport for Scripted {
    fn send(&self, query: &Query) -> mailin_core::error::Result<String> {
        self.sent.borrow_mut().push(query.clone());
        match self.bodies.borrow_mut().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(ApiError::Transport(message)),
            None => panic!("unexpected call: {:?}", query.action()),
        }
    }
}

fn client(bodies: &[&str]) -> MailinClient<Scripted> {
    MailinClient::with_transport(KEY, Scripted::answering(bodies))
}

fn pairs(query: &Query) -> Vec<(&str, &str)> {
    query
        .pairs()
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Folders and lists
// ---------------------------------------------------------------------------

#[test]
fn add_folder_checks_for_duplicates_first() {
    let client = client(&[
        r#"{"errorMsg":"No folder"}"#,
        r#"{"folder_id":7}"#,
        r#"{"7":{"name":"News","type":"FOLDER","lists":[]}}"#,
    ]);

    assert_eq!(client.add_folder("News", false), Some(7));
    assert_eq!(client.log().count(), 2);

    assert_eq!(client.add_folder("News", false), None);
    assert_eq!(client.log().count(), 3);

    let sent = client.transport().sent();
    assert_eq!(sent[0].get("webaction"), Some("DISPLAY-FOLDERS-LISTS"));
    assert!(!sent[0].contains("ids"));
    assert_eq!(
        pairs(&sent[1]),
        vec![("foldername", "News"), ("key", KEY), ("webaction", "ADDFOLDER")]
    );
}

#[test]
fn forced_add_folder_skips_the_lookup() {
    let client = client(&[r#"{"folder_id":"8"}"#]);
    assert_eq!(client.add_folder("News", true), Some(8));
    assert_eq!(client.log().count(), 1);
}

#[test]
fn add_folder_without_id_is_none() {
    let client = client(&[r#"{"folder_id":""}"#]);
    assert_eq!(client.add_folder("News", true), None);
}

#[test]
fn get_folders_joins_ids() {
    let client = client(&[r#"{
        "1": {"name": "A", "type": "FOLDER", "lists": {"3": {"name": "L3", "type": "LIST"}}},
        "2": {"name": "B", "type": "FOLDER", "lists": {"3": {"name": "dup", "type": "LIST"}, "4": {"name": "L4"}}}
    }"#]);

    let lists = client.get_lists(&[1, 2]);
    assert_eq!(client.transport().sent()[0].get("ids"), Some("1|2"));
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[&3].name, "L3");
    assert_eq!(lists[&4].folder_id, Some(2));
}

#[test]
fn find_folder_and_find_list_check_the_type() {
    let folder = r#"{"5":{"name":"F","type":"FOLDER"}}"#;
    let client = client(&[folder, folder]);
    assert!(client.find_folder(5).is_some());
    assert!(client.find_list(5).is_none());
}

#[test]
fn add_list_is_scoped_to_its_folder() {
    let client = client(&[
        r#"{"5":{"name":"F","type":"FOLDER","lists":{"9":{"name":"Weekly","type":"LIST"}}}}"#,
        r#"{"5":{"name":"F","type":"FOLDER","lists":{"9":{"name":"Weekly","type":"LIST"}}}}"#,
        r#"{"result":10}"#,
    ]);

    assert_eq!(client.add_list("Weekly", 5, false), None);
    assert_eq!(client.add_list("Monthly", 5, false), Some(10));

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].get("ids"), Some("5"));
    assert_eq!(
        pairs(&sent[2]),
        vec![("listname", "Monthly"), ("list_parent", "5"), ("key", KEY), ("webaction", "NEWLIST")]
    );
}

#[test]
fn delete_requires_the_success_literal() {
    let client = client(&[r#"{"result":"success"}"#, r#"{"result":"done"}"#]);
    assert!(client.delete_list(3));
    assert!(!client.delete_folder(4));
    let sent = client.transport().sent();
    assert_eq!(sent[0].get("webaction"), Some("DELETE-FOLDER"));
    assert_eq!(sent[1].get("list_id"), Some("4"));
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[test]
fn unknown_attribute_types_make_no_call() {
    let client = client(&[]);
    assert!(client.get_attributes(&["unexisting-type"]).is_empty());
    assert_eq!(client.log().count(), 0);
}

#[test]
fn get_attributes_requests_every_type_by_default() {
    let client = client(&[r#"{"errorMsg":"nope"}"#]);
    assert!(client.get_attributes(&[]).is_empty());

    let sent = client.transport().sent();
    for key in [
        "normal_attributes",
        "category_attributes",
        "transactional_attributes",
        "calculated_value",
        "global_computation_value",
    ] {
        assert_eq!(sent[0].get(key), Some("1"), "{key}");
    }
}

#[test]
fn get_attributes_unwraps_display_records() {
    let client = client(&[r#"{
        "normal_attributes": [[{"name": "NOM", "type": "TEXT"}], {"0": {"name": "AGE", "type": "number"}}],
        "category_attributes": [[{"name": "CIVILITY", "enumeration": [[{"label": "Mr", "value": 1}], [{"label": "Mrs", "value": 2}]]}]],
        "unknown_attributes": [[{"name": "X"}]]
    }"#]);

    let attributes = client.get_attributes(&["normal_attributes", "bogus", "category_attributes"]);

    let query = &client.transport().sent()[0];
    assert_eq!(query.get("normal_attributes"), Some("1"));
    assert!(!query.contains("bogus"));

    assert_eq!(attributes.len(), 2);
    let normal: Vec<String> = attributes["normal_attributes"].iter().map(ToString::to_string).collect();
    assert_eq!(normal, vec!["NOM, TEXT", "AGE, NUMBER"]);

    let civility = &attributes["category_attributes"][0];
    assert_eq!(civility.kind(), AttributeKind::Category);
    assert_eq!(civility.to_string(), "CIVILITY, Mr, Mrs");
}

#[test]
fn add_attributes_serializes_valid_definitions() {
    let client = client(&[r#"{"result":"OK"}"#, r#"{"result":"KO"}"#]);

    let mut attributes = AttributeSet::new();
    attributes.insert(
        "normal_attributes".to_string(),
        vec![
            Attribute::normal("NOM", "TEXT"),
            Attribute::normal("1NVALID", "TEXT"),
            Attribute::normal("AGE", "number"),
        ],
    );
    attributes.insert("bogus".to_string(), vec![Attribute::normal("X", "TEXT")]);

    assert!(client.add_attributes(&attributes));
    let query = &client.transport().sent()[0];
    assert_eq!(query.get("normal_attributes"), Some("NOM, TEXT | AGE, NUMBER"));
    assert!(!query.contains("bogus"));

    assert!(!client.add_attributes(&attributes));
}

#[test]
fn add_attributes_without_valid_definitions_makes_no_call() {
    let client = client(&[]);
    let mut attributes = AttributeSet::new();
    attributes.insert("category_attributes".to_string(), vec![Attribute::category("EMPTY", Vec::<&str>::new())]);
    attributes.insert("bogus".to_string(), vec![Attribute::normal("NOM", "TEXT")]);

    assert!(!client.add_attributes(&attributes));
    assert_eq!(client.log().count(), 0);
}

#[test]
fn delete_attributes_joins_names() {
    let client = client(&[r#"{"result":"Attributes deleted successfully"}"#]);
    assert!(client.delete_attributes([
        ("normal_attributes", vec!["NOM", "PRENOM"]),
        ("bogus", vec!["X"]),
    ]));
    let query = &client.transport().sent()[0];
    assert_eq!(query.get("normal_attributes"), Some("NOM, PRENOM"));
    assert!(!query.contains("bogus"));
}

#[test]
fn delete_attributes_with_nothing_known_makes_no_call() {
    let client = client(&[]);
    assert!(!client.delete_attributes([("bogus", vec!["X"])]));
    assert!(!client.delete_attributes([("normal_attributes", Vec::<&str>::new())]));
    assert_eq!(client.log().count(), 0);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[test]
fn user_status_fills_missing_addresses() {
    let client = client(&[r#"{"result":{"a@x.com":1}}"#]);
    let statuses = client.get_user_status(&["a@x.com", "b@x.com"]).unwrap();

    assert_eq!(client.transport().sent()[0].get("email"), Some("a@x.com,b@x.com"));
    let codes: Vec<(&str, i8)> = statuses
        .iter()
        .map(|(email, status)| (email.as_str(), status.code()))
        .collect();
    assert_eq!(codes, vec![("a@x.com", 1), ("b@x.com", -1)]);
}

#[test]
fn user_status_on_failure_is_none() {
    let client = client(&[r#"{"errorMsg":"Invalid email"}"#, r#"{"result":[]}"#]);
    assert_eq!(client.get_user_status(&["a@x.com"]), None);
    assert_eq!(client.get_user_status(&["a@x.com"]), None);
}

#[test]
fn save_user_needs_a_list() {
    let client = client(&[]);
    assert_eq!(client.save_user("a@x.com", &[], &[], false), None);
    assert_eq!(client.save_user("a@x.com", &[0], &[], false), None);
    assert_eq!(client.log().count(), 0);
}

#[test]
fn save_user_flattens_lists_and_attributes() {
    let client = client(&[r#"{"result":{"id":"42"}}"#]);
    let id = client.save_user("a@x.com", &[3, 0, 4], &[("NOM", "Doe"), ("PRENOM", "Jane")], true);
    assert_eq!(id, Some(42));

    assert_eq!(
        pairs(&client.transport().sent()[0]),
        vec![
            ("email", "a@x.com"),
            ("blacklisted", "1"),
            ("listid", "3|4"),
            ("attributes_name", "NOM|PRENOM"),
            ("attributes_value", "Doe|Jane"),
            ("key", KEY),
            ("webaction", "USERCREADIT"),
        ]
    );
}

#[test]
fn save_user_without_attributes_omits_them() {
    let client = client(&[r#"{"result":"OK"}"#]);
    assert_eq!(client.save_user("a@x.com", &[3], &[], false), None);
    let query = &client.transport().sent()[0];
    assert_eq!(query.get("blacklisted"), Some("0"));
    assert!(!query.contains("attributes_name"));
    assert!(!query.contains("attributes_value"));
}

#[test]
fn save_user_drops_an_empty_value_string() {
    let client = client(&[r#"{"result":{"id":7}}"#]);
    assert_eq!(client.save_user("a@x.com", &[3], &[("NOM", "")], false), Some(7));
    let query = &client.transport().sent()[0];
    assert_eq!(query.get("attributes_name"), Some("NOM"));
    assert!(!query.contains("attributes_value"));
}

#[test]
fn save_users_sends_json() {
    let client = client(&[r#"{"result":"OK"}"#]);
    let users = json!([{"email": "a@x.com", "NOM": "Doe"}]);
    assert!(client.save_users(&users, &[3, 4]));

    let query = &client.transport().sent()[0];
    assert_eq!(query.get("webaction"), Some("MULTI-USERCREADIT"));
    assert_eq!(query.get("listid"), Some("3|4"));
    let sent: serde_json::Value = serde_json::from_str(query.get("attributes").unwrap()).unwrap();
    assert_eq!(sent, users);
}

#[test]
fn get_users_unwraps_each_record() {
    let client = client(&[r#"{
        "a@x.com": [{"id": 1, "email": "a@x.com", "blacklisted": 0, "listid": ["3:News"], "normal_attribute": {"NOM": "Doe"}}],
        "b@x.com": {"email": "b@x.com", "blacklisted": "1"}
    }"#]);

    let users = client.get_users(&["a@x.com", "b@x.com"]);
    assert_eq!(client.transport().sent()[0].get("email"), Some("a@x.com,b@x.com"));
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id(), Some(1));
    assert!(users[0].is_registered(3));
    assert!(users[1].is_blacklisted());
}

#[test]
fn get_user_on_failure_is_none() {
    let client = client(&[r#"{"errorMsg":"User not found"}"#]);
    assert!(client.get_user("a@x.com").is_none());
    assert_eq!(client.log().last_error(), "User not found");
}

#[test]
fn blacklist_requires_ok() {
    let client = client(&[r#"{"result":"OK"}"#, r#"{"result":"ok"}"#]);
    assert!(client.block_user("a@x.com"));
    assert!(!client.unblock_user("a@x.com"));
    let sent = client.transport().sent();
    assert_eq!(sent[0].get("webaction"), Some("EMAILBLACKLIST"));
    assert_eq!(sent[1].get("webaction"), Some("EMAILUNBLACKLIST"));
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[test]
fn campaign_queries() {
    let client = client(&[r#"{"result":{"id":1,"sent":2}}"#, r#"{"result":["a@x.com"]}"#]);
    assert_eq!(client.campaign_stats(1), Some(json!({"id": 1, "sent": 2})));
    assert_eq!(
        client.campaign_user_stats(1, RecipientType::NonOpener),
        Some(json!(["a@x.com"]))
    );

    let sent = client.transport().sent();
    assert_eq!(pairs(&sent[0]), vec![("id", "1"), ("key", KEY), ("webaction", "CAMPAIGNDETAIL")]);
    assert_eq!(sent[1].get("type"), Some("non_opener"));
}

// ---------------------------------------------------------------------------
// Instrumentation
// ---------------------------------------------------------------------------

#[test]
fn transport_failure_is_a_failed_call() {
    let client = MailinClient::with_transport(KEY, Scripted::failing("connection reset"));
    assert!(client.get_folders(&[]).is_empty());
    assert_eq!(client.log().count(), 1);
    assert_eq!(client.log().last_status(), Some(false));
    assert_eq!(client.log().last_error(), "transport failed: connection reset");
    assert!(client.log().last_data().is_empty());
}

#[test]
fn replaced_transport_keeps_the_log() {
    let mut client = MailinClient::with_transport(KEY, Scripted::failing("connection reset"));
    assert!(!client.block_user("a@x.com"));

    client.set_transport(Scripted::answering(&[r#"{"result":"OK"}"#]));
    assert!(client.block_user("a@x.com"));
    assert_eq!(client.log().count(), 2);
    assert_eq!(client.log().last_status(), Some(true));
    assert_eq!(client.transport().sent().len(), 1);
}

#[test]
fn call_records_hide_the_key() {
    let client = client(&[r#"{"result":"OK"}"#]);
    assert!(client.block_user("a@x.com"));

    let record = client.log().last().unwrap();
    assert!(record.query.iter().all(|(_, value)| value != KEY));
    let outcome = record.outcome.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.data.get("result"), Some(&json!("OK")));
}

#[test]
fn statuses_are_typed() {
    let client = client(&[r#"{"result":{"a@x.com":"0"}}"#]);
    let statuses = client.get_user_status(&["a@x.com"]).unwrap();
    assert_eq!(statuses["a@x.com"], UserStatus::Active);
}
