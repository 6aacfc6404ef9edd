//! Synchronous client for the Mailin email-marketing web service.
//!
//! # Overview
//! Mailin exposes every operation as a flat form POST to a single endpoint,
//! selected by a `webaction` field and answered with a JSON envelope. This
//! crate turns typed method calls into those requests and the envelopes back
//! into domain values: folders and lists, custom attribute definitions,
//! subscribers, blacklist status, and campaign statistics.
//!
//! # Design
//! - `MailinClient` is the facade. Each operation builds a `Call`, normalizes
//!   it into a `Query`, sends it through a `Transport`, and post-processes the
//!   resulting `Response`.
//! - Normalization and envelope parsing are pure, so request shapes and
//!   response handling are testable without a network.
//! - The transport is a one-method trait; `HttpTransport` (ureq) is the
//!   default and tests substitute in-process fakes.
//! - Failures never escape the facade as errors. Operations return `None`,
//!   `false`, or an empty collection, and the injected `CallLog` tells a
//!   rejected request apart from one that was never sent.

pub mod attribute;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod log;
pub mod query;
pub mod response;
pub mod types;
pub mod user;

pub use attribute::{Attribute, AttributeKind, AttributeSet, Context, DataType, Filter, FilterCriterium, Property};
pub use client::MailinClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpTransport, Transport};
pub use log::{CallHandle, CallLog, CallOutcome, CallRecord};
pub use query::{Action, Call, Field, Query};
pub use response::Response;
pub use types::{Entity, EntityKind, RecipientType, UserStatus};
pub use user::User;
