//! Custom attribute definitions.
//!
//! # Design
//! Mailin knows exactly six attribute kinds. `AttributeKind` is the closed
//! registry; `Attribute` carries the fields every kind shares (name, value)
//! plus a private per-kind body holding what only that kind has (data type,
//! enumeration, formula). Construction never fails: malformed input leaves
//! the attribute invalid and `is_valid()` is the single check callers make
//! before submitting it.
//!
//! The same kind is addressed by different collection keys depending on
//! whether it is read in a list context (`DISPLAY-ATTRIBUTES`) or as part of a
//! subscriber record (`SUBSCRIBER-DETAILS`); see [`AttributeKind::entity_map`].

mod filter;

pub use filter::{search, Criterion, Filter, FilterCriterium, Property};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde_json::{Number, Value};

/// Attributes keyed by their collection key.
pub type AttributeSet = BTreeMap<String, Vec<Attribute>>;

/// Which kind of record an attribute type key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Context {
    List,
    User,
}

impl Context {
    pub fn as_str(self) -> &'static str {
        match self {
            Context::List => "list",
            Context::User => "user",
        }
    }
}

/// The six attribute kinds known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKind {
    Normal,
    Category,
    Transactional,
    Calculated,
    Computation,
    Deleted,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 6] = [
        AttributeKind::Normal,
        AttributeKind::Category,
        AttributeKind::Transactional,
        AttributeKind::Calculated,
        AttributeKind::Computation,
        AttributeKind::Deleted,
    ];

    /// The contexts this kind applies to and its collection key in each.
    pub fn entity_map(self) -> &'static [(Context, &'static str)] {
        match self {
            AttributeKind::Normal => &[
                (Context::List, "normal_attributes"),
                (Context::User, "normal_attribute"),
            ],
            AttributeKind::Category => &[
                (Context::List, "category_attributes"),
                (Context::User, "category_attributes"),
            ],
            AttributeKind::Transactional => &[
                (Context::List, "transactional_attributes"),
                (Context::User, "transactional_attributes"),
            ],
            AttributeKind::Calculated => &[
                (Context::List, "calculated_value"),
                (Context::User, "calculated_values"),
            ],
            AttributeKind::Computation => &[(Context::List, "global_computation_value")],
            AttributeKind::Deleted => &[(Context::User, "deleted_attributes")],
        }
    }

    /// The collection key for `context`, if the kind applies there.
    pub fn type_key(self, context: Context) -> Option<&'static str> {
        self.entity_map()
            .iter()
            .find(|(ctx, _)| *ctx == context)
            .map(|(_, key)| *key)
    }

    /// Resolve a collection key back to its kind.
    pub fn from_type_key(context: Context, key: &str) -> Option<Self> {
        all_types(context)
            .iter()
            .find(|(type_key, _)| *type_key == key)
            .map(|(_, kind)| *kind)
    }

    /// Data types accepted by the kind; empty when it has none.
    pub fn allowed_data_types(self) -> &'static [DataType] {
        match self {
            AttributeKind::Normal => &[DataType::Text, DataType::Number, DataType::Date],
            AttributeKind::Transactional => {
                &[DataType::Text, DataType::Number, DataType::Date, DataType::Id]
            }
            _ => &[],
        }
    }
}

/// Every `(collection key, kind)` pair defined for `context`.
///
/// The table is static, so it is computed once per context and cached.
pub fn all_types(context: Context) -> &'static [(&'static str, AttributeKind)] {
    static LIST: OnceLock<Vec<(&'static str, AttributeKind)>> = OnceLock::new();
    static USER: OnceLock<Vec<(&'static str, AttributeKind)>> = OnceLock::new();

    let cell = match context {
        Context::List => &LIST,
        Context::User => &USER,
    };
    cell.get_or_init(|| {
        AttributeKind::ALL
            .iter()
            .filter_map(|kind| kind.type_key(context).map(|key| (key, *kind)))
            .collect()
    })
}

/// Storage type of a normal or transactional attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Text,
    Number,
    Date,
    Id,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Text => "TEXT",
            DataType::Number => "NUMBER",
            DataType::Date => "DATE",
            DataType::Id => "ID",
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Ok(DataType::Text),
            "NUMBER" => Ok(DataType::Number),
            "DATE" => Ok(DataType::Date),
            "ID" => Ok(DataType::Id),
            _ => Err(format!("unknown data type: {s}")),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One choice of a category attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationItem {
    pub label: String,
    pub value: Option<Number>,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Normal { data_type: Option<DataType> },
    Transactional { data_type: Option<DataType> },
    Category { enumeration: Vec<EnumerationItem> },
    Computation { formula: Option<String> },
    Calculated { formula: Option<String> },
    Deleted,
}

impl Body {
    fn empty(kind: AttributeKind) -> Self {
        match kind {
            AttributeKind::Normal => Body::Normal { data_type: None },
            AttributeKind::Transactional => Body::Transactional { data_type: None },
            AttributeKind::Category => Body::Category {
                enumeration: Vec::new(),
            },
            AttributeKind::Computation => Body::Computation { formula: None },
            AttributeKind::Calculated => Body::Calculated { formula: None },
            AttributeKind::Deleted => Body::Deleted,
        }
    }
}

/// A custom attribute of one of the six kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: Option<String>,
    value: Option<Value>,
    body: Body,
}

impl Attribute {
    /// An attribute of `kind` with nothing set.
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            name: None,
            value: None,
            body: Body::empty(kind),
        }
    }

    /// Build an attribute from a loosely typed definition record.
    ///
    /// Recognised keys: `name` for every kind, `type` for normal and
    /// transactional, `enumeration` for category, and `value` (the formula)
    /// for computation and calculated. Anything malformed is ignored.
    pub fn from_definition(kind: AttributeKind, definition: &Value, value: Option<Value>) -> Self {
        let mut attribute = Self::new(kind);
        attribute.value = value;

        if let Some(name) = definition.get("name").and_then(Value::as_str) {
            attribute.set_name(name);
        }

        match kind {
            AttributeKind::Normal | AttributeKind::Transactional => {
                if let Some(data_type) = definition.get("type").and_then(Value::as_str) {
                    attribute.set_data_type(data_type);
                }
            }
            AttributeKind::Category => {
                if let Some(Value::Array(items)) = definition.get("enumeration") {
                    let rejected = attribute.set_enumeration(items);
                    if !rejected.is_empty() {
                        tracing::debug!(
                            target: "mailin",
                            name = attribute.name().unwrap_or("-"),
                            rejected = rejected.len(),
                            "dropped invalid enumeration items"
                        );
                    }
                }
            }
            AttributeKind::Computation | AttributeKind::Calculated => {
                match definition.get("value") {
                    Some(Value::String(formula)) => {
                        attribute.set_formula(formula.as_str());
                    }
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        attribute.set_formula(other.to_string());
                    }
                }
            }
            AttributeKind::Deleted => {}
        }

        attribute
    }

    pub fn normal(name: &str, data_type: &str) -> Self {
        let mut attribute = Self::new(AttributeKind::Normal);
        attribute.set_name(name);
        attribute.set_data_type(data_type);
        attribute
    }

    pub fn transactional(name: &str, data_type: &str) -> Self {
        let mut attribute = Self::new(AttributeKind::Transactional);
        attribute.set_name(name);
        attribute.set_data_type(data_type);
        attribute
    }

    /// A category attribute whose enumeration is built from bare labels or
    /// `{label, value}` records. Invalid items are dropped.
    pub fn category<I, V>(name: &str, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut attribute = Self::new(AttributeKind::Category);
        attribute.set_name(name);
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        attribute.set_enumeration(&items);
        attribute
    }

    pub fn computation(name: &str, formula: &str) -> Self {
        let mut attribute = Self::new(AttributeKind::Computation);
        attribute.set_name(name);
        attribute.set_formula(formula);
        attribute
    }

    pub fn calculated(name: &str, formula: &str) -> Self {
        let mut attribute = Self::new(AttributeKind::Calculated);
        attribute.set_name(name);
        attribute.set_formula(formula);
        attribute
    }

    pub fn deleted(name: &str) -> Self {
        let mut attribute = Self::new(AttributeKind::Deleted);
        attribute.set_name(name);
        attribute
    }

    pub fn kind(&self) -> AttributeKind {
        match self.body {
            Body::Normal { .. } => AttributeKind::Normal,
            Body::Transactional { .. } => AttributeKind::Transactional,
            Body::Category { .. } => AttributeKind::Category,
            Body::Computation { .. } => AttributeKind::Computation,
            Body::Calculated { .. } => AttributeKind::Calculated,
            Body::Deleted => AttributeKind::Deleted,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the name, uppercased. Names may only contain ASCII letters, `_`
    /// and `-`; anything else clears the name.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = normalize_name(name);
        self
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<Value>) -> &mut Self {
        self.value = value;
        self
    }

    /// The collection key of this attribute in `context`.
    pub fn type_key(&self, context: Context) -> Option<&'static str> {
        self.kind().type_key(context)
    }

    pub fn entity_map(&self) -> &'static [(Context, &'static str)] {
        self.kind().entity_map()
    }

    pub fn data_type(&self) -> Option<DataType> {
        match &self.body {
            Body::Normal { data_type } | Body::Transactional { data_type } => *data_type,
            _ => None,
        }
    }

    /// Set the data type from its (case-insensitive) name. Returns false and
    /// leaves the attribute untouched when the kind has no data type or does
    /// not allow this one.
    pub fn set_data_type(&mut self, data_type: &str) -> bool {
        let allowed = self.kind().allowed_data_types();
        let Ok(parsed) = data_type.parse::<DataType>() else {
            return false;
        };
        if !allowed.contains(&parsed) {
            return false;
        }
        match &mut self.body {
            Body::Normal { data_type } | Body::Transactional { data_type } => {
                *data_type = Some(parsed);
                true
            }
            _ => false,
        }
    }

    /// Category choices; empty for other kinds.
    pub fn enumeration(&self) -> &[EnumerationItem] {
        match &self.body {
            Body::Category { enumeration } => enumeration,
            _ => &[],
        }
    }

    pub fn enumeration_labels(&self) -> Vec<&str> {
        self.enumeration()
            .iter()
            .map(|item| item.label.as_str())
            .collect()
    }

    /// Replace the enumeration. Each item is a bare label or a
    /// `{label, value}` record and is validated on its own; the items that
    /// were rejected are returned. Does nothing on other kinds.
    pub fn set_enumeration(&mut self, items: &[Value]) -> Vec<Value> {
        let Body::Category { enumeration } = &mut self.body else {
            return items.to_vec();
        };
        enumeration.clear();

        let mut rejected = Vec::new();
        for item in items {
            let (label, value) = match item {
                Value::Object(record) => (
                    record.get("label").cloned().unwrap_or(Value::Null),
                    record.get("value").cloned(),
                ),
                other => (other.clone(), None),
            };
            match enumeration_item(&label, value.as_ref()) {
                Some(accepted) => enumeration.push(accepted),
                None => rejected.push(item.clone()),
            }
        }
        rejected
    }

    /// Append one choice. Returns false when the label is empty, the value is
    /// neither null nor numeric, or the attribute is not a category.
    pub fn add_enumeration_item(&mut self, label: &str, value: Option<Value>) -> bool {
        let Body::Category { enumeration } = &mut self.body else {
            return false;
        };
        match enumeration_item(&Value::from(label), value.as_ref()) {
            Some(item) => {
                enumeration.push(item);
                true
            }
            None => false,
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match &self.body {
            Body::Computation { formula } | Body::Calculated { formula } => formula.as_deref(),
            _ => None,
        }
    }

    /// Set the formula of a computation or calculated attribute.
    pub fn set_formula(&mut self, formula: impl Into<String>) -> bool {
        match &mut self.body {
            Body::Computation { formula: slot } | Body::Calculated { formula: slot } => {
                *slot = Some(formula.into());
                true
            }
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.name.is_none() {
            return false;
        }
        match &self.body {
            Body::Normal { data_type } | Body::Transactional { data_type } => data_type.is_some(),
            Body::Category { enumeration } => !enumeration.is_empty(),
            Body::Computation { formula } | Body::Calculated { formula } => formula.is_some(),
            Body::Deleted => false,
        }
    }
}

/// The `CREATE-ATTRIBUTES` form: `NAME, field, field...`, or nothing at all
/// for an invalid attribute.
impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return Ok(());
        }
        let Some(name) = &self.name else {
            return Ok(());
        };
        f.write_str(name)?;
        match &self.body {
            Body::Normal { data_type: Some(dt) } | Body::Transactional { data_type: Some(dt) } => {
                write!(f, ", {dt}")
            }
            Body::Category { enumeration } => {
                for item in enumeration {
                    write!(f, ", {}", item.label)?;
                }
                Ok(())
            }
            Body::Computation { formula: Some(formula) }
            | Body::Calculated { formula: Some(formula) } => write!(f, ", {formula}"),
            _ => Ok(()),
        }
    }
}

fn normalize_name(name: &str) -> Option<String> {
    let accepted = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '_' || c == '-');
    accepted.then(|| name.to_ascii_uppercase())
}

fn enumeration_item(label: &Value, value: Option<&Value>) -> Option<EnumerationItem> {
    let label = label.as_str().filter(|label| !label.is_empty())?;
    let value = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.clone()),
        Some(Value::String(s)) => Some(Number::from_str(s.trim()).ok()?),
        Some(_) => return None,
    };
    Some(EnumerationItem {
        label: label.to_string(),
        value,
    })
}
