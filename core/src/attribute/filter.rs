//! Predicate search over a set of attributes.
//!
//! # Design
//! A `Filter` owns a flat list of attributes and a set of predicates, one per
//! `Property`. It never mutates while iterating: [`Filter::iter`] is a thin
//! wrapper around the pure [`search`] function, so every call starts over and
//! yields lazily. Predicates are AND-combined; no predicate means everything
//! matches. A property that the candidate's kind does not have (for example
//! `DataType` on a category attribute) never matches.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Attribute, AttributeKind, Context};

/// An attribute property a predicate can test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Name,
    Value,
    /// The collection key in the given context.
    Type(Context),
    DataType,
    Formula,
    /// The labels of a category, as an array.
    Enumeration,
    /// A property name that no attribute kind exposes.
    Unsupported(String),
}

impl Property {
    /// Resolve a property by name. `type` reads the list-context key.
    pub fn parse(name: &str) -> Self {
        match name {
            "name" => Property::Name,
            "value" => Property::Value,
            "type" => Property::Type(Context::List),
            "dataType" | "data_type" => Property::DataType,
            "formula" => Property::Formula,
            "enumeration" => Property::Enumeration,
            other => Property::Unsupported(other.to_string()),
        }
    }

    /// Read the property from `attribute`. `None` means the kind has no such
    /// property; `Some(Value::Null)` means it has one that is unset.
    pub fn read(&self, attribute: &Attribute) -> Option<Value> {
        let kind = attribute.kind();
        match self {
            Property::Name => Some(attribute.name().map_or(Value::Null, Value::from)),
            Property::Value => Some(attribute.value().cloned().unwrap_or(Value::Null)),
            Property::Type(context) => {
                Some(attribute.type_key(*context).map_or(Value::Null, Value::from))
            }
            Property::DataType => matches!(kind, AttributeKind::Normal | AttributeKind::Transactional)
                .then(|| attribute.data_type().map_or(Value::Null, |dt| Value::from(dt.as_str()))),
            Property::Formula => matches!(kind, AttributeKind::Computation | AttributeKind::Calculated)
                .then(|| attribute.formula().map_or(Value::Null, Value::from)),
            Property::Enumeration => (kind == AttributeKind::Category)
                .then(|| Value::from(attribute.enumeration_labels())),
            Property::Unsupported(_) => None,
        }
    }
}

/// What a criterium compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Equals(Value),
    AnyOf(Vec<Value>),
}

/// A single predicate: equality or membership, optionally negated.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriterium {
    criterion: Criterion,
    negate: bool,
}

impl FilterCriterium {
    /// An array value means membership, anything else equality.
    pub fn new(value: impl Into<Value>, negate: bool) -> Self {
        let criterion = match value.into() {
            Value::Array(values) => Criterion::AnyOf(values),
            value => Criterion::Equals(value),
        };
        Self { criterion, negate }
    }

    pub fn equals(value: impl Into<Value>) -> Self {
        Self {
            criterion: Criterion::Equals(value.into()),
            negate: false,
        }
    }

    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            criterion: Criterion::AnyOf(values.into_iter().map(Into::into).collect()),
            negate: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn criterion(&self) -> &Criterion {
        &self.criterion
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn matches(&self, value: &Value) -> bool {
        let hit = match &self.criterion {
            Criterion::Equals(expected) => loose_eq(value, expected),
            Criterion::AnyOf(values) => values.iter().any(|expected| loose_eq(value, expected)),
        };
        hit != self.negate
    }
}

/// Equality that also treats a number and its decimal string as equal.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Lazily yield the attributes that satisfy every predicate.
pub fn search<'a: 'p, 'p>(
    attributes: &'a [Attribute],
    predicates: &'p [(Property, FilterCriterium)],
) -> impl Iterator<Item = &'a Attribute> + 'p {
    attributes.iter().filter(move |attribute| {
        predicates.iter().all(|(property, criterium)| {
            property
                .read(attribute)
                .is_some_and(|value| criterium.matches(&value))
        })
    })
}

/// A searchable attribute collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    attributes: Vec<Attribute>,
    predicates: Vec<(Property, FilterCriterium)>,
}

impl Filter {
    /// Flatten attributes grouped by collection key, keeping group order.
    pub fn new<K>(grouped: impl IntoIterator<Item = (K, Vec<Attribute>)>) -> Self {
        Self::from_attributes(grouped.into_iter().flat_map(|(_, group)| group))
    }

    pub fn from_attributes(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        Self {
            attributes: attributes.into_iter().collect(),
            predicates: Vec::new(),
        }
    }

    pub fn set_attributes<K>(&mut self, grouped: impl IntoIterator<Item = (K, Vec<Attribute>)>) -> &mut Self {
        self.attributes = grouped.into_iter().flat_map(|(_, group)| group).collect();
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn predicates(&self) -> &[(Property, FilterCriterium)] {
        &self.predicates
    }

    /// Create or replace the predicate on `property`.
    pub fn set_filter(&mut self, property: Property, criterium: FilterCriterium) -> &mut Self {
        match self.predicates.iter_mut().find(|(existing, _)| *existing == property) {
            Some(slot) => slot.1 = criterium,
            None => self.predicates.push((property, criterium)),
        }
        self
    }

    /// Replace every predicate.
    pub fn set_filters(
        &mut self,
        predicates: impl IntoIterator<Item = (Property, FilterCriterium)>,
    ) -> &mut Self {
        self.predicates.clear();
        for (property, criterium) in predicates {
            self.set_filter(property, criterium);
        }
        self
    }

    /// Replace every predicate from property names.
    pub fn set_named_filters(&mut self, predicates: BTreeMap<&str, FilterCriterium>) -> &mut Self {
        self.set_filters(
            predicates
                .into_iter()
                .map(|(name, criterium)| (Property::parse(name), criterium)),
        )
    }

    pub fn clear_filters(&mut self) -> &mut Self {
        self.predicates.clear();
        self
    }

    /// Matching attributes, from the start every time.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        search(&self.attributes, &self.predicates)
    }

    pub fn get_one(&self) -> Option<&Attribute> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a Attribute;
    type IntoIter = Box<dyn Iterator<Item = &'a Attribute> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
