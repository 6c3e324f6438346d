//! Filter parameter translation
//!
//! Search requests carry a flat, ordered list of `name -> value` parameters. The
//! parameter *name* decides what kind of predicate it becomes:
//!
//! | name                | produces                                  |
//! |---------------------|-------------------------------------------|
//! | `<col>_ex`          | nothing (reserved)                        |
//! | `order*`            | ordering, value is `[column, direction]`  |
//! | `<col>_id_list`     | `<col>__id__in`, marks the query distinct |
//! | `<col>_list`        | `<col>__name__in`, marks the query distinct |
//! | `<col>_id`          | `<col>__id`                               |
//! | `<col>_name`        | `<col>__name`                             |
//! | `<col>_min`         | `<col>__gte`                              |
//! | `<col>_max`         | `<col>__lte`                              |
//! | anything else       | exact match on `<name>`                   |
//!
//! Rules are tried in the order of [`RULES`]; the first match wins. Falsy values
//! (`null`, `false`, `0`, `""`, `[]`, `{}`) are skipped before any rule runs.
//!
//! Translation is purely syntactic. Whether a column exists and accepts a lookup is
//! decided afterwards by [`resolve`].

pub mod resolve;

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Ordered filter parameters as received from the request.
pub type FilterParams = Vec<(String, Value)>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid ordering in '{name}': {reason}")]
    InvalidOrdering { name: String, reason: String },

    #[error("Unknown filter column '{0}'")]
    UnknownColumn(String),

    #[error("Lookup '{lookup}' is not supported on column '{column}'")]
    UnsupportedLookup { column: String, lookup: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidOperand { key: String, reason: String },

    #[error("Cannot order by '{0}'")]
    InvalidOrderColumn(String),
}

/// Relational lookup applied to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    Id,
    Name,
    Gte,
    Lte,
    IdIn,
    NameIn,
}

impl Lookup {
    /// Suffix appended to the column to form the predicate key
    pub fn suffix(self) -> &'static str {
        match self {
            Lookup::Exact => "",
            Lookup::Id => "__id",
            Lookup::Name => "__name",
            Lookup::Gte => "__gte",
            Lookup::Lte => "__lte",
            Lookup::IdIn => "__id__in",
            Lookup::NameIn => "__name__in",
        }
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The raw parameter value, kept as received
    Value(Value),
    /// Members of a `_list` / `_id_list` parameter
    Set(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub lookup: Lookup,
    pub operand: Operand,
}

impl Predicate {
    /// Lookup path such as `size__gte` or `tags__name__in`
    pub fn key(&self) -> String {
        format!("{}{}", self.column, self.lookup.suffix())
    }
}

/// Requested ordering; rendered as `column` or `-column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

impl OrderKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parse `"-size"` / `"size"`.
    pub fn parse(key: &str) -> Self {
        match key.strip_prefix('-') {
            Some(column) => Self::desc(column),
            None => Self::asc(key),
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.column)
        } else {
            f.write_str(&self.column)
        }
    }
}

/// Output of [`translate`]: predicates in first-seen order, the ordering directive and
/// whether the result must be de-duplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
    order: Option<OrderKey>,
    distinct: bool,
}

impl FilterSet {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order(&self) -> Option<&OrderKey> {
        self.order.as_ref()
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.order.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.key() == key)
    }

    /// A later parameter with the same key replaces the earlier one in place.
    fn insert(&mut self, predicate: Predicate) {
        let key = predicate.key();
        match self.predicates.iter_mut().find(|p| p.key() == key) {
            Some(existing) => *existing = predicate,
            None => self.predicates.push(predicate),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Matcher {
    Prefix(&'static str),
    Suffix(&'static str),
}

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    Exclude,
    Order,
    Membership(Lookup),
    Single(Lookup),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    matcher: Matcher,
    kind: RuleKind,
}

impl Rule {
    const fn new(matcher: Matcher, kind: RuleKind) -> Self {
        Self { matcher, kind }
    }

    /// Returns the column part of `name` when the rule applies.
    fn matches<'a>(&self, name: &'a str) -> Option<&'a str> {
        match self.matcher {
            Matcher::Prefix(prefix) => name.starts_with(prefix).then_some(name),
            Matcher::Suffix(suffix) => name.strip_suffix(suffix),
        }
    }
}

/// `_id_list` must precede `_list`, and both must precede `_id`.
const RULES: &[Rule] = &[
    Rule::new(Matcher::Suffix("_ex"), RuleKind::Exclude),
    Rule::new(Matcher::Prefix("order"), RuleKind::Order),
    Rule::new(Matcher::Suffix("_id_list"), RuleKind::Membership(Lookup::IdIn)),
    Rule::new(Matcher::Suffix("_list"), RuleKind::Membership(Lookup::NameIn)),
    Rule::new(Matcher::Suffix("_id"), RuleKind::Single(Lookup::Id)),
    Rule::new(Matcher::Suffix("_name"), RuleKind::Single(Lookup::Name)),
    Rule::new(Matcher::Suffix("_min"), RuleKind::Single(Lookup::Gte)),
    Rule::new(Matcher::Suffix("_max"), RuleKind::Single(Lookup::Lte)),
];

/// Translate request parameters into a [`FilterSet`].
///
/// Deterministic: the same ordered input always yields the same output.
pub fn translate<I, K>(params: I) -> Result<FilterSet, FilterError>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut set = FilterSet::default();

    for (name, value) in params {
        let name = name.as_ref();
        if is_falsy(&value) {
            continue;
        }

        let matched = RULES
            .iter()
            .find_map(|rule| rule.matches(name).map(|column| (rule.kind, column)));

        match matched {
            Some((RuleKind::Exclude, _)) => {
                tracing::debug!(param = name, "Exclusion parameter ignored");
            },
            Some((RuleKind::Order, _)) => {
                set.order = Some(parse_order(name, &value)?);
            },
            Some((RuleKind::Membership(lookup), column)) => {
                let members = split_members(&value);
                if members.is_empty() {
                    continue;
                }
                set.insert(Predicate {
                    column: column.to_string(),
                    lookup,
                    operand: Operand::Set(members),
                });
                set.distinct = true;
            },
            Some((RuleKind::Single(lookup), column)) => set.insert(Predicate {
                column: column.to_string(),
                lookup,
                operand: Operand::Value(value),
            }),
            None => set.insert(Predicate {
                column: name.to_string(),
                lookup: Lookup::Exact,
                operand: Operand::Value(value),
            }),
        }
    }

    Ok(set)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Accepts `["size", "desc"]`, `"size,desc"` or a bare column name.
fn parse_order(name: &str, value: &Value) -> Result<OrderKey, FilterError> {
    let invalid = |reason: &str| FilterError::InvalidOrdering {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<String> = match value {
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<_>>()
            .ok_or_else(|| invalid("expected a list of strings"))?,
        _ => return Err(invalid("expected [column, direction]")),
    };

    match parts.as_slice() {
        [column] | [column, _] if column.is_empty() => Err(invalid("column is empty")),
        [column] => Ok(OrderKey::asc(column.as_str())),
        [column, direction] if direction == "desc" => Ok(OrderKey::desc(column.as_str())),
        [column, _] => Ok(OrderKey::asc(column.as_str())),
        _ => Err(invalid("expected [column, direction]")),
    }
}

fn split_members(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        other => vec![value_to_string(other)],
    };

    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// String form of a scalar JSON value, without quotes for strings.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
