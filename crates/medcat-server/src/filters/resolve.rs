//! Resolution of predicate keys against the dataset column catalogue
//!
//! Turns the syntactic [`FilterSet`] into typed [`Condition`]s that a store can
//! evaluate, rejecting unknown columns, unsupported lookups and operands that do
//! not parse as the column's type.

use serde_json::Value;

use super::{value_to_string, FilterError, FilterSet, Lookup, Operand, OrderKey, Predicate};

/// Integer and text columns of `datasets`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarColumn {
    Id,
    RecordCount,
    Size,
    Title,
    Description,
    ExternalPath,
    LocalPath,
    License,
}

impl ScalarColumn {
    pub const ALL: [ScalarColumn; 8] = [
        ScalarColumn::Id,
        ScalarColumn::RecordCount,
        ScalarColumn::Size,
        ScalarColumn::Title,
        ScalarColumn::Description,
        ScalarColumn::ExternalPath,
        ScalarColumn::LocalPath,
        ScalarColumn::License,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarColumn::Id => "id",
            ScalarColumn::RecordCount => "record_count",
            ScalarColumn::Size => "size",
            ScalarColumn::Title => "title",
            ScalarColumn::Description => "description",
            ScalarColumn::ExternalPath => "external_path",
            ScalarColumn::LocalPath => "local_path",
            ScalarColumn::License => "license",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarColumn::Id | ScalarColumn::RecordCount | ScalarColumn::Size
        )
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Many-to-many relations of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Modalities,
    MlTasks,
    Tags,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::Modalities, Relation::MlTasks, Relation::Tags];

    pub fn name(self) -> &'static str {
        match self {
            Relation::Modalities => "modalities",
            Relation::MlTasks => "ml_tasks",
            Relation::Tags => "tags",
        }
    }

    /// Lookup table holding the entity names
    pub fn table(self) -> &'static str {
        self.name()
    }

    /// Association table joining datasets to the entity
    pub fn join_table(self) -> &'static str {
        match self {
            Relation::Modalities => "dataset_modalities",
            Relation::MlTasks => "dataset_ml_tasks",
            Relation::Tags => "dataset_tags",
        }
    }

    /// Foreign key column in the association table
    pub fn foreign_key(self) -> &'static str {
        match self {
            Relation::Modalities => "modality_id",
            Relation::MlTasks => "ml_task_id",
            Relation::Tags => "tag_id",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gte,
    Lte,
}

impl CmpOp {
    pub fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => " = ",
            CmpOp::Gte => " >= ",
            CmpOp::Lte => " <= ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Int(i64),
    Text(String),
}

/// Match on a referenced lookup entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityMatch {
    Id(i64),
    Name(String),
    IdIn(Vec<i64>),
    NameIn(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Scalar {
        column: ScalarColumn,
        op: CmpOp,
        value: ScalarValue,
    },
    AnatomicalArea(EntityMatch),
    Related(Relation, EntityMatch),
}

/// Columns accepted by ordering keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderColumn {
    Scalar(ScalarColumn),
    CreatedAt,
    UpdatedAt,
}

impl OrderColumn {
    pub fn name(self) -> &'static str {
        match self {
            OrderColumn::Scalar(column) => column.name(),
            OrderColumn::CreatedAt => "created_at",
            OrderColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub column: OrderColumn,
    pub descending: bool,
}

impl Default for Ordering {
    /// Newest first
    fn default() -> Self {
        Self {
            column: OrderColumn::CreatedAt,
            descending: true,
        }
    }
}

impl TryFrom<&OrderKey> for Ordering {
    type Error = FilterError;

    fn try_from(key: &OrderKey) -> Result<Self, Self::Error> {
        let column = match key.column.as_str() {
            "created_at" => OrderColumn::CreatedAt,
            "updated_at" => OrderColumn::UpdatedAt,
            other => ScalarColumn::from_name(other)
                .map(OrderColumn::Scalar)
                .ok_or_else(|| FilterError::InvalidOrderColumn(key.to_string()))?,
        };
        Ok(Self {
            column,
            descending: key.descending,
        })
    }
}

/// Typed form of a [`FilterSet`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFilters {
    pub conditions: Vec<Condition>,
    pub ordering: Option<Ordering>,
    pub distinct: bool,
}

/// Resolve every predicate and the ordering key of `set`.
pub fn resolve(set: &FilterSet) -> Result<ResolvedFilters, FilterError> {
    let conditions = set
        .predicates()
        .iter()
        .map(resolve_predicate)
        .collect::<Result<Vec<_>, _>>()?;
    let ordering = set.order().map(Ordering::try_from).transpose()?;

    Ok(ResolvedFilters {
        conditions,
        ordering,
        distinct: set.distinct(),
    })
}

fn resolve_predicate(predicate: &Predicate) -> Result<Condition, FilterError> {
    let column = predicate.column.as_str();

    if let Some(scalar) = ScalarColumn::from_name(column) {
        let op = match predicate.lookup {
            Lookup::Exact => CmpOp::Eq,
            Lookup::Gte => CmpOp::Gte,
            Lookup::Lte => CmpOp::Lte,
            _ => return Err(unsupported(predicate)),
        };
        let raw = single(predicate)?;
        let value = if scalar.is_integer() {
            ScalarValue::Int(parse_int(predicate, raw)?)
        } else {
            ScalarValue::Text(value_to_string(raw))
        };
        return Ok(Condition::Scalar {
            column: scalar,
            op,
            value,
        });
    }

    if column == "anatomical_area" {
        // the bare foreign key compares ids
        let entity = match predicate.lookup {
            Lookup::Exact => EntityMatch::Id(parse_int(predicate, single(predicate)?)?),
            _ => entity_match(predicate)?,
        };
        return Ok(Condition::AnatomicalArea(entity));
    }

    if let Some(relation) = Relation::from_name(column) {
        return Ok(Condition::Related(relation, entity_match(predicate)?));
    }

    Err(FilterError::UnknownColumn(column.to_string()))
}

fn entity_match(predicate: &Predicate) -> Result<EntityMatch, FilterError> {
    match predicate.lookup {
        Lookup::Id => Ok(EntityMatch::Id(parse_int(predicate, single(predicate)?)?)),
        Lookup::Name => Ok(EntityMatch::Name(value_to_string(single(predicate)?))),
        Lookup::IdIn => {
            let ids = set(predicate)?
                .iter()
                .map(|member| parse_int_str(predicate, member))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EntityMatch::IdIn(ids))
        },
        Lookup::NameIn => Ok(EntityMatch::NameIn(set(predicate)?.to_vec())),
        Lookup::Exact | Lookup::Gte | Lookup::Lte => Err(unsupported(predicate)),
    }
}

fn single(predicate: &Predicate) -> Result<&Value, FilterError> {
    match &predicate.operand {
        Operand::Value(value) => Ok(value),
        Operand::Set(_) => Err(invalid(predicate, "expected a single value")),
    }
}

fn set(predicate: &Predicate) -> Result<&[String], FilterError> {
    match &predicate.operand {
        Operand::Set(members) => Ok(members),
        Operand::Value(_) => Err(invalid(predicate, "expected a list of values")),
    }
}

fn parse_int(predicate: &Predicate, value: &Value) -> Result<i64, FilterError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid(predicate, "expected an integer")),
        Value::String(s) => parse_int_str(predicate, s),
        _ => Err(invalid(predicate, "expected an integer")),
    }
}

fn parse_int_str(predicate: &Predicate, raw: &str) -> Result<i64, FilterError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(predicate, &format!("'{}' is not an integer", raw)))
}

fn unsupported(predicate: &Predicate) -> FilterError {
    FilterError::UnsupportedLookup {
        column: predicate.column.clone(),
        lookup: predicate.lookup.suffix().trim_start_matches("__").to_string(),
    }
}

fn invalid(predicate: &Predicate, reason: &str) -> FilterError {
    FilterError::InvalidOperand {
        key: predicate.key(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::translate;
    use serde_json::json;

    fn resolve_pairs(pairs: &[(&str, Value)]) -> Result<ResolvedFilters, FilterError> {
        let set = translate(pairs.iter().map(|(k, v)| (*k, v.clone())))?;
        resolve(&set)
    }

    #[test]
    fn test_scalar_range() {
        let resolved = resolve_pairs(&[("size_min", json!("1000")), ("size_max", json!(5000))])
            .unwrap();
        assert_eq!(
            resolved.conditions,
            vec![
                Condition::Scalar {
                    column: ScalarColumn::Size,
                    op: CmpOp::Gte,
                    value: ScalarValue::Int(1000),
                },
                Condition::Scalar {
                    column: ScalarColumn::Size,
                    op: CmpOp::Lte,
                    value: ScalarValue::Int(5000),
                },
            ]
        );
    }

    #[test]
    fn test_text_exact() {
        let resolved = resolve_pairs(&[("license", json!("CC0"))]).unwrap();
        assert_eq!(
            resolved.conditions,
            vec![Condition::Scalar {
                column: ScalarColumn::License,
                op: CmpOp::Eq,
                value: ScalarValue::Text("CC0".to_string()),
            }]
        );
    }

    #[test]
    fn test_anatomical_area_lookups() {
        let resolved = resolve_pairs(&[
            ("anatomical_area", json!("4")),
            ("anatomical_area_name", json!("lung")),
            ("anatomical_area_id_list", json!("1,2")),
        ])
        .unwrap();
        assert_eq!(
            resolved.conditions,
            vec![
                Condition::AnatomicalArea(EntityMatch::Id(4)),
                Condition::AnatomicalArea(EntityMatch::Name("lung".to_string())),
                Condition::AnatomicalArea(EntityMatch::IdIn(vec![1, 2])),
            ]
        );
        assert!(resolved.distinct);
    }

    #[test]
    fn test_relation_lookups() {
        let resolved = resolve_pairs(&[("tags_list", json!("mri,ct"))]).unwrap();
        assert_eq!(
            resolved.conditions,
            vec![Condition::Related(
                Relation::Tags,
                EntityMatch::NameIn(vec!["mri".to_string(), "ct".to_string()])
            )]
        );
    }

    #[test]
    fn test_unknown_column() {
        assert_eq!(
            resolve_pairs(&[("colour", json!("red"))]),
            Err(FilterError::UnknownColumn("colour".to_string()))
        );
    }

    #[test]
    fn test_unsupported_lookup() {
        assert!(matches!(
            resolve_pairs(&[("size_list", json!("1,2"))]),
            Err(FilterError::UnsupportedLookup { .. })
        ));
        assert!(matches!(
            resolve_pairs(&[("tags_min", json!(1))]),
            Err(FilterError::UnsupportedLookup { .. })
        ));
    }

    #[test]
    fn test_bad_operand() {
        assert!(matches!(
            resolve_pairs(&[("size_min", json!("big"))]),
            Err(FilterError::InvalidOperand { .. })
        ));
        assert!(matches!(
            resolve_pairs(&[("tags_id_list", json!("1,x"))]),
            Err(FilterError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_ordering_resolution() {
        let resolved = resolve_pairs(&[("ordering", json!(["size", "desc"]))]).unwrap();
        assert_eq!(
            resolved.ordering,
            Some(Ordering {
                column: OrderColumn::Scalar(ScalarColumn::Size),
                descending: true,
            })
        );

        assert!(matches!(
            resolve_pairs(&[("ordering", json!(["tags", "asc"]))]),
            Err(FilterError::InvalidOrderColumn(_))
        ));
    }

    #[test]
    fn test_default_ordering_is_newest_first() {
        let ordering = Ordering::default();
        assert_eq!(ordering.column, OrderColumn::CreatedAt);
        assert!(ordering.descending);
    }
}
