//! Schema inference from observed values.
//!
//! Used when a table is written without an explicit schema. Every column's
//! values are folded into a [`Shape`]; shapes are only turned into schemas
//! (and given generated names) at the end.

use std::collections::HashSet;

use serde_json::Value;

use crate::schema::{
    AvroSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType, LogicalTypeName, RecordSchema,
};
use crate::value::AvroValue;

/// Name of the inferred top-level record.
pub const ROW_RECORD_NAME: &str = "Row";

/// What has been observed at one position so far.
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    /// No value observed (an empty array's items, an empty column)
    Unknown,
    /// Primitives and logical types over primitives
    Leaf(AvroSchema),
    Fixed(usize, Option<LogicalTypeName>),
    Enum(Vec<String>),
    Array(Box<Shape>),
    Map(Box<Shape>),
    Record(Vec<(String, Shape)>),
    /// Branches with distinct keys, null first when present
    Union(Vec<Shape>),
}

impl Shape {
    fn of(value: &AvroValue) -> Shape {
        use LogicalTypeName as L;
        let logical = |base, lt| Shape::Leaf(AvroSchema::Logical(LogicalType::new(base, lt)));

        match value {
            AvroValue::Null => Shape::Leaf(AvroSchema::Null),
            AvroValue::Boolean(_) => Shape::Leaf(AvroSchema::Boolean),
            AvroValue::Int(_) => Shape::Leaf(AvroSchema::Int),
            AvroValue::Long(_) => Shape::Leaf(AvroSchema::Long),
            AvroValue::Float(_) => Shape::Leaf(AvroSchema::Float),
            AvroValue::Double(_) => Shape::Leaf(AvroSchema::Double),
            AvroValue::Bytes(_) => Shape::Leaf(AvroSchema::Bytes),
            AvroValue::String(_) => Shape::Leaf(AvroSchema::String),
            AvroValue::Fixed(b) => Shape::Fixed(b.len(), None),
            AvroValue::Enum(_, symbol) => Shape::Enum(vec![symbol.clone()]),
            AvroValue::Union(_, inner) => Shape::of(inner),
            AvroValue::Array(items) => Shape::Array(Box::new(
                items.iter().map(Shape::of).fold(Shape::Unknown, merge),
            )),
            AvroValue::Map(entries) => Shape::Map(Box::new(
                entries
                    .iter()
                    .map(|(_, v)| Shape::of(v))
                    .fold(Shape::Unknown, merge),
            )),
            AvroValue::Record(fields) => Shape::Record(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), Shape::of(v)))
                    .collect(),
            ),
            AvroValue::Decimal {
                precision, scale, ..
            } => logical(
                AvroSchema::Bytes,
                L::Decimal {
                    precision: *precision,
                    scale: *scale,
                },
            ),
            AvroValue::Uuid(_) => logical(AvroSchema::String, L::Uuid),
            AvroValue::Date(_) => logical(AvroSchema::Int, L::Date),
            AvroValue::TimeMillis(_) => logical(AvroSchema::Int, L::TimeMillis),
            AvroValue::TimeMicros(_) => logical(AvroSchema::Long, L::TimeMicros),
            AvroValue::TimestampMillis(_) => logical(AvroSchema::Long, L::TimestampMillis),
            AvroValue::TimestampMicros(_) => logical(AvroSchema::Long, L::TimestampMicros),
            AvroValue::LocalTimestampMillis(_) => {
                logical(AvroSchema::Long, L::LocalTimestampMillis)
            }
            AvroValue::LocalTimestampMicros(_) => {
                logical(AvroSchema::Long, L::LocalTimestampMicros)
            }
            AvroValue::Duration { .. } => Shape::Fixed(12, Some(L::Duration)),
        }
    }

    /// Branch identity inside a union; equal keys are merged.
    fn key(&self) -> String {
        match self {
            Shape::Unknown => String::new(),
            Shape::Leaf(schema) => schema.type_key(),
            Shape::Fixed(size, _) => format!("fixed:{}", size),
            Shape::Enum(_) => "enum".to_string(),
            Shape::Array(_) => "array".to_string(),
            Shape::Map(_) => "map".to_string(),
            Shape::Record(_) => "record".to_string(),
            Shape::Union(_) => "union".to_string(),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Shape::Leaf(AvroSchema::Null))
    }
}

fn merge(a: Shape, b: Shape) -> Shape {
    match (a, b) {
        (Shape::Unknown, s) | (s, Shape::Unknown) => s,
        (Shape::Union(mut branches), other) => {
            add_branch(&mut branches, other);
            Shape::Union(branches)
        }
        (other, Shape::Union(rest)) => {
            let mut branches = vec![other];
            for shape in rest {
                add_branch(&mut branches, shape);
            }
            Shape::Union(branches)
        }
        (a, b) if a.key() == b.key() => merge_same(a, b),
        (a, b) => {
            let mut branches = vec![a];
            add_branch(&mut branches, b);
            Shape::Union(branches)
        }
    }
}

fn add_branch(branches: &mut Vec<Shape>, shape: Shape) {
    match shape {
        Shape::Unknown => {}
        Shape::Union(inner) => {
            for s in inner {
                add_branch(branches, s);
            }
        }
        shape => match branches.iter().position(|b| b.key() == shape.key()) {
            Some(i) => {
                let existing = std::mem::replace(&mut branches[i], Shape::Unknown);
                branches[i] = merge_same(existing, shape);
            }
            None if shape.is_null() => branches.insert(0, shape),
            None => branches.push(shape),
        },
    }
}

/// Merge two shapes with the same key.
fn merge_same(a: Shape, b: Shape) -> Shape {
    match (a, b) {
        (Shape::Leaf(x), Shape::Leaf(y)) => Shape::Leaf(merge_leaf(x, y)),
        (Shape::Fixed(size, la), Shape::Fixed(_, lb)) => Shape::Fixed(size, la.or(lb)),
        (Shape::Enum(mut symbols), Shape::Enum(more)) => {
            for s in more {
                if !symbols.contains(&s) {
                    symbols.push(s);
                }
            }
            Shape::Enum(symbols)
        }
        (Shape::Array(x), Shape::Array(y)) => Shape::Array(Box::new(merge(*x, *y))),
        (Shape::Map(x), Shape::Map(y)) => Shape::Map(Box::new(merge(*x, *y))),
        (Shape::Record(x), Shape::Record(y)) => Shape::Record(merge_fields(x, y)),
        (a, _) => a,
    }
}

/// Logical leaves win over their raw base; decimals keep the widest precision.
fn merge_leaf(x: AvroSchema, y: AvroSchema) -> AvroSchema {
    match (x, y) {
        (AvroSchema::Logical(mut lx), AvroSchema::Logical(ly)) => {
            if let (
                LogicalTypeName::Decimal {
                    precision: px,
                    scale: sx,
                },
                LogicalTypeName::Decimal {
                    precision: py,
                    scale: sy,
                },
            ) = (lx.logical_type.clone(), ly.logical_type)
            {
                if sx == sy && py > px {
                    lx.logical_type = LogicalTypeName::Decimal {
                        precision: py,
                        scale: sy,
                    };
                }
            }
            AvroSchema::Logical(lx)
        }
        (_, logical @ AvroSchema::Logical(_)) => logical,
        (x, _) => x,
    }
}

/// Fields missing on either side become nullable.
fn merge_fields(x: Vec<(String, Shape)>, mut y: Vec<(String, Shape)>) -> Vec<(String, Shape)> {
    let null = || Shape::Leaf(AvroSchema::Null);
    let mut merged = Vec::with_capacity(x.len().max(y.len()));
    for (name, shape) in x {
        let other = match y.iter().position(|(n, _)| *n == name) {
            Some(i) => y.remove(i).1,
            None => null(),
        };
        merged.push((name, merge(shape, other)));
    }
    for (name, shape) in y {
        merged.push((name, merge(null(), shape)));
    }
    merged
}

/// Generates unique, valid names for inferred named types.
struct Namer {
    used: HashSet<String>,
}

impl Namer {
    fn name(&mut self, path: &str) -> String {
        let mut base: String = path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if !base.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            base.insert(0, '_');
        }
        let mut candidate = base.clone();
        let mut n = 1;
        while !self.used.insert(candidate.clone()) {
            n += 1;
            candidate = format!("{}{}", base, n);
        }
        candidate
    }

    fn schema(&mut self, shape: Shape, path: &str) -> AvroSchema {
        match shape {
            Shape::Unknown => AvroSchema::Null,
            Shape::Leaf(schema) => schema,
            Shape::Fixed(size, logical) => {
                let fixed = AvroSchema::Fixed(FixedSchema::new(
                    self.name(&format!("{}_fixed{}", path, size)),
                    size,
                ));
                match logical {
                    Some(lt) => AvroSchema::Logical(LogicalType::new(fixed, lt)),
                    None => fixed,
                }
            }
            Shape::Enum(symbols) => {
                AvroSchema::Enum(EnumSchema::new(self.name(&format!("{}_enum", path)), symbols))
            }
            Shape::Array(items) => {
                AvroSchema::Array(Box::new(self.schema(*items, &format!("{}_item", path))))
            }
            Shape::Map(values) => {
                AvroSchema::Map(Box::new(self.schema(*values, &format!("{}_value", path))))
            }
            Shape::Record(fields) => {
                let name = self.name(path);
                AvroSchema::Record(RecordSchema::new(name, self.fields(fields, path)))
            }
            Shape::Union(branches) => AvroSchema::Union(
                branches
                    .into_iter()
                    .map(|b| self.schema(b, path))
                    .collect(),
            ),
        }
    }

    fn fields(&mut self, fields: Vec<(String, Shape)>, path: &str) -> Vec<FieldSchema> {
        fields
            .into_iter()
            .map(|(name, shape)| {
                let schema = self.schema(shape, &format!("{}_{}", path, name));
                field_with_null_default(name, schema)
            })
            .collect()
    }
}

fn field_with_null_default(name: String, schema: AvroSchema) -> FieldSchema {
    let nullable_first = match &schema {
        AvroSchema::Null => true,
        AvroSchema::Union(branches) => matches!(branches.first(), Some(AvroSchema::Null)),
        _ => false,
    };
    let field = FieldSchema::new(name, schema);
    if nullable_first {
        field.with_default(Value::Null)
    } else {
        field
    }
}

/// Infer a record schema named `Row` for rows of `column_names`.
///
/// Each column's type merges the types of every value observed in it: nulls
/// add a leading `null` branch, differing kinds become a union, collections
/// and records merge element-wise and enums merge their symbols. A column
/// with no observed values is `null`. Nested named types get names derived
/// from their column path.
///
/// # Example
/// ```
/// use tarmac::schema::{infer_schema, AvroSchema};
/// use tarmac::value::AvroValue;
///
/// let rows = vec![
///     vec![AvroValue::Long(1), AvroValue::Null],
///     vec![AvroValue::Long(2), AvroValue::from("x")],
/// ];
/// let schema = infer_schema(&["id", "note"], rows.iter().map(|r| r.as_slice()));
/// let record = schema.as_record().unwrap();
/// assert_eq!(record.fields[0].schema, AvroSchema::Long);
/// assert_eq!(
///     record.fields[1].schema,
///     AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String])
/// );
/// ```
pub fn infer_schema<'a, S, I>(column_names: &[S], rows: I) -> AvroSchema
where
    S: AsRef<str>,
    I: IntoIterator<Item = &'a [AvroValue]>,
{
    let mut shapes = vec![Shape::Unknown; column_names.len()];
    for row in rows {
        for (shape, value) in shapes.iter_mut().zip(row) {
            let current = std::mem::replace(shape, Shape::Unknown);
            *shape = merge(current, Shape::of(value));
        }
    }

    let mut namer = Namer {
        used: HashSet::from([ROW_RECORD_NAME.to_string()]),
    };
    let fields = column_names
        .iter()
        .zip(shapes)
        .map(|(name, shape)| (name.as_ref().to_string(), shape))
        .collect();
    let fields = namer.fields(fields, ROW_RECORD_NAME);
    AvroSchema::Record(RecordSchema::new(ROW_RECORD_NAME, fields))
}
