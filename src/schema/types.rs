//! Avro schema model.
//!
//! A schema is a closed tree of [`AvroSchema`] nodes. Named types (records,
//! enums, fixed) are defined once; later uses of the same type, including
//! recursive self-references, appear as [`AvroSchema::Named`] and are looked
//! up through a [`SchemaResolutionContext`](super::SchemaResolutionContext).

use std::collections::HashSet;

use serde_json::{json, Map, Value};

/// Represents an Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    /// Null type - no value.
    Null,
    /// Boolean type.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit IEEE 754 floating-point.
    Float,
    /// 64-bit IEEE 754 floating-point.
    Double,
    /// Sequence of bytes.
    Bytes,
    /// Unicode string.
    String,

    /// Record type with named fields.
    Record(RecordSchema),
    /// Enumeration type.
    Enum(EnumSchema),
    /// Array of items with a single schema.
    Array(Box<AvroSchema>),
    /// Map with string keys and values of a single schema.
    Map(Box<AvroSchema>),
    /// Union of multiple schemas.
    Union(Vec<AvroSchema>),
    /// Fixed-size byte array.
    Fixed(FixedSchema),

    /// Reference by full name to a named type defined elsewhere in the tree.
    Named(String),

    /// Logical type decorating a primitive or fixed base.
    Logical(LogicalType),
}

/// Join a namespace and a simple name into a full name.
pub(crate) fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

/// Common JSON attributes of named types.
fn named_json(
    kind: &str,
    name: &str,
    namespace: &Option<String>,
    doc: &Option<String>,
    aliases: &[String],
) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind));
    obj.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        obj.insert("namespace".to_string(), json!(ns));
    }
    if let Some(doc) = doc {
        obj.insert("doc".to_string(), json!(doc));
    }
    if !aliases.is_empty() {
        obj.insert("aliases".to_string(), json!(aliases));
    }
    obj
}

/// Schema for a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// Simple name of the record.
    pub name: String,
    /// Optional namespace.
    pub namespace: Option<String>,
    /// Fields in declaration (and wire) order.
    pub fields: Vec<FieldSchema>,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Aliases for this record.
    pub aliases: Vec<String>,
}

impl RecordSchema {
    /// Create a new RecordSchema with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
            doc: None,
            aliases: Vec::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn json_value(&self, seen: &mut HashSet<String>) -> Value {
        let mut obj = named_json(
            "record",
            &self.name,
            &self.namespace,
            &self.doc,
            &self.aliases,
        );
        let fields: Vec<Value> = self.fields.iter().map(|f| f.json_value(seen)).collect();
        obj.insert("fields".to_string(), Value::Array(fields));
        Value::Object(obj)
    }
}

/// Schema for a field within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// The name of the field.
    pub name: String,
    /// The schema of the field's value.
    pub schema: AvroSchema,
    /// Default used when a written record omits the field.
    pub default: Option<Value>,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Sort order hint.
    pub order: FieldOrder,
    /// Aliases for this field.
    pub aliases: Vec<String>,
}

impl FieldSchema {
    /// Create a new FieldSchema with the given name and schema.
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
            order: FieldOrder::Ascending,
            aliases: Vec::new(),
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    fn json_value(&self, seen: &mut HashSet<String>) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(&self.name));
        obj.insert("type".to_string(), self.schema.json_value(seen));
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        if self.order != FieldOrder::Ascending {
            obj.insert("order".to_string(), json!(self.order.as_str()));
        }
        if !self.aliases.is_empty() {
            obj.insert("aliases".to_string(), json!(&self.aliases));
        }
        Value::Object(obj)
    }
}

/// Field ordering for record comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    #[default]
    Ascending,
    Descending,
    Ignore,
}

impl FieldOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOrder::Ascending => "ascending",
            FieldOrder::Descending => "descending",
            FieldOrder::Ignore => "ignore",
        }
    }
}

/// Schema for an enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    /// Simple name of the enum.
    pub name: String,
    /// Optional namespace.
    pub namespace: Option<String>,
    /// Symbols in index order.
    pub symbols: Vec<String>,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Aliases for this enum.
    pub aliases: Vec<String>,
    /// Default symbol.
    pub default: Option<String>,
}

impl EnumSchema {
    /// Create a new EnumSchema with the given name and symbols.
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            symbols,
            doc: None,
            aliases: Vec::new(),
            default: None,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }

    /// Get the index of a symbol.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    fn json_value(&self) -> Value {
        let mut obj = named_json("enum", &self.name, &self.namespace, &self.doc, &self.aliases);
        obj.insert("symbols".to_string(), json!(&self.symbols));
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), json!(default));
        }
        Value::Object(obj)
    }
}

/// Schema for a fixed-size byte array.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    /// Simple name of the fixed type.
    pub name: String,
    /// Optional namespace.
    pub namespace: Option<String>,
    /// The size in bytes.
    pub size: usize,
    /// Optional documentation.
    pub doc: Option<String>,
    /// Aliases for this fixed type.
    pub aliases: Vec<String>,
}

impl FixedSchema {
    /// Create a new FixedSchema with the given name and size.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            size,
            doc: None,
            aliases: Vec::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }

    fn json_map(&self) -> Map<String, Value> {
        let mut obj = named_json("fixed", &self.name, &self.namespace, &self.doc, &self.aliases);
        obj.insert("size".to_string(), json!(self.size));
        obj
    }
}

/// Logical type wrapper around a base schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalType {
    /// The underlying Avro schema.
    pub base: Box<AvroSchema>,
    /// The logical type name and parameters.
    pub logical_type: LogicalTypeName,
}

impl LogicalType {
    /// Create a new LogicalType.
    pub fn new(base: AvroSchema, logical_type: LogicalTypeName) -> Self {
        Self {
            base: Box::new(base),
            logical_type,
        }
    }

    /// The logical attributes are merged into the base type's object form.
    fn json_value(&self, seen: &mut HashSet<String>) -> Value {
        let mut obj = match &*self.base {
            AvroSchema::Fixed(f) => {
                seen.insert(f.fullname());
                f.json_map()
            }
            base => match base.json_value(seen) {
                Value::Object(m) => m,
                other => {
                    let mut m = Map::new();
                    m.insert("type".to_string(), other);
                    m
                }
            },
        };

        obj.insert("logicalType".to_string(), json!(self.logical_type.name()));
        if let LogicalTypeName::Decimal { precision, scale } = &self.logical_type {
            obj.insert("precision".to_string(), json!(precision));
            if *scale > 0 {
                obj.insert("scale".to_string(), json!(scale));
            }
        }
        Value::Object(obj)
    }
}

/// Logical type names with their parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalTypeName {
    /// Decimal with precision and scale, on bytes or fixed.
    Decimal { precision: u32, scale: u32 },
    /// UUID, on string or fixed(16).
    Uuid,
    /// Days since the Unix epoch, on int.
    Date,
    /// Milliseconds after midnight, on int.
    TimeMillis,
    /// Microseconds after midnight, on long.
    TimeMicros,
    /// Milliseconds since the Unix epoch (UTC), on long.
    TimestampMillis,
    /// Microseconds since the Unix epoch (UTC), on long.
    TimestampMicros,
    /// Months, days and milliseconds, on fixed(12).
    Duration,
    /// Local timestamp in milliseconds (no timezone), on long.
    LocalTimestampMillis,
    /// Local timestamp in microseconds (no timezone), on long.
    LocalTimestampMicros,
}

impl LogicalTypeName {
    /// Get the string name of the logical type.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalTypeName::Decimal { .. } => "decimal",
            LogicalTypeName::Uuid => "uuid",
            LogicalTypeName::Date => "date",
            LogicalTypeName::TimeMillis => "time-millis",
            LogicalTypeName::TimeMicros => "time-micros",
            LogicalTypeName::TimestampMillis => "timestamp-millis",
            LogicalTypeName::TimestampMicros => "timestamp-micros",
            LogicalTypeName::Duration => "duration",
            LogicalTypeName::LocalTimestampMillis => "local-timestamp-millis",
            LogicalTypeName::LocalTimestampMicros => "local-timestamp-micros",
        }
    }
}

impl AvroSchema {
    /// Check if this schema is a primitive type.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AvroSchema::Null
                | AvroSchema::Boolean
                | AvroSchema::Int
                | AvroSchema::Long
                | AvroSchema::Float
                | AvroSchema::Double
                | AvroSchema::Bytes
                | AvroSchema::String
        )
    }

    /// Check if this schema defines a named type (record, enum, or fixed).
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            AvroSchema::Record(_) | AvroSchema::Enum(_) | AvroSchema::Fixed(_)
        )
    }

    /// Get the fully qualified name of a named type or reference.
    pub fn fullname(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.fullname()),
            AvroSchema::Enum(e) => Some(e.fullname()),
            AvroSchema::Fixed(f) => Some(f.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            AvroSchema::Logical(lt) => lt.base.fullname(),
            _ => None,
        }
    }

    /// Check if this schema is a union containing null.
    pub fn is_nullable(&self) -> bool {
        match self {
            AvroSchema::Union(variants) => variants.iter().any(|v| matches!(v, AvroSchema::Null)),
            _ => false,
        }
    }

    /// Borrow the record definition, if this node is one.
    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            AvroSchema::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Identity of this node among union branches.
    ///
    /// Unnamed kinds are identified by kind, named types by full name, and
    /// logical nodes share the identity of their base.
    pub fn type_key(&self) -> String {
        match self {
            AvroSchema::Null => "null".to_string(),
            AvroSchema::Boolean => "boolean".to_string(),
            AvroSchema::Int => "int".to_string(),
            AvroSchema::Long => "long".to_string(),
            AvroSchema::Float => "float".to_string(),
            AvroSchema::Double => "double".to_string(),
            AvroSchema::Bytes => "bytes".to_string(),
            AvroSchema::String => "string".to_string(),
            AvroSchema::Array(_) => "array".to_string(),
            AvroSchema::Map(_) => "map".to_string(),
            AvroSchema::Union(_) => "union".to_string(),
            AvroSchema::Record(r) => r.fullname(),
            AvroSchema::Enum(e) => e.fullname(),
            AvroSchema::Fixed(f) => f.fullname(),
            AvroSchema::Named(n) => n.clone(),
            AvroSchema::Logical(lt) => lt.base.type_key(),
        }
    }

    /// Serialize the schema to a JSON string.
    ///
    /// Named types are written in full at their first occurrence and by
    /// full name afterwards, so the output parses back to this schema.
    ///
    /// # Example
    /// ```
    /// use tarmac::schema::AvroSchema;
    ///
    /// let schema = AvroSchema::Array(Box::new(AvroSchema::String));
    /// assert_eq!(schema.to_json(), r#"{"items":"string","type":"array"}"#);
    /// ```
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Serialize the schema to a JSON Value.
    pub fn to_json_value(&self) -> Value {
        self.json_value(&mut HashSet::new())
    }

    fn json_value(&self, seen: &mut HashSet<String>) -> Value {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Boolean => json!("boolean"),
            AvroSchema::Int => json!("int"),
            AvroSchema::Long => json!("long"),
            AvroSchema::Float => json!("float"),
            AvroSchema::Double => json!("double"),
            AvroSchema::Bytes => json!("bytes"),
            AvroSchema::String => json!("string"),

            AvroSchema::Record(r) => {
                if !seen.insert(r.fullname()) {
                    return json!(r.fullname());
                }
                r.json_value(seen)
            }
            AvroSchema::Enum(e) => {
                if !seen.insert(e.fullname()) {
                    return json!(e.fullname());
                }
                e.json_value()
            }
            AvroSchema::Fixed(f) => {
                if !seen.insert(f.fullname()) {
                    return json!(f.fullname());
                }
                Value::Object(f.json_map())
            }
            AvroSchema::Array(items) => json!({
                "type": "array",
                "items": items.json_value(seen)
            }),
            AvroSchema::Map(values) => json!({
                "type": "map",
                "values": values.json_value(seen)
            }),
            AvroSchema::Union(variants) => {
                Value::Array(variants.iter().map(|v| v.json_value(seen)).collect())
            }
            AvroSchema::Named(name) => json!(name),
            AvroSchema::Logical(lt) => lt.json_value(seen),
        }
    }
}

impl std::fmt::Display for AvroSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> RecordSchema {
        RecordSchema::new(
            "Point",
            vec![
                FieldSchema::new("x", AvroSchema::Int),
                FieldSchema::new("y", AvroSchema::Int),
            ],
        )
        .with_namespace("geo")
    }

    #[test]
    fn test_fullname_with_and_without_namespace() {
        assert_eq!(point().fullname(), "geo.Point");
        assert_eq!(FixedSchema::new("md5", 16).fullname(), "md5");
    }

    #[test]
    fn test_field_lookup() {
        let record = point();
        assert_eq!(record.field_index("y"), Some(1));
        assert_eq!(record.field("x").map(|f| &f.schema), Some(&AvroSchema::Int));
        assert!(record.field("z").is_none());
    }

    #[test]
    fn test_type_key_logical_shares_base() {
        let date = AvroSchema::Logical(LogicalType::new(AvroSchema::Int, LogicalTypeName::Date));
        assert_eq!(date.type_key(), AvroSchema::Int.type_key());
        assert_eq!(AvroSchema::Record(point()).type_key(), "geo.Point");
        assert_eq!(AvroSchema::Named("geo.Point".into()).type_key(), "geo.Point");
    }

    #[test]
    fn test_second_occurrence_serialized_by_name() {
        let schema = AvroSchema::Record(RecordSchema::new(
            "Line",
            vec![
                FieldSchema::new("from", AvroSchema::Record(point())),
                FieldSchema::new("to", AvroSchema::Record(point())),
            ],
        ));
        let value = schema.to_json_value();
        assert!(value["fields"][0]["type"].is_object());
        assert_eq!(value["fields"][1]["type"], json!("geo.Point"));
    }

    #[test]
    fn test_logical_fixed_json_merges_attributes() {
        let schema = AvroSchema::Logical(LogicalType::new(
            AvroSchema::Fixed(FixedSchema::new("money", 8)),
            LogicalTypeName::Decimal {
                precision: 10,
                scale: 2,
            },
        ));
        let value = schema.to_json_value();
        assert_eq!(value["type"], json!("fixed"));
        assert_eq!(value["size"], json!(8));
        assert_eq!(value["logicalType"], json!("decimal"));
        assert_eq!(value["scale"], json!(2));
    }

    #[test]
    fn test_nullable() {
        let opt = AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String]);
        assert!(opt.is_nullable());
        assert!(!AvroSchema::String.is_nullable());
    }
}
