//! JSON schema parser for Avro schemas.
//!
//! Parses Avro schema JSON into the [`AvroSchema`] tree. Named types must be
//! defined before they are referenced; a record's own name is usable inside
//! its fields, which is how recursive schemas are expressed.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::types::qualify;
use crate::schema::{
    AvroSchema, EnumSchema, FieldOrder, FieldSchema, FixedSchema, LogicalType, LogicalTypeName,
    RecordSchema,
};

/// Parse an Avro schema from a JSON string.
///
/// # Example
/// ```
/// use tarmac::schema::{parse_schema, AvroSchema};
///
/// let schema = parse_schema(r#"{"type": "array", "items": "long"}"#).unwrap();
/// assert_eq!(schema, AvroSchema::Array(Box::new(AvroSchema::Long)));
/// ```
pub fn parse_schema(json: &str) -> Result<AvroSchema, SchemaError> {
    parse_schema_with_options(json, false)
}

/// Parse an Avro schema from a JSON string with validation options.
///
/// With `strict` set, names that break the Avro naming rules (start with
/// `[A-Za-z_]`, then only `[A-Za-z0-9_]`) are errors instead of warnings.
/// Union rules and name resolution are always enforced.
pub fn parse_schema_with_options(json: &str, strict: bool) -> Result<AvroSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;

    SchemaParser::new().with_strict(strict).parse(&value)
}

/// Parse an Avro schema from a `.avsc` file.
pub fn parse_schema_file(path: impl AsRef<Path>) -> Result<AvroSchema, SchemaError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_schema(&text)
}

/// Schema parser with named type registry.
#[derive(Debug, Default)]
pub struct SchemaParser {
    /// Full names defined (or being defined) so far
    defined: HashSet<String>,
    /// Enclosing namespace for unqualified names
    current_namespace: Option<String>,
    /// Whether naming rule violations are errors
    strict_schema: bool,
}

/// Split a possibly dotted name into (namespace, simple name).
fn split_fullname(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((ns, simple)) => (Some(ns), simple),
        None => (None, name),
    }
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}

/// Name, namespace and full name of a named type definition.
struct Naming {
    name: String,
    namespace: Option<String>,
    fullname: String,
}

impl SchemaParser {
    /// Create a new SchemaParser in permissive mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether naming rule violations are errors.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Parse a JSON value into an AvroSchema.
    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => self.parse_type_name(s),
            Value::Object(obj) => self.parse_object(obj),
            Value::Array(arr) => self.parse_union(arr),
            other => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                other
            ))),
        }
    }

    /// Full names of every named type seen by this parser.
    pub fn defined_names(&self) -> impl Iterator<Item = &str> {
        self.defined.iter().map(String::as_str)
    }

    fn parse_type_name(&self, s: &str) -> Result<AvroSchema, SchemaError> {
        if let Some(primitive) = primitive(s) {
            return Ok(primitive);
        }
        let fullname = self.resolve_name(s);
        if self.defined.contains(&fullname) {
            Ok(AvroSchema::Named(fullname))
        } else if self.defined.contains(s) {
            Ok(AvroSchema::Named(s.to_string()))
        } else {
            Err(SchemaError::UnresolvedName(fullname))
        }
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let base = match type_value {
            Value::String(kind) => match kind.as_str() {
                "record" | "error" => self.parse_record(obj)?,
                "enum" => self.parse_enum(obj)?,
                "fixed" => self.parse_fixed(obj)?,
                "array" => {
                    let items = obj.get("items").ok_or_else(|| {
                        SchemaError::InvalidSchema("Array missing 'items' field".to_string())
                    })?;
                    AvroSchema::Array(Box::new(self.parse(items)?))
                }
                "map" => {
                    let values = obj.get("values").ok_or_else(|| {
                        SchemaError::InvalidSchema("Map missing 'values' field".to_string())
                    })?;
                    AvroSchema::Map(Box::new(self.parse(values)?))
                }
                other => self.parse_type_name(other)?,
            },
            nested => self.parse(nested)?,
        };

        match obj.get("logicalType") {
            Some(logical) => self.wrap_logical(obj, logical, base),
            None => Ok(base),
        }
    }

    fn parse_union(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        validate_union(&variants)?;
        Ok(AvroSchema::Union(variants))
    }

    /// Work out the naming of a named type and register it.
    fn define(&mut self, obj: &Map<String, Value>, kind: &str) -> Result<Naming, SchemaError> {
        let raw = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("{} missing 'name' field", kind))
        })?;

        let (embedded_ns, simple) = split_fullname(raw);
        self.validate_name(simple, kind)?;

        let namespace = match embedded_ns {
            Some(ns) => Some(ns.to_string()),
            None => match obj.get("namespace").and_then(Value::as_str) {
                Some(ns) => Some(ns.to_string()),
                None => self.current_namespace.clone(),
            },
        }
        .filter(|ns| !ns.is_empty());

        let fullname = qualify(namespace.as_deref(), simple);
        if !self.defined.insert(fullname.clone()) {
            return Err(SchemaError::InvalidSchema(format!(
                "Named type '{}' is defined more than once",
                fullname
            )));
        }

        Ok(Naming {
            name: simple.to_string(),
            namespace,
            fullname,
        })
    }

    fn parse_record(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let naming = self.define(obj, "Record")?;

        let fields_value = obj
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SchemaError::InvalidSchema(format!(
                    "Record '{}' missing 'fields' array",
                    naming.fullname
                ))
            })?;

        // Nested definitions inherit the record's namespace
        let outer = std::mem::replace(&mut self.current_namespace, naming.namespace.clone());
        let fields = fields_value
            .iter()
            .map(|f| self.parse_field(f))
            .collect::<Result<Vec<_>, _>>();
        self.current_namespace = outer;
        let fields = fields?;

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Record '{}' has duplicate field '{}'",
                    naming.fullname, field.name
                )));
            }
        }

        Ok(AvroSchema::Record(RecordSchema {
            name: naming.name,
            namespace: naming.namespace,
            fields,
            doc: optional_string(obj, "doc"),
            aliases: string_list(obj, "aliases"),
        }))
    }

    fn parse_field(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();
        self.validate_name(&name, "Field")?;

        let type_value = obj.get("type").ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name))
        })?;
        let schema = self.parse(type_value)?;

        let order = match obj.get("order").and_then(Value::as_str) {
            Some("descending") => FieldOrder::Descending,
            Some("ignore") => FieldOrder::Ignore,
            _ => FieldOrder::Ascending,
        };

        Ok(FieldSchema {
            name,
            schema,
            default: obj.get("default").cloned(),
            doc: optional_string(obj, "doc"),
            order,
            aliases: string_list(obj, "aliases"),
        })
    }

    fn parse_enum(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let naming = self.define(obj, "Enum")?;

        let symbols: Vec<String> = obj
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::InvalidSchema(format!("Enum symbol must be a string: {}", v))
                })
            })
            .collect::<Result<_, _>>()?;

        let mut seen = HashSet::new();
        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
            if !seen.insert(symbol.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Enum '{}' has duplicate symbol '{}'",
                    naming.fullname, symbol
                )));
            }
        }

        Ok(AvroSchema::Enum(EnumSchema {
            name: naming.name,
            namespace: naming.namespace,
            symbols,
            doc: optional_string(obj, "doc"),
            aliases: string_list(obj, "aliases"),
            default: optional_string(obj, "default"),
        }))
    }

    fn parse_fixed(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let naming = self.define(obj, "Fixed")?;

        let size = obj.get("size").and_then(Value::as_u64).ok_or_else(|| {
            SchemaError::InvalidSchema(format!(
                "Fixed '{}' needs a non-negative integer 'size'",
                naming.fullname
            ))
        })?;

        Ok(AvroSchema::Fixed(FixedSchema {
            name: naming.name,
            namespace: naming.namespace,
            size: size as usize,
            doc: optional_string(obj, "doc"),
            aliases: string_list(obj, "aliases"),
        }))
    }

    /// Attach a logical type to an already parsed base.
    ///
    /// Unknown logical types, and decimals without a usable precision, leave
    /// the base type as is.
    fn wrap_logical(
        &self,
        obj: &Map<String, Value>,
        logical: &Value,
        base: AvroSchema,
    ) -> Result<AvroSchema, SchemaError> {
        let Some(name) = logical.as_str() else {
            warn!(logical_type = %logical, "ignoring non-string logicalType");
            return Ok(base);
        };

        let logical_type = match name {
            "decimal" => {
                let precision = obj.get("precision").and_then(Value::as_u64);
                let scale = obj.get("scale").and_then(Value::as_u64).unwrap_or(0);
                match precision {
                    Some(p) if p > 0 && scale <= p && p <= u32::MAX as u64 => {
                        LogicalTypeName::Decimal {
                            precision: p as u32,
                            scale: scale as u32,
                        }
                    }
                    _ => {
                        warn!(?precision, scale, "ignoring decimal with invalid precision/scale");
                        return Ok(base);
                    }
                }
            }
            "uuid" => LogicalTypeName::Uuid,
            "date" => LogicalTypeName::Date,
            "time-millis" => LogicalTypeName::TimeMillis,
            "time-micros" => LogicalTypeName::TimeMicros,
            "timestamp-millis" => LogicalTypeName::TimestampMillis,
            "timestamp-micros" => LogicalTypeName::TimestampMicros,
            "duration" => LogicalTypeName::Duration,
            "local-timestamp-millis" => LogicalTypeName::LocalTimestampMillis,
            "local-timestamp-micros" => LogicalTypeName::LocalTimestampMicros,
            _ => return Ok(base),
        };

        Ok(AvroSchema::Logical(LogicalType::new(base, logical_type)))
    }

    /// Resolve a type name to its fully qualified form.
    fn resolve_name(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            qualify(self.current_namespace.as_deref(), name)
        }
    }

    /// Check a simple name against the Avro naming rules.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let problem = match chars.next() {
            None => Some(format!("{} name cannot be empty", context)),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => Some(format!(
                "{} name '{}' must start with a letter or underscore",
                context, name
            )),
            Some(_) => chars
                .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
                .map(|ch| {
                    format!(
                        "{} name '{}' contains invalid character '{}'",
                        context, name, ch
                    )
                }),
        };

        match problem {
            Some(msg) if self.strict_schema => Err(SchemaError::InvalidSchema(msg)),
            Some(msg) => {
                warn!("{}", msg);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn primitive(name: &str) -> Option<AvroSchema> {
    Some(match name {
        "null" => AvroSchema::Null,
        "boolean" => AvroSchema::Boolean,
        "int" => AvroSchema::Int,
        "long" => AvroSchema::Long,
        "float" => AvroSchema::Float,
        "double" => AvroSchema::Double,
        "bytes" => AvroSchema::Bytes,
        "string" => AvroSchema::String,
        _ => return None,
    })
}

/// Unions may not nest and may not hold two branches of the same identity.
pub(crate) fn validate_union(variants: &[AvroSchema]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (i, variant) in variants.iter().enumerate() {
        if matches!(variant, AvroSchema::Union(_)) {
            return Err(SchemaError::InvalidSchema(format!(
                "Union contains nested union at position {}",
                i
            )));
        }
        let key = variant.type_key();
        if !seen.insert(key.clone()) {
            return Err(SchemaError::DuplicateUnionBranch(format!(
                "'{}' at position {}",
                key, i
            )));
        }
    }
    Ok(())
}
