//! Named type registry.
//!
//! Every named definition in a schema tree is stored once behind an `Arc`.
//! The binary codec follows [`AvroSchema::Named`] references through this
//! registry, so recursive schemas are walked lazily and never copied.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::AvroSchema;

/// A registry of named type definitions keyed by full name.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    named_types: HashMap<String, Arc<AvroSchema>>,
}

impl SchemaResolutionContext {
    /// Create a new empty resolution context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named type in the context.
    pub fn register(&mut self, name: impl Into<String>, schema: AvroSchema) {
        self.named_types.insert(name.into(), Arc::new(schema));
    }

    /// Get a named type definition.
    pub fn get(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name).map(Arc::as_ref)
    }

    /// Get a shared handle to a named type definition.
    pub fn get_shared(&self, name: &str) -> Option<Arc<AvroSchema>> {
        self.named_types.get(name).cloned()
    }

    /// Check if a named type exists in the context.
    pub fn contains(&self, name: &str) -> bool {
        self.named_types.contains_key(name)
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.named_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named_types.is_empty()
    }

    /// Follow `Named` references to a concrete node.
    ///
    /// Returns `None` when a reference has no definition.
    pub fn resolve<'a>(&'a self, schema: &'a AvroSchema) -> Option<&'a AvroSchema> {
        let mut current = schema;
        // A chain longer than the registry means a reference cycle
        for _ in 0..=self.named_types.len() {
            match current {
                AvroSchema::Named(name) => current = self.get(name)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Collect every named definition in `schema`.
    pub fn build_from_schema(schema: &AvroSchema) -> Self {
        let mut context = Self::new();
        context.collect(schema);
        context
    }

    /// Like [`build_from_schema`](Self::build_from_schema), and also check
    /// that every reference in the tree has a definition.
    pub fn build_checked(schema: &AvroSchema) -> Result<Self, SchemaError> {
        let context = Self::build_from_schema(schema);
        context.check_references(schema)?;
        Ok(context)
    }

    fn collect(&mut self, schema: &AvroSchema) {
        match schema {
            AvroSchema::Record(record) => {
                self.named_types
                    .entry(record.fullname())
                    .or_insert_with(|| Arc::new(schema.clone()));
                for field in &record.fields {
                    self.collect(&field.schema);
                }
            }
            AvroSchema::Enum(e) => {
                self.named_types
                    .entry(e.fullname())
                    .or_insert_with(|| Arc::new(schema.clone()));
            }
            AvroSchema::Fixed(f) => {
                self.named_types
                    .entry(f.fullname())
                    .or_insert_with(|| Arc::new(schema.clone()));
            }
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => self.collect(inner),
            AvroSchema::Union(variants) => variants.iter().for_each(|v| self.collect(v)),
            AvroSchema::Logical(logical) => self.collect(&logical.base),
            _ => {}
        }
    }

    fn check_references(&self, schema: &AvroSchema) -> Result<(), SchemaError> {
        match schema {
            AvroSchema::Named(name) if !self.contains(name) => {
                Err(SchemaError::UnresolvedName(name.clone()))
            }
            AvroSchema::Record(record) => record
                .fields
                .iter()
                .try_for_each(|f| self.check_references(&f.schema)),
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => self.check_references(inner),
            AvroSchema::Union(variants) => {
                variants.iter().try_for_each(|v| self.check_references(v))
            }
            AvroSchema::Logical(logical) => self.check_references(&logical.base),
            _ => Ok(()),
        }
    }
}
