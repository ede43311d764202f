//! Table and row view over record files
//!
//! A [`Table`] reads a container file whose schema is a record and yields
//! [`Row`]s that share one [`Columns`] index, so lookups by name cost one
//! hash probe per table instead of a field scan per record.
//!
//! The writing side is the [`RowSource`] trait: anything that can list its
//! column names and iterate rows can be written as a container file.

use std::collections::HashMap;
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{ReadError, ReaderError, SchemaError, WriterError};
use crate::reader::{AvroHeader, ReaderConfig, RecordReader};
use crate::schema::{AvroSchema, RecordSchema};
use crate::value::AvroValue;

/// Column names (and optionally schemas) shared by the rows of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    names: Vec<String>,
    schemas: Option<Vec<AvroSchema>>,
    index: HashMap<String, usize>,
}

impl Columns {
    /// Columns with names only.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            names,
            schemas: None,
            index,
        }
    }

    /// Columns taken from the fields of a record schema.
    pub fn from_record(record: &RecordSchema) -> Self {
        let mut columns = Self::new(record.fields.iter().map(|f| f.name.clone()));
        columns.schemas = Some(record.fields.iter().map(|f| f.schema.clone()).collect());
        columns
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn schemas(&self) -> Option<&[AvroSchema]> {
        self.schemas.as_deref()
    }

    /// Position of the column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One record of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<AvroValue>,
}

impl Row {
    /// Build a row; `values` must line up with `columns`.
    pub fn new(columns: Arc<Columns>, values: Vec<AvroValue>) -> Result<Self, SchemaError> {
        if values.len() != columns.len() {
            return Err(SchemaError::InvalidSchema(format!(
                "Row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Value at column position `i`.
    pub fn get(&self, i: usize) -> Option<&AvroValue> {
        self.values.get(i)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&AvroValue> {
        self.columns.position(name).and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    pub fn values(&self) -> &[AvroValue] {
        &self.values
    }

    /// `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AvroValue)> {
        self.columns
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<AvroValue> {
        self.values
    }

    /// The row as a record value.
    pub fn to_record(&self) -> AvroValue {
        AvroValue::Record(
            self.iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }
}

impl std::ops::Index<usize> for Row {
    type Output = AvroValue;

    fn index(&self, i: usize) -> &AvroValue {
        &self.values[i]
    }
}

impl std::ops::Index<&str> for Row {
    type Output = AvroValue;

    /// Panics if the column does not exist; see [`Row::get_by_name`].
    fn index(&self, name: &str) -> &AvroValue {
        match self.get_by_name(name) {
            Some(value) => value,
            None => panic!("no column named '{}'", name),
        }
    }
}

/// Rows read from a container file whose schema is a record.
///
/// # Example
/// ```no_run
/// use tarmac::api::read_table_file;
///
/// let table = read_table_file("users.avro")?;
/// for row in table {
///     let row = row?;
///     println!("{:?}", row.get_by_name("name"));
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Table<R> {
    records: RecordReader<R>,
    columns: Arc<Columns>,
}

impl<R: Read> Table<R> {
    /// Open a table in strict mode.
    pub fn new(reader: R) -> Result<Self, ReaderError> {
        Self::with_config(reader, ReaderConfig::default())
    }

    pub fn with_config(reader: R, config: ReaderConfig) -> Result<Self, ReaderError> {
        Self::from_records(RecordReader::with_config(reader, config)?)
    }

    /// Wrap a record reader. Fails unless the file schema is a record.
    pub fn from_records(records: RecordReader<R>) -> Result<Self, ReaderError> {
        let record = records.schema().as_record().ok_or_else(|| {
            SchemaError::InvalidSchema(format!(
                "Table view needs a record schema, found {}",
                records.schema().type_key()
            ))
        })?;
        let columns = Arc::new(Columns::from_record(record));
        Ok(Self { records, columns })
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    pub fn schema(&self) -> &AvroSchema {
        self.records.schema()
    }

    pub fn header(&self) -> &AvroHeader {
        self.records.header()
    }

    /// Errors skipped so far (skip mode only).
    pub fn errors(&self) -> &[ReadError] {
        self.records.errors()
    }

    fn to_row(&self, value: AvroValue) -> Result<Row, ReaderError> {
        match value {
            AvroValue::Record(fields) => Ok(Row {
                columns: Arc::clone(&self.columns),
                values: fields.into_iter().map(|(_, v)| v).collect(),
            }),
            other => Err(ReaderError::Schema(SchemaError::InvalidSchema(format!(
                "Expected a record, decoded {}",
                other.kind()
            )))),
        }
    }
}

impl<R: Read> Iterator for Table<R> {
    type Item = Result<Row, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|value| self.to_row(value)))
    }
}

/// Something that can be written as a table.
pub trait RowSource {
    /// Column names in order.
    fn column_names(&self) -> Vec<String>;

    /// Per-column schemas, when the source knows them.
    fn column_schemas(&self) -> Option<Vec<AvroSchema>> {
        None
    }

    /// Complete record schema, when the source knows it.
    fn schema(&self) -> Option<AvroSchema> {
        None
    }

    /// Rows, each lining up with `column_names`.
    fn rows(&self) -> Box<dyn Iterator<Item = &[AvroValue]> + '_>;

    /// Row ranges written as one block each.
    fn partitions(&self) -> Option<Vec<Range<usize>>> {
        None
    }
}

/// An in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    schemas: Option<Vec<AvroSchema>>,
    rows: Vec<Vec<AvroValue>>,
    partitions: Option<Vec<Range<usize>>>,
}

impl MemoryTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Declare one schema per column.
    pub fn with_schemas(mut self, schemas: Vec<AvroSchema>) -> Result<Self, WriterError> {
        if schemas.len() != self.columns.len() {
            return Err(WriterError::Configuration(format!(
                "{} column schemas for {} columns",
                schemas.len(),
                self.columns.len()
            )));
        }
        self.schemas = Some(schemas);
        Ok(self)
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<AvroValue>) -> Result<(), WriterError> {
        if row.len() != self.columns.len() {
            return Err(WriterError::Configuration(format!(
                "Row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append rows as one partition.
    pub fn push_partition<I>(&mut self, rows: I) -> Result<(), WriterError>
    where
        I: IntoIterator<Item = Vec<AvroValue>>,
    {
        let start = self.rows.len();
        for row in rows {
            if let Err(e) = self.push_row(row) {
                self.rows.truncate(start);
                return Err(e);
            }
        }
        let end = self.rows.len();
        self.partitions.get_or_insert_with(Vec::new).push(start..end);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowSource for MemoryTable {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn column_schemas(&self) -> Option<Vec<AvroSchema>> {
        self.schemas.clone()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &[AvroValue]> + '_> {
        Box::new(self.rows.iter().map(Vec::as_slice))
    }

    fn partitions(&self) -> Option<Vec<Range<usize>>> {
        self.partitions.clone()
    }
}

/// Rows read from a table can be written back.
impl RowSource for Vec<Row> {
    fn column_names(&self) -> Vec<String> {
        self.first()
            .map(|row| row.columns.names.clone())
            .unwrap_or_default()
    }

    fn column_schemas(&self) -> Option<Vec<AvroSchema>> {
        self.first()?.columns.schemas.clone()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &[AvroValue]> + '_> {
        Box::new(self.iter().map(Row::values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_schema, FieldSchema};
    use crate::writer::{AvroWriter, WriterConfig};

    fn people_file() -> Vec<u8> {
        let schema = parse_schema(
            r#"{"type":"record","name":"Person","fields":[
                {"name":"name","type":"string"},
                {"name":"age","type":"int"}]}"#,
        )
        .unwrap();
        let mut writer = AvroWriter::new(Vec::new(), schema, WriterConfig::new()).unwrap();
        for (name, age) in [("ann", 31), ("bob", 42)] {
            writer
                .append(&AvroValue::record([
                    ("name", AvroValue::from(name)),
                    ("age", AvroValue::Int(age)),
                ]))
                .unwrap();
        }
        writer.close().unwrap()
    }

    #[test]
    fn test_rows_by_position_and_name() {
        let bytes = people_file();
        let table = Table::new(&bytes[..]).unwrap();
        assert_eq!(table.columns().names(), &["name", "age"]);

        let rows: Vec<Row> = table.collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(0), Some(&AvroValue::from("ann")));
        assert_eq!(rows[1].get_by_name("age"), Some(&AvroValue::Int(42)));
        assert_eq!(rows[1].get_by_name("missing"), None);
        assert_eq!(rows[0][1], AvroValue::Int(31));
        assert_eq!(rows[0].len(), 2);
        assert!(Arc::ptr_eq(rows[0].columns(), rows[1].columns()));

        let pairs: Vec<_> = rows[0].iter().map(|(n, _)| n).collect();
        assert_eq!(pairs, vec!["name", "age"]);
        assert_eq!(
            rows[0].to_record(),
            AvroValue::record([("name", AvroValue::from("ann")), ("age", AvroValue::Int(31))])
        );
        assert_eq!(
            rows[1].clone().into_values(),
            vec![AvroValue::from("bob"), AvroValue::Int(42)]
        );
    }

    #[test]
    fn test_non_record_schema_rejected() {
        let mut writer = AvroWriter::new(Vec::new(), AvroSchema::Long, WriterConfig::new()).unwrap();
        writer.append(&AvroValue::Long(1)).unwrap();
        let bytes = writer.close().unwrap();
        assert!(matches!(
            Table::new(&bytes[..]),
            Err(ReaderError::Schema(_))
        ));
    }

    #[test]
    fn test_vec_of_rows_is_a_row_source() {
        let bytes = people_file();
        let rows: Vec<Row> = Table::new(&bytes[..])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.column_names(), vec!["name", "age"]);
        assert_eq!(
            rows.column_schemas(),
            Some(vec![AvroSchema::String, AvroSchema::Int])
        );
        assert_eq!(RowSource::rows(&rows).count(), 2);
        assert!(rows.partitions().is_none());
        assert!(Vec::<Row>::new().column_names().is_empty());
    }

    #[test]
    fn test_memory_table_partitions() {
        let mut table = MemoryTable::new(["x"]);
        table.push_partition(vec![vec![AvroValue::Int(1)], vec![AvroValue::Int(2)]]).unwrap();
        table.push_partition(vec![vec![AvroValue::Int(3)]]).unwrap();
        assert_eq!(table.partitions(), Some(vec![0..2, 2..3]));
        assert_eq!(table.len(), 3);

        let err = table.push_partition(vec![vec![AvroValue::Int(4)], vec![]]);
        assert!(matches!(err, Err(WriterError::Configuration(_))));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_row_new_checks_width() {
        let record = RecordSchema::new("R", vec![FieldSchema::new("a", AvroSchema::Int)]);
        let columns = Arc::new(Columns::from_record(&record));
        assert!(Row::new(Arc::clone(&columns), vec![]).is_err());
        let row = Row::new(columns, vec![AvroValue::Int(1)]).unwrap();
        assert_eq!(row.get_by_name("a"), Some(&AvroValue::Int(1)));
    }
}
