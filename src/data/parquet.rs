// Parquet data source and Arrow schema sniffing
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::path::Path;

use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{DataError, Role, Roles};

/// Parquet data source
///
/// Unlike the CSV and JSON sources the data stays columnar: the batches are
/// streamed to the engine as they are.
pub struct ParquetSource {
    path: String,
}

impl ParquetSource {
    /// Create a new Parquet data source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ParquetSource {
            path: path.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.path
    }

    /// Read the schema and all record batches
    pub fn read_batches(&self) -> Result<(Schema, Vec<RecordBatch>), DataError> {
        let file = File::open(&self.path)?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| DataError::Parse(format!("'{}': {}", self.path, e)))?;

        let schema = builder.schema().as_ref().clone();

        let reader = builder
            .build()
            .map_err(|e| DataError::Parse(format!("'{}': {}", self.path, e)))?;

        let batches = reader.collect::<Result<Vec<_>, _>>()?;

        Ok((schema, batches))
    }
}

/// Whether the engine stores a column of this type as floats
fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_numeric()
        || matches!(
            data_type,
            DataType::Boolean | DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
        )
}

/// Unused roles for every field: numbers and time stamps are floats, everything else strings
pub fn sniff_schema(schema: &Schema) -> Roles {
    let mut roles = Roles::new();

    for field in schema.fields() {
        let role = if is_numeric(field.data_type()) {
            Role::UnusedFloat
        } else {
            Role::UnusedString
        };
        roles = roles.with_column(field.name(), role);
    }

    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{Field, TimeUnit};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sniff_schema() {
        let schema = Schema::new(vec![
            Field::new("amount", DataType::Int64, true),
            Field::new("date", DataType::Timestamp(TimeUnit::Nanosecond, None), true),
            Field::new("id", DataType::Utf8, true),
        ]);

        let roles = sniff_schema(&schema);

        assert_eq!(roles.unused_float, vec!["amount", "date"]);
        assert_eq!(roles.unused_string, vec!["id"]);
    }

    #[test]
    fn test_read_batches() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("amount", DataType::Float64, false),
            Field::new("id", DataType::Utf8, false),
        ]));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let (read_schema, batches) = ParquetSource::new(file.path()).read_batches().unwrap();

        assert_eq!(read_schema.fields().len(), 2);
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 2);
    }
}
