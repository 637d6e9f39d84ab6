//! Parquet persistence for `(text, vector)` rows.
//!
//! Writes go to a temporary file in the destination directory which is
//! renamed over the target only after the Parquet footer is flushed, so a
//! failed write never leaves a partial output file.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use logvec_core::error::{Error, Result};
use logvec_core::types::VectorRow;

use crate::schema::{build_arrow_schema, TEXT_COLUMN, VECTOR_COLUMN};

pub fn rows_to_record_batch(rows: &[VectorRow], dim: usize) -> std::result::Result<RecordBatch, arrow_schema::ArrowError> {
    let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
    let vectors = rows.iter().map(|r| Some(r.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    RecordBatch::try_new(
        build_arrow_schema(dim),
        vec![
            Arc::new(StringArray::from(texts)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
        ],
    )
}

/// Write all rows to `path` in one atomic replace.
pub fn write_parquet(path: &Path, rows: &[VectorRow], dim: usize) -> Result<()> {
    let out_err = |message: String| Error::OutputWrite { path: path.to_path_buf(), message };

    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.vector.len() != dim) {
        return Err(out_err(format!("row {i} has a vector of length {} but the table dimension is {dim}", row.vector.len())));
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| out_err(e.to_string()))?;

    let batch = rows_to_record_batch(rows, dim).map_err(|e| out_err(e.to_string()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".vectors")
        .suffix(".parquet.tmp")
        .tempfile_in(dir)
        .map_err(|e| out_err(e.to_string()))?;
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), Some(props)).map_err(|e| out_err(e.to_string()))?;
    if batch.num_rows() > 0 {
        writer.write(&batch).map_err(|e| out_err(e.to_string()))?;
    }
    writer.close().map_err(|e| out_err(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| out_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| out_err(e.error.to_string()))?;

    info!(path = %path.display(), rows = rows.len(), dim, "wrote vectors");
    Ok(())
}

/// Read back the rows of a file produced by [`write_parquet`].
pub fn read_vectors(path: &Path) -> Result<Vec<VectorRow>> {
    let bad = |message: String| Error::MalformedInput { path: path.to_path_buf(), row: 0, message };
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::InputNotFound { path: path.to_path_buf() },
        _ => Error::Io(e),
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|b| b.build())
        .map_err(|e| bad(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| bad(e.to_string()))?;
        let texts = batch
            .column_by_name(TEXT_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Schema { path: path.to_path_buf(), column: TEXT_COLUMN.to_string() })?;
        let vectors = batch
            .column_by_name(VECTOR_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| Error::Schema { path: path.to_path_buf(), column: VECTOR_COLUMN.to_string() })?;
        for i in 0..batch.num_rows() {
            let list = vectors.value(i);
            let values = list
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| bad(format!("row {}: vector items are not f32", rows.len())))?;
            rows.push(VectorRow { text: texts.value(i).to_string(), vector: values.values().to_vec() });
        }
    }
    Ok(rows)
}
