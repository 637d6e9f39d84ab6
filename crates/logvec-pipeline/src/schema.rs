use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const TEXT_COLUMN: &str = "text";
pub const VECTOR_COLUMN: &str = "vector";

/// `text: Utf8`, `vector: FixedSizeList<Float32, dim>`.
pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(TEXT_COLUMN, DataType::Utf8, false),
        Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), false),
    ]))
}
