//! Save the availability table to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, BooleanBuilder, Date32Builder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};

use crate::availability::AvailabilityTable;

/// Writes one row per date: a `date` column followed by one boolean column
/// per tile, named by the tile code.
pub fn save_availability(table: &AvailabilityTable, file_path: &Path) -> Result<()> {
    let mut fields = vec![Field::new("date", DataType::Date32, false)];
    fields.extend(
        table
            .tiles()
            .iter()
            .map(|tile| Field::new(tile.as_str(), DataType::Boolean, false)),
    );
    let schema = Arc::new(Schema::new(fields));

    let epoch_offset = NaiveDate::from_ymd_opt(1970, 1, 1)
        .map(|d| d.num_days_from_ce())
        .unwrap_or(719_163);

    let mut date_builder = Date32Builder::with_capacity(table.len());
    let mut tile_builders: Vec<BooleanBuilder> = table
        .tiles()
        .iter()
        .map(|_| BooleanBuilder::with_capacity(table.len()))
        .collect();

    for (date, available) in table.rows() {
        date_builder.append_value(date.num_days_from_ce() - epoch_offset);
        for (builder, flag) in tile_builders.iter_mut().zip(available) {
            builder.append_value(*flag);
        }
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(date_builder.finish())];
    columns.extend(
        tile_builders
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef),
    );
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let file = File::create(file_path)
        .with_context(|| format!("cannot create {}", file_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use arrow::array::{Array, BooleanArray, Date32Array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use super::*;
    use crate::tile::TileCode;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, d).unwrap()
    }

    #[test]
    fn should_write_one_column_per_tile() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("availability.parquet");
        let a: TileCode = "080e030n".parse().unwrap();
        let b: TileCode = "090e030n".parse().unwrap();
        let table = AvailabilityTable::from_tile_dates(vec![
            (a, vec![day(1), day(3)]),
            (b, vec![day(2)]),
        ]);

        save_availability(&table, &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];

        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["date", "080e030n", "090e030n"]);
        assert_eq!(batch.num_rows(), 3);

        let dates = batch
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value_as_date(0), Some(day(1)));
        assert_eq!(dates.value_as_date(2), Some(day(3)));

        let first = batch
            .column(1)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        let second = batch
            .column(2)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(
            (0..3).map(|i| first.value(i)).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(
            (0..3).map(|i| second.value(i)).collect::<Vec<_>>(),
            vec![false, true, false]
        );
    }

    #[test]
    fn should_write_empty_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/availability.parquet");
        let tile: TileCode = "080e030n".parse().unwrap();
        let table = AvailabilityTable::from_tile_dates(vec![(tile, Vec::new())]);

        save_availability(&table, &path).unwrap();

        assert!(path.exists());
    }
}
