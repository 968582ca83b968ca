use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::metrics::SimulationResult;

pub(crate) fn export_to_parquet_impl(
    results: &[SimulationResult],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let batch = build_record_batch(results)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn build_record_batch(
    results: &[SimulationResult],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(parquet_schema());
    RecordBatch::try_new(schema, build_arrays(results))
}

const U64_COLUMNS: [&str; 8] = [
    "run_id",
    "seed",
    "reception_servers",
    "mechanic_servers",
    "wash_servers",
    "customers_created",
    "customers_departed",
    "customers_in_system",
];

const F64_COLUMNS: [&str; 14] = [
    "arrival_mean",
    "duration",
    "end_time",
    "throughput_ratio",
    "avg_time_in_system",
    "median_time_in_system",
    "p90_time_in_system",
    "avg_reception_wait",
    "avg_mechanic_wait",
    "avg_wash_wait",
    "reception_utilization",
    "mechanic_utilization",
    "wash_utilization",
    "degenerate_samples",
];

fn parquet_schema() -> Schema {
    let mut fields = vec![Field::new("experiment_id", DataType::Utf8, false)];
    fields.extend(
        U64_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::UInt64, false)),
    );
    fields.extend(
        F64_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false)),
    );
    Schema::new(fields)
}

fn u64_values(r: &SimulationResult) -> [u64; 8] {
    [
        r.run_id as u64,
        r.seed,
        r.reception_servers as u64,
        r.mechanic_servers as u64,
        r.wash_servers as u64,
        r.customers_created,
        r.customers_departed,
        r.customers_in_system,
    ]
}

fn f64_values(r: &SimulationResult) -> [f64; 14] {
    [
        r.arrival_mean,
        r.duration,
        r.end_time,
        r.throughput_ratio,
        r.avg_time_in_system,
        r.median_time_in_system,
        r.p90_time_in_system,
        r.avg_reception_wait,
        r.avg_mechanic_wait,
        r.avg_wash_wait,
        r.reception_utilization,
        r.mechanic_utilization,
        r.wash_utilization,
        r.degenerate_samples as f64,
    ]
}

fn build_arrays(results: &[SimulationResult]) -> Vec<ArrayRef> {
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        results
            .iter()
            .map(|r| r.experiment_id.as_str())
            .collect::<Vec<_>>(),
    ))];
    let u64_rows: Vec<_> = results.iter().map(u64_values).collect();
    let f64_rows: Vec<_> = results.iter().map(f64_values).collect();
    for col in 0..U64_COLUMNS.len() {
        arrays.push(Arc::new(UInt64Array::from(
            u64_rows.iter().map(|row| row[col]).collect::<Vec<_>>(),
        )));
    }
    for col in 0..F64_COLUMNS.len() {
        arrays.push(Arc::new(Float64Array::from(
            f64_rows.iter().map(|row| row[col]).collect::<Vec<_>>(),
        )));
    }
    arrays
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sample_result;

    #[test]
    fn schema_matches_arrays() {
        let results = vec![sample_result(0, 50.0), sample_result(1, 70.0)];
        let batch = build_record_batch(&results).unwrap();
        assert_eq!(batch.num_columns(), 1 + U64_COLUMNS.len() + F64_COLUMNS.len());
        assert_eq!(batch.num_rows(), 2);
    }
}
