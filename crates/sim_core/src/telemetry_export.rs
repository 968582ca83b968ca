use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::entity::WashProgram;
use crate::error::StoreError;
use crate::report::SimulationReport;
use crate::telemetry::{SimSnapshots, SimTelemetry};

pub fn write_departed_customers_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), StoreError> {
    let records = &telemetry.departed;
    let mut id = Vec::with_capacity(records.len());
    let mut arrival_time = Vec::with_capacity(records.len());
    let mut departure_time = Vec::with_capacity(records.len());
    let mut needs_mechanic = Vec::with_capacity(records.len());
    let mut wash_program = Vec::with_capacity(records.len());
    let mut reception_wait = Vec::with_capacity(records.len());
    let mut reception_service = Vec::with_capacity(records.len());
    let mut mechanic_wait = Vec::with_capacity(records.len());
    let mut mechanic_service = Vec::with_capacity(records.len());
    let mut wash_wait = Vec::with_capacity(records.len());
    let mut wash_service = Vec::with_capacity(records.len());

    for record in records {
        id.push(record.id);
        arrival_time.push(record.arrival_time);
        departure_time.push(record.departure_time);
        needs_mechanic.push(record.needs_mechanic);
        wash_program.push(record.wash_program.map(wash_program_code));
        reception_wait.push(record.reception_wait);
        reception_service.push(record.reception_service);
        mechanic_wait.push(record.mechanic_wait);
        mechanic_service.push(record.mechanic_service);
        wash_wait.push(record.wash_wait);
        wash_service.push(record.wash_service);
    }

    let schema = Schema::new(vec![
        Field::new("id", DataType::UInt64, false),
        Field::new("arrival_time", DataType::Float64, false),
        Field::new("departure_time", DataType::Float64, false),
        Field::new("needs_mechanic", DataType::Boolean, false),
        Field::new("wash_program", DataType::UInt8, true),
        Field::new("reception_wait", DataType::Float64, true),
        Field::new("reception_service", DataType::Float64, true),
        Field::new("mechanic_wait", DataType::Float64, true),
        Field::new("mechanic_service", DataType::Float64, true),
        Field::new("wash_wait", DataType::Float64, true),
        Field::new("wash_service", DataType::Float64, true),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(id)),
        Arc::new(Float64Array::from(arrival_time)),
        Arc::new(Float64Array::from(departure_time)),
        Arc::new(BooleanArray::from(needs_mechanic)),
        Arc::new(UInt8Array::from(wash_program)),
        Arc::new(Float64Array::from(reception_wait)),
        Arc::new(Float64Array::from(reception_service)),
        Arc::new(Float64Array::from(mechanic_wait)),
        Arc::new(Float64Array::from(mechanic_service)),
        Arc::new(Float64Array::from(wash_wait)),
        Arc::new(Float64Array::from(wash_service)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_snapshot_counts_parquet<P: AsRef<Path>>(
    path: P,
    snapshots: &SimSnapshots,
) -> Result<(), StoreError> {
    let mut timestamp = Vec::with_capacity(snapshots.snapshots.len());
    let mut created = Vec::with_capacity(snapshots.snapshots.len());
    let mut departed = Vec::with_capacity(snapshots.snapshots.len());
    let mut in_system = Vec::with_capacity(snapshots.snapshots.len());

    for snapshot in &snapshots.snapshots {
        timestamp.push(snapshot.timestamp);
        created.push(snapshot.counts.created);
        departed.push(snapshot.counts.departed);
        in_system.push(snapshot.counts.in_system);
    }

    let schema = Schema::new(vec![
        Field::new("timestamp", DataType::Float64, false),
        Field::new("created", DataType::UInt64, false),
        Field::new("departed", DataType::UInt64, false),
        Field::new("in_system", DataType::UInt64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(timestamp)),
        Arc::new(UInt64Array::from(created)),
        Arc::new(UInt64Array::from(departed)),
        Arc::new(UInt64Array::from(in_system)),
    ];

    write_record_batch(path, schema, arrays)
}

/// One row per server per snapshot.
pub fn write_queue_snapshots_parquet<P: AsRef<Path>>(
    path: P,
    snapshots: &SimSnapshots,
) -> Result<(), StoreError> {
    let mut timestamp = Vec::new();
    let mut point = Vec::new();
    let mut server_id = Vec::new();
    let mut queue_length = Vec::new();
    let mut busy = Vec::new();

    for snapshot in &snapshots.snapshots {
        for sp in &snapshot.points {
            for (index, (len, is_busy)) in sp
                .per_server_queue_lengths
                .iter()
                .zip(&sp.per_server_busy)
                .enumerate()
            {
                timestamp.push(snapshot.timestamp);
                point.push(sp.label.clone());
                server_id.push(index as u64);
                queue_length.push(*len as u64);
                busy.push(*is_busy);
            }
        }
    }

    let schema = Schema::new(vec![
        Field::new("timestamp", DataType::Float64, false),
        Field::new("point", DataType::Utf8, false),
        Field::new("server_id", DataType::UInt64, false),
        Field::new("queue_length", DataType::UInt64, false),
        Field::new("busy", DataType::Boolean, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(timestamp)),
        Arc::new(StringArray::from(point)),
        Arc::new(UInt64Array::from(server_id)),
        Arc::new(UInt64Array::from(queue_length)),
        Arc::new(BooleanArray::from(busy)),
    ];

    write_record_batch(path, schema, arrays)
}

/// Per-server figures of a finished run, one row per server.
pub fn write_report_parquet<P: AsRef<Path>>(
    path: P,
    report: &SimulationReport,
) -> Result<(), StoreError> {
    let mut point = Vec::new();
    let mut server_id = Vec::new();
    let mut served = Vec::new();
    let mut busy_time = Vec::new();
    let mut utilization = Vec::new();
    let mut avg_wait = Vec::new();
    let mut avg_service = Vec::new();
    let mut avg_total = Vec::new();

    for sp in &report.service_points {
        for server in &sp.per_server {
            point.push(sp.label.clone());
            server_id.push(server.server_id as u64);
            served.push(server.served);
            busy_time.push(server.busy_time);
            utilization.push(server.utilization);
            avg_wait.push(server.avg_wait);
            avg_service.push(server.avg_service);
            avg_total.push(server.avg_total);
        }
    }

    let schema = Schema::new(vec![
        Field::new("point", DataType::Utf8, false),
        Field::new("server_id", DataType::UInt64, false),
        Field::new("served", DataType::UInt64, false),
        Field::new("busy_time", DataType::Float64, false),
        Field::new("utilization", DataType::Float64, false),
        Field::new("avg_wait", DataType::Float64, false),
        Field::new("avg_service", DataType::Float64, false),
        Field::new("avg_total", DataType::Float64, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(point)),
        Arc::new(UInt64Array::from(server_id)),
        Arc::new(UInt64Array::from(served)),
        Arc::new(Float64Array::from(busy_time)),
        Arc::new(Float64Array::from(utilization)),
        Arc::new(Float64Array::from(avg_wait)),
        Arc::new(Float64Array::from(avg_service)),
        Arc::new(Float64Array::from(avg_total)),
    ];

    write_record_batch(path, schema, arrays)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), StoreError> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn wash_program_code(program: WashProgram) -> u8 {
    match program {
        WashProgram::Exterior => 0,
        WashProgram::Interior => 1,
        WashProgram::Both => 2,
    }
}
