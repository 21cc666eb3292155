//! Example: Read three yearly files as one series and slice the result in memory
//!
//! Run with: cargo run --example series_walkthrough

use ncseries::{
    types::decode_elements, Attribute, DataType, Dimension, MemoryEngine, MemoryFile,
    SeriesHandle, SeriesOptions, VariableSchema,
};
use std::sync::Arc;

/// One file of daily surface temperature on a 3 x 4 grid
fn year_file(first_day: usize, days: usize) -> Result<MemoryFile, Box<dyn std::error::Error>> {
    let mut tas = Vec::new();
    for day in first_day..first_day + days {
        for lat in 0..3 {
            for lon in 0..4 {
                let value = 270.0 + day as f32 * 0.1 + lat as f32 - lon as f32 * 0.5;
                tas.extend_from_slice(&value.to_ne_bytes());
            }
        }
    }
    let time: Vec<u8> = (first_day..first_day + days)
        .flat_map(|d| (d as f64).to_ne_bytes())
        .collect();

    let file = MemoryFile::new()
        .with_dimension(Dimension::growable("time", days))
        .with_dimension(Dimension::new("lat", 3))
        .with_dimension(Dimension::new("lon", 4))
        .with_global_attribute(Attribute::text("title", "walkthrough run"))
        .with_variable(
            VariableSchema::new("time", DataType::Double, &["time"])
                .with_attribute(Attribute::text("units", "days since 2000-01-01")),
            time,
        )?
        .with_variable(
            VariableSchema::new("tas", DataType::Float, &["time", "lat", "lon"])
                .with_attribute(Attribute::text("units", "K")),
            tas,
        )?;
    Ok(file)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("ncseries example: yearly files as one series");
    println!("============================================\n");

    let engine = Arc::new(MemoryEngine::new());
    engine.insert("/runs/2000.nc", year_file(0, 4)?)?;
    engine.insert("/runs/2001.nc", year_file(4, 2)?)?;
    engine.insert("/runs/2002.nc", year_file(6, 5)?)?;

    let series = SeriesHandle::open(
        engine.clone(),
        ["/runs/2000.nc", "/runs/2001.nc", "/runs/2002.nc"],
        SeriesOptions::default(),
    )
    .await?;
    println!("{}", series.summary());

    let time = series
        .growable_dimension()
        .ok_or("series has no growable dimension")?;
    println!("  per-file records: {:?}", time.local_lengths());
    println!("  boundaries:       {:?}", time.boundaries());
    for fragment in time.fragments_for_start(3, 5)? {
        println!(
            "  records {:?} come from file {} at local offset {}",
            fragment.global_range(),
            fragment.file_index,
            fragment.local_start
        );
    }
    println!();

    let tas = series.variable("tas").ok_or("tas is missing")?;
    println!("{}", tas.type_with_dim_description());
    let slab = tas.read_slab(&[3, 0, 0], &[5, 3, 4]).await?;
    println!("  {}", slab.summary());

    // Middle latitude row for every day read, without touching the files again
    let row = slab.sub_slab(&[0, 1, 0], &[5, 1, 4])?;
    let row: Vec<f32> = decode_elements(DataType::Float, &row)?;
    for (day, values) in row.chunks(4).enumerate() {
        println!("  day {}: {:?}", day + 3, values);
    }
    println!();

    // Grow the middle file and rebuild
    engine.insert("/runs/2001.nc", year_file(4, 3)?)?;
    series.rebuild().await?;
    println!("After rebuild: {}", series.summary());

    let days = series.variable("time").ok_or("time is missing")?;
    println!("  last day: {}", days.string_value(&[days.shape()[0] - 1]).await?);

    Ok(())
}
