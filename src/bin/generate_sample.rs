//! Writes a synthetic accident table to `sample_data/` as CSV and Parquet.
//!
//! Usage: `generate_sample [ROWS]` (default 20 000 rows, fixed seed).

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use parquet::arrow::ArrowWriter;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use accident_lens::data::model::{Accident, Column, DayNight, TIMESTAMP_FORMAT};

const DEFAULT_ROWS: usize = 20_000;
const SEED: u64 = 42;
const OUTPUT_DIR: &str = "sample_data";

/// Columns written to disk; calendar fields are derived again on load.
const SOURCE_COLUMNS: [Column; 12] = [
    Column::Id,
    Column::Severity,
    Column::StartTime,
    Column::EndTime,
    Column::StartLat,
    Column::StartLng,
    Column::State,
    Column::WeatherCondition,
    Column::Visibility,
    Column::Temperature,
    Column::WindSpeed,
    Column::SunriseSunset,
];

/// (state, city centre lat, lng, mean annual temperature °F, relative weight)
const HUBS: [(&str, f64, f64, f64, f64); 8] = [
    ("CA", 34.05, -118.24, 66.0, 0.28),
    ("CA", 37.77, -122.42, 60.0, 0.08),
    ("TX", 29.76, -95.37, 70.0, 0.16),
    ("FL", 25.76, -80.19, 77.0, 0.14),
    ("NY", 40.71, -74.01, 55.0, 0.10),
    ("OH", 39.96, -83.00, 52.0, 0.08),
    ("WA", 47.61, -122.33, 52.0, 0.08),
    ("MN", 44.98, -93.27, 46.0, 0.08),
];

const WEATHER: [&str; 8] = [
    "Clear",
    "Fair",
    "Cloudy",
    "Mostly Cloudy",
    "Overcast",
    "Light Rain",
    "Rain",
    "Snow",
];

/// Standard normal sample (Box-Muller).
fn gauss(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `value` or `None` with probability `p_missing`.
fn maybe<T>(rng: &mut StdRng, p_missing: f64, value: T) -> Option<T> {
    (rng.gen::<f64>() >= p_missing).then_some(value)
}

fn generate(n: usize, rng: &mut StdRng) -> Result<Vec<Accident>> {
    let hub_weights = WeightedIndex::new(HUBS.iter().map(|h| h.4))?;
    let severity_weights = WeightedIndex::new([0.05, 0.70, 0.18, 0.07])?;
    let first_day = NaiveDate::from_ymd_opt(2016, 2, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start date")?;
    let span_minutes = 7 * 365 * 24 * 60;

    let mut accidents = Vec::with_capacity(n);
    for i in 0..n {
        let (state, lat, lng, mean_temp, _) = HUBS[hub_weights.sample(rng)];

        // Most accidents sit close to a city centre, the rest spread statewide.
        let spread = if rng.gen_bool(0.8) { 0.04 } else { 1.5 };
        let start: NaiveDateTime = first_day + Duration::minutes(rng.gen_range(0..span_minutes));
        let end = start + Duration::minutes(rng.gen_range(15..360));
        let hour = start.hour();
        let weather = *WEATHER.choose(rng).context("empty weather list")?;
        let wet = weather.contains("Rain") || weather == "Snow";
        let visibility = if wet {
            rng.gen_range(0.5..7.0)
        } else {
            rng.gen_range(7.0..10.0)
        };

        let temperature = mean_temp + 15.0 * gauss(rng);
        let wind_speed = (8.0 + 5.0 * gauss(rng)).max(0.0);

        accidents.push(Accident {
            id: format!("A-{}", i + 1),
            severity: Some(severity_weights.sample(rng) as u8 + 1),
            start_time: Some(start),
            end_time: Some(end),
            start_lat: Some(lat + spread * gauss(rng)),
            start_lng: Some(lng + spread * gauss(rng)),
            state: Some(state.to_string()),
            weather_condition: maybe(rng, 0.02, weather.to_string()),
            visibility_mi: maybe(rng, 0.03, visibility),
            temperature_f: maybe(rng, 0.02, temperature),
            wind_speed_mph: maybe(rng, 0.08, wind_speed),
            sunrise_sunset: Some(if (6..19).contains(&hour) {
                DayNight::Day
            } else {
                DayNight::Night
            }),
            ..Default::default()
        });
    }
    Ok(accidents)
}

fn write_csv(path: &Path, accidents: &[Accident]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(SOURCE_COLUMNS.iter().map(|c| c.to_string()))?;
    for a in accidents {
        writer.write_record(
            SOURCE_COLUMNS
                .iter()
                .map(|&c| a.value(c).map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, accidents: &[Accident]) -> Result<()> {
    let text = |f: fn(&Accident) -> Option<String>| -> ArrayRef {
        Arc::new(accidents.iter().map(f).collect::<StringArray>())
    };
    let float = |f: fn(&Accident) -> Option<f64>| -> ArrayRef {
        Arc::new(accidents.iter().map(f).collect::<Float64Array>())
    };
    let timestamp = |t: Option<NaiveDateTime>| t.map(|t| t.format(TIMESTAMP_FORMAT).to_string());

    let columns: Vec<ArrayRef> = vec![
        text(|a: &Accident| Some(a.id.clone())),
        Arc::new(
            accidents
                .iter()
                .map(|a| a.severity.map(i64::from))
                .collect::<Int64Array>(),
        ),
        Arc::new(accidents.iter().map(|a| timestamp(a.start_time)).collect::<StringArray>()),
        Arc::new(accidents.iter().map(|a| timestamp(a.end_time)).collect::<StringArray>()),
        float(|a: &Accident| a.start_lat),
        float(|a: &Accident| a.start_lng),
        text(|a: &Accident| a.state.clone()),
        text(|a: &Accident| a.weather_condition.clone()),
        float(|a: &Accident| a.visibility_mi),
        float(|a: &Accident| a.temperature_f),
        float(|a: &Accident| a.wind_speed_mph),
        text(|a: &Accident| a.sunrise_sunset.map(|d| d.to_string())),
    ];

    let fields: Vec<Field> = SOURCE_COLUMNS
        .iter()
        .zip(&columns)
        .map(|(col, array)| Field::new(col.to_string(), array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let n = std::env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("row count must be a non-negative integer")?
        .unwrap_or(DEFAULT_ROWS);

    let mut rng = StdRng::seed_from_u64(SEED);
    let accidents = generate(n, &mut rng)?;

    let dir = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let csv_path = dir.join("accidents_sample.csv");
    write_csv(&csv_path, &accidents)?;
    log::info!("Wrote {} accidents to {}", accidents.len(), csv_path.display());

    let parquet_path = dir.join("accidents_sample.parquet");
    write_parquet(&parquet_path, &accidents)?;
    log::info!("Wrote {} accidents to {}", accidents.len(), parquet_path.display());

    println!(
        "Wrote {} accidents to {} and {}",
        accidents.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
