use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Accident, AccidentDataset, CellValue, Column};
use crate::error::LoadError;

/// Cells of one source row, keyed by the known column they belong to.
type RowCells = BTreeMap<Column, CellValue>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an accident dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with US-Accidents column names (recommended)
/// * `.parquet` – same column names, any scalar Arrow types
/// * `.json`    – `[{ "ID": "A-1", "Start_Time": "...", ... }, ...]`
///
/// Unknown columns are ignored. `ID`, `Start_Lat` and `Start_Lng` must be
/// present. Individual unparsable cells become missing values.
pub fn load_file(path: &Path) -> Result<AccidentDataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (columns, rows) = match ext.as_str() {
        "csv" => read_csv(path)?,
        "parquet" | "pq" => read_parquet(path)?,
        "json" => read_json(path)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    for required in Column::REQUIRED {
        if !columns.contains(&required) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: required,
            });
        }
    }

    let dataset = build_dataset(columns, rows).with_source(path);
    log::info!(
        "Loaded {} accidents from {} ({} rows skipped)",
        dataset.len(),
        path.display(),
        dataset.skipped_rows
    );
    Ok(dataset)
}

/// Convert raw rows into typed accidents, dropping rows without an identifier.
fn build_dataset(source_columns: BTreeSet<Column>, rows: Vec<RowCells>) -> AccidentDataset {
    let mut columns: Vec<Column> = source_columns.iter().copied().collect();
    if source_columns.contains(&Column::StartTime) {
        columns.extend([Column::Year, Column::Hour, Column::Month]);
    }

    let total = rows.len();
    let accidents: Vec<Accident> = rows.iter().filter_map(accident_from_cells).collect();
    let skipped = total - accidents.len();
    if skipped > 0 {
        log::warn!("Skipped {skipped} rows without an ID");
    }

    let mut dataset = AccidentDataset::from_accidents(columns, accidents);
    dataset.skipped_rows = skipped;
    dataset
}

// ---------------------------------------------------------------------------
// Row → Accident
// ---------------------------------------------------------------------------

fn accident_from_cells(cells: &RowCells) -> Option<Accident> {
    let id = text_cell(cells, Column::Id)?;

    let accident = Accident {
        id,
        start_time: cells.get(&Column::StartTime).and_then(timestamp_cell),
        end_time: cells.get(&Column::EndTime).and_then(timestamp_cell),
        severity: float_cell(cells, Column::Severity)
            .filter(|v| v.fract() == 0.0 && (0.0..=255.0).contains(v))
            .map(|v| v as u8),
        start_lat: float_cell(cells, Column::StartLat),
        start_lng: float_cell(cells, Column::StartLng),
        state: text_cell(cells, Column::State),
        weather_condition: text_cell(cells, Column::WeatherCondition),
        visibility_mi: float_cell(cells, Column::Visibility),
        temperature_f: float_cell(cells, Column::Temperature),
        wind_speed_mph: float_cell(cells, Column::WindSpeed),
        sunrise_sunset: text_cell(cells, Column::SunriseSunset).and_then(|s| s.parse().ok()),
        ..Default::default()
    };
    Some(accident.with_calendar_fields())
}

fn text_cell(cells: &RowCells, column: Column) -> Option<String> {
    let text = match cells.get(&column)? {
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn float_cell(cells: &RowCells, column: Column) -> Option<f64> {
    let value = match cells.get(&column)? {
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        other => other.as_f64()?,
    };
    (!value.is_nan()).then_some(value)
}

fn timestamp_cell(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Parse the timestamp layouts seen in accident exports.
///
/// Returns `None` for anything unrecognised; callers treat that as missing.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for layout in LAYOUTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(t);
        }
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_local());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// CSV fields stay text so identifiers like `007` survive; numeric columns
/// are parsed later by `float_cell`.
fn csv_cell(raw: &str) -> Option<CellValue> {
    let text = raw.trim();
    (!text.is_empty()).then(|| CellValue::Text(text.to_string()))
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// Header row with column names; ragged rows are tolerated.
fn read_csv(path: &Path) -> Result<(BTreeSet<Column>, Vec<RowCells>), LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let mapped: Vec<(usize, Column)> = reader
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let name = std::str::from_utf8(h).ok()?.trim();
            name.parse::<Column>().ok().map(|c| (i, c))
        })
        .filter(|(_, c)| !c.is_derived())
        .collect();
    let columns = mapped.iter().map(|(_, c)| *c).collect();

    let mut rows = Vec::new();
    let mut undecodable = 0usize;
    for result in reader.byte_records() {
        let record = result.map_err(csv_err)?;
        let cells = mapped
            .iter()
            .filter_map(|&(i, col)| {
                // A field that is not UTF-8 is missing; the row is kept.
                let Ok(raw) = std::str::from_utf8(record.get(i)?) else {
                    undecodable += 1;
                    return None;
                };
                Some((col, csv_cell(raw)?))
            })
            .collect();
        rows.push(cells);
    }
    if undecodable > 0 {
        log::warn!(
            "{undecodable} fields in {} are not valid UTF-8 and were read as missing",
            path.display()
        );
    }

    Ok((columns, rows))
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "ID": "A-1", "Severity": 2, "Start_Time": "2016-02-08 05:46:00",
///     "Start_Lat": 39.86, "Start_Lng": -84.05, "State": "OH" },
///   ...
/// ]
/// ```
fn read_json(path: &Path) -> Result<(BTreeSet<Column>, Vec<RowCells>), LoadError> {
    let json_err = |message: String| LoadError::Json {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let root: JsonValue = serde_json::from_str(&text).map_err(|e| json_err(e.to_string()))?;
    let records = root
        .as_array()
        .ok_or_else(|| json_err("expected top-level JSON array".to_string()))?;

    let mut columns = BTreeSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| json_err(format!("row {i} is not a JSON object")))?;

        let mut cells = RowCells::new();
        for (key, val) in obj {
            let Ok(col) = key.parse::<Column>() else {
                continue;
            };
            if col.is_derived() {
                continue;
            }
            columns.insert(col);
            if let Some(cell) = json_to_cell(val) {
                cells.insert(col, cell);
            }
        }
        rows.push(cells);
    }

    Ok((columns, rows))
}

fn json_to_cell(val: &JsonValue) -> Option<CellValue> {
    match val {
        JsonValue::String(s) => Some(CellValue::Text(s.clone())),
        JsonValue::Number(n) => n
            .as_i64()
            .map(CellValue::Integer)
            .or_else(|| n.as_f64().map(CellValue::Float)),
        JsonValue::Bool(b) => Some(CellValue::Text(b.to_string())),
        JsonValue::Null => None,
        other => Some(CellValue::Text(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Timestamp columns are rendered to text
/// and parsed like CSV cells.
fn read_parquet(path: &Path) -> Result<(BTreeSet<Column>, Vec<RowCells>), LoadError> {
    let pq_err = |message: String| LoadError::Parquet {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| pq_err(e.to_string()))?;

    let mapped: Vec<(usize, Column)> = builder
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.name().parse::<Column>().ok().map(|c| (i, c)))
        .filter(|(_, c)| !c.is_derived())
        .collect();
    let columns = mapped.iter().map(|(_, c)| *c).collect();

    let reader = builder.build().map_err(|e| pq_err(e.to_string()))?;
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.map_err(|e| pq_err(e.to_string()))?;
        for row in 0..batch.num_rows() {
            let cells = mapped
                .iter()
                .filter_map(|&(i, col)| Some((col, extract_cell(batch.column(i), row)?)))
                .collect();
            rows.push(cells);
        }
    }

    Ok((columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Option<CellValue> {
    if col.is_null(row) {
        return None;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::Text(s.value(row).to_string())),
        DataType::LargeUtf8 => Some(CellValue::Text(col.as_string::<i64>().value(row).to_string())),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Text(a.value(row).to_string())),
        _ => array_value_to_string(col, row).ok().map(CellValue::Text),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(ext: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDateTime::parse_from_str("2016-02-08 05:46:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parse_timestamp("2016-02-08 05:46:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-02-08 05:46:00.000000000"), Some(expected));
        assert_eq!(parse_timestamp("2016-02-08T05:46:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-02-08T05:46:00-05:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2016-02-08"),
            NaiveDate::from_ymd_opt(2016, 2, 8).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_csv_bad_cells_become_missing() {
        let file = write_temp(
            "csv",
            "ID,Severity,Start_Time,Start_Lat,Start_Lng,State,Temperature(F)\n\
             A-1,2,2016-02-08 05:46:00,39.8,-84.0,OH,36.9\n\
             A-2,x,not a date,40.1,-82.9,,warm\n",
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);

        let good = &ds.accidents[0];
        assert_eq!(good.severity, Some(2));
        assert_eq!(good.year, Some(2016));
        assert_eq!(good.temperature_f, Some(36.9));

        let bad = &ds.accidents[1];
        assert_eq!(bad.severity, None);
        assert_eq!(bad.start_time, None);
        assert_eq!(bad.year, None);
        assert_eq!(bad.state, None);
        assert_eq!(bad.temperature_f, None);
        assert_eq!(bad.start_lat, Some(40.1));
    }

    #[test]
    fn test_csv_invalid_utf8_field_is_missing() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(
            b"ID,Start_Lat,Start_Lng,Weather_Condition\n\
              A-1,1.0,2.0,Clear\n\
              A-2,3.0,4.0,Caf\xE9\n\
              A-3,5.0,6.0,Rain\n",
        )
        .unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.accidents[0].weather_condition.as_deref(), Some("Clear"));
        assert_eq!(ds.accidents[1].weather_condition, None);
        assert_eq!(ds.accidents[1].start_lat, Some(3.0));
        assert_eq!(ds.accidents[2].weather_condition.as_deref(), Some("Rain"));
    }

    #[test]
    fn test_csv_text_columns_keep_their_spelling() {
        let file = write_temp(
            "csv",
            "ID,Start_Lat,Start_Lng,State,Severity\n\
             007,1.0,2.0,CA,2\n\
             7,1.0,2.0,CA,3.0\n\
             1e3,1.0,2.0,06,\n",
        );
        let ds = load_file(file.path()).unwrap();
        let ids: Vec<&str> = ds.accidents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["007", "7", "1e3"]);
        assert_eq!(ds.accidents[2].state.as_deref(), Some("06"));
        // Numeric columns still parse from text.
        assert_eq!(ds.accidents[0].severity, Some(2));
        assert_eq!(ds.accidents[1].severity, Some(3));
        assert_eq!(ds.accidents[0].start_lat, Some(1.0));
    }

    #[test]
    fn test_csv_rows_without_id_are_skipped() {
        let file = write_temp(
            "csv",
            "ID,Start_Lat,Start_Lng\nA-1,1.0,2.0\n,3.0,4.0\nA-3,5.0\n",
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.skipped_rows, 1);
        // Ragged row: the missing longitude reads as missing.
        assert_eq!(ds.accidents[1].start_lng, None);
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let file = write_temp("csv", "ID,Start_Lat,Severity\nA-1,1.0,2\n");
        match load_file(file.path()) {
            Err(LoadError::MissingColumn { column, .. }) => assert_eq!(column, Column::StartLng),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_file(Path::new("accidents.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "xlsx"));
    }

    #[test]
    fn test_json_records() {
        let file = write_temp(
            "json",
            r#"[
                {"ID": "A-1", "Severity": 3, "Start_Time": "2020-01-05 10:00:00",
                 "Start_Lat": 34.0, "Start_Lng": -118.2, "State": "CA", "Zipcode": "90001"},
                {"ID": "A-2", "Severity": null, "Start_Lat": 34.1, "Start_Lng": -118.3,
                 "Sunrise_Sunset": "Night"}
            ]"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.accidents[0].severity, Some(3));
        assert_eq!(ds.accidents[0].hour, Some(10));
        assert_eq!(ds.accidents[1].severity, None);
        assert_eq!(
            ds.accidents[1].sunrise_sunset,
            Some(crate::data::model::DayNight::Night)
        );
        assert!(ds.has_column(Column::Year));
    }

    #[test]
    fn test_json_must_be_an_array() {
        let file = write_temp("json", r#"{"ID": "A-1"}"#);
        assert!(matches!(load_file(file.path()), Err(LoadError::Json { .. })));
    }
}
