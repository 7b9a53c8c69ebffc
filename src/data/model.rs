use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

// ---------------------------------------------------------------------------
// Column – the known accident schema
// ---------------------------------------------------------------------------

/// Columns of the accident schema, named after their source headers.
///
/// `Year`, `Hour` and `Month` are derived from `Start_Time` at load time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter, Serialize,
)]
pub enum Column {
    #[strum(serialize = "ID")]
    #[serde(rename = "ID")]
    Id,
    #[strum(serialize = "Severity")]
    Severity,
    #[strum(serialize = "Start_Time")]
    #[serde(rename = "Start_Time")]
    StartTime,
    #[strum(serialize = "End_Time")]
    #[serde(rename = "End_Time")]
    EndTime,
    #[strum(serialize = "Start_Lat")]
    #[serde(rename = "Start_Lat")]
    StartLat,
    #[strum(serialize = "Start_Lng")]
    #[serde(rename = "Start_Lng")]
    StartLng,
    #[strum(serialize = "State")]
    State,
    #[strum(serialize = "Weather_Condition")]
    #[serde(rename = "Weather_Condition")]
    WeatherCondition,
    #[strum(serialize = "Visibility(mi)")]
    #[serde(rename = "Visibility(mi)")]
    Visibility,
    #[strum(serialize = "Temperature(F)")]
    #[serde(rename = "Temperature(F)")]
    Temperature,
    #[strum(serialize = "Wind_Speed(mph)")]
    #[serde(rename = "Wind_Speed(mph)")]
    WindSpeed,
    #[strum(serialize = "Sunrise_Sunset")]
    #[serde(rename = "Sunrise_Sunset")]
    SunriseSunset,
    #[strum(serialize = "Year")]
    Year,
    #[strum(serialize = "Hour")]
    Hour,
    #[strum(serialize = "Month")]
    Month,
}

/// How a column may be used by the aggregator and the filter widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Identifier,
    /// Free categories (state, weather, day/night).
    Categorical,
    /// Small integers that are both countable and measurable (severity, year, hour).
    Ordinal,
    Numeric,
    Temporal,
}

impl Column {
    /// Columns that must be present in every source file.
    pub const REQUIRED: [Column; 3] = [Column::Id, Column::StartLat, Column::StartLng];

    /// Columns the sidebar offers as filters.
    pub const FILTERABLE: [Column; 4] = [
        Column::State,
        Column::Severity,
        Column::Year,
        Column::WeatherCondition,
    ];

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Id => ColumnKind::Identifier,
            Column::State | Column::WeatherCondition | Column::SunriseSunset => {
                ColumnKind::Categorical
            }
            Column::Severity | Column::Year | Column::Hour => ColumnKind::Ordinal,
            Column::StartLat
            | Column::StartLng
            | Column::Visibility
            | Column::Temperature
            | Column::WindSpeed => ColumnKind::Numeric,
            Column::StartTime | Column::EndTime | Column::Month => ColumnKind::Temporal,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.kind(), ColumnKind::Numeric | ColumnKind::Ordinal)
    }

    pub fn is_categorical(self) -> bool {
        matches!(self.kind(), ColumnKind::Categorical | ColumnKind::Ordinal)
    }

    /// Derived from `Start_Time` rather than read from the source.
    pub fn is_derived(self) -> bool {
        matches!(self, Column::Year | Column::Hour | Column::Month)
    }

    /// All numeric columns, in schema order.
    pub fn numeric() -> impl Iterator<Item = Column> {
        Column::iter().filter(|c| c.is_numeric())
    }

    /// All categorical columns, in schema order.
    pub fn categorical() -> impl Iterator<Item = Column> {
        Column::iter().filter(|c| c.is_categorical())
    }
}

// ---------------------------------------------------------------------------
// CellValue – a single typed cell
// ---------------------------------------------------------------------------

/// One non-missing cell. Missing cells are `None` at the call site.
///
/// `Ord` and `Hash` are implemented by hand so values can key `BTreeSet`s
/// and `HashMap`s even though `f64` is neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn rank(v: &CellValue) -> u8 {
            match v {
                Integer(_) => 0,
                Float(_) => 1,
                Text(_) => 2,
            }
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Accident – one row of the source table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum DayNight {
    Day,
    Night,
}

/// A single accident observation. Every field except `id` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Accident {
    pub id: String,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub severity: Option<u8>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub state: Option<String>,
    pub weather_condition: Option<String>,
    pub visibility_mi: Option<f64>,
    pub temperature_f: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub sunrise_sunset: Option<DayNight>,
    // -- derived from start_time --
    pub year: Option<i32>,
    pub hour: Option<u32>,
    /// First day of the start month.
    pub month: Option<NaiveDate>,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const MONTH_FORMAT: &str = "%Y-%m";

impl Accident {
    /// Fill `year`, `hour` and `month` from `start_time`.
    pub fn with_calendar_fields(mut self) -> Self {
        self.year = self.start_time.map(|t| t.year());
        self.hour = self.start_time.map(|t| t.hour());
        self.month = self
            .start_time
            .and_then(|t| NaiveDate::from_ymd_opt(t.year(), t.month(), 1));
        self
    }

    /// Typed lookup for widgets and generic reductions.
    pub fn value(&self, column: Column) -> Option<CellValue> {
        let text = |s: &Option<String>| s.as_ref().map(|s| CellValue::Text(s.clone()));
        match column {
            Column::Id => Some(CellValue::Text(self.id.clone())),
            Column::Severity => self.severity.map(|s| CellValue::Integer(i64::from(s))),
            Column::StartTime => self
                .start_time
                .map(|t| CellValue::Text(t.format(TIMESTAMP_FORMAT).to_string())),
            Column::EndTime => self
                .end_time
                .map(|t| CellValue::Text(t.format(TIMESTAMP_FORMAT).to_string())),
            Column::StartLat => self.start_lat.map(CellValue::Float),
            Column::StartLng => self.start_lng.map(CellValue::Float),
            Column::State => text(&self.state),
            Column::WeatherCondition => text(&self.weather_condition),
            Column::Visibility => self.visibility_mi.map(CellValue::Float),
            Column::Temperature => self.temperature_f.map(CellValue::Float),
            Column::WindSpeed => self.wind_speed_mph.map(CellValue::Float),
            Column::SunriseSunset => self.sunrise_sunset.map(|d| CellValue::Text(d.to_string())),
            Column::Year => self.year.map(|y| CellValue::Integer(i64::from(y))),
            Column::Hour => self.hour.map(|h| CellValue::Integer(i64::from(h))),
            Column::Month => self
                .month
                .map(|m| CellValue::Text(m.format(MONTH_FORMAT).to_string())),
        }
    }

    /// Numeric view of a column; `None` when missing, non-finite or not numeric.
    pub fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::Severity => self.severity.map(f64::from),
            Column::StartLat => self.start_lat,
            Column::StartLng => self.start_lng,
            Column::Visibility => self.visibility_mi,
            Column::Temperature => self.temperature_f,
            Column::WindSpeed => self.wind_speed_mph,
            Column::Year => self.year.map(f64::from),
            Column::Hour => self.hour.map(f64::from),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// AccidentDataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The loaded table plus the distinct values of each categorical column.
#[derive(Debug, Clone, Default)]
pub struct AccidentDataset {
    /// File the rows were read from, if any.
    pub source: Option<PathBuf>,
    /// Columns present in the source plus the derived calendar columns.
    pub columns: Vec<Column>,
    pub accidents: Vec<Accident>,
    /// Rows dropped at load time because they had no identifier.
    pub skipped_rows: usize,
    distinct: BTreeMap<Column, BTreeSet<CellValue>>,
}

impl AccidentDataset {
    /// Build the distinct-value index from loaded rows.
    pub fn from_accidents(columns: Vec<Column>, accidents: Vec<Accident>) -> Self {
        let mut distinct: BTreeMap<Column, BTreeSet<CellValue>> = BTreeMap::new();
        for col in columns.iter().copied().filter(|c| c.is_categorical()) {
            let values = accidents.iter().filter_map(|a| a.value(col)).collect();
            distinct.insert(col, values);
        }
        AccidentDataset {
            source: None,
            columns,
            accidents,
            skipped_rows: 0,
            distinct,
        }
    }

    pub fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self
    }

    /// Sorted distinct values of a categorical column (empty otherwise).
    pub fn distinct_values(&self, column: Column) -> Option<&BTreeSet<CellValue>> {
        self.distinct.get(&column)
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.accidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accidents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_column_header_names_round_trip() {
        for col in Column::iter() {
            let parsed: Column = col.to_string().parse().unwrap();
            assert_eq!(parsed, col);
        }
        assert_eq!("Temperature(F)".parse::<Column>().unwrap(), Column::Temperature);
        assert!("Zipcode".parse::<Column>().is_err());
    }

    #[test]
    fn test_calendar_fields_derived_from_start_time() {
        let a = Accident {
            id: "A-1".into(),
            start_time: Some(at("2019-07-04 17:30:00")),
            ..Default::default()
        }
        .with_calendar_fields();

        assert_eq!(a.year, Some(2019));
        assert_eq!(a.hour, Some(17));
        assert_eq!(a.month, NaiveDate::from_ymd_opt(2019, 7, 1));
        assert_eq!(a.value(Column::Month), Some(CellValue::from("2019-07")));
    }

    #[test]
    fn test_missing_start_time_leaves_derived_fields_missing() {
        let a = Accident {
            id: "A-2".into(),
            ..Default::default()
        }
        .with_calendar_fields();
        assert_eq!(a.year, None);
        assert_eq!(a.value(Column::Year), None);
    }

    #[test]
    fn test_cell_value_ordering_is_total() {
        let mut set = BTreeSet::new();
        set.insert(CellValue::Float(2.5));
        set.insert(CellValue::Integer(3));
        set.insert(CellValue::from("CA"));
        set.insert(CellValue::Integer(1));
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                CellValue::Integer(1),
                CellValue::Integer(3),
                CellValue::Float(2.5),
                CellValue::from("CA"),
            ]
        );
    }

    #[test]
    fn test_distinct_values_only_for_categorical_columns() {
        let rows = vec![
            Accident {
                id: "1".into(),
                state: Some("CA".into()),
                temperature_f: Some(70.0),
                ..Default::default()
            },
            Accident {
                id: "2".into(),
                state: Some("OH".into()),
                ..Default::default()
            },
            Accident {
                id: "3".into(),
                state: Some("CA".into()),
                ..Default::default()
            },
        ];
        let ds = AccidentDataset::from_accidents(vec![Column::Id, Column::State, Column::Temperature], rows);
        let states = ds.distinct_values(Column::State).unwrap();
        assert_eq!(states.len(), 2);
        assert!(ds.distinct_values(Column::Temperature).is_none());
    }

    #[test]
    fn test_day_night_parses_case_insensitively() {
        assert_eq!("night".parse::<DayNight>().unwrap(), DayNight::Night);
        assert_eq!("Day".parse::<DayNight>().unwrap(), DayNight::Day);
    }
}
