// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Data loaders producing hourly UTC market series from CSV files or synthetic scenarios.
//!
//! Electricity price exports differ between ISOs and vendors, so columns are located
//! by keyword rather than by fixed name. Anything that cannot be parsed is dropped and
//! counted; a file without a recognisable time or price column is an error.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use hashdispatch_core::stats::{OutlierMethod, outliers};
use hashdispatch_core::{DateWindow, ElectricityPricePoint, HashpricePoint};
use tracing::{debug, info, warn};

use crate::scenarios::MarketScenario;

const DATETIME_KEYWORDS: &[&str] = &[
    "date",
    "time",
    "datetime",
    "timestamp",
    "hour_ending",
    "interval_start_local",
];

const PRICE_KEYWORDS: &[&str] = &[
    "price",
    "lmp",
    "cost",
    "rate",
    "mwh",
    "kwh",
    "settlement",
];

const HASHPRICE_KEYWORDS: &[&str] = &["hashprice", "price", "hash"];

/// Naive formats tried after RFC 3339, in order
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Z-score above which an hourly price counts as extreme in load diagnostics
const EXTREME_PRICE_Z: f64 = 3.0;

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Hourly series ready for the join
#[derive(Debug, Clone)]
pub struct MarketData {
    /// Human-readable source description
    pub label: String,
    pub electricity: Vec<ElectricityPricePoint>,
    pub hashprice: Vec<HashpricePoint>,
    /// Window the series were loaded for
    pub window: DateWindow,
}

/// Trait for loading market data from various sources
pub trait DataLoader {
    /// Load data for `window`, or for everything available when `None`
    fn load(&self, window: Option<&DateWindow>) -> Result<MarketData>;
}

/// Loader for the built-in synthetic scenarios
#[derive(Debug, Clone)]
pub struct SyntheticLoader {
    pub scenario: MarketScenario,
    pub zones: Vec<String>,
    pub seed: u64,
}

impl DataLoader for SyntheticLoader {
    fn load(&self, window: Option<&DateWindow>) -> Result<MarketData> {
        let window = window.ok_or_else(|| anyhow!("A date window is required for synthetic data"))?;
        if self.zones.is_empty() {
            bail!("At least one load zone is required for synthetic data");
        }

        let (electricity, hashprice) = self.scenario.generate(&self.zones, window, self.seed);
        debug!("{}: {}", self.scenario.name(), self.scenario.description());
        info!(
            "Generated {} scenario: {} electricity rows across {} zones, {} hashprice hours",
            self.scenario.name(),
            electricity.len(),
            self.zones.len(),
            hashprice.len()
        );

        Ok(MarketData {
            label: format!("{} (seed {})", self.scenario.name(), self.seed),
            electricity,
            hashprice,
            window: *window,
        })
    }
}

/// Loader for per-zone electricity CSV files plus a hashprice CSV
#[derive(Debug, Clone)]
pub struct CsvLoader {
    electricity: Vec<(String, PathBuf)>,
    hashprice: PathBuf,
    source_tz: Tz,
}

impl CsvLoader {
    pub fn new(electricity: Vec<(String, PathBuf)>, hashprice: PathBuf, source_tz: Tz) -> Self {
        Self {
            electricity,
            hashprice,
            source_tz,
        }
    }
}

impl DataLoader for CsvLoader {
    fn load(&self, window: Option<&DateWindow>) -> Result<MarketData> {
        if self.electricity.is_empty() {
            bail!("No electricity price files were given");
        }

        let mut electricity = Vec::new();
        for (zone, path) in &self.electricity {
            let points = load_electricity_csv(path, zone, self.source_tz).with_context(|| {
                format!("Failed to load electricity data for zone {zone}")
            })?;
            electricity.extend(points);
        }

        let window = match window {
            Some(window) => *window,
            None => {
                let first = electricity.iter().map(|p| p.timestamp).min();
                let last = electricity.iter().map(|p| p.timestamp).max();
                let (Some(first), Some(last)) = (first, last) else {
                    bail!("Electricity files contain no usable rows");
                };
                DateWindow::new(first, last)?
            }
        };

        let observations = load_hashprice_csv(&self.hashprice)?;
        let hashprice = forward_fill_hourly(&observations, &window);
        info!(
            "Loaded hashprice: {} observations expanded to {} hours",
            observations.len(),
            hashprice.len()
        );

        Ok(MarketData {
            label: format!("CSV ({} zones)", self.electricity.len()),
            electricity,
            hashprice,
            window,
        })
    }
}

/// Lower-case and trim a header name
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// First column whose name contains a datetime keyword
pub fn find_datetime_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| DATETIME_KEYWORDS.iter().any(|k| h.contains(k)))
}

/// First column whose name contains a price keyword but no date/time word
pub fn find_price_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|h| {
        PRICE_KEYWORDS.iter().any(|k| h.contains(k)) && !h.contains("date") && !h.contains("time")
    })
}

fn find_hashprice_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == "hashprice")
        .or_else(|| {
            headers.iter().position(|h| {
                HASHPRICE_KEYWORDS.iter().any(|k| h.contains(k))
                    && !h.contains("date")
                    && !h.contains("time")
            })
        })
}

fn find_hashprice_time_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == "timestamp")
        .or_else(|| headers.iter().position(|h| h.contains("time") || h.contains("date")))
}

/// Parse a timestamp; values without an offset are read as local time in `tz`
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Parse a numeric cell, tolerating currency symbols and thousands separators
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Truncate to the start of the UTC hour
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = timestamp.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0)
}

/// Most common spacing of a sorted timestamp series
pub fn detect_frequency(timestamps: &[DateTime<Utc>]) -> String {
    if timestamps.len() < 2 {
        return "unknown".to_owned();
    }

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in timestamps.windows(2) {
        *counts.entry((pair[1] - pair[0]).num_seconds()).or_default() += 1;
    }

    // Highest count wins; the shorter spacing breaks ties
    let Some((&spacing, _)) = counts
        .iter()
        .max_by(|(a_gap, a_count), (b_gap, b_count)| a_count.cmp(b_count).then(b_gap.cmp(a_gap)))
    else {
        return "unknown".to_owned();
    };

    match spacing {
        900 => "15min".to_owned(),
        1800 => "30min".to_owned(),
        3600 => "1H".to_owned(),
        86_400 => "D".to_owned(),
        other => format!("{other}s"),
    }
}

struct CsvTable {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
    unreadable: usize,
}

fn read_csv(path: &Path) -> Result<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    let mut unreadable = 0;
    for record in reader.records() {
        match record {
            Ok(row) => rows.push(row),
            Err(_) => unreadable += 1,
        }
    }

    Ok(CsvTable {
        headers,
        rows,
        unreadable,
    })
}

/// Load one zone's electricity prices, averaged into UTC hours and sorted by time
pub fn load_electricity_csv(path: &Path, zone: &str, source_tz: Tz) -> Result<Vec<ElectricityPricePoint>> {
    let table = read_csv(path)?;

    let time_col = find_datetime_column(&table.headers).ok_or_else(|| {
        anyhow!(
            "Could not identify a datetime column in {}. Available columns: {:?}",
            path.display(),
            table.headers
        )
    })?;
    let price_col = find_price_column(&table.headers).ok_or_else(|| {
        anyhow!(
            "Could not identify a price column in {}. Available columns: {:?}",
            path.display(),
            table.headers
        )
    })?;
    debug!(
        "{}: using '{}' as time and '{}' as price",
        path.display(),
        table.headers[time_col],
        table.headers[price_col]
    );

    let mut raw: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(table.rows.len());
    let mut dropped = table.unreadable;
    for row in &table.rows {
        let timestamp = row.get(time_col).and_then(|v| parse_timestamp(v, source_tz));
        let price = row.get(price_col).and_then(parse_number);
        match (timestamp, price) {
            (Some(timestamp), Some(price)) => raw.push((timestamp, price)),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("{}: dropped {} unparseable rows", path.display(), dropped);
    }
    if raw.is_empty() {
        bail!("No valid price rows in {}", path.display());
    }

    raw.sort_by_key(|(timestamp, _)| *timestamp);
    let timestamps: Vec<DateTime<Utc>> = raw.iter().map(|(t, _)| *t).collect();
    info!(
        "{}: detected {} frequency over {} rows",
        zone,
        detect_frequency(&timestamps),
        raw.len()
    );

    // hour -> (sum, count)
    let mut hourly: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for (timestamp, price) in raw {
        let Some(hour) = floor_to_hour(timestamp) else {
            continue;
        };
        let entry = hourly.entry(hour).or_insert((0.0, 0));
        entry.0 += price;
        entry.1 += 1;
    }

    let points: Vec<ElectricityPricePoint> = hourly
        .into_iter()
        .map(|(timestamp, (sum, count))| ElectricityPricePoint {
            timestamp,
            load_zone: zone.to_owned(),
            price_per_mwh: sum / count as f64,
        })
        .collect();

    let prices: Vec<f64> = points.iter().map(|p| p.price_per_mwh).collect();
    let flagged = outliers(&prices, OutlierMethod::default())?
        .into_iter()
        .filter(|&f| f)
        .count();
    let extreme = outliers(&prices, OutlierMethod::ZScore { z: EXTREME_PRICE_Z })?
        .into_iter()
        .filter(|&f| f)
        .count();
    let (min, max) = prices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    info!(
        "{}: {} hourly prices, ${:.2} - ${:.2}/MWh, {} outlier hours ({} beyond {} sigma)",
        zone,
        points.len(),
        min,
        max,
        flagged,
        extreme,
        EXTREME_PRICE_Z
    );

    Ok(points)
}

/// Load raw hashprice observations (usually daily), sorted by time.
///
/// The hashprice feed is quoted in UTC, so naive dates are read as UTC whatever
/// zone the electricity files use.
pub fn load_hashprice_csv(path: &Path) -> Result<Vec<(DateTime<Utc>, f64)>> {
    let table = read_csv(path)?;

    let time_col = find_hashprice_time_column(&table.headers).ok_or_else(|| {
        anyhow!(
            "No timestamp column found in {}. Available columns: {:?}",
            path.display(),
            table.headers
        )
    })?;
    let value_col = find_hashprice_column(&table.headers).ok_or_else(|| {
        anyhow!(
            "No hashprice column found in {}. Available columns: {:?}",
            path.display(),
            table.headers
        )
    })?;

    let mut observations: Vec<(DateTime<Utc>, f64)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let timestamp = row.get(time_col).and_then(|v| parse_timestamp(v, Tz::UTC))?;
            let value = row.get(value_col).and_then(parse_number)?;
            Some((timestamp, value))
        })
        .collect();

    if observations.is_empty() {
        bail!("No valid hashprice data in {}", path.display());
    }
    observations.sort_by_key(|(timestamp, _)| *timestamp);

    let timestamps: Vec<DateTime<Utc>> = observations.iter().map(|(t, _)| *t).collect();
    debug!("Hashprice frequency: {}", detect_frequency(&timestamps));

    Ok(observations)
}

/// Expand observations onto every whole hour of `window`, carrying the latest
/// observation forward. Hours before the first observation are left out.
pub fn forward_fill_hourly(observations: &[(DateTime<Utc>, f64)], window: &DateWindow) -> Vec<HashpricePoint> {
    let mut sorted = observations.to_vec();
    sorted.sort_by_key(|(timestamp, _)| *timestamp);

    let Some(mut hour) = floor_to_hour(window.start) else {
        return Vec::new();
    };
    if hour < window.start {
        hour += Duration::hours(1);
    }

    let mut points = Vec::new();
    let mut next = 0;
    let mut current: Option<f64> = None;

    while hour <= window.end {
        while next < sorted.len() && sorted[next].0 <= hour {
            current = Some(sorted[next].1);
            next += 1;
        }
        if let Some(hashprice) = current {
            points.push(HashpricePoint {
                timestamp: hour,
                hashprice,
            });
        }
        hour += Duration::hours(1);
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| normalize_header(n)).collect()
    }

    #[test]
    fn test_column_sniffing() {
        let cols = headers(&["Interval_Start_Local", "Zone", "Settlement Point Price"]);
        assert_eq!(find_datetime_column(&cols), Some(0));
        assert_eq!(find_price_column(&cols), Some(2));

        // Price keyword inside a time column name does not count
        let cols = headers(&["price_time", "LMP"]);
        assert_eq!(find_price_column(&cols), Some(1));

        let cols = headers(&["zone", "value"]);
        assert_eq!(find_datetime_column(&cols), None);
        assert_eq!(find_price_column(&cols), None);
    }

    #[test]
    fn test_parse_timestamp_formats_and_zones() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2024-03-01T06:00:00Z", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 06:00", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("03/01/2024 06:00", Tz::UTC), Some(expected));
        // Chicago is UTC-6 in winter
        assert_eq!(
            parse_timestamp("2024-03-01 00:00:00", chrono_tz::America::Chicago),
            Some(expected)
        );
        assert_eq!(parse_timestamp("not a date", Tz::UTC), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
        assert_eq!(parse_number("-12"), Some(-12.0));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_detect_frequency() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let quarter: Vec<_> = (0..8).map(|i| start + Duration::minutes(15 * i)).collect();
        let daily: Vec<_> = (0..3).map(|i| start + Duration::days(i)).collect();

        assert_eq!(detect_frequency(&quarter), "15min");
        assert_eq!(detect_frequency(&daily), "D");
        assert_eq!(detect_frequency(&quarter[..1]), "unknown");
    }

    #[test]
    fn test_electricity_csv_averages_sub_hourly_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "houston.csv",
            "Interval Start Time,Zone,LMP\n\
             2024-01-01 00:00,HOU,10\n\
             2024-01-01 00:15,HOU,20\n\
             2024-01-01 00:30,HOU,30\n\
             2024-01-01 00:45,HOU,40\n\
             2024-01-01 01:00,HOU,bad\n\
             2024-01-01 01:15,HOU,50\n",
        );

        let points = load_electricity_csv(&path, "houston", Tz::UTC).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].price_per_mwh - 25.0).abs() < 1e-9);
        assert!((points[1].price_per_mwh - 50.0).abs() < 1e-9);
        assert_eq!(points[1].load_zone, "houston");
    }

    #[test]
    fn test_electricity_csv_without_price_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "timestamp,zone\n2024-01-01 00:00,HOU\n");

        let err = load_electricity_csv(&path, "houston", Tz::UTC).unwrap_err();
        assert!(err.to_string().contains("price column"));
    }

    #[test]
    fn test_hashprice_forward_fill() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "hashprice.csv",
            "date,hashprice_usd\n2024-01-02,0.05\n2024-01-03,0.06\n",
        );

        let observations = load_hashprice_csv(&path).unwrap();
        let window = DateWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        )
        .unwrap();
        let hourly = forward_fill_hourly(&observations, &window);

        // Jan 1 has no prior observation
        assert_eq!(hourly.len(), 48);
        assert_eq!(hourly[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!(hourly[..24].iter().all(|p| p.hashprice == 0.05));
        assert!(hourly[24..].iter().all(|p| p.hashprice == 0.06));
    }

    #[test]
    fn test_csv_loader_derives_window_from_data() {
        let dir = tempfile::tempdir().unwrap();
        let electricity = write_file(
            &dir,
            "west.csv",
            "datetime,price\n2024-01-01T00:00:00Z,20\n2024-01-01T05:00:00Z,30\n",
        );
        let hashprice = write_file(&dir, "hp.csv", "timestamp,hashprice\n2024-01-01,0.05\n");

        let loader = CsvLoader::new(vec![("west".to_owned(), electricity)], hashprice, Tz::UTC);
        let data = loader.load(None).unwrap();

        assert_eq!(data.electricity.len(), 2);
        assert_eq!(data.hashprice.len(), 6);
        assert_eq!(data.window.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_hashprice_stays_utc_with_local_electricity() {
        let dir = tempfile::tempdir().unwrap();
        let electricity = write_file(
            &dir,
            "houston.csv",
            "datetime,price
2024-01-01 00:00,20
2024-01-01 01:00,25
",
        );
        let hashprice = write_file(
            &dir,
            "hp.csv",
            "timestamp,hashprice
2024-01-01,0.05
2024-01-02,0.09
",
        );
        let window = DateWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap();

        let loader = CsvLoader::new(
            vec![("houston".to_owned(), electricity)],
            hashprice,
            chrono_tz::America::Chicago,
        );
        let data = loader.load(Some(&window)).unwrap();

        // Electricity shifts by the Chicago offset, hashprice does not
        assert_eq!(
            data.electricity[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
        );
        assert_eq!(data.hashprice.len(), 48);
        assert_eq!(
            data.hashprice[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        let early_jan_2 = data
            .hashprice
            .iter()
            .find(|p| p.timestamp == Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap())
            .unwrap();
        assert_eq!(early_jan_2.hashprice, 0.09);
    }
}
