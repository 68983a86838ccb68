use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::errors::AppError;
use crate::models::candle::Candle;

use super::validator::{resolve_columns, sniff_delimiter, ColumnIndex};

/// Numeric timestamps below this are seconds, not milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

/// Load candles from a CSV file on disk.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::FileRead(format!("{}: {}", path.display(), e)))?;
    let candles = parse_candles_str(&text)?;
    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Parse CSV text into candles.
///
/// All or nothing: the first bad row aborts the parse and is reported by
/// file line and column.
pub fn parse_candles_str(text: &str) -> Result<Vec<Candle>, AppError> {
    reject_blank_rows(text)?;
    let header_line = text.lines().next().unwrap_or_default();
    let mut rdr = ReaderBuilder::new()
        .delimiter(sniff_delimiter(header_line))
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = resolve_columns(rdr.headers()?)?;

    let mut candles = Vec::new();
    for result in rdr.records() {
        let record = result?;
        candles.push(parse_row(&record, &columns)?);
    }

    if candles.is_empty() {
        return Err(AppError::NoData);
    }
    Ok(candles)
}

/// The csv reader skips blank lines, so catch any that sit between data rows.
/// Trailing blank lines are allowed.
fn reject_blank_rows(text: &str) -> Result<(), AppError> {
    let lines: Vec<&str> = text.lines().collect();
    let last = lines.iter().rposition(|l| !l.trim().is_empty()).unwrap_or(0);
    match lines[..last].iter().enumerate().skip(1).find(|(_, l)| l.trim().is_empty()) {
        Some((idx, _)) => Err(row_error(idx as u64 + 1, "", "empty row")),
        None => Ok(()),
    }
}

fn parse_row(record: &StringRecord, columns: &ColumnIndex) -> Result<Candle, AppError> {
    let row = record.position().map(|p| p.line()).unwrap_or(0);

    let raw_ts = field(record, row, columns.timestamp, "timestamp")?;
    let t = parse_timestamp(raw_ts).ok_or_else(|| {
        row_error(row, "timestamp", &format!("'{}' is not a recognised timestamp", raw_ts))
    })?;

    Ok(Candle {
        t,
        o: price(record, row, columns.open, "open")?,
        h: price(record, row, columns.high, "high")?,
        l: price(record, row, columns.low, "low")?,
        c: price(record, row, columns.close, "close")?,
    })
}

fn field<'r>(record: &'r StringRecord, row: u64, idx: usize, name: &str) -> Result<&'r str, AppError> {
    match record.get(idx) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(row_error(row, name, "empty value")),
    }
}

fn price(record: &StringRecord, row: u64, idx: usize, name: &str) -> Result<f64, AppError> {
    let raw = field(record, row, idx, name)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(row_error(row, name, &format!("'{}' is not a finite number", raw))),
    }
}

fn row_error(row: u64, column: &str, message: &str) -> AppError {
    AppError::CsvParseError {
        row,
        column: column.to_string(),
        message: message.to_string(),
    }
}

/// Epoch milliseconds from a numeric (seconds or millis) or date string.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<f64>() {
        if !v.is_finite() {
            return None;
        }
        let millis = if v.abs() < MILLIS_THRESHOLD { v * 1000.0 } else { v };
        return Some(millis.round() as i64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_seconds_normalized_to_millis() {
        let csv = "timestamp,open,high,low,close\n\
                   1700000000,1.0,1.1,0.9,1.05\n\
                   1700000060000,1.05,1.2,1.0,1.1\n";
        let candles = parse_candles_str(csv).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].t, 1_700_000_000_000);
        assert_eq!(candles[1].t, 1_700_000_060_000);
        assert_eq!(candles[0], Candle::new(1_700_000_000_000, 1.0, 1.1, 0.9, 1.05));
    }

    #[test]
    fn test_parse_semicolon_and_extra_columns() {
        let csv = "Date;Open;High;Low;Close;Volume\n\
                   2024-01-02 00:00:00;100;110;95;105;1234\n";
        let candles = parse_candles_str(csv).unwrap();
        assert_eq!(candles[0].t, 1_704_153_600_000);
        assert_eq!(candles[0].c, 105.0);
    }

    #[test]
    fn test_missing_close_column_rejected() {
        let csv = "timestamp,open,high,low\n1,1,1,1\n";
        let err = parse_candles_str(csv).unwrap_err();
        assert!(matches!(err, AppError::CsvValidation(ref m) if m.contains("close")));
    }

    #[test]
    fn test_bad_row_aborts_whole_parse() {
        let csv = "timestamp,open,high,low,close\n\
                   1,1,1,1,1\n\
                   2,1,abc,1,1\n\
                   3,1,1,1,1\n";
        match parse_candles_str(csv).unwrap_err() {
            AppError::CsvParseError { row, column, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "high");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_field_and_nan_rejected() {
        let csv = "timestamp,open,high,low,close\n1,1,1,1,\n";
        assert!(matches!(
            parse_candles_str(csv).unwrap_err(),
            AppError::CsvParseError { ref column, .. } if column == "close"
        ));

        let csv = "timestamp,open,high,low,close\n1,NaN,1,1,1\n";
        assert!(matches!(
            parse_candles_str(csv).unwrap_err(),
            AppError::CsvParseError { ref column, .. } if column == "open"
        ));
    }

    #[test]
    fn test_short_row_rejected() {
        let csv = "timestamp,open,high,low,close\n1,1,1\n";
        assert!(matches!(
            parse_candles_str(csv).unwrap_err(),
            AppError::CsvParseError { row: 2, .. }
        ));
    }

    #[test]
    fn test_blank_row_aborts_parse() {
        let csv = "timestamp,open,high,low,close\n1,1,1,1,1\n\n3,1,1,1,1\n";
        match parse_candles_str(csv).unwrap_err() {
            AppError::CsvParseError { row, message, .. } => {
                assert_eq!(row, 3);
                assert_eq!(message, "empty row");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let csv = "timestamp,open,high,low,close\r\n1,1,1,1,1\r\n  \r\n3,1,1,1,1\r\n";
        assert!(matches!(parse_candles_str(csv).unwrap_err(), AppError::CsvParseError { row: 3, .. }));
    }

    #[test]
    fn test_trailing_blank_lines_allowed() {
        let csv = "timestamp,open,high,low,close\n1,1,1,1,1\n2,1,1,1,1\n\n\n";
        assert_eq!(parse_candles_str(csv).unwrap().len(), 2);
    }

    #[test]
    fn test_header_only_is_no_data() {
        let csv = "timestamp,open,high,low,close\n";
        assert!(matches!(parse_candles_str(csv).unwrap_err(), AppError::NoData));
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(parse_timestamp("0"), Some(0));
        assert_eq!(parse_timestamp("1.5"), Some(1500));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(1_704_067_200_000));
        assert_eq!(parse_timestamp("2024-01-01"), Some(1_704_067_200_000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,open,high,low,close").unwrap();
        writeln!(file, "1700000000,2,3,1,2.5").unwrap();
        let candles = load_candles_csv(file.path()).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].h, 3.0);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_candles_csv(Path::new("/nonexistent/candles.csv")).unwrap_err();
        assert!(matches!(err, AppError::FileRead(_)));
    }
}
