use csv::StringRecord;

use crate::errors::AppError;

/// Positions of the required columns within a CSV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub timestamp: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
}

/// Required columns, in reporting order, with the header names accepted for each.
const REQUIRED: [(&str, &[&str]); 5] = [
    ("timestamp", &["timestamp", "time", "date", "datetime", "t"]),
    ("open", &["open", "o"]),
    ("high", &["high", "h"]),
    ("low", &["low", "l"]),
    ("close", &["close", "c"]),
];

/// Pick the field delimiter from the header line.
/// Comma wins whenever present; otherwise semicolon, then tab.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains(',') {
        b','
    } else if header_line.contains(';') {
        b';'
    } else if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Locate every required column, failing on the first one that is missing.
pub fn resolve_columns(headers: &StringRecord) -> Result<ColumnIndex, AppError> {
    let names: Vec<String> = headers.iter().map(normalize).collect();

    let mut found = [0usize; 5];
    for (slot, (canonical, aliases)) in REQUIRED.iter().enumerate() {
        found[slot] = names
            .iter()
            .position(|n| aliases.contains(&n.as_str()))
            .ok_or_else(|| {
                AppError::CsvValidation(format!("missing required column '{}'", canonical))
            })?;
    }

    Ok(ColumnIndex {
        timestamp: found[0],
        open: found[1],
        high: found[2],
        low: found[3],
        close: found[4],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("timestamp,open,high,low,close"), b',');
        assert_eq!(sniff_delimiter("timestamp;open;high;low;close"), b';');
        assert_eq!(sniff_delimiter("timestamp\topen\thigh\tlow\tclose"), b'\t');
        assert_eq!(sniff_delimiter("timestamp"), b',');
    }

    #[test]
    fn test_resolve_any_order_and_case() {
        let idx = resolve_columns(&record(&["Close", "volume", " HIGH ", "Low", "Open", "Timestamp"])).unwrap();
        assert_eq!(
            idx,
            ColumnIndex { timestamp: 5, open: 4, high: 2, low: 3, close: 0 }
        );
    }

    #[test]
    fn test_resolve_aliases_and_bom() {
        let idx = resolve_columns(&record(&["\u{feff}time", "o", "h", "l", "c"])).unwrap();
        assert_eq!(idx.timestamp, 0);
        assert_eq!(idx.close, 4);
    }

    #[test]
    fn test_missing_close_reported() {
        let err = resolve_columns(&record(&["timestamp", "open", "high", "low", "volume"])).unwrap_err();
        match err {
            AppError::CsvValidation(msg) => assert!(msg.contains("'close'")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
