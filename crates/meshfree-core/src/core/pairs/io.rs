use super::list::{LongRangePairs, PairId, PairsError};
use std::path::Path;
use thiserror::Error;

const ID_COLUMN: &str = "id";
const FIRST_COLUMN: &str = "first";
const SECOND_COLUMN: &str = "second";
const ENGAGED_COLUMN: &str = "engaged";

#[derive(Debug, Error)]
pub enum PairsIoError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Malformed pair file '{path}' at record {record}: {reason}")]
    Malformed {
        path: String,
        record: usize,
        reason: String,
    },
    #[error("Invalid pair data in '{path}': {source}")]
    Pairs { path: String, source: PairsError },
}

/// Writes a pair list as CSV.
///
/// Columns are `id,first,second`, one column per payload in declaration order,
/// then `engaged` when the list carries hysteresis.
pub fn write_csv(pairs: &LongRangePairs, path: &Path) -> Result<(), PairsIoError> {
    let csv_error = |source| PairsIoError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    let mut header = vec![ID_COLUMN, FIRST_COLUMN, SECOND_COLUMN];
    header.extend(pairs.payload_names().iter().map(String::as_str));
    if pairs.has_hysteresis() {
        header.push(ENGAGED_COLUMN);
    }
    writer.write_record(&header).map_err(csv_error)?;

    for pair in pairs.iter() {
        let mut record = vec![
            pair.id.0.to_string(),
            pair.first.to_string(),
            pair.second.to_string(),
        ];
        for name in pairs.payload_names() {
            let column = pairs.payload(name).map_err(|source| PairsIoError::Pairs {
                path: path.to_string_lossy().to_string(),
                source,
            })?;
            record.push(column[pair.index].to_string());
        }
        if let Some(hysteron) = pair.hysteron {
            record.push(u8::from(hysteron.is_engaged()).to_string());
        }
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| csv_error(csv::Error::from(e)))
}

/// Reads a pair list written by [`write_csv`].
///
/// Payload columns are taken from the header. When `hysteresis` thresholds are
/// given, the `engaged` column (if present) restores each hysteron's state.
pub fn read_csv(
    name: &str,
    path: &Path,
    hysteresis: Option<(f64, f64)>,
) -> Result<LongRangePairs, PairsIoError> {
    let display = path.to_string_lossy().to_string();
    let csv_error = |source| PairsIoError::Csv {
        path: display.clone(),
        source,
    };
    let pairs_error = |source| PairsIoError::Pairs {
        path: display.clone(),
        source,
    };
    let malformed = |record: usize, reason: String| PairsIoError::Malformed {
        path: display.clone(),
        record,
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns: Vec<&str> = headers.iter().collect();
    if columns.len() < 3 || columns[..3] != [ID_COLUMN, FIRST_COLUMN, SECOND_COLUMN] {
        return Err(malformed(
            0,
            format!("header must start with '{ID_COLUMN},{FIRST_COLUMN},{SECOND_COLUMN}'"),
        ));
    }
    let has_engaged = columns.last() == Some(&ENGAGED_COLUMN);
    let payload_end = if has_engaged {
        columns.len() - 1
    } else {
        columns.len()
    };
    let payload_names = &columns[3..payload_end];

    let mut pairs = LongRangePairs::new(name, payload_names).map_err(pairs_error)?;
    if let Some((alpha, beta)) = hysteresis {
        pairs = pairs.with_hysteresis(alpha, beta).map_err(pairs_error)?;
    }

    for (number, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let record_number = number + 1;
        let field = |column: usize| {
            record
                .get(column)
                .ok_or_else(|| malformed(record_number, format!("missing column {column}")))
        };
        let integer = |column: usize| -> Result<u64, PairsIoError> {
            let text = field(column)?;
            text.trim()
                .parse::<u64>()
                .map_err(|e| malformed(record_number, format!("'{text}': {e}")))
        };

        let id = PairId(integer(0)?);
        let first = integer(1)? as usize;
        let second = integer(2)? as usize;
        let mut payload = Vec::with_capacity(payload_names.len());
        for column in 3..payload_end {
            let text = field(column)?;
            let value = text
                .trim()
                .parse::<f64>()
                .map_err(|e| malformed(record_number, format!("'{text}': {e}")))?;
            payload.push(value);
        }
        let engaged = has_engaged && integer(payload_end)? != 0;

        pairs
            .insert(id, first, second, &payload, engaged)
            .map_err(pairs_error)?;
    }
    Ok(pairs)
}
