use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::warn;

use crate::dataset::{Cell, TableRow, appearance_from_row, matches_from_row};
use crate::records::{AppearanceRecord, MatchRecord};

pub fn read_appearances(path: &Path) -> Result<Vec<AppearanceRecord>> {
    let rows = read_rows(path)?;
    let total = rows.len();
    let mut out = Vec::with_capacity(total);
    for row in &rows {
        if let Some(rec) = appearance_from_row(row)
            .with_context(|| format!("decode appearances {}", path.display()))?
        {
            out.push(rec);
        }
    }
    if out.len() < total {
        warn!(
            dropped = total - out.len(),
            path = %path.display(),
            "appearances without a goal difference dropped"
        );
    }
    Ok(out)
}

pub fn read_matches(path: &Path) -> Result<Vec<MatchRecord>> {
    let mut out = Vec::new();
    for row in &read_rows(path)? {
        out.extend(
            matches_from_row(row).with_context(|| format!("decode matches {}", path.display()))?,
        );
    }
    Ok(out)
}

fn read_rows(path: &Path) -> Result<Vec<TableRow>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("open parquet reader {}", path.display()))?;
    let iter = reader
        .get_row_iter(None)
        .with_context(|| format!("iterate rows {}", path.display()))?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        out.push(
            row.get_column_iter()
                .map(|(name, field)| (name.clone(), field_to_cell(field)))
                .collect::<TableRow>(),
        );
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "unreadable parquet rows skipped");
    }
    Ok(out)
}

fn field_to_cell(field: &Field) -> Cell {
    match field {
        Field::Bool(v) => Cell::Int(i64::from(*v)),
        Field::Byte(v) => Cell::Int(i64::from(*v)),
        Field::Short(v) => Cell::Int(i64::from(*v)),
        Field::Int(v) => Cell::Int(i64::from(*v)),
        Field::Long(v) => Cell::Int(*v),
        Field::UByte(v) => Cell::Int(i64::from(*v)),
        Field::UShort(v) => Cell::Int(i64::from(*v)),
        Field::UInt(v) => Cell::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).map(Cell::Int).unwrap_or(Cell::Null),
        Field::Float(v) => float_cell(f64::from(*v)),
        Field::Double(v) => float_cell(*v),
        Field::Str(v) => Cell::Text(v.clone()),
        _ => Cell::Null,
    }
}

// Pandas writes missing integers as NaN doubles.
fn float_cell(v: f64) -> Cell {
    if v.is_nan() { Cell::Null } else { Cell::Float(v) }
}
