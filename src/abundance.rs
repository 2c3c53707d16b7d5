//src/abundance.rs

use std::path::Path;

use crate::error::{require_file, Error, Result};
use crate::schema::{LINE_NUMBER, READS_COUNT, RPM_RAW};
use crate::table::{write_atomically, Table};

/// Options of one normalization run.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// 0-based index of the supporting-reads column
    pub reads_column: usize,
    /// Replacement for every column header, in order
    pub column_names: Option<Vec<String>>,
    /// Column that has to stay text (e.g. kaiju's `taxon_id`)
    pub string_column: Option<String>,
    /// Rows whose metric is below this value are dropped
    pub threshold: f64,
}

/// Parses a supporting-read count. Integral floats such as `12.0` are accepted
/// because some classifiers print counts that way.
pub fn parse_read_count(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if let Ok(n) = cell.parse::<u64>() {
        return Some(n);
    }
    let f = cell.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// `total / 1e6`
pub fn rpm_factor(total: u64) -> f64 {
    total as f64 / 1_000_000.0
}

/// The normalizer's metric: `reads * factor` rounded to one decimal.
///
/// With `factor` from [`rpm_factor`] this is `reads * (total / 1e6)`, which
/// is not the usual reads-per-million. The downstream tables were produced
/// with this formula, so it must not be replaced by the kraken one.
pub fn scaled_abundance(reads: u64, factor: f64) -> f64 {
    round_one_decimal(reads as f64 * factor)
}

/// Conventional kraken-style reads per million, `reads * 1e6 / total`.
/// Zero when the total is zero. No stage uses it; it is kept only as the
/// reference for the formula the kraken reports were made with.
#[cfg_attr(not(test), allow(dead_code))]
pub(crate) fn kraken_reads_per_million(reads: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        reads as f64 * 1_000_000.0 / total as f64
    }
}

fn round_one_decimal(value: f64) -> f64 {
    // Decimal formatting rounds on the exact binary value, same as the tables
    // this crate has to stay compatible with.
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Normalizes an in-memory table. `source` is only used in error messages.
pub fn normalize_table(mut table: Table, options: &NormalizeOptions, source: &Path) -> Result<Table> {
    let reads_idx = options.reads_column;
    if reads_idx >= table.columns.len() {
        return Err(Error::malformed(
            source,
            1,
            format!(
                "Reads column index {reads_idx} is out of range for {} columns.",
                table.columns.len()
            ),
        ));
    }

    if let Some(string_col) = &options.string_column {
        let idx = table.require_column(string_col, source)?;
        if idx == reads_idx {
            return Err(Error::malformed(
                source,
                1,
                format!("Column '{string_col}' cannot be both the reads column and a string column."),
            ));
        }
    }

    // Cast the reads column to integers
    let mut reads = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter_mut().enumerate() {
        let count = parse_read_count(&row[reads_idx]).ok_or_else(|| {
            Error::malformed(
                source,
                i + 2,
                format!("'{}' is not a supporting-read count.", row[reads_idx]),
            )
        })?;
        row[reads_idx] = count.to_string();
        reads.push(count);
    }

    match &options.column_names {
        Some(names) => {
            if names.len() != table.columns.len() {
                return Err(Error::malformed(
                    source,
                    1,
                    format!(
                        "{} column names were given for a table with {} columns.",
                        names.len(),
                        table.columns.len()
                    ),
                ));
            }
            table.columns = names.clone();
        }
        None => table.columns[reads_idx] = READS_COUNT.to_string(),
    }

    if table.column_index(LINE_NUMBER).is_some() {
        return Err(Error::malformed(
            source,
            1,
            format!("A data column is named '{LINE_NUMBER}', which is reserved for the row index."),
        ));
    }

    let total = reads
        .iter()
        .try_fold(0u64, |acc, &n| acc.checked_add(n))
        .ok_or_else(|| {
            Error::malformed(
                source,
                1,
                format!("The sum of column {reads_idx} does not fit in 64 bits."),
            )
        })?;
    log::info!("The sum of the given column is: {total}");
    let factor = rpm_factor(total);

    let rpm_idx = match table.column_index(RPM_RAW) {
        Some(i) => i,
        None => {
            table.columns.push(RPM_RAW.to_string());
            for row in &mut table.rows {
                row.push(String::new());
            }
            table.columns.len() - 1
        }
    };

    let before = table.rows.len();
    let mut kept = Vec::with_capacity(before);
    for (mut row, count) in table.rows.into_iter().zip(reads) {
        let metric = scaled_abundance(count, factor);
        if metric >= options.threshold {
            row[rpm_idx] = format!("{metric:.1}");
            kept.push(row);
        }
    }
    log::info!(
        "Kept {} of {} rows with {RPM_RAW} >= {}",
        kept.len(),
        before,
        options.threshold
    );

    // Fresh sequential index in front
    let mut columns = Vec::with_capacity(table.columns.len() + 1);
    columns.push(LINE_NUMBER.to_string());
    columns.extend(table.columns);
    let rows = kept
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut indexed = Vec::with_capacity(row.len() + 1);
            indexed.push(i.to_string());
            indexed.extend(row);
            indexed
        })
        .collect();

    Ok(Table { columns, rows })
}

/// Reads `input`, normalizes it and writes the result to `output`.
/// Returns the number of rows written.
pub fn normalize_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &NormalizeOptions,
) -> Result<usize> {
    let input = input.as_ref();
    require_file(input)?;
    let table = Table::read_tsv(input)?;
    let normalized = normalize_table(table, options, input)?;
    write_atomically(output, |w| normalized.write_to(w))?;
    Ok(normalized.len())
}

/// Output name used when none is given: `<dir>/<stem>.filtered.tsv`.
pub fn default_output_path(input: &Path) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}.filtered.tsv"))
}
