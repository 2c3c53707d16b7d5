//src/unify.rs

use std::io::Write;
use std::path::Path;

use ahash::AHashMap;

use crate::error::{require_file, Error, Result};
use crate::ground_truth::{check_types, GroundTruthRecord};
use crate::schema::{
    Classifier, CAMI_PERCENTAGE, CAMI_RANK, CAMI_TAXID, CAMI_TAXPATH, CAMI_TAXPATHSN, CLASSIFIER,
    LINE_NUMBER, READS_COUNT, RPM, TAXID, TAXONOMIC_RANK, TAXON_NAME, UNIFIED_COLUMNS,
};
use crate::table::{format_float, write_atomically, Table};

/// One row of the unified table. Fields a classifier does not report are
/// `None` for its rows, as are the lineage fields of rows the ground-truth
/// join did not match.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedRecord {
    pub taxon_name: String,
    pub rpm: f64,
    pub taxid: String,
    pub taxonomic_rank: Option<String>,
    pub classifier: Classifier,
    pub centrifuge_genome_size: Option<u64>,
    pub centrifuge_num_reads: Option<u64>,
    pub centrifuge_abundance: Option<f64>,
    pub kaiju_percent: Option<f64>,
    pub kraken2_percentage_fragments_covered: Option<f64>,
    pub kraken2_num_fragments_covered: Option<u64>,
    pub reads_count: u64,
    pub lineage: Option<GroundTruthRecord>,
}

impl UnifiedRecord {
    /// Cells in [`UNIFIED_COLUMNS`] order; nulls are empty strings.
    pub fn cells(&self) -> Vec<String> {
        fn int(v: Option<u64>) -> String {
            v.map(|n| n.to_string()).unwrap_or_default()
        }
        fn float(v: Option<f64>) -> String {
            v.map(format_float).unwrap_or_default()
        }

        let mut cells = vec![
            self.taxon_name.clone(),
            format_float(self.rpm),
            self.taxid.clone(),
            self.taxonomic_rank.clone().unwrap_or_default(),
            self.classifier.to_string(),
            int(self.centrifuge_genome_size),
            int(self.centrifuge_num_reads),
            float(self.centrifuge_abundance),
            float(self.kaiju_percent),
            float(self.kraken2_percentage_fragments_covered),
            int(self.kraken2_num_fragments_covered),
            self.reads_count.to_string(),
        ];
        match &self.lineage {
            Some(lineage) => cells.extend(lineage.cells()),
            None => cells.extend(std::iter::repeat(String::new()).take(5)),
        }
        cells
    }
}

/// Name -> position lookup over a header, with typed cell accessors that
/// report the offending line on failure.
struct Row<'a> {
    index: &'a AHashMap<&'a str, usize>,
    cells: &'a [String],
    source: &'a Path,
    line: usize,
}

impl<'a> Row<'a> {
    fn text(&self, column: &str) -> Option<&'a str> {
        self.index
            .get(column)
            .map(|&i| self.cells[i].as_str())
            .filter(|cell| !cell.is_empty())
    }

    fn required(&self, column: &str) -> Result<&'a str> {
        self.text(column).ok_or_else(|| {
            Error::malformed(self.source, self.line, format!("Column '{column}' is empty."))
        })
    }

    fn int(&self, column: &str) -> Result<Option<u64>> {
        self.text(column)
            .map(|cell| {
                cell.parse::<u64>().map_err(|_| {
                    Error::malformed(
                        self.source,
                        self.line,
                        format!("'{cell}' in column '{column}' is not an integer."),
                    )
                })
            })
            .transpose()
    }

    fn float(&self, column: &str) -> Result<Option<f64>> {
        self.text(column)
            .map(|cell| {
                cell.parse::<f64>().map_err(|_| {
                    Error::malformed(
                        self.source,
                        self.line,
                        format!("'{cell}' in column '{column}' is not a number."),
                    )
                })
            })
            .transpose()
    }

    fn record(&self, classifier: Classifier) -> Result<UnifiedRecord> {
        let rpm = self.float(RPM)?.ok_or_else(|| {
            Error::malformed(self.source, self.line, format!("Column '{RPM}' is empty."))
        })?;
        if rpm < 0.0 {
            return Err(Error::malformed(
                self.source,
                self.line,
                format!("Negative {RPM} value {rpm}."),
            ));
        }
        let reads_count = self.int(READS_COUNT)?.ok_or_else(|| {
            Error::malformed(self.source, self.line, format!("Column '{READS_COUNT}' is empty."))
        })?;

        let lineage = match self.text(CAMI_TAXID) {
            Some(taxid) => Some(GroundTruthRecord {
                taxid: taxid.to_string(),
                rank: self.text(CAMI_RANK).unwrap_or_default().to_string(),
                taxpath: self.text(CAMI_TAXPATH).unwrap_or_default().to_string(),
                taxpathsn: self.text(CAMI_TAXPATHSN).unwrap_or_default().to_string(),
                percentage: self.float(CAMI_PERCENTAGE)?,
            }),
            None => None,
        };

        Ok(UnifiedRecord {
            taxon_name: self.text(TAXON_NAME).unwrap_or_default().to_string(),
            rpm,
            taxid: self.required(TAXID)?.to_string(),
            taxonomic_rank: self.text(TAXONOMIC_RANK).map(str::to_string),
            classifier,
            centrifuge_genome_size: self.int("centrifuge_genome_size")?,
            centrifuge_num_reads: self.int("centrifuge_num_reads")?,
            centrifuge_abundance: self.float("centrifuge_abundance")?,
            kaiju_percent: self.float("kaiju_percent")?,
            kraken2_percentage_fragments_covered: self.float("kraken2_percentage_fragments_covered")?,
            kraken2_num_fragments_covered: self.int("kraken2_num_fragments_covered")?,
            reads_count,
            lineage,
        })
    }
}

fn require_columns(table: &Table, columns: &[&str], source: &Path) -> Result<()> {
    for column in columns {
        table.require_column(column, source)?;
    }
    Ok(())
}

/// Renames one classifier's table into the canonical schema and converts its
/// rows. kaiju's `file` column is dropped.
pub fn records_from_table(mut table: Table, classifier: Classifier, source: &Path) -> Result<Vec<UnifiedRecord>> {
    check_types(&table, classifier, source)?;
    let schema = classifier.schema();

    if table.columns.first().map(String::as_str) == Some(LINE_NUMBER) {
        table.drop_column(LINE_NUMBER);
    }
    for column in schema.dropped {
        if table.drop_column(column) {
            log::info!("Dropping {classifier} '{column}' column");
        }
    }
    log::info!("Renaming {classifier} table columns");
    for column in &mut table.columns {
        *column = schema.canonical_name(column).to_string();
    }
    require_columns(&table, &[TAXON_NAME, RPM, TAXID, READS_COUNT], source)?;

    let index: AHashMap<&str, usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, cells)| {
            Row {
                index: &index,
                cells,
                source,
                line: i + 2,
            }
            .record(classifier)
        })
        .collect()
}

/// Sorts by abundance descending, ties by taxon id ascending. The sort is
/// stable, so fully tied rows keep their fan-in order.
pub fn sort_records(records: &mut [UnifiedRecord]) {
    records.sort_by(|a, b| b.rpm.total_cmp(&a.rpm).then_with(|| a.taxid.cmp(&b.taxid)));
}

/// Concatenates the per-classifier records and sorts the union.
pub fn unify(per_classifier: Vec<Vec<UnifiedRecord>>) -> Vec<UnifiedRecord> {
    let mut all: Vec<UnifiedRecord> = per_classifier.into_iter().flatten().collect();
    sort_records(&mut all);
    all
}

pub fn write_records<W: Write + ?Sized>(records: &[UnifiedRecord], out: &mut W) -> Result<()> {
    let mut table = Table::new(UNIFIED_COLUMNS.iter().map(|c| c.to_string()).collect());
    table.rows = records.iter().map(UnifiedRecord::cells).collect();
    table.write_to(out)
}

/// Writes the unified table, all-or-nothing.
pub fn write_unified<P: AsRef<Path>>(records: &[UnifiedRecord], path: P) -> Result<()> {
    write_atomically(path, |w| write_records(records, w))
}

/// Reads a table previously written by [`write_unified`].
pub fn read_unified<P: AsRef<Path>>(path: P) -> Result<Vec<UnifiedRecord>> {
    let path = path.as_ref();
    let table = Table::read_tsv(path)?;
    require_columns(&table, &[TAXON_NAME, RPM, TAXID, CLASSIFIER, READS_COUNT], path)?;
    let index: AHashMap<&str, usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, cells) in table.rows.iter().enumerate() {
        let row = Row {
            index: &index,
            cells,
            source: path,
            line: i + 2,
        };
        let classifier: Classifier = row
            .required(CLASSIFIER)?
            .parse()
            .map_err(|e: String| Error::malformed(path, i + 2, e))?;
        records.push(row.record(classifier)?);
    }
    Ok(records)
}

/// Reads the three classifier tables, unifies them and writes the result.
/// Returns the number of rows written.
pub fn unify_files<P: AsRef<Path>>(kaiju: P, kraken2: P, centrifuge: P, output: P) -> Result<usize> {
    let inputs = [
        (Classifier::Kaiju, kaiju.as_ref()),
        (Classifier::Kraken2, kraken2.as_ref()),
        (Classifier::Centrifuge, centrifuge.as_ref()),
    ];
    for (_, path) in &inputs {
        require_file(path)?;
    }

    let mut per_classifier = Vec::with_capacity(inputs.len());
    for (classifier, path) in inputs {
        log::info!("Reading {classifier} tsv file into a table");
        let table = Table::read_tsv(path)?;
        let records = records_from_table(table, classifier, path)?;
        log::debug!("{} rows from {classifier}", records.len());
        per_classifier.push(records);
    }
    let unified = unify(per_classifier);
    write_unified(&unified, output)?;
    Ok(unified.len())
}
