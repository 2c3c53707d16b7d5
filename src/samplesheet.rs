//src/samplesheet.rs

use std::io::{BufRead, Read};
use std::path::Path;

use ahash::AHashSet;

use crate::error::{Error, Result};
use crate::table::{open_text, write_atomically};

pub const SAMPLE_COLUMN: &str = "sample";
pub const KRAKEN2_COLUMN: &str = "kraken2";
pub const CENTRIFUGE_COLUMN: &str = "centrifuge";

/// Extensions accepted for the classifier report paths.
pub const VALID_FORMATS: [&str; 1] = [".tsv"];

/// Tab when the header line has one, comma otherwise.
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// A validated samplesheet; rows are kept in input order with sanitized
/// sample names.
#[derive(Debug, Clone, PartialEq)]
pub struct Samplesheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

struct RowChecker<'a> {
    path: &'a Path,
    sample: usize,
    kraken2: usize,
    centrifuge: usize,
    seen: AHashSet<(String, String, String)>,
}

impl RowChecker<'_> {
    fn tsv_path(&self, line: usize, value: &str, what: &str) -> Result<()> {
        if value.is_empty() {
            return Err(Error::malformed(
                self.path,
                line,
                format!("The {what} tsv file is required."),
            ));
        }
        if !VALID_FORMATS.iter().any(|ext| value.ends_with(ext)) {
            return Err(Error::malformed(
                self.path,
                line,
                format!(
                    "The tsv file has an unrecognized extension: {value}. It should be: {}.",
                    VALID_FORMATS.join(", ")
                ),
            ));
        }
        Ok(())
    }

    fn validate(&mut self, line: usize, row: &mut [String]) -> Result<()> {
        if row[self.sample].is_empty() {
            return Err(Error::malformed(self.path, line, "Sample input is required."));
        }
        row[self.sample] = row[self.sample].replace(' ', "_");
        self.tsv_path(line, &row[self.kraken2], "kraken2")?;
        self.tsv_path(line, &row[self.centrifuge], "centrifuge")?;

        let key = (
            row[self.sample].clone(),
            row[self.kraken2].clone(),
            row[self.centrifuge].clone(),
        );
        if !self.seen.insert(key) {
            return Err(Error::malformed(
                self.path,
                line,
                "The sample name and all tsv file names must be unique in comparison to the other rows.",
            ));
        }
        Ok(())
    }
}

/// Reads and validates a CSV or TSV samplesheet.
pub fn read_samplesheet<P: AsRef<Path>>(path: P) -> Result<Samplesheet> {
    let path = path.as_ref();
    let mut reader = open_text(path)?;
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    if first_line.trim().is_empty() {
        return Err(Error::malformed(
            path,
            1,
            "The given sample sheet does not appear to contain a header.",
        ));
    }
    let delimiter = detect_delimiter(&first_line);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(first_line.as_bytes().chain(reader));

    let header: Vec<String> = rdr.headers()?.iter().map(|s| s.trim().to_string()).collect();
    let find = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::missing_column(path, name))
    };
    let mut checker = RowChecker {
        path,
        sample: find(SAMPLE_COLUMN)?,
        kraken2: find(KRAKEN2_COLUMN)?,
        centrifuge: find(CENTRIFUGE_COLUMN)?,
        seen: AHashSet::new(),
    };

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        if record.len() != header.len() {
            return Err(Error::malformed(
                path,
                line,
                format!("Expected {} fields but found {}.", header.len(), record.len()),
            ));
        }
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        checker.validate(line, &mut row)?;
        rows.push(row);
    }
    log::info!("{} samples validated in {}", rows.len(), path.display());
    Ok(Samplesheet { header, rows })
}

/// Validates `input` and writes the sanitized sheet to `output` as CSV.
/// A missing input exits with status 2.
pub fn check_samplesheet<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let input = input.as_ref();
    if !input.is_file() {
        return Err(Error::MissingSecondaryInputFile(input.to_path_buf()));
    }
    let sheet = read_samplesheet(input)?;
    write_atomically(output, |w| {
        let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_writer(w);
        wtr.write_record(&sheet.header)?;
        for row in &sheet.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    })?;
    Ok(sheet.rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn tab_and_comma_sheets_produce_the_same_csv() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = sheet(
            &dir,
            "sheet.tsv",
            "sample\tkraken2\tcentrifuge\nSAMPLE 1\ts1_k.tsv\ts1_c.tsv\nSAMPLE2\ts2_k.tsv\ts2_c.tsv\n",
        );
        let csv_in = sheet(
            &dir,
            "sheet.csv",
            "sample,kraken2,centrifuge\nSAMPLE 1,s1_k.tsv,s1_c.tsv\nSAMPLE2,s2_k.tsv,s2_c.tsv\n",
        );
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        assert_eq!(check_samplesheet(&tsv, &a).unwrap(), 2);
        check_samplesheet(&csv_in, &b).unwrap();
        let expected = "sample,kraken2,centrifuge\nSAMPLE_1,s1_k.tsv,s1_c.tsv\nSAMPLE2,s2_k.tsv,s2_c.tsv\n";
        assert_eq!(std::fs::read_to_string(a).unwrap(), expected);
        assert_eq!(std::fs::read_to_string(b).unwrap(), expected);
    }

    #[test]
    fn wrong_extension_reports_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = sheet(
            &dir,
            "sheet.csv",
            "sample,kraken2,centrifuge\nS1,s1_k.tsv,s1_c.tsv\nS2,s2_k.txt,s2_c.tsv\n",
        );
        match read_samplesheet(&path).unwrap_err() {
            Error::MalformedRow { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("s2_k.txt"));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn empty_fields_and_duplicates_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let empty = sheet(&dir, "empty.csv", "sample,kraken2,centrifuge\n,a.tsv,b.tsv\n");
        assert_eq!(read_samplesheet(&empty).unwrap_err().exit_code(), 8);

        let dup = sheet(
            &dir,
            "dup.csv",
            "sample,kraken2,centrifuge\nS 1,a.tsv,b.tsv\nS_1,a.tsv,b.tsv\n",
        );
        match read_samplesheet(&dup).unwrap_err() {
            Error::MalformedRow { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn missing_header_column_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = sheet(&dir, "sheet.csv", "sample,kraken2\nS1,a.tsv\n");
        match read_samplesheet(&path).unwrap_err() {
            Error::MissingRequiredColumn { column, .. } => assert_eq!(column, "centrifuge"),
            other => panic!("unexpected {other}"),
        }

        let err = check_samplesheet(dir.path().join("nope.csv"), dir.path().join("out.csv"))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn extra_columns_are_carried_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = sheet(
            &dir,
            "sheet.csv",
            "sample,kraken2,centrifuge,note\nS1,a.tsv,b.tsv,first run\n",
        );
        let parsed = read_samplesheet(&path).unwrap();
        assert_eq!(parsed.header[3], "note");
        assert_eq!(parsed.rows[0][3], "first run");
    }
}
