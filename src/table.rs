//src/table.rs

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// An in-memory tab-delimited table. Every cell is kept as text so that
/// numeric-looking taxon ids survive untouched; an empty cell is a null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Opens a text file, transparently decompressing it when the name ends in `.gz`.
pub(crate) fn open_text<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;
    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    Ok(if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    })
}

/// Writes `path` through a temporary sibling file that is renamed into place
/// only once `fill` succeeded, so a failing stage leaves no partial output.
pub(crate) fn write_atomically<P, F>(path: P, fill: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Reads a tab-delimited table with a header row.
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_tsv_skipping(path, 0)
    }

    /// Reads a tab-delimited table after discarding `skip_lines` leading lines
    /// (the CAMI profile carries four of them before its header).
    pub fn read_tsv_skipping<P: AsRef<Path>>(path: P, skip_lines: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = open_text(path)?;
        let mut line = String::new();
        for _ in 0..skip_lines {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
        }

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(Error::malformed(path, skip_lines + 1, "The table has no header row."));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            if record.len() != columns.len() {
                let line = record.position().map(|p| p.line() as usize).unwrap_or(0) + skip_lines;
                return Err(Error::malformed(
                    path,
                    line,
                    format!(
                        "Expected {} fields but found {}.",
                        columns.len(),
                        record.len()
                    ),
                ));
            }
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        log::debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(Self { columns, rows })
    }

    /// Serializes the table as tab-delimited text.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(out);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomically(path, |w| self.write_to(w))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`Table::column_index`] but missing columns are fatal.
    pub fn require_column(&self, name: &str, source: &Path) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::missing_column(source, name))
    }

    /// Renames `from` to `to`; returns whether the column existed.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(i) => {
                self.columns[i] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a column and its cells; returns whether the column existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(i) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(i);
        for row in &mut self.rows {
            row.remove(i);
        }
        true
    }

    /// Appends a column holding the same value on every row.
    pub fn push_constant_column(&mut self, name: &str, value: &str) {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Formats a float the way the downstream tables expect it: shortest
/// round-trip digits, but always with a fractional part (`5.0`, not `5`).
pub fn format_float(value: f64) -> String {
    let s = format!("{value}");
    if value.is_finite() && !s.contains('.') {
        format!("{s}.0")
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_and_writes_verbatim_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.tsv");
        std::fs::write(&path, "taxid\tname\n00042\tsome \"quoted\" name\n\n7\tx\n").unwrap();

        let table = Table::read_tsv(&path).unwrap();
        assert_eq!(table.columns, vec!["taxid", "name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "00042");

        let out = dir.path().join("out.tsv");
        table.write_tsv(&out).unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "taxid\tname\n00042\tsome \"quoted\" name\n7\tx\n"
        );
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.tsv");
        std::fs::write(&path, "a\tb\n1\t2\n3\n").unwrap();
        let err = Table::read_tsv(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 3, .. }), "{err}");
    }

    #[test]
    fn skips_leading_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.tsv");
        std::fs::write(&path, "#one\n#two\n#three\n\n@@TAXID\tRANK\n10239\tsuperkingdom\n").unwrap();
        let table = Table::read_tsv_skipping(&path, 4).unwrap();
        assert_eq!(table.columns, vec!["@@TAXID", "RANK"]);
        assert_eq!(table.rows, vec![vec!["10239".to_string(), "superkingdom".to_string()]]);
    }

    #[test]
    fn column_edits() {
        let mut table = Table::new(vec!["a".into(), "file".into(), "b".into()]);
        table.rows.push(vec!["1".into(), "x.txt".into(), "2".into()]);
        assert!(table.drop_column("file"));
        assert!(!table.drop_column("file"));
        assert!(table.rename_column("a", "c"));
        table.push_constant_column("classifier", "kaiju");
        assert_eq!(table.columns, vec!["c", "b", "classifier"]);
        assert_eq!(table.rows[0], vec!["1", "2", "kaiju"]);
    }

    #[test]
    fn floats_keep_a_fractional_part() {
        assert_eq!(format_float(5.0), "5.0");
        assert_eq!(format_float(12.3), "12.3");
        assert_eq!(format_float(0.0), "0.0");
    }
}
