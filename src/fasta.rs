//src/fasta.rs

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::table::open_text;

/// Line width used when writing sequences.
pub const LINE_WIDTH: usize = 60;

/// One FASTA entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    /// Header text up to the first whitespace
    pub id: String,
    /// Whole header line without the leading '>' (the id included)
    pub description: String,
    pub seq: String,
}

impl SequenceRecord {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Minimal multi-line FASTA reader that also supports .gz
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> io::Result<Vec<SequenceRecord>> {
    let mut reader = open_text(path)?;

    let mut records: Vec<SequenceRecord> = Vec::new();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let trimmed = line.trim_end();
        if let Some(header) = trimmed.strip_prefix('>') {
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            records.push(SequenceRecord {
                id,
                description: header.to_string(),
                seq: String::new(),
            });
        } else if let Some(current) = records.last_mut() {
            current.seq.extend(trimmed.chars().filter(|c| !c.is_whitespace()));
        }
        // sequence text before the first header is ignored
    }

    Ok(records)
}

/// Writes one record, wrapping the sequence at [`LINE_WIDTH`].
pub fn write_fasta_record<W: Write + ?Sized>(record: &SequenceRecord, out: &mut W) -> io::Result<()> {
    writeln!(out, ">{}", record.description)?;
    let bytes = record.seq.as_bytes();
    for chunk in bytes.chunks(LINE_WIDTH) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
