//src/metadata.rs

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{require_file, Result};
use crate::table::Table;

pub const PAIRING_COLUMN: &str = "pairing";
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";

/// Read layout of the sequenced sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    SingleEnd,
    PairedEnd,
}

impl Pairing {
    pub fn as_str(self) -> &'static str {
        match self {
            Pairing::SingleEnd => "single_end",
            Pairing::PairedEnd => "paired_end",
        }
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pairing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single_end" => Ok(Pairing::SingleEnd),
            "paired_end" => Ok(Pairing::PairedEnd),
            other => Err(format!(
                "unknown pairing '{other}', expected single_end or paired_end"
            )),
        }
    }
}

/// Appends constant `pairing` and `sample_name` columns to a table.
pub fn tag_table(table: &mut Table, pairing: Pairing, sample_name: &str) {
    table.push_constant_column(PAIRING_COLUMN, pairing.as_str());
    table.push_constant_column(SAMPLE_NAME_COLUMN, sample_name);
}

/// File form of [`tag_table`]; returns the number of rows written.
pub fn add_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    pairing: Pairing,
    sample_name: &str,
) -> Result<usize> {
    let input = input.as_ref();
    require_file(input)?;
    let mut table = Table::read_tsv(input)?;
    tag_table(&mut table, pairing, sample_name);
    table.write_tsv(output)?;
    log::info!(
        "Tagged {} rows of {} with {pairing}/{sample_name}",
        table.len(),
        input.display()
    );
    Ok(table.len())
}
