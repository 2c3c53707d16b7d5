//src/taxdb.rs

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::process::run_with_timeout;

pub type NameMap = AHashMap<String, String>;

/// Seconds a single lookup call may run.
pub const LOOKUP_TIMEOUT_SECS: u64 = 180;

/// Resolved taxonomy of one taxon id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineageEntry {
    pub taxid: String,
    /// `(rank, name)` from the root down to the taxon itself
    pub chain: Vec<(String, String)>,
    /// Rank of the taxon itself
    pub rank: String,
    pub name: String,
}

impl LineageEntry {
    /// Whether any level of the lineage is named `name`.
    pub fn has_ancestor(&self, name: &str) -> bool {
        self.chain.iter().any(|(_, n)| n == name)
    }
}

/// Source of taxon names and lineages.
pub trait TaxonomyLookup {
    /// Scientific name per taxon id (ids the database does not know are absent).
    fn names(&self, taxids: &[String]) -> Result<NameMap>;

    /// Lineage, terminal rank and name per taxon id.
    fn lineages(&self, taxids: &[String]) -> Result<Vec<LineageEntry>>;
}

#[derive(Debug, Clone)]
pub struct TaxonkitConfig {
    pub binary: PathBuf,
    /// NCBI taxdump directory handed to `--data-dir`
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for TaxonkitConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("taxonkit"),
            data_dir: PathBuf::from("../temp/taxdump"),
            timeout: Duration::from_secs(LOOKUP_TIMEOUT_SECS),
        }
    }
}

/// [`TaxonomyLookup`] running the `taxonkit` executable.
pub struct Taxonkit {
    config: TaxonkitConfig,
}

impl Taxonkit {
    pub fn new(config: TaxonkitConfig) -> Self {
        Self { config }
    }

    /// Writes the ids to a scratch file and runs `taxonkit lineage` on it.
    /// Empty output is an error just like a failed run.
    fn run(&self, taxids: &[String], no_lineage: bool, show_name: bool) -> Result<String> {
        let mut ids_file = tempfile::Builder::new()
            .prefix("taxids")
            .suffix(".txt")
            .tempfile()?;
        for taxid in taxids {
            writeln!(ids_file, "{taxid}")?;
        }
        ids_file.flush()?;
        let key = ids_file.path().display().to_string();

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("lineage")
            .arg(ids_file.path())
            .arg("--data-dir")
            .arg(&self.config.data_dir)
            .arg("--show-rank");
        if no_lineage {
            cmd.arg("--no-lineage");
        } else {
            cmd.arg("--show-lineage-ranks");
        }
        if show_name {
            cmd.arg("--show-name");
        }

        let stdout = run_with_timeout(&mut cmd, &key, self.config.timeout)?;
        if stdout.trim().is_empty() {
            return Err(Error::LookupEmptyResult {
                program: self.config.binary.display().to_string(),
                key,
            });
        }
        Ok(stdout)
    }
}

impl TaxonomyLookup for Taxonkit {
    fn names(&self, taxids: &[String]) -> Result<NameMap> {
        let stdout = self.run(taxids, true, true)?;
        Ok(parse_name_rows(&stdout))
    }

    fn lineages(&self, taxids: &[String]) -> Result<Vec<LineageEntry>> {
        let stdout = self.run(taxids, false, true)?;
        Ok(parse_lineage_rows(&stdout))
    }
}

/// Parses `taxid \t name \t rank` rows.
pub fn parse_name_rows(stdout: &str) -> NameMap {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let taxid = fields.next()?.trim();
            let name = fields.next()?.trim();
            if taxid.is_empty() || name.is_empty() {
                None
            } else {
                Some((taxid.to_string(), name.to_string()))
            }
        })
        .collect()
}

/// Parses rows holding taxid, `;`-separated lineage, `;`-separated lineage
/// ranks, name and rank. The lineage-ranks column is located from the data
/// (the last lineage rank is always the taxon's own rank), so both
/// `taxid lineage ranks name rank` and `taxid lineage name rank ranks`
/// layouts are accepted. Rows of unknown taxids come back with an empty chain.
pub fn parse_lineage_rows(stdout: &str) -> Vec<LineageEntry> {
    let mut entries = Vec::new();
    for line in stdout.lines().filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let taxid = fields[0];
        if taxid.is_empty() {
            continue;
        }
        let get = |i: usize| fields.get(i).copied().unwrap_or("");
        let lineage = get(1);
        let names: Vec<&str> = lineage.split(';').filter(|s| !s.is_empty()).collect();

        let (ranks_col, name, rank) = if fields.len() >= 5 {
            let last_rank = |col: &str| col.rsplit(';').next().unwrap_or("").to_string();
            if last_rank(get(4)) == get(3) && names.last().copied().unwrap_or("") == get(2) {
                (get(4), get(2), get(3))
            } else {
                (get(2), get(3), get(4))
            }
        } else {
            ("", get(2), get(3))
        };

        let ranks: Vec<&str> = ranks_col.split(';').filter(|s| !s.is_empty()).collect();
        let chain = names
            .iter()
            .enumerate()
            .map(|(i, n)| (ranks.get(i).copied().unwrap_or("").to_string(), n.to_string()))
            .collect();

        entries.push(LineageEntry {
            taxid: taxid.to_string(),
            chain,
            rank: rank.to_string(),
            name: name.to_string(),
        });
    }
    entries
}
