//src/schema.rs

use std::fmt;
use std::str::FromStr;

/// Canonical name of the supporting-reads column after normalization.
pub const READS_COUNT: &str = "reads_count";
/// Derived abundance-per-million column written by the normalizer.
pub const RPM_RAW: &str = "RPM";
/// Row index written by the normalizer.
pub const LINE_NUMBER: &str = "line_number";

pub const TAXON_NAME: &str = "taxon_name";
pub const RPM: &str = "rpm";
pub const TAXID: &str = "taxid";
pub const TAXONOMIC_RANK: &str = "taxonomic_rank";
pub const CLASSIFIER: &str = "classifier";

/// Ground-truth columns as they appear in the CAMI profile header (after the
/// `@@` prefix is stripped) and the names they are renamed to.
pub const CAMI_RENAMES: [(&str, &str); 5] = [
    ("TAXID", "cami_taxid"),
    ("RANK", "cami_rank"),
    ("TAXPATH", "cami_taxpath"),
    ("TAXPATHSN", "cami_taxpathsn"),
    ("PERCENTAGE", "cami_percentage"),
];

pub const CAMI_TAXID: &str = "cami_taxid";
pub const CAMI_RANK: &str = "cami_rank";
pub const CAMI_TAXPATH: &str = "cami_taxpath";
pub const CAMI_TAXPATHSN: &str = "cami_taxpathsn";
pub const CAMI_PERCENTAGE: &str = "cami_percentage";

/// Column order of the unified table.
pub const UNIFIED_COLUMNS: [&str; 17] = [
    TAXON_NAME,
    RPM,
    TAXID,
    TAXONOMIC_RANK,
    CLASSIFIER,
    "centrifuge_genome_size",
    "centrifuge_num_reads",
    "centrifuge_abundance",
    "kaiju_percent",
    "kraken2_percentage_fragments_covered",
    "kraken2_num_fragments_covered",
    READS_COUNT,
    CAMI_TAXID,
    CAMI_RANK,
    CAMI_TAXPATH,
    CAMI_TAXPATHSN,
    CAMI_PERCENTAGE,
];

/// How a cell of a given column has to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
}

impl ColumnType {
    /// Empty cells are nulls and always accepted.
    pub fn accepts(self, cell: &str) -> bool {
        if cell.is_empty() {
            return true;
        }
        match self {
            ColumnType::Text => true,
            ColumnType::Integer => cell.parse::<u64>().is_ok(),
            ColumnType::Float => cell.parse::<f64>().is_ok(),
        }
    }
}

/// Per-classifier schema entry. The normalizer, the ground-truth join and
/// the unifier all read renames, cell types and the taxon-id column from here.
#[derive(Debug)]
pub struct ClassifierSchema {
    /// Column holding the taxon id in the classifier's own naming.
    pub taxid_column: &'static str,
    /// Classifier column -> canonical unified column.
    pub renames: &'static [(&'static str, &'static str)],
    /// Expected cell types, keyed by the classifier's own column names.
    pub types: &'static [(&'static str, ColumnType)],
    /// Columns dropped when unifying.
    pub dropped: &'static [&'static str],
}

impl ClassifierSchema {
    pub fn canonical_name<'a>(&self, column: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| *from == column)
            .map(|(_, to)| *to)
            .unwrap_or(column)
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.types
            .iter()
            .chain(CAMI_TYPES.iter())
            .find(|(name, _)| *name == column)
            .map(|(_, t)| *t)
    }
}

const CAMI_TYPES: [(&str, ColumnType); 5] = [
    (CAMI_TAXID, ColumnType::Text),
    (CAMI_RANK, ColumnType::Text),
    (CAMI_TAXPATH, ColumnType::Text),
    (CAMI_TAXPATHSN, ColumnType::Text),
    (CAMI_PERCENTAGE, ColumnType::Float),
];

static KAIJU: ClassifierSchema = ClassifierSchema {
    taxid_column: "taxon_id",
    renames: &[
        ("percent", "kaiju_percent"),
        ("taxon_id", TAXID),
        (RPM_RAW, RPM),
    ],
    types: &[
        (LINE_NUMBER, ColumnType::Integer),
        ("file", ColumnType::Text),
        ("percent", ColumnType::Float),
        (READS_COUNT, ColumnType::Integer),
        ("taxon_id", ColumnType::Text),
        (TAXON_NAME, ColumnType::Text),
        (RPM_RAW, ColumnType::Float),
    ],
    dropped: &["file"],
};

static KRAKEN2: ClassifierSchema = ClassifierSchema {
    taxid_column: TAXID,
    renames: &[
        (
            "percentage_fragments_covered",
            "kraken2_percentage_fragments_covered",
        ),
        ("num_fragments_covered", "kraken2_num_fragments_covered"),
        ("sci_name", TAXON_NAME),
        ("rank_code", TAXONOMIC_RANK),
        (RPM_RAW, RPM),
    ],
    types: &[
        (LINE_NUMBER, ColumnType::Integer),
        ("percentage_fragments_covered", ColumnType::Float),
        ("num_fragments_covered", ColumnType::Integer),
        (READS_COUNT, ColumnType::Integer),
        ("rank_code", ColumnType::Text),
        (TAXID, ColumnType::Text),
        ("sci_name", ColumnType::Text),
        (RPM_RAW, ColumnType::Float),
    ],
    dropped: &[],
};

static CENTRIFUGE: ClassifierSchema = ClassifierSchema {
    taxid_column: "taxID",
    renames: &[
        ("name", TAXON_NAME),
        ("taxID", TAXID),
        ("taxRank", TAXONOMIC_RANK),
        ("genomeSize", "centrifuge_genome_size"),
        ("numReads", "centrifuge_num_reads"),
        ("abundance", "centrifuge_abundance"),
        (RPM_RAW, RPM),
    ],
    types: &[
        (LINE_NUMBER, ColumnType::Integer),
        ("name", ColumnType::Text),
        ("taxID", ColumnType::Text),
        ("taxRank", ColumnType::Text),
        ("genomeSize", ColumnType::Integer),
        ("numReads", ColumnType::Integer),
        (READS_COUNT, ColumnType::Integer),
        ("abundance", ColumnType::Float),
        (RPM_RAW, ColumnType::Float),
    ],
    dropped: &[],
};

/// The classifiers whose tables can be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classifier {
    Kaiju,
    Kraken2,
    Centrifuge,
}

impl Classifier {
    /// Fan-in order of the unifier.
    pub const ALL: [Classifier; 3] = [Classifier::Kaiju, Classifier::Kraken2, Classifier::Centrifuge];

    pub fn name(self) -> &'static str {
        match self {
            Classifier::Kaiju => "kaiju",
            Classifier::Kraken2 => "kraken2",
            Classifier::Centrifuge => "centrifuge",
        }
    }

    pub fn schema(self) -> &'static ClassifierSchema {
        match self {
            Classifier::Kaiju => &KAIJU,
            Classifier::Kraken2 => &KRAKEN2,
            Classifier::Centrifuge => &CENTRIFUGE,
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Classifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kaiju" => Ok(Classifier::Kaiju),
            "kraken2" => Ok(Classifier::Kraken2),
            "centrifuge" => Ok(Classifier::Centrifuge),
            other => Err(format!(
                "unknown classifier '{other}', expected one of kaiju, kraken2, centrifuge"
            )),
        }
    }
}
