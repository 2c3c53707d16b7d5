//src/ground_truth.rs

use std::path::Path;

use ahash::AHashMap;

use crate::error::{require_file, Error, Result};
use crate::schema::{self, Classifier, CAMI_RENAMES, LINE_NUMBER};
use crate::table::{format_float, write_atomically, Table};

/// Lines in front of the CAMI profile header (`@Version`, `@SampleID`, ...).
pub const PROFILE_HEADER_LINES: usize = 4;

/// One row of the ground-truth profile.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthRecord {
    pub taxid: String,
    pub rank: String,
    /// `|`-separated taxon ids from the root
    pub taxpath: String,
    /// `|`-separated scientific names from the root
    pub taxpathsn: String,
    pub percentage: Option<f64>,
}

impl GroundTruthRecord {
    /// Cells in `cami_*` column order.
    pub fn cells(&self) -> [String; 5] {
        [
            self.taxid.clone(),
            self.rank.clone(),
            self.taxpath.clone(),
            self.taxpathsn.clone(),
            self.percentage.map(format_float).unwrap_or_default(),
        ]
    }
}

/// Reads a CAMI profile, skipping its leading metadata lines and stripping
/// the `@@` marker from the header.
pub fn read_profile<P: AsRef<Path>>(path: P) -> Result<Vec<GroundTruthRecord>> {
    let path = path.as_ref();
    let mut table = Table::read_tsv_skipping(path, PROFILE_HEADER_LINES)?;
    for column in &mut table.columns {
        if let Some(stripped) = column.strip_prefix("@@") {
            *column = stripped.to_string();
        }
    }
    log::info!("Removing leading '@@' in '@@TAXID'");

    let mut idx = [0usize; 5];
    for (slot, (from, _)) in idx.iter_mut().zip(CAMI_RENAMES.iter()) {
        *slot = table.require_column(from, path)?;
    }

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let pct_cell = row[idx[4]].trim();
        let percentage = if pct_cell.is_empty() {
            None
        } else {
            Some(pct_cell.parse::<f64>().map_err(|_| {
                Error::malformed(
                    path,
                    PROFILE_HEADER_LINES + i + 2,
                    format!("'{pct_cell}' is not a percentage."),
                )
            })?)
        };
        records.push(GroundTruthRecord {
            taxid: row[idx[0]].clone(),
            rank: row[idx[1]].clone(),
            taxpath: row[idx[2]].clone(),
            taxpathsn: row[idx[3]].clone(),
            percentage,
        });
    }
    Ok(records)
}

/// Fails on the first cell that does not parse as its schema type.
pub(crate) fn check_types(table: &Table, classifier: Classifier, source: &Path) -> Result<()> {
    let schema = classifier.schema();
    let typed: Vec<(usize, schema::ColumnType)> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, c)| schema.column_type(c).map(|t| (i, t)))
        .collect();
    for (r, row) in table.rows.iter().enumerate() {
        for &(i, ty) in &typed {
            if !ty.accepts(&row[i]) {
                return Err(Error::malformed(
                    source,
                    r + 2,
                    format!(
                        "'{}' in column '{}' is not a valid {:?} value for {classifier}.",
                        row[i], table.columns[i], ty
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Left-joins `table` (left) with `profile` (right) on the classifier's
/// taxon-id column. Row count and row order are unchanged; rows without a
/// match get empty lineage cells. A taxon id repeated in the profile joins
/// to its first occurrence.
pub fn join_table(
    mut table: Table,
    classifier: Classifier,
    profile: &[GroundTruthRecord],
    source: &Path,
) -> Result<Table> {
    check_types(&table, classifier, source)?;
    // The normalizer's row index is not carried over
    if table.columns.first().map(String::as_str) == Some(LINE_NUMBER) {
        table.drop_column(LINE_NUMBER);
    }

    let key_column = classifier.schema().taxid_column;
    let key_idx = table.require_column(key_column, source)?;
    log::info!(
        "Left joining {classifier} table with {key_column} as key and cami profile using {} as key",
        schema::CAMI_TAXID
    );

    let mut by_taxid: AHashMap<&str, &GroundTruthRecord> = AHashMap::with_capacity(profile.len());
    for record in profile {
        by_taxid.entry(record.taxid.as_str()).or_insert(record);
    }

    for (_, to) in CAMI_RENAMES {
        table.columns.push(to.to_string());
    }
    let mut matched = 0usize;
    for row in &mut table.rows {
        match by_taxid.get(row[key_idx].as_str()) {
            Some(record) => {
                matched += 1;
                row.extend(record.cells());
            }
            None => row.extend(std::iter::repeat(String::new()).take(CAMI_RENAMES.len())),
        }
    }
    log::info!(
        "{matched} of {} {classifier} rows matched the ground-truth profile",
        table.rows.len()
    );
    Ok(table)
}

/// File-level join. A missing profile exits with 1, a missing classifier
/// table with 2.
pub fn join_files<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    profile_path: P,
    classifier_path: Q,
    classifier: Classifier,
    output: R,
) -> Result<usize> {
    let profile_path = profile_path.as_ref();
    let classifier_path = classifier_path.as_ref();
    require_file(profile_path)?;
    let profile = read_profile(profile_path)?;

    if !classifier_path.is_file() {
        return Err(Error::MissingSecondaryInputFile(classifier_path.to_path_buf()));
    }
    log::info!("Reading {classifier} tsv file {}", classifier_path.display());
    let table = Table::read_tsv(classifier_path)?;
    let joined = join_table(table, classifier, &profile, classifier_path)?;

    log::info!(
        "Storing joined {classifier} and cami profile table into {}",
        output.as_ref().display()
    );
    write_atomically(output, |w| joined.write_to(w))?;
    Ok(joined.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROFILE: &str = "\
@SampleID:sample
@Version:0.9.1
@Ranks:superkingdom|phylum|class|order|family|genus|species|strain

@@TAXID\tRANK\tTAXPATH\tTAXPATHSN\tPERCENTAGE
10239\tsuperkingdom\t10239\tViruses\t60.5
11320\tspecies\t10239|11320\tViruses|Influenza A virus\t39.5
99999\tspecies\t10239|99999\tViruses|Unseen virus\t0.0
";

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_profile_and_strips_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "cami.tsv", PROFILE);
        let profile = read_profile(&path).unwrap();
        assert_eq!(profile.len(), 3);
        assert_eq!(profile[1].taxid, "11320");
        assert_eq!(profile[1].taxpathsn, "Viruses|Influenza A virus");
        assert_eq!(profile[0].percentage, Some(60.5));
    }

    #[test]
    fn left_join_keeps_every_classifier_row() {
        let dir = tempfile::tempdir().unwrap();
        let profile = read_profile(write(dir.path(), "cami.tsv", PROFILE)).unwrap();

        let mut table = Table::new(
            ["line_number", "name", "taxID", "taxRank", "genomeSize", "numReads", "reads_count", "abundance", "RPM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for (i, taxid) in ["11320", "2", "10239", "11320"].iter().enumerate() {
            table.rows.push(
                [i.to_string().as_str(), "n", *taxid, "species", "100", "10", "5", "0.1", "5.0"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            );
        }
        let joined = join_table(table, Classifier::Centrifuge, &profile, Path::new("c.tsv")).unwrap();

        assert_eq!(joined.len(), 4);
        assert!(joined.columns.iter().all(|c| !c.starts_with("@@")));
        assert_eq!(joined.columns.first().unwrap(), "name");
        assert_eq!(
            &joined.columns[joined.columns.len() - 5..],
            &["cami_taxid", "cami_rank", "cami_taxpath", "cami_taxpathsn", "cami_percentage"]
        );
        let cami_taxid = joined.column_index("cami_taxid").unwrap();
        let ids: Vec<&str> = joined.rows.iter().map(|r| r[cami_taxid].as_str()).collect();
        assert_eq!(ids, vec!["11320", "", "10239", "11320"]);
        let pct = joined.column_index("cami_percentage").unwrap();
        assert_eq!(joined.rows[1][pct], "");
        assert_eq!(joined.rows[0][pct], "39.5");
    }

    #[test]
    fn missing_inputs_have_their_own_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("joined.tsv");
        let err = join_files(dir.path().join("none.tsv"), dir.path().join("k.tsv"), Classifier::Kraken2, &out)
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);

        let cami = write(dir.path(), "cami.tsv", PROFILE);
        let err = join_files(&cami, dir.path().join("k.tsv"), Classifier::Kraken2, &out).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!out.exists());
    }

    #[test]
    fn joins_files_by_kraken_taxid() {
        let dir = tempfile::tempdir().unwrap();
        let cami = write(dir.path(), "cami.tsv", PROFILE);
        let kraken = write(
            dir.path(),
            "k.tsv",
            "line_number\tpercentage_fragments_covered\tnum_fragments_covered\treads_count\trank_code\ttaxid\tsci_name\tRPM\n\
             0\t1.5\t30\t20\tS\t11320\tInfluenza A virus\t12.0\n",
        );
        let out = dir.path().join("joined.tsv");
        assert_eq!(join_files(&cami, &kraken, Classifier::Kraken2, &out).unwrap(), 1);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "percentage_fragments_covered\tnum_fragments_covered\treads_count\trank_code\ttaxid\tsci_name\tRPM\t\
             cami_taxid\tcami_rank\tcami_taxpath\tcami_taxpathsn\tcami_percentage\n\
             1.5\t30\t20\tS\t11320\tInfluenza A virus\t12.0\t\
             11320\tspecies\t10239|11320\tViruses|Influenza A virus\t39.5\n"
        );
    }

    #[test]
    fn badly_typed_cells_are_rejected() {
        let mut table = Table::new(vec!["taxid".into(), "num_fragments_covered".into()]);
        table.rows.push(vec!["1".into(), "lots".into()]);
        let err = join_table(table, Classifier::Kraken2, &[], Path::new("k.tsv")).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 2, .. }), "{err}");
    }
}
