//src/lineage_filter.rs

use std::collections::BTreeSet;
use std::path::Path;

use ahash::AHashSet;

use crate::error::{require_file, Result};
use crate::taxdb::{LineageEntry, TaxonomyLookup};
use crate::unify::{read_unified, write_unified, UnifiedRecord};

/// Prefix of the names classifiers emit when they only know the numeric id.
pub const PLACEHOLDER_PREFIX: &str = "taxonid:";

/// Ranks dropped by default: everything above genus except subfamily.
pub const DEFAULT_EXCLUDED_RANKS: [&str; 8] = [
    "superkingdom",
    "clade",
    "kingdom",
    "phylum",
    "class",
    "order",
    "suborder",
    "family",
];

#[derive(Debug, Clone)]
pub struct LineageFilterConfig {
    /// Name that has to appear in a taxon's lineage, e.g. `Viruses`
    pub target_domain: String,
    /// Terminal ranks whose taxa are dropped
    pub excluded_ranks: Vec<String>,
}

impl Default for LineageFilterConfig {
    fn default() -> Self {
        Self {
            target_domain: "Viruses".to_string(),
            excluded_ranks: DEFAULT_EXCLUDED_RANKS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// The id inside a `taxonid:<id>` placeholder name.
pub fn placeholder_taxid(name: &str) -> Option<&str> {
    name.strip_prefix(PLACEHOLDER_PREFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Replaces placeholder names by scientific names. Returns how many rows
/// were renamed; placeholders the lookup cannot resolve stay as they are.
pub fn resolve_placeholder_names<L: TaxonomyLookup + ?Sized>(
    records: &mut [UnifiedRecord],
    lookup: &L,
) -> Result<usize> {
    let ids: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| placeholder_taxid(&r.taxon_name))
        .collect();
    if ids.is_empty() {
        return Ok(0);
    }
    let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
    let names = lookup.names(&ids)?;

    let mut renamed = 0;
    for record in records.iter_mut() {
        let resolved = placeholder_taxid(&record.taxon_name).and_then(|id| names.get(id));
        if let Some(name) = resolved {
            record.taxon_name = name.clone();
            renamed += 1;
        }
    }
    log::info!("Replaced {renamed} placeholder taxon names");
    Ok(renamed)
}

/// Distinct taxon ids of the table, sorted.
pub fn distinct_taxids(records: &[UnifiedRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.taxid.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Taxon ids whose lineage contains `domain`.
pub fn domain_taxids(entries: &[LineageEntry], domain: &str) -> AHashSet<String> {
    entries
        .iter()
        .filter(|e| e.has_ancestor(domain))
        .map(|e| e.taxid.clone())
        .collect()
}

/// Taxon ids whose own rank is one of `ranks`. Ancestor ranks are not
/// considered.
pub fn excluded_rank_taxids(entries: &[LineageEntry], ranks: &[String]) -> AHashSet<String> {
    entries
        .iter()
        .filter(|e| ranks.iter().any(|r| *r == e.rank))
        .map(|e| e.taxid.clone())
        .collect()
}

/// Keeps the first row of every taxon id. On a table sorted by abundance this
/// is the strongest classifier call.
pub fn dedup_by_taxid(records: Vec<UnifiedRecord>) -> Vec<UnifiedRecord> {
    let mut seen = AHashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.taxid.clone()))
        .collect()
}

/// Runs every filtering step in order on an in-memory table.
pub fn filter_records<L: TaxonomyLookup + ?Sized>(
    mut records: Vec<UnifiedRecord>,
    lookup: &L,
    config: &LineageFilterConfig,
) -> Result<Vec<UnifiedRecord>> {
    resolve_placeholder_names(&mut records, lookup)?;

    let taxids = distinct_taxids(&records);
    if taxids.is_empty() {
        log::warn!("The table has no rows, nothing to filter");
        return Ok(records);
    }
    let lineages = lookup.lineages(&taxids)?;

    let in_domain = domain_taxids(&lineages, &config.target_domain);
    let excluded = excluded_rank_taxids(&lineages, &config.excluded_ranks);
    log::info!(
        "{} of {} taxids belong to {}, {} of all taxids are at an excluded rank",
        in_domain.len(),
        taxids.len(),
        config.target_domain,
        excluded.len()
    );

    let before = records.len();
    records.retain(|r| in_domain.contains(&r.taxid));
    log::info!(
        "Dropped {} rows outside {}",
        before - records.len(),
        config.target_domain
    );

    let before = records.len();
    records.retain(|r| !excluded.contains(&r.taxid));
    log::info!("Dropped {} rows at excluded ranks", before - records.len());

    let before = records.len();
    let records = dedup_by_taxid(records);
    log::info!("Dropped {} rows with duplicate taxids", before - records.len());
    Ok(records)
}

/// Reads the unified table at `input`, filters it and writes `output`.
/// Returns the number of rows kept.
pub fn filter_file<P, Q, L>(input: P, output: Q, lookup: &L, config: &LineageFilterConfig) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    L: TaxonomyLookup + ?Sized,
{
    let input = input.as_ref();
    require_file(input)?;
    log::info!("Reading {} into a table", input.display());
    let records = read_unified(input)?;
    let kept = filter_records(records, lookup, config)?;
    write_unified(&kept, output)?;
    Ok(kept.len())
}
