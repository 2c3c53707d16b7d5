//src/genome.rs

use std::fmt;
use std::path::Path;

use crate::error::{require_file, Error, Result};
use crate::fasta::{read_fasta_records, write_fasta_record, SequenceRecord};
use crate::table::write_atomically;

/// How complete a record claims to be, judged from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessTier {
    CompleteGenome,
    CompleteCds,
    PartialGenome,
    PartialCds,
    Allele,
}

impl CompletenessTier {
    /// Most complete first.
    pub const PRIORITY: [CompletenessTier; 5] = [
        CompletenessTier::CompleteGenome,
        CompletenessTier::CompleteCds,
        CompletenessTier::PartialGenome,
        CompletenessTier::PartialCds,
        CompletenessTier::Allele,
    ];

    pub fn phrase(self) -> &'static str {
        match self {
            CompletenessTier::CompleteGenome => "complete genome",
            CompletenessTier::CompleteCds => "complete cds",
            CompletenessTier::PartialGenome => "partial genome",
            CompletenessTier::PartialCds => "partial cds",
            CompletenessTier::Allele => "allele",
        }
    }

    /// Exact, case-sensitive substring match on the description.
    pub fn matches(self, description: &str) -> bool {
        description.contains(self.phrase())
    }
}

impl fmt::Display for CompletenessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Outcome of [`select_representative`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    /// Longest record of the first tier that had any records
    Tier(CompletenessTier, &'a SequenceRecord),
    /// No description matched any tier; longest record overall
    Fallback(&'a SequenceRecord),
}

impl<'a> Selection<'a> {
    pub fn record(&self) -> &'a SequenceRecord {
        match *self {
            Selection::Tier(_, r) | Selection::Fallback(r) => r,
        }
    }

    pub fn tier(&self) -> Option<CompletenessTier> {
        match *self {
            Selection::Tier(t, _) => Some(t),
            Selection::Fallback(_) => None,
        }
    }
}

/// Longest record; on equal length the earliest one wins.
pub fn longest<'a, I>(records: I) -> Option<&'a SequenceRecord>
where
    I: IntoIterator<Item = &'a SequenceRecord>,
{
    records.into_iter().fold(None, |best: Option<&SequenceRecord>, r| match best {
        Some(b) if b.len() >= r.len() => Some(b),
        _ => Some(r),
    })
}

/// Walks `tiers` in order and returns the longest record of the first tier
/// with any match; lower tiers are not examined after that. When nothing
/// matches at all the longest record overall is the fallback. `None` only for
/// an empty input.
pub fn select_representative<'a>(
    records: &'a [SequenceRecord],
    tiers: &[CompletenessTier],
) -> Option<Selection<'a>> {
    for &tier in tiers {
        let candidates = records.iter().filter(|r| tier.matches(&r.description));
        if let Some(best) = longest(candidates) {
            return Some(Selection::Tier(tier, best));
        }
        log::warn!("There weren't any records with '{tier}' completeness level");
    }
    let fallback = longest(records)?;
    let phrases: Vec<&str> = tiers.iter().map(|t| t.phrase()).collect();
    log::warn!(
        "There weren't any records with these '{}' completeness levels, falling back to the longest record",
        phrases.join(", ")
    );
    Some(Selection::Fallback(fallback))
}

/// What [`pick_genome_file`] wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedGenome {
    pub id: String,
    pub description: String,
    pub length: usize,
    pub tier: Option<CompletenessTier>,
}

/// Reads a multi-FASTA file, selects one record and writes it alone to
/// `output`. An input without records is fatal and writes nothing.
pub fn pick_genome_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<PickedGenome> {
    let input = input.as_ref();
    require_file(input)?;
    let records = read_fasta_records(input)?;
    let selection = select_representative(&records, &CompletenessTier::PRIORITY)
        .ok_or_else(|| Error::EmptyInputSequenceSet(input.to_path_buf()))?;

    let record = selection.record();
    match selection.tier() {
        Some(tier) => log::info!(
            "A record with ID: '{}' and with '{tier}' completeness level picked.",
            record.id
        ),
        None => log::info!("A record with ID: '{}' picked by length alone.", record.id),
    }
    log::info!(
        "Record description: {} Record length: {}",
        record.description,
        record.len()
    );

    write_atomically(output, |w| Ok(write_fasta_record(record, w)?))?;
    Ok(PickedGenome {
        id: record.id.clone(),
        description: record.description.clone(),
        length: record.len(),
        tier: selection.tier(),
    })
}
