// src/lib.rs
pub mod abundance;
pub mod error;
pub mod fasta;
pub mod genome;
pub mod ground_truth;
pub mod lineage_filter;
pub mod metadata;
pub mod ncbi;
pub mod process;
pub mod samplesheet;
pub mod schema;
pub mod table;
pub mod taxdb;
pub mod unify;

pub use crate::abundance::{normalize_file, NormalizeOptions};
pub use crate::error::{Error, Result};
pub use crate::genome::{pick_genome_file, CompletenessTier};
pub use crate::ground_truth::{join_files, GroundTruthRecord};
pub use crate::lineage_filter::{filter_file, LineageFilterConfig};
pub use crate::metadata::{add_metadata, Pairing};
pub use crate::ncbi::{download_genome, is_downloadable, DatasetsConfig};
pub use crate::samplesheet::check_samplesheet;
pub use crate::schema::Classifier;
pub use crate::taxdb::{Taxonkit, TaxonkitConfig, TaxonomyLookup};
pub use crate::unify::{unify_files, UnifiedRecord};
