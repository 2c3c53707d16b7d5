use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use taxmerge_rs::abundance::default_output_path;
use taxmerge_rs::lineage_filter::DEFAULT_EXCLUDED_RANKS;
use taxmerge_rs::{
    add_metadata, check_samplesheet, download_genome, filter_file, is_downloadable, join_files,
    normalize_file, pick_genome_file, unify_files, Classifier, DatasetsConfig,
    LineageFilterConfig, NormalizeOptions, Pairing, Result, Taxonkit, TaxonkitConfig,
};

#[derive(Parser)]
#[command(name = "taxmerge-rs")]
#[command(version)]
#[command(about = "Reconcile taxonomic classifier tables against a CAMI ground-truth profile")]
struct Cli {
    /// The desired log level
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Warning, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    #[value(name = "CRITICAL")]
    Critical,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "INFO")]
    Info,
    #[value(name = "DEBUG")]
    Debug,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compute abundance per million for a classifier table and drop low rows
    RpmFilter {
        #[arg(value_name = "CLASSIFIER_OUTPUT_FILE")]
        input: PathBuf,
        /// Defaults to <input stem>.filtered.tsv next to the input
        #[arg(short = 'o', long = "rpm-filtered-output-file")]
        output: Option<PathBuf>,
        /// 0-based column holding the supporting reads count
        #[arg(short = 'n', long = "reads-column-number")]
        reads_column: usize,
        /// Comma separated replacement column names
        #[arg(short = 'c', long = "column-names", value_delimiter = ',')]
        column_names: Option<Vec<String>>,
        /// Column that must stay text, e.g. 'taxon_id' in kaiju output
        #[arg(short = 's', long = "string-colname")]
        string_column: Option<String>,
        #[arg(short = 'r', long = "rpm-filtering-threshold", default_value_t = 0.0)]
        threshold: f64,
    },
    /// Left join a filtered classifier table with a CAMI profile
    Join {
        #[arg(value_name = "CAMI_TABLE")]
        profile: PathBuf,
        #[arg(value_name = "CLASSIFIER_TABLE")]
        classifier_table: PathBuf,
        #[arg(short = 'o', long = "output-file-name", default_value = "joined.tsv")]
        output: PathBuf,
        #[arg(short = 'c', long = "classifier-name")]
        classifier: Classifier,
    },
    /// Concatenate the joined kaiju, kraken2 and centrifuge tables
    Concat {
        #[arg(short = 'j', long = "kaiju-file")]
        kaiju: PathBuf,
        #[arg(short = 'k', long = "kraken2-file")]
        kraken2: PathBuf,
        #[arg(short = 'c', long = "centrifuge-file")]
        centrifuge: PathBuf,
        #[arg(short = 'o', long = "output-file-name", default_value = "concatenated.tsv")]
        output: PathBuf,
    },
    /// Resolve names, keep one domain and deduplicate taxids of a unified table
    Postprocess {
        input: PathBuf,
        output: PathBuf,
        #[arg(short = 't', long = "ncbi-taxon-db", env = "TAXONKIT_DB", default_value = "../temp/taxdump")]
        taxon_db: PathBuf,
        #[arg(long = "taxonkit-bin", env = "TAXONKIT_BIN", default_value = "taxonkit")]
        taxonkit: PathBuf,
        #[arg(long = "domain", default_value = "Viruses")]
        domain: String,
        /// Comma separated ranks to drop; pass an empty value to keep all ranks
        #[arg(
            long = "exclude-ranks",
            value_delimiter = ',',
            default_values_t = DEFAULT_EXCLUDED_RANKS.map(String::from)
        )]
        exclude_ranks: Vec<String>,
    },
    /// Pick a single representative record from a multi-FASTA file
    PickGenome {
        #[arg(value_name = "INPUT-MULTIFASTA")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT-SINGLEFASTA")]
        output: PathBuf,
    },
    /// Validate a csv/tsv samplesheet and write it as csv
    CheckSamplesheet {
        #[arg(value_name = "FILE_IN")]
        input: PathBuf,
        #[arg(value_name = "FILE_OUT")]
        output: PathBuf,
    },
    /// Append pairing and sample name columns to a tsv table
    AddMetadata {
        input: PathBuf,
        output: PathBuf,
        #[arg(short = 'p', long = "pairing")]
        pairing: Pairing,
        #[arg(short = 's', long = "sample-name")]
        sample_name: String,
    },
    /// Download the newest reference genome of a taxid from NCBI
    DownloadGenome {
        taxid: String,
        /// Where the chosen .fna is copied
        #[arg(short = 'o', long = "output-dir", default_value = ".")]
        output_dir: PathBuf,
        #[arg(long = "datasets-bin", env = "DATASETS_BIN", default_value = "datasets")]
        datasets: PathBuf,
    },
    /// Print the taxid if NCBI has nothing downloadable for it
    ValidateTaxid {
        #[arg(value_name = "TAXID_TO_VALIDATE")]
        taxid: String,
        #[arg(long = "datasets-bin", env = "DATASETS_BIN", default_value = "datasets")]
        datasets: PathBuf,
    },
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.filter())
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn spinner(color: &str, message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&format!("{{spinner:.{color}}} {{msg}}"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::RpmFilter {
            input,
            output,
            reads_column,
            column_names,
            string_column,
            threshold,
        } => {
            let output = output.unwrap_or_else(|| default_output_path(&input));
            let options = NormalizeOptions {
                reads_column,
                column_names,
                string_column,
                threshold,
            };
            let kept = normalize_file(&input, &output, &options)?;
            log::info!("Wrote {kept} rows to {}", output.display());
        }
        Command::Join {
            profile,
            classifier_table,
            output,
            classifier,
        } => {
            join_files(&profile, &classifier_table, classifier, &output)?;
        }
        Command::Concat {
            kaiju,
            kraken2,
            centrifuge,
            output,
        } => {
            let rows = unify_files(&kaiju, &kraken2, &centrifuge, &output)?;
            log::info!("Wrote {rows} rows to {}", output.display());
        }
        Command::Postprocess {
            input,
            output,
            taxon_db,
            taxonkit,
            domain,
            exclude_ranks,
        } => {
            let lookup = Taxonkit::new(TaxonkitConfig {
                binary: taxonkit,
                data_dir: taxon_db,
                ..Default::default()
            });
            let config = LineageFilterConfig {
                target_domain: domain,
                excluded_ranks: exclude_ranks
                    .into_iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect(),
            };
            let spinner = spinner("blue", "Filtering taxa by lineage...");
            let kept = filter_file(&input, &output, &lookup, &config);
            spinner.finish_and_clear();
            log::info!("Kept {} rows", kept?);
        }
        Command::PickGenome { input, output } => {
            pick_genome_file(&input, &output)?;
        }
        Command::CheckSamplesheet { input, output } => {
            check_samplesheet(&input, &output)?;
        }
        Command::AddMetadata {
            input,
            output,
            pairing,
            sample_name,
        } => {
            add_metadata(&input, &output, pairing, &sample_name)?;
        }
        Command::DownloadGenome {
            taxid,
            output_dir,
            datasets,
        } => {
            let config = DatasetsConfig {
                binary: datasets,
                ..Default::default()
            };
            let spinner = spinner("green", &format!("Downloading genomes for taxid {taxid}..."));
            let copied = download_genome(&taxid, Path::new("."), &output_dir, &config);
            spinner.finish_and_clear();
            log::info!("Reference genome stored at {}", copied?.display());
        }
        Command::ValidateTaxid { taxid, datasets } => {
            let config = DatasetsConfig {
                binary: datasets,
                ..Default::default()
            };
            let spinner = spinner("yellow", &format!("Checking taxid {taxid}..."));
            let downloadable = is_downloadable(&taxid, Path::new("."), &config);
            spinner.finish_and_clear();
            if !downloadable? {
                println!("{taxid}");
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    if let Err(e) = run(cli.command) {
        log::error!("{e}");
        std::process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postprocess_ranks(extra: &[&str]) -> Vec<String> {
        let mut args = vec!["taxmerge-rs", "postprocess", "in.tsv", "out.tsv"];
        args.extend_from_slice(extra);
        match Cli::try_parse_from(args).unwrap().command {
            Command::Postprocess { exclude_ranks, .. } => exclude_ranks,
            _ => panic!("parsed into another subcommand"),
        }
    }

    #[test]
    fn exclude_ranks_defaults_to_the_builtin_list() {
        assert_eq!(postprocess_ranks(&[]), DEFAULT_EXCLUDED_RANKS.map(String::from).to_vec());
    }

    #[test]
    fn exclude_ranks_splits_on_commas() {
        assert_eq!(
            postprocess_ranks(&["--exclude-ranks", "family,order"]),
            vec!["family".to_string(), "order".to_string()]
        );
    }
}
