//src/ncbi.rs

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::process::run_with_timeout;

pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
pub const CHECK_TIMEOUT_SECS: u64 = 180;

/// Data directory of an unpacked `datasets` archive, relative to where it was unpacked.
pub const DATA_DIR: &str = "ncbi_dataset/data";
pub const ASSEMBLY_REPORT: &str = "assembly_data_report.jsonl";

#[derive(Debug, Clone)]
pub struct DatasetsConfig {
    pub binary: PathBuf,
    pub download_timeout: Duration,
    pub check_timeout: Duration,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("datasets"),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
            check_timeout: Duration::from_secs(CHECK_TIMEOUT_SECS),
        }
    }
}

/// One line of the assembly data report. Only the fields used for picking an
/// assembly are modelled; everything else in the line is ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub assembly_info: AssemblyInfo,
    #[serde(default)]
    pub organism_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyInfo {
    /// e.g. `GCF_000847605.1`
    pub assembly_accession: String,
    /// `%Y-%m-%d`
    pub submission_date: NaiveDate,
}

impl Assembly {
    pub fn accession(&self) -> &str {
        &self.assembly_info.assembly_accession
    }
}

/// Archive name used for a taxid.
pub fn archive_name(taxid: &str) -> String {
    format!("{taxid}.zip")
}

fn datasets_command(config: &DatasetsConfig, taxid: &str, work_dir: &Path) -> Command {
    let mut cmd = Command::new(&config.binary);
    cmd.current_dir(work_dir)
        .args(["download", "genome", "taxon", taxid]);
    cmd
}

/// Parses a JSON-lines assembly report; blank lines are skipped.
pub fn read_assembly_report<P: AsRef<Path>>(path: P) -> Result<Vec<Assembly>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut assemblies = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        assemblies.push(serde_json::from_str(&line)?);
    }
    log::debug!("{} assemblies listed in {}", assemblies.len(), path.display());
    Ok(assemblies)
}

/// Newest submission first; equal dates keep their report order.
pub fn sort_assemblies(assemblies: &mut [Assembly]) {
    assemblies.sort_by(|a, b| {
        b.assembly_info
            .submission_date
            .cmp(&a.assembly_info.submission_date)
    });
}

/// The single `.fna` file in `dir`. `None` when the directory is missing or
/// has none; more than one is an error.
pub fn assembly_fasta(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut fastas = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "fna").unwrap_or(false) {
            fastas.push(path);
        }
    }
    match fastas.len() {
        0 => {
            log::warn!("No assembly file existed in path: {}", dir.display());
            Ok(None)
        }
        1 => Ok(fastas.pop()),
        count => Err(Error::AmbiguousAssemblyFiles {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// First assembly, in the given order, with a `.fna` under
/// `data_dir/<accession>/`. Assemblies without one are skipped.
pub fn pick_assembly_file(data_dir: &Path, assemblies: &[Assembly]) -> Result<Option<PathBuf>> {
    for assembly in assemblies {
        if let Some(path) = assembly_fasta(&data_dir.join(assembly.accession()))? {
            log::info!("Using assembly {}", assembly.accession());
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Downloads every assembly for `taxid` into `work_dir`, unpacks the archive
/// there and copies the `.fna` of the newest usable assembly into
/// `output_dir`. Returns the path of the copy.
pub fn download_genome(
    taxid: &str,
    work_dir: &Path,
    output_dir: &Path,
    config: &DatasetsConfig,
) -> Result<PathBuf> {
    let zip_name = archive_name(taxid);
    let mut cmd = datasets_command(config, taxid, work_dir);
    cmd.args([
        "--exclude-gff3",
        "--exclude-protein",
        "--exclude-rna",
        "--exclude-genomic-cds",
        "--no-progressbar",
        "--filename",
        zip_name.as_str(),
    ]);
    run_with_timeout(&mut cmd, taxid, config.download_timeout)?;

    let archive = File::open(work_dir.join(&zip_name))?;
    zip::ZipArchive::new(archive)?.extract(work_dir)?;

    let data_dir = work_dir.join(DATA_DIR);
    let mut assemblies = read_assembly_report(data_dir.join(ASSEMBLY_REPORT))?;
    sort_assemblies(&mut assemblies);

    let source = pick_assembly_file(&data_dir, &assemblies)?
        .ok_or_else(|| Error::NoMatchingAssemblyFile(taxid.to_string()))?;
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::NoMatchingAssemblyFile(taxid.to_string()))?;
    let target = output_dir.join(file_name);
    if source != target {
        fs::copy(&source, &target)?;
    }
    log::info!("Copying {} to: {}", source.display(), target.display());
    Ok(target)
}

/// Tries a dehydrated download of `taxid`. Timeouts and failed runs mean
/// "not downloadable"; the dehydrated archive is removed after a successful run.
pub fn is_downloadable(taxid: &str, work_dir: &Path, config: &DatasetsConfig) -> Result<bool> {
    let zip_name = archive_name(taxid);
    let mut cmd = datasets_command(config, taxid, work_dir);
    cmd.args(["--no-progressbar", "--dehydrated", "--filename", zip_name.as_str()]);

    match run_with_timeout(&mut cmd, taxid, config.check_timeout) {
        Ok(_) => {
            log::info!("Taxid {taxid} checked");
            let dehydrated = work_dir.join(&zip_name);
            if dehydrated.is_file() {
                fs::remove_file(dehydrated)?;
            }
            Ok(true)
        }
        Err(Error::LookupTimeout { .. }) | Err(Error::LookupNonZeroExit { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const REPORT: &str = concat!(
        r#"{"assemblyInfo":{"assemblyAccession":"GCF_000001.1","submissionDate":"2001-05-01","assemblyLevel":"Complete Genome"},"organismName":"Virus A"}"#,
        "\n",
        r#"{"assemblyInfo":{"assemblyAccession":"GCA_000003.2","submissionDate":"2019-11-30"},"assemblyStats":{"totalSequenceLength":"12"}}"#,
        "\n\n",
        r#"{"assemblyInfo":{"assemblyAccession":"GCA_000002.1","submissionDate":"2010-01-15"}}"#,
        "\n",
    );

    fn write_report(dir: &Path) -> PathBuf {
        let path = dir.join(ASSEMBLY_REPORT);
        fs::write(&path, REPORT).unwrap();
        path
    }

    #[test]
    fn newest_assembly_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut assemblies = read_assembly_report(write_report(dir.path())).unwrap();
        assert_eq!(assemblies.len(), 3);
        assert_eq!(assemblies[0].organism_name.as_deref(), Some("Virus A"));
        sort_assemblies(&mut assemblies);
        let order: Vec<&str> = assemblies.iter().map(Assembly::accession).collect();
        assert_eq!(order, vec!["GCA_000003.2", "GCA_000002.1", "GCF_000001.1"]);
    }

    #[test]
    fn bad_dates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ASSEMBLY_REPORT);
        fs::write(
            &path,
            r#"{"assemblyInfo":{"assemblyAccession":"GCF_1","submissionDate":"30/11/2019"}}"#,
        )
        .unwrap();
        let err = read_assembly_report(&path).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn skips_assemblies_without_a_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path();
        let mut assemblies = read_assembly_report(write_report(data)).unwrap();
        sort_assemblies(&mut assemblies);

        // newest: no directory, next: empty directory, oldest: one fasta
        fs::create_dir(data.join("GCA_000002.1")).unwrap();
        let oldest = data.join("GCF_000001.1");
        fs::create_dir(&oldest).unwrap();
        fs::write(oldest.join("GCF_000001.1_genomic.fna"), ">c\nA\n").unwrap();
        fs::write(oldest.join("sequence_report.jsonl"), "{}").unwrap();

        let picked = pick_assembly_file(data, &assemblies).unwrap();
        assert_eq!(picked, Some(oldest.join("GCF_000001.1_genomic.fna")));

        let none = pick_assembly_file(data, &assemblies[..2]).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn several_fastas_in_one_assembly_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path();
        let mut assemblies = read_assembly_report(write_report(data)).unwrap();
        sort_assemblies(&mut assemblies);

        let newest = data.join("GCA_000003.2");
        fs::create_dir(&newest).unwrap();
        fs::write(newest.join("a.fna"), ">a\nA\n").unwrap();
        fs::write(newest.join("b.fna"), ">b\nA\n").unwrap();
        let oldest = data.join("GCF_000001.1");
        fs::create_dir(&oldest).unwrap();
        fs::write(oldest.join("GCF_000001.1_genomic.fna"), ">c\nA\n").unwrap();

        let err = pick_assembly_file(data, &assemblies).unwrap_err();
        assert!(matches!(
            err,
            Error::AmbiguousAssemblyFiles { ref dir, count: 2 } if *dir == newest
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[cfg(unix)]
    fn zipped_dataset(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        zip.start_file(format!("{DATA_DIR}/{ASSEMBLY_REPORT}"), options)
            .unwrap();
        zip.write_all(REPORT.as_bytes()).unwrap();
        zip.start_file(format!("{DATA_DIR}/GCA_000002.1/GCA_000002.1_genomic.fna"), options)
            .unwrap();
        zip.write_all(b">GCA_000002.1 Virus A, complete genome\nACGT\n")
            .unwrap();
        zip.finish().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn downloads_unpacks_and_copies_the_newest_usable_assembly() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // `true` stands in for the downloader; the archive is already in place
        zipped_dataset(&work.path().join("11320.zip"));
        let config = DatasetsConfig {
            binary: PathBuf::from("true"),
            ..Default::default()
        };
        let copied = download_genome("11320", work.path(), out.path(), &config).unwrap();
        assert_eq!(copied, out.path().join("GCA_000002.1_genomic.fna"));
        assert_eq!(
            fs::read_to_string(copied).unwrap(),
            ">GCA_000002.1 Virus A, complete genome\nACGT\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failed_download_is_fatal() {
        let work = tempfile::tempdir().unwrap();
        let config = DatasetsConfig {
            binary: PathBuf::from("false"),
            ..Default::default()
        };
        let err = download_genome("11320", work.path(), work.path(), &config).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn validation_reports_downloadability_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("10239.zip");
        fs::write(&archive, b"dehydrated").unwrap();

        let ok = DatasetsConfig {
            binary: PathBuf::from("true"),
            ..Default::default()
        };
        assert!(is_downloadable("10239", work.path(), &ok).unwrap());
        assert!(!archive.exists());

        let failing = DatasetsConfig {
            binary: PathBuf::from("false"),
            ..Default::default()
        };
        assert!(!is_downloadable("10239", work.path(), &failing).unwrap());
    }
}
