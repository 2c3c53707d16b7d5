//src/error.rs

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every fatal condition a stage can hit. Each variant maps to its own
/// process exit code through [`Error::exit_code`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The primary input of a stage does not exist
    #[error("The given input file {} was not found!", .0.display())]
    MissingInputFile(PathBuf),

    /// A second input of a stage (e.g. the classifier table of a join) does not exist
    #[error("The given input file {} was not found!", .0.display())]
    MissingSecondaryInputFile(PathBuf),

    #[error("Column '{column}' is missing from {}", .path.display())]
    MissingRequiredColumn { path: PathBuf, column: String },

    /// A row (or header) that cannot be interpreted. `line` is 1-based and
    /// counts the header line.
    #[error("{message} On line {line} of {}.", .path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Running {program} took longer than {seconds} seconds for {key}")]
    LookupTimeout {
        program: String,
        key: String,
        seconds: u64,
    },

    #[error("The return code of {program} run for {key} was non-zero ({status}): {stderr}")]
    LookupNonZeroExit {
        program: String,
        key: String,
        status: String,
        stderr: String,
    },

    #[error("The {program} run for {key} didn't produce any output")]
    LookupEmptyResult { program: String, key: String },

    #[error("No sequences were found in {}", .0.display())]
    EmptyInputSequenceSet(PathBuf),

    #[error("No assembly files were found for taxid: {0}")]
    NoMatchingAssemblyFile(String),

    /// An assembly directory holds more than one `.fna`
    #[error("Too many assembly files ({count}) in path: {}", .dir.display())]
    AmbiguousAssemblyFiles { dir: PathBuf, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Stage-specific exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingInputFile(_) => 1,
            Error::MissingSecondaryInputFile(_)
            | Error::NoMatchingAssemblyFile(_)
            | Error::AmbiguousAssemblyFiles { .. } => 2,
            Error::LookupEmptyResult { .. } => 3,
            Error::LookupTimeout { .. } => 4,
            Error::LookupNonZeroExit { .. } => 5,
            Error::EmptyInputSequenceSet(_) => 6,
            Error::MissingRequiredColumn { .. } => 7,
            Error::MalformedRow { .. } => 8,
            Error::Io(_) | Error::Csv(_) | Error::Json(_) | Error::Zip(_) => 10,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Error::MalformedRow {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn missing_column(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Error::MissingRequiredColumn {
            path: path.into(),
            column: column.into(),
        }
    }
}

/// Fails with [`Error::MissingInputFile`] when `path` is not a regular file.
pub fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingInputFile(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_fatal_kind() {
        let timeout = Error::LookupTimeout {
            program: "taxonkit".into(),
            key: "ids.txt".into(),
            seconds: 180,
        };
        let nonzero = Error::LookupNonZeroExit {
            program: "taxonkit".into(),
            key: "ids.txt".into(),
            status: "exit status: 1".into(),
            stderr: String::new(),
        };
        let empty = Error::LookupEmptyResult {
            program: "taxonkit".into(),
            key: "ids.txt".into(),
        };
        let codes = [
            Error::MissingInputFile("a".into()).exit_code(),
            empty.exit_code(),
            timeout.exit_code(),
            nonzero.exit_code(),
            Error::EmptyInputSequenceSet("x.fna".into()).exit_code(),
        ];
        let mut sorted = codes.to_vec();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn missing_file_is_reported_before_parsing() {
        let err = require_file(std::path::Path::new("/definitely/not/here.tsv")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("/definitely/not/here.tsv"));
    }
}
