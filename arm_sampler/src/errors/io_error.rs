use std::error::Error;
use std::fmt;

/// Failure while loading a trajectory dataset.
///
/// Only header-level problems are fatal. Individual malformed rows are
/// skipped and counted by the loader instead of surfacing here.
#[derive(Debug)]
pub enum DatasetError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// A required column is absent from the header row.
    MissingColumn { column: String, header: String },
    /// The file has no header row at all.
    Empty,
}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Io(e) => Some(e),
            DatasetError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DatasetError::Io(ref e) => write!(f, "Could not read dataset: {}", e),
            DatasetError::Csv(ref e) => write!(f, "Dataset CSV format error: {}", e),
            DatasetError::MissingColumn { ref column, ref header } => {
                write!(f, "Missing required column '{}' in header: {}", column, header)
            }
            DatasetError::Empty => write!(f, "Dataset is empty (no header row)"),
        }
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(e: std::io::Error) -> Self {
        DatasetError::Io(e)
    }
}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        DatasetError::Csv(e)
    }
}

/// Failure while writing a dataset or report to disk.
///
/// Export is a terminal step: the records stay in memory and the export can
/// be retried against another path.
#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// The configured field delimiter is not a single ASCII character.
    InvalidDelimiter(char),
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Csv(e) => Some(e),
            ExportError::InvalidDelimiter(_) => None,
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExportError::Io(ref e) => write!(f, "Export failed: {}", e),
            ExportError::Csv(ref e) => write!(f, "Export failed while writing CSV: {}", e),
            ExportError::InvalidDelimiter(c) => {
                write!(f, "Delimiter {:?} is not a single ASCII character", c)
            }
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e)
    }
}
