//! CSV files selected for bulk upload.

use std::fmt;
use std::path::Path;

use crate::error::{ReportsError, Result};

/// Column order the upload endpoint expects in the CSV header.
pub const CSV_COLUMNS: [&str; 5] = [
    "ngo_id",
    "month",
    "people_helped",
    "events_conducted",
    "funds_utilized",
];

/// MIME type sent with the file part.
pub const CSV_MIME: &str = "text/csv";

/// A CSV file ready to be sent to the upload endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct CsvUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for CsvUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl CsvUpload {
    /// Wraps file contents, rejecting names without a `.csv` extension.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let file_name = file_name.into();
        let is_csv = Path::new(&file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(ReportsError::InvalidParameter(
                "Please select a CSV file".to_string(),
            ));
        }
        Ok(Self {
            file_name,
            bytes: bytes.into(),
        })
    }

    /// The file name sent in the multipart part.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The raw file contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true when the first line lists [`CSV_COLUMNS`] in order.
    ///
    /// The server enforces the layout; this only lets a front end warn early.
    #[must_use]
    pub fn has_expected_header(&self) -> bool {
        let text = String::from_utf8_lossy(&self.bytes);
        let Some(header) = text.lines().next() else {
            return false;
        };
        let header = header.trim_start_matches('\u{feff}');
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        columns == CSV_COLUMNS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_csv_names() {
        let err = CsvUpload::new("reports.xlsx", b"x".to_vec()).unwrap_err();
        assert_eq!(
            err,
            ReportsError::InvalidParameter("Please select a CSV file".into())
        );
        assert!(CsvUpload::new("reports", Vec::new()).is_err());
        assert!(CsvUpload::new("REPORTS.CSV", Vec::new()).is_ok());
    }

    #[test]
    fn test_header_check() {
        let good = CsvUpload::new(
            "ok.csv",
            "ngo_id,month,people_helped,events_conducted,funds_utilized\nNGO_001,2025-09,120,5,75000\n",
        )
        .unwrap();
        assert!(good.has_expected_header());

        let reordered = CsvUpload::new(
            "bad.csv",
            "month,ngo_id,people_helped,events_conducted,funds_utilized\n",
        )
        .unwrap();
        assert!(!reordered.has_expected_header());

        let empty = CsvUpload::new("empty.csv", Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.has_expected_header());
    }

    #[test]
    fn test_debug_omits_contents() {
        let upload = CsvUpload::new("data.csv", "secret,row").unwrap();
        let debug = format!("{upload:?}");
        assert!(debug.contains("data.csv"));
        assert!(!debug.contains("secret"));
    }
}
