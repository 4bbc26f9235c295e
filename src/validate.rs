//! Validate command - Check a generated .csv file for a consistent shape

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Outcome of reading a generated CSV back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvCheck {
    pub columns: usize,
    pub rows: usize,
    pub errors: Vec<String>,
}

impl CsvCheck {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Read `path` back and check it:
/// - the header is present and has no duplicate column names
/// - every row has exactly as many fields as the header
pub fn check_csv(path: &Path) -> Result<CsvCheck> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut check = CsvCheck::default();
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();
    check.columns = headers.len();

    if headers.iter().all(|h| h.is_empty()) {
        check.errors.push("[ERROR] Header is empty".to_string());
    }
    let mut seen = HashSet::new();
    for name in headers.iter() {
        if !seen.insert(name) {
            check
                .errors
                .push(format!("[ERROR] Column \"{}\" appears more than once", name));
        }
    }

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read row {}", i + 1))?;
        if record.len() != check.columns {
            check.errors.push(format!(
                "[ERROR] Row {} has {} fields, header has {}",
                i + 1,
                record.len(),
                check.columns
            ));
        }
        check.rows += 1;
    }

    Ok(check)
}

/// Validate a .csv file and print the verdict
pub fn validate_csv(csv_path: &str) -> Result<()> {
    let path = Path::new(csv_path);
    if !path.is_file() {
        println!("Validation of {}: FAILED", csv_path);
        println!("[ERROR] File does not exist");
        anyhow::bail!("{} does not exist", csv_path);
    }

    let check = check_csv(path)?;
    if check.passed() {
        println!("Validation of {}: PASSED", csv_path);
        println!("Columns: {}, Rows: {}", check.columns, check.rows);
        Ok(())
    } else {
        println!("Validation of {}: FAILED", csv_path);
        for error in &check.errors {
            println!("{}", error);
        }
        anyhow::bail!("validation failed with {} errors", check.errors.len())
    }
}
