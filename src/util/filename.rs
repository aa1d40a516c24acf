//! Table file naming conventions.
//!
//! Tables are named `NNNNNN.ldb`. Files written before that convention
//! used `NNNNNN.sst`; readers must accept both, modern name first.

use std::path::{Path, PathBuf};

/// Extension of table files written by current versions.
pub const TABLE_EXTENSION: &str = "ldb";

/// Extension of table files written by older versions.
pub const LEGACY_TABLE_EXTENSION: &str = "sst";

/// Naming convention of a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Table file under the current naming convention.
    Table,
    /// Table file under the legacy naming convention.
    LegacyTable,
}

/// Generate a table file path.
pub fn table_file_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{:06}.{}", number, TABLE_EXTENSION))
}

/// Generate a table file path under the legacy naming convention.
pub fn sst_table_file_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{:06}.{}", number, LEGACY_TABLE_EXTENSION))
}

/// Parse a file name and return its type and number.
///
/// Returns `None` if the file name doesn't match any known pattern.
pub fn parse_file_name(name: &str) -> Option<(FileType, u64)> {
    let dot_pos = name.rfind('.')?;
    let (num_str, ext) = name.split_at(dot_pos);
    let ext = &ext[1..]; // Skip the dot

    if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = num_str.parse::<u64>().ok()?;

    let file_type = match ext {
        TABLE_EXTENSION => FileType::Table,
        LEGACY_TABLE_EXTENSION => FileType::LegacyTable,
        _ => return None,
    };
    Some((file_type, number))
}

/// List the numbers of all table files in a directory, under either
/// naming convention, sorted and deduplicated.
pub fn list_table_files(dir: &Path) -> std::io::Result<Vec<u64>> {
    let mut numbers = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if let Some((_, number)) = parse_file_name(&name) {
            numbers.push(number);
        }
    }

    numbers.sort_unstable();
    numbers.dedup();
    Ok(numbers)
}

/// Create directory if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}
