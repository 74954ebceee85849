//! Command implementations for the CLI tool.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Component, Path, PathBuf};

use zextract::{Archive, ArchiveConfig, ArchiveIndex, SpillPolicy};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::file_selector::FileSelector;
use crate::output::{ExtractReport, ListRow, create_formatter};

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub include: &'a [String],
    pub exclude: &'a [String],
    pub verify_crc: bool,
    pub spill: SpillPolicy,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Extract command implementation
pub fn extract(config: &ExtractConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    let selector = match FileSelector::new(config.include, config.exclude) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    let archive_config = ArchiveConfig::new()
        .spill(config.spill)
        .verify_crc(config.verify_crc);
    let mut archive = match open_archive(config.archive_path, archive_config) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = fs::create_dir_all(config.output_dir) {
        eprintln!("Error creating output directory: {}", e);
        return ExitCode::IoError;
    }

    let mut report = ExtractReport::default();

    // Entries are visited in index order so that entries sharing a solid
    // block are served from the cache after the first decode.
    for index in 0..archive.file_count() {
        let (path, is_directory) = match archive.metadata(index) {
            Ok(meta) => (meta.name_string(), meta.is_directory),
            Err(e) => {
                eprintln!("{}", skipped_entry_warning(index, &e));
                report.entries_skipped += 1;
                continue;
            }
        };

        if !selector.matches(&path) {
            continue;
        }

        let Some(relative) = sanitize_path(&path) else {
            eprintln!("Warning: skipping unsafe path {}", path);
            report.entries_skipped += 1;
            continue;
        };
        let target = config.output_dir.join(relative);

        let result = if is_directory {
            fs::create_dir_all(&target).map(|()| 0).map_err(|e| e.to_string())
        } else {
            write_entry(&mut archive, index, &target)
        };

        match result {
            Ok(bytes) => {
                if !config.quiet && config.format == OutputFormat::Human {
                    println!("  {}", path);
                }
                report.entries_extracted += 1;
                report.bytes_extracted += bytes;
            }
            Err(e) => report.failures.push((path, e)),
        }
    }

    report.cache = archive.cache_stats();
    archive.close();

    print!("{}", formatter.format_extract_result(&report));

    if report.is_ok() && report.entries_skipped == 0 {
        ExitCode::Success
    } else {
        ExitCode::Warning
    }
}

/// List command implementation
pub fn list(
    archive_path: &Path,
    technical: bool,
    spill: SpillPolicy,
    format: OutputFormat,
) -> ExitCode {
    let formatter = create_formatter(format);

    let mut archive = match open_archive(archive_path, ArchiveConfig::new().spill(spill)) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let mut rows = Vec::with_capacity(archive.file_count() as usize);
    let mut skipped = 0usize;

    for index in 0..archive.file_count() {
        let (path, size, is_directory) = match archive.metadata(index) {
            Ok(meta) => (meta.name_string(), meta.size, meta.is_directory),
            Err(e) => {
                eprintln!("{}", skipped_entry_warning(index, &e));
                skipped += 1;
                continue;
            }
        };

        let sevenz = archive.index();
        rows.push(ListRow {
            index,
            path,
            size,
            is_directory,
            block: sevenz.block_of(index),
            crc32: sevenz.entry_crc(index),
        });
    }

    print!("{}", formatter.format_list(&rows, technical));

    if skipped == 0 {
        ExitCode::Success
    } else {
        ExitCode::Warning
    }
}

fn open_archive(path: &Path, config: ArchiveConfig) -> Result<Archive, ExitCode> {
    Archive::open_path_with_config(path, config).map_err(|e| {
        eprintln!("Error opening archive: {}", e);
        error_to_exit_code(&e)
    })
}

fn write_entry(archive: &mut Archive, index: u32, target: &Path) -> Result<u64, String> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let file = File::create(target).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    archive
        .extract_to(index, &mut writer)
        .map_err(|e| e.to_string())
}

/// Maps an archive path onto a relative filesystem path.
///
/// Returns `None` for paths that would escape the output directory.
fn sanitize_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Formats the stderr line for an entry whose metadata could not be read.
fn skipped_entry_warning(index: u32, err: &zextract::Error) -> String {
    format!("Warning: skipping entry {}: {}", index, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("a/b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(sanitize_path("a\\b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(sanitize_path("/etc/passwd"), Some(PathBuf::from("etc/passwd")));
        assert_eq!(sanitize_path("./x"), Some(PathBuf::from("x")));
        assert_eq!(sanitize_path("../escape"), None);
        assert_eq!(sanitize_path("a/../../b"), None);
        assert_eq!(sanitize_path(""), None);
    }

    #[test]
    fn test_skipped_entry_warning() {
        let err = zextract::Error::NameDecode {
            index: 3,
            source: zextract::DecoderError::new(zextract::Status::Data, "bad name"),
        };
        let line = skipped_entry_warning(3, &err);
        assert!(line.starts_with("Warning: skipping entry 3: "));
        assert!(line.contains("bad name"));
        assert_eq!(line.lines().count(), 1);
    }
}
