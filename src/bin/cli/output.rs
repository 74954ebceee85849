//! Output formatting for CLI operations.

use serde_json::json;
use zextract::CacheStats;

/// One row of a listing.
#[derive(Debug, Clone)]
pub struct ListRow {
    pub index: u32,
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub block: Option<u32>,
    pub crc32: Option<u32>,
}

/// Outcome of an extract run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub entries_extracted: usize,
    pub entries_skipped: usize,
    pub bytes_extracted: u64,
    pub failures: Vec<(String, String)>,
    pub cache: CacheStats,
}

impl ExtractReport {
    /// Returns true if no entry failed.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats a list of entries
    fn format_list(&self, rows: &[ListRow], technical: bool) -> String;

    /// Formats extraction results
    fn format_extract_result(&self, report: &ExtractReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, rows: &[ListRow], technical: bool) -> String {
        let mut output = String::new();

        if technical {
            output.push_str(&format!(
                "{:>6} {:>12} {:>6} {:>10} {}\n",
                "Index", "Size", "Block", "CRC", "Name"
            ));
        } else {
            output.push_str(&format!("{:>12} {}\n", "Size", "Name"));
        }
        output.push_str(&"-".repeat(70));
        output.push('\n');

        let mut total_size: u64 = 0;
        let mut file_count = 0;
        let mut dir_count = 0;

        for row in rows {
            if row.is_directory {
                dir_count += 1;
            } else {
                file_count += 1;
                total_size += row.size;
            }

            let size_str = if row.is_directory {
                String::new()
            } else {
                humanize_bytes(row.size)
            };
            let type_indicator = if row.is_directory { "/" } else { "" };

            if technical {
                let block_str = row
                    .block
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let crc_str = row
                    .crc32
                    .map(|c| format!("{:08X}", c))
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(
                    "{:>6} {:>12} {:>6} {:>10} {}{}\n",
                    row.index, size_str, block_str, crc_str, row.path, type_indicator
                ));
            } else {
                output.push_str(&format!(
                    "{:>12} {}{}\n",
                    size_str, row.path, type_indicator
                ));
            }
        }

        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} files, {} directories, {} total\n",
            file_count,
            dir_count,
            humanize_bytes(total_size)
        ));

        output
    }

    fn format_extract_result(&self, report: &ExtractReport) -> String {
        let mut output = String::new();

        if report.is_ok() {
            output.push_str(&format!(
                "Extracted {} files ({})\n",
                report.entries_extracted,
                humanize_bytes(report.bytes_extracted)
            ));
            if report.entries_skipped > 0 {
                output.push_str(&format!("Skipped {} files\n", report.entries_skipped));
            }
        } else {
            output.push_str("Extraction completed with errors:\n");
            output.push_str(&format!("  Extracted: {}\n", report.entries_extracted));
            output.push_str(&format!("  Skipped:   {}\n", report.entries_skipped));
            output.push_str(&format!("  Failed:    {}\n", report.failures.len()));

            output.push_str("\nFailures:\n");
            for (path, error) in &report.failures {
                output.push_str(&format!("  {}: {}\n", path, error));
            }
        }

        output.push_str(&format!(
            "Blocks decoded: {}, cache hits: {} ({:.0}%)\n",
            report.cache.misses,
            report.cache.hits,
            report.cache.hit_ratio() * 100.0
        ));

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, rows: &[ListRow], _technical: bool) -> String {
        let items: Vec<_> = rows
            .iter()
            .map(|r| {
                json!({
                    "index": r.index,
                    "path": r.path,
                    "size": r.size,
                    "is_directory": r.is_directory,
                    "block": r.block,
                    "crc32": r.crc32,
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_extract_result(&self, report: &ExtractReport) -> String {
        let obj = json!({
            "success": report.is_ok(),
            "entries_extracted": report.entries_extracted,
            "entries_skipped": report.entries_skipped,
            "entries_failed": report.failures.len(),
            "bytes_extracted": report.bytes_extracted,
            "failures": report.failures.iter().map(|(p, e)| json!({"path": p, "error": e})).collect::<Vec<_>>(),
            "cache": {
                "hits": report.cache.hits,
                "misses": report.cache.misses,
                "failures": report.cache.failures,
                "bytes_decoded": report.cache.bytes_decoded,
            },
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
