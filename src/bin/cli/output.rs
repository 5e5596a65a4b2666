//! Output formatting for CLI operations.

use arcfold::{AddReport, DeleteReport, ExtractReport, FolderRow, MarkerOutcome, Member};
use serde_json::json;

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats the rows of a folder listing
    fn format_list(&self, folder: &str, rows: &[FolderRow]) -> String;

    /// Formats search hits
    fn format_search(&self, needle: &str, hits: &[Member]) -> String;

    /// Formats the outcome of adding files
    fn format_add_result(&self, report: &AddReport) -> String;

    /// Formats the outcome of creating a folder marker
    fn format_marker_result(&self, outcome: &MarkerOutcome) -> String;

    /// Formats the outcome of a deletion
    fn format_delete_result(&self, report: &DeleteReport) -> String;

    /// Formats extraction results
    fn format_extract_result(&self, report: &ExtractReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl HumanFormatter {
    fn table_row(size: Option<u64>, modified: Option<String>, name: &str) -> String {
        format!(
            "{:>12} {:>19} {}\n",
            size.map(humanize_bytes).unwrap_or_default(),
            modified.unwrap_or_else(|| "-".to_string()),
            name
        )
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, folder: &str, rows: &[FolderRow]) -> String {
        let mut output = String::new();

        if !folder.is_empty() {
            output.push_str(&format!("Folder: {}\n", folder));
        }
        output.push_str(&format!("{:>12} {:>19} {}\n", "Size", "Modified", "Name"));
        output.push_str(&"-".repeat(70));
        output.push('\n');

        let mut total_size: u64 = 0;
        let mut file_count = 0;
        let mut dir_count = 0;

        for row in rows {
            let modified = row
                .member
                .as_ref()
                .and_then(|m| m.modified_at)
                .map(|t| t.to_string());
            if row.is_folder() {
                dir_count += 1;
                output.push_str(&Self::table_row(None, modified, &row.display_name));
            } else {
                file_count += 1;
                total_size += row.size();
                output.push_str(&Self::table_row(
                    Some(row.size()),
                    modified,
                    &row.display_name,
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

    fn format_search(&self, needle: &str, hits: &[Member]) -> String {
        if hits.is_empty() {
            return format!("No members match '{}'\n", needle);
        }

        let mut output = String::new();
        for member in hits {
            let size = (!member.is_folder_marker()).then_some(member.size);
            let modified = member.modified_at.map(|t| t.to_string());
            output.push_str(&Self::table_row(size, modified, &member.path));
        }
        output.push_str(&format!("{} match(es)\n", hits.len()));
        output
    }

    fn format_add_result(&self, report: &AddReport) -> String {
        let mut output = format!(
            "Added {} files ({})\n",
            report.added.len(),
            humanize_bytes(report.bytes_added)
        );

        if !report.failures.is_empty() {
            output.push_str("\nFailures:\n");
            for (path, error) in &report.failures {
                output.push_str(&format!("  {}: {}\n", path.display(), error));
            }
        }

        output
    }

    fn format_marker_result(&self, outcome: &MarkerOutcome) -> String {
        format!("{}\n", outcome)
    }

    fn format_delete_result(&self, report: &DeleteReport) -> String {
        let mut output = format!(
            "Deleted {} members, kept {}\n",
            report.entries_removed, report.entries_kept
        );
        output.push_str(&format!(
            "Archive size: {} -> {}\n",
            humanize_bytes(report.size_before),
            humanize_bytes(report.size_after)
        ));
        output
    }

    fn format_extract_result(&self, report: &ExtractReport) -> String {
        let mut output = format!(
            "Extracted {} files ({}) to {}\n",
            report.files_written,
            humanize_bytes(report.bytes_written),
            report.destination.display()
        );
        if report.folders_created > 0 {
            output.push_str(&format!("Created {} folders\n", report.folders_created));
        }
        if report.entries_skipped > 0 {
            output.push_str(&format!("Skipped {} files\n", report.entries_skipped));
        }
        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

fn member_json(member: &Member) -> serde_json::Value {
    json!({
        "path": member.path,
        "size": member.size,
        "modified": member.modified_at.map(|t| t.as_unix_secs()),
        "is_directory": member.is_folder_marker(),
    })
}

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, folder: &str, rows: &[FolderRow]) -> String {
        let items: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "name": row.display_name,
                    "is_folder": row.is_folder(),
                    "member": row.member.as_ref().map(member_json),
                })
            })
            .collect();

        let obj = json!({ "folder": folder, "rows": items });
        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_search(&self, _needle: &str, hits: &[Member]) -> String {
        let items: Vec<_> = hits.iter().map(member_json).collect();
        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_add_result(&self, report: &AddReport) -> String {
        let obj = json!({
            "success": report.is_ok(),
            "added": report.added,
            "bytes_added": report.bytes_added,
            "failures": report.failures.iter().map(|(p, e)| json!({"path": p.display().to_string(), "error": e})).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_marker_result(&self, outcome: &MarkerOutcome) -> String {
        let obj = json!({
            "path": outcome.path(),
            "created": matches!(outcome, MarkerOutcome::Created(_)),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_delete_result(&self, report: &DeleteReport) -> String {
        let obj = json!({
            "deleted": report.deleted,
            "entries_removed": report.entries_removed,
            "entries_kept": report.entries_kept,
            "size_before": report.size_before,
            "size_after": report.size_after,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_extract_result(&self, report: &ExtractReport) -> String {
        let obj = json!({
            "destination": report.destination.display().to_string(),
            "files_written": report.files_written,
            "folders_created": report.folders_created,
            "entries_skipped": report.entries_skipped,
            "bytes_written": report.bytes_written,
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
