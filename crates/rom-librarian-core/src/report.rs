use chrono::{DateTime, Utc};
use csv::Writer;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;
use tracing::info;

use crate::compare::ComparisonResult;
use crate::error::Error;
use crate::grouping::DuplicateGroup;
use crate::model::FileRecord;

const DUPLICATE_HEADERS: [&str; 10] = [
    "group",
    "wasted_bytes",
    "crc32",
    "sha1",
    "action",
    "file_size",
    "last_modified",
    "path",
    "canonical_name",
    "md5",
];

/// Writes one row per group member, groups ordered by wasted bytes descending.
pub fn write_duplicate_report<W: Write>(
    groups: &[DuplicateGroup],
    out: W,
) -> Result<usize, Error> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(DUPLICATE_HEADERS)?;

    let mut order: Vec<&DuplicateGroup> = groups.iter().collect();
    // stable sort keeps scan order among equal waste
    order.sort_by(|a, b| b.wasted_bytes().cmp(&a.wasted_bytes()));

    let mut rows = 0;
    for (index, group) in order.iter().enumerate() {
        let undecided = group.requires_input();
        for member in &group.members {
            let action = match (undecided, member.keep) {
                (true, _) => "undecided",
                (false, true) => "keep",
                (false, false) => "delete",
            };
            writer.write_record(&[
                (index + 1).to_string(),
                group.wasted_bytes().to_string(),
                group.identity.crc32_hex(),
                group.identity.sha1_hex(),
                action.to_string(),
                member.record.size.to_string(),
                format_time(member.record.modified),
                member.record.path.to_string_lossy().into_owned(),
                group.canonical_name.clone().unwrap_or_default(),
                group.identity.md5_hex(),
            ])?;
            rows += 1;
        }
    }

    writer.flush()?;
    Ok(rows)
}

pub fn export_duplicate_report(groups: &[DuplicateGroup], path: &Path) -> Result<usize, Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let rows = write_duplicate_report(groups, file)?;
    info!("Wrote {} report rows to {}", rows, path.display());
    Ok(rows)
}

/// Flat listing of a comparison: side, status, key, path.
pub fn write_comparison_report<W: Write>(
    result: &ComparisonResult,
    out: W,
) -> Result<usize, Error> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(["status", "side", "key", "path"])?;

    let mut rows = 0;
    for record in &result.only_in_a {
        write_row(&mut writer, "only_in_a", "a", "", record)?;
        rows += 1;
    }
    for record in &result.only_in_b {
        write_row(&mut writer, "only_in_b", "b", "", record)?;
        rows += 1;
    }
    for (status, entries) in [("in_both", &result.in_both), ("mismatched", &result.mismatched)] {
        for entry in entries {
            for record in &entry.a {
                write_row(&mut writer, status, "a", &entry.key, record)?;
            }
            for record in &entry.b {
                write_row(&mut writer, status, "b", &entry.key, record)?;
            }
            rows += entry.a.len() + entry.b.len();
        }
    }

    writer.flush()?;
    Ok(rows)
}

fn write_row<W: Write>(
    writer: &mut Writer<W>,
    status: &str,
    side: &str,
    key: &str,
    record: &FileRecord,
) -> csv::Result<()> {
    let path = record.path.to_string_lossy();
    writer.write_record([status, side, key, path.as_ref()])
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
