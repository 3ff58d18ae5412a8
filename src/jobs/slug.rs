//! Naming of the per-address HTML copy.

use std::path::{Path, PathBuf};

use crate::config::Destination;

/// Suffix of the HTML copy written next to the primary output in pretty mode.
pub const REPORT_SUFFIX: &str = ".report.html";

/// Stable file-name slug for an address.
///
/// Lowercases, drops the scheme, and collapses every run of characters outside
/// `[a-z0-9]` into a single `_`. An address with nothing left becomes `report`.
///
/// ```
/// assert_eq!(auditvisor::slug("https://Example.com/a/b?q=1"), "example_com_a_b_q_1");
/// ```
pub fn slug(address: &str) -> String {
    let lower = address.trim().to_ascii_lowercase();
    let rest = match lower.find("://") {
        Some(i) => &lower[i + 3..],
        None => lower.as_str(),
    };

    let mut out = String::with_capacity(rest.len());
    let mut pending_sep = false;
    for c in rest.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    if out.is_empty() {
        "report".to_string()
    } else {
        out
    }
}

/// Path of the HTML copy for `address`.
///
/// Placed in the directory of a file destination, or the working directory for stdout.
pub fn secondary_report_path(address: &str, destination: &Destination) -> PathBuf {
    let file = format!("{}{REPORT_SUFFIX}", slug(address));
    match destination {
        Destination::File(path) => match path.parent() {
            Some(dir) if dir != Path::new("") => dir.join(file),
            _ => PathBuf::from(file),
        },
        Destination::Stdout => PathBuf::from(file),
    }
}
