//! The targets list: one chat channel id per line, read fresh on every dispatch.

use std::path::Path;

use tracing::warn;

use crate::error::TargetError;
use crate::models::Target;
use crate::utils::read_lines;

/// Read the raw target entries. `Ok(None)` when the file does not exist.
///
/// Entries are returned unparsed so that a bad line is reported where it is
/// skipped, not here.
pub async fn read_targets(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    read_lines(path).await
}

/// Parse entries into targets, warning about and dropping the ones that are
/// not channel ids. Duplicate ids are kept once, first occurrence wins.
pub fn parse_targets(entries: &[String]) -> (Vec<Target>, Vec<TargetError>) {
    let mut targets: Vec<Target> = Vec::new();
    let mut rejected = Vec::new();
    for entry in entries {
        match entry.parse::<Target>() {
            Ok(target) if !targets.contains(&target) => targets.push(target),
            Ok(target) => warn!(%target, "Duplicate target id; posting once"),
            Err(e) => {
                warn!(entry = %entry, error = %e, "Skipping invalid target id");
                rejected.push(e);
            }
        }
    }
    (targets, rejected)
}
