//! Ownership-partitioned merge of a domain's tags into a ledger tag list.

use super::Domain;
use crate::error::{LedgerError, Result};

/// Reject any desired tag the domain does not own.
pub fn check_ownership(domain: Domain, desired: &[String]) -> Result<()> {
    match desired.iter().find(|tag| !domain.owns(tag)) {
        Some(tag) => Err(LedgerError::OwnershipViolation {
            domain,
            tag: tag.clone(),
        }),
        None => Ok(()),
    }
}

/// Tags in `current` owned by `domain`, in ledger order.
pub fn owned_by(domain: Domain, current: &[String]) -> Vec<String> {
    current.iter().filter(|t| domain.owns(t)).cloned().collect()
}

/// Replace the tags `domain` owns in `current` with `desired`.
///
/// Tags owned by anyone else (or nobody) are kept untouched and in place.
/// Owned tags that remain desired also keep their position; newly desired
/// tags are appended in the order given. Duplicates are dropped.
pub fn merge_owned(domain: Domain, current: &[String], desired: &[String]) -> Result<Vec<String>> {
    check_ownership(domain, desired)?;

    let mut merged: Vec<String> = Vec::with_capacity(current.len() + desired.len());
    for tag in current {
        let keep = !domain.owns(tag) || desired.contains(tag);
        if keep && !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    for tag in desired {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    Ok(merged)
}
