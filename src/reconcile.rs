//! Per-file reconciliation against the destination index.

use crate::destination::DestinationIndex;
use crate::types::FileUnit;
use tracing::{info, warn};

/// Outcome of comparing one source file with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Present at the destination with the same size
    InSync,
    /// Not present at the destination
    Missing,
    /// Present with a different size; a partial or corrupted earlier transfer
    Mismatched { dest_size: u64 },
}

impl Reconciliation {
    /// Whether the file has to be transferred.
    pub fn needs_transfer(&self) -> bool {
        !matches!(self, Reconciliation::InSync)
    }

    /// Destination size observed during reconciliation.
    pub fn dest_size(&self, source_size: u64) -> Option<u64> {
        match self {
            Reconciliation::InSync => Some(source_size),
            Reconciliation::Missing => None,
            Reconciliation::Mismatched { dest_size } => Some(*dest_size),
        }
    }
}

/// Classifies `file` against `index`.
///
/// Size equality is the only signal: two different files of identical size
/// are indistinguishable.
pub fn decide(file: &FileUnit, index: &DestinationIndex) -> Reconciliation {
    match index.get(&file.name) {
        None => {
            info!("{} is missing from {}", file.path, index.table());
            Reconciliation::Missing
        }
        Some(dest_size) if dest_size != file.size_bytes => {
            warn!(
                "Size mismatch for {}: source={} bytes, destination={} bytes",
                file.path, file.size_bytes, dest_size
            );
            Reconciliation::Mismatched { dest_size }
        }
        Some(_) => Reconciliation::InSync,
    }
}
