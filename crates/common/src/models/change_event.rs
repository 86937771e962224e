use serde::{Deserialize, Serialize};

use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level mutation from the hosted database's change feed. For a
/// Delete, `row` is the row being removed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub row: Signal,
}
