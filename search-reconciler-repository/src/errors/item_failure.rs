//! Per-item failure causes reported by the bulk upsert engine.

use std::fmt;

/// Why a single bulk item was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFailureCause {
    /// The engine rejected the item (mapping violation, bad document, ...).
    Rejected {
        status: u16,
        error_type: String,
        reason: String,
    },
    /// Optimistic-concurrency conflicts persisted past the retry budget.
    ConflictExhausted { attempts: u32 },
    /// The batch carrying the item could not be delivered or decoded.
    Transport(String),
    /// The engine was cancelled before the item's outcome was known.
    Cancelled,
}

impl ItemFailureCause {
    pub fn is_transport(&self) -> bool {
        matches!(self, ItemFailureCause::Transport(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ItemFailureCause::Cancelled)
    }
}

impl fmt::Display for ItemFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemFailureCause::Rejected {
                status,
                error_type,
                reason,
            } => write!(f, "rejected with status {}: {}: {}", status, error_type, reason),
            ItemFailureCause::ConflictExhausted { attempts } => {
                write!(f, "version conflict after {} attempts", attempts)
            }
            ItemFailureCause::Transport(msg) => write!(f, "transport failure: {}", msg),
            ItemFailureCause::Cancelled => f.write_str("cancelled before completion"),
        }
    }
}
