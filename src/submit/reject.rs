// src/submit/reject.rs
//! Share rejection policy
//!
//! A closed taxonomy of rejection reasons, each mapped 1:1 to a stable
//! protocol error code and message. Declaration order is check-priority
//! order: validation stops at the first applicable reason, so responses are
//! stable and reproducible for a given input.

use std::fmt;

/// Reason a share submission was rejected
///
/// The derived `Ord` follows declaration order and matches the order in
/// which the submission processor runs its checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectReason {
    /// Connection has not been authorized for submissions
    Unauthorized,
    /// Request could not be decoded at all
    MalformedRequest,
    /// Job id does not resolve to any known job
    JobNotFound,
    /// Job id refers to a retired job (template superseded or height advanced)
    StaleJob,
    /// Extranonce2 does not decode to the job's configured byte length
    BadExtranonceSize,
    /// Time, nonce, or version field is not well-formed hex of the expected width
    MalformedParams,
    /// Identical (worker, job, extranonce2, time, nonce) tuple already accepted
    DuplicateShare,
    /// Hash does not satisfy the connection's share target
    LowDifficultyShare,
}

impl RejectReason {
    /// Stable protocol error code sent in the JSON-RPC error triple.
    pub const fn code(self) -> i32 {
        match self {
            RejectReason::Unauthorized => 24,
            RejectReason::MalformedRequest => 20,
            RejectReason::JobNotFound => 21,
            RejectReason::StaleJob => 21,
            RejectReason::BadExtranonceSize => 20,
            RejectReason::MalformedParams => 20,
            RejectReason::DuplicateShare => 22,
            RejectReason::LowDifficultyShare => 23,
        }
    }

    /// Stable human-readable message sent alongside the code.
    pub const fn message(self) -> &'static str {
        match self {
            RejectReason::Unauthorized => "Unauthorized worker",
            RejectReason::MalformedRequest => "Malformed request",
            RejectReason::JobNotFound => "Job not found",
            RejectReason::StaleJob => "Stale job",
            RejectReason::BadExtranonceSize => "Invalid extranonce2 size",
            RejectReason::MalformedParams => "Malformed submit parameters",
            RejectReason::DuplicateShare => "Duplicate share",
            RejectReason::LowDifficultyShare => "Low difficulty share",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every reason maps to a nonzero code and a nonempty message.
    #[test]
    fn test_all_reasons_mapped() {
        let all = [
            RejectReason::Unauthorized,
            RejectReason::MalformedRequest,
            RejectReason::JobNotFound,
            RejectReason::StaleJob,
            RejectReason::BadExtranonceSize,
            RejectReason::MalformedParams,
            RejectReason::DuplicateShare,
            RejectReason::LowDifficultyShare,
        ];
        for reason in all {
            assert!(reason.code() > 0);
            assert!(!reason.message().is_empty());
        }
    }

    /// Priority order follows declaration order: an authorization failure
    /// outranks everything, and difficulty is the last thing checked.
    #[test]
    fn test_priority_order() {
        assert!(RejectReason::Unauthorized < RejectReason::JobNotFound);
        assert!(RejectReason::JobNotFound < RejectReason::BadExtranonceSize);
        assert!(RejectReason::BadExtranonceSize < RejectReason::DuplicateShare);
        assert!(RejectReason::DuplicateShare < RejectReason::LowDifficultyShare);
    }
}
