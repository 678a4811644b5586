//! Lead existence check used before a restored session is trusted.
//!
//! Policy:
//! - Malformed lead id (not a lead number) → treated as absent. A session
//!   pointing at garbage is never resumed.
//! - Clean "not found" → absent. The funnel restarts.
//! - Lookup failure (transport, server error, bad payload) → treated as
//!   present. A visitor's real progress is not thrown away because the check
//!   itself could not run.
//!
//! The fail-open branch means a long outage keeps resuming sessions whose lead
//! may since have been deleted server-side.

use tracing::{info, warn};
use vault_protocol::LeadSummary;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("lead lookup not configured")]
    NotConfigured,
    #[error("lead lookup transport error: {0}")]
    Transport(String),
    #[error("lead lookup returned status {0}")]
    Status(u16),
    #[error("lead lookup returned an unreadable payload: {0}")]
    Decode(String),
}

/// Remote lookup of lead records by numeric id.
pub trait LeadDirectory {
    /// `Ok(None)` is an authoritative "no such lead".
    fn find_lead(&self, lead_id: u64) -> Result<Option<LeadSummary>, LookupError>;
}

impl<T: LeadDirectory + ?Sized> LeadDirectory for &T {
    fn find_lead(&self, lead_id: u64) -> Result<Option<LeadSummary>, LookupError> {
        (**self).find_lead(lead_id)
    }
}

/// Directory used when no lookup endpoint is configured. Every lookup fails,
/// so every lead-bearing session is resumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredDirectory;

impl LeadDirectory for UnconfiguredDirectory {
    fn find_lead(&self, _lead_id: u64) -> Result<Option<LeadSummary>, LookupError> {
        Err(LookupError::NotConfigured)
    }
}

/// Decides whether `lead_id` still exists. Never fails; only logs.
pub fn lead_exists(directory: &dyn LeadDirectory, lead_id: &str) -> bool {
    let parsed = match lead_id.trim().parse::<u64>() {
        Ok(id) => id,
        Err(err) => {
            warn!(lead_id = %lead_id, error = %err, "Malformed lead id; treating lead as absent");
            return false;
        }
    };

    match directory.find_lead(parsed) {
        Ok(Some(_)) => true,
        Ok(None) => {
            info!(lead_id = parsed, "Lead no longer exists");
            false
        }
        Err(err) => {
            warn!(
                lead_id = parsed,
                error = %err,
                "Lead lookup failed; assuming lead exists"
            );
            true
        }
    }
}
