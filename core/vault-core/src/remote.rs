//! HTTP lead directory.
//!
//! `GET {base_url}/leads/{id}`:
//! - 200 `{"lead": {...}}` → found
//! - 200 `{"lead": null}` or 404 → not found
//! - anything else, including a 200 body without a `lead` key → `LookupError`
//!   (the validator fails open on these)

use std::time::Duration;

use ureq::{Agent, AgentBuilder};
use vault_protocol::{LeadLookupResponse, LeadSummary};

use crate::validator::{LeadDirectory, LookupError};

pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct HttpLeadDirectory {
    base_url: String,
    agent: Agent,
}

impl HttpLeadDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = AgentBuilder::new().timeout(timeout).build();
        Self { base_url, agent }
    }

    pub fn lead_url(&self, lead_id: u64) -> String {
        format!("{}/leads/{}", self.base_url, lead_id)
    }
}

impl LeadDirectory for HttpLeadDirectory {
    fn find_lead(&self, lead_id: u64) -> Result<Option<LeadSummary>, LookupError> {
        let response = match self.agent.get(&self.lead_url(lead_id)).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(code, _)) => return Err(LookupError::Status(code)),
            Err(ureq::Error::Transport(transport)) => {
                return Err(LookupError::Transport(transport.to_string()))
            }
        };

        let payload: LeadLookupResponse = response
            .into_json()
            .map_err(|err| LookupError::Decode(err.to_string()))?;
        Ok(payload.lead)
    }
}
