//! First-touch marketing attribution.
//!
//! The first page view in a browsing session that carries any marketing
//! identifier wins. Later page views read the stored record back and never
//! overwrite it. A page view with nothing to capture stores nothing, so a
//! later page that does carry parameters still gets its chance.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::{Position, Url};

use crate::storage::{RecordStore, ATTRIBUTION_KEY};

/// Browser id cookie set by the ad pixel.
pub const BROWSER_ID_COOKIE: &str = "_fbp";
/// Click id cookie set by the ad pixel after an ad click.
pub const CLICK_ID_COOKIE: &str = "_fbc";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionRecord {
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub gclid: Option<String>,
    #[serde(default)]
    pub fbclid: Option<String>,
    #[serde(default)]
    pub msclkid: Option<String>,
    #[serde(default)]
    pub fbp: Option<String>,
    #[serde(default)]
    pub fbc: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub landing_page: Option<String>,
}

impl AttributionRecord {
    /// True when at least one attribution signal is present.
    ///
    /// `landing_page` is context for a signal, not a signal: every page view
    /// has one.
    pub fn has_identifiers(&self) -> bool {
        [
            &self.utm_source,
            &self.utm_medium,
            &self.utm_campaign,
            &self.utm_term,
            &self.utm_content,
            &self.gclid,
            &self.fbclid,
            &self.msclkid,
            &self.fbp,
            &self.fbc,
            &self.referrer,
        ]
        .into_iter()
        .any(|value| value.is_some())
    }
}

/// What the capture step can see of the current page view.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageVisit<'a> {
    pub url: &'a str,
    /// Raw `Cookie` header (`a=1; b=2`).
    pub cookie_header: Option<&'a str>,
    pub referrer: Option<&'a str>,
}

/// Returns the session's first-touch attribution, capturing it if needed.
///
/// Never fails: storage problems are logged and the freshly extracted record
/// is returned without being persisted.
pub fn capture_attribution(store: &dyn RecordStore, visit: &PageVisit<'_>) -> AttributionRecord {
    match store.read(ATTRIBUTION_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<AttributionRecord>(&raw) {
            Ok(record) => return record,
            Err(err) => {
                warn!(error = %err, "Discarding corrupt attribution record");
                if let Err(err) = store.remove(ATTRIBUTION_KEY) {
                    warn!(error = %err, "Failed to remove corrupt attribution record");
                }
            }
        },
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "Failed to read attribution record");
        }
    }

    let record = extract_attribution(visit);
    if !record.has_identifiers() {
        debug!(url = visit.url, "No attribution identifiers on page view");
        return record;
    }

    match serde_json::to_string(&record) {
        Ok(payload) => {
            if let Err(err) = store.write(ATTRIBUTION_KEY, &payload) {
                warn!(error = %err, "Failed to persist attribution record");
            } else {
                debug!(source = ?record.utm_source, "Captured first-touch attribution");
            }
        }
        Err(err) => warn!(error = %err, "Failed to serialize attribution record"),
    }
    record
}

/// Pulls identifiers out of a page view without touching storage.
pub fn extract_attribution(visit: &PageVisit<'_>) -> AttributionRecord {
    let mut record = AttributionRecord::default();

    if let Ok(url) = Url::parse(visit.url) {
        for (name, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match &*name {
                "utm_source" => &mut record.utm_source,
                "utm_medium" => &mut record.utm_medium,
                "utm_campaign" => &mut record.utm_campaign,
                "utm_term" => &mut record.utm_term,
                "utm_content" => &mut record.utm_content,
                "gclid" => &mut record.gclid,
                "fbclid" => &mut record.fbclid,
                "msclkid" => &mut record.msclkid,
                _ => continue,
            };
            // First occurrence of a repeated parameter wins.
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        record.landing_page = Some(url[..Position::AfterPath].to_string());
    }

    if let Some(header) = visit.cookie_header {
        record.fbp = cookie_value(header, BROWSER_ID_COOKIE);
        record.fbc = cookie_value(header, CLICK_ID_COOKIE);
    }

    record.referrer = visit
        .referrer
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    record
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
