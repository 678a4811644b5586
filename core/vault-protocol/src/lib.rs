//! Boundary types and validation for the Vault funnel.
//!
//! This crate is shared by the funnel core and the clients that talk to the
//! lead, form and scan endpoints, so both sides agree on payload shape.
//! Validation here is the form layer: the funnel reducer assumes anything it
//! receives has already passed `validate()`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Largest upload the scanner accepts (25 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;
pub const MAX_NOTES_CHARS: usize = 2000;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/heic",
    "image/webp",
];

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static RE_ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Form Payloads
// ═══════════════════════════════════════════════════════════════════════════════

/// Contact details submitted on the lead capture step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFormData {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

impl LeadFormData {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_text(&self.name, "name")?;
        require_text(&self.email, "email")?;
        if !RE_EMAIL.is_match(self.email.trim()) {
            return Err(ErrorInfo::new(
                "invalid_email",
                "email must be a valid address",
            ));
        }
        if let Some(phone) = self.phone.as_deref() {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            if !(10..=15).contains(&digits) {
                return Err(ErrorInfo::new(
                    "invalid_phone",
                    "phone must contain 10 to 15 digits",
                ));
            }
        }
        if let Some(zip) = self.zip.as_deref() {
            if !RE_ZIP.is_match(zip.trim()) {
                return Err(ErrorInfo::new("invalid_zip", "zip must be 5 digits or ZIP+4"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotAnswer {
    Yes,
    No,
}

/// Answer to "do you already have a document to scan?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotFormData {
    pub answer: PivotAnswer,
}

impl PivotFormData {
    /// Always valid once deserialized; kept for symmetry with the other payloads.
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetailsFormData {
    pub project_type: String,
    pub timeline: String,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProjectDetailsFormData {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_text(&self.project_type, "projectType")?;
        require_text(&self.timeline, "timeline")?;
        if let Some(notes) = self.notes.as_deref() {
            if notes.chars().count() > MAX_NOTES_CHARS {
                return Err(ErrorInfo::new(
                    "notes_too_long",
                    format!("notes must be {} characters or fewer", MAX_NOTES_CHARS),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPreference {
    Call,
    Email,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationFormData {
    pub preference: ContactPreference,
    #[serde(default)]
    pub best_time: Option<String>,
}

impl EscalationFormData {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if let Some(best_time) = self.best_time.as_deref() {
            require_text(best_time, "bestTime")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scan Payloads
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl FileMetadata {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_text(&self.name, "name")?;
        if self.size_bytes == 0 {
            return Err(ErrorInfo::new("empty_file", "uploaded file is empty"));
        }
        if self.size_bytes > MAX_UPLOAD_BYTES {
            return Err(ErrorInfo::new(
                "file_too_large",
                format!("uploaded file must be {} bytes or fewer", MAX_UPLOAD_BYTES),
            ));
        }
        if !ALLOWED_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(ErrorInfo::new(
                "unsupported_file_type",
                format!("{} is not a supported file type", self.mime_type),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanScores {
    pub pricing: u8,
    pub scope: u8,
    pub warranty: u8,
    pub fine_print: u8,
    pub safety: u8,
}

impl ScanScores {
    fn named(&self) -> [(&'static str, u8); 5] {
        [
            ("pricing", self.pricing),
            ("scope", self.scope),
            ("warranty", self.warranty),
            ("finePrint", self.fine_print),
            ("safety", self.safety),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsRange {
    pub low: u64,
    pub high: u64,
}

/// Result returned by the remote scan endpoint. Only its shape is checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scores: ScanScores,
    pub overall: u8,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub missing_items: Vec<String>,
    #[serde(default)]
    pub savings: Option<SavingsRange>,
}

impl ScanResult {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        for (field, score) in self.scores.named() {
            require_score(score, field)?;
        }
        require_score(self.overall, "overall")?;
        if let Some(savings) = &self.savings {
            if savings.low > savings.high {
                return Err(ErrorInfo::new(
                    "invalid_savings",
                    "savings.low must not exceed savings.high",
                ));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lead Lookup
// ═══════════════════════════════════════════════════════════════════════════════

/// Lead payload returned by the lookup endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// `{"lead": null}` is the explicit absence marker. The key itself is
/// required: a body without it (an error envelope, `{}`) is not an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadLookupResponse {
    #[serde(deserialize_with = "required_nullable")]
    pub lead: Option<LeadSummary>,
}

/// `Option` that still fails on a missing key (serde treats a missing
/// `Option` field as `None` unless a custom deserializer is set).
fn required_nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

fn require_text(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

fn require_score(value: u8, field: &str) -> Result<(), ErrorInfo> {
    if value > 100 {
        return Err(ErrorInfo::new(
            "invalid_score",
            format!("{} must be between 0 and 100", field),
        ));
    }
    Ok(())
}
