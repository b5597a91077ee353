//! Client-side payment checks. Everything here runs before any network call.
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::model::{Amount, PaymentDraft, PaymentMethod};
use crate::error::ValidationError;

pub const MAX_ATTACHMENT_BYTES: u64 = 2 * 1024 * 1024;
pub const MAX_REFERENCE_CHARS: usize = 100;
pub const MAX_NOTES_CHARS: usize = 1000;

const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

/// What the host knows about a picked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedAttachment {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub path: PathBuf,
    pub sha256: String,
}

/// `image/jpg` is a common browser alias of `image/jpeg`.
pub fn normalize_mime(raw: &str) -> String {
    let t = raw.trim().to_ascii_lowercase();
    match t.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => t,
    }
}

pub fn mime_from_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Type is checked before size, so an unsupported file is reported as such
/// whatever its size.
pub fn validate_attachment(file: &AttachmentFile) -> Result<(), ValidationError> {
    let mime = normalize_mime(&file.mime_type);
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(ValidationError::UnsupportedType(file.mime_type.clone()));
    }
    if file.size_bytes > MAX_ATTACHMENT_BYTES {
        return Err(ValidationError::TooLarge {
            size: file.size_bytes,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

fn read_limited(path: &Path) -> Result<Vec<u8>, ValidationError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ValidationError::field("attachment", format!("cannot read file: {e}")))?;
    let mut buf = Vec::new();
    // One byte past the limit is enough to notice growth.
    file.take(MAX_ATTACHMENT_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| ValidationError::field("attachment", format!("cannot read file: {e}")))?;
    Ok(buf)
}

fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Validates a file on disk. The MIME type comes from the host when it has
/// one, otherwise from the extension.
pub fn inspect_file(path: &Path, mime_hint: Option<&str>) -> Result<ValidatedAttachment, ValidationError> {
    let meta = std::fs::metadata(path)
        .map_err(|e| ValidationError::field("attachment", format!("cannot read file: {e}")))?;
    if !meta.is_file() {
        return Err(ValidationError::field("attachment", "not a regular file"));
    }
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let mime_type = match mime_hint {
        Some(m) if !m.trim().is_empty() => m.to_string(),
        _ => mime_from_extension(path),
    };
    let candidate = AttachmentFile {
        filename,
        mime_type,
        size_bytes: meta.len(),
    };
    validate_attachment(&candidate)?;
    seal(candidate, path, read_limited(path)?)
}

/// Checks the bytes actually read; the file may have grown since the
/// metadata was taken.
fn seal(
    candidate: AttachmentFile,
    path: &Path,
    bytes: Vec<u8>,
) -> Result<ValidatedAttachment, ValidationError> {
    let size_bytes = bytes.len() as u64;
    validate_attachment(&AttachmentFile {
        size_bytes,
        ..candidate.clone()
    })?;
    Ok(ValidatedAttachment {
        filename: candidate.filename,
        mime_type: normalize_mime(&candidate.mime_type),
        size_bytes,
        path: path.to_path_buf(),
        sha256: digest_hex(&bytes),
    })
}

/// Re-reads an attachment for upload and confirms it is what was validated.
pub fn load_attachment(att: &ValidatedAttachment) -> Result<Vec<u8>, ValidationError> {
    let bytes = read_limited(&att.path)?;
    if bytes.len() as u64 != att.size_bytes || digest_hex(&bytes) != att.sha256 {
        return Err(ValidationError::AttachmentChanged);
    }
    Ok(bytes)
}

/// A draft that passed every client-side rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub amount: Amount,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub month: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

fn parse_month(raw: &str) -> Result<String, ValidationError> {
    let t = raw.trim();
    let bytes = t.as_bytes();
    let shaped = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(|b| b.is_ascii_digit())
        && bytes[5..].iter().all(|b| b.is_ascii_digit());
    if !shaped {
        return Err(ValidationError::field("month", "must be YYYY-MM"));
    }
    let year: i32 = t[..4]
        .parse()
        .map_err(|_| ValidationError::field("month", "must be YYYY-MM"))?;
    let month: u32 = t[5..]
        .parse()
        .map_err(|_| ValidationError::field("month", "must be YYYY-MM"))?;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(ValidationError::field("month", "month must be between 01 and 12"));
    }
    Ok(t.to_string())
}

fn optional_text(
    raw: &Option<String>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(v) = raw.as_deref() else {
        return Ok(None);
    };
    if v.trim().is_empty() {
        return Ok(None);
    }
    if v.chars().count() > max {
        return Err(ValidationError::field(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(Some(v.to_string()))
}

/// Date and month are checked independently; a date outside the stated
/// month is passed through for the server to judge.
pub fn validate_draft(draft: &PaymentDraft) -> Result<ValidDraft, ValidationError> {
    let amount =
        Amount::parse(&draft.amount).map_err(|e| ValidationError::field("amount", e))?;
    if amount < Amount::MIN {
        return Err(ValidationError::field("amount", "must be at least 0.01"));
    }
    if amount > Amount::MAX {
        return Err(ValidationError::field("amount", "must be at most 999999.99"));
    }
    let method: PaymentMethod = draft
        .method
        .trim()
        .parse()
        .map_err(|e: String| ValidationError::field("method", e))?;
    let date = NaiveDate::parse_from_str(draft.date.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::field("date", "must be a valid YYYY-MM-DD date"))?;
    let month = parse_month(&draft.month)?;
    let reference = optional_text(&draft.reference, "reference", MAX_REFERENCE_CHARS)?;
    let notes = optional_text(&draft.notes, "notes", MAX_NOTES_CHARS)?;

    Ok(ValidDraft {
        amount,
        method,
        date,
        month,
        reference,
        notes,
    })
}
