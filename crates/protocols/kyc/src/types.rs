//! KYC submission types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// NIK length (national identity number)
pub const NIK_DIGITS: usize = 16;

#[derive(Debug, Error)]
pub enum KycError {
    #[error("Invalid submission: {message}")]
    Invalid { message: String },

    #[error("Submission not found: {id}")]
    NotFound { id: String },

    #[error("Submission {id} was already reviewed")]
    AlreadyReviewed { id: String },

    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Review status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Submitted,
    Approved,
    Rejected,
}

/// Biometric check scores captured during the wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricScores {
    /// Face match between ID card photo and selfie, 0.0..=1.0
    pub face_match: f64,
    /// Liveness confidence, 0.0..=1.0
    pub liveness: f64,
}

/// Identity fields entered by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// National identity number, 16 digits
    pub nik: String,
    pub full_name: String,
    /// ISO date, e.g. "1990-04-17"
    pub date_of_birth: String,
    pub street_address: String,
}

impl Identity {
    pub fn validate(&self) -> Result<(), KycError> {
        if self.nik.len() != NIK_DIGITS || !self.nik.chars().all(|c| c.is_ascii_digit()) {
            return Err(KycError::Invalid {
                message: format!("NIK must be {} digits", NIK_DIGITS),
            });
        }
        if self.full_name.trim().is_empty() {
            return Err(KycError::Invalid {
                message: "Full name is required".to_string(),
            });
        }
        if self.date_of_birth.trim().is_empty() {
            return Err(KycError::Invalid {
                message: "Date of birth is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of an admin review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// A stored KYC submission.
///
/// Created on final wizard submission; mutated only by an admin review;
/// never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycSubmission {
    pub id: String,
    pub identity: Identity,
    /// Inline base64 image data, as uploaded
    pub id_card_image: String,
    pub selfie_image: String,
    pub biometric: BiometricScores,
    pub status: KycStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    /// Unix seconds
    pub submitted_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<u64>,
}
