//! File-backed submission store
//!
//! Submissions are kept in memory keyed by id and mirrored to a single
//! JSON file after every mutation, matching the client-local storage the
//! wizard writes to. Reviews transition a submission exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{
    BiometricScores, Identity, KycError, KycStatus, KycSubmission, ReviewDecision,
};

/// A new submission, before an id and timestamp are assigned
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub identity: Identity,
    pub id_card_image: String,
    pub selfie_image: String,
    pub biometric: BiometricScores,
}

/// Store of KYC submissions keyed by id
pub struct KycStore {
    path: PathBuf,
    submissions: RwLock<HashMap<String, KycSubmission>>,
}

impl KycStore {
    /// Open the store, loading any existing submissions from `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KycError> {
        let path = path.as_ref().to_path_buf();

        let submissions = if path.exists() {
            let data = std::fs::read_to_string(&path).map_err(|e| KycError::Io(e.to_string()))?;
            serde_json::from_str(&data).map_err(|e| KycError::Serialization(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            submissions: RwLock::new(submissions),
        })
    }

    /// Record a new submission; returns it with assigned id and timestamp
    pub fn submit(&self, new: NewSubmission) -> Result<KycSubmission, KycError> {
        new.identity.validate()?;

        let submission = KycSubmission {
            id: uuid::Uuid::new_v4().to_string(),
            identity: new.identity,
            id_card_image: new.id_card_image,
            selfie_image: new.selfie_image,
            biometric: new.biometric,
            status: KycStatus::Submitted,
            rejection_reason: None,
            reviewed_by: None,
            submitted_at: now_secs(),
            reviewed_at: None,
        };

        {
            let mut submissions = self
                .submissions
                .write()
                .map_err(|_| KycError::Io("store lock poisoned".to_string()))?;
            submissions.insert(submission.id.clone(), submission.clone());
        }
        self.persist()?;

        tracing::info!(id = %submission.id, "kyc submission recorded");
        Ok(submission)
    }

    pub fn get(&self, id: &str) -> Result<KycSubmission, KycError> {
        let submissions = self
            .submissions
            .read()
            .map_err(|_| KycError::Io("store lock poisoned".to_string()))?;
        submissions
            .get(id)
            .cloned()
            .ok_or_else(|| KycError::NotFound { id: id.to_string() })
    }

    /// All submissions, newest first
    pub fn list(&self) -> Result<Vec<KycSubmission>, KycError> {
        let submissions = self
            .submissions
            .read()
            .map_err(|_| KycError::Io("store lock poisoned".to_string()))?;
        let mut all: Vec<KycSubmission> = submissions.values().cloned().collect();
        all.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(all)
    }

    /// Apply an admin review. Only a `Submitted` submission may transition;
    /// a rejection must carry a reason.
    pub fn review(
        &self,
        id: &str,
        decision: ReviewDecision,
        reviewer: &str,
        reason: Option<String>,
    ) -> Result<KycSubmission, KycError> {
        if decision == ReviewDecision::Rejected && reason.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(KycError::Invalid {
                message: "Rejection requires a reason".to_string(),
            });
        }

        let updated = {
            let mut submissions = self
                .submissions
                .write()
                .map_err(|_| KycError::Io("store lock poisoned".to_string()))?;

            let submission = submissions
                .get_mut(id)
                .ok_or_else(|| KycError::NotFound { id: id.to_string() })?;

            if submission.status != KycStatus::Submitted {
                return Err(KycError::AlreadyReviewed { id: id.to_string() });
            }

            submission.status = match decision {
                ReviewDecision::Approved => KycStatus::Approved,
                ReviewDecision::Rejected => KycStatus::Rejected,
            };
            submission.rejection_reason = match decision {
                ReviewDecision::Rejected => reason,
                ReviewDecision::Approved => None,
            };
            submission.reviewed_by = Some(reviewer.to_string());
            submission.reviewed_at = Some(now_secs());
            submission.clone()
        };
        self.persist()?;

        tracing::info!(id, reviewer, status = ?updated.status, "kyc submission reviewed");
        Ok(updated)
    }

    fn persist(&self) -> Result<(), KycError> {
        let submissions = self
            .submissions
            .read()
            .map_err(|_| KycError::Io("store lock poisoned".to_string()))?;
        let data = serde_json::to_string_pretty(&*submissions)
            .map_err(|e| KycError::Serialization(e.to_string()))?;

        // Write-then-rename so a crash mid-write never truncates the store
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data).map_err(|e| KycError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| KycError::Io(e.to_string()))?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
