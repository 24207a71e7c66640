//! The document aggregate and the rules its approval chain must satisfy
use crate::error::ValidationError;
use crate::model::{
    ApprovalStep, AuditEntry, DocumentId, DocumentStatus, DocumentVersion, StepStatus, TimeStamp,
    User, UserId,
};
use chrono::Utc;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Document {
    #[n(0)]
    pub id: DocumentId,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub summary: String,
    #[n(3)]
    pub sender: User,
    #[n(4)]
    pub status: DocumentStatus,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub updated_at: TimeStamp<Utc>,
    #[n(7)]
    pub version: u32,
    #[n(8)]
    pub category: String,
    #[n(9)]
    pub file_ref: String,
    #[n(10)]
    pub approval_chain: Vec<ApprovalStep>, // fixed membership and order once submitted
    #[n(11)]
    pub audit_log: Vec<AuditEntry>, // append only
    #[n(12)]
    pub version_history: Vec<DocumentVersion>, // append only
}

/// Index of the single actionable step, provided the chain has the shape
/// `approved* pending waiting*`.
pub fn pending_index(chain: &[ApprovalStep]) -> Result<usize, ValidationError> {
    let mut pending = chain
        .iter()
        .enumerate()
        .filter(|(_, step)| step.status == StepStatus::Pending)
        .map(|(idx, _)| idx);

    let idx = pending
        .next()
        .ok_or_else(|| ValidationError::BrokenChain("no pending step".into()))?;
    if pending.next().is_some() {
        return Err(ValidationError::BrokenChain(
            "more than one pending step".into(),
        ));
    }
    if chain[..idx].iter().any(|s| s.status != StepStatus::Approved) {
        return Err(ValidationError::BrokenChain(format!(
            "step before pending index {idx} is not approved"
        )));
    }
    if chain[idx + 1..].iter().any(|s| s.status != StepStatus::Waiting) {
        return Err(ValidationError::BrokenChain(format!(
            "step after pending index {idx} is not waiting"
        )));
    }

    Ok(idx)
}

impl Document {
    pub fn pending_step(&self) -> Option<&ApprovalStep> {
        self.approval_chain
            .iter()
            .find(|s| s.status == StepStatus::Pending)
    }

    pub fn step_for(&self, user: &UserId) -> Option<&ApprovalStep> {
        self.approval_chain.iter().find(|s| &s.approver.id == user)
    }

    pub fn is_sender(&self, user: &UserId) -> bool {
        &self.sender.id == user
    }

    /// Sender or anywhere in the chain. Membership outlives the step's resolution.
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.is_sender(user) || self.step_for(user).is_some()
    }

    /// The document is waiting on this user right now.
    pub fn awaits(&self, user: &UserId) -> bool {
        self.status == DocumentStatus::Pending
            && self
                .approval_chain
                .iter()
                .any(|s| &s.approver.id == user && s.status == StepStatus::Pending)
    }

    pub fn days_pending(&self, now: &TimeStamp<Utc>) -> i64 {
        if self.status != DocumentStatus::Pending {
            return 0;
        }
        self.updated_at.days_until(now)
    }

    /// Checks every structural rule a published snapshot must satisfy.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        for (idx, step) in self.approval_chain.iter().enumerate() {
            if step.order_index as usize != idx {
                return Err(ValidationError::BrokenChain(format!(
                    "step {} has order_index {}",
                    idx, step.order_index
                )));
            }
        }
        if self.approval_chain.is_empty() {
            return Err(ValidationError::EmptyChain);
        }
        if self.step_for(&self.sender.id).is_some() {
            return Err(ValidationError::SenderInChain);
        }
        let mut seen = HashSet::new();
        for step in &self.approval_chain {
            if !seen.insert(&step.approver.id) {
                return Err(ValidationError::DuplicateApprover(step.approver.id.clone()));
            }
        }

        let count = |status: StepStatus| {
            self.approval_chain
                .iter()
                .filter(|s| s.status == status)
                .count()
        };

        match self.status {
            DocumentStatus::Pending => {
                pending_index(&self.approval_chain)?;
            }
            DocumentStatus::Archived => {
                if count(StepStatus::Approved) != self.approval_chain.len() {
                    return Err(ValidationError::BrokenChain(
                        "archived document has unapproved steps".into(),
                    ));
                }
            }
            // final approval archives in the same transition
            DocumentStatus::Approved => {
                return Err(ValidationError::BrokenChain(
                    "approved documents must be archived".into(),
                ));
            }
            DocumentStatus::Rejected => {
                let rejected = self
                    .approval_chain
                    .iter()
                    .position(|s| s.status == StepStatus::Rejected)
                    .ok_or_else(|| ValidationError::BrokenChain("no rejected step".into()))?;
                if count(StepStatus::Rejected) != 1 || count(StepStatus::Pending) != 0 {
                    return Err(ValidationError::BrokenChain(
                        "rejected document must have exactly one rejected step and none pending"
                            .into(),
                    ));
                }
                if self.approval_chain[..rejected]
                    .iter()
                    .any(|s| s.status != StepStatus::Approved)
                {
                    return Err(ValidationError::BrokenChain(
                        "steps before the rejection must be approved".into(),
                    ));
                }
                if self.approval_chain[rejected + 1..]
                    .iter()
                    .any(|s| s.status != StepStatus::Waiting)
                {
                    return Err(ValidationError::BrokenChain(
                        "steps after the rejection must be waiting".into(),
                    ));
                }
                // the rejection is the latest action on the chain
                let rejected_at = self.approval_chain[rejected].acted_at.as_ref();
                let earlier = self.approval_chain[..rejected]
                    .iter()
                    .filter_map(|s| s.acted_at.as_ref());
                for acted_at in earlier {
                    if rejected_at.is_none_or(|at| acted_at > at) {
                        return Err(ValidationError::BrokenChain(
                            "rejected step is not the most recent action".into(),
                        ));
                    }
                }
            }
            DocumentStatus::Draft => {
                if count(StepStatus::Waiting) != self.approval_chain.len() {
                    return Err(ValidationError::BrokenChain(
                        "draft document has acted-on steps".into(),
                    ));
                }
            }
        }

        if self.status != DocumentStatus::Archived
            && count(StepStatus::Approved) == self.approval_chain.len()
        {
            return Err(ValidationError::BrokenChain(
                "fully approved chain must be archived".into(),
            ));
        }

        match self.version_history.last() {
            Some(latest) if latest.version == self.version && latest.file_ref == self.file_ref => {}
            _ => {
                return Err(ValidationError::BrokenChain(
                    "version history does not end at the current version".into(),
                ));
            }
        }

        Ok(())
    }

    /// Encode the snapshot into CBOR and hash it, giving a content fingerprint.
    pub fn serialize_with_hash(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}
