//! The approval-chain state machine.
//!
//! Every operation takes the current snapshot by reference and returns a
//! fresh [`Document`] together with the audit entries it appended. The input
//! is never touched, so readers holding the old snapshot stay consistent and
//! a failed call is a no-op by construction.
//!
//! Advancement is positional: the step after the one just approved becomes
//! pending. Roles are never consulted.
use crate::document::{Document, pending_index};
use crate::error::{AuthorizationError, ValidationError, WorkflowResult};
use crate::model::{
    ApprovalStep, AuditAction, AuditEntry, DocumentId, DocumentStatus, DocumentVersion, Placement,
    StepStatus, TimeStamp, User,
};
use crate::submission::Submission;
use chrono::Utc;

pub const ARCHIVE_NOTE: &str = "Auto-archived after final approval";

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub document: Document,
    pub appended: Vec<AuditEntry>, // in insertion order, never empty
}

impl Transition {
    /// The last action recorded by this transition (`Archived` for a final approval).
    pub fn action(&self) -> AuditAction {
        self.appended
            .last()
            .map(|entry| entry.action)
            .unwrap_or(AuditAction::Submitted)
    }
}

// builds entries with ids derived from their position so the engine stays deterministic
struct AuditWriter {
    appended: Vec<AuditEntry>,
}

impl AuditWriter {
    fn new() -> Self {
        Self { appended: vec![] }
    }

    fn record(
        &mut self,
        doc: &mut Document,
        action: AuditAction,
        actor: &User,
        now: &TimeStamp<Utc>,
        details: Option<String>,
        version: Option<u32>,
    ) {
        let entry = AuditEntry {
            id: format!("{}-audit-{}", doc.id, doc.audit_log.len() + 1),
            action,
            actor: actor.clone(),
            timestamp: now.clone(),
            details,
            version,
        };
        doc.audit_log.push(entry.clone());
        self.appended.push(entry);
    }

    fn finish(self, document: Document) -> Transition {
        Transition {
            document,
            appended: self.appended,
        }
    }
}

fn require_status(doc: &Document, expected: DocumentStatus) -> Result<(), AuthorizationError> {
    if doc.status != expected {
        return Err(AuthorizationError::WrongStatus {
            document: doc.id.clone(),
            expected,
            actual: doc.status,
        });
    }
    Ok(())
}

fn require_sender(doc: &Document, actor: &User) -> Result<(), AuthorizationError> {
    if !doc.is_sender(&actor.id) {
        return Err(AuthorizationError::NotSender {
            user: actor.id.clone(),
            document: doc.id.clone(),
        });
    }
    Ok(())
}

// index of the actor's pending step, after checking the chain is well formed
fn pending_step_of(doc: &Document, actor: &User) -> WorkflowResult<usize> {
    require_status(doc, DocumentStatus::Pending)?;

    let holds_pending = doc
        .approval_chain
        .iter()
        .any(|s| s.approver.id == actor.id && s.status == StepStatus::Pending);
    if !holds_pending {
        return Err(AuthorizationError::NoPendingStep {
            user: actor.id.clone(),
            document: doc.id.clone(),
        }
        .into());
    }

    Ok(pending_index(&doc.approval_chain)?)
}

/// Open a new document with a fresh approval chain. Step 0 is pending.
pub fn submit(id: DocumentId, submission: Submission, now: TimeStamp<Utc>) -> WorkflowResult<Transition> {
    let fin = submission.validate_and_finalise()?;

    let approval_chain = fin
        .approvers
        .into_iter()
        .enumerate()
        .map(|(idx, approver)| {
            let status = if idx == 0 {
                StepStatus::Pending
            } else {
                StepStatus::Waiting
            };
            ApprovalStep::new(format!("{id}-s{idx}"), approver, idx as u32, status)
        })
        .collect();

    let mut doc = Document {
        id,
        title: fin.title,
        summary: fin.summary,
        sender: fin.sender.clone(),
        status: DocumentStatus::Pending,
        created_at: now.clone(),
        updated_at: now.clone(),
        version: 1,
        category: fin.category,
        file_ref: fin.file_ref.clone(),
        approval_chain,
        audit_log: vec![],
        version_history: vec![DocumentVersion {
            version: 1,
            file_ref: fin.file_ref,
            uploaded_at: now.clone(),
            uploaded_by: fin.sender.clone(),
        }],
    };

    let mut audit = AuditWriter::new();
    audit.record(&mut doc, AuditAction::Submitted, &fin.sender, &now, None, Some(1));

    Ok(audit.finish(doc))
}

/// Approve the actor's pending step, optionally recording signature placements.
///
/// The successor step becomes pending. When the approved step was the last
/// one the document is archived in the same transition and two entries are
/// appended: `Approved` then `Archived`.
pub fn approve(
    doc: &Document,
    actor: &User,
    placements: Vec<Placement>,
    now: TimeStamp<Utc>,
) -> WorkflowResult<Transition> {
    let idx = pending_step_of(doc, actor)?;

    if let Some(p) = placements.iter().find(|p| !p.is_on_page()) {
        return Err(ValidationError::PlacementOutOfBounds {
            id: p.id.clone(),
            x: p.x,
            y: p.y,
        }
        .into());
    }

    let mut next = doc.clone();

    let step = &mut next.approval_chain[idx];
    step.status = StepStatus::Approved;
    step.acted_at = Some(now.clone());
    step.placements = (!placements.is_empty()).then_some(placements);

    // pending_index guarantees the successor, if any, is waiting
    let complete = match next.approval_chain.get_mut(idx + 1) {
        Some(successor) => {
            successor.status = StepStatus::Pending;
            false
        }
        None => true,
    };
    next.updated_at = now.clone();

    let mut audit = AuditWriter::new();
    audit.record(
        &mut next,
        AuditAction::Approved,
        actor,
        &now,
        Some(format!("Approved by {}", actor.name)),
        None,
    );

    if complete {
        next.status = DocumentStatus::Archived;
        audit.record(
            &mut next,
            AuditAction::Archived,
            actor,
            &now,
            Some(ARCHIVE_NOTE.to_string()),
            None,
        );
    }

    Ok(audit.finish(next))
}

/// Reject at the actor's pending step. Earlier approvals are left as they are
/// and later steps stay waiting.
pub fn reject(
    doc: &Document,
    actor: &User,
    comment: &str,
    now: TimeStamp<Utc>,
) -> WorkflowResult<Transition> {
    let idx = pending_step_of(doc, actor)?;

    if comment.trim().is_empty() {
        return Err(ValidationError::BlankComment.into());
    }

    let mut next = doc.clone();

    let step = &mut next.approval_chain[idx];
    step.status = StepStatus::Rejected;
    step.acted_at = Some(now.clone());
    step.comment = Some(comment.to_string());

    next.status = DocumentStatus::Rejected;
    next.updated_at = now.clone();

    let mut audit = AuditWriter::new();
    audit.record(
        &mut next,
        AuditAction::Rejected,
        actor,
        &now,
        Some(comment.to_string()),
        None,
    );

    Ok(audit.finish(next))
}

/// Upload a new file after a rejection and restart the chain from the top.
pub fn revise(
    doc: &Document,
    actor: &User,
    file_ref: &str,
    now: TimeStamp<Utc>,
) -> WorkflowResult<Transition> {
    require_sender(doc, actor)?;
    require_status(doc, DocumentStatus::Rejected)?;

    if file_ref.trim().is_empty() {
        return Err(ValidationError::MissingField("file_ref").into());
    }

    let mut next = doc.clone();
    let version = next.version + 1;

    next.version = version;
    next.file_ref = file_ref.to_string();
    for (idx, step) in next.approval_chain.iter_mut().enumerate() {
        step.reset(if idx == 0 {
            StepStatus::Pending
        } else {
            StepStatus::Waiting
        });
    }
    next.status = DocumentStatus::Pending;
    next.updated_at = now.clone();
    next.version_history.push(DocumentVersion {
        version,
        file_ref: file_ref.to_string(),
        uploaded_at: now.clone(),
        uploaded_by: actor.clone(),
    });

    let mut audit = AuditWriter::new();
    audit.record(
        &mut next,
        AuditAction::Revised,
        actor,
        &now,
        Some(format!("Uploaded revised version {version}")),
        Some(version),
    );

    Ok(audit.finish(next))
}

/// Nudge the current approver. Only the audit log changes; `updated_at` keeps
/// measuring the time since the last workflow step.
pub fn remind(doc: &Document, actor: &User, now: TimeStamp<Utc>) -> WorkflowResult<Transition> {
    require_sender(doc, actor)?;
    require_status(doc, DocumentStatus::Pending)?;

    let idx = pending_index(&doc.approval_chain)?;
    let approver = doc.approval_chain[idx].approver.name.clone();

    let mut next = doc.clone();
    let mut audit = AuditWriter::new();
    audit.record(
        &mut next,
        AuditAction::ReminderSent,
        actor,
        &now,
        Some(format!("Reminder sent to {approver}")),
        None,
    );

    Ok(audit.finish(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::model::UserRole;

    fn user(id: &str) -> User {
        User::new(id, format!("User {id}"), format!("{id}@college.edu"), UserRole::Faculty, "CS")
    }

    fn at(day: u32) -> TimeStamp<Utc> {
        TimeStamp::new_with(2026, 2, day, 9, 0, 0).unwrap()
    }

    fn submitted(approvers: &[&str]) -> Document {
        let submission = Submission::new()
            .set_sender(user("sender"))
            .set_title("Budget")
            .set_category("Financial")
            .set_file_ref("budget.pdf")
            .set_approvers(approvers.iter().map(|id| user(id)).collect());
        submit(DocumentId::new("doc-1"), submission, at(1))
            .unwrap()
            .document
    }

    fn statuses(doc: &Document) -> Vec<StepStatus> {
        doc.approval_chain.iter().map(|s| s.status).collect()
    }

    #[test]
    fn submit_builds_chain_and_history() {
        let doc = submitted(&["u1", "u2", "u3"]);

        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(
            statuses(&doc),
            vec![StepStatus::Pending, StepStatus::Waiting, StepStatus::Waiting]
        );
        assert_eq!(doc.approval_chain[2].order_index, 2);
        assert_eq!(doc.approval_chain[1].id, "doc-1-s1");
        assert_eq!(doc.audit_log.len(), 1);
        assert_eq!(doc.audit_log[0].action, AuditAction::Submitted);
        assert_eq!(doc.audit_log[0].version, Some(1));
        assert_eq!(doc.version_history.len(), 1);
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn submit_rejects_sender_in_chain() {
        let submission = Submission::new()
            .set_sender(user("sender"))
            .set_title("Budget")
            .set_category("Financial")
            .set_file_ref("budget.pdf")
            .add_approver(user("sender"));
        let err = submit(DocumentId::new("doc-1"), submission, at(1)).unwrap_err();
        assert_eq!(err, WorkflowError::Validation(ValidationError::SenderInChain));
    }

    #[test]
    fn approve_advances_to_successor() {
        let doc = submitted(&["u1", "u2", "u3"]);
        let t = approve(&doc, &user("u1"), vec![], at(2)).unwrap();

        assert_eq!(
            statuses(&t.document),
            vec![StepStatus::Approved, StepStatus::Pending, StepStatus::Waiting]
        );
        assert_eq!(t.document.status, DocumentStatus::Pending);
        assert_eq!(t.document.approval_chain[0].placements, None);
        assert_eq!(t.action(), AuditAction::Approved);
        assert_eq!(t.appended[0].details.as_deref(), Some("Approved by User u1"));
        // input snapshot untouched
        assert_eq!(statuses(&doc)[0], StepStatus::Pending);
    }

    #[test]
    fn final_approval_archives() {
        let doc = submitted(&["u1"]);
        let placements = vec![Placement::new("p-1", "sig-1", 42.0, 80.5)];
        let t = approve(&doc, &user("u1"), placements.clone(), at(3)).unwrap();

        assert_eq!(t.document.status, DocumentStatus::Archived);
        assert_eq!(t.document.approval_chain[0].placements, Some(placements));
        let actions: Vec<_> = t.appended.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Approved, AuditAction::Archived]);
        assert_eq!(t.appended[1].details.as_deref(), Some(ARCHIVE_NOTE));
        assert_eq!(t.appended[1].id, "doc-1-audit-3");
        assert!(t.document.check_invariants().is_ok());
    }

    #[test]
    fn approve_refuses_placement_off_page() {
        let doc = submitted(&["u1"]);
        let err = approve(
            &doc,
            &user("u1"),
            vec![Placement::new("p-1", "sig-1", 101.0, 5.0)],
            at(2),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::PlacementOutOfBounds { .. })
        ));
    }

    #[test]
    fn waiting_approver_cannot_jump_the_queue() {
        let doc = submitted(&["u1", "u2"]);
        let err = approve(&doc, &user("u2"), vec![], at(2)).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotAuthorized(AuthorizationError::NoPendingStep { .. })
        ));
    }

    #[test]
    fn reject_keeps_other_steps() {
        let doc = submitted(&["u1", "u2", "u3"]);
        let doc = approve(&doc, &user("u1"), vec![], at(2)).unwrap().document;
        let t = reject(&doc, &user("u2"), "missing budget", at(3)).unwrap();

        assert_eq!(t.document.status, DocumentStatus::Rejected);
        assert_eq!(
            statuses(&t.document),
            vec![StepStatus::Approved, StepStatus::Rejected, StepStatus::Waiting]
        );
        assert_eq!(t.document.approval_chain[1].comment.as_deref(), Some("missing budget"));
        assert!(t.document.check_invariants().is_ok());
    }

    #[test]
    fn reject_needs_a_comment() {
        let doc = submitted(&["u1"]);
        let err = reject(&doc, &user("u1"), " \n", at(2)).unwrap_err();
        assert_eq!(err, WorkflowError::Validation(ValidationError::BlankComment));
    }

    #[test]
    fn revise_restarts_the_chain() {
        let doc = submitted(&["u1", "u2"]);
        let doc = approve(&doc, &user("u1"), vec![Placement::new("p", "s", 1.0, 1.0)], at(2))
            .unwrap()
            .document;
        let doc = reject(&doc, &user("u2"), "wrong totals", at(3)).unwrap().document;
        let t = revise(&doc, &user("sender"), "budget-v2.pdf", at(4)).unwrap();
        let doc = t.document;

        assert_eq!(doc.version, 2);
        assert_eq!(doc.file_ref, "budget-v2.pdf");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(statuses(&doc), vec![StepStatus::Pending, StepStatus::Waiting]);
        assert!(doc.approval_chain.iter().all(|s| {
            s.acted_at.is_none() && s.comment.is_none() && s.placements.is_none()
        }));
        assert_eq!(doc.version_history.len(), 2);
        assert_eq!(t.appended[0].version, Some(2));
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn only_sender_revises_rejected_documents() {
        let doc = submitted(&["u1"]);
        let err = revise(&doc, &user("sender"), "v2.pdf", at(2)).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotAuthorized(AuthorizationError::WrongStatus { .. })
        ));

        let doc = reject(&doc, &user("u1"), "no", at(2)).unwrap().document;
        let err = revise(&doc, &user("u1"), "v2.pdf", at(3)).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotAuthorized(AuthorizationError::NotSender { .. })
        ));
    }

    #[test]
    fn remind_only_touches_the_log() {
        let doc = submitted(&["u1", "u2"]);
        let t = remind(&doc, &user("sender"), at(5)).unwrap();

        assert_eq!(t.action(), AuditAction::ReminderSent);
        assert_eq!(t.appended[0].details.as_deref(), Some("Reminder sent to User u1"));
        assert_eq!(t.document.updated_at, doc.updated_at);
        assert_eq!(t.document.approval_chain, doc.approval_chain);

        assert!(remind(&doc, &user("u1"), at(5)).is_err());
    }

    fn wrong_status(err: &WorkflowError, expected: DocumentStatus, actual: DocumentStatus) -> bool {
        matches!(
            err,
            WorkflowError::NotAuthorized(AuthorizationError::WrongStatus { expected: e, actual: a, .. })
                if *e == expected && *a == actual
        )
    }

    #[test]
    fn archived_document_refuses_further_approval() {
        let doc = submitted(&["u1"]);
        let archived = approve(&doc, &user("u1"), vec![], at(2)).unwrap().document;

        let err = approve(&archived, &user("u1"), vec![], at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Archived));

        let err = reject(&archived, &user("u1"), "too late", at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Archived));
    }

    #[test]
    fn rejected_document_refuses_approval_and_rejection() {
        let doc = submitted(&["u1", "u2"]);
        let rejected = reject(&doc, &user("u1"), "missing budget", at(2)).unwrap().document;
        let before = rejected.clone();

        let err = approve(&rejected, &user("u1"), vec![], at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Rejected));

        let err = reject(&rejected, &user("u2"), "also no", at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Rejected));

        assert_eq!(rejected, before);
    }

    #[test]
    fn submit_without_approvers_is_empty_chain() {
        let submission = Submission::new()
            .set_sender(user("sender"))
            .set_title("Budget")
            .set_category("Financial")
            .set_file_ref("budget.pdf");
        let err = submit(DocumentId::new("doc-1"), submission, at(1)).unwrap_err();
        assert_eq!(err, WorkflowError::Validation(ValidationError::EmptyChain));
    }

    #[test]
    fn revise_needs_a_file() {
        let doc = submitted(&["u1"]);
        let doc = reject(&doc, &user("u1"), "no", at(2)).unwrap().document;
        let err = revise(&doc, &user("sender"), "  ", at(3)).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Validation(ValidationError::MissingField("file_ref"))
        );
    }

    #[test]
    fn remind_needs_a_pending_document() {
        let doc = submitted(&["u1"]);
        let rejected = reject(&doc, &user("u1"), "no", at(2)).unwrap().document;
        let err = remind(&rejected, &user("sender"), at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Rejected));

        let archived = approve(&doc, &user("u1"), vec![], at(2)).unwrap().document;
        let err = remind(&archived, &user("sender"), at(3)).unwrap_err();
        assert!(wrong_status(&err, DocumentStatus::Pending, DocumentStatus::Archived));
    }
}
