//! Collects everything needed to open a new approval chain
use crate::error::ValidationError;
use crate::model::User;
use std::collections::HashSet;

// used for constructing a submission before it enters the workflow
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Submission {
    sender: Option<User>,
    title: Option<String>,
    summary: String, // produced outside the engine, may be empty
    category: Option<String>,
    file_ref: Option<String>,
    approvers: Vec<User>, // chain order is the order they are added
}

/// A submission that passed validation. Only produced by `validate_and_finalise`.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSubmission {
    pub sender: User,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub file_ref: String,
    pub approvers: Vec<User>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

impl Submission {
    /// Construct a new builder object, this becomes the basis for a document
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_sender(mut self, sender: User) -> Self {
        self.sender = Some(sender);
        self
    }
    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
    pub fn set_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
    pub fn set_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
    pub fn set_file_ref(mut self, file_ref: impl Into<String>) -> Self {
        self.file_ref = Some(file_ref.into());
        self
    }
    pub fn add_approver(mut self, approver: User) -> Self {
        self.approvers.push(approver);
        self
    }
    pub fn set_approvers(mut self, approvers: Vec<User>) -> Self {
        self.approvers = approvers;
        self
    }
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    // checks fields and the proposed chain, returns the finalised submission
    pub fn validate_and_finalise(self) -> Result<FinalSubmission, ValidationError> {
        let sender = self.sender.ok_or(ValidationError::MissingField("sender"))?;
        let title = required(self.title, "title")?;
        let category = required(self.category, "category")?;
        let file_ref = required(self.file_ref, "file_ref")?;

        if self.approvers.is_empty() {
            return Err(ValidationError::EmptyChain);
        }
        if self.approvers.iter().any(|a| a.id == sender.id) {
            return Err(ValidationError::SenderInChain);
        }
        let mut seen = HashSet::new();
        for approver in &self.approvers {
            if !seen.insert(&approver.id) {
                return Err(ValidationError::DuplicateApprover(approver.id.clone()));
            }
        }

        Ok(FinalSubmission {
            sender,
            title,
            summary: self.summary,
            category,
            file_ref,
            approvers: self.approvers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRole;

    fn user(id: &str) -> User {
        User::new(id, id, format!("{id}@college.edu"), UserRole::Faculty, "CS")
    }

    fn complete() -> Submission {
        Submission::new()
            .set_sender(user("sender"))
            .set_title("Lab procurement")
            .set_category("Procurement")
            .set_file_ref("lab.pdf")
            .add_approver(user("a"))
            .add_approver(user("b"))
    }

    #[test]
    fn complete_submission_finalises() {
        let fin = complete().validate_and_finalise().unwrap();
        assert_eq!(fin.approvers.len(), 2);
        assert_eq!(fin.approvers[0].id, user("a").id);
    }

    #[test]
    fn blank_title_is_missing() {
        let err = complete().set_title("   ").validate_and_finalise().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("title"));
    }

    #[test]
    fn duplicate_approver_is_refused() {
        let err = complete().add_approver(user("a")).validate_and_finalise().unwrap_err();
        assert_eq!(err, ValidationError::DuplicateApprover(user("a").id));
    }
}
