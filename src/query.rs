//! Read views over a document collection.
//!
//! Everything here is a pure function of the snapshot it is handed. Nothing
//! is cached, so the views can never drift from the engine's state.
use crate::document::Document;
use crate::model::{DocumentStatus, UserId};

/// Documents where the user is sender or anywhere in the chain.
pub fn visible_to<'a, I>(docs: I, user: &UserId) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.is_participant(user)).collect()
}

/// Pending documents whose pending step belongs to the user.
pub fn action_required<'a, I>(docs: I, user: &UserId) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.awaits(user)).collect()
}

pub fn submitted_by<'a, I>(docs: I, user: &UserId) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.is_sender(user)).collect()
}

pub fn by_status<'a, I>(docs: I, status: DocumentStatus) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.status == status).collect()
}

pub fn by_category<'a, I>(docs: I, category: &str) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.category == category).collect()
}

/// Case-insensitive substring match on title or sender name. Blank text matches everything.
pub fn matches_text(doc: &Document, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    needle.is_empty()
        || doc.title.to_lowercase().contains(&needle)
        || doc.sender.name.to_lowercase().contains(&needle)
}

pub fn search<'a, I>(docs: I, text: &str) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| matches_text(d, text)).collect()
}

/// Notification badge: how many documents wait on this user.
pub fn pending_count<'a, I>(docs: I, user: &UserId) -> usize
where
    I: IntoIterator<Item = &'a Document>,
{
    docs.into_iter().filter(|d| d.awaits(user)).count()
}

/// Composable predicate, every set criterion must hold.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    visible_to: Option<UserId>,
    awaiting: Option<UserId>,
    sender: Option<UserId>,
    statuses: Vec<DocumentStatus>, // any of
    category: Option<String>,
    text: Option<String>,
    exclude_archived: bool,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn visible_to(mut self, user: UserId) -> Self {
        self.visible_to = Some(user);
        self
    }
    pub fn awaiting(mut self, user: UserId) -> Self {
        self.awaiting = Some(user);
        self
    }
    pub fn sender(mut self, user: UserId) -> Self {
        self.sender = Some(user);
        self
    }
    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.statuses.push(status);
        self
    }
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
    pub fn exclude_archived(mut self) -> Self {
        self.exclude_archived = true;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(user) = &self.visible_to {
            if !doc.is_participant(user) {
                return false;
            }
        }
        if let Some(user) = &self.awaiting {
            if !doc.awaits(user) {
                return false;
            }
        }
        if let Some(user) = &self.sender {
            if !doc.is_sender(user) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&doc.status) {
            return false;
        }
        if let Some(category) = &self.category {
            if &doc.category != category {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !matches_text(doc, text) {
                return false;
            }
        }
        !(self.exclude_archived && doc.status == DocumentStatus::Archived)
    }

    pub fn apply<'a, I>(&self, docs: I) -> Vec<&'a Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        docs.into_iter().filter(|d| self.matches(d)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardFilter {
    All, // everything visible except the archive
    ActionRequired,
    SubmittedByMe,
    Status(DocumentStatus),
}

/// The dashboard list for a user: visible documents narrowed by a tab and a search box.
pub fn dashboard<'a, I>(
    docs: I,
    user: &UserId,
    filter: DashboardFilter,
    text: &str,
) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let base = DocumentFilter::new().visible_to(user.clone()).text(text);
    let filter = match filter {
        DashboardFilter::All => base.exclude_archived(),
        DashboardFilter::ActionRequired => base.awaiting(user.clone()),
        DashboardFilter::SubmittedByMe => base.sender(user.clone()),
        DashboardFilter::Status(status) => base.status(status),
    };
    filter.apply(docs)
}

/// Finished documents the user can see, optionally narrowed to one category.
pub fn archive<'a, I>(
    docs: I,
    user: &UserId,
    category: Option<&str>,
    text: &str,
) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut filter = DocumentFilter::new()
        .visible_to(user.clone())
        .status(DocumentStatus::Archived)
        .status(DocumentStatus::Approved)
        .text(text);
    if let Some(category) = category {
        filter = filter.category(category);
    }
    filter.apply(docs)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub action_required: usize,
    pub submitted_by_me: usize,
    pub pending: usize,
    pub approved: usize, // approved or archived
    pub rejected: usize,
}

pub fn stats<'a, I>(docs: I, user: &UserId) -> DashboardStats
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut stats = DashboardStats::default();
    for doc in docs.into_iter().filter(|d| d.is_participant(user)) {
        if doc.awaits(user) {
            stats.action_required += 1;
        }
        if doc.is_sender(user) {
            stats.submitted_by_me += 1;
        }
        match doc.status {
            DocumentStatus::Pending => stats.pending += 1,
            DocumentStatus::Approved | DocumentStatus::Archived => stats.approved += 1,
            DocumentStatus::Rejected => stats.rejected += 1,
            DocumentStatus::Draft => {}
        }
    }
    stats
}

/// What a user may do with a document right now.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub is_sender: bool,
    pub is_current_approver: bool,
    pub can_revise: bool,
    pub can_remind: bool,
    pub is_read_only: bool,
}

pub fn access_for(doc: &Document, user: &UserId) -> Access {
    let is_sender = doc.is_sender(user);
    Access {
        is_sender,
        is_current_approver: doc.awaits(user),
        can_revise: is_sender && doc.status == DocumentStatus::Rejected,
        can_remind: is_sender && doc.status == DocumentStatus::Pending,
        is_read_only: doc.status.is_read_only(),
    }
}
