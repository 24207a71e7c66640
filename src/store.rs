//! Store layer API for document workflow operations
//!
//! Holds the authoritative collection and runs every engine transition under
//! a single writer lock: read the current snapshot, run the transition,
//! publish the new snapshot, notify observers. Readers clone the published
//! `Arc<Snapshot>` and never see intermediate state.
use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::document::Document;
use crate::error::{ValidationError, WorkflowError, WorkflowResult};
use crate::model::{AuditAction, DocumentId, Placement, TimeStamp, User, UserId};
use crate::query::{self, Access, DashboardFilter, DashboardStats};
use crate::submission::Submission;
use crate::workflow::{self, Transition};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Callback type for store observers
pub type Observer = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Published once per committed transition, after the snapshot is visible.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub revision: u64,
    pub action: AuditAction,
    pub document: Arc<Document>,
    pub digest: String, // sha256 of the document's cbor encoding
}

/// An immutable view of every document at one revision.
#[derive(Debug, Default)]
pub struct Snapshot {
    revision: u64,
    documents: Vec<Arc<Document>>, // submission order
}

impl Snapshot {
    pub fn revision(&self) -> u64 {
        self.revision
    }
    pub fn len(&self) -> usize {
        self.documents.len()
    }
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().map(|d| d.as_ref())
    }
    pub fn get(&self, id: &DocumentId) -> Option<&Arc<Document>> {
        self.documents.iter().find(|d| &d.id == id)
    }
    fn position(&self, id: &DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| &d.id == id)
    }

    pub fn visible_to(&self, user: &UserId) -> Vec<&Document> {
        query::visible_to(self.iter(), user)
    }
    pub fn action_required(&self, user: &UserId) -> Vec<&Document> {
        query::action_required(self.iter(), user)
    }
    pub fn pending_count(&self, user: &UserId) -> usize {
        query::pending_count(self.iter(), user)
    }
    pub fn dashboard(&self, user: &UserId, filter: DashboardFilter, text: &str) -> Vec<&Document> {
        query::dashboard(self.iter(), user, filter, text)
    }
    pub fn archive(&self, user: &UserId, category: Option<&str>, text: &str) -> Vec<&Document> {
        query::archive(self.iter(), user, category, text)
    }
    pub fn stats(&self, user: &UserId) -> DashboardStats {
        query::stats(self.iter(), user)
    }
    pub fn access(&self, id: &DocumentId, user: &UserId) -> Option<Access> {
        self.get(id).map(|doc| query::access_for(doc, user))
    }
}

pub struct DocumentStore {
    config: WorkflowConfig,
    clock: Box<dyn Clock>,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>, // serializes read-transition-publish-notify
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
}

impl DocumentStore {
    pub fn new(config: WorkflowConfig) -> WorkflowResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: WorkflowConfig, clock: impl Clock + 'static) -> WorkflowResult<Self> {
        Self::with_documents(config, clock, vec![])
    }

    /// Start from existing documents. Each must satisfy the chain invariants.
    pub fn with_documents(
        config: WorkflowConfig,
        clock: impl Clock + 'static,
        documents: Vec<Document>,
    ) -> WorkflowResult<Self> {
        config.validate()?;

        let mut seen = HashSet::new();
        for doc in &documents {
            doc.check_invariants()?;
            if !seen.insert(doc.id.clone()) {
                return Err(ValidationError::DuplicateDocument(doc.id.clone()).into());
            }
        }
        tracing::debug!(count = documents.len(), "Document store seeded");

        Ok(Self {
            config,
            clock: Box::new(clock),
            current: RwLock::new(Arc::new(Snapshot {
                revision: 0,
                documents: documents.into_iter().map(Arc::new).collect(),
            })),
            writer: Mutex::new(()),
            observers: Mutex::new(vec![]),
            next_subscription: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &DocumentId) -> WorkflowResult<Arc<Document>> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(id.clone()))
    }

    /// Register an observer. It runs synchronously after every committed
    /// transition, while the writer lock is held, so it must not write to the
    /// store. Subscribing and unsubscribing from inside an observer is fine
    /// and takes effect from the next commit.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        tracing::debug!(subscription = id.0, "Observer subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        let removed = observers.len() != before;
        tracing::debug!(subscription = id.0, removed, "Observer unsubscribed");
        removed
    }

    /// Submit a new document for approval
    pub fn submit(&self, submission: Submission) -> WorkflowResult<Arc<Document>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        match self.open(submission) {
            Ok(transition) => self.publish(&current, None, transition),
            Err(err) => {
                tracing::warn!(error = %err, "Submission refused");
                Err(err)
            }
        }
    }

    /// Approve the actor's pending step, committing any signature placements
    pub fn approve(
        &self,
        id: &DocumentId,
        actor: &User,
        placements: Vec<Placement>,
    ) -> WorkflowResult<Arc<Document>> {
        self.apply(id, |doc, now| workflow::approve(doc, actor, placements, now))
    }

    /// Reject at the actor's pending step
    pub fn reject(
        &self,
        id: &DocumentId,
        actor: &User,
        comment: &str,
    ) -> WorkflowResult<Arc<Document>> {
        self.apply(id, |doc, now| workflow::reject(doc, actor, comment, now))
    }

    /// Upload a revised file and restart the chain
    pub fn revise(
        &self,
        id: &DocumentId,
        actor: &User,
        file_ref: &str,
    ) -> WorkflowResult<Arc<Document>> {
        self.apply(id, |doc, now| workflow::revise(doc, actor, file_ref, now))
    }

    /// Record a reminder to the current approver
    pub fn remind(&self, id: &DocumentId, actor: &User) -> WorkflowResult<Arc<Document>> {
        self.apply(id, |doc, now| workflow::remind(doc, actor, now))
    }

    fn open(&self, submission: Submission) -> WorkflowResult<Transition> {
        // blank categories are reported by the submission itself
        if let Some(category) = submission.category().filter(|c| !c.trim().is_empty()) {
            self.config.check_category(category)?;
        }
        let id = DocumentId::generate(&self.config.document_hrp)
            .map_err(|e| WorkflowError::Internal(e.to_string()))?;

        workflow::submit(id, submission, self.clock.now())
    }

    fn apply<F>(&self, id: &DocumentId, step: F) -> WorkflowResult<Arc<Document>>
    where
        F: FnOnce(&Document, TimeStamp<Utc>) -> WorkflowResult<Transition>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        let result = current
            .position(id)
            .ok_or_else(|| WorkflowError::NotFound(id.clone()))
            .and_then(|idx| {
                step(current.documents[idx].as_ref(), self.clock.now()).map(|t| (idx, t))
            });

        match result {
            Ok((idx, transition)) => self.publish(&current, Some(idx), transition),
            Err(err) => {
                tracing::warn!(document_id = %id, error = %err, "Transition refused");
                Err(err)
            }
        }
    }

    // caller holds the writer lock
    fn publish(
        &self,
        current: &Snapshot,
        slot: Option<usize>,
        transition: Transition,
    ) -> WorkflowResult<Arc<Document>> {
        let action = transition.action();
        let (digest, _) = transition
            .document
            .serialize_with_hash()
            .map_err(|e| WorkflowError::Internal(e.to_string()))?;

        let document = Arc::new(transition.document);
        let mut documents = current.documents.clone();
        match slot {
            Some(idx) => documents[idx] = document.clone(),
            None => documents.push(document.clone()),
        }
        let revision = current.revision + 1;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(Snapshot { revision, documents });

        tracing::info!(
            document_id = %document.id,
            action = %action,
            status = %document.status,
            revision,
            digest = %digest,
            "Transition committed"
        );

        let event = StoreEvent {
            revision,
            action,
            document: document.clone(),
            digest,
        };
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(&event);
        }

        Ok(document)
    }
}
