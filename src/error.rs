use crate::model::{DocumentId, DocumentStatus, UserId};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Approval chain must contain at least one approver")]
    EmptyChain,
    #[error("Sender cannot appear in their own approval chain")]
    SenderInChain,
    #[error("Approver {0} appears more than once in the chain")]
    DuplicateApprover(UserId),
    #[error("Rejection requires a non-blank comment")]
    BlankComment,
    #[error("Required field is missing or blank: {0}")]
    MissingField(&'static str),
    #[error("Unknown document category: {0}")]
    UnknownCategory(String),
    #[error("Placement {id} is outside the page: ({x}, {y})")]
    PlacementOutOfBounds { id: String, x: f64, y: f64 },
    #[error("Approval chain is inconsistent: {0}")]
    BrokenChain(String),
    #[error("Document {0} is already in the store")]
    DuplicateDocument(DocumentId),
    #[error("Invalid workflow config: {0}")]
    InvalidConfig(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("{user} has no pending step on document {document}")]
    NoPendingStep { user: UserId, document: DocumentId },
    #[error("{user} is not the sender of document {document}")]
    NotSender { user: UserId, document: DocumentId },
    #[error("Document {document} is {actual}, expected {expected}")]
    WrongStatus {
        document: DocumentId,
        expected: DocumentStatus,
        actual: DocumentStatus,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotAuthorized(#[from] AuthorizationError),
    #[error("Document not found: {0}")]
    NotFound(DocumentId),
    #[error("Internal failure: {0}")]
    Internal(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
