#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid email address format: {0}")]
    AddressFormat(#[from] lettre::address::AddressError),

    #[error("Failed to build email message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Error sending email: {0}")]
    SmtpTransport(#[from] lettre::transport::smtp::Error),

    #[error("Folder {0} does not exist.")]
    FolderNotFound(String),

    #[error("Invalid folder name {0:?}: line breaks are not allowed")]
    InvalidFolderName(String),

    #[error("Error fetching emails from folder: {0}")]
    Mailbox(#[from] imap::Error),

    #[error("Failed to set up TLS: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Mailbox task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue '{0}' has not been declared")]
    UnknownQueue(String),

    #[error("Queue '{0}' already has a consumer")]
    AlreadyConsumed(String),

    #[error("Queue '{0}' is closed")]
    Closed(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}
