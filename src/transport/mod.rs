mod mailbox;
mod smtp;

pub use mailbox::ImapStore;
pub use smtp::SmtpMailer;

use async_trait::async_trait;

use crate::{dto::OutgoingEmail, error::EmailError};

/// Rejects folder names that cannot be sent as a single protocol line.
pub fn check_folder_name(folder: &str) -> Result<(), EmailError> {
    if folder.contains(['\r', '\n']) {
        return Err(EmailError::InvalidFolderName(folder.to_string()));
    }
    Ok(())
}

/// Outbound side: delivers one message per call.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn transmit(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// Inbound side: a remote mailbox store.
///
/// Implementations are blocking and are driven from `spawn_blocking`.
pub trait MailStore: Send + Sync {
    fn connect(&self) -> Result<Box<dyn StoreSession>, EmailError>;
}

/// An authenticated connection to a mailbox store.
pub trait StoreSession: Send {
    fn folder_exists(&mut self, folder: &str) -> Result<bool, EmailError>;

    /// Opens `folder` read-only and returns the number of messages in it.
    fn open_read_only(&mut self, folder: &str) -> Result<u32, EmailError>;

    /// Subjects of every message in the open folder.
    fn subjects(&mut self) -> Result<Vec<String>, EmailError>;

    fn close_folder(&mut self) -> Result<(), EmailError>;

    fn logout(&mut self) -> Result<(), EmailError>;
}
