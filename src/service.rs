use tokio::task::JoinHandle;

use std::sync::Arc;

use crate::{
    dto::{EmailSendRequest, OutgoingEmail},
    error::{EmailError, QueueError},
    executor::TaskExecutor,
    queue::Broker,
    transport::{self, MailStore, MailTransport, StoreSession},
};

pub struct EmailService {
    sender: String,
    transport: Arc<dyn MailTransport>,
    store: Arc<dyn MailStore>,
    executor: TaskExecutor,
}

impl EmailService {
    pub fn new(
        sender: String,
        transport: Arc<dyn MailTransport>,
        store: Arc<dyn MailStore>,
        executor: TaskExecutor,
    ) -> Self {
        Self {
            sender,
            transport,
            store,
            executor,
        }
    }

    /// Delivers one message on the current task.
    pub async fn send(&self, to: &str, subject: &str, content: &str) -> Result<(), EmailError> {
        tracing::info!("Preparing to send email to: {}", to);

        let email = OutgoingEmail {
            from: self.sender.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            content: content.to_string(),
        };

        match self.transport.transmit(&email).await {
            Ok(()) => {
                tracing::info!("Email successfully sent to: {}", to);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error sending email to {}: {e}", to);
                Err(e)
            }
        }
    }

    /// Consumer callback for the email queue.
    pub async fn on_queue_message(self: &Arc<Self>, request: EmailSendRequest) {
        let service = Arc::clone(self);
        self.executor
            .submit(async move {
                tracing::info!(
                    "Received email request to send email with subject: {}",
                    request.subject
                );

                if service
                    .send(&request.to, &request.subject, &request.content)
                    .await
                    .is_ok()
                {
                    tracing::info!("Processed email with subject: {}", request.subject);
                }
            })
            .await;
    }

    /// Subscribes this service as the consumer of `queue`.
    pub fn register_consumer(
        self: &Arc<Self>,
        broker: &Broker,
        queue: &str,
    ) -> Result<JoinHandle<()>, QueueError> {
        let service = Arc::clone(self);
        broker.subscribe(queue, move |request: EmailSendRequest| {
            let service = Arc::clone(&service);
            async move { service.on_queue_message(request).await }
        })
    }

    /// Lists the subjects of every message in `folder`, logging each one.
    pub async fn fetch_folder(&self, folder: &str) -> Result<Vec<String>, EmailError> {
        tracing::info!("Fetching emails from folder: {}", folder);

        if let Err(e) = transport::check_folder_name(folder) {
            tracing::error!("Refusing to fetch emails: {e}");
            return Err(e);
        }

        let store = Arc::clone(&self.store);
        let name = folder.to_string();
        let span = tracing::Span::current();

        let result = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            read_folder(store.as_ref(), &name)
        })
        .await
        .unwrap_or_else(|e| Err(e.into()));

        match &result {
            Ok(subjects) => tracing::info!(
                "Successfully fetched {} emails from folder: {}",
                subjects.len(),
                folder
            ),
            Err(EmailError::FolderNotFound(_)) => {
                tracing::error!("Folder {} does not exist", folder);
            }
            Err(e) => tracing::error!("Error fetching emails from folder {}: {e}", folder),
        }

        result
    }

    /// Queues `fetch_folder` on the worker pool. The outcome is only logged.
    pub async fn fetch_folder_async(self: &Arc<Self>, folder: String) {
        let service = Arc::clone(self);
        self.executor
            .submit(async move {
                let _ = service.fetch_folder(&folder).await;
            })
            .await;
    }
}

fn read_folder(store: &dyn MailStore, folder: &str) -> Result<Vec<String>, EmailError> {
    let mut guard = SessionGuard::new(store.connect()?);

    if !guard.session.folder_exists(folder)? {
        return Err(EmailError::FolderNotFound(folder.to_string()));
    }

    let count = guard.session.open_read_only(folder)?;
    guard.folder_open = true;
    tracing::info!("Opened folder {} with {} messages", folder, count);

    // FETCH 1:* is invalid on an empty mailbox
    let subjects = if count == 0 {
        Vec::new()
    } else {
        guard.session.subjects()?
    };
    for subject in &subjects {
        tracing::info!("Subject of email: {}", subject);
    }

    Ok(subjects)
}

/// Closes the folder (if opened) and logs out when dropped, whatever the exit path.
struct SessionGuard {
    session: Box<dyn StoreSession>,
    folder_open: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn StoreSession>) -> Self {
        Self {
            session,
            folder_open: false,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.folder_open
            && let Err(e) = self.session.close_folder()
        {
            tracing::warn!("Failed to close mailbox folder: {e}");
        }
        if let Err(e) = self.session.logout() {
            tracing::warn!("Failed to log out of mailbox store: {e}");
        }
    }
}
