//! Recording mail backends and app wiring shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use mail_dispatch::{
    config::ExecutorConfig,
    dto::OutgoingEmail,
    error::EmailError,
    executor::TaskExecutor,
    handler::AppState,
    queue::Broker,
    router,
    service::EmailService,
    transport::{MailStore, MailTransport, StoreSession},
};
use tokio::sync::mpsc;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

pub const QUEUE: &str = "emailQueue";
pub const SENDER: &str = "dispatch@example.com";

/// Records every message it is asked to transmit.
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    tx: mpsc::UnboundedSender<OutgoingEmail>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutgoingEmail>) {
        Self::build(false)
    }

    /// Records the attempt, then fails it.
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<OutgoingEmail>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<OutgoingEmail>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent: Mutex::new(Vec::new()),
            tx,
            fail,
        };
        (Arc::new(transport), rx)
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn transmit(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        let _ = self.tx.send(email.clone());

        if self.fail {
            let e = "unreachable".parse::<lettre::Address>().unwrap_err();
            return Err(EmailError::AddressFormat(e));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Connected,
    Exists(String),
    Opened(String),
    Listed,
    ClosedFolder,
    LoggedOut,
}

/// In-memory mailbox store keyed by folder name.
pub struct MockStore {
    folders: HashMap<String, Vec<String>>,
    fail_listing: bool,
    events: Arc<Mutex<Vec<StoreEvent>>>,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl MockStore {
    pub fn new(folders: Vec<(&str, Vec<&str>)>) -> (Arc<Self>, mpsc::UnboundedReceiver<StoreEvent>) {
        Self::build(folders, false)
    }

    /// Folder lookups succeed, but listing subjects fails.
    pub fn failing_listing(
        folders: Vec<(&str, Vec<&str>)>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<StoreEvent>) {
        Self::build(folders, true)
    }

    fn build(
        folders: Vec<(&str, Vec<&str>)>,
        fail_listing: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let folders = folders
            .into_iter()
            .map(|(name, subjects)| {
                (
                    name.to_string(),
                    subjects.into_iter().map(ToString::to_string).collect(),
                )
            })
            .collect();

        let store = Self {
            folders,
            fail_listing,
            events: Arc::new(Mutex::new(Vec::new())),
            tx,
        };
        (Arc::new(store), rx)
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl MailStore for MockStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, EmailError> {
        let session = MockSession {
            folders: self.folders.clone(),
            open: None,
            fail_listing: self.fail_listing,
            events: Arc::clone(&self.events),
            tx: self.tx.clone(),
        };
        session.record(StoreEvent::Connected);
        Ok(Box::new(session))
    }
}

struct MockSession {
    folders: HashMap<String, Vec<String>>,
    open: Option<String>,
    fail_listing: bool,
    events: Arc<Mutex<Vec<StoreEvent>>>,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl MockSession {
    fn record(&self, event: StoreEvent) {
        self.events.lock().unwrap().push(event.clone());
        let _ = self.tx.send(event);
    }
}

impl StoreSession for MockSession {
    fn folder_exists(&mut self, folder: &str) -> Result<bool, EmailError> {
        self.record(StoreEvent::Exists(folder.to_string()));
        Ok(self.folders.contains_key(folder))
    }

    fn open_read_only(&mut self, folder: &str) -> Result<u32, EmailError> {
        self.record(StoreEvent::Opened(folder.to_string()));
        self.open = Some(folder.to_string());
        let count = self.folders.get(folder).map_or(0, Vec::len);
        Ok(u32::try_from(count).unwrap())
    }

    fn subjects(&mut self) -> Result<Vec<String>, EmailError> {
        self.record(StoreEvent::Listed);
        if self.fail_listing {
            return Err(EmailError::Mailbox(imap::Error::Bad(
                "listing refused".to_string(),
            )));
        }
        let folder = self.open.as_deref().unwrap_or_default();
        Ok(self.folders.get(folder).cloned().unwrap_or_default())
    }

    fn close_folder(&mut self) -> Result<(), EmailError> {
        self.record(StoreEvent::ClosedFolder);
        self.open = None;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), EmailError> {
        self.record(StoreEvent::LoggedOut);
        Ok(())
    }
}

pub fn executor() -> TaskExecutor {
    TaskExecutor::new(&ExecutorConfig {
        core_pool_size: 2,
        max_pool_size: 4,
        queue_capacity: 16,
        keep_alive: Duration::from_secs(1),
        thread_name_prefix: "Test-".to_string(),
    })
}

pub fn service(transport: Arc<RecordingTransport>, store: Arc<MockStore>) -> Arc<EmailService> {
    Arc::new(EmailService::new(
        SENDER.to_string(),
        transport,
        store,
        executor(),
    ))
}

/// Full app: declared queue, registered consumer, router.
pub fn app(transport: Arc<RecordingTransport>, store: Arc<MockStore>) -> Router {
    let service = service(transport, store);
    let broker = Arc::new(Broker::new(16));
    broker.declare(QUEUE);
    service.register_consumer(&broker, QUEUE).unwrap();

    router(Arc::new(AppState {
        service,
        broker,
        queue: QUEUE.to_string(),
    }))
}

/// Waits for the next item, failing the test after a second.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for background work")
        .expect("channel closed")
}

/// Drains `rx` until `wanted` shows up, returning everything seen.
pub async fn until<T: PartialEq + Clone>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    wanted: &T,
) -> Vec<T> {
    let mut seen = Vec::new();
    loop {
        let item = next(rx).await;
        seen.push(item.clone());
        if &item == wanted {
            return seen;
        }
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
