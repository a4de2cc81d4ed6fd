use native_tls::{TlsConnector, TlsStream};

use std::net::TcpStream;

use crate::{
    config::{MailConfig, ServerConfig},
    error::EmailError,
};

use super::{MailStore, StoreSession, check_folder_name};

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// IMAP mailbox reached over implicit TLS.
pub struct ImapStore {
    server: ServerConfig,
    username: String,
    password: String,
}

impl ImapStore {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            server: config.imap.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

impl MailStore for ImapStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, EmailError> {
        let tls = TlsConnector::builder().build()?;

        tracing::debug!(
            "Connecting to IMAP server {}:{}",
            self.server.host,
            self.server.port
        );
        let client = imap::connect(
            (self.server.host.as_str(), self.server.port),
            self.server.host.as_str(),
            &tls,
        )?;

        let session = client
            .login(&self.username, &self.password)
            .map_err(|(e, _client)| e)?;

        Ok(Box::new(ImapConnection { session }))
    }
}

/// Renders `folder` as an IMAP quoted string.
fn quote_mailbox(folder: &str) -> Result<String, EmailError> {
    check_folder_name(folder)?;
    Ok(format!(
        "\"{}\"",
        folder.replace('\\', "\\\\").replace('"', "\\\"")
    ))
}

/// Decodes RFC 2047 encoded words in a raw envelope subject.
fn decode_subject(raw: &[u8]) -> String {
    let mut line = b"Subject: ".to_vec();
    line.extend_from_slice(raw);

    match mailparse::parse_header(&line) {
        Ok((header, _)) => header.get_value(),
        Err(e) => {
            tracing::debug!("Subject is not a parseable header: {e}");
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}

struct ImapConnection {
    session: ImapSession,
}

impl StoreSession for ImapConnection {
    fn folder_exists(&mut self, folder: &str) -> Result<bool, EmailError> {
        // LIST treats `*` and `%` as wildcards, so match the exact name
        let names = self.session.list(None, Some(&quote_mailbox(folder)?))?;
        Ok(names.iter().any(|name| name.name() == folder))
    }

    fn open_read_only(&mut self, folder: &str) -> Result<u32, EmailError> {
        let mailbox = self.session.examine(folder)?;
        Ok(mailbox.exists)
    }

    fn subjects(&mut self) -> Result<Vec<String>, EmailError> {
        let fetches = self.session.fetch("1:*", "ENVELOPE")?;
        Ok(fetches
            .iter()
            .map(|fetch| {
                fetch
                    .envelope()
                    .and_then(|envelope| envelope.subject)
                    .map(decode_subject)
                    .unwrap_or_default()
            })
            .collect())
    }

    fn close_folder(&mut self) -> Result<(), EmailError> {
        self.session.close()?;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), EmailError> {
        self.session.logout()?;
        Ok(())
    }
}
