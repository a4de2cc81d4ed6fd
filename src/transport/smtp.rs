use async_trait::async_trait;
use lettre::message::{Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::{
    config::{MailConfig, ServerConfig},
    dto::OutgoingEmail,
    error::EmailError,
};

use super::MailTransport;

/// Sends through an SMTP relay with STARTTLS, one session per message.
pub struct SmtpMailer {
    server: ServerConfig,
    username: String,
    password: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            server: config.smtp.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// Builds the wire message. `to` may hold several comma-separated addresses.
pub(crate) fn build_message(email: &OutgoingEmail) -> Result<Message, EmailError> {
    let from: Mailbox = email.from.parse()?;
    let recipients: Mailboxes = email.to.parse()?;

    let mut builder = Message::builder().from(from).subject(email.subject.clone());
    for recipient in recipients {
        builder = builder.to(recipient);
    }

    Ok(builder.body(email.content.clone())?)
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn transmit(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = build_message(email)?;

        let creds = Credentials::new(self.username.clone(), self.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server.host)?
            .port(self.server.port)
            .credentials(creds)
            .build();

        tracing::debug!(
            "Opening SMTP session to {}:{}",
            self.server.host,
            self.server.port
        );

        mailer.send(message).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "sender@example.com".to_string(),
            to: to.to_string(),
            subject: "Hi".to_string(),
            content: "Hello".to_string(),
        }
    }

    #[test]
    fn builds_message_for_single_recipient() {
        let message = build_message(&email("a@b.com")).unwrap();

        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 1);
        assert_eq!(envelope.to()[0].to_string(), "a@b.com");
        assert_eq!(
            envelope.from().map(ToString::to_string).as_deref(),
            Some("sender@example.com")
        );
    }

    #[test]
    fn builds_message_for_recipient_list() {
        let message = build_message(&email("a@b.com, Carol <c@d.com>")).unwrap();

        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(recipients, vec!["a@b.com", "c@d.com"]);
    }

    #[test]
    fn rejects_malformed_recipient() {
        let result = build_message(&email("not an address"));

        assert!(matches!(result, Err(EmailError::AddressFormat(_))));
    }

    #[test]
    fn rejects_empty_recipient() {
        let result = build_message(&email(""));

        assert!(result.is_err());
    }
}
