use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// The one message that travels over the queue.
///
/// Absent fields are accepted as empty strings: nothing is validated before
/// the transport tries to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct EmailSendRequest {
    pub to: String,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FetchQuery {
    /// Mailbox folder to list, e.g. `INBOX`
    #[serde(rename = "folderName")]
    pub folder_name: String,
}

/// What the transport actually hands to the mail server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: String,
}
