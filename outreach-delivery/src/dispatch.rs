//! SMTP dispatch.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use outreach_common::{SmtpSettings, TlsMode};
use tracing::debug;

use crate::error::DispatchError;

/// A message ready to hand to a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Sends one message, or explains why the relay would not take it.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DispatchError>;
}

/// An attachment loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl AttachmentFile {
    /// Reads `path` and guesses its content type from the extension.
    pub async fn load(path: &Path) -> Result<Self, DispatchError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| DispatchError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;

        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |name| name.to_string_lossy().into_owned());

        Ok(Self {
            filename,
            content_type: guess_content_type(path),
            data,
        })
    }
}

/// [`Dispatcher`] over lettre's pooled async SMTP transport.
#[derive(Clone)]
pub struct SmtpDispatcher {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpDispatcher {
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, DispatchError> {
        let from: Mailbox = settings.from.parse().map_err(|err: lettre::address::AddressError| {
            DispatchError::Address {
                address: settings.from.clone(),
                reason: err.to_string(),
            }
        })?;

        let mut builder = match settings.tls {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server),
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .map_err(|err| DispatchError::Config(err.to_string()))?,
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                .map_err(|err| DispatchError::Config(err.to_string()))?,
        };

        builder = builder
            .port(settings.port)
            .timeout(Some(settings.timeout));

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }
}

impl std::fmt::Debug for SmtpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpDispatcher")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Dispatcher for SmtpDispatcher {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        let mut attachments = Vec::with_capacity(email.attachments.len());
        for path in &email.attachments {
            attachments.push(AttachmentFile::load(path).await?);
        }

        let message = build_message(&self.from, email, attachments)?;
        let response = self.transport.send(message).await?;

        debug!(
            "Relay accepted message for {}: {} {}",
            email.to,
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        );

        Ok(())
    }
}

/// Assembles the MIME message.
///
/// Plain text only when there is nothing to attach, `multipart/mixed`
/// otherwise.
pub fn build_message(
    from: &Mailbox,
    email: &OutgoingEmail,
    attachments: Vec<AttachmentFile>,
) -> Result<Message, DispatchError> {
    let to: Mailbox = email.to.parse().map_err(|err: lettre::address::AddressError| {
        DispatchError::Address {
            address: email.to.clone(),
            reason: err.to_string(),
        }
    })?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone());

    let message = if attachments.is_empty() {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
    } else {
        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
        for attachment in attachments {
            let content_type = ContentType::parse(attachment.content_type)
                .map_err(|err| DispatchError::Message(err.to_string()))?;
            multipart = multipart
                .singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type));
        }
        builder.multipart(multipart)
    };

    message.map_err(|err| DispatchError::Message(err.to_string()))
}

/// Content type from a file extension.
#[must_use]
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
