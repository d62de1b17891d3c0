//! Email notifications

use std::{
    ffi::{OsStr, OsString},
    fmt,
};

use anyhow::Context as _;
use lettre::{
    Message, SendmailTransport, Transport as _,
    message::{Mailbox, header::ContentType},
};

/// Default mail transfer agent
pub(crate) const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

/// Default sender address
pub(crate) const DEFAULT_FROM: &str = "tstat-ledger@localhost";

/// Body content type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum BodyFormat {
    /// Plain text
    Text,
    /// Preformatted HTML, keeps ledger columns aligned in mail clients
    Html,
}

/// Something that can deliver a message
pub(crate) trait Notifier {
    /// Deliver a message
    fn send(&self, subject: &str, body: &str, format: BodyFormat) -> anyhow::Result<()>;
}

/// Send a message, only logging failures
pub(crate) fn notify(notifier: &dyn Notifier, subject: &str, body: &str, format: BodyFormat) {
    log::info!("Sending notification {subject:?}");
    if let Err(err) = notifier.send(subject, body, format) {
        log::error!("Failed to send notification {subject:?}: {err:#}");
    }
}

/// Wrap body in a minimal HTML document
pub(crate) fn html_body(body: &str) -> String {
    format!("<html>\n<body>\n<pre>\n{body}\n</pre>\n</body>\n</html>")
}

/// Build a message, headers are encoded as needed
fn message(
    from: &Mailbox,
    to: &Mailbox,
    subject: &str,
    body: &str,
    format: BodyFormat,
) -> anyhow::Result<Message> {
    let builder = Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject);
    match format {
        BodyFormat::Html => builder
            .header(ContentType::TEXT_HTML)
            .body(html_body(body)),
        BodyFormat::Text => builder.header(ContentType::TEXT_PLAIN).body(body.to_owned()),
    }
    .context("Failed to build message")
}

/// Notifier handing messages to a sendmail compatible command
pub(crate) struct SendmailNotifier {
    /// Command path
    cmd: OsString,
    /// Transport running the command
    transport: SendmailTransport,
    /// Sender address
    from: Mailbox,
    /// Recipient address
    to: Mailbox,
}

impl SendmailNotifier {
    /// Build a new sendmail notifier
    pub(crate) fn new(cmd: &OsStr, from: Mailbox, to: Mailbox) -> Self {
        Self {
            cmd: cmd.to_owned(),
            transport: SendmailTransport::new_with_command(cmd),
            from,
            to,
        }
    }
}

impl fmt::Display for SendmailNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.cmd.to_string_lossy(), self.to)
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, subject: &str, body: &str, format: BodyFormat) -> anyhow::Result<()> {
        let msg = message(&self.from, &self.to, subject, body, format)?;
        log::debug!("Handing message to {self}");
        self.transport
            .send(&msg)
            .with_context(|| format!("Mail command {self} failed"))?;
        log::info!("Mail {subject:?} sent to {}", self.to);
        Ok(())
    }
}
