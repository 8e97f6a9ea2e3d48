use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use tracing::debug;

use crate::config::MailConfig;

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";

/// A rendered message ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()>;
}

/// Transactional email over the provider's HTTP API.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: config.api_key.clone(),
            from: format!("{} <{}>", config.sender_name, config.sender_address),
        }
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()> {
        let payload = SendPayload {
            from: &self.from,
            to: [mail.to.as_str()],
            subject: &mail.subject,
            html: &mail.html,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mail provider returned {status}: {body}");
        }
        debug!(to = %mail.to, subject = %mail.subject, "email dispatched");
        Ok(())
    }
}

/// Captures messages instead of sending them; used by `AppState::fake` and
/// unit tests.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()> {
        self.sent.lock().expect("mailer mutex poisoned").push(mail);
        Ok(())
    }
}

pub fn verification_email(name: &str, verify_url: &str) -> (String, String) {
    let subject = "Verify your email".to_string();
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Confirm your email address to finish setting up your account.</p>\
         <p><a href=\"{verify_url}\">Verify email</a></p>\
         <p>If you did not create an account, you can ignore this message.</p>"
    );
    (subject, html)
}

pub fn reset_email(name: &str, email: &str, reset_url: &str) -> (String, String) {
    let subject = "Reset your password".to_string();
    let html = format!(
        "<p>Hi {name},</p>\
         <p>We received a request to reset the password for {email}.</p>\
         <p><a href=\"{reset_url}\">Reset password</a></p>\
         <p>The link works once and expires shortly.</p>"
    );
    (subject, html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_embeds_action_url() {
        let (subject, html) =
            verification_email("Jordan", "https://app.example/auth/verify-email?token=abc123");
        assert_eq!(subject, "Verify your email");
        assert!(html.contains("Jordan"));
        assert!(html.contains("https://app.example/auth/verify-email?token=abc123"));
    }

    #[test]
    fn reset_email_embeds_recipient_and_url() {
        let (subject, html) = reset_email(
            "Jordan",
            "a@b.com",
            "https://app.example/auth/reset-password?token=xyz",
        );
        assert_eq!(subject, "Reset your password");
        assert!(html.contains("a@b.com"));
        assert!(html.contains("token=xyz"));
    }

    #[tokio::test]
    async fn recording_mailer_captures_each_message() {
        let mailer = RecordingMailer::default();
        let mail = OutboundMail {
            to: "a@b.com".into(),
            subject: "Verify your email".into(),
            html: "<p>hi</p>".into(),
        };
        mailer.send(mail.clone()).await.expect("send");
        let sent = mailer.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], mail);
    }
}
