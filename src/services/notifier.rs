// src/services/notifier.rs

//! Notification delivery.
//!
//! One message per posting. A call is a single attempt; retries are the
//! orchestrator's job via [`RetryPolicy`](super::RetryPolicy).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, NotifyError, NotifyErrorKind, Result};
use crate::models::{NotifierConfig, Posting};
use crate::utils::http::create_api_client;

/// Telegram's limit on message text, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

const FIELD_LIMIT: usize = 512;
const URL_LIMIT: usize = 1024;
const ELLIPSIS: &str = "…";

/// Delivers one posting to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// One delivery attempt for `posting`.
    async fn notify(&self, posting: &Posting) -> std::result::Result<(), NotifyError>;
}

// --- Telegram ---

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ApiErrorParameters>,
}

#[derive(Deserialize)]
struct ApiErrorParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Sends postings through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    chat_id: String,
    token: Secret<String>,
    throttle: Duration,
}

impl TelegramNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let chat_id = config
            .target()
            .ok_or_else(|| AppError::config("notification target is not set"))?;
        let token = config
            .credential()
            .ok_or_else(|| AppError::config("notification credential is not set"))?;

        Ok(Self {
            client: create_api_client(config.timeout_secs)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            chat_id: chat_id.to_string(),
            token: token.clone(),
            throttle: Duration::from_millis(config.throttle_ms),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token.expose_secret())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, posting: &Posting) -> std::result::Result<(), NotifyError> {
        let text = render_message(posting);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // `without_url` keeps the bot token out of error messages.
        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                NotifyError::new(NotifyErrorKind::NetworkError, e.without_url().to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            log::info!("Notified {} ({})", posting.id, posting.title);
            if !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            return Ok(());
        }

        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        Err(classify_response(status, body))
    }
}

fn classify_response(status: StatusCode, body: ApiErrorBody) -> NotifyError {
    let description = body
        .description
        .unwrap_or_else(|| "no description".to_string());
    let message = format!("HTTP {status}: {description}");

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = body
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            NotifyError::new(NotifyErrorKind::RateLimited, message).with_retry_after(retry_after)
        }
        StatusCode::BAD_REQUEST if description.contains("can't parse entities") => {
            NotifyError::new(NotifyErrorKind::Rejected, message)
        }
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND => NotifyError::new(NotifyErrorKind::InvalidTarget, message),
        _ => NotifyError::new(NotifyErrorKind::NetworkError, message),
    }
}

// --- Dry run ---

/// Logs the message it would have sent and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, posting: &Posting) -> std::result::Result<(), NotifyError> {
        log::info!(
            "[DRY RUN] Would notify {}: {} @ {} <{}>",
            posting.id,
            posting.title,
            posting.company,
            posting.url
        );
        log::debug!("[DRY RUN] Message body:\n{}", render_message(posting));
        Ok(())
    }
}

// --- Formatting ---

/// Telegram HTML message for a posting.
///
/// Only the text block is ever truncated; the link line is appended whole so
/// the markup stays balanced.
pub fn render_message(posting: &Posting) -> String {
    let field = |s: &str| truncate_graphemes(&html_escape::encode_text(s), FIELD_LIMIT);
    let optional = |s: &Option<String>| s.as_deref().map_or_else(|| "n/a".to_string(), field);

    let text = format!(
        "🔥 <b>New job posting</b>\n\n\
         💼 <b>{title}</b>\n\
         🏢 {company}\n\
         📍 {location}\n\
         💰 {salary}\n\
         📅 {posted_at}",
        title = field(&posting.title),
        company = field(&posting.company),
        location = optional(&posting.location),
        salary = optional(&posting.salary),
        posted_at = optional(&posting.posted_at),
    );

    let href = html_escape::encode_double_quoted_attribute(&posting.url);
    let link = if href.chars().count() <= URL_LIMIT {
        format!("<a href=\"{href}\">🔗 View posting</a>")
    } else {
        format!(
            "🔗 {}",
            truncate_graphemes(&html_escape::encode_text(&posting.url), URL_LIMIT)
        )
    };

    let budget = MESSAGE_LIMIT.saturating_sub(link.chars().count() + 2);
    format!("{}\n\n{link}", truncate_graphemes(&text, budget))
}

/// Cut `text` to at most `max_chars` characters without splitting a
/// grapheme cluster or an HTML entity. An ellipsis marks the cut.
pub fn truncate_graphemes(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(ELLIPSIS.chars().count());
    let mut used = 0;
    let mut out = String::new();
    for grapheme in text.graphemes(true) {
        let len = grapheme.chars().count();
        if used + len > budget {
            break;
        }
        used += len;
        out.push_str(grapheme);
    }

    // Drop a dangling partial entity such as "&am".
    if let Some(amp) = out.rfind('&') {
        if !out[amp..].contains(';') {
            out.truncate(amp);
        }
    }

    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> Posting {
        Posting {
            id: "81000003".to_string(),
            title: "C++ & Rust <Senior> Engineer".to_string(),
            company: "Acme".to_string(),
            url: "https://www.seek.com.au/job/81000003".to_string(),
            location: Some("Sydney NSW".to_string()),
            salary: None,
            posted_at: Some("2026-10-18".to_string()),
        }
    }

    fn config_for(api_base: &str) -> NotifierConfig {
        NotifierConfig {
            target: Some("-100123".to_string()),
            credential: Some(Secret::new("123:ABC".to_string())),
            api_base: api_base.to_string(),
            throttle_ms: 0,
            ..NotifierConfig::default()
        }
    }

    #[test]
    fn test_render_escapes_fields() {
        let text = render_message(&posting());
        assert!(text.contains("<b>C++ &amp; Rust &lt;Senior&gt; Engineer</b>"));
        assert!(text.contains("🏢 Acme"));
        assert!(text.contains("💰 n/a"));
        assert!(text.contains(r#"<a href="https://www.seek.com.au/job/81000003">"#));
    }

    #[test]
    fn test_render_respects_limit() {
        let mut long = posting();
        long.title = "é".repeat(10_000);
        long.company = "👩‍💻".repeat(3_000);
        long.location = Some("x".repeat(3_000));
        long.salary = Some("&".repeat(3_000));
        long.posted_at = Some("y".repeat(3_000));
        let text = render_message(&long);
        assert!(text.chars().count() <= MESSAGE_LIMIT);
    }

    #[test]
    fn test_render_long_url_keeps_markup_balanced() {
        let mut long = posting();
        long.url = format!("https://www.seek.com.au/ads/{}", "u".repeat(2_000));
        long.title = "t".repeat(3_000);
        long.company = "c".repeat(3_000);
        let text = render_message(&long);
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(!text.contains("<a href"));
        assert_eq!(text.matches("<b>").count(), text.matches("</b>").count());

        long.url = format!("https://www.seek.com.au/ads/{}", "u".repeat(900));
        let text = render_message(&long);
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(text.ends_with("🔗 View posting</a>"));
    }

    #[test]
    fn test_truncate_keeps_graphemes_whole() {
        let family = "👩‍👩‍👧";
        let text = family.repeat(10);
        let cut = truncate_graphemes(&text, 12);
        assert!(cut.ends_with(ELLIPSIS));
        let body = cut.trim_end_matches(ELLIPSIS);
        assert_eq!(body.chars().count() % family.chars().count(), 0);
    }

    #[test]
    fn test_truncate_drops_partial_entity() {
        assert_eq!(truncate_graphemes("ab&amp;cd", 5), "ab…");
        assert_eq!(truncate_graphemes("short", 10), "short");
    }

    #[test]
    fn test_new_requires_target_and_credential() {
        let mut config = config_for("http://localhost");
        config.target = None;
        assert!(TelegramNotifier::new(&config).is_err());

        let mut config = config_for("http://localhost");
        config.credential = None;
        assert!(TelegramNotifier::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_notify_posts_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "chat_id": "-100123",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.url())).unwrap();
        notifier.notify(&posting()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_notify_rate_limited_carries_hint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(429)
            .with_body(
                r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5","parameters":{"retry_after":5}}"#,
            )
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.url())).unwrap();
        let err = notifier.notify(&posting()).await.unwrap_err();
        assert_eq!(err.kind, NotifyErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_notify_bad_chat_is_invalid_target() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.url())).unwrap();
        let err = notifier.notify(&posting()).await.unwrap_err();
        assert_eq!(err.kind, NotifyErrorKind::InvalidTarget);
        assert!(err.is_fatal());
        assert!(err.message.contains("chat not found"));
    }

    #[tokio::test]
    async fn test_notify_unparsable_markup_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(400)
            .with_body(
                r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities: Unclosed start tag at byte offset 4090"}"#,
            )
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.url())).unwrap();
        let err = notifier.notify(&posting()).await.unwrap_err();
        assert_eq!(err.kind, NotifyErrorKind::Rejected);
        assert!(!err.is_fatal());
        assert!(!crate::services::Retryable::is_retryable(&err));
    }

    #[tokio::test]
    async fn test_notify_server_error_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.url())).unwrap();
        let err = notifier.notify(&posting()).await.unwrap_err();
        assert_eq!(err.kind, NotifyErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        let notifier = TelegramNotifier::new(&config_for("http://127.0.0.1:9")).unwrap();
        let err = notifier.notify(&posting()).await.unwrap_err();
        assert_eq!(err.kind, NotifyErrorKind::NetworkError);
        assert!(!err.message.contains("123:ABC"));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.notify(&posting()).await.is_ok());
    }
}
