//! One outbound bot identity over the chat HTTP API.

use std::time::Duration;

use serde_json::json;
use tracing::debug;

/// Deadline for one send.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Classified result of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered.
    Sent,
    /// Chat API rate-limited this bot; wait the given seconds.
    RetryAfter(u64),
    /// Transient failure (5xx, timeout); eligible for retry elsewhere.
    Transient(String),
    /// Permanent failure (bad request, forbidden channel); drop.
    Permanent(String),
}

/// A single bot identity with its own token.
pub struct BotClient {
    http: reqwest::Client,
    token: String,
    index: usize,
}

impl BotClient {
    /// Wrap a bot token. The HTTP client is shared across the pool.
    pub fn new(http: reqwest::Client, token: String, index: usize) -> Self {
        Self { http, token, index }
    }

    /// Build the pool's shared HTTP client.
    pub fn pool_http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .connect_timeout(Duration::from_millis(500))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client")
    }

    /// Position of this bot in the rotation.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Public bot id (the numeric token prefix), for logs.
    pub fn id(&self) -> &str {
        self.token.split(':').next().unwrap_or("unknown")
    }

    /// Send one HTML message and classify the outcome.
    pub async fn send_message(&self, channel: i64, html: &str) -> SendOutcome {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = json!({
            "chat_id": channel,
            "text": html,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
            "disable_notification": true,
        });

        let response = match self.http.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return SendOutcome::Transient("send timeout".to_string())
            }
            Err(e) => return SendOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            debug!(bot = %self.id(), channel, "Message delivered");
            return SendOutcome::Sent;
        }

        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(&body).unwrap_or(1);
            return SendOutcome::RetryAfter(retry_after);
        }

        if status.is_server_error() {
            return SendOutcome::Transient(format!("HTTP {status}"));
        }

        // 403 forbidden channel, 400 bad request and the rest of the 4xx
        // family: retrying cannot help.
        SendOutcome::Permanent(format!("HTTP {status}: {}", truncate(&body, 200)))
    }
}

/// Pull `parameters.retry_after` out of a 429 response body.
fn parse_retry_after(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["parameters"]["retry_after"].as_u64()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_id_is_token_prefix() {
        let bot = BotClient::new(BotClient::pool_http(), "12345:secret-part".to_string(), 0);
        assert_eq!(bot.id(), "12345");
        assert_eq!(bot.index(), 0);
    }

    #[test]
    fn retry_after_parsed_from_body() {
        let body = r#"{"ok":false,"error_code":429,"parameters":{"retry_after":17}}"#;
        assert_eq!(parse_retry_after(body), Some(17));
        assert_eq!(parse_retry_after("not json"), None);
        assert_eq!(parse_retry_after(r#"{"ok":false}"#), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
