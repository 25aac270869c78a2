//! Outbound message dispatch with rate-limit handling.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;
use tracing::warn;

/// Extra wait added on top of the platform-provided retry interval.
const RETRY_MARGIN: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum SendError {
    /// Telegram asked us to wait before sending again.
    RateLimited(Duration),
    /// Any other transport failure.
    Other(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(wait) => write!(f, "rate limited, retry after {wait:?}"),
            Self::Other(reason) => write!(f, "send failed: {reason}"),
        }
    }
}

/// Trait abstracting the outbound send so retry behavior is testable.
#[async_trait]
pub trait MessageApi: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), SendError>;
}

/// Production sender backed by the teloxide bot.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageApi for TelegramSender {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), SendError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }

        match request.await {
            Ok(_) => Ok(()),
            Err(teloxide::RequestError::RetryAfter(seconds)) => {
                Err(SendError::RateLimited(seconds.duration()))
            }
            Err(e) => Err(SendError::Other(e.to_string())),
        }
    }
}

/// Sends outbound replies, absorbing rate-limit responses.
///
/// Delivery is best-effort: a rate-limited send waits the platform-provided
/// interval plus a safety margin and retries exactly once; any other failure
/// is logged and dropped.
pub struct Dispatcher<A: MessageApi> {
    api: A,
    margin: Duration,
}

impl<A: MessageApi> Dispatcher<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            margin: RETRY_MARGIN,
        }
    }

    #[cfg(test)]
    fn with_margin(api: A, margin: Duration) -> Self {
        Self { api, margin }
    }

    pub async fn send(&self, chat_id: i64, text: &str, keyboard: Option<InlineKeyboardMarkup>) {
        match self.api.send_text(chat_id, text, keyboard.clone()).await {
            Ok(()) => {}
            Err(SendError::RateLimited(wait)) => {
                let delay = wait + self.margin;
                warn!("Rate limited on chat {chat_id}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                if let Err(e) = self.api.send_text(chat_id, text, keyboard).await {
                    warn!("Dropping message for chat {chat_id}: {e}");
                }
            }
            Err(e) => {
                warn!("Dropping message for chat {chat_id}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Mock that replays scripted results and records every attempt.
    struct MockApi {
        script: Mutex<VecDeque<Result<(), SendError>>>,
        calls: Mutex<Vec<(i64, String)>>,
    }

    impl MockApi {
        fn new(script: Vec<Result<(), SendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MessageApi for MockApi {
        async fn send_text(
            &self,
            chat_id: i64,
            text: &str,
            _keyboard: Option<InlineKeyboardMarkup>,
        ) -> Result<(), SendError> {
            self.calls.lock().unwrap().push((chat_id, text.to_string()));
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_successful_send_is_single_attempt() {
        let dispatcher = Dispatcher::with_margin(MockApi::new(vec![Ok(())]), Duration::ZERO);
        dispatcher.send(42, "hello", None).await;

        assert_eq!(dispatcher.api.call_count(), 1);
        assert_eq!(dispatcher.api.calls.lock().unwrap()[0], (42, "hello".to_string()));
    }

    #[tokio::test]
    async fn test_rate_limit_waits_then_retries_once() {
        let wait = Duration::from_millis(100);
        let dispatcher = Dispatcher::with_margin(
            MockApi::new(vec![Err(SendError::RateLimited(wait)), Ok(())]),
            Duration::ZERO,
        );

        let started = Instant::now();
        dispatcher.send(42, "rates", None).await;

        assert_eq!(dispatcher.api.call_count(), 2);
        assert!(started.elapsed() >= wait, "retry happened too early");
    }

    #[tokio::test]
    async fn test_second_rate_limit_is_dropped() {
        // Retry exactly once per invocation, never more.
        let dispatcher = Dispatcher::with_margin(
            MockApi::new(vec![
                Err(SendError::RateLimited(Duration::from_millis(10))),
                Err(SendError::RateLimited(Duration::from_millis(10))),
            ]),
            Duration::ZERO,
        );
        dispatcher.send(42, "rates", None).await;

        assert_eq!(dispatcher.api.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_dropped_without_retry() {
        let dispatcher = Dispatcher::with_margin(
            MockApi::new(vec![Err(SendError::Other("connection reset".into()))]),
            Duration::ZERO,
        );
        dispatcher.send(42, "rates", None).await;

        assert_eq!(dispatcher.api.call_count(), 1);
    }
}
