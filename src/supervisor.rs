//! Connection supervision: keeps the long-polling session alive forever.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use teloxide::payloads::{DeleteWebhookSetters, GetUpdatesSetters};
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::{ApiError, RequestError};
use tracing::{info, warn};

use crate::handlers::EventRouter;

/// Long-poll timeout passed to getUpdates.
const POLL_TIMEOUT_SECS: u32 = 25;

/// How a polling session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Another instance is polling with the same token.
    Conflict(String),
    /// Any other session failure.
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(reason) => write!(f, "session conflict: {reason}"),
            Self::Failed(reason) => write!(f, "session failed: {reason}"),
        }
    }
}

fn classify(error: RequestError) -> SessionEnd {
    match error {
        RequestError::Api(ApiError::TerminatedByOtherGetUpdates) => {
            SessionEnd::Conflict("another getUpdates session is active".to_string())
        }
        other => SessionEnd::Failed(other.to_string()),
    }
}

/// Backoff intervals between session restarts.
///
/// A conflict gets the long interval: it means an external actor is polling
/// with the same token and must be stopped before reconnecting is useful.
pub struct BackoffPolicy {
    pub conflict: Duration,
    pub failure: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            conflict: Duration::from_secs(30),
            failure: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for(&self, end: &SessionEnd) -> Duration {
        match end {
            SessionEnd::Conflict(_) => self.conflict,
            SessionEnd::Failed(_) => self.failure,
        }
    }
}

/// Run one polling session until it fails.
///
/// Clears any stale webhook registration and pending backlog first, so a
/// previous instance's updates do not replay, then long-polls getUpdates
/// and routes each update in arrival order.
pub async fn run_session(bot: Bot, router: Arc<EventRouter>) -> SessionEnd {
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        warn!("Failed to clear webhook: {e} (continuing anyway)");
    }

    info!("Polling session started");
    let mut offset: Option<i32> = None;

    loop {
        let mut request = bot
            .get_updates()
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);
        if let Some(o) = offset {
            request = request.offset(o);
        }

        match request.await {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.id.0 as i32 + 1);
                    router.route(update).await;
                }
            }
            Err(e) => return classify(e),
        }
    }
}

/// Restart the session forever, backing off between attempts.
///
/// Deliberately never terminates: availability is preferred over fast-fail
/// since there is no supervising process manager. Each call to `session`
/// starts from a clean slate (new offset, backlog dropped).
pub async fn supervise<F, Fut>(policy: BackoffPolicy, mut session: F) -> Infallible
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SessionEnd>,
{
    loop {
        let end = session().await;
        let delay = policy.delay_for(&end);
        warn!("{end}; reconnecting in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}
