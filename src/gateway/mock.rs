//! Mock completion gateway for testing
//!
//! Returns a configurable reply or error without any network access, and
//! records what it was sent so tests can assert on the transcript.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::gateway::{Completion, CompletionGateway, DecodingParams, GatewayError, Usage};
use crate::session::Turn;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scriptable gateway.
///
/// Clones share state, so a test can keep a handle after giving the gateway
/// to a `ConversationManager`.
///
/// # Example
///
/// ```rust
/// use solvemate::gateway::{CompletionGateway, DecodingParams, MockGateway};
/// use solvemate::session::Turn;
///
/// async fn test_example() {
///     let mock = MockGateway::new();
///     mock.set_reply("Hello!");
///
///     let completion = mock
///         .send("model", &[Turn::user("Hi")], &DecodingParams::default())
///         .await
///         .unwrap();
///
///     assert_eq!(completion.reply, "Hello!");
/// }
/// ```
#[derive(Clone)]
pub struct MockGateway {
    completion: Arc<Mutex<Completion>>,
    error: Arc<Mutex<Option<GatewayError>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    call_count: Arc<Mutex<usize>>,
    last_messages: Arc<Mutex<Option<Vec<Turn>>>>,
    last_model: Arc<Mutex<Option<String>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            completion: Arc::new(Mutex::new(Completion::new("Mock response"))),
            error: Arc::new(Mutex::new(None)),
            delay: Arc::new(Mutex::new(None)),
            call_count: Arc::new(Mutex::new(0)),
            last_messages: Arc::new(Mutex::new(None)),
            last_model: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.set_reply(reply);
        mock
    }

    pub fn with_error(error: GatewayError) -> Self {
        let mock = Self::new();
        mock.set_error(error);
        mock
    }

    pub fn set_reply(&self, reply: impl Into<String>) {
        *lock(&self.completion) = Completion::new(reply);
    }

    pub fn set_reply_with_usage(&self, reply: impl Into<String>, usage: Usage) {
        *lock(&self.completion) = Completion::new(reply).with_usage(usage);
    }

    /// Makes every call fail with `error` until cleared
    pub fn set_error(&self, error: GatewayError) {
        *lock(&self.error) = Some(error);
    }

    pub fn clear_error(&self) {
        *lock(&self.error) = None;
    }

    /// Sleeps this long before answering each call
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    pub fn last_messages(&self) -> Option<Vec<Turn>> {
        lock(&self.last_messages).clone()
    }

    pub fn last_model(&self) -> Option<String> {
        lock(&self.last_model).clone()
    }

    pub fn reset(&self) {
        *lock(&self.completion) = Completion::new("Mock response");
        *lock(&self.error) = None;
        *lock(&self.delay) = None;
        *lock(&self.call_count) = 0;
        *lock(&self.last_messages) = None;
        *lock(&self.last_model) = None;
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CompletionGateway for MockGateway {
    async fn send(
        &self,
        model: &str,
        messages: &[Turn],
        _params: &DecodingParams,
    ) -> Result<Completion, GatewayError> {
        *lock(&self.call_count) += 1;
        *lock(&self.last_messages) = Some(messages.to_vec());
        *lock(&self.last_model) = Some(model.to_string());

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let error = lock(&self.error).clone();
        if let Some(err) = error {
            return Err(err);
        }

        Ok(lock(&self.completion).clone())
    }

    fn gateway_name(&self) -> &'static str {
        "mock"
    }
}
