//! Single bounded-timeout connection attempt

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::ResolvedConfig;
use crate::engine::{ClientEvent, ClientHandle, EngineAdapter, PendingClient};
use crate::utils::ConnectionError;

/// Create a client and wait until it is ready, fails, or `timeout` elapses
///
/// The outcome settles exactly once: the first "ready" resolves it, an
/// "error" before that rejects it. Events after settlement are never
/// observed here, so a spurious post-ready error cannot change the
/// result. The timer is dropped on every path.
pub async fn attempt_connect(
    adapter: &dyn EngineAdapter,
    config: &ResolvedConfig,
    timeout: Duration,
) -> Result<ClientHandle, ConnectionError> {
    let PendingClient { handle, mut events } = adapter.create_client(config);

    match tokio::time::timeout(timeout, wait_for_ready(&mut events)).await {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ConnectionError::Timeout(timeout)),
    }
}

async fn wait_for_ready(
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<(), ConnectionError> {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Ready) => return Ok(()),
            Ok(ClientEvent::Error(message)) => return Err(ConnectionError::Client(message)),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return Err(ConnectionError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::testutil::{Script, ScriptedAdapter};

    fn config() -> ResolvedConfig {
        RedisConfig::from_host("127.0.0.1", 6379).resolve(0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_resolves() {
        let adapter = ScriptedAdapter::new(vec![Script::Ready(Duration::from_millis(100))]);
        let handle = attempt_connect(&adapter, &config(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(handle.same_client(&adapter.created()[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_before_ready_rejects() {
        let adapter = ScriptedAdapter::new(vec![Script::Error(Duration::from_millis(100))]);
        let err = attempt_connect(&adapter, &config(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, ConnectionError::Client("ECONNREFUSED".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out() {
        let adapter = ScriptedAdapter::new(vec![Script::Silent]);
        let start = tokio::time::Instant::now();
        let err = attempt_connect(&adapter, &config(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err, ConnectionError::Timeout(Duration::from_secs(5)));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_timeout_is_ignored() {
        let adapter = ScriptedAdapter::new(vec![Script::Ready(Duration::from_secs(10))]);
        let err = attempt_connect(&adapter, &config(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_ready_does_not_change_outcome() {
        let adapter = ScriptedAdapter::new(vec![Script::ReadyThenError(
            Duration::from_millis(10),
            Duration::from_millis(10),
        )]);
        let handle = attempt_connect(&adapter, &config(), Duration::from_secs(5))
            .await
            .unwrap();

        let mut observer = handle.subscribe();
        assert_eq!(
            observer.recv().await.unwrap(),
            ClientEvent::Error("ECONNRESET".to_string())
        );

        // Still usable after the late error
        let value = handle
            .call_method("set", vec![b"k".to_vec(), b"v".to_vec()])
            .await
            .unwrap();
        assert_eq!(value, redis::Value::Okay);
    }
}
