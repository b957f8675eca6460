//! Bounded reconnection loop
//!
//! States: attempting, succeeded, exhausted. The attempt counter is
//! checked before each attempt; the sequence ends once it exceeds
//! `max_reconnection_attempts`, so a policy of N allows one initial
//! attempt plus N retries. Retries are immediate: the per-attempt
//! timeout is the only delay.

use crate::config::{ResolvedConfig, RetryPolicy};
use crate::engine::{ClientHandle, EngineAdapter};
use crate::utils::{ConnectionError, Diagnostics};

use super::establish::attempt_connect;

/// Connect, retrying failed attempts until the policy is exhausted
///
/// Individual attempt failures are only reported to `diagnostics`;
/// the caller sees either a handle or `RetryExhausted`.
pub async fn connect_with_retry(
    adapter: &dyn EngineAdapter,
    config: &ResolvedConfig,
    policy: RetryPolicy,
    diagnostics: &Diagnostics,
) -> Result<ClientHandle, ConnectionError> {
    let timeout = policy.attempt_timeout();
    let mut attempts: u32 = 0;

    loop {
        if attempts > policy.max_reconnection_attempts {
            return Err(ConnectionError::RetryExhausted { attempts });
        }
        attempts += 1;

        match attempt_connect(adapter, config, timeout).await {
            Ok(handle) => return Ok(handle),
            Err(e) => {
                diagnostics.info(format_args!(
                    "{} attempt {} to {} failed: {}",
                    adapter.engine(),
                    attempts,
                    config,
                    e
                ));
            }
        }
    }
}
