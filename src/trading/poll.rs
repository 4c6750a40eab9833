use std::future::Future;
use std::time::Instant;

use super::error::{FlowError, FlowResult, Step};
use crate::api::{
    Account, ApiResult, Customer, IdentityVerification, Trade,
};
use crate::core::config::PollingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Done,
    Pending,
    Failed,
}

/// A remote resource whose lifecycle is observed by polling.
pub trait Stateful {
    fn kind(&self) -> &'static str;
    fn guid(&self) -> &str;
    fn state_label(&self) -> String;
}

impl Stateful for Customer {
    fn kind(&self) -> &'static str {
        "customer"
    }
    fn guid(&self) -> &str {
        &self.guid
    }
    fn state_label(&self) -> String {
        self.state.to_string()
    }
}

impl Stateful for IdentityVerification {
    fn kind(&self) -> &'static str {
        "identity verification"
    }
    fn guid(&self) -> &str {
        &self.guid
    }
    fn state_label(&self) -> String {
        self.state.to_string()
    }
}

impl Stateful for Account {
    fn kind(&self) -> &'static str {
        "account"
    }
    fn guid(&self) -> &str {
        &self.guid
    }
    fn state_label(&self) -> String {
        self.state.to_string()
    }
}

impl Stateful for Trade {
    fn kind(&self) -> &'static str {
        "trade"
    }
    fn guid(&self) -> &str {
        &self.guid
    }
    fn state_label(&self) -> String {
        self.state.to_string()
    }
}

/// Re-fetches `initial` until `classify` reports a terminal status.
///
/// The value returned by the create call is inspected first, so a resource
/// that is already in its target state costs no extra request. Fetch errors
/// are not retried.
pub async fn wait_for<T, F, Fut, C>(
    step: Step,
    polling: &PollingConfig,
    initial: T,
    mut fetch: F,
    classify: C,
) -> FlowResult<T>
where
    T: Stateful,
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
    C: Fn(&T) -> PollStatus,
{
    let started = Instant::now();
    let mut current = initial;
    let mut attempts: u32 = 0;

    loop {
        match classify(&current) {
            PollStatus::Done => {
                tracing::info!(
                    "✅ {} {} reached state {}",
                    current.kind(),
                    current.guid(),
                    current.state_label()
                );
                return Ok(current);
            }
            PollStatus::Failed => {
                return Err(FlowError::UnexpectedState {
                    step,
                    resource: format!("{} {}", current.kind(), current.guid()),
                    state: current.state_label(),
                });
            }
            PollStatus::Pending => {}
        }

        if started.elapsed() >= polling.timeout {
            tracing::warn!(
                "⏱️  Gave up on {} {} after {} polls",
                current.kind(),
                current.guid(),
                attempts
            );
            return Err(FlowError::UnexpectedState {
                step,
                resource: format!("{} {}", current.kind(), current.guid()),
                state: format!(
                    "{} (timed out after {}s)",
                    current.state_label(),
                    polling.timeout.as_secs()
                ),
            });
        }

        tracing::debug!(
            "{} {} is {}, waiting {:?}",
            current.kind(),
            current.guid(),
            current.state_label(),
            polling.interval
        );
        tokio::time::sleep(polling.interval).await;

        attempts += 1;
        current = fetch().await.map_err(FlowError::upstream(step))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AccountState, ApiError, Asset};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn account(state: AccountState) -> Account {
        Account {
            guid: "A1".to_string(),
            customer_guid: Some("C1".to_string()),
            asset: Asset::BTC,
            state,
            platform_balance: Decimal::ZERO,
            platform_available: Decimal::ZERO,
        }
    }

    fn polling(timeout: Duration) -> PollingConfig {
        PollingConfig {
            timeout,
            interval: Duration::ZERO,
        }
    }

    fn created(a: &Account) -> PollStatus {
        match a.state {
            AccountState::Created => PollStatus::Done,
            _ => PollStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_returns_immediately_when_already_done() {
        let calls = AtomicUsize::new(0);
        let result = wait_for(
            Step::CreateAccount,
            &polling(Duration::from_secs(5)),
            account(AccountState::Created),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(account(AccountState::Created)) }
            },
            created,
        )
        .await;

        tokio_test::assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_polls_until_done() {
        let calls = AtomicUsize::new(0);
        let result = wait_for(
            Step::CreateAccount,
            &polling(Duration::from_secs(5)),
            account(AccountState::Storing),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let state = if n < 2 { AccountState::Storing } else { AccountState::Created };
                async move { Ok(account(state)) }
            },
            created,
        )
        .await
        .unwrap();

        assert_eq!(result.state, AccountState::Created);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_with_last_state() {
        let err = wait_for(
            Step::CreateAccount,
            &polling(Duration::ZERO),
            account(AccountState::Storing),
            || async { Ok(account(AccountState::Storing)) },
            created,
        )
        .await
        .unwrap_err();

        match err {
            FlowError::UnexpectedState { step, resource, state } => {
                assert_eq!(step, Step::CreateAccount);
                assert_eq!(resource, "account A1");
                assert!(state.starts_with("storing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_aborts() {
        let err = wait_for(
            Step::CreateAccount,
            &polling(Duration::from_secs(5)),
            account(AccountState::Storing),
            || async { Err(ApiError::decode("garbled")) },
            created,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Upstream {
                step: Step::CreateAccount,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_classification_stops_polling() {
        let err = wait_for(
            Step::CreateAccount,
            &polling(Duration::from_secs(5)),
            account(AccountState::Unknown),
            || async { Ok(account(AccountState::Created)) },
            |a: &Account| {
                if a.state == AccountState::Unknown {
                    PollStatus::Failed
                } else {
                    created(a)
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FlowError::UnexpectedState { .. }));
    }
}
