use std::time::Duration;

use tracing::{debug, info, warn};

use braid_core::error::{BraidError, Result};
use braid_core::traits::Agent;
use braid_core::types::{AgentInputs, AgentOutputs};

use crate::registry::AgentRegistry;

/// Retry/backoff policy for a single agent or tool call.
///
/// `max_retries` is the number of retries after the first attempt, so a
/// call makes `max_retries + 1` invocation attempts in total. Backoff is a
/// constant delay between attempts.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    max_retries: u32,
    retry_backoff: Duration,
}

impl CallPolicy {
    /// Build a policy, validating the parameters before any call is made.
    ///
    /// `retry_backoff_secs` must be a finite, non-negative number of seconds.
    pub fn new(max_retries: u32, retry_backoff_secs: f64) -> Result<Self> {
        if !retry_backoff_secs.is_finite() || retry_backoff_secs < 0.0 {
            return Err(BraidError::InvalidConfiguration(format!(
                "retry backoff must be a non-negative number of seconds, got {}",
                retry_backoff_secs
            )));
        }
        Ok(Self {
            max_retries,
            retry_backoff: Duration::from_secs_f64(retry_backoff_secs),
        })
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Invoke an agent with bounded retries and an optional fallback.
///
/// The target is attempted `max_retries + 1` times, sleeping the policy's
/// constant backoff between attempts. Once attempts are exhausted the
/// fallback (if any) is invoked; if it also fails, or none was provided,
/// the last error is wrapped in `CallExhausted`.
///
/// Holds no state across calls; concurrent calls to different targets are
/// independent.
pub async fn call(
    target: &dyn Agent,
    inputs: &AgentInputs,
    policy: &CallPolicy,
    fallback: Option<&dyn Agent>,
) -> Result<AgentOutputs> {
    let attempts = policy.max_retries() + 1;
    let mut attempt = 0;

    let last_err = loop {
        attempt += 1;
        match target.execute(inputs.clone()).await {
            Ok(outputs) => {
                debug!(agent = target.name(), attempt, "Agent call succeeded");
                return Ok(outputs);
            }
            Err(e) => {
                warn!(
                    agent = target.name(),
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Agent call failed"
                );
                if attempt >= attempts {
                    break e;
                }
                if !policy.retry_backoff().is_zero() {
                    tokio::time::sleep(policy.retry_backoff()).await;
                }
            }
        }
    };

    if let Some(fallback) = fallback {
        info!(
            agent = target.name(),
            fallback = fallback.name(),
            "Retries exhausted, invoking fallback"
        );
        return match fallback.execute(inputs.clone()).await {
            Ok(outputs) => Ok(outputs),
            Err(e) => Err(BraidError::CallExhausted {
                target: target.name().to_string(),
                attempts,
                source: Box::new(e),
            }),
        };
    }

    Err(BraidError::CallExhausted {
        target: target.name().to_string(),
        attempts,
        source: Box::new(last_err),
    })
}

/// Look an agent up by name, then `call` it.
pub async fn call_agent(
    registry: &AgentRegistry,
    name: &str,
    inputs: &AgentInputs,
    policy: &CallPolicy,
    fallback: Option<&dyn Agent>,
) -> Result<AgentOutputs> {
    let agent = registry.get(name)?;
    call(agent.as_ref(), inputs, policy, fallback).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use futures::future::BoxFuture;

    /// Fails the first `failures` invocations, succeeds afterwards.
    struct FlakyAgent {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl FlakyAgent {
        fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    failures,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Agent for FlakyAgent {
        fn name(&self) -> &str {
            "flaky"
        }

        fn execute(&self, _inputs: AgentInputs) -> BoxFuture<'_, Result<AgentOutputs>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < self.failures {
                    Err(BraidError::AgentExecution {
                        agent: "flaky".into(),
                        message: format!("failure {}", n + 1),
                    })
                } else {
                    let mut out = AgentOutputs::new();
                    out.insert("ok".into(), serde_json::json!(true));
                    Ok(out)
                }
            })
        }
    }

    fn always_failing() -> (FlakyAgent, Arc<AtomicU32>) {
        FlakyAgent::new(u32::MAX)
    }

    #[test]
    fn test_policy_rejects_bad_backoff() {
        assert!(matches!(
            CallPolicy::new(1, -0.5),
            Err(BraidError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            CallPolicy::new(1, f64::NAN),
            Err(BraidError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            CallPolicy::new(1, f64::INFINITY),
            Err(BraidError::InvalidConfiguration(_))
        ));
        assert!(CallPolicy::new(0, 0.0).is_ok());
    }

    #[tokio::test]
    async fn test_exact_attempt_count_before_exhaustion() {
        let (agent, calls) = always_failing();
        let policy = CallPolicy::new(3, 0.0).unwrap();

        let err = call(&agent, &AgentInputs::new(), &policy, None)
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            BraidError::CallExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected CallExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let (agent, calls) = always_failing();
        let policy = CallPolicy::new(0, 0.0).unwrap();

        let result = call(&agent, &AgentInputs::new(), &policy, None).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_within_retry_budget() {
        let (agent, calls) = FlakyAgent::new(2);
        let policy = CallPolicy::new(2, 0.0).unwrap();

        let outputs = call(&agent, &AgentInputs::new(), &policy, None)
            .await
            .unwrap();
        assert_eq!(outputs["ok"], serde_json::json!(true));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fallback_result_is_returned() {
        let (agent, _) = always_failing();
        let fallback = crate::llm_agent::FnAgent::new("fallback", |_| {
            let mut out = AgentOutputs::new();
            out.insert("source".into(), serde_json::json!("fallback"));
            Ok(out)
        });
        let policy = CallPolicy::new(1, 0.0).unwrap();

        let outputs = call(
            &agent,
            &AgentInputs::new(),
            &policy,
            Some(&fallback as &dyn Agent),
        )
        .await
        .unwrap();
        assert_eq!(outputs["source"], serde_json::json!("fallback"));
    }

    #[tokio::test]
    async fn test_failing_fallback_wraps_into_exhausted() {
        let (agent, _) = always_failing();
        let fallback = crate::llm_agent::FnAgent::new("fallback", |_| {
            Err(BraidError::AgentExecution {
                agent: "fallback".into(),
                message: "also down".into(),
            })
        });
        let policy = CallPolicy::new(0, 0.0).unwrap();

        let err = call(
            &agent,
            &AgentInputs::new(),
            &policy,
            Some(&fallback as &dyn Agent),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BraidError::CallExhausted { .. }));
        assert!(err.to_string().contains("also down"));
    }

    #[tokio::test]
    async fn test_call_agent_resolves_through_registry() {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(crate::llm_agent::FnAgent::new("echo", |inputs| {
                Ok(inputs)
            })))
            .unwrap();

        let mut inputs = AgentInputs::new();
        inputs.insert("v".into(), serde_json::json!(1));

        let outputs = call_agent(&registry, "echo", &inputs, &CallPolicy::no_retry(), None)
            .await
            .unwrap();
        assert_eq!(outputs["v"], serde_json::json!(1));

        assert!(matches!(
            call_agent(
                &registry,
                "ghost",
                &inputs,
                &CallPolicy::no_retry(),
                None
            )
            .await,
            Err(BraidError::AgentNotRegistered(_))
        ));
    }
}
