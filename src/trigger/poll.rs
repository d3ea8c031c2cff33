// src/trigger/poll.rs

//! Poll trigger: waits on a coordinator inbox over HTTP.
//!
//! The first request is a long-poll against `/agent/api/wait`. Coordinators
//! that don't implement it (404/405/501) are short-polled against
//! `/agent/api/pending` every `interval` for the rest of this watcher's life.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::config::PollSpec;
use crate::trigger::TriggerOutcome;

/// Extra client-side allowance on top of the server-side wait budget.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Floor for immediate long-poll rechecks, so a coordinator that answers
/// `count = 0` without waiting cannot spin us.
const MIN_LONG_POLL_RECHECK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Unknown,
    LongPoll,
    ShortPoll,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    #[serde(alias = "pending")]
    count: u64,
}

#[derive(Debug)]
pub struct PollTrigger {
    label: String,
    base_url: String,
    agent_id: String,
    token: Option<String>,
    wait: Duration,
    interval: Duration,
    mode: PollMode,
    backoff: Backoff,
    http: reqwest::Client,
}

impl PollTrigger {
    pub fn new(
        label: String,
        spec: &PollSpec,
        agent_name: &str,
        http: reqwest::Client,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            label,
            base_url: spec.url.trim_end_matches('/').to_string(),
            agent_id: spec
                .agent_id
                .clone()
                .unwrap_or_else(|| agent_name.to_string()),
            token: spec.token.clone(),
            wait: spec.wait,
            interval: spec.interval,
            mode: PollMode::Unknown,
            backoff: Backoff::new(backoff),
            http,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// One request against the coordinator.
    pub async fn attempt(&mut self, cancel: &CancellationToken) -> TriggerOutcome {
        let short = self.mode == PollMode::ShortPoll;
        let request = if short {
            self.short_poll_request()
        } else {
            self.long_poll_request()
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return TriggerOutcome::Cancelled,
            res = request.send() => res,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => return self.failed(format!("request failed: {e}")),
        };

        let status = response.status();
        if self.mode == PollMode::Unknown {
            if is_unsupported(status) {
                info!(
                    trigger = %self.label,
                    status = %status,
                    interval = ?self.interval,
                    "coordinator has no long-poll endpoint; falling back to short polling"
                );
                self.mode = PollMode::ShortPoll;
                return TriggerOutcome::Pending {
                    recheck_after: Duration::ZERO,
                };
            }
            if status.is_success() {
                self.mode = PollMode::LongPoll;
            }
        }

        if !status.is_success() {
            return self.failed(format!("coordinator returned {status}"));
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return TriggerOutcome::Cancelled,
            body = response.json::<PendingResponse>() => body,
        };

        match body {
            Ok(PendingResponse { count }) if count > 0 => {
                debug!(trigger = %self.label, count, "messages pending");
                self.backoff.reset();
                TriggerOutcome::Fired
            }
            Ok(_) => {
                self.backoff.reset();
                let recheck_after = if short {
                    self.interval
                } else {
                    MIN_LONG_POLL_RECHECK
                };
                TriggerOutcome::Pending { recheck_after }
            }
            Err(e) => self.failed(format!("unreadable response body: {e}")),
        }
    }

    fn long_poll_request(&self) -> reqwest::RequestBuilder {
        let url = format!("{}/agent/api/wait", self.base_url);
        let req = self
            .http
            .get(url)
            .query(&[
                ("agent_id", self.agent_id.clone()),
                ("timeout", self.wait.as_secs().max(1).to_string()),
            ])
            .timeout(self.wait.saturating_add(CLIENT_TIMEOUT_SLACK));
        self.authorize(req)
    }

    fn short_poll_request(&self) -> reqwest::RequestBuilder {
        let url = format!("{}/agent/api/pending", self.base_url);
        let req = self
            .http
            .get(url)
            .query(&[("agent_id", self.agent_id.as_str())])
            .timeout(CLIENT_TIMEOUT_SLACK);
        self.authorize(req)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn failed(&mut self, error: String) -> TriggerOutcome {
        let (attempt, retry_after) = self.backoff.next_delay();
        TriggerOutcome::Failed {
            error,
            attempt,
            retry_after,
        }
    }
}

fn is_unsupported(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(url: &str) -> PollSpec {
        PollSpec {
            url: url.to_string(),
            agent_id: None,
            token: None,
            wait: Duration::from_secs(30),
            interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn agent_id_defaults_to_agent_name() {
        let trigger = PollTrigger::new(
            "poll#0".to_string(),
            &spec("http://coordinator/"),
            "notes",
            reqwest::Client::new(),
            BackoffPolicy::default(),
        );
        assert_eq!(trigger.agent_id(), "notes");
        assert_eq!(trigger.mode(), PollMode::Unknown);
    }

    #[test]
    fn pending_body_accepts_both_field_names() {
        let a: PendingResponse = serde_json::from_str(r#"{"count": 2}"#).unwrap();
        let b: PendingResponse = serde_json::from_str(r#"{"pending": 0, "extra": true}"#).unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(b.count, 0);
    }

    #[test]
    fn only_missing_endpoints_trigger_fallback() {
        assert!(is_unsupported(StatusCode::NOT_FOUND));
        assert!(is_unsupported(StatusCode::NOT_IMPLEMENTED));
        assert!(!is_unsupported(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_unsupported(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn long_poll_timeout_saturates_for_huge_waits() {
        let mut huge = spec("http://coordinator");
        huge.wait = Duration::MAX;
        let trigger = PollTrigger::new(
            "poll#0".to_string(),
            &huge,
            "notes",
            reqwest::Client::new(),
            BackoffPolicy::default(),
        );
        let request = trigger.long_poll_request().build().unwrap();
        assert_eq!(request.timeout(), Some(&Duration::MAX));
    }

    #[tokio::test]
    async fn unreachable_coordinator_backs_off() {
        let mut trigger = PollTrigger::new(
            "poll#0".to_string(),
            &spec("http://127.0.0.1:9"),
            "notes",
            reqwest::Client::new(),
            BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();

        let first = trigger.attempt(&cancel).await;
        let second = trigger.attempt(&cancel).await;
        assert!(matches!(
            first,
            TriggerOutcome::Failed { attempt: 1, retry_after, .. } if retry_after == Duration::from_secs(5)
        ));
        assert!(matches!(
            second,
            TriggerOutcome::Failed { attempt: 2, retry_after, .. } if retry_after == Duration::from_secs(10)
        ));
    }
}
