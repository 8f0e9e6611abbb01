//! JSON-over-HTTP [`Submitter`].
//!
//! `ureq` is blocking, so each call runs on tokio's blocking pool. A 2xx
//! response carrying a [`SubmissionAck`] is an acknowledgment; any other
//! status, a transport error, or an unreadable body is a retryable failure.

use std::time::Duration;

use evalia_core::models::submission::{SubmissionAck, SubmissionRequest};
use evalia_session::error::SubmitError;
use evalia_session::submitter::{BoxFuture, Submitter};

pub struct HttpSubmitter {
    agent: ureq::Agent,
    url: String,
}

impl HttpSubmitter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.into(),
        }
    }
}

impl Submitter for HttpSubmitter {
    fn submit<'a>(
        &'a self,
        request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<SubmissionAck, SubmitError>> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let request = request.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || post(&agent, &url, &request))
                .await
                .map_err(|e| SubmitError::Backend(format!("submission task failed: {e}")))?
        })
    }
}

fn post(
    agent: &ureq::Agent,
    url: &str,
    request: &SubmissionRequest,
) -> Result<SubmissionAck, SubmitError> {
    tracing::debug!(url, submission_id = %request.submission_id, "posting submission");

    let mut response = agent.post(url).send_json(request).map_err(|e| match e {
        ureq::Error::StatusCode(status) => {
            SubmitError::Backend(format!("backend returned HTTP {status}"))
        }
        other => SubmitError::Backend(other.to_string()),
    })?;

    let ack: SubmissionAck = response
        .body_mut()
        .read_json()
        .map_err(|e| SubmitError::Backend(format!("unreadable acknowledgment: {e}")))?;

    tracing::debug!(
        submission_id = %request.submission_id,
        accepted = ack.accepted,
        "backend acknowledged submission"
    );
    Ok(ack)
}
