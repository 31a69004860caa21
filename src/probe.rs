//! Resend one request until the service answers with an expected status and body.

use std::time::Duration;

use crate::error::Result;
use crate::poller::PollConfig;
use crate::request::RequestDescriptor;
use crate::response::{ResponseDescriptor, StatusCode};
use crate::transport::Session;
use crate::verify::{verify, VerificationFailure};

/// What a response must look like to end the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub status: StatusCode,
    /// Text the body must contain.
    pub contains: Option<String>,
}

impl Expectation {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            contains: None,
        }
    }

    pub fn containing(mut self, text: &str) -> Self {
        self.contains = Some(text.to_string());
        self
    }

    pub fn matches(&self, response: &ResponseDescriptor) -> bool {
        response.status() == self.status
            && self
                .contains
                .as_deref()
                .map_or(true, |needle| response.text().contains(needle))
    }

    /// Check `response` against the expectation, reporting the poll's attempt count.
    pub fn verify(
        &self,
        response: &ResponseDescriptor,
        attempts: u32,
    ) -> std::result::Result<(), VerificationFailure> {
        verify(response.status())
            .labeled("response status")
            .after_attempts(attempts)
            .is(self.status)?;
        if let Some(needle) = &self.contains {
            verify(response.text())
                .labeled("response body")
                .after_attempts(attempts)
                .contains(needle)?;
        }
        Ok(())
    }
}

/// Summary of a probe that met its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: StatusCode,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `request` through `session` until `expectation` holds.
///
/// Giving up is reported as [`HarnessError::Verification`](crate::HarnessError::Verification)
/// describing the last response; transport faults end the probe with their own error.
pub async fn probe(
    session: &Session,
    request: &RequestDescriptor,
    expectation: &Expectation,
    config: PollConfig,
) -> Result<ProbeReport> {
    let result = session
        .poll_response(request, config, |response| expectation.matches(response))
        .await?;

    let response = result.value();
    expectation.verify(response, result.attempts())?;
    Ok(ProbeReport {
        status: response.status(),
        attempts: result.attempts(),
        elapsed: result.elapsed(),
    })
}
