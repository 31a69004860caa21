use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use futures::future::{self, BoxFuture};

use crate::error::{HarnessError, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;
use crate::transport::Transport;

/// Transport that replays scripted responses and records every request it receives.
///
/// Responses queued with [`respond_with`](Self::respond_with) are returned in order;
/// once the queue is empty the [`then_always`](Self::then_always) response is repeated.
/// Without one, further sends fail like a refused connection.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ResponseDescriptor>>,
    fallback: Option<ResponseDescriptor>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(self, response: ResponseDescriptor) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    pub fn then_always(mut self, response: ResponseDescriptor) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_response(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        lock(&self.requests).push(request.clone());
        if let Some(response) = lock(&self.responses).pop_front() {
            return Ok(response);
        }
        self.fallback.clone().ok_or_else(|| {
            HarnessError::InvalidRequest(format!(
                "no scripted response left for {} {}",
                request.method(),
                request.target()
            ))
        })
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> BoxFuture<'a, Result<ResponseDescriptor>> {
        Box::pin(future::ready(self.next_response(request)))
    }
}
