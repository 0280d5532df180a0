//! A scripted transport for layer tests: canned responses per method, plus a
//! record of every request that reached it.

use crate::{ProviderError, Result, Transport};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::Mutex,
};

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method`. Multiple responses are consumed in
    /// order; the final one is sticky.
    pub(crate) fn respond(self, method: &str, response: Value) -> Self {
        self.responses.lock().unwrap().entry(method.to_owned()).or_default().push(response);
        self
    }

    /// Every request that reached the transport, in order.
    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// The recorded params of the `n`-th call to `method`.
    pub(crate) fn params_of(&self, method: &str, n: usize) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .nth(n)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait::async_trait]
impl Transport for std::sync::Arc<MockTransport> {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        (**self).request(method, params).await
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push((method.to_owned(), params));

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(method) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) => Ok(queue[0].clone()),
            None => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("the method {method} does not exist/is not available"),
            }),
        }
    }
}
