//! Scripted transport replaying canned appliance answers.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use reqwest::Method;
use serde_json::Value as JsonValue;

use super::{ApiRequest, Transport};
use crate::error::Error;

type Route = (Method, String);

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<Route, VecDeque<Result<JsonValue, Error>>>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues `body` as the next answer for `method url`.
    pub(crate) fn reply(self, method: Method, url: &str, body: JsonValue) -> Self {
        self.push(method, url, Ok(body));
        self
    }

    /// Queues a transport failure as the next answer for `method url`.
    pub(crate) fn fail(self, method: Method, url: &str, error: Error) -> Self {
        self.push(method, url, Err(error));
        self
    }

    fn push(&self, method: Method, url: &str, answer: Result<JsonValue, Error>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_owned()))
            .or_default()
            .push_back(answer);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: &Method, url: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method() == method && r.url().as_str() == url)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<JsonValue, Error> {
        let route = (request.method().clone(), request.url().to_string());
        let operation = request.operation();
        self.log.lock().unwrap().push(request);

        let next = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| {
            Err(Error::Api {
                operation,
                status: Some(404),
                code: None,
                detail: format!("no scripted answer for {} {}", route.0, route.1),
            })
        })
    }
}

/// `{"success": true, "result": result}`
pub(crate) fn ok(result: JsonValue) -> JsonValue {
    serde_json::json!({ "success": true, "result": result })
}
