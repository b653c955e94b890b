use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::llm::{GatewayRequest, LlmGateway};

type Script = HashMap<String, VecDeque<Result<serde_json::Value, GatewayError>>>;

/// Gateway that replays queued responses per response schema
pub struct ScriptedGateway {
    script: Mutex<Script>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response for `schema`
    pub fn respond(self, schema: &str, value: serde_json::Value) -> Self {
        self.push(schema, Ok(value));
        self
    }

    /// Queue a failure for `schema`
    pub fn fail(self, schema: &str, error: GatewayError) -> Self {
        self.push(schema, Err(error));
        self
    }

    fn push(&self, schema: &str, entry: Result<serde_json::Value, GatewayError>) {
        self.script
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push_back(entry);
    }

    /// Requests received for `schema`, in order
    pub fn requests(&self, schema: &str) -> Vec<GatewayRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.response_schema.name == schema)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, schema: &str) -> usize {
        self.requests(schema).len()
    }

    /// Responses still queued for `schema`
    pub fn remaining(&self, schema: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .get(schema)
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn invoke(&self, request: &GatewayRequest) -> Result<serde_json::Value, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let name = request.response_schema.name;
        self.script
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(GatewayError::transient(format!("no scripted response for {}", name))))
    }
}
