use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use apiprobe_core::{
    ApiDocument, Case, MediaTypeDefinition, Operation, Parameter, ParameterLocation, RequestBody,
    Response, Transport, TransportError,
};
use ctor::ctor;
use serde_json::{json, Value as JsonValue};

#[ctor]
fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

/// Raw JSON of the users fixture document.
pub const USERS_DOCUMENT: &str = include_str!("../fixtures/users.json");

pub fn users_document() -> ApiDocument {
    ApiDocument::from_json_str(USERS_DOCUMENT).expect("users fixture document")
}

pub fn users_document_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("users.json")
}

pub fn parameter(name: &str, location: ParameterLocation, schema: JsonValue) -> Parameter {
    Parameter::new(name, location, schema)
}

pub fn required_parameter(name: &str, location: ParameterLocation, schema: JsonValue) -> Parameter {
    Parameter::new(name, location, schema).required()
}

pub fn operation_with_parameters(method: &str, path: &str, parameters: Vec<Parameter>) -> Operation {
    let mut operation = Operation::new(method, path);
    operation.parameters = parameters;
    operation
}

/// Operation whose only component is a required JSON body.
pub fn json_body_operation(method: &str, path: &str, schema: JsonValue) -> Operation {
    let mut operation = Operation::new(method, path);
    operation.request_body = Some(RequestBody {
        required: true,
        content: vec![MediaTypeDefinition {
            media_type: "application/json".to_string(),
            schema,
            example: None,
            examples: None,
        }],
    });
    operation
}

enum Scripted {
    Reply(Response),
    Fail(String),
}

/// Answers by operation label and records every case it was sent.
///
/// `POST` cases without a scripted answer get `201 {"id": n}` with an
/// increasing `n`; everything else defaults to `200`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<BTreeMap<String, VecDeque<Scripted>>>>,
    requests: Arc<Mutex<Vec<Case>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `response` for the next unanswered call of `label`.
    pub fn with_response(self, label: &str, response: Response) -> Self {
        self.push(label, Scripted::Reply(response));
        self
    }

    pub fn with_failure(self, label: &str, message: &str) -> Self {
        self.push(label, Scripted::Fail(message.to_string()));
        self
    }

    /// Cases sent so far, in order.
    pub fn requests(&self) -> Vec<Case> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn push(&self, label: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .entry(label.to_string())
            .or_default()
            .push_back(scripted);
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, case: &Case) -> Result<Response, TransportError> {
        let mut requests = self.requests.lock().expect("requests lock");
        requests.push(case.clone());
        let scripted = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(&case.operation)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(TransportError::new(message)),
            None if case.method == "POST" => {
                Ok(Response::new(201).with_body(json!({ "id": requests.len() })))
            }
            None => Ok(Response::new(200)),
        }
    }
}
