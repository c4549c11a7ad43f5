//! JSON-RPC 2.0 envelope handling shared by every role.
//!
//! Every agent exposes a single `POST /mcp` endpoint. The body goes through [`dispatch`],
//! which always produces exactly one [`RpcResponse`]:
//!
//! - invalid JSON → `-32700` with a `null` id
//! - malformed envelope → `-32600`
//! - unknown method → `-32601`
//! - params rejected by the method → `-32602`, with a `data` string describing why
//! - handler failure or panic → `-32603`
//!
//! Methods are looked up through a [`MethodTable`], which lets several names (aliases)
//! resolve to the same handler before dispatch.

use std::{any::Any, collections::HashMap, fmt::Debug, panic::AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Value of the `jsonrpc` member of every request and response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The JSON sent is not a valid request object.
    InvalidRequest,
    /// The method does not exist.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
}

impl ErrorCode {
    /// Numeric code sent on the wire.
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    /// Standard message associated with the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Reverse lookup of [`ErrorCode::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
        ]
        .into_iter()
        .find(|kind| kind.code() == code)
    }
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Short description.
    pub message: String,
    /// Optional details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Error of the given kind with the standard message.
    pub fn new(kind: ErrorCode, data: Option<Value>) -> Self {
        Self {
            code: kind.code(),
            message: kind.message().to_string(),
            data,
        }
    }

    #[allow(missing_docs)]
    pub fn parse_error(detail: impl ToString) -> Self {
        Self::new(ErrorCode::ParseError, Some(Value::String(detail.to_string())))
    }

    #[allow(missing_docs)]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, Some(Value::String(detail.into())))
    }

    #[allow(missing_docs)]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            Some(Value::String(format!("Method '{method}' is not supported"))),
        )
    }

    #[allow(missing_docs)]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, Some(Value::String(detail.into())))
    }

    #[allow(missing_docs)]
    pub fn internal(detail: impl ToString) -> Self {
        Self::new(ErrorCode::InternalError, Some(Value::String(detail.to_string())))
    }

    /// The standard kind of this error, if the code is a standard one.
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// Method parameters, validated lazily by each handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Option<Value>);

impl Params {
    /// Wrap raw params.
    pub fn new(value: Option<Value>) -> Self {
        Self(value)
    }

    /// Raw params, if any were sent.
    pub fn as_value(&self) -> Option<&Value> {
        self.0.as_ref()
    }

    /// Deserialize object params into `T`.
    ///
    /// Absent params are treated as an empty object, so that a missing required key is reported
    /// as such. Array params are rejected.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        let value = match self.0 {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value @ Value::Object(_)) => value,
            Some(_) => return Err(RpcError::invalid_params("params must be an object")),
        };
        serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self(Some(value))
    }
}

/// A request whose envelope passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Request id, echoed in the response. `Null` when absent.
    pub id: Value,
    /// Method name as sent, before alias resolution.
    pub method: String,
    /// Method parameters.
    pub params: Params,
}

/// A JSON-RPC response: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request this answers.
    #[serde(default)]
    pub id: Value,
    /// Method output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// `Ok(result)` or `Err(error)`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Validate the envelope of a raw request body.
///
/// On failure, the error response to send back is returned.
pub fn parse_request(body: &[u8]) -> Result<RpcRequest, RpcResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!("JSON parse error: {e}");
        RpcResponse::error(Value::Null, RpcError::parse_error(e))
    })?;

    let Value::Object(mut envelope) = value else {
        return Err(RpcResponse::error(
            Value::Null,
            RpcError::invalid_request("request must be a JSON object"),
        ));
    };

    let id = match envelope.remove("id") {
        None => Value::Null,
        Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id,
        Some(_) => {
            return Err(RpcResponse::error(
                Value::Null,
                RpcError::invalid_request("'id' must be a string, number, or null"),
            ))
        }
    };
    let reject = |detail: &str| {
        warn!(%id, "invalid request: {detail}");
        RpcResponse::error(id.clone(), RpcError::invalid_request(detail))
    };

    match envelope.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        None => return Err(reject("missing 'jsonrpc' field")),
        Some(_) => return Err(reject("'jsonrpc' must be \"2.0\"")),
    }

    let method = match envelope.remove("method") {
        Some(Value::String(method)) => method,
        None => return Err(reject("missing 'method' field")),
        Some(_) => return Err(reject("'method' must be a string")),
    };

    let params = match envelope.remove("params") {
        None | Some(Value::Null) => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
        Some(_) => return Err(reject("'params' must be an object or array")),
    };

    Ok(RpcRequest {
        id,
        method,
        params: Params::new(params),
    })
}

/// Method names accepted by a service, several names possibly mapping to the same method.
#[derive(Debug, Clone)]
pub struct MethodTable<M> {
    methods: HashMap<&'static str, M>,
}

impl<M: Copy> MethodTable<M> {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register `name` for `method`.
    pub fn with_method(mut self, name: &'static str, method: M) -> Self {
        self.methods.insert(name, method);
        self
    }

    /// Register `alias` for the method already registered under `canonical`.
    ///
    /// Aliasing an unknown name is ignored (and logged).
    pub fn with_alias(mut self, alias: &'static str, canonical: &str) -> Self {
        match self.methods.get(canonical).copied() {
            Some(method) => {
                self.methods.insert(alias, method);
            }
            None => warn!("cannot alias '{alias}': '{canonical}' is not registered"),
        }
        self
    }

    /// Resolve a method name (or alias).
    pub fn resolve(&self, name: &str) -> Option<M> {
        self.methods.get(name).copied()
    }

    /// All accepted names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = self.methods.keys().copied().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl<M: Copy> Default for MethodTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A JSON-RPC service.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Methods understood by this service, already resolved from their names.
    type Method: Copy + Debug + Send + Sync;

    /// Method names and aliases.
    fn methods(&self) -> &MethodTable<Self::Method>;

    /// Run one method.
    ///
    /// Returning an [`RpcError`] produces an error response; any other failure should be
    /// mapped to [`RpcError::internal`].
    async fn handle(&self, method: Self::Method, params: Params) -> Result<Value, RpcError>;
}

/// Turn a raw request body into the response to send back.
///
/// Never fails: every outcome, including a panicking handler, is a response.
pub async fn dispatch<H: RpcHandler + ?Sized>(handler: &H, body: &[u8]) -> RpcResponse {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let Some(method) = handler.methods().resolve(&request.method) else {
        warn!(method = %request.method, "method not found");
        return RpcResponse::error(request.id, RpcError::method_not_found(&request.method));
    };
    debug!(name = %request.method, ?method, id = %request.id, "dispatching");

    let outcome = AssertUnwindSafe(handler.handle(method, request.params))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(result)) => RpcResponse::success(request.id, result),
        Ok(Err(err)) => {
            if err.kind() == Some(ErrorCode::InternalError) {
                error!(method = %request.method, "handler failed: {err} ({:?})", err.data);
            } else {
                warn!(method = %request.method, "request rejected: {err} ({:?})", err.data);
            }
            RpcResponse::error(request.id, err)
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(method = %request.method, "handler panicked: {detail}");
            RpcResponse::error(request.id, RpcError::internal(detail))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod jsonrpc_tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum TestMethod {
        Echo,
        Fail,
        Panic,
        Typed,
    }

    struct TestService {
        methods: MethodTable<TestMethod>,
    }

    impl TestService {
        fn new() -> Self {
            Self {
                methods: MethodTable::new()
                    .with_method("echo", TestMethod::Echo)
                    .with_method("fail", TestMethod::Fail)
                    .with_method("panic", TestMethod::Panic)
                    .with_method("typed", TestMethod::Typed)
                    .with_alias("say", "echo"),
            }
        }
    }

    #[derive(Deserialize)]
    struct TypedParams {
        count: u32,
        #[serde(flatten)]
        extra: Map<String, Value>,
    }

    #[async_trait]
    impl RpcHandler for TestService {
        type Method = TestMethod;

        fn methods(&self) -> &MethodTable<TestMethod> {
            &self.methods
        }

        async fn handle(&self, method: TestMethod, params: Params) -> Result<Value, RpcError> {
            match method {
                TestMethod::Echo => Ok(params.as_value().cloned().unwrap_or(Value::Null)),
                TestMethod::Fail => Err(RpcError::internal("boom")),
                TestMethod::Panic => panic!("handler exploded"),
                TestMethod::Typed => {
                    let p: TypedParams = params.parse()?;
                    Ok(json!({ "count": p.count, "extra": p.extra }))
                }
            }
        }
    }

    async fn call(body: &str) -> RpcResponse {
        dispatch(&TestService::new(), body.as_bytes()).await
    }

    fn code(response: &RpcResponse) -> i64 {
        response.error.as_ref().expect("error response").code
    }

    #[tokio::test]
    async fn success_echoes_id() {
        for id in [json!(7), json!("abc"), json!(null)] {
            let body = json!({"jsonrpc": "2.0", "id": id, "method": "echo", "params": {"x": 1}});
            let response = call(&body.to_string()).await;
            assert_eq!(response.id, id);
            assert_eq!(response.result, Some(json!({"x": 1})));
            assert!(response.error.is_none());
        }
    }

    #[tokio::test]
    async fn alias_resolves_to_same_handler() {
        let response = call(r#"{"jsonrpc":"2.0","id":1,"method":"say","params":{"a":true}}"#).await;
        assert_eq!(response.result, Some(json!({"a": true})));
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error_with_null_id() {
        for body in ["{", "not json", r#"{"jsonrpc":"2.0","id":3,"method":"echo""#] {
            let response = call(body).await;
            assert_eq!(code(&response), -32700);
            assert_eq!(response.id, Value::Null);
        }
    }

    #[tokio::test]
    async fn bad_envelopes_are_invalid_requests() {
        let cases = [
            r#"[1,2]"#,
            r#"{"id":1,"method":"echo"}"#,
            r#"{"jsonrpc":"1.0","id":1,"method":"echo"}"#,
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":12}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":"text"}"#,
            r#"{"jsonrpc":"2.0","id":{"a":1},"method":"echo"}"#,
        ];
        for body in cases {
            assert_eq!(code(&call(body).await), -32600, "{body}");
        }
        let response = call(r#"{"jsonrpc":"1.0","id":9,"method":"echo"}"#).await;
        assert_eq!(response.id, json!(9));
    }

    #[tokio::test]
    async fn unknown_method() {
        let response = call(r#"{"jsonrpc":"2.0","id":"q","method":"nope"}"#).await;
        assert_eq!(code(&response), -32601);
        assert_eq!(response.id, json!("q"));
    }

    #[tokio::test]
    async fn invalid_params_carry_data() {
        for params in [json!({}), json!({"count": "three"}), json!([1, 2])] {
            let body = json!({"jsonrpc": "2.0", "id": 1, "method": "typed", "params": params});
            let response = call(&body.to_string()).await;
            assert_eq!(code(&response), -32602);
            assert!(response.error.unwrap().data.is_some());
        }
    }

    #[tokio::test]
    async fn extra_params_are_preserved() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"typed","params":{"count":2,"color":"red"}}"#;
        let response = call(body).await;
        assert_eq!(
            response.result,
            Some(json!({"count": 2, "extra": {"color": "red"}}))
        );
    }

    #[tokio::test]
    async fn failures_and_panics_become_internal_errors() {
        let response = call(r#"{"jsonrpc":"2.0","id":1,"method":"fail"}"#).await;
        assert_eq!(code(&response), -32603);
        let response = call(r#"{"jsonrpc":"2.0","id":2,"method":"panic"}"#).await;
        assert_eq!(code(&response), -32603);
        assert_eq!(response.id, json!(2));
    }

    #[test]
    fn response_round_trips_through_into_result() {
        let ok = RpcResponse::success(json!(1), json!({"ok": true}));
        let text = serde_json::to_string(&ok).unwrap();
        assert!(!text.contains("error"));
        let back: RpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back.into_result(), Ok(json!({"ok": true})));

        let err = RpcResponse::error(Value::Null, RpcError::method_not_found("x"));
        let back: RpcResponse = serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(back.into_result().unwrap_err().kind(), Some(ErrorCode::MethodNotFound));
    }
}
