//! Uniform response shape shared by every tool and resource.

use rmcp::{
	ErrorData,
	model::{CallToolResult, JsonObject},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use toolz_service::Error;

pub fn kind(err: &Error) -> &'static str {
	match err {
		Error::Validation { .. } => "validation_error",
		Error::NotFound { .. } => "not_found",
		Error::Conflict { .. } => "conflict",
		Error::StoreUnavailable { .. } => "store_unavailable",
		Error::Provider { .. } => "provider_error",
	}
}

pub fn success<T>(data: T) -> Result<Value, ErrorData>
where
	T: Serialize,
{
	let data = serde_json::to_value(data).map_err(|err| {
		ErrorData::internal_error(format!("Failed to encode response: {err}."), None)
	})?;

	Ok(serde_json::json!({ "ok": true, "data": data }))
}

pub fn failure(err: &Error) -> Value {
	serde_json::json!({ "ok": false, "kind": kind(err), "message": err.message() })
}

/// Wraps a service outcome. Service failures are tool-level errors carrying the envelope.
pub fn respond<T>(result: toolz_service::Result<T>) -> Result<CallToolResult, ErrorData>
where
	T: Serialize,
{
	match result {
		Ok(data) => Ok(CallToolResult::structured(success(data)?)),
		Err(err) => Ok(CallToolResult::structured_error(failure(&err))),
	}
}

/// Same as [`respond`], rendered as JSON text for resource reads.
pub fn render<T>(result: toolz_service::Result<T>) -> Result<String, ErrorData>
where
	T: Serialize,
{
	let envelope = match result {
		Ok(data) => success(data)?,
		Err(err) => failure(&err),
	};

	serde_json::to_string_pretty(&envelope).map_err(|err| {
		ErrorData::internal_error(format!("Failed to encode response: {err}."), None)
	})
}

/// Decodes tool arguments into a request type. Shape errors are validation errors.
pub fn arguments<T>(params: JsonObject) -> toolz_service::Result<T>
where
	T: DeserializeOwned,
{
	serde_json::from_value(Value::Object(params))
		.map_err(|err| Error::Validation { message: format!("Invalid arguments: {err}.") })
}
