//! `GET /putfile` request handling.
//!
//! The query string is the whole request: a URL-encoded JSON object, e.g.
//! `/putfile?{"ftpaddr":"10.0.0.5:21","ftpuser":"u",...}`. The response is
//! always HTTP 200 with a pretty-printed [`TransferResult`]; failures are
//! signalled by `flag: -1` and an `error` message.

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use putfile::{TransferClient, TransferService};
use putfile_protocol::{TransferRequest, TransferResult};
use tracing::{debug, warn};

pub fn router<C: TransferClient>(service: TransferService<C>) -> Router {
	Router::new().route("/putfile", get(put_file::<C>)).with_state(service)
}

async fn put_file<C: TransferClient>(State(service): State<TransferService<C>>, RawQuery(query): RawQuery) -> Response {
	let result = handle(&service, query.as_deref().unwrap_or_default()).await;
	json_response(&result)
}

/// Decodes, runs and reports one request. Decode failures never reach the registry.
pub async fn handle<C: TransferClient>(service: &TransferService<C>, raw_query: &str) -> TransferResult {
	let request = match TransferRequest::decode(raw_query) {
		Ok(request) => request,
		Err(err) => {
			warn!(target = "putfile.gateway", error = %err, "rejecting malformed request");
			return TransferResult::failure(err.to_string());
		}
	};
	debug!(target = "putfile.gateway", ?request, "request decoded");

	match service.put_file(&request).await {
		Ok(_) => TransferResult::success(),
		Err(err) => TransferResult::failure(err.to_string()),
	}
}

fn json_response(result: &TransferResult) -> Response {
	match serde_json::to_string_pretty(result) {
		Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
		Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
	}
}
