use serde::Deserialize;
use serde_json::Value;

/// Status + body of the bulk HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// How the bulk submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The request never produced a response.
    Transport(String),
    Reply(HttpReply),
}

/// Destination of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Success,
    Failure(String),
    Retry,
}

/// Outcome of reconciling one submission.
#[derive(Debug)]
pub struct Reconciliation<R> {
    /// Every pending record exactly once, in submission order.
    pub outcomes: Vec<(R, Route)>,
    /// Failed records should be penalized before transfer.
    pub penalize: bool,
    /// The host should pause scheduling the processor.
    pub back_off: bool,
}

/// One entry of the response `items` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    pub status: u16,
    pub reason: Option<String>,
}

impl BulkItemResult {
    /// Items look like `{"index": {"status": 409, "error": {"reason": "..."}}}`;
    /// the first `status` and `error` found depth-first are used.
    pub fn from_item(item: &Value) -> Self {
        let status = find_path(item, "status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(0);
        let reason = find_path(item, "error").and_then(|error| match error {
            Value::String(s) => Some(s.clone()),
            other => other.get("reason").and_then(Value::as_str).map(str::to_string),
        });
        Self { status, reason }
    }

    pub fn route(&self) -> Route {
        if is_success(self.status) {
            Route::Success
        } else {
            Route::Failure(
                self.reason
                    .clone()
                    .unwrap_or_else(|| format!("bulk item failed with status {}", self.status)),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Map a submission onto the pending records.
///
/// Whole-submission failures (transport error, non-2xx, unparseable body)
/// apply uniformly to every record; a parseable 2xx body is reconciled
/// item by item.
pub fn reconcile<R>(pending: Vec<R>, submission: Submission) -> Reconciliation<R> {
    match submission {
        Submission::Transport(error) => {
            tracing::error!(error = %error, records = pending.len(), "bulk request failed, routing batch to failure");
            uniform(pending, Route::Failure(error), true, false)
        }
        Submission::Reply(reply) if is_success(reply.status) => {
            match serde_json::from_slice::<BulkResponse>(&reply.body) {
                Ok(response) => {
                    if response.errors && response.items.len() < pending.len() {
                        tracing::warn!(
                            items = response.items.len(),
                            records = pending.len(),
                            "bulk response reports errors but lists fewer items than records, \
                             treating unlisted records as successful"
                        );
                    }
                    let items: &[Value] = if response.errors { &response.items } else { &[] };
                    Reconciliation {
                        outcomes: reconcile_items(pending, items),
                        penalize: false,
                        back_off: false,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "error parsing bulk response, routing batch to failure");
                    uniform(pending, Route::Failure(format!("unparseable bulk response: {e}")), false, true)
                }
            }
        }
        Submission::Reply(reply) if reply.status / 100 == 5 => {
            tracing::warn!(
                status = reply.status,
                records = pending.len(),
                "backend server error, routing batch to retry and yielding"
            );
            uniform(pending, Route::Retry, false, true)
        }
        Submission::Reply(reply) => {
            tracing::warn!(status = reply.status, records = pending.len(), "backend rejected bulk request, routing batch to failure");
            uniform(
                pending,
                Route::Failure(format!("backend returned status {}", reply.status)),
                false,
                false,
            )
        }
    }
}

/// Pair records with response items by position. Records beyond the end
/// of `items` succeeded (the backend reports every item only on errors).
pub fn reconcile_items<R>(pending: Vec<R>, items: &[Value]) -> Vec<(R, Route)> {
    let mut results = items.iter().map(BulkItemResult::from_item);
    let outcomes: Vec<(R, Route)> = pending
        .into_iter()
        .enumerate()
        .map(|(position, record)| {
            let route = results.next().map_or(Route::Success, |item| item.route());
            if let Route::Failure(reason) = &route {
                tracing::error!(position, reason = %reason, "bulk item failed, routing to failure");
            }
            (record, route)
        })
        .collect();

    let unmatched = results.count();
    if unmatched > 0 {
        tracing::warn!(unmatched, "bulk response has more items than submitted records");
    }
    outcomes
}

fn uniform<R>(pending: Vec<R>, route: Route, penalize: bool, back_off: bool) -> Reconciliation<R> {
    Reconciliation {
        outcomes: pending.into_iter().map(|r| (r, route.clone())).collect(),
        penalize,
        back_off,
    }
}

fn find_path<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_path(v, key))),
        Value::Array(values) => values.iter().find_map(|v| find_path(v, key)),
        _ => None,
    }
}
