//! JSONP transport over HTTP.
//!
//! The request carries `lot` and a freshly reserved `callback` name. The
//! response is a script body expected to invoke that callback with a single
//! JSON argument; the argument is extracted and decoded into a
//! [`LookupOutcome`].

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::registry::CallbackRegistry;
use super::{Transport, TransportError};
use crate::config::LookupConfig;
use crate::model::types::{LookupOutcome, LookupQuery, ResponseEnvelope};
use crate::url_sync::set_query_param;

/// Query parameter carrying the LOT.
pub const LOT_PARAM: &str = "lot";
/// Query parameter carrying the callback name.
pub const CALLBACK_PARAM: &str = "callback";

/// HTTP-backed JSONP client.
#[derive(Debug, Clone)]
pub struct JsonpTransport {
    client: Client,
    registry: CallbackRegistry,
    timeout: Option<Duration>,
}

impl JsonpTransport {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Load(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            registry: CallbackRegistry::new(),
            timeout,
        })
    }

    pub fn from_config(config: &LookupConfig) -> Result<Self, TransportError> {
        Self::new(&config.user_agent, config.request_timeout)
    }

    /// Callback names held by requests still in flight.
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    fn request_error(&self, err: reqwest::Error) -> TransportError {
        match self.timeout {
            Some(limit) if err.is_timeout() => TransportError::Timeout(limit),
            _ => TransportError::Load(err.to_string()),
        }
    }
}

impl Transport for JsonpTransport {
    fn fetch(
        &self,
        endpoint: &Url,
        query: &LookupQuery,
    ) -> impl Future<Output = Result<LookupOutcome, TransportError>> + Send {
        async move {
            let callback = self.registry.acquire();
            let url = build_request_url(endpoint, query.as_str(), callback.name());
            let started = Instant::now();
            debug!(lot = %query, callback = callback.name(), "issuing JSONP request");

            let mut request = self.client.get(url);
            if let Some(limit) = self.timeout {
                request = request.timeout(limit);
            }
            let response = request.send().await.map_err(|e| {
                warn!(lot = %query, error = %e, "JSONP request failed");
                self.request_error(e)
            })?;

            let status = response.status();
            if !status.is_success() {
                warn!(lot = %query, status = status.as_u16(), "JSONP endpoint returned error status");
                return Err(TransportError::HttpStatus(status.as_u16()));
            }

            let body = response.text().await.map_err(|e| self.request_error(e))?;
            let payload = extract_callback_payload(&body, callback.name())?;
            let outcome = ResponseEnvelope::decode(payload)?;

            debug!(
                lot = %query,
                callback = callback.name(),
                latency_ms = started.elapsed().as_millis() as u64,
                "JSONP callback delivered"
            );
            Ok(outcome)
        }
    }
}

/// Endpoint with `lot` set (replacing any existing value) and `callback` appended.
pub fn build_request_url(endpoint: &Url, lot: &str, callback: &str) -> Url {
    let mut url = endpoint.clone();
    set_query_param(&mut url, LOT_PARAM, Some(lot));
    url.query_pairs_mut().append_pair(CALLBACK_PARAM, callback);
    url
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Find the invocation of `callback` in a script body and parse its argument.
///
/// Accepts `cb(...)`, `window.cb(...)` and leading comments; script after the
/// closing `)` is ignored.
/// An empty argument list delivers `null`.
pub fn extract_callback_payload(body: &str, callback: &str) -> Result<Value, TransportError> {
    let mut search_from = 0;
    while let Some(offset) = body[search_from..].find(callback) {
        let start = search_from + offset;
        let end = start + callback.len();
        search_from = end;

        let standalone = body[..start].chars().next_back().is_none_or(|c| !is_ident_char(c));
        let rest = body[end..].trim_start();
        if !standalone || !rest.starts_with('(') {
            continue;
        }

        let args = rest[1..].trim_start();
        if args.starts_with(')') {
            return Ok(Value::Null);
        }

        let (value, consumed) = parse_argument(args)
            .map_err(|e| TransportError::Malformed(format!("callback argument is not JSON: {e}")))?;
        if !args[consumed..].trim_start().starts_with(')') {
            return Err(TransportError::Malformed(format!(
                "unterminated call to {callback}"
            )));
        }
        return Ok(value);
    }
    Err(TransportError::CallbackNotInvoked {
        callback: callback.to_string(),
    })
}

/// Parse exactly one JSON value at the start of `args`, returning it with the
/// number of bytes it spans. Whatever follows is left to the caller.
fn parse_argument(args: &str) -> Result<(Value, usize), serde_json::Error> {
    if args.starts_with(['{', '[', '"']) {
        let mut stream = serde_json::Deserializer::from_str(args).into_iter::<Value>();
        let value = stream.next().unwrap_or_else(|| serde_json::from_str(args))?;
        return Ok((value, stream.byte_offset()));
    }
    // Scalars never contain `)`, and the stream reader rejects `)` right after one.
    let end = args.find(')').unwrap_or(args.len());
    let scalar = args[..end].trim_end();
    serde_json::from_str(scalar).map(|value| (value, scalar.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_url_sets_lot_and_appends_callback() {
        let endpoint = Url::parse("https://script.example/exec?key=1&lot=old").unwrap();
        let url = build_request_url(&endpoint, "A 12&x", "cb_abc");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("key".into(), "1".into()),
                ("lot".into(), "A 12&x".into()),
                ("callback".into(), "cb_abc".into()),
            ]
        );
    }

    #[test]
    fn request_url_without_existing_query() {
        let endpoint = Url::parse("https://script.example/exec").unwrap();
        let url = build_request_url(&endpoint, "Z9", "cb_1");
        assert_eq!(url.as_str(), "https://script.example/exec?lot=Z9&callback=cb_1");
    }

    #[test]
    fn extracts_plain_invocation() {
        let body = r#"cb_x1({"ok":true,"count":0});"#;
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"ok": true, "count": 0}));
    }

    #[test]
    fn extracts_with_comment_prefix_and_window_receiver() {
        let body = "/**/ window.cb_x1 ( {\"ok\":false,\"notFound\":true} )\n";
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"ok": false, "notFound": true}));
    }

    #[test]
    fn ignores_names_that_only_share_a_suffix() {
        let body = r#"xcb_x1({"ok":false}); cb_x1({"ok":true})"#;
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn statements_after_the_call_are_ignored() {
        let body = "cb_x1({\"ok\":true,\"count\":0});\nconsole.log(\"done\");";
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"ok": true, "count": 0}));
    }

    #[test]
    fn trailing_comment_with_parens_is_ignored() {
        let body = r#"cb_x1({"ok":false,"notFound":true}) // exec()"#;
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"ok": false, "notFound": true}));
    }

    #[test]
    fn parens_inside_json_strings_are_not_the_end() {
        let body = r#"cb_x1({"error":"quota (daily) hit"}); f()"#;
        let value = extract_callback_payload(body, "cb_x1").unwrap();
        assert_eq!(value, json!({"error": "quota (daily) hit"}));
    }

    #[test]
    fn scalar_arguments_end_at_the_paren() {
        assert_eq!(extract_callback_payload("cb_q( null );", "cb_q").unwrap(), Value::Null);
        assert_eq!(extract_callback_payload("cb_q(true)//x()", "cb_q").unwrap(), json!(true));
    }

    #[test]
    fn second_argument_or_missing_paren_is_malformed() {
        let err = extract_callback_payload(r#"cb_x1({"ok":true}, 2)"#, "cb_x1").unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
        let err = extract_callback_payload(r#"cb_x1({"ok":true}"#, "cb_x1").unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[test]
    fn empty_argument_is_null() {
        assert_eq!(extract_callback_payload("cb_q();", "cb_q").unwrap(), Value::Null);
    }

    #[test]
    fn wrong_callback_is_not_invoked() {
        let err = extract_callback_payload(r#"cb_other({"ok":true})"#, "cb_mine").unwrap_err();
        assert!(matches!(err, TransportError::CallbackNotInvoked { ref callback } if callback == "cb_mine"));
    }

    #[test]
    fn html_error_page_is_not_invoked() {
        let err =
            extract_callback_payload("<html><body>Sign in</body></html>", "cb_mine").unwrap_err();
        assert!(matches!(err, TransportError::CallbackNotInvoked { .. }));
    }

    #[test]
    fn non_json_argument_is_malformed() {
        let err = extract_callback_payload("cb_q({ok: true})", "cb_q").unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[test]
    fn load_errors_carry_the_jsonp_prefix() {
        assert!(
            TransportError::HttpStatus(404)
                .to_string()
                .starts_with("JSONP load error")
        );
        assert!(
            TransportError::Load("dns".into())
                .to_string()
                .starts_with("JSONP load error")
        );
    }
}
