use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(super) const SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub(super) struct Request<'a> {
    pub(super) command: &'a [Value],
    pub(super) request_id: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Reply {
    #[serde(default)]
    pub(super) request_id: Option<u64>,
    #[serde(default)]
    pub(super) error: Option<String>,
    #[serde(default)]
    pub(super) data: Option<Value>,
    #[serde(default)]
    pub(super) event: Option<String>,
}

impl Reply {
    pub(super) fn answers(&self, request_id: u64) -> bool {
        self.event.is_none() && self.request_id == Some(request_id)
    }

    pub(super) fn is_success(&self) -> bool {
        self.error.as_deref() == Some(SUCCESS)
    }
}

pub(super) fn encode_request(command: &[Value], request_id: u64) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(&Request {
        command,
        request_id,
    })?;
    line.push('\n');
    Ok(line)
}

pub(super) fn parse_reply(line: &str) -> serde_json::Result<Reply> {
    serde_json::from_str(line.trim())
}

/// Converts a `time-pos` value into whole seconds; mpv reports fractional and
/// occasionally slightly negative positions.
pub(super) fn seconds_from_value(value: &Value) -> Option<u64> {
    let secs = value.as_f64()?;
    if !secs.is_finite() {
        return None;
    }
    Some(secs.max(0.0).trunc() as u64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parsed(line: &str) -> Reply {
        parse_reply(line).unwrap()
    }

    #[test]
    fn request_is_one_json_line_with_id() {
        let command = [json!("loadfile"), json!("http://x/a.m3u"), json!("replace")];
        let line = encode_request(&command, 7).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value["command"],
            json!(["loadfile", "http://x/a.m3u", "replace"])
        );
        assert_eq!(value["request_id"], json!(7));
    }

    #[test]
    fn reply_matches_only_its_own_request() {
        let reply = parsed(r#"{"data":12.5,"error":"success","request_id":3}"#);
        assert!(reply.answers(3));
        assert!(!reply.answers(4));
        assert!(reply.is_success());
    }

    #[test]
    fn events_never_answer_requests() {
        let reply = parsed(r#"{"event":"file-loaded","request_id":0}"#);
        assert!(!reply.answers(0));
    }

    #[test]
    fn error_reply_is_not_success() {
        let reply = parsed(r#"{"error":"property unavailable","request_id":2}"#);
        assert!(reply.answers(2));
        assert!(!reply.is_success());
        assert!(reply.data.is_none());
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_reply("not json").is_err());
    }

    #[test]
    fn seconds_truncate_and_clamp() {
        assert_eq!(seconds_from_value(&json!(42.9)), Some(42));
        assert_eq!(seconds_from_value(&json!(-0.03)), Some(0));
        assert_eq!(seconds_from_value(&json!(17)), Some(17));
        assert_eq!(seconds_from_value(&json!(null)), None);
        assert_eq!(seconds_from_value(&json!("12")), None);
    }
}
