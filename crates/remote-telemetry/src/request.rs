// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::header::HeaderMap;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

const TRACE_ID_LEN: usize = 32;
const SPAN_ID_LEN: usize = 16;

/// Trace identifiers resolved by the tracing layer for the current request.
///
/// Both ids are opaque to this crate; they are copied onto records as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: Option<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            span_id,
        }
    }

    /// Parses a W3C `traceparent` value: `version-traceid-parentid-flags`.
    /// Returns `None` for malformed values and all-zero ids.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        // version ff is forbidden; version 00 allows exactly four fields
        if !is_lower_hex(version, 2) || version == "ff" || !is_lower_hex(flags, 2) {
            return None;
        }
        if version == "00" && parts.next().is_some() {
            return None;
        }
        if !is_lower_hex(trace_id, TRACE_ID_LEN) || is_all_zero(trace_id) {
            return None;
        }
        if !is_lower_hex(span_id, SPAN_ID_LEN) || is_all_zero(span_id) {
            return None;
        }

        Some(Self {
            trace_id: Some(trace_id.to_string()),
            span_id: Some(span_id.to_string()),
        })
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::from_traceparent)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.span_id.is_none()
    }
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_all_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

/// Request metadata handed over by the routing layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub remote_addr: String,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
}

impl RequestMeta {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            remote_addr: remote_addr.into(),
            forwarded_for: None,
            real_ip: None,
        }
    }

    /// Captures the proxy headers used to resolve the client address.
    #[must_use]
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.forwarded_for = header_str(headers, FORWARDED_FOR_HEADER);
        self.real_ip = header_str(headers, REAL_IP_HEADER);
        self
    }

    /// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then
    /// the socket peer address.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        forwarded
            .or_else(|| self.real_ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty()))
            .or_else(|| Some(self.remote_addr.as_str()).filter(|addr| !addr.is_empty()))
            .map(str::to_string)
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_parse_valid_traceparent() {
        let ctx = TraceContext::from_traceparent(VALID).expect("should parse");
        assert_eq!(
            ctx.trace_id.as_deref(),
            Some("4bf92f3577b34da6a3ce929d0e0e4736")
        );
        assert_eq!(ctx.span_id.as_deref(), Some("00f067aa0ba902b7"));
    }

    #[test]
    fn test_reject_malformed_traceparent() {
        let cases = [
            "",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
            "00-4bf92f3577b34da6a3ce929d0e0e47-00f067aa0ba902b7-01",
        ];
        for case in cases {
            assert!(
                TraceContext::from_traceparent(case).is_none(),
                "'{case}' should be rejected"
            );
        }
    }

    #[test]
    fn test_future_version_may_carry_extra_fields() {
        let value = "01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-whatever";
        assert!(TraceContext::from_traceparent(value).is_some());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(TraceContext::from_headers(&headers).is_empty());

        headers.insert(TRACEPARENT_HEADER, HeaderValue::from_static(VALID));
        let ctx = TraceContext::from_headers(&headers);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP_HEADER, HeaderValue::from_static("192.168.1.20"));
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        let meta = RequestMeta::new("GET", "/", "10.0.0.2:5555").with_headers(&headers);
        assert_eq!(meta.client_ip().as_deref(), Some("203.0.113.7"));

        headers.remove(FORWARDED_FOR_HEADER);
        let meta = RequestMeta::new("GET", "/", "10.0.0.2:5555").with_headers(&headers);
        assert_eq!(meta.client_ip().as_deref(), Some("192.168.1.20"));

        let meta = RequestMeta::new("GET", "/", "10.0.0.2:5555");
        assert_eq!(meta.client_ip().as_deref(), Some("10.0.0.2:5555"));

        let meta = RequestMeta::new("GET", "/", "");
        assert_eq!(meta.client_ip(), None);
    }
}
