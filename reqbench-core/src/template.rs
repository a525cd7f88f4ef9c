use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("reqbench/", env!("CARGO_PKG_VERSION"));

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    #[default]
    Get,
    Delete,
    Options,
    Head,
    Post,
    Put,
}

impl Method {
    /// POST and PUT carry request data in the body; the rest encode it into the query string.
    #[must_use]
    pub fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    #[must_use]
    pub fn as_http(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Delete => http::Method::DELETE,
            Self::Options => http::Method::OPTIONS,
            Self::Head => http::Method::HEAD,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn header_value(&self) -> String {
        let encoded = BASE64.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

/// A fully resolved request target: final URL (query included) and body bytes.
#[derive(Debug, Clone)]
pub struct RequestVariant {
    url: String,
    uri: http::Uri,
    body: Bytes,
}

impl RequestVariant {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn uri(&self) -> &http::Uri {
        &self.uri
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Immutable description of what every worker sends.
///
/// Shared read-only across workers. When built from data rows the template holds one
/// variant per row and request `k` uses variant `k mod rows`.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    content_is_json: bool,
    basic_auth: Option<BasicAuth>,
    wire_headers: HeaderMap,
    variants: Arc<[RequestVariant]>,
}

impl RequestTemplate {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestTemplateBuilder {
        RequestTemplateBuilder::new(method, url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The base URL as given, before any request data was encoded into it.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers in the order they are sent, including the defaults added at build time.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn content_is_json(&self) -> bool {
        self.content_is_json
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    pub fn wire_headers(&self) -> &HeaderMap {
        &self.wire_headers
    }

    pub fn variants(&self) -> &[RequestVariant] {
        &self.variants
    }

    pub fn variant(&self, index: u64) -> &RequestVariant {
        // `variants` is never empty; see `RequestTemplateBuilder::build`.
        let idx = (index % self.variants.len() as u64) as usize;
        &self.variants[idx]
    }
}

#[derive(Debug, Clone)]
pub struct RequestTemplateBuilder {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    basic_auth: Option<BasicAuth>,
    json: bool,
    data: Vec<(String, String)>,
    rows: Option<Vec<Vec<(String, String)>>>,
    body: Option<Bytes>,
}

impl RequestTemplateBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            basic_auth: None,
            json: false,
            data: Vec::new(),
            rows: None,
            body: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn basic_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.basic_auth = auth;
        self
    }

    #[must_use]
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn data(mut self, data: Vec<(String, String)>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn data_rows(mut self, rows: Vec<Vec<(String, String)>>) -> Self {
        self.rows = Some(rows);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<RequestTemplate> {
        let parsed = Url::parse(&self.url).map_err(|_| Error::InvalidUrl(self.url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(self.url));
        }
        if parsed.host_str().is_none() {
            return Err(Error::InvalidUrl(self.url));
        }

        let data_sources = usize::from(!self.data.is_empty())
            + usize::from(self.rows.is_some())
            + usize::from(self.body.is_some());
        if data_sources > 1 {
            return Err(Error::ConflictingData);
        }

        let rows: Vec<Vec<(String, String)>> = match self.rows {
            Some(rows) if rows.is_empty() => return Err(Error::EmptyDataRows),
            Some(rows) => rows,
            None => vec![self.data],
        };

        let mut encoded_data = false;
        let mut variants = Vec::with_capacity(rows.len());
        for row in &rows {
            let (url, body) = if row.is_empty() {
                (
                    parsed.to_string(),
                    self.body.clone().unwrap_or_else(Bytes::new),
                )
            } else if self.method.sends_body() {
                encoded_data = true;
                (parsed.to_string(), encode_body(row, self.json)?)
            } else {
                let mut u = parsed.clone();
                u.query_pairs_mut().extend_pairs(row);
                (u.to_string(), Bytes::new())
            };

            let uri: http::Uri = url.parse().map_err(|_| Error::InvalidUrl(url.clone()))?;
            variants.push(RequestVariant { url, uri, body });
        }

        let has_body = variants.iter().any(|v| !v.body.is_empty());
        let content_type = match (has_body, self.json, encoded_data) {
            (true, true, _) => Some(CONTENT_TYPE_JSON),
            (true, false, true) => Some(CONTENT_TYPE_FORM),
            _ => None,
        };

        let has_user_header =
            |name: &str| self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name));

        let mut headers: Vec<(String, String)> = Vec::with_capacity(self.headers.len() + 3);
        if !has_user_header(USER_AGENT.as_str()) {
            headers.push(("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()));
        }
        headers.extend(self.headers.iter().cloned());
        if let Some(ct) = content_type
            && !has_user_header(CONTENT_TYPE.as_str())
        {
            headers.push(("Content-Type".to_string(), ct.to_string()));
        }
        if let Some(auth) = &self.basic_auth
            && !has_user_header(AUTHORIZATION.as_str())
        {
            headers.push(("Authorization".to_string(), auth.header_value()));
        }

        let mut wire_headers = HeaderMap::with_capacity(headers.len());
        for (k, v) in &headers {
            let name = HeaderName::from_bytes(k.as_bytes())?;
            let value = HeaderValue::from_str(v)?;
            wire_headers.append(name, value);
        }

        Ok(RequestTemplate {
            method: self.method,
            url: self.url,
            headers,
            body: self.body,
            content_is_json: self.json,
            basic_auth: self.basic_auth,
            wire_headers,
            variants: Arc::from(variants.into_boxed_slice()),
        })
    }
}

fn encode_body(row: &[(String, String)], json: bool) -> Result<Bytes> {
    if json {
        let mut map = serde_json::Map::with_capacity(row.len());
        for (k, v) in row {
            map.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        return Ok(Bytes::from(serde_json::to_vec(&map)?));
    }

    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(row)
        .finish();
    Ok(Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Put".parse::<Method>().unwrap(), Method::Put);
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert!("PATCH".parse::<Method>().is_err());
    }

    #[test]
    fn url_methods_encode_data_into_query() {
        let t = RequestTemplate::builder(Method::Get, "http://localhost:8080/search?x=1")
            .data(pairs(&[("q", "a b"), ("page", "2")]))
            .build()
            .unwrap();

        assert_eq!(t.variants().len(), 1);
        assert_eq!(
            t.variant(0).url(),
            "http://localhost:8080/search?x=1&q=a+b&page=2"
        );
        assert!(t.variant(0).body().is_empty());
        assert_eq!(t.header("content-type"), None);
        assert_eq!(t.url(), "http://localhost:8080/search?x=1");
    }

    #[test]
    fn data_methods_encode_form_or_json_body() {
        let form = RequestTemplate::builder(Method::Post, "http://localhost/echo")
            .data(pairs(&[("name", "bob"), ("age", "7")]))
            .build()
            .unwrap();
        assert_eq!(form.variant(0).body().as_ref(), b"name=bob&age=7");
        assert_eq!(form.header("Content-Type"), Some(CONTENT_TYPE_FORM));

        let json = RequestTemplate::builder(Method::Put, "http://localhost/echo")
            .data(pairs(&[("name", "bob")]))
            .json(true)
            .build()
            .unwrap();
        assert_eq!(json.variant(0).body().as_ref(), br#"{"name":"bob"}"#);
        assert_eq!(json.header("content-type"), Some(CONTENT_TYPE_JSON));
        assert!(json.content_is_json());
    }

    #[test]
    fn default_user_agent_is_overridable_case_insensitively() {
        let t = RequestTemplate::builder(Method::Get, "http://localhost/")
            .build()
            .unwrap();
        assert_eq!(t.header("user-agent"), Some(DEFAULT_USER_AGENT));

        let t = RequestTemplate::builder(Method::Get, "http://localhost/")
            .header("user-AGENT", "custom")
            .header("X-Trace", "1")
            .build()
            .unwrap();
        assert_eq!(t.header("User-Agent"), Some("custom"));
        assert!(t.headers().iter().any(|(k, _)| k == "X-Trace"));
        assert_eq!(t.wire_headers().get_all(USER_AGENT).iter().count(), 1);
    }

    #[test]
    fn basic_auth_renders_authorization_header() {
        let t = RequestTemplate::builder(Method::Get, "http://localhost/")
            .basic_auth(Some(BasicAuth::new("user", "pass")))
            .build()
            .unwrap();
        assert_eq!(t.header("authorization"), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(t.basic_auth().map(|a| a.username.as_str()), Some("user"));
    }

    #[test]
    fn data_rows_rotate_by_issue_index() {
        let t = RequestTemplate::builder(Method::Post, "http://localhost/echo")
            .data_rows(vec![pairs(&[("id", "1")]), pairs(&[("id", "2")])])
            .build()
            .unwrap();

        assert_eq!(t.variant(0).body().as_ref(), b"id=1");
        assert_eq!(t.variant(1).body().as_ref(), b"id=2");
        assert_eq!(t.variant(2).body().as_ref(), b"id=1");
        assert_eq!(t.variant(u64::MAX).body().as_ref(), b"id=2");
    }

    #[test]
    fn raw_body_is_sent_as_is() {
        let t = RequestTemplate::builder(Method::Post, "http://localhost/echo")
            .body("ping")
            .build()
            .unwrap();
        assert_eq!(t.variant(0).body().as_ref(), b"ping");
        assert_eq!(t.body().map(|b| b.as_ref()), Some(&b"ping"[..]));
        assert_eq!(t.header("content-type"), None);
    }

    #[test]
    fn build_rejects_malformed_templates() {
        let err = RequestTemplate::builder(Method::Get, "not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = RequestTemplate::builder(Method::Get, "ftp://localhost/")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(_)));

        let err = RequestTemplate::builder(Method::Get, "http://localhost/")
            .header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::HeaderName(_)));

        let err = RequestTemplate::builder(Method::Get, "http://localhost/")
            .header("x-ok", "bad\nvalue")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::HeaderValue(_)));

        let err = RequestTemplate::builder(Method::Post, "http://localhost/")
            .data_rows(Vec::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataRows));

        let err = RequestTemplate::builder(Method::Post, "http://localhost/")
            .data(pairs(&[("a", "1")]))
            .body("raw")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingData));
        assert!(err.is_config_error());
    }
}
