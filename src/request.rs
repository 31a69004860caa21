//! Immutable request descriptors.
//!
//! A descriptor is never changed after construction. Every `with_*` method borrows the
//! receiver and returns a new descriptor, so one template can be shared by any number
//! of tests and tasks while each derives its own requests from it. Headers and body
//! are reference counted and copied on first write.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::{AccessToken, Authorization};
use crate::error::{HarnessError, Result};

const RELATIVE_BASE: &str = "http://relative.invalid/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            other => Err(HarnessError::InvalidRequest(format!(
                "unsupported method {other}"
            ))),
        }
    }
}

/// Wire format of bodies and the format requested through `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    #[default]
    Json,
    Text,
}

impl SerializationFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "application/json",
            SerializationFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    pub fn format(&self) -> SerializationFormat {
        match self {
            Body::Json(_) => SerializationFormat::Json,
            Body::Text(_) => SerializationFormat::Text,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Body::Json(value) => Ok(serde_json::to_vec(value)?),
            Body::Text(text) => Ok(text.clone().into_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    target: String,
    body: Option<Arc<Body>>,
    headers: Arc<BTreeMap<String, String>>,
    authorization: Option<Authorization>,
    format: SerializationFormat,
}

impl RequestDescriptor {
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            body: None,
            headers: Arc::new(BTreeMap::new()),
            authorization: None,
            format: SerializationFormat::default(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::Post, target)
    }

    /// `POST` with a typed payload serialized as the JSON body.
    pub fn post_json<T: Serialize + ?Sized>(target: &str, payload: &T) -> Result<Self> {
        Self::post(target).with_json(payload)
    }

    pub fn put(target: &str) -> Self {
        Self::new(Method::Put, target)
    }

    pub fn patch(target: &str) -> Self {
        Self::new(Method::Patch, target)
    }

    pub fn delete(target: &str) -> Self {
        Self::new(Method::Delete, target)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn with_method(&self, method: Method) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    /// Same request sent somewhere else.
    pub fn to(&self, target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..self.clone()
        }
    }

    /// Append path segments, keeping any query string at the end.
    ///
    /// `segment` is split on `/` and every part is percent-encoded, so reserved
    /// characters such as `?` or `#` stay inside the path.
    pub fn with_segment(&self, segment: &str) -> Self {
        self.edit_target(|url| {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .extend(segment.split('/').filter(|part| !part.is_empty()));
            }
        })
    }

    /// Append one form-encoded query pair.
    pub fn with_query(&self, key: &str, value: &str) -> Self {
        self.edit_target(|url| {
            url.query_pairs_mut().append_pair(key, value);
        })
    }

    /// Rewrite the target through a parsed [`Url`]. Relative targets are resolved
    /// against a placeholder origin that is stripped again afterwards.
    fn edit_target(&self, edit: impl FnOnce(&mut Url)) -> Self {
        let parsed = match Url::parse(&self.target) {
            Ok(url) => Ok((url, false)),
            Err(_) => Url::parse(RELATIVE_BASE)
                .and_then(|base| base.join(&self.target))
                .map(|url| (url, true)),
        };
        let (mut url, relative) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Cannot compose target {}: {e}", self.target);
                return self.clone();
            }
        };

        edit(&mut url);

        if !relative {
            return self.to(url.as_str());
        }
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            target.push('#');
            target.push_str(fragment);
        }
        self.to(&target)
    }

    pub fn with_header(&self, name: &str, value: &str) -> Self {
        let mut headers = Arc::clone(&self.headers);
        Arc::make_mut(&mut headers).insert(name.to_ascii_lowercase(), value.to_string());
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn without_header(&self, name: &str) -> Self {
        let key = name.to_ascii_lowercase();
        if !self.headers.contains_key(&key) {
            return self.clone();
        }
        let mut headers = Arc::clone(&self.headers);
        Arc::make_mut(&mut headers).remove(&key);
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn with_authorization(&self, authorization: Authorization) -> Self {
        Self {
            authorization: Some(authorization),
            ..self.clone()
        }
    }

    pub fn with_bearer(&self, token: impl Into<AccessToken>) -> Self {
        self.with_authorization(Authorization::bearer(token))
    }

    pub fn without_authorization(&self) -> Self {
        Self {
            authorization: None,
            ..self.clone()
        }
    }

    pub fn with_body(&self, body: Body) -> Self {
        Self {
            format: body.format(),
            body: Some(Arc::new(body)),
            ..self.clone()
        }
    }

    /// Serialize any payload as the JSON body.
    pub fn with_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Self> {
        Ok(self.with_body(Body::Json(serde_json::to_value(payload)?)))
    }

    pub fn with_text(&self, text: &str) -> Self {
        self.with_body(Body::Text(text.to_string()))
    }

    /// Override one top-level field of a JSON object body.
    ///
    /// A request without a body starts from an empty object.
    pub fn with_body_field<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        let mut body = match &self.body {
            Some(body) => Arc::clone(body),
            None => Arc::new(Body::Json(Value::Object(Map::new()))),
        };
        match Arc::make_mut(&mut body) {
            Body::Json(Value::Object(fields)) => {
                fields.insert(key.to_string(), value);
            }
            _ => {
                return Err(HarnessError::InvalidRequest(format!(
                    "cannot override field {key} of a body that is not a JSON object"
                )))
            }
        }
        Ok(Self {
            body: Some(body),
            format: SerializationFormat::Json,
            ..self.clone()
        })
    }

    pub fn with_format(&self, format: SerializationFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }
}
