//! Request and response values.

use crate::connection::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Replace.
    Put,
    /// Partial update.
    Patch,
    /// Remove.
    Delete,
    /// Existence check.
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        };
        f.write_str(s)
    }
}

/// A request to a database endpoint.
///
/// Built by endpoint-specific APIs; the router never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Target database.
    pub database: String,
    /// Path relative to the database, e.g. `/_api/cursor`.
    pub path: String,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// Optional JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// Creates a request without query or body.
    #[must_use]
    pub fn new(method: Method, database: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            database: database.into(),
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(database: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Get, database, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(database: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Post, database, path)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(database: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Put, database, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(database: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Delete, database, path)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /_db/{}{}", self.method, self.database, self.path)
    }
}

/// A response from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response status.
    pub status: u16,
    /// The connection that carried the request.
    pub connection: ConnectionId,
    /// JSON body, `Null` when empty.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Response {
    /// Creates a response with an empty body.
    #[must_use]
    pub const fn new(status: u16, connection: ConnectionId) -> Self {
        Self {
            status,
            connection,
            body: serde_json::Value::Null,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_builder() {
        let request = Request::post("_system", "/_api/cursor")
            .with_query("batchSize", "2")
            .with_body(serde_json::json!({"query": "FOR d IN c RETURN d"}));

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.query.get("batchSize").map(String::as_str), Some("2"));
        assert_eq!(request.to_string(), "POST /_db/_system/_api/cursor");
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Request::get("db", "/_api/version")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"method": "GET", "database": "db", "path": "/_api/version"})
        );
    }

    #[test]
    fn test_response_status() {
        let ok = Response::new(201, ConnectionId::new(0));
        let missing = Response::new(404, ConnectionId::new(0));
        assert!(ok.is_success());
        assert!(!missing.is_success());
        assert_eq!(ok.body, serde_json::Value::Null);
    }
}
