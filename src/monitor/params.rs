use actix_web::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

/// The closed set of parameter kinds a route may require.
///
/// Each kind carries its own coercion rule, see [`ParamKind::accepts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Float,
    Boolean,
    String,
}

impl ParamKind {
    /// Returns `true` when `value` can be coerced to this kind.
    ///
    /// - `Integer`: integral JSON numbers, floats (truncated), booleans, and
    ///   strings that parse as `i64` after trimming.
    /// - `Float`: any JSON number, booleans, and strings that parse as `f64`.
    /// - `Boolean`: JSON booleans, or `"true"`, `"false"`, `"0"`, `"1"`
    ///   compared case-insensitively (numbers are compared by their text).
    /// - `String`: any non-null value; presence is the only requirement.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Integer => as_integer(value).is_some(),
            ParamKind::Float => match value {
                Value::Number(_) | Value::Bool(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            },
            ParamKind::Boolean => {
                let text = match value {
                    Value::Bool(_) => return true,
                    Value::String(s) => s.to_lowercase(),
                    Value::Number(n) => n.to_string(),
                    _ => return false,
                };
                matches!(text.as_str(), "true" | "false" | "0" | "1")
            }
            ParamKind::String => true,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Integer => "an integer",
            ParamKind::Float => "a number",
            ParamKind::Boolean => "a boolean",
            ParamKind::String => "a string",
        }
    }
}

/// Rejections raised before a monitored handler runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required parameter: {0}")]
    Missing(String),

    #[error("parameter cannot be null: {0}")]
    Null(String),

    #[error("parameter {name} must be {expected}")]
    WrongType { name: String, expected: &'static str },

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Required parameters per HTTP method.
///
/// Methods are keyed by their canonical upper-case name so the schema
/// serializes cleanly into route reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ParamSchema(BTreeMap<String, BTreeMap<String, ParamKind>>);

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, method: Method, name: impl Into<String>, kind: ParamKind) -> Self {
        self.0
            .entry(method.as_str().to_owned())
            .or_default()
            .insert(name.into(), kind);
        self
    }

    /// Parameters declared for `method`, if any.
    pub fn for_method(&self, method: &Method) -> Option<&BTreeMap<String, ParamKind>> {
        self.0.get(method.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Checks every declared parameter against the extracted request values.
///
/// Parameters are checked in name order and the first problem wins.
pub fn validate(
    declared: &BTreeMap<String, ParamKind>,
    params: &Map<String, Value>,
) -> Result<(), ValidationError> {
    for (name, kind) in declared {
        let value = params
            .get(name)
            .ok_or_else(|| ValidationError::Missing(name.clone()))?;

        if value.is_null() {
            return Err(ValidationError::Null(name.clone()));
        }

        if !kind.accepts(value) {
            return Err(ValidationError::WrongType {
                name: name.clone(),
                expected: kind.expected(),
            });
        }
    }
    Ok(())
}

/// Where the parameters of a request are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Json,
    Form,
    Query,
}

impl ParamSource {
    /// JSON bodies win, then form bodies for `POST`, then the query string.
    pub fn select(method: &Method, content_type: &str) -> Self {
        if is_json(content_type) {
            ParamSource::Json
        } else if method == Method::POST {
            ParamSource::Form
        } else {
            ParamSource::Query
        }
    }
}

/// Coerces a parameter the way [`ParamKind::Integer`] accepts it. Floats are
/// truncated and booleans map to `0`/`1`.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// `deserialize_with` helper so request bodies take the same integers the
/// monitor validated.
pub fn deserialize_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_integer(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

/// Reads a JSON body into a parameter map. An empty or non-object body
/// yields an empty map.
pub fn from_json(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(ValidationError::MalformedBody(e.to_string())),
    }
}

/// Reads a url-encoded form body or query string into a parameter map.
pub fn from_urlencoded(input: &str) -> Result<Map<String, Value>, ValidationError> {
    let pairs = actix_web::web::Query::<Vec<(String, String)>>::from_query(input)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    Ok(pairs
        .into_inner()
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    fn id_schema(kind: ParamKind) -> BTreeMap<String, ParamKind> {
        BTreeMap::from([("id".to_string(), kind)])
    }

    #[test]
    fn test_missing_parameter() {
        let result = validate(&id_schema(ParamKind::Integer), &params(json!({})));
        assert_eq!(result, Err(ValidationError::Missing("id".to_string())));
        assert_eq!(
            result.unwrap_err().to_string(),
            "missing required parameter: id"
        );
    }

    #[test]
    fn test_null_parameter() {
        let result = validate(&id_schema(ParamKind::String), &params(json!({"id": null})));
        assert_eq!(
            result.unwrap_err().to_string(),
            "parameter cannot be null: id"
        );
    }

    #[test]
    fn test_integer_coercion() {
        let schema = id_schema(ParamKind::Integer);
        assert!(validate(&schema, &params(json!({"id": 42}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": "42"}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": " -7 "}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": true}))).is_ok());

        let err = validate(&schema, &params(json!({"id": "abc"}))).unwrap_err();
        assert_eq!(err.to_string(), "parameter id must be an integer");
        assert!(validate(&schema, &params(json!({"id": "4.5"}))).is_err());
        assert!(validate(&schema, &params(json!({"id": [1]}))).is_err());
    }

    #[test]
    fn test_as_integer_matches_validation() {
        assert_eq!(as_integer(&json!("3")), Some(3));
        assert_eq!(as_integer(&json!(4.9)), Some(4));
        assert_eq!(as_integer(&json!(false)), Some(0));
        assert_eq!(as_integer(&json!("4.5")), None);
        assert_eq!(as_integer(&json!(null)), None);
    }

    #[test]
    fn test_float_coercion() {
        let schema = id_schema(ParamKind::Float);
        assert!(validate(&schema, &params(json!({"id": 1.5}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": "2.25"}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": 3}))).is_ok());

        let err = validate(&schema, &params(json!({"id": "two"}))).unwrap_err();
        assert_eq!(err.to_string(), "parameter id must be a number");
    }

    #[test]
    fn test_boolean_coercion() {
        let schema = id_schema(ParamKind::Boolean);
        for accepted in [json!(true), json!("TRUE"), json!("false"), json!("0"), json!("1"), json!(1)] {
            assert!(
                validate(&schema, &params(json!({ "id": accepted.clone() }))).is_ok(),
                "{accepted} should be accepted"
            );
        }

        for rejected in [json!("yes"), json!(2), json!({})] {
            let err = validate(&schema, &params(json!({ "id": rejected }))).unwrap_err();
            assert_eq!(err.to_string(), "parameter id must be a boolean");
        }
    }

    #[test]
    fn test_string_only_requires_presence() {
        let schema = id_schema(ParamKind::String);
        assert!(validate(&schema, &params(json!({"id": 12}))).is_ok());
        assert!(validate(&schema, &params(json!({"id": ""}))).is_ok());
    }

    #[test]
    fn test_schema_by_method() {
        let schema = ParamSchema::new()
            .require(Method::POST, "client_id", ParamKind::Integer)
            .require(Method::POST, "account_id", ParamKind::Integer);

        let post = schema.for_method(&Method::POST).unwrap();
        assert_eq!(post.len(), 2);
        assert!(schema.for_method(&Method::GET).is_none());

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["POST"]["client_id"], "integer");
    }

    #[test]
    fn test_source_priority() {
        assert_eq!(
            ParamSource::select(&Method::GET, "application/json"),
            ParamSource::Json
        );
        assert_eq!(
            ParamSource::select(&Method::POST, "application/x-www-form-urlencoded"),
            ParamSource::Form
        );
        assert_eq!(ParamSource::select(&Method::POST, ""), ParamSource::Form);
        assert_eq!(ParamSource::select(&Method::GET, ""), ParamSource::Query);
        assert_eq!(
            ParamSource::select(&Method::PUT, "application/vnd.api+json"),
            ParamSource::Json
        );
    }

    #[test]
    fn test_json_extraction() {
        assert!(from_json(b"").unwrap().is_empty());
        assert!(from_json(b"[1, 2]").unwrap().is_empty());
        assert_eq!(from_json(br#"{"id": 3}"#).unwrap()["id"], json!(3));
        assert!(matches!(
            from_json(b"{\"id\":"),
            Err(ValidationError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_urlencoded_extraction() {
        let map = from_urlencoded("account_id=5&status=active%20now").unwrap();
        assert_eq!(map["account_id"], json!("5"));
        assert_eq!(map["status"], json!("active now"));
        assert!(from_urlencoded("").unwrap().is_empty());
    }
}
