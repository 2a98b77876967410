use std::fmt;

use serde_json::Value;

/// Canonical identity of a collapsible request.
///
/// Two requests share an underlying call iff their identities are equal.
/// The query part is `None` when the request carries no parameters, so
/// `/x` and `/x?q=v` never compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RequestIdentity {
    target: String,
    query: Option<String>,
}

impl RequestIdentity {
    /// Addressable target (url) of the request
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Encoded query parameters, if any
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{}{}", self.target, query),
            None => f.write_str(&self.target),
        }
    }
}

/// Derive the identity of a request from its target and query parameters.
///
/// Parameters are stably sorted by key so the identity does not depend on the
/// order distinct keys were added in; values of a repeated key keep their order.
pub fn derive_identity(target: &str, query: &[(String, String)]) -> RequestIdentity {
    if query.is_empty() {
        return RequestIdentity {
            target: target.to_string(),
            query: None,
        };
    }

    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let encoded = Value::Array(
        pairs
            .into_iter()
            .map(|(key, value)| {
                Value::Array(vec![Value::from(key.as_str()), Value::from(value.as_str())])
            })
            .collect(),
    );

    RequestIdentity {
        target: target.to_string(),
        query: Some(encoded.to_string()),
    }
}
