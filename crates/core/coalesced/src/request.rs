use http::Method;

use crate::key::{derive_identity, RequestIdentity};

/// Outbound operation handed to a [`Transport`](crate::Transport).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Query parameters in the order they were added
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn has_queries(&self) -> bool {
        !self.query.is_empty()
    }

    /// Identity used to collapse this request with identical ones
    pub fn identity(&self) -> RequestIdentity {
        derive_identity(&self.url, &self.query)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use crate::Request;

    #[test]
    fn builds_requests() {
        let request = Request::get("/a").query("someQueryString", "someValue");

        assert_eq!(request.method, Method::GET);
        assert!(request.has_queries());
        assert_eq!(
            request.identity().to_string(),
            r#"/a[["someQueryString","someValue"]]"#
        );
    }

    #[test]
    fn body_does_not_change_identity() {
        let a = Request::put("/a").body("one");
        let b = Request::put("/a").body("two");

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, b);
    }
}
