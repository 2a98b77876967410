use http::Method;

/// Methods that are safe to collapse, anything else mutates and must always run
pub const COLLAPSIBLE_METHODS: [Method; 3] = [Method::GET, Method::OPTIONS, Method::HEAD];

/// Whether requests with this method may share a single underlying call
pub fn is_collapsible(method: &Method) -> bool {
    COLLAPSIBLE_METHODS.contains(method)
}
