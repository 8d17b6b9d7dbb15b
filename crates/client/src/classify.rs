//! Response classification: may this response be written to the cache?

use reqwest::Method;

use crate::request::{ProxyRequest, ProxyResponse, ResponseType};

/// Outcome of classifying a network response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    /// Status 200, basic, GET, not from an excluded scheme.
    Cacheable,
    /// A normal response that must not be cached.
    Ineligible(IneligibleReason),
    /// A network error response.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    NotOk(u16),
    NotBasic(ResponseType),
    Method(Method),
    ExcludedScheme(String),
}

impl std::fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IneligibleReason::NotOk(status) => write!(f, "status {status}"),
            IneligibleReason::NotBasic(kind) => write!(f, "{kind} response"),
            IneligibleReason::Method(method) => write!(f, "{method} request"),
            IneligibleReason::ExcludedScheme(scheme) => write!(f, "excluded scheme {scheme}"),
        }
    }
}

/// Decide whether `response` to `request` may be cached.
///
/// Status and type are checked before method and scheme, so an opaque reply
/// to a POST reports `NotOk`.
pub fn classify(request: &ProxyRequest, response: &ProxyResponse, excluded_schemes: &[String]) -> ResponseClass {
    if response.response_type == ResponseType::Error {
        return ResponseClass::Error;
    }
    if response.status != 200 {
        return ResponseClass::Ineligible(IneligibleReason::NotOk(response.status));
    }
    if response.response_type != ResponseType::Basic {
        return ResponseClass::Ineligible(IneligibleReason::NotBasic(response.response_type));
    }
    if request.method != Method::GET {
        return ResponseClass::Ineligible(IneligibleReason::Method(request.method.clone()));
    }
    if let Some(scheme) = excluded_scheme(request, excluded_schemes) {
        return ResponseClass::Ineligible(IneligibleReason::ExcludedScheme(scheme.to_string()));
    }
    ResponseClass::Cacheable
}

/// A request belongs to an excluded scheme when its own scheme matches, or
/// when it carries an embedded `scheme://` reference (e.g. in the query).
fn excluded_scheme<'a>(request: &ProxyRequest, excluded_schemes: &'a [String]) -> Option<&'a str> {
    let url = request.url.as_str().to_ascii_lowercase();
    excluded_schemes
        .iter()
        .find(|scheme| {
            request.url.scheme().eq_ignore_ascii_case(scheme)
                || url.contains(&format!("{}://", scheme.to_ascii_lowercase()))
        })
        .map(String::as_str)
}
