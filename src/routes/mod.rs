//! Service-facing surface: route registry, content negotiation and export
//!
//! The hosting framework stays outside this crate. It builds a
//! `RouteRegistry` once at startup, asks `negotiate` which representation a
//! request wants, and hands the handler's response body to an `Exporter`.

pub mod export;
pub mod negotiate;
pub mod registry;

use anyhow::bail;
use std::fmt;
use std::str::FromStr;

pub use export::{Exporter, PreparedExport, ResponseHead};
pub use negotiate::{negotiate, CsvMediaType, Negotiation, OutputFormat, CONTENT_DISPOSITION};
pub use registry::{RouteDeclaration, RouteEntry, RouteRegistry, RouteRegistryBuilder, TABULAR_EXTENSION};

/// HTTP method of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            other => bail!("unsupported method `{}`", other),
        };
        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// Registry key: route path template plus method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RouteKey {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// What schema resolvers get to see of the request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub route: RouteKey,
    pub query: Option<String>,
}

impl RequestContext {
    pub fn new(route: RouteKey) -> Self {
        RequestContext { route, query: None }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Value of a `key=value` query parameter, undecoded
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}
