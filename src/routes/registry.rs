use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Method, RouteKey};
use crate::overlay::{DynamicOverlay, SchemaResolver};
use crate::types::SchemaNode;

/// Extension namespace under which a route declares its dynamic schemas
pub const TABULAR_EXTENSION: &str = "tabulate";

/// A route as registered with the host, before the registry is built
#[derive(Debug, Clone)]
pub struct RouteDeclaration {
    pub key: RouteKey,
    pub response_schema: Option<SchemaNode>,

    /// Resolvers declared under the `tabulate` extension
    pub dynamic_schemas: DynamicOverlay,
}

impl RouteDeclaration {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RouteDeclaration {
            key: RouteKey::new(method, path),
            response_schema: None,
            dynamic_schemas: DynamicOverlay::new(),
        }
    }

    pub fn response_schema(mut self, schema: SchemaNode) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Resolve the schema at `path` per request instead of using the declared one
    pub fn dynamic_schema<R>(mut self, path: impl Into<String>, resolver: R) -> Self
    where
        R: SchemaResolver + 'static,
    {
        self.dynamic_schemas.insert(path, Arc::new(resolver));
        self
    }
}

/// Everything the exporter needs to know about one route
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub schema: SchemaNode,
    pub overlay: DynamicOverlay,
}

/// Immutable route → schema table, built once and shared read-only
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: HashMap<RouteKey, RouteEntry>,
}

impl RouteRegistry {
    pub fn builder() -> RouteRegistryBuilder {
        RouteRegistryBuilder::default()
    }

    pub fn get(&self, key: &RouteKey) -> Option<&RouteEntry> {
        self.routes.get(key)
    }

    pub fn has_schema(&self, key: &RouteKey) -> bool {
        self.routes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects route declarations during startup
#[derive(Debug, Default)]
pub struct RouteRegistryBuilder {
    declarations: Vec<RouteDeclaration>,
}

impl RouteRegistryBuilder {
    pub fn route(mut self, declaration: RouteDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn routes<I>(mut self, declarations: I) -> Self
    where
        I: IntoIterator<Item = RouteDeclaration>,
    {
        self.declarations.extend(declarations);
        self
    }

    /// Keep every route that declares a response schema
    pub fn build(self) -> RouteRegistry {
        let declared = self.declarations.len();
        let mut routes = HashMap::new();

        for declaration in self.declarations {
            let Some(schema) = declaration.response_schema else {
                continue;
            };

            if !declaration.dynamic_schemas.is_empty() {
                debug!(
                    route = %declaration.key,
                    extension = TABULAR_EXTENSION,
                    paths = declaration.dynamic_schemas.len(),
                    "route declares dynamic schemas"
                );
            }

            let entry = RouteEntry {
                schema,
                overlay: declaration.dynamic_schemas,
            };
            if routes.insert(declaration.key.clone(), entry).is_some() {
                warn!(route = %declaration.key, "route declared twice, keeping the last schema");
            }
        }

        info!(declared, tabular = routes.len(), "built route schema registry");
        RouteRegistry { routes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::FnResolver;
    use crate::routes::RequestContext;

    #[test]
    fn test_routes_without_schema_are_skipped() {
        let registry = RouteRegistry::builder()
            .route(
                RouteDeclaration::new(Method::Get, "/user")
                    .response_schema(SchemaNode::object([("name", SchemaNode::string())])),
            )
            .route(RouteDeclaration::new(Method::Get, "/userWithoutSchema"))
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.has_schema(&RouteKey::new(Method::Get, "/user")));
        assert!(!registry.has_schema(&RouteKey::new(Method::Get, "/userWithoutSchema")));
    }

    #[test]
    fn test_same_path_different_methods() {
        let registry = RouteRegistry::builder()
            .routes([
                RouteDeclaration::new(Method::Get, "/user")
                    .response_schema(SchemaNode::object([("age", SchemaNode::number())])),
                RouteDeclaration::new(Method::Post, "/user").response_schema(SchemaNode::array(
                    SchemaNode::object([("first_name", SchemaNode::string())]),
                )),
            ])
            .build();

        let get = registry.get(&RouteKey::new(Method::Get, "/user")).unwrap();
        let post = registry.get(&RouteKey::new(Method::Post, "/user")).unwrap();
        assert!(get.schema.child("age").is_some());
        assert!(matches!(post.schema.kind, crate::types::SchemaKind::Array { .. }));
    }

    #[test]
    fn test_dynamic_schemas_kept_with_route() {
        let registry = RouteRegistry::builder()
            .route(
                RouteDeclaration::new(Method::Get, "/test")
                    .response_schema(SchemaNode::object([("tag", SchemaNode::free_object())]))
                    .dynamic_schema(
                        "tag",
                        FnResolver(|_: &RequestContext| -> anyhow::Result<SchemaNode> {
                            Ok(SchemaNode::string())
                        }),
                    ),
            )
            .build();

        let entry = registry.get(&RouteKey::new(Method::Get, "/test")).unwrap();
        assert_eq!(entry.overlay.len(), 1);
    }
}
