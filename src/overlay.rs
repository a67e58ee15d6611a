//! Dynamic schema overlays
//!
//! A route may declare resolvers for dotted schema paths whose shape is only
//! known per request (e.g. a free-form `tag` object). All resolvers of a
//! response run concurrently and must all succeed before flattening starts.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::OverlayResolutionError;
use crate::routes::RequestContext;
use crate::types::SchemaNode;

/// Produces the schema for one dynamic path of a request
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    async fn resolve(&self, request: &RequestContext) -> anyhow::Result<SchemaNode>;
}

/// Resolver backed by a plain closure
pub struct FnResolver<F>(pub F);

#[async_trait]
impl<F> SchemaResolver for FnResolver<F>
where
    F: Fn(&RequestContext) -> anyhow::Result<SchemaNode> + Send + Sync,
{
    async fn resolve(&self, request: &RequestContext) -> anyhow::Result<SchemaNode> {
        (self.0)(request)
    }
}

/// Declared resolvers of a route, keyed by dotted schema path
#[derive(Clone, Default)]
pub struct DynamicOverlay {
    resolvers: BTreeMap<String, Arc<dyn SchemaResolver>>,
}

impl fmt::Debug for DynamicOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicOverlay")
            .field("paths", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DynamicOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, resolver: Arc<dyn SchemaResolver>) {
        self.resolvers.insert(path.into(), resolver);
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Run every resolver once, at most `concurrency` at a time.
    ///
    /// The first failure aborts the whole overlay; results of sibling
    /// resolvers, finished or still running, are dropped.
    pub async fn resolve(
        &self,
        request: &RequestContext,
        concurrency: usize,
    ) -> Result<ResolvedOverlay, OverlayResolutionError> {
        if self.resolvers.is_empty() {
            return Ok(ResolvedOverlay::default());
        }

        debug!(resolvers = self.resolvers.len(), "resolving dynamic schemas");

        // Owned pairs, so the returned future can be handed to `tokio::spawn`
        let jobs: Vec<(String, Arc<dyn SchemaResolver>)> = self
            .resolvers
            .iter()
            .map(|(path, resolver)| (path.clone(), Arc::clone(resolver)))
            .collect();

        let jobs: Vec<_> = jobs
            .into_iter()
            .map(|(path, resolver)| async move {
                match resolver.resolve(request).await {
                    Ok(schema) => Ok((path, schema)),
                    Err(source) => {
                        warn!(path = %path, error = %source, "dynamic schema resolver failed");
                        Err(OverlayResolutionError { path, source })
                    }
                }
            })
            .collect();

        let schemas = stream::iter(jobs)
            .buffer_unordered(concurrency.max(1))
            .try_collect::<BTreeMap<String, SchemaNode>>()
            .await?;

        Ok(ResolvedOverlay { schemas })
    }
}

/// Concrete schemas per dotted path, ready for synchronous flattening
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOverlay {
    schemas: BTreeMap<String, SchemaNode>,
}

impl ResolvedOverlay {
    pub fn get(&self, path: &str) -> Option<&SchemaNode> {
        self.schemas.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<(String, SchemaNode)> for ResolvedOverlay {
    fn from_iter<I: IntoIterator<Item = (String, SchemaNode)>>(iter: I) -> Self {
        ResolvedOverlay {
            schemas: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{Method, RouteKey};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request() -> RequestContext {
        RequestContext::new(RouteKey::new(Method::Get, "/test"))
    }

    struct Delayed {
        delay: Duration,
        result: Result<SchemaNode, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SchemaResolver for Delayed {
        async fn resolve(&self, _request: &RequestContext) -> anyhow::Result<SchemaNode> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone().map_err(|e| anyhow!(e))
        }
    }

    #[tokio::test]
    async fn test_empty_overlay() {
        let overlay = DynamicOverlay::new();
        let resolved = overlay.resolve(&request(), 4).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_resolves_all_paths_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut overlay = DynamicOverlay::new();
        overlay.insert(
            "tag",
            Arc::new(Delayed {
                delay: Duration::from_millis(20),
                result: Ok(SchemaNode::object([("id", SchemaNode::number())])),
                calls: calls.clone(),
            }),
        );
        overlay.insert(
            "meta.extra",
            Arc::new(Delayed {
                delay: Duration::from_millis(5),
                result: Ok(SchemaNode::string()),
                calls: calls.clone(),
            }),
        );

        let resolved = overlay.resolve(&request(), 4).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(resolved.get("tag").unwrap().child("id").is_some());
        assert_eq!(resolved.get("meta.extra"), Some(&SchemaNode::string()));
        assert!(resolved.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_one_failure_discards_siblings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut overlay = DynamicOverlay::new();
        overlay.insert(
            "a",
            Arc::new(Delayed {
                delay: Duration::from_millis(1),
                result: Ok(SchemaNode::string()),
                calls: calls.clone(),
            }),
        );
        overlay.insert(
            "b",
            Arc::new(Delayed {
                delay: Duration::from_millis(10),
                result: Err("lookup failed"),
                calls: calls.clone(),
            }),
        );

        let err = overlay.resolve(&request(), 4).await.unwrap_err();
        assert_eq!(err.path, "b");
        assert_eq!(err.source.to_string(), "lookup failed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resolution_runs_on_spawned_tasks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut overlay = DynamicOverlay::new();
        overlay.insert(
            "tag",
            Arc::new(Delayed {
                delay: Duration::from_millis(5),
                result: Ok(SchemaNode::string()),
                calls: calls.clone(),
            }),
        );
        let overlay = Arc::new(overlay);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let overlay = Arc::clone(&overlay);
            handles.push(tokio::spawn(async move {
                let request = request();
                overlay.resolve(&request, 2).await.map(|resolved| resolved.get("tag").cloned())
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(SchemaNode::string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_closure_resolver() {
        let mut overlay = DynamicOverlay::new();
        overlay.insert(
            "tag",
            Arc::new(FnResolver(|request: &RequestContext| -> anyhow::Result<SchemaNode> {
                assert_eq!(request.route.path, "/test");
                Ok(SchemaNode::object([("name", SchemaNode::string())]))
            })),
        );

        let resolved = overlay.resolve(&request(), 1).await.unwrap();
        assert!(resolved.get("tag").is_some());
    }
}
