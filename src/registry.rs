//! Mock registry.
//!
//! Maps `path -> method -> response` with exact-string matching on both keys.

use crate::config::{MockResponse, MockRoute};
use crate::error::RegistryError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Point-in-time copy of the registry, sorted by path then method.
pub type RegistrySnapshot = BTreeMap<String, BTreeMap<String, MockResponse>>;

/// Concurrent routing table of registered mocks.
///
/// Every path key holds a non-empty method map; deleting the last method of
/// a path removes the path.
#[derive(Debug, Default)]
pub struct MockRegistry {
    routes: RwLock<HashMap<String, HashMap<String, MockResponse>>>,
}

impl MockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the given mocks.
    pub fn from_routes<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = MockRoute>,
    {
        let registry = Self::new();
        for route in routes {
            registry.upsert(route.path, route.method, route.response);
        }
        registry
    }

    /// Insert or replace the response for `(path, method)`.
    ///
    /// Returns `true` if an existing mock was replaced.
    pub fn upsert(
        &self,
        path: impl Into<String>,
        method: impl Into<String>,
        response: MockResponse,
    ) -> bool {
        let mut routes = self.routes.write();
        routes
            .entry(path.into())
            .or_default()
            .insert(method.into(), response)
            .is_some()
    }

    /// Remove the response for `(path, method)`.
    pub fn delete(&self, path: &str, method: &str) -> Result<MockResponse, RegistryError> {
        let mut routes = self.routes.write();
        let not_found = || RegistryError::NotFound {
            method: method.to_string(),
            path: path.to_string(),
        };

        let methods = routes.get_mut(path).ok_or_else(not_found)?;
        let removed = methods.remove(method).ok_or_else(not_found)?;
        if methods.is_empty() {
            routes.remove(path);
        }
        Ok(removed)
    }

    /// Find the response registered for exactly `(path, method)`.
    pub fn lookup(&self, path: &str, method: &str) -> Option<MockResponse> {
        let routes = self.routes.read();
        routes.get(path).and_then(|methods| methods.get(method)).cloned()
    }

    /// Copy the whole table. Later mutations are not reflected.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let routes = self.routes.read();
        routes
            .iter()
            .map(|(path, methods)| {
                let methods = methods
                    .iter()
                    .map(|(method, response)| (method.clone(), response.clone()))
                    .collect();
                (path.clone(), methods)
            })
            .collect()
    }

    /// Number of registered `(path, method)` pairs.
    pub fn len(&self) -> usize {
        self.routes.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn hi() -> MockResponse {
        MockResponse::new(200, "hi")
    }

    #[test]
    fn test_upsert_then_lookup() {
        let registry = MockRegistry::new();
        registry.upsert("/foo", "GET", hi());

        let found = registry.lookup("/foo", "GET").unwrap();
        assert_eq!(found.status_code, 200);
        assert_eq!(found.body, "hi");
    }

    #[test]
    fn test_upsert_replaces_wholesale() {
        let registry = MockRegistry::new();
        assert!(!registry.upsert("/foo", "GET", hi().with_header("X-Old", "1")));
        assert!(registry.upsert("/foo", "GET", MockResponse::new(503, "down")));

        let found = registry.lookup("/foo", "GET").unwrap();
        assert_eq!(found, MockResponse::new(503, "down"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = MockRegistry::new();
        registry.upsert("/foo", "GET", hi());

        assert!(registry.lookup("/foo/", "GET").is_none());
        assert!(registry.lookup("/FOO", "GET").is_none());
        assert!(registry.lookup("/foo", "get").is_none());
        assert!(registry.lookup("/foo", "POST").is_none());
        assert!(registry.lookup("/fo", "GET").is_none());
    }

    #[test]
    fn test_delete_then_lookup() {
        let registry = MockRegistry::new();
        registry.upsert("/foo", "GET", hi());

        let removed = registry.delete("/foo", "GET").unwrap();
        assert_eq!(removed, hi());
        assert!(registry.lookup("/foo", "GET").is_none());
        assert!(!registry.snapshot().contains_key("/foo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_delete_keeps_other_methods() {
        let registry = MockRegistry::new();
        registry.upsert("/foo", "GET", hi());
        registry.upsert("/foo", "POST", MockResponse::new(201, "made"));

        registry.delete("/foo", "GET").unwrap();

        let snapshot = registry.snapshot();
        let methods = snapshot.get("/foo").unwrap();
        assert_eq!(methods.len(), 1);
        assert!(methods.contains_key("POST"));
    }

    #[test]
    fn test_delete_missing_reports_not_found() {
        let registry = MockRegistry::new();
        registry.upsert("/foo", "GET", hi());

        assert_eq!(
            registry.delete("/foo", "PUT"),
            Err(RegistryError::NotFound {
                method: "PUT".into(),
                path: "/foo".into()
            })
        );
        assert!(registry.delete("/bar", "GET").is_err());
        // Failed deletes leave the table untouched.
        assert_eq!(registry.lookup("/foo", "GET"), Some(hi()));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = MockRegistry::new();
        registry.upsert("/a", "GET", hi());
        let snapshot = registry.snapshot();

        registry.upsert("/b", "GET", hi());
        registry.delete("/a", "GET").unwrap();

        assert!(snapshot.contains_key("/a"));
        assert!(!snapshot.contains_key("/b"));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = MockRegistry::new();
        registry.upsert("/zeta", "GET", hi());
        registry.upsert("/alpha", "PUT", hi());
        registry.upsert("/alpha", "DELETE", hi());

        let snapshot = registry.snapshot();
        let paths: Vec<_> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/alpha", "/zeta"]);
        let methods: Vec<_> = snapshot["/alpha"].keys().map(String::as_str).collect();
        assert_eq!(methods, vec!["DELETE", "PUT"]);
    }

    #[test]
    fn test_from_routes() {
        let registry = MockRegistry::from_routes(vec![
            MockRoute {
                method: "GET".into(),
                path: "/a".into(),
                response: hi(),
            },
            MockRoute {
                method: "POST".into(),
                path: "/a".into(),
                response: hi(),
            },
        ]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_upserts_are_not_lost() {
        let registry = Arc::new(MockRegistry::new());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let method = if i % 2 == 0 { "GET" } else { "POST" };
                    registry.upsert(
                        format!("/items/{}", i / 2),
                        method,
                        MockResponse::new(200, i.to_string()),
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 64);
        for i in 0..64 {
            let method = if i % 2 == 0 { "GET" } else { "POST" };
            let found = registry
                .lookup(&format!("/items/{}", i / 2), method)
                .unwrap();
            assert_eq!(found.body, i.to_string());
        }
    }
}
