//! Package and target resolution boundary.
//!
//! Planning never walks the filesystem itself. It resolves target selectors
//! through these traits, so package discovery stays an external, possibly
//! I/O-bound collaborator. An in-memory implementation lives in
//! [`tree`].

pub mod tree;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tasks::Task;

pub use tree::TreePackage;

/// A target selector expression, resolved by a package against itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSelector(String);

impl TargetSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetSelector {
    fn from(selector: &str) -> Self {
        Self(selector.to_string())
    }
}

impl From<String> for TargetSelector {
    fn from(selector: String) -> Self {
        Self(selector)
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One package of the monorepo.
#[async_trait]
pub trait Package: Send + Sync {
    /// Unique package name.
    fn name(&self) -> &str;

    /// Parent package, if any. Batch homes are looked up along this chain.
    fn parent(&self) -> Option<Arc<dyn Package>> {
        None
    }

    /// Filesystem location, when the package has one.
    fn location(&self) -> Option<PathBuf> {
        None
    }

    /// Names of all tasks the package exposes, in registration order.
    fn task_names(&self) -> Vec<String>;

    /// Resolves a target selector relative to this package.
    fn select(self: Arc<Self>, selector: &TargetSelector) -> Arc<dyn PackageSet>;

    /// The named task of this package.
    async fn task(self: Arc<Self>, name: &str) -> Result<Arc<Task>>;
}

/// An ordered set of packages a selector resolved to.
#[async_trait]
pub trait PackageSet: Send + Sync {
    /// Human-readable name of the set, used in synthetic group names.
    fn display_name(&self) -> String;

    /// The resolved packages, in resolution order.
    async fn packages(&self) -> Result<Vec<Arc<dyn Package>>>;
}

/// Resolves a list of selectors against an origin package.
///
/// No selectors means the origin itself; several selectors form a union,
/// deduplicated by package name with the first occurrence winning.
pub fn select_all(
    origin: &Arc<dyn Package>,
    selectors: &[TargetSelector],
) -> Arc<dyn PackageSet> {
    match selectors {
        [] => Arc::new(SelfSet(Arc::clone(origin))),
        [selector] => Arc::clone(origin).select(selector),
        _ => Arc::new(UnionSet(
            selectors
                .iter()
                .map(|selector| Arc::clone(origin).select(selector))
                .collect(),
        )),
    }
}

struct SelfSet(Arc<dyn Package>);

#[async_trait]
impl PackageSet for SelfSet {
    fn display_name(&self) -> String {
        self.0.name().to_string()
    }

    async fn packages(&self) -> Result<Vec<Arc<dyn Package>>> {
        Ok(vec![Arc::clone(&self.0)])
    }
}

struct UnionSet(Vec<Arc<dyn PackageSet>>);

#[async_trait]
impl PackageSet for UnionSet {
    fn display_name(&self) -> String {
        self.0
            .iter()
            .map(|set| set.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn packages(&self) -> Result<Vec<Arc<dyn Package>>> {
        let mut seen = std::collections::HashSet::new();
        let mut packages = Vec::new();
        for set in &self.0 {
            for package in set.packages().await? {
                if seen.insert(package.name().to_string()) {
                    packages.push(package);
                }
            }
        }
        Ok(packages)
    }
}
