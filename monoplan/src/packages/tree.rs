//! In-memory package tree.
//!
//! Suits tests and tools that assemble the package layout up front. Package
//! names are slash-joined paths from the root, so they double as unique
//! identities.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;

use crate::error::{PlanError, Result};
use crate::packages::{Package, PackageSet, TargetSelector};
use crate::tasks::{Task, TaskSpec};

/// A package node of an in-memory tree.
pub struct TreePackage {
    // Weak self-handle, so methods on `&self` can hand out owned packages.
    me: Weak<TreePackage>,
    name: String,
    parent: Weak<TreePackage>,
    children: Mutex<Vec<Arc<TreePackage>>>,
    tasks: Mutex<Vec<(String, TaskSpec)>>,
    location: Mutex<Option<PathBuf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TreePackage {
    /// Creates a root package.
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            name: name.into(),
            parent: Weak::new(),
            children: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            location: Mutex::new(None),
        })
    }

    /// Adds a child package named `{self}/{name}`.
    pub fn add_child(&self, name: &str) -> Arc<TreePackage> {
        let child = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            name: format!("{}/{}", self.name, name),
            parent: self.me.clone(),
            children: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            location: Mutex::new(None),
        });
        lock(&self.children).push(Arc::clone(&child));
        child
    }

    /// Registers a task. Registration order is the batch entry order.
    pub fn add_task(&self, name: impl Into<String>, spec: TaskSpec) {
        lock(&self.tasks).push((name.into(), spec));
    }

    pub fn set_location(&self, location: impl Into<PathBuf>) {
        *lock(&self.location) = Some(location.into());
    }

    fn descendants(&self, into: &mut Vec<Arc<dyn Package>>) {
        if let Some(me) = self.me.upgrade() {
            into.push(me as Arc<dyn Package>);
        }
        for child in lock(&self.children).iter() {
            child.descendants(into);
        }
    }

    fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[async_trait]
impl Package for TreePackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<Arc<dyn Package>> {
        self.parent.upgrade().map(|parent| parent as Arc<dyn Package>)
    }

    fn location(&self) -> Option<PathBuf> {
        lock(&self.location).clone()
    }

    fn task_names(&self) -> Vec<String> {
        lock(&self.tasks).iter().map(|(name, _)| name.clone()).collect()
    }

    fn select(self: Arc<Self>, selector: &TargetSelector) -> Arc<dyn PackageSet> {
        Arc::new(TreeSelection {
            origin: self,
            selector: selector.clone(),
        })
    }

    async fn task(self: Arc<Self>, name: &str) -> Result<Arc<Task>> {
        let spec = lock(&self.tasks)
            .iter()
            .find(|(task, _)| task == name)
            .map(|(_, spec)| spec.clone());
        match spec {
            Some(spec) => Ok(Task::new(self as Arc<dyn Package>, name, spec)),
            None => Err(PlanError::UnknownTask {
                target: self.name.clone(),
                task: name.to_string(),
            }),
        }
    }
}

/// Lazy resolution of one selector against one tree package.
///
/// Supported selectors: `.` (the package itself), `./name` (a direct
/// child), `./*` (all direct children), `./**` (the package and all
/// descendants, depth first).
struct TreeSelection {
    origin: Arc<TreePackage>,
    selector: TargetSelector,
}

#[async_trait]
impl PackageSet for TreeSelection {
    fn display_name(&self) -> String {
        format!(
            "{}{}",
            self.origin.name,
            self.selector.as_str().trim_start_matches('.')
        )
    }

    async fn packages(&self) -> Result<Vec<Arc<dyn Package>>> {
        match self.selector.as_str() {
            "." => Ok(vec![Arc::clone(&self.origin) as Arc<dyn Package>]),
            "./*" => Ok(lock(&self.origin.children)
                .iter()
                .map(|child| Arc::clone(child) as Arc<dyn Package>)
                .collect()),
            "./**" => {
                let mut packages = Vec::new();
                self.origin.descendants(&mut packages);
                Ok(packages)
            }
            selector => {
                let name = selector.strip_prefix("./").ok_or_else(|| {
                    PlanError::Resolution(format!("unsupported target selector `{selector}`"))
                })?;
                let child = lock(&self.origin.children)
                    .iter()
                    .find(|child| child.short_name() == name)
                    .cloned();
                match child {
                    Some(child) => Ok(vec![child as Arc<dyn Package>]),
                    None => Err(PlanError::Resolution(format!(
                        "no package `{name}` under `{}`",
                        self.origin.name
                    ))),
                }
            }
        }
    }
}
