//! Hierarchical resource namespace with type-keyed views.
//!
//! An [`AssetTree`] is a tree of named [`Asset`]s addressed by `/`-separated
//! paths. Each asset can carry at most one view per Rust type; other
//! subsystems find a view by type instead of holding a direct reference:
//!
//! ```rust,ignore
//! let tree = AssetTree::new();
//! let clusters = Arc::new(Clusters::<Cluster>::new());
//! clusters.install(&tree)?;
//! let found = tree.root().get_view::<Clusters>().unwrap();
//! ```
//!
//! Tearing the tree down notifies every view first, then closes them.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::lifecycle::close_all;
use crate::{CloseError, Closeable, NamespaceError};

struct ViewSlot {
    type_name: &'static str,
    any: Arc<dyn Any + Send + Sync>,
    lifecycle: Arc<dyn Closeable>,
}

// ─────────────────────────────────────────────
// Asset
// ─────────────────────────────────────────────

/// One node of the namespace.
pub struct Asset {
    name: String,
    path: String,
    children: DashMap<String, Arc<Asset>>,
    views: DashMap<TypeId, ViewSlot>,
}

impl Asset {
    fn root() -> Self {
        Self::named(String::new(), "/".to_string())
    }

    fn named(name: String, path: String) -> Self {
        Self {
            name,
            path,
            children: DashMap::new(),
            views: DashMap::new(),
        }
    }

    fn child_of(parent: &Asset, name: &str) -> Self {
        let path = if parent.path == "/" {
            format!("/{name}")
        } else {
            format!("{}/{name}", parent.path)
        };
        Self::named(name.to_string(), path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Walk `path` below this asset, creating missing assets on the way.
    pub fn acquire_asset(self: &Arc<Self>, path: &str) -> Arc<Asset> {
        let mut current = Arc::clone(self);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = Arc::clone(
                current
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| Arc::new(Asset::child_of(&current, segment)))
                    .value(),
            );
            current = next;
        }
        current
    }

    /// Look up `path` below this asset without creating anything.
    pub fn get_asset(self: &Arc<Self>, path: &str) -> Option<Arc<Asset>> {
        let mut current = Arc::clone(self);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = current.children.get(segment).map(|c| Arc::clone(c.value()))?;
            current = next;
        }
        Some(current)
    }

    /// Names of the direct children, ascending.
    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.iter().map(|c| c.key().clone()).collect();
        names.sort_unstable();
        names
    }

    // ── Views ────────────────────────────────────────────────

    /// Register `view` as this asset's singleton of type `V`.
    pub fn add_view<V: Closeable + 'static>(&self, view: Arc<V>) -> Result<Arc<V>, NamespaceError> {
        match self.views.entry(TypeId::of::<V>()) {
            Entry::Occupied(_) => Err(NamespaceError::DuplicateView {
                path: self.path.clone(),
                type_name: type_name::<V>(),
            }),
            Entry::Vacant(slot) => {
                let any: Arc<dyn Any + Send + Sync> = view.clone();
                let lifecycle: Arc<dyn Closeable> = view.clone();
                slot.insert(ViewSlot { type_name: type_name::<V>(), any, lifecycle });
                debug!(path = %self.path, view = type_name::<V>(), "view added");
                Ok(view)
            }
        }
    }

    pub fn get_view<V: Any + Send + Sync>(&self) -> Option<Arc<V>> {
        let any = self.views.get(&TypeId::of::<V>()).map(|slot| Arc::clone(&slot.any))?;
        any.downcast::<V>().ok()
    }

    pub fn has_view<V: Any>(&self) -> bool {
        self.views.contains_key(&TypeId::of::<V>())
    }

    /// Every view in this subtree, depth-first: own views by type name,
    /// then children by name.
    fn collect_views(&self, out: &mut Vec<(String, Arc<dyn Closeable>)>) {
        let mut own: Vec<(String, Arc<dyn Closeable>)> = self
            .views
            .iter()
            .map(|slot| (format!("{}#{}", self.path, slot.type_name), Arc::clone(&slot.lifecycle)))
            .collect();
        own.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out.extend(own);

        let mut children: Vec<Arc<Asset>> = self.children.iter().map(|c| Arc::clone(c.value())).collect();
        children.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        for child in children {
            child.collect_views(out);
        }
    }
}

// ─────────────────────────────────────────────
// AssetTree
// ─────────────────────────────────────────────

/// The namespace root and its teardown.
pub struct AssetTree {
    root: Arc<Asset>,
}

impl AssetTree {
    pub fn new() -> Self {
        Self { root: Arc::new(Asset::root()) }
    }

    pub fn root(&self) -> &Arc<Asset> {
        &self.root
    }

    pub fn acquire_asset(&self, path: &str) -> Arc<Asset> {
        self.root.acquire_asset(path)
    }

    pub fn get_asset(&self, path: &str) -> Option<Arc<Asset>> {
        self.root.get_asset(path)
    }

    /// Notify every view, then close every view.
    pub fn shutdown(&self) -> Result<(), CloseError> {
        self.notify_closing();
        self.close()
    }

    fn views(&self) -> Vec<(String, Arc<dyn Closeable>)> {
        let mut views = Vec::new();
        self.root.collect_views(&mut views);
        views
    }
}

impl Default for AssetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Closeable for AssetTree {
    fn notify_closing(&self) {
        for (_, view) in self.views() {
            view.notify_closing();
        }
    }

    fn close(&self) -> Result<(), CloseError> {
        let views = self.views();
        info!(views = views.len(), "closing asset tree");
        close_all(views.iter().map(|(label, view)| (label.as_str(), view.as_ref())))
    }
}
