// src/node/registry.rs

//! Node type registry and module discovery.
//!
//! A module manifest is a TOML file in the node directory that binds type
//! names to implementations of an installed [`NodeLibrary`]:
//!
//! ```toml
//! library = "basic"
//!
//! # Optional. Without a [nodes] table every type the library exports is
//! # registered under its own name.
//! [nodes.Adder]
//! implementation = "MathNode"
//! display_name = "Adder"
//! category = "math"
//! ```
//!
//! Files whose name starts with `_` are skipped.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::basic::BasicLibrary;
use super::{NodeDescriptor, NodeInfo, NodeLibrary};
use crate::errors::RegistryError;
use crate::types::DuplicatePolicy;

type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Contents of a module manifest file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    pub library: String,

    #[serde(default)]
    pub nodes: Option<BTreeMap<String, NodeBinding>>,
}

/// One explicit `[nodes.<TypeName>]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeBinding {
    /// Implementation inside the library. Defaults to the type name.
    #[serde(default)]
    pub implementation: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Outcome of loading one module manifest.
#[derive(Debug)]
pub enum ModuleLoad {
    Loaded {
        path: PathBuf,
        registered: Vec<String>,
    },
    Failed {
        path: PathBuf,
        error: RegistryError,
    },
}

/// Per-module results of a discovery scan.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub modules: Vec<ModuleLoad>,
}

impl DiscoveryReport {
    pub fn loaded(&self) -> impl Iterator<Item = (&Path, &[String])> {
        self.modules.iter().filter_map(|m| match m {
            ModuleLoad::Loaded { path, registered } => {
                Some((path.as_path(), registered.as_slice()))
            }
            ModuleLoad::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &RegistryError)> {
        self.modules.iter().filter_map(|m| match m {
            ModuleLoad::Failed { path, error } => Some((path.as_path(), error)),
            ModuleLoad::Loaded { .. } => None,
        })
    }

    /// Every type name registered by this scan.
    pub fn registered(&self) -> Vec<String> {
        self.loaded()
            .flat_map(|(_, names)| names.iter().cloned())
            .collect()
    }
}

/// Maps node type names to descriptors.
pub struct NodeRegistry {
    nodes: BTreeMap<String, Arc<NodeDescriptor>>,
    libraries: BTreeMap<String, Arc<dyn NodeLibrary>>,
    policy: DuplicatePolicy,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("libraries", &self.libraries.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl NodeRegistry {
    /// Empty registry with no libraries installed.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            nodes: BTreeMap::new(),
            libraries: BTreeMap::new(),
            policy,
        }
    }

    /// Registry with the `basic` library installed and its types registered.
    pub fn with_builtins(policy: DuplicatePolicy) -> Self {
        let mut registry = Self::new(policy);
        registry.install_library(Arc::new(BasicLibrary));
        for descriptor in BasicLibrary.descriptors() {
            // Registering into an empty registry cannot hit a duplicate.
            if let Err(e) = registry.register(descriptor) {
                warn!(error = %e, "failed to register builtin node");
            }
        }
        registry
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Make a library available to module manifests.
    pub fn install_library(&mut self, library: Arc<dyn NodeLibrary>) {
        let name = library.name().to_string();
        debug!(library = %name, "installing node library");
        self.libraries.insert(name, library);
    }

    /// Register a node type, applying the duplicate policy.
    pub fn register(&mut self, descriptor: NodeDescriptor) -> RegistryResult<()> {
        self.admit(&descriptor, false)?;
        self.insert(descriptor);
        Ok(())
    }

    /// Check a descriptor against its contract and the duplicate policy
    /// without registering it. `taken` marks a name already claimed by the
    /// batch being admitted.
    fn admit(&self, descriptor: &NodeDescriptor, taken: bool) -> RegistryResult<()> {
        descriptor
            .check_contract()
            .map_err(|reason| RegistryError::InvalidDescriptor {
                type_name: descriptor.type_name.clone(),
                reason,
            })?;

        let duplicate = taken || self.nodes.contains_key(&descriptor.type_name);
        if duplicate && self.policy == DuplicatePolicy::Reject {
            return Err(RegistryError::DuplicateType(descriptor.type_name.clone()));
        }
        Ok(())
    }

    fn insert(&mut self, descriptor: NodeDescriptor) {
        let name = descriptor.type_name.clone();
        if self.nodes.contains_key(&name) && self.policy == DuplicatePolicy::Warn {
            warn!(node_type = %name, "node type already registered; replacing");
        }
        info!(node_type = %name, "registered node");
        self.nodes.insert(name, Arc::new(descriptor));
    }

    pub fn resolve(&self, type_name: &str) -> RegistryResult<Arc<NodeDescriptor>> {
        self.nodes
            .get(type_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.nodes.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn describe(&self, type_name: &str) -> Option<NodeInfo> {
        self.nodes.get(type_name).map(|d| d.info())
    }

    /// Full catalog, sorted by type name.
    pub fn describe_all(&self) -> Vec<NodeInfo> {
        self.nodes.values().map(|d| d.info()).collect()
    }

    /// Scan `dir` for module manifests and register what they bind.
    ///
    /// A manifest that fails to load is reported and skipped; the scan
    /// always continues.
    pub fn discover(&mut self, dir: impl AsRef<Path>) -> DiscoveryReport {
        let dir = dir.as_ref();
        let mut report = DiscoveryReport::default();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "node directory not readable; skipping discovery");
                return report;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_manifest(path))
            .collect();
        paths.sort();

        for path in paths {
            match self.load_module(&path) {
                Ok(registered) => {
                    info!(module = %path.display(), count = registered.len(), "loaded node module");
                    report.modules.push(ModuleLoad::Loaded { path, registered });
                }
                Err(error) => {
                    warn!(module = %path.display(), error = %error, "error loading node module");
                    report.modules.push(ModuleLoad::Failed { path, error });
                }
            }
        }

        report
    }

    fn load_module(&mut self, path: &Path) -> RegistryResult<Vec<String>> {
        let contents = fs::read_to_string(path)?;
        let manifest: ModuleManifest = toml::from_str(&contents)?;

        let library = self
            .libraries
            .get(&manifest.library)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownLibrary(manifest.library.clone()))?;

        let descriptors = match &manifest.nodes {
            Some(bindings) => bindings
                .iter()
                .map(|(type_name, binding)| bind(library.as_ref(), type_name, binding))
                .collect::<RegistryResult<Vec<_>>>()?,
            None => library.descriptors(),
        };

        // A module registers all of its types or none of them.
        let mut claimed: HashSet<&str> = HashSet::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let taken = !claimed.insert(descriptor.type_name.as_str());
            self.admit(descriptor, taken)?;
        }

        let registered = descriptors.iter().map(|d| d.type_name.clone()).collect();
        for descriptor in descriptors {
            self.insert(descriptor);
        }
        Ok(registered)
    }
}

fn is_manifest(path: &Path) -> bool {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'));
    path.is_file() && is_toml && !hidden
}

fn bind(
    library: &dyn NodeLibrary,
    type_name: &str,
    binding: &NodeBinding,
) -> RegistryResult<NodeDescriptor> {
    let implementation = binding.implementation.as_deref().unwrap_or(type_name);
    let base = library
        .descriptor(implementation)
        .ok_or_else(|| RegistryError::UnknownImplementation {
            library: library.name().to_string(),
            implementation: implementation.to_string(),
        })?;

    let mut descriptor = base.renamed(type_name);
    if let Some(name) = &binding.display_name {
        descriptor = descriptor.display_name(name);
    }
    if let Some(description) = &binding.description {
        descriptor = descriptor.description(description);
    }
    if let Some(category) = &binding.category {
        descriptor = descriptor.category(category);
    }
    if let Some(tags) = &binding.tags {
        descriptor = descriptor.tags(tags.iter().cloned());
    }
    Ok(descriptor)
}
