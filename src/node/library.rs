// src/node/library.rs

use super::NodeDescriptor;

/// A compiled-in collection of node implementations.
///
/// Module manifests found during discovery refer to a library by
/// [`name`](NodeLibrary::name) and to its implementations by descriptor type
/// name.
pub trait NodeLibrary: Send + Sync {
    fn name(&self) -> &str;

    /// Every node type this library exports.
    fn descriptors(&self) -> Vec<NodeDescriptor>;

    fn descriptor(&self, implementation: &str) -> Option<NodeDescriptor> {
        self.descriptors()
            .into_iter()
            .find(|d| d.type_name == implementation)
    }
}
