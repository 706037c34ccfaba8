//! The type-resolution capability exposed to the host runtime.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::types::DefinedType;

/// Locators of materialized resources, in the order the parent sent them.
pub type Resources = std::vec::IntoIter<PathBuf>;

/// Answers "what are the bytes for class/resource X".
///
/// Implementations may be called from any thread and must serialize their
/// own access to whatever backs them.
pub trait TypeResolver: Send + Sync {
    /// Locate a single resource. Never fails: any problem is "not found".
    fn resolve_resource(&self, name: &str) -> Option<PathBuf>;

    /// Locate every resource with this name.
    fn resolve_resources(&self, name: &str) -> Result<Resources, ResolveError>;

    /// Fetch and define a class by binary name (`org.example.Foo`).
    ///
    /// `Ok(None)` means the parent does not define it.
    fn resolve_class(&self, name: &str) -> Result<Option<Arc<DefinedType>>, ResolveError>;

    /// A class this resolver already defined.
    fn loaded_class(&self, name: &str) -> Option<Arc<DefinedType>>;

    /// Cached lookup first, then [`resolve_class`](TypeResolver::resolve_class).
    fn load_class(&self, name: &str) -> Result<Arc<DefinedType>, ResolveError> {
        if let Some(defined) = self.loaded_class(name) {
            return Ok(defined);
        }
        self.resolve_class(name)?
            .ok_or_else(|| ResolveError::not_found(name))
    }
}

/// Resource path of a class: `org.example.Foo` becomes `org/example/Foo.class`.
pub fn class_resource_name(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

thread_local! {
    static CONTEXT: RefCell<Option<Arc<dyn TypeResolver>>> = const { RefCell::new(None) };
}

/// Install `resolver` as this thread's resolution context.
///
/// The previous context is restored when the returned guard drops.
pub fn enter_context(resolver: Arc<dyn TypeResolver>) -> ContextGuard {
    let previous = CONTEXT.with(|ctx| ctx.borrow_mut().replace(resolver));
    ContextGuard { previous }
}

/// This thread's resolution context, if one is installed.
pub fn context_resolver() -> Option<Arc<dyn TypeResolver>> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Restores the previous thread context on drop.
#[must_use = "the context is removed when the guard drops"]
pub struct ContextGuard {
    previous: Option<Arc<dyn TypeResolver>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CONTEXT.with(|ctx| *ctx.borrow_mut() = previous);
    }
}
