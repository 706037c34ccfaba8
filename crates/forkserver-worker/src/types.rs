//! The host runtime's type-definition primitive.
//!
//! A worker does not interpret bytecode itself. Whatever runtime embeds it
//! supplies a [`TypeDefiner`] that turns raw bytes into a defined type and
//! remembers it. [`TypeTable`] is the in-process implementation used by the
//! stock binary.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::DefineError;

/// A type defined from bytes supplied by the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedType {
    pub name: String,
    pub bytecode: Bytes,
}

/// Runtime hook that defines types from raw bytecode.
pub trait TypeDefiner: Send + Sync {
    /// Define `name` from `bytecode`.
    fn define(&self, name: &str, bytecode: Bytes) -> Result<Arc<DefinedType>, DefineError>;

    /// A previously defined type, if any.
    fn lookup(&self, name: &str) -> Option<Arc<DefinedType>>;
}

/// In-memory table of defined types.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: RwLock<HashMap<String, Arc<DefinedType>>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl TypeDefiner for TypeTable {
    fn define(&self, name: &str, bytecode: Bytes) -> Result<Arc<DefinedType>, DefineError> {
        if bytecode.is_empty() {
            return Err(DefineError::Malformed {
                name: name.to_string(),
                reason: "empty bytecode".to_string(),
            });
        }

        let mut types = self.types.write();
        if types.contains_key(name) {
            return Err(DefineError::Duplicate {
                name: name.to_string(),
            });
        }

        let defined = Arc::new(DefinedType {
            name: name.to_string(),
            bytecode,
        });
        types.insert(name.to_string(), Arc::clone(&defined));
        tracing::debug!(name, size = defined.bytecode.len(), "defined type");
        Ok(defined)
    }

    fn lookup(&self, name: &str) -> Option<Arc<DefinedType>> {
        self.types.read().get(name).cloned()
    }
}
