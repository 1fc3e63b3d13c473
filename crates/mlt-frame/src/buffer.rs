//! Owned image/audio buffers, freed via an optional destructor closure
//! when an external allocator provided the backing memory.

use std::sync::Arc;

/// A destructor hook run when a buffer supplied by a foreign owner (rather
/// than allocated by this crate) is finally dropped. Buffers allocated here
/// need no functor; `Vec`'s own `Drop` is enough.
pub type Destructor = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Buffer {
    data: Arc<Vec<u8>>,
    destructor: Option<Destructor>,
}

impl Buffer {
    pub fn owned(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            destructor: None,
        }
    }

    pub fn with_destructor(data: Vec<u8>, destructor: Destructor) -> Self {
        Self {
            data: Arc::new(data),
            destructor: Some(destructor),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.data) == 1 {
            if let Some(d) = &self.destructor {
                d();
            }
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer({} bytes)", self.data.len())
    }
}
