//! Write-once memo buffers and the handles that reach them

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of one memo buffer. Plans deduplicate work by this id and
/// use it as the dependency key between items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lazily populated storage for one materialized result.
///
/// Starts empty and is populated exactly once; it is never reset.
#[derive(Debug)]
pub struct MemoBuffer {
    id: BufferId,
    slot: RwLock<Option<Arc<Tensor>>>,
}

impl MemoBuffer {
    /// An empty buffer waiting for its work item.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: BufferId::next(),
            slot: RwLock::new(None),
        })
    }

    /// A buffer that already holds `data`, as leaf values do.
    pub fn populated(data: Tensor) -> Arc<Self> {
        Arc::new(Self {
            id: BufferId::next(),
            slot: RwLock::new(Some(Arc::new(data))),
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn is_evaluated(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Write side of the buffer. Never computes anything.
    pub fn handle(self: &Arc<Self>) -> Handle {
        Handle {
            buffer: Arc::clone(self),
        }
    }

    /// Read side of the buffer. Never computes anything.
    pub fn const_handle(self: &Arc<Self>) -> ConstHandle {
        ConstHandle {
            buffer: Arc::clone(self),
        }
    }

    fn set_data(&self, data: Tensor) {
        let mut slot = self.slot.write();
        assert!(slot.is_none(), "memo buffer {} populated twice", self.id);
        *slot = Some(Arc::new(data));
    }

    /// Populate the buffer unless something already did; `false` if it was full.
    fn try_set_data(&self, data: Tensor) -> bool {
        let mut slot = self.slot.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Arc::new(data));
        true
    }

    fn try_data(&self) -> Option<Arc<Tensor>> {
        self.slot.read().clone()
    }
}

/// Mutable handle: the one thing a work item writes its result through.
#[derive(Debug, Clone)]
pub struct Handle {
    buffer: Arc<MemoBuffer>,
}

impl Handle {
    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    pub fn is_evaluated(&self) -> bool {
        self.buffer.is_evaluated()
    }

    /// Populate the buffer.
    ///
    /// # Panics
    ///
    /// If the buffer was already populated. Plans deduplicate items by output
    /// buffer, so this only fires when that bookkeeping is broken.
    pub fn set_data(&self, data: Tensor) {
        self.buffer.set_data(data);
    }

    /// Populate the buffer if it is still empty. Returns whether this call
    /// wrote it.
    pub fn try_set_data(&self, data: Tensor) -> bool {
        self.buffer.try_set_data(data)
    }

    pub fn to_const(&self) -> ConstHandle {
        self.buffer.const_handle()
    }
}

/// Read-only handle onto a (possibly not yet populated) buffer.
#[derive(Debug, Clone)]
pub struct ConstHandle {
    buffer: Arc<MemoBuffer>,
}

impl ConstHandle {
    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    pub fn is_evaluated(&self) -> bool {
        self.buffer.is_evaluated()
    }

    /// The materialized value.
    ///
    /// # Panics
    ///
    /// If the buffer has not been populated yet.
    pub fn data(&self) -> Arc<Tensor> {
        match self.buffer.try_data() {
            Some(data) => data,
            None => panic!("memo buffer {} read before evaluation", self.id()),
        }
    }

    pub fn try_data(&self) -> Option<Arc<Tensor>> {
        self.buffer.try_data()
    }
}
