//! The runtime instance and per-thread interpreter state.
//!
//! An [`Instance`] is the shared identity of one running VM: it issues
//! thread ids, carries the default spawn attributes, and owns the optional
//! trace writer. A [`ThreadContext`] is the private, mutable interpreter
//! state of exactly one OS thread: its current frame, its entry-frame
//! sentinel, and a handle to its [`ResourcePool`].
//!
//! # Ownership
//!
//! A context is never shared. It is created on the spawning thread, moved by
//! value into the new OS thread, and mutated only there. Nothing on a
//! context needs synchronization; the only cross-thread state in this
//! subsystem lives in frame handles and thread-object state cells.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use crate::{
    runtime::{FrameHandle, Value},
    trace::TraceWriter,
    Error, Result,
};

/// Default byte capacity reserved for a thread's resource pool.
pub const DEFAULT_POOL_CAPACITY: usize = 64 * 1024;

/// Attributes applied when creating a thread.
///
/// The OS-facing fields feed `std::thread::Builder`; the pool capacity
/// sizes the thread's [`ResourcePool`] reservation.
#[derive(Clone, Debug)]
pub struct SpawnAttrs {
    /// OS thread name. Defaults to `vm-thread-<id>` when absent.
    pub name: Option<String>,
    /// OS thread stack size in bytes, if overridden.
    pub stack_size: Option<usize>,
    /// Byte capacity reserved for the thread's resource pool.
    pub pool_capacity: usize,
}

impl Default for SpawnAttrs {
    fn default() -> Self {
        Self {
            name: None,
            stack_size: None,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// A scoped scratch arena bound to one thread's lifetime.
///
/// A plain data holder: the pool reserves its capacity up front and hands
/// out its scratch buffer on request. It carries no allocator behavior of
/// its own beyond that reservation, which is also the one genuinely fallible
/// step of pool construction.
#[derive(Debug)]
pub struct ResourcePool {
    capacity: usize,
    scratch: Mutex<Vec<u8>>,
}

impl ResourcePool {
    /// Creates a pool with the given reserved byte capacity.
    ///
    /// # Errors
    ///
    /// Returns the underlying reservation error if the capacity cannot be
    /// reserved.
    pub fn try_with_capacity(
        capacity: usize,
    ) -> std::result::Result<Self, std::collections::TryReserveError> {
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(capacity)?;
        Ok(Self {
            capacity,
            scratch: Mutex::new(scratch),
        })
    }

    /// Returns the reserved byte capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Locks and returns the pool's scratch buffer.
    pub fn scratch(&self) -> MutexGuard<'_, Vec<u8>> {
        match self.scratch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The shared identity of one running VM instance.
///
/// Every thread context is bound to an instance; contexts created for
/// spawned threads are bound to the same instance as their spawner.
pub struct Instance {
    next_thread_id: AtomicU64,
    default_attrs: SpawnAttrs,
    trace: Option<TraceWriter>,
}

impl Instance {
    /// Creates an instance with default attributes and no tracing.
    #[must_use]
    pub fn new() -> Arc<Instance> {
        Self::builder().build()
    }

    /// Returns a builder for configuring an instance.
    #[must_use]
    pub fn builder() -> InstanceBuilder {
        InstanceBuilder::new()
    }

    /// Returns the default spawn attributes for this instance.
    #[must_use]
    pub fn default_attrs(&self) -> &SpawnAttrs {
        &self.default_attrs
    }

    /// Returns the installed trace writer, if any.
    #[must_use]
    pub fn trace(&self) -> Option<&TraceWriter> {
        self.trace.as_ref()
    }

    pub(crate) fn issue_thread_id(&self) -> u64 {
        self.next_thread_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("next_thread_id", &self.next_thread_id)
            .field("default_attrs", &self.default_attrs)
            .field("tracing", &self.trace.is_some())
            .finish()
    }
}

/// Builder for [`Instance`] configuration.
pub struct InstanceBuilder {
    attrs: SpawnAttrs,
    trace: Option<TraceWriter>,
}

impl InstanceBuilder {
    /// Creates a builder with default attributes and no tracing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attrs: SpawnAttrs::default(),
            trace: None,
        }
    }

    /// Sets the default spawn attributes.
    #[must_use]
    pub fn attrs(mut self, attrs: SpawnAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Installs a trace writer for spawn-lifecycle events.
    #[must_use]
    pub fn trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    /// Builds the instance.
    #[must_use]
    pub fn build(self) -> Arc<Instance> {
        Arc::new(Instance {
            next_thread_id: AtomicU64::new(1),
            default_attrs: self.attrs,
            trace: self.trace,
        })
    }
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Private per-thread interpreter state.
///
/// Holds the mutable substrate the interpreter loop works on: the current
/// frame, the entry-frame sentinel that terminates the loop, and the most
/// recent return value. Exclusively owned by the one OS thread that runs
/// it.
pub struct ThreadContext {
    thread_id: u64,
    instance: Arc<Instance>,
    pool: Arc<ResourcePool>,
    cur_frame: Option<FrameHandle>,
    entry_frame: Option<FrameHandle>,
    last_return: Option<Value>,
}

impl ThreadContext {
    /// Creates a root context bound to the given instance.
    ///
    /// Allocates the context's resource pool with the instance's default
    /// capacity. Root contexts are the ones embedders drive directly;
    /// contexts for spawned threads are created by `spawn` itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolAllocation`] if the pool reservation fails.
    pub fn new(instance: Arc<Instance>) -> Result<Self> {
        let capacity = instance.default_attrs().pool_capacity;
        let pool = ResourcePool::try_with_capacity(capacity).map_err(|source| {
            Error::PoolAllocation {
                requested: capacity,
                source,
            }
        })?;
        Ok(Self::with_pool(instance, Arc::new(pool)))
    }

    /// Creates a context around an already-allocated pool.
    pub(crate) fn with_pool(instance: Arc<Instance>, pool: Arc<ResourcePool>) -> Self {
        let thread_id = instance.issue_thread_id();
        Self {
            thread_id,
            instance,
            pool,
            cur_frame: None,
            entry_frame: None,
            last_return: None,
        }
    }

    /// Returns the VM-level id of this context.
    #[must_use]
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Returns the instance this context belongs to.
    #[must_use]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Returns this context's resource pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    /// Returns the currently executing frame, if any.
    #[must_use]
    pub fn cur_frame(&self) -> Option<&FrameHandle> {
        self.cur_frame.as_ref()
    }

    /// Installs the current frame, taking ownership of the handle.
    pub fn set_cur_frame(&mut self, frame: Option<FrameHandle>) {
        self.cur_frame = frame;
    }

    /// Takes the current frame out of the context.
    pub fn take_cur_frame(&mut self) -> Option<FrameHandle> {
        self.cur_frame.take()
    }

    /// Returns the thread's entry frame, if one has been marked.
    #[must_use]
    pub fn entry_frame(&self) -> Option<&FrameHandle> {
        self.entry_frame.as_ref()
    }

    /// Marks a frame as the thread's entry frame.
    ///
    /// The entry frame is the loop-termination sentinel: a return out of it
    /// ends the thread's interpreter loop instead of resuming a caller.
    pub fn mark_entry_frame(&mut self, frame: FrameHandle) {
        self.entry_frame = Some(frame);
    }

    /// Returns whether the given frame is the marked entry frame.
    #[must_use]
    pub fn is_entry_frame(&self, frame: &FrameHandle) -> bool {
        self.entry_frame
            .as_ref()
            .is_some_and(|entry| entry.same_frame(frame))
    }

    /// Returns the most recent return value recorded by the loop.
    #[must_use]
    pub fn last_return(&self) -> Option<&Value> {
        self.last_return.as_ref()
    }

    /// Records a return value.
    pub fn set_last_return(&mut self, value: Value) {
        self.last_return = Some(value);
    }

    /// Takes the most recent return value.
    pub fn take_last_return(&mut self) -> Option<Value> {
        self.last_return.take()
    }

    /// Drops every frame handle the context holds.
    ///
    /// Releases the current-frame and entry-frame slots; any frames only
    /// those slots were keeping alive are freed, including an inherited
    /// dynamic-scope anchor held through the chain.
    pub fn clear_frames(&mut self) {
        self.cur_frame = None;
        self.entry_frame = None;
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("thread_id", &self.thread_id)
            .field("cur_frame", &self.cur_frame)
            .field("entry_frame", &self.entry_frame)
            .field("pool_capacity", &self.pool.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_issues_distinct_thread_ids() {
        let instance = Instance::new();
        let a = ThreadContext::new(instance.clone()).unwrap();
        let b = ThreadContext::new(instance).unwrap();
        assert_ne!(a.thread_id(), b.thread_id());
    }

    #[test]
    fn test_pool_capacity_reserved() {
        let pool = ResourcePool::try_with_capacity(4096).unwrap();
        assert_eq!(pool.capacity(), 4096);
        assert!(pool.scratch().capacity() >= 4096);
    }

    #[test]
    fn test_pool_reservation_failure() {
        // A reservation of usize::MAX bytes cannot succeed on any target.
        assert!(ResourcePool::try_with_capacity(usize::MAX).is_err());
    }

    #[test]
    fn test_context_pool_failure_is_recoverable_here() {
        let instance = Instance::builder()
            .attrs(SpawnAttrs {
                pool_capacity: usize::MAX,
                ..SpawnAttrs::default()
            })
            .build();
        let err = ThreadContext::new(instance).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::PoolAllocation {
                requested: usize::MAX,
                ..
            }
        ));
    }

    #[test]
    fn test_entry_frame_sentinel() {
        let instance = Instance::new();
        let mut ctx = ThreadContext::new(instance).unwrap();
        let frame = FrameHandle::root("entry");
        let other = FrameHandle::root("other");

        assert!(!ctx.is_entry_frame(&frame));
        ctx.mark_entry_frame(frame.clone());
        assert!(ctx.is_entry_frame(&frame));
        assert!(!ctx.is_entry_frame(&other));
    }

    #[test]
    fn test_clear_frames_releases_holds() {
        let instance = Instance::new();
        let mut ctx = ThreadContext::new(instance).unwrap();
        let frame = FrameHandle::root("anchor");

        ctx.set_cur_frame(Some(frame.clone()));
        ctx.mark_entry_frame(frame.clone());
        assert_eq!(frame.live_holders(), 3);

        ctx.clear_frames();
        assert_eq!(frame.live_holders(), 1);
    }
}
