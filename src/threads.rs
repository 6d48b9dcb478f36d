//! Thread spawning: starting an OS thread that executes a runtime callable.
//!
//! This is the core of the crate. [`spawn`] validates a spawn request,
//! builds the new thread's private state, extends the lifetime of the
//! spawning frame so the child can use it as its dynamic-scope anchor, and
//! asks the OS for a thread. The new thread runs [`thread_bootstrap`]: it
//! wires the inherited anchor into its context, drives a fresh interpreter
//! loop bootstrapped by [`entry_trampoline`], and releases the anchor when
//! the loop ends.
//!
//! # Anchor Lifetime
//!
//! The spawning thread's current frame must survive for as long as the
//! child might resolve names against it, and there is no promise the child
//! runs before the spawning code returns. `spawn` therefore clones the
//! frame's handle immediately before thread creation; the clone travels
//! into the child inside the [`StartRequest`] and moves into the child's
//! frame chain at bootstrap. When the child's loop terminates - naturally
//! or through an abrupt exit - the chain is dropped and the hold is
//! released, exactly once. The handle's atomic counting makes the
//! clone-before-create / drop-after-loop ordering the only synchronization
//! this subsystem needs.
//!
//! # Failure Channels
//!
//! Spawn validation failures are recoverable [`Error`]s raised before any
//! side effect. Resource-pool or OS thread-creation failures mid-spawn are
//! fatal faults (see [`crate::fault`]): at that point a partially
//! constructed thread object exists and cannot be safely unwound.
//!
//! # What This Module Does Not Do
//!
//! No join, no cancellation, no thread registry. A spawned thread's OS
//! handle is parked on its [`ThreadBody`] for a higher-level registry to
//! take; nothing here ever waits on it.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, OnceLock,
};
use std::thread::{self, JoinHandle};

use strum::{Display, FromRepr};

use crate::{
    fault::{self, FaultKind},
    runtime::{
        interp, CallSite, FrameHandle, ObjectHandle, ReprKind, ResourcePool, SpawnAttrs,
        ThreadContext, TypeHandle,
    },
    trace::TraceEvent,
    Error, Result,
};

/// Lifecycle state of a spawned thread object.
///
/// # State Transitions
///
/// ```text
/// Created -> Starting -> Running -> Finished
/// ```
///
/// `Created` covers the window between allocation and the thread-creation
/// request; `Starting` the window until the OS thread begins executing;
/// `Running` the interpreter loop; `Finished` means the loop has returned
/// and the inherited anchor frame has been released. There is no cancelled
/// state: abrupt external termination is not supported by this subsystem.
#[derive(Display, FromRepr, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SpawnState {
    /// Allocated; context built; OS thread not yet requested.
    Created = 0,
    /// OS thread-creation call in flight.
    Starting = 1,
    /// OS thread executing the interpreter loop.
    Running = 2,
    /// Interpreter loop returned; anchor frame reference released.
    Finished = 3,
}

/// The body of a thread object: lifecycle state, resource pool, and the
/// parked OS thread handle.
///
/// Created through the Thread representation's allocate operation and
/// filled in by [`spawn`]. The state cell is shared with the spawned OS
/// thread, which advances it to `Running` and finally `Finished`; every
/// other field is written once on the spawning thread.
pub struct ThreadBody {
    /// Lifecycle state, shared with the spawned OS thread.
    state: Arc<AtomicU8>,
    /// VM-level id of the thread's context.
    vm_thread_id: OnceLock<u64>,
    /// The resource pool scoped to this thread object's lifetime.
    pool: OnceLock<Arc<ResourcePool>>,
    /// The OS thread handle, parked for a higher-level registry.
    os_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadBody {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(SpawnState::Created as u8)),
            vm_thread_id: OnceLock::new(),
            pool: OnceLock::new(),
            os_handle: Mutex::new(None),
        }
    }

    /// Returns the thread's current lifecycle state.
    ///
    /// `Finished` additionally guarantees that the thread's hold on the
    /// inherited anchor frame has been released: the release is ordered
    /// before the state store.
    #[must_use]
    pub fn state(&self) -> SpawnState {
        SpawnState::from_repr(self.state.load(Ordering::Acquire)).unwrap_or(SpawnState::Created)
    }

    /// Returns the VM-level id of the thread's context, once assigned.
    #[must_use]
    pub fn vm_thread_id(&self) -> Option<u64> {
        self.vm_thread_id.get().copied()
    }

    /// Returns the thread's resource pool, once allocated.
    #[must_use]
    pub fn pool(&self) -> Option<&Arc<ResourcePool>> {
        self.pool.get()
    }

    /// Takes the parked OS thread handle, leaving `None`.
    ///
    /// Intended for the thread-registry layer that owns join/teardown;
    /// this subsystem never joins. Returns `None` if the handle was
    /// already taken or the thread was never started.
    pub fn take_os_handle(&self) -> Option<JoinHandle<()>> {
        match self.os_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn set_state(&self, state: SpawnState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state_cell(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.state)
    }

    fn record_vm_thread_id(&self, id: u64) {
        let _ = self.vm_thread_id.set(id);
    }

    fn install_pool(&self, pool: Arc<ResourcePool>) {
        let _ = self.pool.set(pool);
    }

    fn park_os_handle(&self, handle: JoinHandle<()>) {
        match self.os_handle.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }
}

impl std::fmt::Debug for ThreadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadBody")
            .field("state", &self.state())
            .field("vm_thread_id", &self.vm_thread_id())
            .finish_non_exhaustive()
    }
}

/// Everything the new OS thread needs, moved across the thread boundary.
///
/// Exists only between the thread-creation call and the start of
/// [`thread_bootstrap`], which takes its fields apart. The anchor handle
/// inside is the cloned lifetime extension of the spawning frame.
struct StartRequest {
    /// The new thread's private interpreter state.
    context: ThreadContext,
    /// The inherited dynamic-scope anchor, already lifetime-extended.
    anchor: FrameHandle,
    /// The callable the new thread will invoke.
    invokee: ObjectHandle,
}

/// Spawns a thread using the instance's default attributes.
///
/// See [`spawn_with_attrs`] for the full contract.
///
/// # Errors
///
/// As for [`spawn_with_attrs`].
pub fn spawn(
    ctx: &ThreadContext,
    invokee: &ObjectHandle,
    result_type: &TypeHandle,
) -> Result<ObjectHandle> {
    let attrs = ctx.instance().default_attrs().clone();
    spawn_with_attrs(ctx, invokee, result_type, &attrs)
}

/// Spawns an OS thread that invokes `invokee` on a fresh interpreter loop.
///
/// The returned thread object wraps the new thread's lifecycle state,
/// resource pool, and parked OS handle; it is allocated through
/// `result_type`'s representation, which must be of the Thread kind. The
/// call returns as soon as thread creation has been requested; it never
/// waits for the child to run.
///
/// On success, exactly one lifetime extension of the caller's current
/// frame has been handed to the child thread; the child releases it when
/// its interpreter loop terminates.
///
/// # Errors
///
/// - [`Error::ThreadReprRequired`] if `result_type` is not of the Thread
///   representation kind. No side effects have occurred.
/// - [`Error::NoAnchorFrame`] if `ctx` has no current frame to inherit.
///   No side effects have occurred.
/// - [`Error::ReprBodyMismatch`] if the representation allocated a
///   non-thread body despite reporting the Thread kind.
///
/// # Fatal Faults
///
/// Resource-pool allocation failure and OS thread-creation failure abort
/// the process through [`fault::fatal`]; see the module documentation.
pub fn spawn_with_attrs(
    ctx: &ThreadContext,
    invokee: &ObjectHandle,
    result_type: &TypeHandle,
    attrs: &SpawnAttrs,
) -> Result<ObjectHandle> {
    let kind = result_type.repr().kind();
    if kind != ReprKind::Thread {
        return Err(Error::ThreadReprRequired { found: kind });
    }
    let anchor_source = ctx.cur_frame().ok_or(Error::NoAnchorFrame)?;

    let child_obj = result_type.repr().allocate(result_type)?;
    let Some(body) = child_obj.as_thread() else {
        return Err(Error::ReprBodyMismatch {
            type_name: result_type.name().to_string(),
        });
    };

    let instance = Arc::clone(ctx.instance());
    let pool = match ResourcePool::try_with_capacity(attrs.pool_capacity) {
        Ok(pool) => Arc::new(pool),
        Err(err) => fault::fatal(
            instance.trace(),
            FaultKind::PoolAllocation,
            &format!(
                "could not reserve {} bytes for thread resource pool: {err}",
                attrs.pool_capacity
            ),
        ),
    };
    body.install_pool(Arc::clone(&pool));

    let child_ctx = ThreadContext::with_pool(Arc::clone(&instance), pool);
    let child_id = child_ctx.thread_id();
    body.record_vm_thread_id(child_id);

    let thread_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| format!("vm-thread-{child_id}"));
    let mut builder = thread::Builder::new().name(thread_name.clone());
    if let Some(bytes) = attrs.stack_size {
        builder = builder.stack_size(bytes);
    }

    if let Some(tracer) = instance.trace() {
        tracer.write(TraceEvent::Spawned {
            thread_id: child_id,
            name: thread_name,
        });
    }

    let state = body.state_cell();
    body.set_state(SpawnState::Starting);

    // The anchor clone is the lifetime extension handed to the child. It
    // happens last, immediately before the create call, so a fault above
    // this point cannot leave an orphaned hold.
    let request = StartRequest {
        context: child_ctx,
        anchor: anchor_source.clone(),
        invokee: Arc::clone(invokee),
    };
    match builder.spawn(move || thread_bootstrap(request, state)) {
        Ok(handle) => body.park_os_handle(handle),
        Err(err) => fault::fatal(
            instance.trace(),
            FaultKind::ThreadCreate,
            &format!("could not spawn thread: {err}"),
        ),
    }

    Ok(child_obj)
}

/// The function the new OS thread runs.
///
/// Installs the inherited anchor as the context's current frame, drives
/// the interpreter loop with [`entry_trampoline`] as its one-shot
/// bootstrap, then releases the anchor hold and advances the state cell to
/// `Finished`. Nothing is returned to any other thread.
fn thread_bootstrap(request: StartRequest, state: Arc<AtomicU8>) {
    let StartRequest {
        mut context,
        anchor,
        invokee,
    } = request;
    state.store(SpawnState::Running as u8, Ordering::Release);

    let thread_id = context.thread_id();
    if let Some(tracer) = context.instance().trace() {
        tracer.write(TraceEvent::BootstrapEntered {
            thread_id,
            anchor: anchor.label().to_string(),
        });
    }

    // The inherited anchor becomes the dynamic scope this thread executes
    // within; ownership moves into the context's frame slot and from
    // there into the entry frame's caller link.
    context.set_cur_frame(Some(anchor));

    let outcome = interp::run(&mut context, |ctx| entry_trampoline(ctx, &invokee));

    if let Some(tracer) = context.instance().trace() {
        tracer.write(TraceEvent::LoopExited {
            thread_id,
            clean: outcome.is_ok(),
        });
    }

    // Release this thread's hold on the inherited frame chain, then make
    // the release visible before anyone can observe Finished.
    context.clear_frames();
    if let Some(tracer) = context.instance().trace() {
        tracer.write(TraceEvent::AnchorReleased { thread_id });
    }
    drop(context);
    state.store(SpawnState::Finished as u8, Ordering::Release);
}

/// The one-shot bootstrap callback for a spawned thread's interpreter loop.
///
/// Performs the thread's first invocation with a zero-argument call-site
/// and marks the resulting frame as the thread's entry frame, so that a
/// return out of it ends the loop - and the thread - instead of resuming a
/// caller.
fn entry_trampoline(ctx: &mut ThreadContext, invokee: &ObjectHandle) -> Result<()> {
    let callsite = CallSite::zero_args();
    let frame = invokee.ty().repr().invoke(ctx, invokee, &callsite)?;
    ctx.mark_entry_frame(frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{native_code, Instance, Value};

    #[test]
    fn test_spawn_state_from_repr() {
        assert_eq!(SpawnState::from_repr(0), Some(SpawnState::Created));
        assert_eq!(SpawnState::from_repr(3), Some(SpawnState::Finished));
        assert_eq!(SpawnState::from_repr(9), None);
    }

    #[test]
    fn test_thread_body_initial_state() {
        let body = ThreadBody::new();
        assert_eq!(body.state(), SpawnState::Created);
        assert!(body.vm_thread_id().is_none());
        assert!(body.pool().is_none());
        assert!(body.take_os_handle().is_none());
    }

    #[test]
    fn test_entry_trampoline_marks_entry_frame() {
        let instance = Instance::new();
        let mut ctx = ThreadContext::new(instance).unwrap();
        ctx.set_cur_frame(Some(FrameHandle::root("spawner")));

        let code = native_code("thread-main", |_ctx| Ok(Value::Unit));
        entry_trampoline(&mut ctx, &code).unwrap();

        let entry = ctx.entry_frame().expect("entry frame marked");
        assert_eq!(entry.label(), "thread-main");
        assert!(ctx.cur_frame().unwrap().same_frame(entry));
        // The previous current frame became the entry frame's caller.
        assert_eq!(entry.caller().unwrap().label(), "spawner");
    }

    #[test]
    fn test_entry_trampoline_rejects_non_invokable() {
        let instance = Instance::new();
        let mut ctx = ThreadContext::new(instance).unwrap();
        ctx.set_cur_frame(Some(FrameHandle::root("spawner")));

        let ty = crate::runtime::data_type("Str");
        let data = ty.repr().allocate(&ty).unwrap();
        let err = entry_trampoline(&mut ctx, &data).unwrap_err();
        assert!(matches!(
            err,
            Error::NotInvokable {
                found: ReprKind::Data
            }
        ));
    }
}
