//! Runtime values, types, and the representation protocol.
//!
//! Every runtime-visible value is an [`Object`] behind a shared
//! [`ObjectHandle`]. What an object can *do* is decided by its type's
//! [`Representation`], the pluggable strategy that defines its core
//! operations:
//!
//! - `allocate` - produce a fresh object of a given type
//! - `invoke` - start executing a callable object, producing a call frame
//!
//! The spawning subsystem only needs three representation kinds: Thread
//! (the objects `spawn` returns), Code (invokable values), and Data (inert
//! values). The builtin [`ThreadRepr`], [`CodeRepr`], and [`DataRepr`]
//! implement them; embedders may supply their own as long as the body an
//! implementation produces matches the kind it reports.

use std::sync::Arc;

use strum::Display;

use crate::{
    runtime::{Frame, FrameHandle, ThreadContext},
    threads::ThreadBody,
    Error, Result,
};

/// A runtime-level value.
///
/// Only the handful of variants the spawning subsystem and its tests need;
/// the full value system of the host runtime is out of scope.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The unit value, returned by code with nothing to say.
    Unit,
    /// A signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
}

bitflags::bitflags! {
    /// Per-argument metadata flags in a call-site descriptor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ArgFlags: u8 {
        /// Argument is an object reference.
        const OBJ = 1;
        /// Argument is a native integer.
        const INT = 1 << 1;
        /// Argument is a native float.
        const NUM = 1 << 2;
        /// Argument is a native string.
        const STR = 1 << 3;
        /// Argument is passed by name rather than position.
        const NAMED = 1 << 4;
        /// Argument is a flattening of a collection into the call.
        const FLAT = 1 << 5;
    }
}

/// Describes the shape of the arguments at one invocation site.
///
/// A call-site carries no argument *values*, only their count and kind; the
/// calling convention that moves values into a frame is an external
/// collaborator. The spawning subsystem only ever builds the zero-argument
/// shape for a thread's first invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    /// One flags entry per argument.
    flags: Vec<ArgFlags>,
    /// How many of the arguments are positional.
    num_pos: usize,
}

impl CallSite {
    /// The call-site shape with no positional or named arguments.
    #[must_use]
    pub fn zero_args() -> Self {
        Self {
            flags: Vec::new(),
            num_pos: 0,
        }
    }

    /// A call-site with the given positional argument flags.
    #[must_use]
    pub fn positional(flags: Vec<ArgFlags>) -> Self {
        let num_pos = flags.len();
        Self { flags, num_pos }
    }

    /// Returns the total argument count.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.flags.len()
    }

    /// Returns the positional argument count.
    #[must_use]
    pub fn num_pos(&self) -> usize {
        self.num_pos
    }

    /// Returns the per-argument flags.
    #[must_use]
    pub fn flags(&self) -> &[ArgFlags] {
        &self.flags
    }
}

/// The kind of a representation, checked before kind-specific operations.
#[derive(Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReprKind {
    /// Objects wrapping a spawned thread.
    Thread,
    /// Invokable code objects.
    Code,
    /// Inert data objects.
    Data,
}

/// The pluggable strategy defining an object's core operations.
///
/// A representation is shared by every object of the types that use it, so
/// implementations hold no per-object state and must be safe to call from
/// any thread.
pub trait Representation: Send + Sync {
    /// Returns the kind of this representation.
    fn kind(&self) -> ReprKind;

    /// Allocates a fresh object of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationUnsupported`] if objects of this
    /// representation cannot be conjured from a type alone.
    fn allocate(&self, ty: &TypeHandle) -> Result<ObjectHandle>;

    /// Begins executing a callable object, producing its call frame.
    ///
    /// On success the new frame has been installed as the context's current
    /// frame, with the previous current frame as its caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInvokable`] if this representation has no invoke
    /// semantics, or [`Error::CallsiteArity`] if the call-site shape is not
    /// accepted.
    fn invoke(
        &self,
        ctx: &mut ThreadContext,
        callable: &ObjectHandle,
        callsite: &CallSite,
    ) -> Result<FrameHandle>;
}

/// A shared handle to a runtime type.
///
/// The type pairs a name with the [`Representation`] its objects use.
#[derive(Clone)]
pub struct TypeHandle(Arc<TypeSpec>);

struct TypeSpec {
    name: String,
    repr: Arc<dyn Representation>,
}

impl TypeHandle {
    /// Creates a type with the given name and representation.
    #[must_use]
    pub fn new(name: impl Into<String>, repr: Arc<dyn Representation>) -> Self {
        Self(Arc::new(TypeSpec {
            name: name.into(),
            repr,
        }))
    }

    /// Returns the type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the type's representation.
    #[must_use]
    pub fn repr(&self) -> &Arc<dyn Representation> {
        &self.0.repr
    }
}

impl std::fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandle")
            .field("name", &self.0.name)
            .field("repr", &self.0.repr.kind())
            .finish()
    }
}

/// Creates a type using the builtin Thread representation.
#[must_use]
pub fn thread_type(name: &str) -> TypeHandle {
    TypeHandle::new(name, Arc::new(ThreadRepr))
}

/// Creates a type using the builtin Data representation.
#[must_use]
pub fn data_type(name: &str) -> TypeHandle {
    TypeHandle::new(name, Arc::new(DataRepr))
}

/// A shared handle to a runtime object.
pub type ObjectHandle = Arc<Object>;

/// A runtime-visible object: a type handle plus a kind-specific body.
pub struct Object {
    ty: TypeHandle,
    body: ObjectBody,
}

impl Object {
    pub(crate) fn with_body(ty: TypeHandle, body: ObjectBody) -> ObjectHandle {
        Arc::new(Self { ty, body })
    }

    /// Returns the object's type.
    #[must_use]
    pub fn ty(&self) -> &TypeHandle {
        &self.ty
    }

    /// Returns the object's body.
    #[must_use]
    pub fn body(&self) -> &ObjectBody {
        &self.body
    }

    /// Returns the thread body if this is a thread object.
    #[must_use]
    pub fn as_thread(&self) -> Option<&ThreadBody> {
        match &self.body {
            ObjectBody::Thread(body) => Some(body),
            _ => None,
        }
    }

    /// Returns the code body if this is a code object.
    #[must_use]
    pub fn as_code(&self) -> Option<&CodeBody> {
        match &self.body {
            ObjectBody::Code(body) => Some(body),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("ty", &self.ty)
            .field("kind", &self.ty.repr().kind())
            .finish_non_exhaustive()
    }
}

/// The kind-specific payload of an [`Object`].
pub enum ObjectBody {
    /// A spawned thread: lifecycle state, resource pool, parked OS handle.
    Thread(ThreadBody),
    /// Invokable code.
    Code(CodeBody),
    /// Inert data.
    Data,
}

/// The native function type backing a code object.
pub type NativeFn = Box<dyn Fn(&mut ThreadContext) -> Result<Value> + Send + Sync>;

/// The body of an invokable code object.
///
/// Stands in for a compiled code object: the function runs to completion in
/// a single interpreter step. Bytecode dispatch is an external collaborator.
pub struct CodeBody {
    name: String,
    body: NativeFn,
}

impl CodeBody {
    /// Returns the code object's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the native body to completion on the given context.
    ///
    /// # Errors
    ///
    /// Propagates whatever the native body returns.
    pub fn run(&self, ctx: &mut ThreadContext) -> Result<Value> {
        (self.body)(ctx)
    }
}

/// Creates a code object wrapping a native function.
#[must_use]
pub fn native_code<F>(name: &str, body: F) -> ObjectHandle
where
    F: Fn(&mut ThreadContext) -> Result<Value> + Send + Sync + 'static,
{
    let ty = TypeHandle::new(name, Arc::new(CodeRepr));
    Object::with_body(
        ty,
        ObjectBody::Code(CodeBody {
            name: name.to_string(),
            body: Box::new(body),
        }),
    )
}

/// Builtin representation for thread objects.
pub struct ThreadRepr;

impl Representation for ThreadRepr {
    fn kind(&self) -> ReprKind {
        ReprKind::Thread
    }

    fn allocate(&self, ty: &TypeHandle) -> Result<ObjectHandle> {
        Ok(Object::with_body(
            ty.clone(),
            ObjectBody::Thread(ThreadBody::new()),
        ))
    }

    fn invoke(
        &self,
        _ctx: &mut ThreadContext,
        _callable: &ObjectHandle,
        _callsite: &CallSite,
    ) -> Result<FrameHandle> {
        Err(Error::NotInvokable {
            found: ReprKind::Thread,
        })
    }
}

/// Builtin representation for invokable code objects.
pub struct CodeRepr;

impl Representation for CodeRepr {
    fn kind(&self) -> ReprKind {
        ReprKind::Code
    }

    fn allocate(&self, _ty: &TypeHandle) -> Result<ObjectHandle> {
        // Code bodies cannot be conjured from a type; they come from
        // `native_code` (or, in the full runtime, from compilation).
        Err(Error::AllocationUnsupported {
            kind: ReprKind::Code,
        })
    }

    fn invoke(
        &self,
        ctx: &mut ThreadContext,
        callable: &ObjectHandle,
        callsite: &CallSite,
    ) -> Result<FrameHandle> {
        let Some(code) = callable.as_code() else {
            return Err(Error::ReprBodyMismatch {
                type_name: callable.ty().name().to_string(),
            });
        };
        if callsite.arg_count() != 0 {
            return Err(Error::CallsiteArity {
                found: callsite.arg_count(),
            });
        }

        // The previous current frame moves into the new frame's caller
        // link; the frame chain holds it alive, not the context slot.
        let caller = ctx.take_cur_frame();
        let frame = FrameHandle::new(Frame::new(
            code.name().to_string(),
            Some(callable.clone()),
            caller,
        ));
        ctx.set_cur_frame(Some(frame.clone()));
        Ok(frame)
    }
}

/// Builtin representation for inert data objects.
pub struct DataRepr;

impl Representation for DataRepr {
    fn kind(&self) -> ReprKind {
        ReprKind::Data
    }

    fn allocate(&self, ty: &TypeHandle) -> Result<ObjectHandle> {
        Ok(Object::with_body(ty.clone(), ObjectBody::Data))
    }

    fn invoke(
        &self,
        _ctx: &mut ThreadContext,
        _callable: &ObjectHandle,
        _callsite: &CallSite,
    ) -> Result<FrameHandle> {
        Err(Error::NotInvokable {
            found: ReprKind::Data,
        })
    }
}
