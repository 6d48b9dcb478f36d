//! The minimal runtime substrate the spawning subsystem executes against.
//!
//! The thread spawner does not exist in a vacuum: it allocates objects
//! through a representation protocol, anchors new threads to call frames,
//! and drives a per-thread interpreter loop. This module provides those
//! seams at the smallest size that keeps the subsystem honest:
//!
//! - [`value`](self) types - [`Value`], [`Object`]/[`ObjectHandle`], the
//!   [`Representation`] trait with its builtin Thread/Code/Data
//!   implementations, and [`CallSite`] descriptors
//! - [`FrameHandle`] - shared, counted call-frame ownership that crosses
//!   thread boundaries
//! - [`Instance`] / [`ThreadContext`] - the shared VM identity and the
//!   per-thread mutable interpreter state
//! - [`interp`] - the per-thread loop with its entry-frame sentinel
//!
//! Everything richer (bytecode dispatch, a real calling convention, garbage
//! collection) is an external collaborator and deliberately absent.

mod context;
mod frame;
pub mod interp;
mod value;

pub use context::{
    Instance, InstanceBuilder, ResourcePool, SpawnAttrs, ThreadContext, DEFAULT_POOL_CAPACITY,
};
pub use frame::{DynamicChain, FrameHandle};
pub(crate) use frame::Frame;
pub use value::{
    data_type, native_code, thread_type, ArgFlags, CallSite, CodeBody, CodeRepr, DataRepr,
    NativeFn, Object, ObjectBody, ObjectHandle, ReprKind, Representation, ThreadRepr, TypeHandle,
    Value,
};
