//! Call frames and their shared cross-thread ownership.
//!
//! A frame is one activation record of runtime-level execution. Frames form a
//! chain through their caller links, and that chain doubles as the dynamic
//! scope a thread resolves names against. Because a spawned thread inherits
//! the spawning frame as its scope anchor, frames can be held by more than
//! one OS thread at a time; [`FrameHandle`] makes that sharing explicit.
//!
//! # Ownership Model
//!
//! A frame's lifetime is governed by the number of live [`FrameHandle`]s
//! pointing at it. Cloning a handle extends the frame's lifetime; dropping
//! one releases that hold. The count updates are atomic, so handles may be
//! cloned and dropped freely across threads. There is no way to release a
//! hold twice or to forget one: the release is tied to handle drop.

use std::fmt;
use std::sync::Arc;

use crate::runtime::ObjectHandle;

/// One activation record of runtime-level execution.
///
/// Carries the code being executed (absent for synthetic anchor frames), a
/// label for diagnostics, and the caller link that forms the dynamic-scope
/// chain.
pub(crate) struct Frame {
    /// Diagnostic label, usually the name of the code the frame runs.
    label: String,

    /// The code object this frame executes. Synthetic root frames have none.
    code: Option<ObjectHandle>,

    /// The frame this one returns into; also the next dynamic scope out.
    caller: Option<FrameHandle>,
}

impl Frame {
    pub(crate) fn new(
        label: String,
        code: Option<ObjectHandle>,
        caller: Option<FrameHandle>,
    ) -> Self {
        Self {
            label,
            code,
            caller,
        }
    }
}

/// A shared, counted handle to a [`Frame`].
///
/// Cloning is the lifetime *extension* a spawner performs before handing the
/// frame to a child thread; dropping is the *release* the child performs when
/// its interpreter loop ends. Both are atomic and safe to perform from any
/// thread.
#[derive(Clone)]
pub struct FrameHandle(Arc<Frame>);

impl FrameHandle {
    pub(crate) fn new(frame: Frame) -> Self {
        Self(Arc::new(frame))
    }

    /// Creates a synthetic root frame with no code and no caller.
    ///
    /// Used as the dynamic-scope anchor of a context that is not itself
    /// driven by an interpreter loop, such as an embedder's main context.
    #[must_use]
    pub fn root(label: &str) -> Self {
        Self::new(Frame::new(label.to_string(), None, None))
    }

    /// Returns the frame's diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Returns the code object this frame executes, if any.
    #[must_use]
    pub fn code(&self) -> Option<&ObjectHandle> {
        self.0.code.as_ref()
    }

    /// Returns the caller link, the next frame out in the dynamic scope.
    #[must_use]
    pub fn caller(&self) -> Option<&FrameHandle> {
        self.0.caller.as_ref()
    }

    /// Returns whether two handles refer to the same frame.
    #[must_use]
    pub fn same_frame(&self, other: &FrameHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the number of live holders of this frame.
    ///
    /// Reflects every handle currently in existence: the owner's, plus one
    /// per in-flight child thread that inherited the frame as its scope
    /// anchor. Intended for diagnostics and tests; the value is already
    /// stale by the time it is returned if other threads are releasing.
    #[must_use]
    pub fn live_holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Iterates the dynamic-scope chain from this frame outward.
    ///
    /// The iteration starts with this frame itself and follows caller links.
    pub fn dynamic_chain(&self) -> DynamicChain<'_> {
        DynamicChain {
            next: Some(self),
        }
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("label", &self.0.label)
            .field("has_code", &self.0.code.is_some())
            .field("has_caller", &self.0.caller.is_some())
            .field("live_holders", &self.live_holders())
            .finish()
    }
}

/// Iterator over a frame's dynamic-scope chain, innermost first.
///
/// Created by [`FrameHandle::dynamic_chain`].
pub struct DynamicChain<'a> {
    next: Option<&'a FrameHandle>,
}

impl<'a> Iterator for DynamicChain<'a> {
    type Item = &'a FrameHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.caller();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_frame() {
        let root = FrameHandle::root("main");
        assert_eq!(root.label(), "main");
        assert!(root.code().is_none());
        assert!(root.caller().is_none());
        assert_eq!(root.live_holders(), 1);
    }

    #[test]
    fn test_clone_extends_and_drop_releases() {
        let root = FrameHandle::root("main");
        let held = root.clone();
        assert_eq!(root.live_holders(), 2);
        drop(held);
        assert_eq!(root.live_holders(), 1);
    }

    #[test]
    fn test_same_frame_identity() {
        let a = FrameHandle::root("a");
        let b = FrameHandle::root("a");
        assert!(a.same_frame(&a.clone()));
        assert!(!a.same_frame(&b));
    }

    #[test]
    fn test_dynamic_chain_walks_caller_links() {
        let outer = FrameHandle::root("outer");
        let inner = FrameHandle::new(Frame::new(
            "inner".to_string(),
            None,
            Some(outer.clone()),
        ));

        let labels: Vec<&str> = inner.dynamic_chain().map(FrameHandle::label).collect();
        assert_eq!(labels, vec!["inner", "outer"]);
    }

    #[test]
    fn test_caller_link_holds_frame_alive() {
        let outer = FrameHandle::root("outer");
        let inner = FrameHandle::new(Frame::new(
            "inner".to_string(),
            None,
            Some(outer.clone()),
        ));
        assert_eq!(outer.live_holders(), 2);
        drop(inner);
        assert_eq!(outer.live_holders(), 1);
    }
}
