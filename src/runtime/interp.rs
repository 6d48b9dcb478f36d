//! The per-thread interpreter loop.
//!
//! Every OS thread that executes runtime-level code drives its own loop.
//! The loop is entered through [`run`] with a one-shot bootstrap callback
//! that performs the first invocation and marks the resulting frame as the
//! thread's *entry frame*. From then on the loop executes the current frame
//! and unwinds along caller links, until a return out of the entry frame
//! ends the loop, and with it the thread's runtime-level execution.
//!
//! General bytecode dispatch is an external collaborator; here a frame's
//! code runs to completion in a single step. The loop's contribution is the
//! frame walk and the entry-frame sentinel, which is exactly the part the
//! spawning subsystem depends on.

use crate::{
    runtime::{FrameHandle, ObjectBody, ThreadContext, Value},
    Error, Result,
};

/// Runs a thread's interpreter loop to completion.
///
/// `bootstrap` is invoked exactly once, immediately, and must leave the
/// context with a marked entry frame; the loop refuses to run otherwise.
/// The loop then executes frames until control returns out of the entry
/// frame, at which point the loop terminates rather than resuming an
/// enclosing frame. The entry frame's return value remains available via
/// [`ThreadContext::last_return`].
///
/// # Errors
///
/// Returns [`Error::EntryFrameNotMarked`] if the bootstrap callback marks
/// no entry frame, or propagates the first error raised by a frame's code
/// (the thread-level equivalent of an unhandled abrupt exit).
pub fn run<F>(ctx: &mut ThreadContext, bootstrap: F) -> Result<()>
where
    F: FnOnce(&mut ThreadContext) -> Result<()>,
{
    bootstrap(ctx)?;
    if ctx.entry_frame().is_none() {
        return Err(Error::EntryFrameNotMarked);
    }

    while let Some(frame) = ctx.cur_frame().cloned() {
        let ret = execute_frame(ctx, &frame)?;
        ctx.set_last_return(ret);

        // Returning out of the entry frame ends the thread's execution;
        // the frame beneath it belongs to the spawning thread.
        if ctx.is_entry_frame(&frame) {
            break;
        }
        ctx.set_cur_frame(frame.caller().cloned());
    }
    Ok(())
}

/// Executes one frame's code to completion.
fn execute_frame(ctx: &mut ThreadContext, frame: &FrameHandle) -> Result<Value> {
    let Some(code) = frame.code().cloned() else {
        return Err(Error::InertFrame {
            label: frame.label().to_string(),
        });
    };
    match code.body() {
        ObjectBody::Code(body) => body.run(ctx),
        _ => Err(Error::NotInvokable {
            found: code.ty().repr().kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::runtime::{native_code, CallSite, Instance};

    fn context() -> ThreadContext {
        ThreadContext::new(Instance::new()).unwrap()
    }

    fn invoke_and_mark_entry(
        ctx: &mut ThreadContext,
        code: &crate::runtime::ObjectHandle,
    ) -> Result<()> {
        let frame = code
            .ty()
            .repr()
            .invoke(ctx, code, &CallSite::zero_args())?;
        ctx.mark_entry_frame(frame);
        Ok(())
    }

    #[test]
    fn test_run_executes_entry_frame_once() {
        let mut ctx = context();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_body = hits.clone();
        let code = native_code("entry", move |_ctx| {
            hits_in_body.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(99))
        });

        run(&mut ctx, |ctx| invoke_and_mark_entry(ctx, &code)).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.last_return(), Some(&Value::Int(99)));
    }

    #[test]
    fn test_run_does_not_execute_frames_beneath_entry() {
        let mut ctx = context();
        let outer_hits = Arc::new(AtomicUsize::new(0));
        let outer_hits_in_body = outer_hits.clone();
        let outer = native_code("outer", move |_ctx| {
            outer_hits_in_body.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        });

        // Install an invokable frame beneath the entry frame. A return out
        // of the entry frame must end the loop without running it.
        let outer_frame = outer
            .ty()
            .repr()
            .invoke(&mut ctx, &outer, &CallSite::zero_args())
            .unwrap();
        assert_eq!(outer_frame.label(), "outer");

        let inner = native_code("inner", |_ctx| Ok(Value::Unit));
        run(&mut ctx, |ctx| invoke_and_mark_entry(ctx, &inner)).unwrap();

        assert_eq!(outer_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_unwinds_to_caller_below_non_entry_frames() {
        let mut ctx = context();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        // An entry frame invoked on top of another runnable frame, with the
        // *outer* frame marked as entry: the loop should execute inner, then
        // unwind and execute outer, then stop.
        let order_outer = order.clone();
        let outer = native_code("outer", move |_ctx| {
            order_outer.lock().unwrap().push("outer");
            Ok(Value::Unit)
        });
        let outer_frame = outer
            .ty()
            .repr()
            .invoke(&mut ctx, &outer, &CallSite::zero_args())
            .unwrap();

        let order_inner = order.clone();
        let inner = native_code("inner", move |_ctx| {
            order_inner.lock().unwrap().push("inner");
            Ok(Value::Unit)
        });

        run(&mut ctx, |ctx| {
            ctx.mark_entry_frame(outer_frame.clone());
            inner
                .ty()
                .repr()
                .invoke(ctx, &inner, &CallSite::zero_args())?;
            Ok(())
        })
        .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_run_requires_entry_frame() {
        let mut ctx = context();
        let err = run(&mut ctx, |_ctx| Ok(())).unwrap_err();
        assert!(matches!(err, Error::EntryFrameNotMarked));
    }

    #[test]
    fn test_run_propagates_bootstrap_error() {
        let mut ctx = context();
        let err = run(&mut ctx, |_ctx| Err(Error::NoAnchorFrame)).unwrap_err();
        assert!(matches!(err, Error::NoAnchorFrame));
    }

    #[test]
    fn test_run_propagates_abrupt_exit() {
        let mut ctx = context();
        let code = native_code("failing", |_ctx| {
            Err(Error::InertFrame {
                label: "simulated".to_string(),
            })
        });

        let err = run(&mut ctx, |ctx| invoke_and_mark_entry(ctx, &code)).unwrap_err();
        assert!(matches!(err, Error::InertFrame { .. }));
    }

    #[test]
    fn test_inert_frame_cannot_execute() {
        let mut ctx = context();
        let err = run(&mut ctx, |ctx| {
            let anchor = FrameHandle::root("anchor");
            ctx.set_cur_frame(Some(anchor.clone()));
            ctx.mark_entry_frame(anchor);
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, Error::InertFrame { .. }));
    }
}
