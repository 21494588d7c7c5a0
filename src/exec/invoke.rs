use std::any::Any;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use registry::{ContextView, ModuleNode, Output};

use super::CancelToken;

/// How a single module invocation ended.
#[derive(Debug)]
pub enum Invocation {
    /// The executable returned, successfully or not.
    Finished(anyhow::Result<Output>),
    /// The executable panicked; holds the panic message if there was one.
    Panicked(String),
    /// The module's timeout elapsed first.
    TimedOut(Duration),
    /// The run was cancelled while the module was running.
    Interrupted,
}

/// Run `node`'s executable on its own thread and wait for it, up to the
/// node's timeout, checking `cancel` every `poll`. A timeout too large to add
/// to the current time is treated as no timeout.
///
/// A module that times out or is interrupted keeps running on its detached
/// thread; whatever it eventually returns is dropped. It only holds its own
/// snapshot of the context, so it can't affect the rest of the run.
pub fn invoke(
    node: &ModuleNode,
    view: ContextView,
    cancel: &CancelToken,
    poll: Duration,
) -> Invocation {
    let (tx, rx) = mpsc::channel();
    let executable = Arc::clone(&node.executable);

    let spawned = thread::Builder::new()
        .name(format!("module-{}", node.name))
        .spawn(move || {
            let result = executable.execute(&view);
            // receiver is gone if we stopped waiting:
            let _ = tx.send(result);
        });
    let handle = match spawned.context("while spawning module thread") {
        Ok(handle) => handle,
        Err(e) => return Invocation::Finished(Err(e)),
    };

    // too large to represent means no deadline at all:
    let deadline = Instant::now().checked_add(node.timeout);
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    log::warn!("module {} timed out after {:?}", node.name, node.timeout);
                    return Invocation::TimedOut(node.timeout);
                }
                poll.min(deadline - now)
            }
            None => poll,
        };
        match rx.recv_timeout(wait) {
            Ok(result) => return Invocation::Finished(result),
            Err(RecvTimeoutError::Disconnected) => {
                // sender dropped without sending, so the thread panicked:
                let msg = handle.join().err().map(panic_message).unwrap_or_default();
                return Invocation::Panicked(msg);
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    log::warn!("module {} interrupted", node.name);
                    return Invocation::Interrupted;
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use registry::{ExecutionContext, Flags};
    use serde_json::json;

    fn view() -> ContextView {
        ExecutionContext::new(json!({"segments": [1]}), Flags::new()).view()
    }

    #[test]
    fn test_unbounded_timeout_finishes() {
        let node = ModuleNode::from_fn("a", |_| Ok(json!(7))).timeout(Duration::MAX);
        let cancel = CancelToken::new();
        match invoke(&node, view(), &cancel, Duration::from_millis(5)) {
            Invocation::Finished(Ok(out)) => assert_eq!(out, json!(7)),
            other => panic!("expected a finished invocation, got {other:?}"),
        }
    }

    #[test]
    fn test_unbounded_timeout_still_cancellable() {
        let node = ModuleNode::from_fn("a", |_| {
            thread::sleep(Duration::from_secs(5));
            Ok(json!(null))
        })
        .timeout(Duration::MAX);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            invoke(&node, view(), &cancel, Duration::from_millis(5)),
            Invocation::Interrupted
        ));
    }
}
