use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use util::HashMap;

use crate::Output;

/// Runtime flags, e.g. anonymization toggles.
pub type Flags = BTreeMap<String, Value>;

type Results = HashMap<String, Arc<Output>>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("Can't modify frozen execution context (attempted to write '{0}')")]
    Frozen(String),
    #[error("Execution context is closed")]
    Closed,
    #[error("Read-only view requires a frozen execution context")]
    NotFrozen,
    #[error("Execution context has no input data")]
    EmptyInput,
}

/// Shared data carrier for a single run.
///
/// Holds the input snapshot, the result each module produced, and runtime
/// flags. All mutators fail once [`ExecutionContext::freeze`] has been called;
/// freezing is one-way. Modules never get this type, only a [`ContextView`].
///
/// The result store is copy-on-write: views taken before a write keep seeing
/// the results as they were when the view was taken.
#[derive(Debug)]
pub struct ExecutionContext {
    input: Arc<Value>,
    flags: Arc<Flags>,
    results: Arc<Results>,
    /// cached values derived from the input, shared between modules.
    derived: HashMap<String, Value>,
    frozen: bool,
    closed: bool,
}

impl ExecutionContext {
    pub fn new(input: Value, flags: Flags) -> Self {
        Self {
            input: Arc::new(input),
            flags: Arc::new(flags),
            results: Arc::new(Results::default()),
            derived: HashMap::default(),
            frozen: false,
            closed: false,
        }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Store the result produced by `module`, replacing any earlier one.
    pub fn store_result(&mut self, module: &str, output: Output) -> Result<(), ContextError> {
        self.check_writable(module)?;
        Arc::make_mut(&mut self.results).insert(module.to_owned(), Arc::new(output));
        log::debug!("stored result for module {module}");
        Ok(())
    }

    pub fn get_result(&self, module: &str) -> Option<Arc<Output>> {
        self.results.get(module).cloned()
    }

    pub fn has_result(&self, module: &str) -> bool {
        self.results.contains_key(module)
    }

    pub fn store_derived(&mut self, key: &str, value: Value) -> Result<(), ContextError> {
        self.check_writable(key)?;
        self.derived.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn get_derived(&self, key: &str) -> Option<&Value> {
        self.derived.get(key)
    }

    pub fn set_flag(&mut self, key: &str, value: Value) -> Result<(), ContextError> {
        self.check_writable(key)?;
        Arc::make_mut(&mut self.flags).insert(key.to_owned(), value);
        Ok(())
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(key)
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Make the context read-only. Calling this more than once is a no-op.
    pub fn freeze(&mut self) {
        if !self.frozen {
            self.frozen = true;
            log::debug!("execution context frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Snapshot of the context for a single module invocation.
    pub fn view(&self) -> ContextView {
        ContextView {
            input: Arc::clone(&self.input),
            flags: Arc::clone(&self.flags),
            results: Arc::clone(&self.results),
            frozen: self.frozen,
        }
    }

    /// Read-only view for invocations that may run side by side.
    /// Only available once the context is frozen, since nothing can
    /// change underneath it after that.
    pub fn read_only(&self) -> Result<ContextView, ContextError> {
        if self.frozen {
            Ok(self.view())
        } else {
            Err(ContextError::NotFrozen)
        }
    }

    /// Frozen copy sharing this context's input, flags and results.
    ///
    /// Used to hand [`ExecutionContext::read_only`] views to modules that run
    /// side by side while this context stays writable for the executor.
    pub fn frozen_snapshot(&self) -> ExecutionContext {
        Self {
            input: Arc::clone(&self.input),
            flags: Arc::clone(&self.flags),
            results: Arc::clone(&self.results),
            derived: self.derived.clone(),
            frozen: true,
            closed: self.closed,
        }
    }

    /// Check that the context is usable for a run.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.closed {
            return Err(ContextError::Closed);
        }
        let empty = match &*self.input {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(vec) => vec.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if empty {
            return Err(ContextError::EmptyInput);
        }
        Ok(())
    }

    /// Release stored results and derived values. Safe to call more than once;
    /// doesn't change the frozen flag.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        // drop our handle rather than clearing in place, so outstanding views are unaffected:
        self.results = Arc::new(Results::default());
        self.derived.clear();
        self.closed = true;
        log::debug!("execution context closed");
    }

    fn check_writable(&self, key: &str) -> Result<(), ContextError> {
        if self.closed {
            Err(ContextError::Closed)
        } else if self.frozen {
            Err(ContextError::Frozen(key.to_owned()))
        } else {
            Ok(())
        }
    }
}

/// Read-only handle on an [`ExecutionContext`], given to module executables.
///
/// Owns its data through `Arc`s, so it can be sent to another thread.
#[derive(Debug, Clone)]
pub struct ContextView {
    input: Arc<Value>,
    flags: Arc<Flags>,
    results: Arc<Results>,
    frozen: bool,
}

impl ContextView {
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Result of an upstream module, if it has run.
    pub fn result(&self, module: &str) -> Option<&Output> {
        self.results.get(module).map(|r| &**r)
    }

    pub fn results(&self) -> impl Iterator<Item = (&str, &Output)> + '_ {
        self.results.iter().map(|(k, v)| (k.as_str(), &**v))
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(key)
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// True if the context was frozen when this view was taken.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut flags = Flags::new();
        flags.insert("anonymise".to_owned(), json!(true));
        ExecutionContext::new(json!({"segments": [1, 2, 3]}), flags)
    }

    #[test]
    fn test_store_and_get() -> Result<(), ContextError> {
        let mut ctx = ctx();
        assert_eq!(ctx.get_result("a"), None);
        ctx.store_result("a", json!({"score": 1}))?;
        assert_eq!(ctx.get_result("a").as_deref(), Some(&json!({"score": 1})));
        assert!(ctx.has_result("a"));
        assert_eq!(ctx.flag("anonymise"), Some(&json!(true)));
        Ok(())
    }

    #[test]
    fn test_frozen_rejects_writes() {
        let mut ctx = ctx();
        ctx.freeze();
        ctx.freeze();
        assert!(ctx.is_frozen());
        assert_eq!(
            ctx.store_result("a", json!(1)),
            Err(ContextError::Frozen("a".to_owned()))
        );
        assert_eq!(
            ctx.set_flag("x", json!(1)),
            Err(ContextError::Frozen("x".to_owned()))
        );
        assert_eq!(
            ctx.store_derived("k", json!(1)),
            Err(ContextError::Frozen("k".to_owned()))
        );
    }

    #[test]
    fn test_read_only_requires_frozen() -> Result<(), ContextError> {
        let mut ctx = ctx();
        ctx.store_result("a", json!(1))?;
        assert_eq!(ctx.read_only().err(), Some(ContextError::NotFrozen));
        ctx.freeze();
        let view = ctx.read_only()?;
        assert!(view.is_frozen());
        assert_eq!(view.result("a"), Some(&json!(1)));
        Ok(())
    }

    #[test]
    fn test_frozen_snapshot() -> Result<(), ContextError> {
        let mut ctx = ctx();
        ctx.store_result("a", json!(1))?;
        let snapshot = ctx.frozen_snapshot();
        ctx.store_result("b", json!(2))?;

        assert!(!ctx.is_frozen());
        let view = snapshot.read_only()?;
        assert_eq!(view.result("a"), Some(&json!(1)));
        assert_eq!(view.result("b"), None);
        assert_eq!(view.flag("anonymise"), Some(&json!(true)));
        Ok(())
    }

    #[test]
    fn test_view_is_a_snapshot() -> Result<(), ContextError> {
        let mut ctx = ctx();
        let before = ctx.view();
        ctx.store_result("a", json!(1))?;
        assert_eq!(before.result("a"), None);
        assert_eq!(ctx.view().result("a"), Some(&json!(1)));
        Ok(())
    }

    #[test]
    fn test_close_is_idempotent() -> Result<(), ContextError> {
        let mut ctx = ctx();
        ctx.store_result("a", json!(1))?;
        ctx.store_derived("word_count", json!(42))?;
        let view = ctx.view();
        ctx.close();
        ctx.close();
        assert!(ctx.is_closed());
        assert!(!ctx.is_frozen());
        assert_eq!(ctx.get_result("a"), None);
        assert_eq!(ctx.get_derived("word_count"), None);
        assert_eq!(view.result("a"), Some(&json!(1)));
        assert_eq!(ctx.store_result("b", json!(2)), Err(ContextError::Closed));
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert_eq!(ctx().validate(), Ok(()));
        let empty = ExecutionContext::new(Value::Null, Flags::new());
        assert_eq!(empty.validate(), Err(ContextError::EmptyInput));
        let empty = ExecutionContext::new(json!([]), Flags::new());
        assert_eq!(empty.validate(), Err(ContextError::EmptyInput));
        let mut closed = ctx();
        closed.close();
        assert_eq!(closed.validate(), Err(ContextError::Closed));
    }
}
