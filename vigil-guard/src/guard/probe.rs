//! Probe-mode sessions and deferred call replay.
//!
//! A probe session turns guarded calls on one entity into dry runs: the guard
//! validates preconditions as usual but never invokes the real body. Passing
//! calls are recorded for later replay, failing calls record their violations
//! instead of raising. Sessions are keyed by (entity identity, thread), so
//! probing an entity on one thread leaves guarded calls on other threads
//! untouched.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::core::{ConstraintViolation, EntityRef, ObjectId, Value};
use crate::error::{Result, VigilError};

thread_local! {
    static PROBE_SESSIONS: RefCell<HashMap<ObjectId, SessionState>> =
        RefCell::new(HashMap::new());
}

#[derive(Default)]
struct SessionState {
    violations: Vec<ConstraintViolation>,
    deferred: Vec<DeferredCall>,
}

/// Opens a probe session for the entity on the current thread.
pub(crate) fn begin(entity: &EntityRef) -> Result<()> {
    PROBE_SESSIONS.with(|sessions| {
        let id = ObjectId::of(entity);
        let mut sessions = sessions.borrow_mut();
        if sessions.contains_key(&id) {
            return Err(VigilError::configuration(format!(
                "probe mode is already active for entity {id} on this thread"
            )));
        }
        debug!(entity.id = %id, "probe session opened");
        sessions.insert(id, SessionState::default());
        Ok(())
    })
}

/// Closes the entity's probe session and returns what it recorded.
pub(crate) fn end(entity: &EntityRef) -> Result<ProbeModeRecorder> {
    PROBE_SESSIONS.with(|sessions| {
        let id = ObjectId::of(entity);
        let state = sessions.borrow_mut().remove(&id).ok_or_else(|| {
            VigilError::internal(format!(
                "probe mode is not active for entity {id} on this thread"
            ))
        })?;
        debug!(
            entity.id = %id,
            violations.count = state.violations.len(),
            deferred.count = state.deferred.len(),
            "probe session closed"
        );
        Ok(ProbeModeRecorder {
            violations: state.violations,
            deferred: state.deferred,
        })
    })
}

/// Returns whether the entity has a probe session on the current thread.
pub(crate) fn is_active(id: ObjectId) -> bool {
    PROBE_SESSIONS.with(|sessions| sessions.borrow().contains_key(&id))
}

/// Records precondition violations into the entity's session.
pub(crate) fn record_violations(id: ObjectId, violations: Vec<ConstraintViolation>) {
    PROBE_SESSIONS.with(|sessions| {
        if let Some(state) = sessions.borrow_mut().get_mut(&id) {
            state.violations.extend(violations);
        }
    });
}

/// Records a passing call for later replay.
pub(crate) fn record_call(id: ObjectId, call: DeferredCall) {
    PROBE_SESSIONS.with(|sessions| {
        if let Some(state) = sessions.borrow_mut().get_mut(&id) {
            state.deferred.push(call);
        }
    });
}

/// A guarded call whose real invocation was skipped while probing.
pub struct DeferredCall {
    entity: EntityRef,
    operation: String,
    args: Vec<Value>,
}

impl DeferredCall {
    pub(crate) fn new(entity: EntityRef, operation: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            entity,
            operation: operation.into(),
            args,
        }
    }

    /// Returns the recorded operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the recorded arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn execute(&self) -> Result<Value> {
        self.entity.invoke(&self.operation, &self.args)
    }
}

/// Everything one probe session observed, returned when the session closes.
///
/// # Examples
///
/// ```rust,ignore
/// guard.enable_probe_mode(&entity)?;
/// entity_wrapper.set_value(-5)?; // validated, not executed
/// let recorder = guard.disable_probe_mode(&entity)?;
/// if recorder.has_violations() {
///     // inspect recorder.violations()
/// } else {
///     recorder.commit()?; // now the calls really run
/// }
/// ```
pub struct ProbeModeRecorder {
    violations: Vec<ConstraintViolation>,
    deferred: Vec<DeferredCall>,
}

impl ProbeModeRecorder {
    /// Returns the recorded violations in the order they occurred.
    pub fn violations(&self) -> &[ConstraintViolation] {
        &self.violations
    }

    /// Returns the recorded calls in invocation order.
    pub fn deferred_calls(&self) -> &[DeferredCall] {
        &self.deferred
    }

    /// Returns true if any probed call failed its preconditions.
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Replays the deferred calls in their original order.
    ///
    /// Raises the recorded violations instead if any probed call failed, and
    /// propagates the first error a replayed invocation produces.
    pub fn commit(self) -> Result<()> {
        if !self.violations.is_empty() {
            return Err(VigilError::ConstraintsViolated(self.violations));
        }
        for call in &self.deferred {
            call.execute()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::{Context, Severity, Validatable};

    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
            })
        }
    }

    impl Validatable for Journal {
        fn type_name(&self) -> &str {
            "Journal"
        }

        fn property(&self, _name: &str) -> Result<Value> {
            Ok(Value::Null)
        }

        fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
            match operation {
                "append" => {
                    let entry = args
                        .first()
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    self.entries.lock().unwrap().push(entry);
                    Ok(Value::Null)
                }
                "explode" => Err(VigilError::internal("journal is sealed")),
                other => Err(VigilError::configuration(format!(
                    "unknown operation '{other}'"
                ))),
            }
        }
    }

    fn sample_violation(message: &str) -> ConstraintViolation {
        ConstraintViolation::from_parts(
            "pre",
            message,
            message,
            "pre",
            Severity::default(),
            Context::operation_entry("Journal", "append"),
            None,
            &Value::Null,
        )
    }

    #[test]
    fn test_session_lifecycle() {
        let entity: EntityRef = Journal::new();
        assert!(!is_active(ObjectId::of(&entity)));

        begin(&entity).unwrap();
        assert!(is_active(ObjectId::of(&entity)));

        let err = begin(&entity).unwrap_err();
        assert!(err.to_string().contains("already active"));

        let recorder = end(&entity).unwrap();
        assert!(!is_active(ObjectId::of(&entity)));
        assert!(!recorder.has_violations());
        assert!(recorder.deferred_calls().is_empty());
    }

    #[test]
    fn test_end_without_begin_fails() {
        let entity: EntityRef = Journal::new();
        let err = end(&entity).err().unwrap();
        assert!(err.to_string().contains("not active"));
    }

    #[test]
    fn test_sessions_are_thread_confined() {
        let entity: EntityRef = Journal::new();
        begin(&entity).unwrap();

        let id = ObjectId::of(&entity);
        let seen_elsewhere = std::thread::spawn(move || is_active(id))
            .join()
            .unwrap();
        assert!(!seen_elsewhere);

        end(&entity).unwrap();
    }

    #[test]
    fn test_commit_raises_recorded_violations() {
        let entity: EntityRef = Journal::new();
        begin(&entity).unwrap();
        let id = ObjectId::of(&entity);
        record_violations(id, vec![sample_violation("first"), sample_violation("second")]);
        record_call(
            id,
            DeferredCall::new(entity.clone(), "append", vec![Value::from("x")]),
        );

        let recorder = end(&entity).unwrap();
        assert_eq!(recorder.violations().len(), 2);

        let err = recorder.commit().unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(violations.len(), 2);
                assert_eq!(violations[0].message(), "first");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_commit_replays_in_order() {
        let journal = Journal::new();
        let entity: EntityRef = journal.clone();
        begin(&entity).unwrap();
        let id = ObjectId::of(&entity);
        record_call(
            id,
            DeferredCall::new(entity.clone(), "append", vec![Value::from("a")]),
        );
        record_call(
            id,
            DeferredCall::new(entity.clone(), "append", vec![Value::from("b")]),
        );

        assert!(journal.entries.lock().unwrap().is_empty());
        end(&entity).unwrap().commit().unwrap();
        assert_eq!(*journal.entries.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_replay_failure_propagates() {
        let journal = Journal::new();
        let entity: EntityRef = journal.clone();
        begin(&entity).unwrap();
        let id = ObjectId::of(&entity);
        record_call(
            id,
            DeferredCall::new(entity.clone(), "append", vec![Value::from("a")]),
        );
        record_call(id, DeferredCall::new(entity.clone(), "explode", vec![]));
        record_call(
            id,
            DeferredCall::new(entity.clone(), "append", vec![Value::from("c")]),
        );

        let err = end(&entity).unwrap().commit().unwrap_err();
        assert!(err.to_string().contains("sealed"));
        // The failing call stops the replay.
        assert_eq!(*journal.entries.lock().unwrap(), vec!["a"]);
    }
}
