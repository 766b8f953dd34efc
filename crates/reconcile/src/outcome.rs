use p1authz_core::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// What the host should do with its tracked state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Leave tracked state as it was.
    Unchanged,
    /// Replace tracked state with this tree.
    Set(Value),
    /// Forget the entity.
    Removed,
}

/// Result of one reconciler operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub state: StateChange,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    pub fn set(value: Value, diagnostics: Diagnostics) -> Self {
        Self {
            state: StateChange::Set(value),
            diagnostics,
        }
    }

    pub fn removed(diagnostics: Diagnostics) -> Self {
        Self {
            state: StateChange::Removed,
            diagnostics,
        }
    }

    pub fn unchanged(diagnostics: Diagnostics) -> Self {
        Self {
            state: StateChange::Unchanged,
            diagnostics,
        }
    }

    /// Leave state untouched and report `d`.
    pub fn failed(d: Diagnostic) -> Self {
        Self::unchanged(d.into())
    }

    /// The new state tree, if the operation produced one.
    pub fn value(&self) -> Option<&Value> {
        match &self.state {
            StateChange::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self.state {
            StateChange::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.state == StateChange::Removed
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}
