//! Error types and the process-wide precondition toggle.
//!
//! Every fallible world operation reports an [`EcsError`] at the call site.
//! There is no recovery layer inside the runtime; callers decide what a
//! violated precondition means for them.
//!
//! Precondition assertions can be disabled globally with
//! [`set_checks_enabled`] for release builds that guarantee valid inputs.
//! With checks off the runtime skips validation entirely and behavior is
//! undefined (at the semantic level) when a precondition would have failed.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::entity::Entity;

/// Errors raised by world operations.
#[derive(Debug, Error)]
pub enum EcsError {
    /// A component id or name was used that this world never registered.
    #[error("component `{0}` is not registered in this world")]
    ComponentNotRegistered(String),

    /// A component with the same name was already registered.
    #[error("component `{0}` is already registered in this world")]
    ComponentAlreadyRegistered(String),

    /// An operation targeted an entity that has been destroyed (or a stale
    /// handle whose slot was recycled).
    #[error("entity {0:?} has been destroyed")]
    ModifyDestroyedEntity(Entity),

    /// A system type was registered twice.
    #[error("system `{0}` is already registered in this world")]
    SystemAlreadyRegistered(&'static str),

    /// A system type was addressed that this world never registered.
    #[error("system `{0}` is not registered in this world")]
    SystemNotRegistered(&'static str),

    /// A query id or name was used that this world never produced.
    #[error("query `{0}` is not registered in this world")]
    QueryNotRegistered(String),

    /// A field name does not exist in the component's schema.
    #[error("component `{component}` has no field `{field}`")]
    UnknownField { component: String, field: String },

    /// A schema declared the same field name twice.
    #[error("field `{field}` is declared more than once")]
    DuplicateField { field: String },

    /// A value's type does not match the field's declared type, or the
    /// field's type does not support the requested operation.
    #[error("field `{field}` is {expected}, which does not admit {got}")]
    TypeNotSupported {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    /// A schema default failed its own field's admission rules.
    #[error("default value for field `{field}` is not admitted: {source}")]
    InvalidDefaultValue {
        field: String,
        #[source]
        source: Box<EcsError>,
    },

    /// A write to an enum field used a string outside the declared set.
    #[error("`{value}` is not an admitted value of enum field `{field}`")]
    InvalidEnumValue { field: String, value: String },

    /// A numeric write violated the field's inclusive range.
    #[error("value {value} is outside [{min}, {max}] for field `{field}`")]
    InvalidRangeValue {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

static CHECKS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable or disable precondition checks for the whole process.
///
/// Checks are on by default. This is a process-wide switch shared by every
/// world in the process.
pub fn set_checks_enabled(enabled: bool) {
    CHECKS_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether precondition checks are currently enabled.
#[inline]
pub fn checks_enabled() -> bool {
    CHECKS_ENABLED.load(Ordering::Relaxed)
}
