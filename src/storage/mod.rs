//! Columnar component storage.
//!
//! Every registered component owns one column per schema field, sized to the
//! world's entity capacity and addressed by entity slot index. Columns are
//! typed buffers rather than raw bytes: the schema is known at registration,
//! so each field gets the tightest container its kind allows.

mod column;

pub(crate) use column::ColumnSet;
