//! State schema and merge policies
//!
//! Graph state is a single JSON object shared by every node in a run. Nodes
//! never mutate it directly; they return patches, and the engine folds each
//! patch in through this module. A [`StateSchema`] maps field names to
//! [`Reducer`]s that decide how an update combines with the current value:
//!
//! - [`OverwriteReducer`] - replace the value (the default)
//! - [`AppendReducer`] - concatenate onto an array
//! - [`MergeReducer`] - merge object keys, update wins on conflict
//!
//! A reducer given a value of the wrong shape fails with the field name
//! attached, so the caller can see exactly which part of the patch was
//! malformed.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph_core::state::{AppendReducer, OverwriteReducer, StateSchema};
//! use serde_json::json;
//!
//! let mut schema = StateSchema::new();
//! schema.add_field("messages", Box::new(AppendReducer));
//! schema.add_field("objective", Box::new(OverwriteReducer));
//!
//! let mut state = json!({"messages": ["hi"], "objective": null});
//! schema.apply(&mut state, &json!({"messages": ["there"], "objective": "research"})).unwrap();
//!
//! assert_eq!(state["messages"], json!(["hi", "there"]));
//! assert_eq!(state["objective"], "research");
//! ```

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during state operations
#[derive(Debug, Error)]
pub enum StateError {
    /// State structure is invalid (e.g., not an object when expected)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A reducer could not merge an update into a named field
    #[error("Field '{field}': {message}")]
    FieldConflict {
        /// Field the reducer was merging
        field: String,
        /// Reducer failure detail
        message: String,
    },

    /// Reducer encountered incompatible types or failed to merge
    #[error("Reducer error: {0}")]
    ReducerError(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Trait for reducing/merging state values
///
/// Reducers define how a node's update to a field combines with the field's
/// current value.
pub trait Reducer: Send + Sync {
    /// Apply an update to the current value
    ///
    /// `current` is `Null` when the field has never been written.
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Get a human-readable name for this reducer
    fn name(&self) -> &str;
}

/// Overwrite reducer - replaces the current value with the update
///
/// The default when no reducer is registered for a field. Use for scalar
/// fields that should always reflect the latest write: the current
/// objective, a status flag, the final report.
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Append reducer - concatenates the update onto the current array
///
/// The usual choice for message history and event logs. A scalar update is
/// appended as a single element; a `Null` current value initializes the
/// array.
///
/// ```rust
/// use flowgraph_core::state::{AppendReducer, Reducer};
/// use serde_json::json;
///
/// let reducer = AppendReducer;
/// let merged = reducer.reduce(&json!(["a"]), &json!(["b", "c"])).unwrap();
/// assert_eq!(merged, json!(["a", "b", "c"]));
/// ```
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr_arr), Value::Array(upd_arr)) => {
                let mut result = curr_arr.clone();
                result.extend_from_slice(upd_arr);
                Ok(Value::Array(result))
            }
            (Value::Null, Value::Array(upd_arr)) => Ok(Value::Array(upd_arr.clone())),
            (Value::Array(curr_arr), single_value) => {
                let mut result = curr_arr.clone();
                result.push(single_value.clone());
                Ok(Value::Array(result))
            }
            (Value::Null, single_value) => Ok(Value::Array(vec![single_value.clone()])),
            _ => Err(StateError::ReducerError(
                "append requires array values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Merge reducer - merges object keys, update values win on conflict
///
/// Shallow merge: nested objects are replaced, not merged recursively. Used
/// for keyed result maps where parallel tasks each contribute entries under
/// their own key.
///
/// ```rust
/// use flowgraph_core::state::{MergeReducer, Reducer};
/// use serde_json::json;
///
/// let reducer = MergeReducer;
/// let merged = reducer
///     .reduce(&json!({"task-a": "done"}), &json!({"task-b": "done"}))
///     .unwrap();
/// assert_eq!(merged, json!({"task-a": "done", "task-b": "done"}));
/// ```
#[derive(Debug, Clone)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Object(curr_obj), Value::Object(upd_obj)) => {
                let mut result = curr_obj.clone();
                for (key, value) in upd_obj {
                    result.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(result))
            }
            (Value::Null, Value::Object(upd_obj)) => Ok(Value::Object(upd_obj.clone())),
            _ => Err(StateError::ReducerError(
                "merge requires object values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Schema defining merge policies for graph state fields
#[derive(Default)]
pub struct StateSchema {
    /// Map of field name to reducer
    fields: HashMap<String, Box<dyn Reducer>>,

    /// Default reducer for fields not explicitly defined
    default_reducer: Option<Box<dyn Reducer>>,
}

impl StateSchema {
    /// Create a new empty state schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a specific reducer
    pub fn add_field(&mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) {
        self.fields.insert(field_name.into(), reducer);
    }

    /// Builder-style variant of [`add_field`](Self::add_field)
    pub fn with_field(mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.add_field(field_name, reducer);
        self
    }

    /// Set the default reducer for fields not explicitly defined
    pub fn with_default_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.default_reducer = Some(reducer);
        self
    }

    fn get_reducer(&self, field_name: &str) -> Option<&dyn Reducer> {
        self.fields
            .get(field_name)
            .map(|r| r.as_ref())
            .or_else(|| self.default_reducer.as_ref().map(|r| r.as_ref()))
    }

    /// Apply an update to state according to schema reducers
    ///
    /// Each field of `update` is merged into `state` in place through the
    /// field's reducer, falling back to overwrite when none is registered.
    /// A reducer failure names the field in [`StateError::FieldConflict`]
    /// and leaves no partial write for that field.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        let update_obj = update
            .as_object()
            .ok_or_else(|| StateError::InvalidState("update must be an object".to_string()))?;

        for (field_name, update_value) in update_obj {
            let current_value = state_obj.get(field_name).cloned().unwrap_or(Value::Null);

            let reduced_value = if let Some(reducer) = self.get_reducer(field_name) {
                reducer
                    .reduce(&current_value, update_value)
                    .map_err(|err| StateError::FieldConflict {
                        field: field_name.clone(),
                        message: err.to_string(),
                    })?
            } else {
                update_value.clone()
            };

            state_obj.insert(field_name.clone(), reduced_value);
        }

        Ok(())
    }

    /// Get the list of fields in this schema
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_reducer() {
        let reducer = OverwriteReducer;
        let result = reducer.reduce(&json!("old"), &json!("new")).unwrap();
        assert_eq!(result, json!("new"));
    }

    #[test]
    fn test_append_reducer_arrays() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!([1, 2, 3]), &json!([4, 5])).unwrap();
        assert_eq!(result, json!([1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_append_reducer_null_current() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&Value::Null, &json!([1, 2])).unwrap();
        assert_eq!(result, json!([1, 2]));
    }

    #[test]
    fn test_append_reducer_single_value() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!([1, 2]), &json!(3)).unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn test_append_reducer_type_mismatch() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!("scalar"), &json!([1]));
        assert!(matches!(result, Err(StateError::ReducerError(_))));
    }

    #[test]
    fn test_merge_reducer() {
        let reducer = MergeReducer;
        let result = reducer
            .reduce(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}))
            .unwrap();
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_reducer_type_mismatch() {
        let reducer = MergeReducer;
        let result = reducer.reduce(&json!({"a": 1}), &json!([1, 2]));
        assert!(matches!(result, Err(StateError::ReducerError(_))));
    }

    #[test]
    fn test_state_schema_apply() {
        let mut schema = StateSchema::new();
        schema.add_field("messages", Box::new(AppendReducer));
        schema.add_field("results", Box::new(MergeReducer));

        let mut state = json!({"messages": ["hello"], "results": {}});
        schema
            .apply(
                &mut state,
                &json!({"messages": ["world"], "results": {"t1": "ok"}}),
            )
            .unwrap();

        assert_eq!(state["messages"], json!(["hello", "world"]));
        assert_eq!(state["results"], json!({"t1": "ok"}));
    }

    #[test]
    fn test_apply_unknown_field_overwrites() {
        let schema = StateSchema::new();
        let mut state = json!({"status": "idle"});
        schema.apply(&mut state, &json!({"status": "running"})).unwrap();
        assert_eq!(state["status"], "running");
    }

    #[test]
    fn test_apply_names_conflicting_field() {
        let mut schema = StateSchema::new();
        schema.add_field("messages", Box::new(AppendReducer));

        let mut state = json!({"messages": "not-an-array"});
        let err = schema
            .apply(&mut state, &json!({"messages": ["x"]}))
            .unwrap_err();

        match err {
            StateError::FieldConflict { field, .. } => assert_eq!(field, "messages"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_apply_rejects_non_object_state() {
        let schema = StateSchema::new();
        let mut state = json!("scalar");
        let err = schema.apply(&mut state, &json!({})).unwrap_err();
        assert!(matches!(err, StateError::InvalidState(_)));
    }
}
