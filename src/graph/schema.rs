// SPDX-License-Identifier: MIT

//! Channel definitions for graph state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::StateError;

/// Produces a channel's value when the run starts without one
pub type InitFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Combines the current value (if any) with a partial update
pub type MergeFn = Arc<dyn Fn(Option<&Value>, Value) -> Value + Send + Sync>;

/// Supported channel value types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether `value` has this type. `null` is accepted for every type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Array, Value::Array(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Built-in reducers, as named in YAML schemas
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the whole value (default)
    #[default]
    Overwrite,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow merge of object keys
    Merge,
}

/// How a channel folds a partial update into its current value
#[derive(Clone)]
pub enum Reducer {
    Builtin(ReducerType),
    Custom(MergeFn),
}

impl Reducer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>, Value) -> Value + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Builtin(ReducerType::Overwrite) => "overwrite",
            Reducer::Builtin(ReducerType::Append) => "append",
            Reducer::Builtin(ReducerType::Max) => "max",
            Reducer::Builtin(ReducerType::Min) => "min",
            Reducer::Builtin(ReducerType::Merge) => "merge",
            Reducer::Custom(_) => "custom",
        }
    }

    /// Produce the channel's next value. Never mutates `current`.
    pub fn apply(&self, current: Option<&Value>, update: Value) -> Value {
        let kind = match self {
            Reducer::Custom(f) => return f(current, update),
            Reducer::Builtin(kind) => kind,
        };

        match kind {
            ReducerType::Overwrite => update,
            ReducerType::Append => {
                let mut items = match current {
                    Some(Value::Array(existing)) => existing.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other.clone()],
                };
                match update {
                    Value::Array(new_items) => items.extend(new_items),
                    other => items.push(other),
                }
                Value::Array(items)
            }
            ReducerType::Max => keep_number(current, update, |new, cur| new > cur),
            ReducerType::Min => keep_number(current, update, |new, cur| new < cur),
            ReducerType::Merge => match (current, update) {
                (Some(Value::Object(existing)), Value::Object(new_obj)) => {
                    let mut merged: Map<String, Value> = existing.clone();
                    for (k, v) in new_obj {
                        merged.insert(k, v);
                    }
                    Value::Object(merged)
                }
                // anything that is not object-on-object replaces
                (_, other) => other,
            },
        }
    }
}

/// Non-numeric updates are ignored by Max/Min.
fn keep_number<F>(current: Option<&Value>, update: Value, wins: F) -> Value
where
    F: Fn(f64, f64) -> bool,
{
    let Some(new) = update.as_f64() else {
        return current.cloned().unwrap_or(Value::Null);
    };
    match current.and_then(Value::as_f64) {
        Some(cur) if !wins(new, cur) => current.cloned().unwrap_or(update),
        _ => update,
    }
}

impl Default for Reducer {
    fn default() -> Self {
        Reducer::Builtin(ReducerType::Overwrite)
    }
}

impl From<ReducerType> for Reducer {
    fn from(kind: ReducerType) -> Self {
        Reducer::Builtin(kind)
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reducer({})", self.name())
    }
}

/// A named state slot
#[derive(Clone)]
pub struct Channel {
    name: String,
    field_type: Option<FieldType>,
    init: Option<InitFn>,
    reducer: Reducer,
}

impl Channel {
    /// Untyped channel with no initial value and the overwrite reducer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            init: None,
            reducer: Reducer::default(),
        }
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_default(self, value: Value) -> Self {
        self.with_init(move || value.clone())
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn with_reducer(mut self, reducer: impl Into<Reducer>) -> Self {
        self.reducer = reducer.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    pub fn has_initial_value(&self) -> bool {
        self.init.is_some()
    }

    /// Fresh initial value, evaluated per run
    pub fn initial_value(&self) -> Option<Value> {
        self.init.as_ref().map(|init| init())
    }

    pub(crate) fn check(&self, value: &Value) -> Result<(), StateError> {
        match self.field_type {
            Some(expected) if !expected.accepts(value) => Err(StateError::TypeMismatch {
                channel: self.name.clone(),
                expected,
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("has_init", &self.init.is_some())
            .field("reducer", &self.reducer)
            .finish()
    }
}

/// Definition of a single channel as written in YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    pub default: Option<Value>,
}

impl StateFieldDef {
    pub fn into_channel(self, name: impl Into<String>) -> Channel {
        let channel = Channel::new(name)
            .typed(self.field_type)
            .with_reducer(self.reducer);
        match self.default {
            Some(default) => channel.with_default(default),
            None => channel,
        }
    }
}

/// Ordered set of channels making up a graph's state
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StateSchema::add`]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.add(channel);
        self
    }

    /// Declare a channel. Redeclaring a name replaces it in place.
    pub fn add(&mut self, channel: Channel) {
        match self.index.get(channel.name()) {
            Some(&i) => self.channels[i] = channel,
            None => {
                self.index
                    .insert(channel.name().to_string(), self.channels.len());
                self.channels.push(channel);
            }
        }
    }

    /// Parse a YAML mapping of `name: {type, reducer, default}`, keeping declaration order
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(content)?;
        let mut schema = Self::new();
        for (key, value) in mapping {
            let name: String = serde_yaml::from_value(key)?;
            let def: StateFieldDef = serde_yaml::from_value(value)?;
            schema.add(def.into_channel(name));
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.index.get(name).map(|&i| &self.channels[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
