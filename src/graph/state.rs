// SPDX-License-Identifier: MIT

//! Runtime state snapshots and partial updates

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::error::StateError;
use super::schema::StateSchema;

/// A partial update: channel name to new value, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateUpdate(Map<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, channel: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(channel, value);
        self
    }

    pub fn insert(&mut self, channel: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(channel.into(), value.into());
    }

    pub fn get(&self, channel: &str) -> Option<&Value> {
        self.0.get(channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Accepts a JSON object; anything else yields `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StateUpdate {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for StateUpdate {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One run's view of the shared state.
///
/// Values are kept in insertion order: channels seeded from initial values come
/// first (in declaration order), followed by channels in the order a merge
/// first wrote them. Merging never touches an existing snapshot; it returns a new one.
#[derive(Clone)]
pub struct GraphState {
    schema: Arc<StateSchema>,
    values: Map<String, Value>,
}

impl GraphState {
    /// State with every channel that has an initial value seeded
    pub fn seeded(schema: Arc<StateSchema>) -> Self {
        let values = schema
            .channels()
            .filter_map(|c| c.initial_value().map(|v| (c.name().to_string(), v)))
            .collect();
        Self { schema, values }
    }

    /// Seed initial values, then overlay caller input (replacing, not reducing)
    pub fn initialize(schema: Arc<StateSchema>, input: StateUpdate) -> Result<Self, StateError> {
        let mut state = Self::seeded(schema);
        for (name, value) in input {
            let channel = state
                .schema
                .get(&name)
                .ok_or_else(|| StateError::UnknownChannel(name.clone()))?;
            channel.check(&value)?;
            state.values.insert(name, value);
        }
        Ok(state)
    }

    /// New snapshot with `update` folded in through each channel's reducer
    pub fn merged(&self, update: StateUpdate) -> Result<Self, StateError> {
        let mut next = self.clone();
        for (name, value) in update {
            let channel = self
                .schema
                .get(&name)
                .ok_or_else(|| StateError::UnknownChannel(name.clone()))?;
            let reduced = channel.reducer().apply(next.values.get(&name), value);
            channel.check(&reduced)?;
            next.values.insert(name, reduced);
        }
        Ok(next)
    }

    /// Get a channel value
    pub fn get(&self, channel: &str) -> Option<&Value> {
        self.values.get(channel)
    }

    pub fn get_str(&self, channel: &str) -> Option<&str> {
        self.get(channel).and_then(Value::as_str)
    }

    pub fn get_bool(&self, channel: &str) -> Option<bool> {
        self.get(channel).and_then(Value::as_bool)
    }

    /// Get a nested value using dot notation (e.g., "weather.current.condition")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.values.contains_key(channel)
    }

    /// Channel names currently holding a value, in order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl PartialEq for GraphState {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl fmt::Debug for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl Serialize for GraphState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}
