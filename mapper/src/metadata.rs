// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Small string-keyed property bag attached to tasks, links and components.
//!
//! Values are drawn from the closed [`Value`] set, and the keys this crate
//! relies on have typed accessors so a misspelled key or a wrongly-typed
//! value can not sneak through as an untyped lookup.

use std::collections::{BTreeMap, BTreeSet};

use crate::taskgraph::TaskClass;

/// Measurement data as it comes out of profiling, e.g. `write_count`.
pub type Measurements = BTreeMap<String, f64>;

pub const KEY_TYPE: &str = "type";
pub const KEY_MEASUREMENTS: &str = "measurements";
pub const KEY_LINK_CLASS: &str = "link_class";
pub const KEY_ROLES: &str = "roles";
pub const KEY_RANK: &str = "rank";
pub const KEY_CONSTRAINED: &str = "constrained";
pub const KEY_ACCEPTS_CONSTRAINED: &str = "accepts_constrained";

/// Measurement key holding the traffic observed on a link.
pub const WRITE_COUNT: &str = "write_count";

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Measurements(Measurements),
    Roles(BTreeSet<TaskClass>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.entries.insert(key.to_string(), value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        match self.entries.get(key) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Value::Bool(true)))
    }

    /// the external `type` string of a task, verbatim.
    pub fn task_type(&self) -> Option<&str> {
        self.text(KEY_TYPE)
    }

    pub fn set_task_type(&mut self, task_type: &str) {
        self.insert(KEY_TYPE, Value::Text(task_type.to_string()));
    }

    pub fn measurements(&self) -> Option<&Measurements> {
        match self.entries.get(KEY_MEASUREMENTS) {
            Some(Value::Measurements(m)) => Some(m),
            _ => None,
        }
    }

    pub fn set_measurements(&mut self, measurements: Measurements) {
        self.insert(KEY_MEASUREMENTS, Value::Measurements(measurements));
    }

    /// Observed traffic, `None` when the entity was never measured.
    pub fn write_count(&self) -> Option<f64> {
        self.measurements()
            .and_then(|m| m.get(WRITE_COUNT))
            .copied()
    }

    pub fn link_class(&self) -> Option<&str> {
        self.text(KEY_LINK_CLASS)
    }

    pub fn set_link_class(&mut self, class: &str) {
        self.insert(KEY_LINK_CLASS, Value::Text(class.to_string()));
    }

    /// Raw rank metric. An explicit `rank` entry wins over a measured one.
    pub fn rank(&self) -> Option<f64> {
        self.number(KEY_RANK).or_else(|| {
            self.measurements()
                .and_then(|m| m.get(KEY_RANK))
                .copied()
        })
    }

    pub fn set_rank(&mut self, rank: f64) {
        self.insert(KEY_RANK, Value::Number(rank));
    }

    pub fn constrained(&self) -> bool {
        self.flag(KEY_CONSTRAINED)
    }

    pub fn set_constrained(&mut self, constrained: bool) {
        self.insert(KEY_CONSTRAINED, Value::Bool(constrained));
    }

    pub fn accepts_constrained(&self) -> bool {
        self.flag(KEY_ACCEPTS_CONSTRAINED)
    }

    pub fn set_accepts_constrained(&mut self, accepts: bool) {
        self.insert(KEY_ACCEPTS_CONSTRAINED, Value::Bool(accepts));
    }

    /// Role attributes carried by an architecture component.
    pub fn roles(&self) -> BTreeSet<TaskClass> {
        match self.entries.get(KEY_ROLES) {
            Some(Value::Roles(roles)) => roles.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn has_role(&self, class: TaskClass) -> bool {
        match self.entries.get(KEY_ROLES) {
            Some(Value::Roles(roles)) => roles.contains(&class),
            _ => false,
        }
    }

    pub fn add_role(&mut self, class: TaskClass) {
        match self.entries.get_mut(KEY_ROLES) {
            Some(Value::Roles(roles)) => {
                roles.insert(class);
            }
            _ => {
                let mut roles = BTreeSet::new();
                roles.insert(class);
                self.insert(KEY_ROLES, Value::Roles(roles));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut meta = Metadata::new();
        assert_eq!(meta.task_type(), None);
        assert_eq!(meta.write_count(), None);
        assert!(!meta.constrained());

        meta.set_task_type("Processor");
        let mut m = Measurements::new();
        m.insert(WRITE_COUNT.to_string(), 12.0);
        m.insert(KEY_RANK.to_string(), 3.0);
        meta.set_measurements(m);
        assert_eq!(meta.task_type(), Some("Processor"));
        assert_eq!(meta.write_count(), Some(12.0));
        assert_eq!(meta.rank(), Some(3.0));

        // explicit rank overrides the measured one
        meta.set_rank(7.0);
        assert_eq!(meta.rank(), Some(7.0));
    }

    #[test]
    fn wrong_type_is_absent() {
        let mut meta = Metadata::new();
        meta.insert(KEY_TYPE, Value::Number(1.0));
        assert_eq!(meta.task_type(), None);
        meta.insert(KEY_CONSTRAINED, Value::Text("yes".to_string()));
        assert!(!meta.constrained());
    }

    #[test]
    fn roles_accumulate() {
        let mut meta = Metadata::new();
        assert!(meta.roles().is_empty());
        meta.add_role(TaskClass::Processor);
        meta.add_role(TaskClass::MemoryProcessor);
        meta.add_role(TaskClass::Processor);
        assert_eq!(meta.roles().len(), 2);
        assert!(meta.has_role(TaskClass::MemoryProcessor));
        assert!(!meta.has_role(TaskClass::InputHandler));
    }
}
