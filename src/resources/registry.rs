//! Registry of behaviours by name.
//!
//! One instance per name per world. Registration rejects duplicate names and
//! `requires` chains that loop back on themselves, so attaching can always
//! resolve a finite, topologically ordered list of behaviours to apply.

use std::rc::Rc;

use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::behaviour::Behaviour;
use crate::error::{EngineError, Result};

/// Map of behaviour names to shared behaviour instances.
#[derive(Default)]
pub struct BehaviourRegistry {
    map: FxHashMap<String, Rc<Behaviour>>,
}

impl BehaviourRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behaviour under its name.
    ///
    /// Fails on a duplicate name or on a requirement cycle through the new
    /// behaviour. Requirements that are not registered yet are allowed here
    /// and reported when attaching.
    pub fn register(&mut self, behaviour: Behaviour) -> Result<Rc<Behaviour>> {
        let name = behaviour.name().to_string();
        if self.map.contains_key(&name) {
            return Err(EngineError::DuplicateBehaviour(name));
        }
        if let Some(cycle) = self.find_cycle(&behaviour) {
            return Err(EngineError::RequirementCycle(cycle));
        }
        let behaviour = Rc::new(behaviour);
        self.map.insert(name.clone(), behaviour.clone());
        info!("Registered behaviour '{}'", name);
        Ok(behaviour)
    }

    /// Retrieve a behaviour by name.
    pub fn get(&self, name: &str) -> Result<Rc<Behaviour>> {
        self.map
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownBehaviour(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `name` and everything it requires, requirements first.
    ///
    /// Every name is resolved before anything is returned, so a missing
    /// requirement fails without side effects.
    pub fn attach_order(&self, name: &str) -> Result<Vec<Rc<Behaviour>>> {
        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect(name, &mut seen, &mut order)?;
        Ok(order)
    }

    fn collect(
        &self,
        name: &str,
        seen: &mut FxHashSet<String>,
        order: &mut Vec<Rc<Behaviour>>,
    ) -> Result<()> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }
        let behaviour = self.get(name)?;
        for required in behaviour.requires() {
            self.collect(required, seen, order)?;
        }
        order.push(behaviour);
        Ok(())
    }

    /// Path of a requirement cycle that would close through `candidate`.
    fn find_cycle(&self, candidate: &Behaviour) -> Option<Vec<String>> {
        let mut path = vec![candidate.name().to_string()];
        let mut done = FxHashSet::default();
        if self.visit(candidate, candidate.requires(), &mut path, &mut done) {
            Some(path)
        } else {
            None
        }
    }

    fn visit(
        &self,
        candidate: &Behaviour,
        requires: &[String],
        path: &mut Vec<String>,
        done: &mut FxHashSet<String>,
    ) -> bool {
        for required in requires {
            if path.iter().any(|p| p == required) {
                path.push(required.clone());
                return true;
            }
            if done.contains(required) {
                continue;
            }
            let next: &[String] = if required == candidate.name() {
                candidate.requires()
            } else {
                match self.map.get(required) {
                    Some(b) => b.requires(),
                    None => continue,
                }
            };
            path.push(required.clone());
            if self.visit(candidate, next, path, done) {
                return true;
            }
            path.pop();
            done.insert(required.clone());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::behaviour::BehaviourDefinition;

    fn behaviour(name: &str, requires: &[&str]) -> Behaviour {
        let mut def = BehaviourDefinition::new();
        for r in requires {
            def = def.requires(*r);
        }
        Behaviour::new(name, def)
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = BehaviourRegistry::new();
        assert!(registry.is_empty());
        registry.register(behaviour("mass", &[])).unwrap();
        assert!(registry.contains("mass"));
        assert_eq!(registry.get("mass").unwrap().name(), "mass");
        assert_eq!(
            registry.get("ghost").unwrap_err(),
            EngineError::UnknownBehaviour("ghost".into())
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = BehaviourRegistry::new();
        registry.register(behaviour("mass", &[])).unwrap();
        let err = registry.register(behaviour("mass", &[])).unwrap_err();
        assert_eq!(err, EngineError::DuplicateBehaviour("mass".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_self_requirement_is_a_cycle() {
        let mut registry = BehaviourRegistry::new();
        let err = registry.register(behaviour("loop", &["loop"])).unwrap_err();
        assert_eq!(
            err,
            EngineError::RequirementCycle(vec!["loop".into(), "loop".into()])
        );
        assert!(!registry.contains("loop"));
    }

    #[test]
    fn test_cycle_closing_through_new_behaviour() {
        let mut registry = BehaviourRegistry::new();
        registry.register(behaviour("a", &["b"])).unwrap();
        registry.register(behaviour("b", &["c"])).unwrap();
        let err = registry.register(behaviour("c", &["a"])).unwrap_err();
        assert_eq!(
            err,
            EngineError::RequirementCycle(vec![
                "c".into(),
                "a".into(),
                "b".into(),
                "c".into()
            ])
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut registry = BehaviourRegistry::new();
        registry.register(behaviour("base", &[])).unwrap();
        registry.register(behaviour("left", &["base"])).unwrap();
        registry.register(behaviour("right", &["base"])).unwrap();
        registry.register(behaviour("top", &["left", "right"])).unwrap();

        let order: Vec<String> = registry
            .attach_order("top")
            .unwrap()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(order, vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn test_attach_order_reports_missing_requirement() {
        let mut registry = BehaviourRegistry::new();
        registry.register(behaviour("jumper", &["mass"])).unwrap();
        assert_eq!(
            registry.attach_order("jumper").unwrap_err(),
            EngineError::UnknownBehaviour("mass".into())
        );
    }
}
