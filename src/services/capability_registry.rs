//! Registry of invocable capabilities (tools and skills).
//!
//! Like the policy store, the registry hands out immutable snapshots: a
//! request resolves its capability set once and keeps using it even if the
//! registry is updated concurrently.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CapabilityDescriptor, PolicyBundle, SkillContext};

/// Immutable view of the registered capabilities.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    entries: BTreeMap<String, CapabilityDescriptor>,
}

impl CapabilitySet {
    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a skill name to its restriction scope.
    ///
    /// A capability without an allow-list is not a skill and yields `None`.
    pub fn skill_context(&self, skill: &str) -> DomainResult<Option<SkillContext>> {
        let descriptor = self
            .entries
            .get(skill)
            .ok_or_else(|| DomainError::SkillNotFound(skill.to_string()))?;
        Ok(descriptor
            .allowed_sub_capabilities
            .as_ref()
            .map(|allowed| SkillContext {
                skill: descriptor.name.clone(),
                allowed: allowed.clone(),
            }))
    }

    /// Capabilities the reasoning actor is told it may request.
    ///
    /// Hard-denied capabilities are never declared, and inside a skill
    /// context only the allow-listed ones are.
    pub fn declared(&self, skill: Option<&SkillContext>, policy: &PolicyBundle) -> Vec<CapabilityDescriptor> {
        self.entries
            .values()
            .filter(|d| skill.is_none_or(|ctx| ctx.permits(&d.name)))
            .filter(|d| policy.denying_rule(&d.name).is_none())
            .cloned()
            .collect()
    }

    /// Decide whether `name` may be executed.
    ///
    /// Checked in order: hard-constraint denial, the active skill's
    /// allow-list, then existence. Every rejection is a controller-side
    /// refusal, never an execution failure.
    pub fn authorize(
        &self,
        name: &str,
        skill: Option<&SkillContext>,
        policy: &PolicyBundle,
    ) -> DomainResult<&CapabilityDescriptor> {
        if let Some(rule) = policy.denying_rule(name) {
            return Err(DomainError::CapabilityDenied {
                capability: name.to_string(),
                rule_id: rule.id.clone(),
            });
        }
        if let Some(ctx) = skill {
            if !ctx.permits(name) {
                return Err(DomainError::CapabilityNotAllowed {
                    capability: name.to_string(),
                    skill: ctx.skill.clone(),
                });
            }
        }
        self.entries
            .get(name)
            .ok_or_else(|| DomainError::CapabilityNotFound(name.to_string()))
    }
}

/// Process-wide capability registry with copy-on-write updates.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    current: RwLock<Arc<CapabilitySet>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: impl IntoIterator<Item = CapabilityDescriptor>) -> Self {
        let registry = Self::new();
        registry.replace_all(capabilities);
        registry
    }

    pub fn snapshot(&self) -> Arc<CapabilitySet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Add or replace a single capability.
    pub fn register(&self, descriptor: CapabilityDescriptor) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = CapabilitySet::clone(&guard);
        debug!(capability = %descriptor.name, skill = descriptor.is_skill(), "capability registered");
        next.entries.insert(descriptor.name.clone(), descriptor);
        *guard = Arc::new(next);
    }

    /// Swap in a complete new capability set.
    pub fn replace_all(&self, capabilities: impl IntoIterator<Item = CapabilityDescriptor>) {
        let next = CapabilitySet {
            entries: capabilities
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        };
        debug!(count = next.len(), "capability set replaced");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }
}
