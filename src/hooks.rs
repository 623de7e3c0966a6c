//! Per-node hook registries.
//!
//! Every node owns two insertion-ordered hook sets: *before-update* hooks run
//! prior to the node's own update, *after-update* hooks run after it. Hooks
//! are keyed by a structural [`HookKey`], which is what makes shared-unit
//! registration idempotent: a projection asks for a key, and only the first
//! one to ask builds the unit.

use std::fmt;

use crate::align::{AlignPost, AlignPre};
use crate::delay::DelayBuffer;
use crate::dynamics::Shared;
use crate::error::{ProjError, Result};
use crate::params::Descriptor;
use crate::tensor::Tensor;

/// Structural identity of a hook.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookKey {
    /// The delay buffer over a population's own output. One per source node,
    /// shared by every projection that delays the raw signal.
    OutputDelay,
    /// A post-aligned synapse + output pair on the destination.
    AlignPost { syn: Descriptor, out: Descriptor },
    /// A pre-aligned synapse whose output is delayed, on the source.
    AlignPre { syn: Descriptor },
    /// A synapse reading one offset of a delay buffer.
    DelayedSynapse { delay: usize, syn: Descriptor },
    /// An unshared unit owned by one projection.
    Named(String),
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKey::OutputDelay => write!(f, "output-delay"),
            HookKey::AlignPost { syn, out } => write!(f, "{} >> {}", syn, out),
            HookKey::AlignPre { syn } => write!(f, "{} >> delay", syn),
            HookKey::DelayedSynapse { delay, syn } => write!(f, "delay[{}] >> {}", delay, syn),
            HookKey::Named(name) => write!(f, "{}", name),
        }
    }
}

/// One insertion-ordered keyed hook collection.
#[derive(Clone, Debug)]
pub struct HookSet<H> {
    entries: Vec<(HookKey, H)>,
}

impl<H> Default for HookSet<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H: Clone> HookSet<H> {
    pub fn has(&self, key: &HookKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Registers a hook; registering an existing key is an error.
    pub fn add(&mut self, key: HookKey, hook: H) -> Result<()> {
        if self.has(&key) {
            return Err(ProjError::DuplicateHook(key.to_string()));
        }
        self.entries.push((key, hook));
        Ok(())
    }

    pub fn get(&self, key: &HookKey) -> Result<&H> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, h)| h)
            .ok_or_else(|| ProjError::UnknownHook(key.to_string()))
    }

    /// Returns the hook under `key`, building it with `init` if absent.
    ///
    /// The boolean is `true` when the hook was created by this call.
    pub fn get_or_insert_with(
        &mut self,
        key: HookKey,
        init: impl FnOnce() -> Result<H>,
    ) -> Result<(H, bool)> {
        if let Some((_, hook)) = self.entries.iter().find(|(k, _)| *k == key) {
            return Ok((hook.clone(), false));
        }
        let hook = init()?;
        self.entries.push((key, hook.clone()));
        Ok((hook, true))
    }

    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.entries.iter().map(|(_, h)| h)
    }

    pub fn keys(&self) -> impl Iterator<Item = &HookKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the hooks out, so they can run without holding the registry.
    pub fn snapshot(&self) -> Vec<H> {
        self.iter().cloned().collect()
    }
}

/// Before- and after-update hooks of one host.
#[derive(Clone, Debug)]
pub struct HookRegistry<H> {
    before: HookSet<H>,
    after: HookSet<H>,
}

impl<H> Default for HookRegistry<H> {
    fn default() -> Self {
        Self {
            before: HookSet::default(),
            after: HookSet::default(),
        }
    }
}

impl<H: Clone> HookRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_before(&self, key: &HookKey) -> bool {
        self.before.has(key)
    }

    pub fn add_before(&mut self, key: HookKey, hook: H) -> Result<()> {
        self.before.add(key, hook)
    }

    pub fn get_before(&self, key: &HookKey) -> Result<&H> {
        self.before.get(key)
    }

    pub fn get_or_insert_before(
        &mut self,
        key: HookKey,
        init: impl FnOnce() -> Result<H>,
    ) -> Result<(H, bool)> {
        self.before.get_or_insert_with(key, init)
    }

    pub fn has_after(&self, key: &HookKey) -> bool {
        self.after.has(key)
    }

    pub fn add_after(&mut self, key: HookKey, hook: H) -> Result<()> {
        self.after.add(key, hook)
    }

    pub fn get_after(&self, key: &HookKey) -> Result<&H> {
        self.after.get(key)
    }

    pub fn get_or_insert_after(
        &mut self,
        key: HookKey,
        init: impl FnOnce() -> Result<H>,
    ) -> Result<(H, bool)> {
        self.after.get_or_insert_with(key, init)
    }

    pub fn before(&self) -> &HookSet<H> {
        &self.before
    }

    pub fn after(&self) -> &HookSet<H> {
        &self.after
    }
}

/// Hooks that can be attached to a population.
#[derive(Clone)]
pub enum NodeHook {
    OutputDelay(Shared<DelayBuffer>),
    AlignPre(Shared<AlignPre>),
    AlignPost(Shared<AlignPost>),
}

impl fmt::Debug for NodeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHook::{}", self.label())
    }
}

impl NodeHook {
    fn label(&self) -> &'static str {
        match self {
            NodeHook::OutputDelay(_) => "OutputDelay",
            NodeHook::AlignPre(_) => "AlignPre",
            NodeHook::AlignPost(_) => "AlignPost",
        }
    }

    /// Runs the hook. `output` is the host's current output.
    pub fn run(&self, output: &Tensor) -> Result<()> {
        match self {
            NodeHook::OutputDelay(delay) => delay.lock().update(output),
            NodeHook::AlignPre(unit) => unit.lock().update(output).map(|_| ()),
            NodeHook::AlignPost(unit) => unit.lock().update(),
        }
    }

    pub fn reset(&self) {
        match self {
            NodeHook::OutputDelay(delay) => delay.lock().reset(),
            NodeHook::AlignPre(unit) => unit.lock().reset(),
            NodeHook::AlignPost(unit) => unit.lock().reset(),
        }
    }

    /// True for a plain output delay, which rotates after all other
    /// after-update hooks.
    pub fn is_output_delay(&self) -> bool {
        matches!(self, NodeHook::OutputDelay(_))
    }

    pub fn as_output_delay(&self, key: &HookKey) -> Result<Shared<DelayBuffer>> {
        match self {
            NodeHook::OutputDelay(delay) => Ok(delay.clone()),
            other => Err(other.kind_error(key, "OutputDelay")),
        }
    }

    pub fn as_align_pre(&self, key: &HookKey) -> Result<Shared<AlignPre>> {
        match self {
            NodeHook::AlignPre(unit) => Ok(unit.clone()),
            other => Err(other.kind_error(key, "AlignPre")),
        }
    }

    pub fn as_align_post(&self, key: &HookKey) -> Result<Shared<AlignPost>> {
        match self {
            NodeHook::AlignPost(unit) => Ok(unit.clone()),
            other => Err(other.kind_error(key, "AlignPost")),
        }
    }

    fn kind_error(&self, key: &HookKey, expected: &'static str) -> ProjError {
        ProjError::HookKind {
            key: key.to_string(),
            expected,
            found: self.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::params::Params;

    fn key(name: &str) -> HookKey {
        HookKey::Named(name.to_string())
    }

    #[test]
    fn test_add_and_get() {
        let mut reg: HookRegistry<u32> = HookRegistry::new();
        assert!(!reg.has_before(&key("a")));
        reg.add_before(key("a"), 1).unwrap();
        reg.add_after(key("a"), 2).unwrap();

        assert!(reg.has_before(&key("a")));
        assert_eq!(*reg.get_before(&key("a")).unwrap(), 1);
        assert_eq!(*reg.get_after(&key("a")).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_add_fails() {
        let mut reg: HookRegistry<u32> = HookRegistry::new();
        reg.add_before(key("a"), 1).unwrap();
        let err = reg.add_before(key("a"), 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(*reg.get_before(&key("a")).unwrap(), 1);
    }

    #[test]
    fn test_missing_lookup() {
        let reg: HookRegistry<u32> = HookRegistry::new();
        let err = reg.get_after(&key("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_insertion_order() {
        let mut reg: HookRegistry<u32> = HookRegistry::new();
        for (i, name) in ["z", "a", "m"].iter().enumerate() {
            reg.add_after(key(name), i as u32).unwrap();
        }
        assert_eq!(reg.after().snapshot(), vec![0, 1, 2]);
        let keys: Vec<String> = reg.after().keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_get_or_insert_builds_once() {
        let mut reg: HookRegistry<u32> = HookRegistry::new();
        let mut builds = 0;
        let (v, created) = reg
            .get_or_insert_before(key("s"), || {
                builds += 1;
                Ok(7)
            })
            .unwrap();
        assert_eq!((v, created), (7, true));

        let (v, created) = reg
            .get_or_insert_before(key("s"), || {
                builds += 1;
                Ok(8)
            })
            .unwrap();
        assert_eq!((v, created), (7, false));
        assert_eq!(builds, 1);
        assert_eq!(reg.before().len(), 1);
    }

    #[test]
    fn test_get_or_insert_failure_leaves_registry_untouched() {
        let mut reg: HookRegistry<u32> = HookRegistry::new();
        let result = reg.get_or_insert_after(key("s"), || Err(ProjError::param("tau", "missing")));
        assert!(result.is_err());
        assert!(reg.after().is_empty());
    }

    #[test]
    fn test_structural_keys() {
        let syn = Descriptor::new("Expon", Params::new().with("tau", 5.0));
        let out = Descriptor::new("CUBA", Params::new());
        let a = HookKey::AlignPost {
            syn: syn.clone(),
            out: out.clone(),
        };
        let b = HookKey::AlignPost {
            syn: Descriptor::new("Expon", Params::new().with("tau", 5)),
            out,
        };
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Expon(tau=5) >> CUBA()");
        assert_ne!(a, HookKey::AlignPre { syn });
    }
}
