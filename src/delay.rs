//! Delay buffers with named taps.
//!
//! A [`DelayBuffer`] keeps the recent history of one monitored quantity (a
//! population's output, or a pre-aligned synapse's state) and serves any
//! number of named taps reading that history at fixed offsets. One buffer
//! exists per monitored quantity regardless of how many projections read it,
//! and it rotates exactly once per step.
//!
//! # Example
//!
//! ```
//! use synalign::delay::{Delay, DelayBuffer};
//! use synalign::info::ReturnInfo;
//! use synalign::tensor::Tensor;
//!
//! let mut buffer = DelayBuffer::new(&ReturnInfo::new(&[1]), 0.1).unwrap();
//! buffer.register_entry("fast", None).unwrap();
//! buffer.register_entry("slow", Some(Delay::Time(0.2))).unwrap(); // 2 steps
//!
//! for v in [1.0, 2.0, 3.0] {
//!     buffer.update(&Tensor::vector(vec![v])).unwrap();
//! }
//! assert_eq!(buffer.at("fast").unwrap().data(), &[3.0]);
//! assert_eq!(buffer.at("slow").unwrap().data(), &[1.0]);
//! ```

use std::collections::{BTreeMap, VecDeque};

use crate::align::AlignPreMerge;
use crate::dynamics::Shared;
use crate::error::{ProjError, Result};
use crate::hooks::HookRegistry;
use crate::info::ReturnInfo;
use crate::tensor::Tensor;
use crate::types::SimTime;

/// A requested delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Delay {
    /// A whole number of steps.
    Steps(usize),
    /// A continuous duration, quantized to the nearest whole step.
    Time(SimTime),
}

/// Largest offset a buffer accepts, in steps.
pub const MAX_DELAY_STEPS: usize = 1 << 20;

impl Delay {
    /// Quantizes this delay to steps of length `dt`.
    ///
    /// Offsets beyond [`MAX_DELAY_STEPS`] are rejected.
    pub fn to_steps(self, dt: SimTime) -> Result<usize> {
        let steps = match self {
            Delay::Steps(n) => n,
            Delay::Time(t) => {
                if !t.is_finite() || t < 0.0 {
                    return Err(ProjError::InvalidDelay(format!(
                        "delay time must be finite and non-negative, got {}",
                        t
                    )));
                }
                if !(dt > 0.0) {
                    return Err(ProjError::InvalidDelay(format!("dt must be positive, got {}", dt)));
                }
                let steps = (t / dt).round();
                if steps > MAX_DELAY_STEPS as f64 {
                    return Err(too_long(steps));
                }
                steps as usize
            }
        };
        if steps > MAX_DELAY_STEPS {
            return Err(too_long(steps));
        }
        Ok(steps)
    }
}

fn too_long(steps: impl std::fmt::Display) -> ProjError {
    ProjError::InvalidDelay(format!(
        "offset of {} steps exceeds the limit of {}",
        steps, MAX_DELAY_STEPS
    ))
}

impl From<usize> for Delay {
    fn from(steps: usize) -> Self {
        Delay::Steps(steps)
    }
}

impl From<SimTime> for Delay {
    fn from(t: SimTime) -> Self {
        Delay::Time(t)
    }
}

/// Resolves an optional delay to an optional step count.
pub fn resolve_delay(delay: Option<Delay>, dt: SimTime) -> Result<Option<usize>> {
    delay.map(|d| d.to_steps(dt)).transpose()
}

/// A rotating history buffer with named taps.
///
/// `slots[0]` holds the most recently written value and `slots[k]` the value
/// written `k` rotations earlier. Slots that have not been written yet hold
/// the initial value.
pub struct DelayBuffer {
    slots: VecDeque<Tensor>,
    init: Tensor,
    taps: BTreeMap<String, Option<usize>>,
    merge_taps: BTreeMap<String, usize>,
    dt: SimTime,
    hooks: HookRegistry<Shared<AlignPreMerge>>,
    rotations: u64,
}

impl std::fmt::Debug for DelayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayBuffer")
            .field("shape", &self.init.shape())
            .field("depth", &self.slots.len())
            .field("taps", &self.taps)
            .field("merge_taps", &self.merge_taps)
            .field("rotations", &self.rotations)
            .finish()
    }
}

impl DelayBuffer {
    /// Creates a buffer sized from a return descriptor.
    pub fn new(info: &ReturnInfo, dt: SimTime) -> Result<Self> {
        Ok(Self::from_value(info.initial_value()?, dt))
    }

    /// Creates a buffer whose initial value is `init`.
    pub fn from_value(init: Tensor, dt: SimTime) -> Self {
        let mut slots = VecDeque::with_capacity(1);
        slots.push_back(init.clone());
        Self {
            slots,
            init,
            taps: BTreeMap::new(),
            merge_taps: BTreeMap::new(),
            dt,
            hooks: HookRegistry::new(),
            rotations: 0,
        }
    }

    /// Registers a tap.
    ///
    /// `None` registers an alias of the latest written value. Registering an
    /// existing tap again with the same offset is a no-op; a different
    /// offset is a [`ProjError::TapConflict`]. Returns the resolved offset.
    pub fn register_entry(&mut self, tap: impl Into<String>, delay: Option<Delay>) -> Result<Option<usize>> {
        let tap = tap.into();
        let steps = self.check_entry(&tap, delay)?;
        if self.taps.contains_key(&tap) {
            return Ok(steps);
        }

        if let Some(n) = steps {
            self.grow(n)?;
        }
        tracing::debug!(tap = %tap, offset = ?steps, depth = self.slots.len(), "registered delay tap");
        self.taps.insert(tap, steps);
        Ok(steps)
    }

    /// Resolves `delay` and checks it against an existing tap of the same
    /// name without registering anything.
    pub fn check_entry(&self, tap: &str, delay: Option<Delay>) -> Result<Option<usize>> {
        let steps = resolve_delay(delay, self.dt)?;
        match self.taps.get(tap) {
            Some(&existing) if existing != steps => Err(ProjError::TapConflict {
                tap: tap.to_string(),
                existing,
                requested: steps,
            }),
            _ => Ok(steps),
        }
    }

    /// Registers a tap read by a merge unit hooked on this buffer.
    ///
    /// Merge taps live apart from projection taps, so the two never collide.
    /// The name is the unit's key, which already encodes `steps`.
    pub fn register_merge_entry(&mut self, tap: impl Into<String>, steps: usize) -> Result<()> {
        let tap = tap.into();
        if let Some(&existing) = self.merge_taps.get(&tap) {
            if existing != steps {
                return Err(ProjError::TapConflict {
                    tap,
                    existing: Some(existing),
                    requested: Some(steps),
                });
            }
            return Ok(());
        }
        Delay::Steps(steps).to_steps(self.dt)?;
        self.grow(steps)?;
        tracing::debug!(tap = %tap, offset = steps, depth = self.slots.len(), "registered merge tap");
        self.merge_taps.insert(tap, steps);
        Ok(())
    }

    /// Extends the buffer so that offset `max_offset` is readable. New slots
    /// are appended on the old end, so every existing offset keeps its value.
    fn grow(&mut self, max_offset: usize) -> Result<()> {
        let depth = max_offset.checked_add(1).ok_or_else(|| too_long(max_offset))?;
        while self.slots.len() < depth {
            self.slots.push_back(self.init.clone());
        }
        Ok(())
    }

    /// Reads the value behind a tap.
    pub fn at(&self, tap: &str) -> Result<&Tensor> {
        match self.taps.get(tap) {
            Some(None) => Ok(self.latest()),
            Some(Some(n)) => self.retrieve(*n),
            None => Err(ProjError::UnknownTap(tap.to_string())),
        }
    }

    /// Reads the value behind a merge tap.
    pub fn at_merge(&self, tap: &str) -> Result<&Tensor> {
        match self.merge_taps.get(tap) {
            Some(n) => self.retrieve(*n),
            None => Err(ProjError::UnknownTap(tap.to_string())),
        }
    }

    /// Reads the value written `steps` rotations ago.
    pub fn retrieve(&self, steps: usize) -> Result<&Tensor> {
        self.slots.get(steps).ok_or_else(|| {
            ProjError::InvalidDelay(format!(
                "offset {} exceeds buffer depth {}",
                steps,
                self.slots.len()
            ))
        })
    }

    /// The most recently written value.
    pub fn latest(&self) -> &Tensor {
        &self.slots[0]
    }

    /// Writes `latest` and advances by one position, then runs the
    /// after-update hooks reading this buffer.
    pub fn update(&mut self, latest: &Tensor) -> Result<()> {
        latest.check_shape(self.init.shape())?;
        if self.slots.len() == 1 {
            self.slots[0].clone_from(latest);
        } else {
            // Recycle the oldest slot's allocation.
            let mut slot = self.slots.pop_back().unwrap_or_else(|| self.init.clone());
            slot.clone_from(latest);
            self.slots.push_front(slot);
        }
        self.rotations += 1;

        for unit in self.hooks.after().iter() {
            unit.lock().update(self)?;
        }
        Ok(())
    }

    /// Refills every slot with the initial value and resets hooked units.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clone_from(&self.init);
        }
        self.rotations = 0;
        for unit in self.hooks.after().iter() {
            unit.lock().reset();
        }
    }

    /// Number of slots.
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Largest registered offset.
    pub fn max_delay(&self) -> usize {
        self.taps
            .values()
            .flatten()
            .chain(self.merge_taps.values())
            .copied()
            .max()
            .unwrap_or(0)
    }

    pub fn has_tap(&self, tap: &str) -> bool {
        self.taps.contains_key(tap)
    }

    /// Registered merge taps and their offsets, ordered by name.
    pub fn merge_taps(&self) -> impl Iterator<Item = (&str, usize)> {
        self.merge_taps.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Registered taps and their offsets, ordered by name.
    pub fn taps(&self) -> impl Iterator<Item = (&str, Option<usize>)> {
        self.taps.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn dt(&self) -> SimTime {
        self.dt
    }

    pub fn shape(&self) -> &[usize] {
        self.init.shape()
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn hooks(&self) -> &HookRegistry<Shared<AlignPreMerge>> {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry<Shared<AlignPreMerge>> {
        &mut self.hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn scalar(v: f64) -> Tensor {
        Tensor::vector(vec![v])
    }

    fn buffer() -> DelayBuffer {
        DelayBuffer::from_value(scalar(-1.0), 0.1)
    }

    #[test]
    fn test_delay_quantization() {
        assert_eq!(Delay::Steps(3).to_steps(0.1).unwrap(), 3);
        assert_eq!(Delay::Time(0.1).to_steps(0.1).unwrap(), 1);
        assert_eq!(Delay::Time(0.3).to_steps(0.1).unwrap(), 3);
        assert_eq!(Delay::Time(0.0).to_steps(0.1).unwrap(), 0);
        assert!(Delay::Time(-0.5).to_steps(0.1).is_err());
        assert!(Delay::Time(f64::NAN).to_steps(0.1).is_err());
        assert!(Delay::Time(1.0).to_steps(0.0).is_err());
    }

    #[test]
    fn test_delayed_reads() {
        let mut buf = buffer();
        buf.register_entry("d2", Some(Delay::Steps(2))).unwrap();
        assert_eq!(buf.depth(), 3);

        // Before enough history exists the initial value is returned.
        buf.update(&scalar(1.0)).unwrap();
        assert_eq!(buf.at("d2").unwrap(), &scalar(-1.0));
        buf.update(&scalar(2.0)).unwrap();
        assert_eq!(buf.at("d2").unwrap(), &scalar(-1.0));
        buf.update(&scalar(3.0)).unwrap();
        assert_eq!(buf.at("d2").unwrap(), &scalar(1.0));
        buf.update(&scalar(4.0)).unwrap();
        assert_eq!(buf.at("d2").unwrap(), &scalar(2.0));
        assert_eq!(buf.rotations(), 4);
    }

    #[test]
    fn test_none_and_zero_are_equivalent() {
        let mut buf = buffer();
        buf.register_entry("alias", None).unwrap();
        buf.register_entry("zero", Some(Delay::Steps(0))).unwrap();
        assert_eq!(buf.depth(), 1);

        for v in [5.0, 6.0, 7.0] {
            buf.update(&scalar(v)).unwrap();
            assert_eq!(buf.at("alias").unwrap(), buf.at("zero").unwrap());
            assert_eq!(buf.at("alias").unwrap(), &scalar(v));
        }
    }

    #[test]
    fn test_growth_preserves_existing_taps() {
        let mut buf = buffer();
        buf.register_entry("short", Some(Delay::Steps(1))).unwrap();
        for v in [1.0, 2.0, 3.0] {
            buf.update(&scalar(v)).unwrap();
        }
        let before = buf.at("short").unwrap().clone();
        assert_eq!(before, scalar(2.0));

        buf.register_entry("long", Some(Delay::Steps(4))).unwrap();
        assert_eq!(buf.depth(), 5);
        assert_eq!(buf.at("short").unwrap(), &before);
        assert_eq!(buf.latest(), &scalar(3.0));
        assert_eq!(buf.at("long").unwrap(), &scalar(-1.0));
    }

    #[test]
    fn test_reregistration() {
        let mut buf = buffer();
        buf.register_entry("p", Some(Delay::Steps(2))).unwrap();
        // Same offset, expressed in time: no-op.
        assert_eq!(buf.register_entry("p", Some(Delay::Time(0.2))).unwrap(), Some(2));

        let err = buf.register_entry("p", Some(Delay::Steps(3))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = buf.register_entry("p", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(buf.depth(), 3);
    }

    #[test]
    fn test_unknown_tap() {
        let buf = buffer();
        let err = buf.at("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_update_checks_shape() {
        let mut buf = buffer();
        let err = buf.update(&Tensor::zeros(&[2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_reset() {
        let mut buf = buffer();
        buf.register_entry("d", Some(Delay::Steps(1))).unwrap();
        buf.update(&scalar(1.0)).unwrap();
        buf.update(&scalar(2.0)).unwrap();
        buf.reset();
        assert_eq!(buf.at("d").unwrap(), &scalar(-1.0));
        assert_eq!(buf.latest(), &scalar(-1.0));
        assert_eq!(buf.rotations(), 0);
    }

    #[test]
    fn test_taps_listing() {
        let mut buf = buffer();
        buf.register_entry("b", Some(Delay::Steps(3))).unwrap();
        buf.register_entry("a", None).unwrap();
        let taps: Vec<_> = buf.taps().collect();
        assert_eq!(taps, vec![("a", None), ("b", Some(3))]);
        assert_eq!(buf.max_delay(), 3);
        assert!(buf.has_tap("a"));
        assert!(buf.retrieve(3).is_ok());
        assert!(buf.retrieve(4).is_err());
    }

    #[test]
    fn test_oversized_offsets_rejected() {
        let mut buf = buffer();
        for delay in [
            Delay::Steps(usize::MAX),
            Delay::Steps(MAX_DELAY_STEPS + 1),
            Delay::Time(1e300),
        ] {
            let err = buf.register_entry("huge", Some(delay)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parameter);
        }
        assert!(!buf.has_tap("huge"));
        assert_eq!(buf.depth(), 1);
        assert_eq!(Delay::Steps(MAX_DELAY_STEPS).to_steps(0.1).unwrap(), MAX_DELAY_STEPS);
    }

    #[test]
    fn test_check_entry_leaves_buffer_untouched() {
        let mut buf = buffer();
        buf.register_entry("p", Some(Delay::Steps(1))).unwrap();
        assert_eq!(buf.check_entry("q", Some(Delay::Steps(6))).unwrap(), Some(6));
        assert_eq!(buf.check_entry("p", Some(Delay::Steps(2))).unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(buf.depth(), 2);
        assert!(!buf.has_tap("q"));
    }

    #[test]
    fn test_merge_taps_are_separate() {
        let mut buf = buffer();
        buf.register_entry("delay[2] >> Expon", Some(Delay::Steps(1))).unwrap();
        buf.register_merge_entry("delay[2] >> Expon", 2).unwrap();
        buf.register_merge_entry("delay[2] >> Expon", 2).unwrap();
        assert_eq!(buf.depth(), 3);
        assert_eq!(buf.taps().count(), 1);
        assert_eq!(buf.merge_taps().collect::<Vec<_>>(), vec![("delay[2] >> Expon", 2)]);
        assert_eq!(buf.max_delay(), 2);

        for v in [1.0, 2.0, 3.0] {
            buf.update(&scalar(v)).unwrap();
        }
        assert_eq!(buf.at("delay[2] >> Expon").unwrap(), &scalar(2.0));
        assert_eq!(buf.at_merge("delay[2] >> Expon").unwrap(), &scalar(1.0));
        assert_eq!(buf.at_merge("other").unwrap_err().kind(), ErrorKind::Lookup);
    }
}
