//! Pre-aligned projections: the synapse is dimensioned by the source and
//! stepped once per source population, whatever the number of targets.

use crate::align::{AlignPre, AlignPreMerge};
use crate::delay::{resolve_delay, Delay, DelayBuffer};
use crate::dynamics::{shared, Comm, ParamDesc, PreSynapse, Shared, SynOutput};
use crate::error::{ProjError, Result};
use crate::hooks::{HookKey, NodeHook};
use crate::node::{DelaySupport, HookHost, ReceiveInput};
use crate::tensor::Tensor;

use super::{check_output_tap, existing_output_delay, output_delay, Projection};

/// Managed pre-aligned projection with the delay after the synapse.
///
/// One synapse (and one delay over its output) per source and synapse
/// descriptor; each projection reads its own tap of that delay.
pub struct ProjAlignPreMg1 {
    name: String,
    comm: Box<dyn Comm>,
    out: Shared<dyn SynOutput>,
    key: HookKey,
    unit: Shared<AlignPre>,
}

impl ProjAlignPreMg1 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        syn: &ParamDesc<dyn PreSynapse>,
        delay: Option<Delay>,
        comm: Box<dyn Comm>,
        out: Shared<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        P: HookHost + ?Sized,
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        let key = HookKey::AlignPre {
            syn: syn.identity().clone(),
        };
        let dt = pre.dt();
        post.check_input(&name)?;
        resolve_delay(delay, dt)?;
        let existing = {
            let hooks = pre.hooks();
            if hooks.has_after(&key) {
                Some(hooks.get_after(&key)?.as_align_pre(&key)?)
            } else {
                None
            }
        };
        if let Some(unit) = existing {
            unit.lock().check_entry(&name, delay)?;
        }

        let (hook, created) = pre.hooks().get_or_insert_after(key.clone(), || {
            Ok(NodeHook::AlignPre(shared(AlignPre::delayed(syn.build()?, dt)?)))
        })?;
        if created {
            tracing::debug!(projection = %name, pre = pre.name(), unit = %key, "created pre-aligned unit");
        } else {
            tracing::debug!(projection = %name, pre = pre.name(), unit = %key, "reusing pre-aligned unit");
        }
        let unit = hook.as_align_pre(&key)?;
        unit.lock().register_entry(&name, delay)?;
        post.add_input_function(&name, out.clone())?;
        Ok(Self {
            name,
            comm,
            out,
            key,
            unit,
        })
    }

    pub fn key(&self) -> &HookKey {
        &self.key
    }

    pub fn unit(&self) -> &Shared<AlignPre> {
        &self.unit
    }
}

impl Projection for ProjAlignPreMg1 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPreMg1"
    }

    /// Uses `x` as the synaptic value when given, otherwise reads this
    /// projection's tap.
    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor> {
        let current = match x {
            Some(x) => self.comm.apply(x)?,
            None => {
                let g = self.unit.lock().at(&self.name)?;
                self.comm.apply(&g)?
            }
        };
        self.out.lock().bind_cond(&current)?;
        Ok(current)
    }
}

/// Managed pre-aligned projection with the delay before the synapse.
///
/// The source's output delay hosts one synapse per (offset, synapse
/// descriptor) pair, stepped right after each rotation.
pub struct ProjAlignPreMg2 {
    name: String,
    comm: Box<dyn Comm>,
    out: Shared<dyn SynOutput>,
    delay: Shared<DelayBuffer>,
    key: HookKey,
    merge: Shared<AlignPreMerge>,
}

impl ProjAlignPreMg2 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        delay: Option<Delay>,
        syn: &ParamDesc<dyn PreSynapse>,
        comm: Box<dyn Comm>,
        out: Shared<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        P: DelaySupport + ?Sized,
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        post.check_input(&name)?;
        let steps = resolve_delay(delay, pre.dt())?.unwrap_or(0);
        let key = HookKey::DelayedSynapse {
            delay: steps,
            syn: syn.identity().clone(),
        };
        let tap = key.to_string();

        // Nothing on `pre` changes until the synapse is built.
        let existing = match existing_output_delay(pre)? {
            Some(buffer) => {
                let buffer = buffer.lock();
                if buffer.hooks().has_after(&key) {
                    Some(buffer.hooks().get_after(&key)?.clone())
                } else {
                    None
                }
            }
            None => {
                pre.return_info()?.initial_value()?;
                None
            }
        };
        let (merge, created) = match existing {
            Some(merge) => (merge, false),
            None => (shared(AlignPreMerge::new(tap.as_str(), syn.build()?)), true),
        };

        let buffer = output_delay(pre)?;
        {
            let mut buffer = buffer.lock();
            buffer.register_merge_entry(tap.as_str(), steps)?;
            if created {
                buffer.hooks_mut().add_after(key.clone(), merge.clone())?;
            }
        }
        if created {
            tracing::debug!(projection = %name, pre = pre.name(), unit = %key, "created delayed synapse");
        } else {
            tracing::debug!(projection = %name, pre = pre.name(), unit = %key, "reusing delayed synapse");
        }

        post.add_input_function(&name, out.clone())?;
        Ok(Self {
            name,
            comm,
            out,
            delay: buffer,
            key,
            merge,
        })
    }

    pub fn key(&self) -> &HookKey {
        &self.key
    }

    pub fn merge(&self) -> &Shared<AlignPreMerge> {
        &self.merge
    }

    pub fn delay(&self) -> &Shared<DelayBuffer> {
        &self.delay
    }
}

impl Projection for ProjAlignPreMg2 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPreMg2"
    }

    fn update(&mut self, _x: Option<&Tensor>) -> Result<Tensor> {
        let g = self.merge.lock().value().clone();
        let current = self.comm.apply(&g)?;
        self.out.lock().bind_cond(&current)?;
        Ok(current)
    }
}

/// Pre-aligned projection owning its synapse and the delay over its output.
pub struct ProjAlignPre1 {
    name: String,
    comm: Box<dyn Comm>,
    out: Shared<dyn SynOutput>,
    unit: Shared<AlignPre>,
}

impl ProjAlignPre1 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        syn: Shared<dyn PreSynapse>,
        delay: Option<Delay>,
        comm: Box<dyn Comm>,
        out: Shared<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        P: HookHost + ?Sized,
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        let hook_key = HookKey::Named(name.clone());
        post.check_input(&name)?;
        if pre.hooks().has_after(&hook_key) {
            return Err(ProjError::DuplicateHook(hook_key.to_string()));
        }
        let mut unit = AlignPre::delayed(syn, pre.dt())?;
        unit.register_entry(&name, delay)?;
        let unit = shared(unit);
        pre.hooks().add_after(hook_key, NodeHook::AlignPre(unit.clone()))?;
        post.add_input_function(&name, out.clone())?;
        tracing::debug!(projection = %name, pre = pre.name(), "registered pre-aligned unit");
        Ok(Self {
            name,
            comm,
            out,
            unit,
        })
    }

    pub fn unit(&self) -> &Shared<AlignPre> {
        &self.unit
    }
}

impl Projection for ProjAlignPre1 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPre1"
    }

    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor> {
        let current = match x {
            Some(x) => self.comm.apply(x)?,
            None => {
                let g = self.unit.lock().at(&self.name)?;
                self.comm.apply(&g)?
            }
        };
        self.out.lock().bind_cond(&current)?;
        Ok(current)
    }
}

/// Pre-aligned projection stepping its own synapse on a tap of the source's
/// output delay.
pub struct ProjAlignPre2 {
    name: String,
    comm: Box<dyn Comm>,
    syn: Shared<dyn PreSynapse>,
    out: Shared<dyn SynOutput>,
    delay: Shared<DelayBuffer>,
}

impl ProjAlignPre2 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        delay: Option<Delay>,
        syn: Shared<dyn PreSynapse>,
        comm: Box<dyn Comm>,
        out: Shared<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        P: DelaySupport + ?Sized,
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        post.check_input(&name)?;
        check_output_tap(pre, &name, delay)?;
        let buffer = output_delay(pre)?;
        buffer.lock().register_entry(name.as_str(), delay)?;
        post.add_input_function(&name, out.clone())?;
        Ok(Self {
            name,
            comm,
            syn,
            out,
            delay: buffer,
        })
    }

    pub fn syn(&self) -> &Shared<dyn PreSynapse> {
        &self.syn
    }

    pub fn delay(&self) -> &Shared<DelayBuffer> {
        &self.delay
    }
}

impl Projection for ProjAlignPre2 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPre2"
    }

    fn update(&mut self, _x: Option<&Tensor>) -> Result<Tensor> {
        let spikes = self.delay.lock().at(&self.name)?.clone();
        let g = self.syn.lock().update(Some(&spikes))?;
        let current = self.comm.apply(&g)?;
        self.out.lock().bind_cond(&current)?;
        Ok(current)
    }

    fn reset(&mut self) {
        self.syn.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::Synapse;
    use crate::error::ErrorKind;
    use crate::models::{Cuba, Expon, Lif, OneToOne};
    use crate::node::Population;
    use crate::params::Params;
    use std::sync::Arc;

    fn pops() -> (Population, Population) {
        (
            Population::new(0, "E", Lif::new(&[2], 0.1), 0.1),
            Population::new(1, "I", Lif::new(&[2], 0.1), 0.1),
        )
    }

    fn expon(tau: f64) -> ParamDesc<dyn PreSynapse> {
        ParamDesc::of::<Expon>(Params::new().with("size", 2usize).with("tau", tau))
    }

    fn one_to_one() -> Box<dyn Comm> {
        Box::new(OneToOne::new(1.0))
    }

    fn spikes(v: &[f64]) -> Tensor {
        Tensor::vector(v.to_vec())
    }

    #[test]
    fn test_mg1_shares_synapse_and_delay() {
        let (pre, post) = pops();
        let a = ProjAlignPreMg1::new("a", &pre, &expon(5.0), None, one_to_one(), shared(Cuba::new()), &post).unwrap();
        let b = ProjAlignPreMg1::new("b", &pre, &expon(5.0), Some(Delay::Steps(2)), one_to_one(), shared(Cuba::new()), &post)
            .unwrap();
        assert!(Arc::ptr_eq(a.unit(), b.unit()));
        assert_eq!(pre.after_hook_count(), 1);
        assert_eq!(a.unit().lock().delay().map(|d| d.depth()), Some(3));
        assert_eq!(post.input_count(), 2);
    }

    #[test]
    fn test_mg1_reads_synaptic_delay() {
        let (pre, post) = pops();
        let mut proj =
            ProjAlignPreMg1::new("p", &pre, &expon(5.0), Some(Delay::Steps(1)), one_to_one(), shared(Cuba::new()), &post)
                .unwrap();

        proj.unit().lock().update(&spikes(&[1.0, 0.0])).unwrap();
        assert_eq!(proj.update(None).unwrap(), spikes(&[0.0, 0.0]));
        proj.unit().lock().update(&spikes(&[0.0, 0.0])).unwrap();
        assert_eq!(proj.update(None).unwrap(), spikes(&[1.0, 0.0]));

        // An explicit value bypasses the tap.
        assert_eq!(proj.update(Some(&spikes(&[3.0, 3.0]))).unwrap(), spikes(&[3.0, 3.0]));
    }

    #[test]
    fn test_mg2_one_merge_per_offset_and_descriptor() {
        let (pre, post) = pops();
        let out = || -> Shared<dyn SynOutput> { shared(Cuba::new()) };
        let a = ProjAlignPreMg2::new("a", &pre, Some(Delay::Steps(1)), &expon(5.0), one_to_one(), out(), &post).unwrap();
        let b = ProjAlignPreMg2::new("b", &pre, Some(Delay::Time(0.1)), &expon(5.0), one_to_one(), out(), &post).unwrap();
        let c = ProjAlignPreMg2::new("c", &pre, Some(Delay::Steps(2)), &expon(5.0), one_to_one(), out(), &post).unwrap();
        let d = ProjAlignPreMg2::new("d", &pre, None, &expon(5.0), one_to_one(), out(), &post).unwrap();
        let e = ProjAlignPreMg2::new("e", &pre, Some(Delay::Steps(0)), &expon(5.0), one_to_one(), out(), &post).unwrap();

        assert!(Arc::ptr_eq(a.merge(), b.merge()));
        assert!(!Arc::ptr_eq(a.merge(), c.merge()));
        assert!(Arc::ptr_eq(d.merge(), e.merge()));
        assert!(Arc::ptr_eq(a.delay(), c.delay()));
        assert_eq!(a.delay().lock().hooks().after().len(), 3);
        assert_eq!(a.key().to_string(), "delay[1] >> Expon(size=[2], tau=5)");
    }

    #[test]
    fn test_mg2_merge_runs_on_rotation() {
        let (pre, post) = pops();
        let mut proj =
            ProjAlignPreMg2::new("p", &pre, Some(Delay::Steps(1)), &expon(5.0), one_to_one(), shared(Cuba::new()), &post)
                .unwrap();

        proj.delay().lock().update(&spikes(&[1.0, 1.0])).unwrap();
        assert_eq!(proj.update(None).unwrap(), spikes(&[0.0, 0.0]));
        proj.delay().lock().update(&spikes(&[0.0, 0.0])).unwrap();
        assert_eq!(proj.update(None).unwrap(), spikes(&[1.0, 1.0]));
    }

    #[test]
    fn test_pre1_owns_its_unit() {
        let (pre, post) = pops();
        let a = ProjAlignPre1::new("a", &pre, shared(Expon::new(&[2], 5.0, 0.1)), None, one_to_one(), shared(Cuba::new()), &post)
            .unwrap();
        let b = ProjAlignPre1::new("b", &pre, shared(Expon::new(&[2], 5.0, 0.1)), None, one_to_one(), shared(Cuba::new()), &post)
            .unwrap();
        assert!(!Arc::ptr_eq(a.unit(), b.unit()));
        assert_eq!(pre.after_hook_count(), 2);
    }

    #[test]
    fn test_pre2_steps_synapse_on_tap() {
        let (pre, post) = pops();
        let syn = shared(Expon::new(&[2], 5.0, 0.1));
        let mut proj = ProjAlignPre2::new("p", &pre, None, syn.clone(), one_to_one(), shared(Cuba::new()), &post).unwrap();

        proj.delay().lock().update(&spikes(&[0.0, 1.0])).unwrap();
        assert_eq!(proj.update(None).unwrap(), spikes(&[0.0, 1.0]));
        assert_eq!(syn.lock().state(), &spikes(&[0.0, 1.0]));
    }

    #[test]
    fn test_pre2_requires_delayable_source() {
        let (_, post) = pops();
        let src = Population::new(0, "S", crate::models::ScriptedSource::silent(&[2]).opaque(), 0.1);
        let err = ProjAlignPre2::new("p", &src, None, shared(Expon::new(&[2], 5.0, 0.1)), one_to_one(), shared(Cuba::new()), &post)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(post.input_count(), 0);
    }
}
