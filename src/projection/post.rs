//! Post-aligned projections: the synapse is dimensioned by the destination
//! and collects currents from every projection feeding it.

use crate::align::AlignPost;
use crate::delay::{Delay, DelayBuffer};
use crate::dynamics::{shared, AlignPostSynapse, Comm, ParamDesc, Shared, SynOutput};
use crate::error::{ProjError, Result};
use crate::hooks::{HookKey, NodeHook};
use crate::node::{DelaySupport, ReceiveInput};
use crate::tensor::Tensor;

use super::{check_output_tap, output_delay, require_input, Projection};

/// Returns the post-aligned unit registered on `post` under the
/// (synapse, output) descriptor pair, building it on first use.
///
/// Only the projection that builds the unit registers its output as an input
/// function of `post`; later projections reuse both.
fn managed_align_post<Q>(
    name: &str,
    syn: &ParamDesc<dyn AlignPostSynapse>,
    out: &ParamDesc<dyn SynOutput>,
    post: &Q,
) -> Result<(HookKey, Shared<AlignPost>)>
where
    Q: ReceiveInput + ?Sized,
{
    let key = HookKey::AlignPost {
        syn: syn.identity().clone(),
        out: out.identity().clone(),
    };
    let (hook, created) = post.hooks().get_or_insert_before(key.clone(), || {
        let syn = syn.build()?;
        let out = out.build()?;
        post.add_input_function(name, out.clone())?;
        Ok(NodeHook::AlignPost(shared(AlignPost::new(syn, out))))
    })?;
    if created {
        tracing::debug!(projection = name, post = post.name(), unit = %key, "created post-aligned unit");
    } else {
        tracing::debug!(projection = name, post = post.name(), unit = %key, "reusing post-aligned unit");
    }
    let unit = hook.as_align_post(&key)?;
    Ok((key, unit))
}

/// Managed post-aligned projection without delay.
///
/// Every projection into the same destination with equal synapse and output
/// descriptors feeds one shared synapse.
pub struct ProjAlignPostMg1 {
    name: String,
    comm: Box<dyn Comm>,
    key: HookKey,
    unit: Shared<AlignPost>,
}

impl ProjAlignPostMg1 {
    pub fn new<Q>(
        name: impl Into<String>,
        comm: Box<dyn Comm>,
        syn: &ParamDesc<dyn AlignPostSynapse>,
        out: &ParamDesc<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        let (key, unit) = managed_align_post(&name, syn, out, post)?;
        Ok(Self { name, comm, key, unit })
    }

    pub fn key(&self) -> &HookKey {
        &self.key
    }

    pub fn unit(&self) -> &Shared<AlignPost> {
        &self.unit
    }
}

impl Projection for ProjAlignPostMg1 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPostMg1"
    }

    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor> {
        let current = self.comm.apply(require_input(&self.name, x)?)?;
        self.unit.lock().add_current(&current)?;
        Ok(current)
    }

    fn needs_input(&self) -> bool {
        true
    }
}

/// Managed post-aligned projection reading a tap of the source's output
/// delay.
pub struct ProjAlignPostMg2 {
    name: String,
    comm: Box<dyn Comm>,
    delay: Shared<DelayBuffer>,
    key: HookKey,
    unit: Shared<AlignPost>,
}

impl ProjAlignPostMg2 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        delay: Option<Delay>,
        comm: Box<dyn Comm>,
        syn: &ParamDesc<dyn AlignPostSynapse>,
        out: &ParamDesc<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        P: DelaySupport + ?Sized,
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        check_output_tap(pre, &name, delay)?;
        let (key, unit) = managed_align_post(&name, syn, out, post)?;
        let buffer = output_delay(pre)?;
        buffer.lock().register_entry(name.as_str(), delay)?;
        Ok(Self {
            name,
            comm,
            delay: buffer,
            key,
            unit,
        })
    }

    pub fn key(&self) -> &HookKey {
        &self.key
    }

    pub fn unit(&self) -> &Shared<AlignPost> {
        &self.unit
    }

    pub fn delay(&self) -> &Shared<DelayBuffer> {
        &self.delay
    }
}

impl Projection for ProjAlignPostMg2 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPostMg2"
    }

    fn update(&mut self, _x: Option<&Tensor>) -> Result<Tensor> {
        let x = self.delay.lock().at(&self.name)?.clone();
        let current = self.comm.apply(&x)?;
        self.unit.lock().add_current(&current)?;
        Ok(current)
    }
}

/// Post-aligned projection owning its synapse and output.
pub struct ProjAlignPost1 {
    name: String,
    comm: Box<dyn Comm>,
    unit: Shared<AlignPost>,
}

impl ProjAlignPost1 {
    pub fn new<Q>(
        name: impl Into<String>,
        comm: Box<dyn Comm>,
        syn: Shared<dyn AlignPostSynapse>,
        out: Shared<dyn SynOutput>,
        post: &Q,
    ) -> Result<Self>
    where
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        let hook_key = HookKey::Named(name.clone());
        post.check_input(&name)?;
        if post.hooks().has_before(&hook_key) {
            return Err(ProjError::DuplicateHook(hook_key.to_string()));
        }
        post.add_input_function(&name, out.clone())?;
        let unit = shared(AlignPost::new(syn, out));
        post.hooks().add_before(hook_key, NodeHook::AlignPost(unit.clone()))?;
        tracing::debug!(projection = %name, post = post.name(), "registered post-aligned unit");
        Ok(Self { name, comm, unit })
    }

    pub fn unit(&self) -> &Shared<AlignPost> {
        &self.unit
    }
}

impl Projection for ProjAlignPost1 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPost1"
    }

    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor> {
        let current = self.comm.apply(require_input(&self.name, x)?)?;
        self.unit.lock().add_current(&current)?;
        Ok(current)
    }

    fn needs_input(&self) -> bool {
        true
    }
}

/// Post-aligned projection stepping its own synapse on a delayed source
/// signal.
pub struct ProjAlignPost2 {
    name: String,
    comm: Box<dyn Comm>,
    delay: Shared<DelayBuffer>,
    syn: Shared<dyn AlignPostSynapse>,
    out: Shared<dyn SynOutput>,
}

impl ProjAlignPost2 {
    pub fn new<P, Q>(
        name: impl Into<String>,
        pre: &P,
        delay: Option<Delay>,
        comm: Box<dyn Comm>,
        syn: Shared<dyn AlignPostSynapse>,
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
            delay: buffer,
            syn,
            out,
        })
    }

    pub fn syn(&self) -> &Shared<dyn AlignPostSynapse> {
        &self.syn
    }

    pub fn delay(&self) -> &Shared<DelayBuffer> {
        &self.delay
    }
}

impl Projection for ProjAlignPost2 {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "ProjAlignPost2"
    }

    fn update(&mut self, _x: Option<&Tensor>) -> Result<Tensor> {
        let x = self.delay.lock().at(&self.name)?.clone();
        let current = self.comm.apply(&x)?;
        let g = self.syn.lock().update(Some(&current))?;
        self.out.lock().bind_cond(&g)?;
        Ok(g)
    }

    fn reset(&mut self) {
        self.syn.lock().reset();
        self.out.lock().reset();
    }
}
