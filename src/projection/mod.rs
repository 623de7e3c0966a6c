//! Projection variants.
//!
//! A projection connects a source population to a destination population.
//! Construction wires it into both nodes (registering delay taps, shared
//! alignment units and input functions); [`Projection::update`] then moves
//! one step of signal through it.
//!
//! | Variant | Delay | Alignment | Sharing |
//! |---|---|---|---|
//! | [`VanillaProj`] | none | none | none |
//! | [`ProjAlignPostMg1`] / [`ProjAlignPost1`] | none | post | managed / explicit |
//! | [`ProjAlignPostMg2`] / [`ProjAlignPost2`] | raw source output | post | managed / explicit |
//! | [`ProjAlignPreMg1`] / [`ProjAlignPre1`] | after the synapse | pre | managed / explicit |
//! | [`ProjAlignPreMg2`] / [`ProjAlignPre2`] | before the synapse | pre | managed / explicit |
//!
//! Managed variants receive [`ParamDesc`](crate::dynamics::ParamDesc)
//! descriptors and build a shared unit only if no unit with the same
//! structural key is registered yet. Explicit variants receive instances and
//! never share.

mod post;
mod pre;
mod vanilla;

pub use post::{ProjAlignPost1, ProjAlignPost2, ProjAlignPostMg1, ProjAlignPostMg2};
pub use pre::{ProjAlignPre1, ProjAlignPre2, ProjAlignPreMg1, ProjAlignPreMg2};
pub use vanilla::VanillaProj;

use crate::delay::{resolve_delay, Delay, DelayBuffer};
use crate::dynamics::{shared, Shared};
use crate::error::{ProjError, Result};
use crate::hooks::{HookKey, NodeHook};
use crate::node::{DelaySupport, HookHost};
use crate::tensor::Tensor;

/// A connection stepped once per simulation step.
pub trait Projection: Send {
    fn name(&self) -> &str;

    /// Short variant tag, e.g. `"ProjAlignPostMg2"`.
    fn variant(&self) -> &'static str;

    /// Moves one step of signal through the projection.
    ///
    /// Variants without a delay consume `x` (the source output); delayed
    /// variants read their tap and ignore it. Returns the value bound into
    /// the destination (a current or a conductance).
    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor>;

    /// Whether `update` needs the source output passed in.
    fn needs_input(&self) -> bool {
        false
    }

    /// Clears state the projection owns outside any node hook.
    fn reset(&mut self) {}
}

/// Returns the delay buffer over `pre`'s output, creating and registering
/// it as an after-update hook on first use.
pub(crate) fn output_delay<P>(pre: &P) -> Result<Shared<DelayBuffer>>
where
    P: DelaySupport + ?Sized,
{
    let info = pre.return_info()?;
    let dt = pre.dt();
    let (hook, created) = pre.hooks().get_or_insert_after(HookKey::OutputDelay, || {
        Ok(NodeHook::OutputDelay(shared(DelayBuffer::new(&info, dt)?)))
    })?;
    if created {
        tracing::debug!(node = pre.name(), "created output delay");
    }
    hook.as_output_delay(&HookKey::OutputDelay)
}

/// The delay buffer over `pre`'s output, if one is registered.
pub(crate) fn existing_output_delay<P>(pre: &P) -> Result<Option<Shared<DelayBuffer>>>
where
    P: HookHost + ?Sized,
{
    let hooks = pre.hooks();
    if !hooks.has_after(&HookKey::OutputDelay) {
        return Ok(None);
    }
    let buffer = hooks.get_after(&HookKey::OutputDelay)?.as_output_delay(&HookKey::OutputDelay)?;
    Ok(Some(buffer))
}

/// Checks that `tap` could be registered on `pre`'s output delay. Neither
/// the buffer nor the tap is created.
pub(crate) fn check_output_tap<P>(pre: &P, tap: &str, delay: Option<Delay>) -> Result<()>
where
    P: DelaySupport + ?Sized,
{
    match existing_output_delay(pre)? {
        Some(buffer) => {
            buffer.lock().check_entry(tap, delay)?;
        }
        None => {
            pre.return_info()?.initial_value()?;
            resolve_delay(delay, pre.dt())?;
        }
    }
    Ok(())
}

pub(crate) fn require_input<'a>(name: &str, x: Option<&'a Tensor>) -> Result<&'a Tensor> {
    x.ok_or_else(|| ProjError::MissingInput(name.to_string()))
}
