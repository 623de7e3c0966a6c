use crate::dynamics::{Comm, Shared, SynOutput};
use crate::error::Result;
use crate::node::ReceiveInput;
use crate::tensor::Tensor;

use super::{require_input, Projection};

/// Communication straight into an output accumulator. No synapse, no delay.
pub struct VanillaProj {
    name: String,
    comm: Box<dyn Comm>,
    out: Shared<dyn SynOutput>,
}

impl VanillaProj {
    pub fn new<Q>(name: impl Into<String>, comm: Box<dyn Comm>, out: Shared<dyn SynOutput>, post: &Q) -> Result<Self>
    where
        Q: ReceiveInput + ?Sized,
    {
        let name = name.into();
        post.add_input_function(&name, out.clone())?;
        tracing::debug!(projection = %name, post = post.name(), "wired vanilla projection");
        Ok(Self { name, comm, out })
    }

    pub fn out(&self) -> &Shared<dyn SynOutput> {
        &self.out
    }
}

impl Projection for VanillaProj {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> &'static str {
        "VanillaProj"
    }

    fn update(&mut self, x: Option<&Tensor>) -> Result<Tensor> {
        let current = self.comm.apply(require_input(&self.name, x)?)?;
        self.out.lock().bind_cond(&current)?;
        Ok(current)
    }

    fn needs_input(&self) -> bool {
        true
    }
}
