//! Communication operators.

use crate::dynamics::Comm;
use crate::error::{ProjError, Result};
use crate::params::{FromParams, Params};
use crate::tensor::Tensor;

/// Element-wise scaling; pre and post have the same size.
#[derive(Clone, Debug)]
pub struct OneToOne {
    pub weight: f64,
}

impl OneToOne {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl FromParams for OneToOne {
    const KIND: &'static str = "OneToOne";

    fn from_params(params: &Params) -> Result<Self> {
        Ok(OneToOne::new(params.number_or("weight", 1.0)?))
    }
}

impl Comm for OneToOne {
    fn apply(&self, input: &Tensor) -> Result<Tensor> {
        let w = self.weight;
        Ok(input.map(|x| x * w))
    }
}

/// Every pre neuron connects to every post neuron with the same weight.
#[derive(Clone, Debug)]
pub struct AllToAll {
    pub weight: f64,
    pub post_size: usize,
    /// When pre and post are the same size, whether neuron `i` connects to
    /// post neuron `i`.
    pub include_self: bool,
}

impl AllToAll {
    pub fn new(post_size: usize, weight: f64) -> Self {
        Self {
            weight,
            post_size,
            include_self: true,
        }
    }

    pub fn without_self(mut self) -> Self {
        self.include_self = false;
        self
    }
}

impl FromParams for AllToAll {
    const KIND: &'static str = "AllToAll";

    fn from_params(params: &Params) -> Result<Self> {
        let post_size = params.number("post_size")?;
        if post_size < 0.0 || post_size.fract() != 0.0 {
            return Err(ProjError::param("post_size", format!("{} is not a valid size", post_size)));
        }
        Ok(Self {
            weight: params.number_or("weight", 1.0)?,
            post_size: post_size as usize,
            include_self: params.flag_or("include_self", true)?,
        })
    }
}

impl Comm for AllToAll {
    fn apply(&self, input: &Tensor) -> Result<Tensor> {
        let total = input.sum() * self.weight;
        let mut out = Tensor::filled(&[self.post_size], total);
        if !self.include_self && input.len() == self.post_size {
            for (o, &x) in out.data_mut().iter_mut().zip(input.data()) {
                *o -= x * self.weight;
            }
        }
        Ok(out)
    }
}

/// Dense weight matrix, `weights[i][j]` from pre neuron `i` to post neuron
/// `j`.
#[derive(Clone, Debug)]
pub struct Dense {
    weights: Vec<Vec<f64>>,
    post_size: usize,
}

impl Dense {
    pub fn new(weights: Vec<Vec<f64>>) -> Result<Self> {
        let post_size = weights.first().map(Vec::len).unwrap_or(0);
        if weights.iter().any(|row| row.len() != post_size) {
            return Err(ProjError::param("weights", "rows must all have the same length"));
        }
        Ok(Self { weights, post_size })
    }

    pub fn pre_size(&self) -> usize {
        self.weights.len()
    }

    pub fn post_size(&self) -> usize {
        self.post_size
    }
}

impl FromParams for Dense {
    const KIND: &'static str = "Dense";

    fn from_params(params: &Params) -> Result<Self> {
        Dense::new(params.matrix("weights")?)
    }
}

impl Comm for Dense {
    fn apply(&self, input: &Tensor) -> Result<Tensor> {
        input.check_shape(&[self.pre_size()])?;
        let mut out = Tensor::zeros(&[self.post_size]);
        let acc = out.data_mut();
        for (&x, row) in input.data().iter().zip(&self.weights) {
            if x == 0.0 {
                continue;
            }
            for (o, &w) in acc.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        Ok(out)
    }
}
