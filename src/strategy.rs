//! Tensor build strategies
//!
//! `Tensor` registers, in priority order:
//! 1. [`GaussianStrategy`] - `{mean, std, size, ...}`
//! 2. [`UniformStrategy`] - `{low, high, size}`
//! 3. [`NumberStrategy`] - a bare number, filled to the sibling `size`

use crate::builder::{BuildStrategy, Builder, Parameterise, backfill};
use crate::context::Context;
use crate::error::{PramError, Result, StrategyNoMatch};
use crate::tensor::Tensor;
use rand::Rng;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

/// Sample a tensor from a Gaussian distribution
#[derive(Debug, Clone, Deserialize)]
pub struct GaussianStrategy {
    pub mean: f32,
    pub std: f32,
    pub size: Vec<usize>,
    #[serde(default)]
    pub train: bool,
    #[serde(default)]
    pub abs: bool,
    #[serde(default)]
    pub minimum: Option<f32>,
    #[serde(default)]
    pub maximum: Option<f32>,
    /// Probability that a sampled element is kept (others become 0)
    #[serde(default)]
    pub density: Option<f32>,
    #[serde(default)]
    pub round: bool,
    /// Fraction of excitatory columns in a square recurrent tensor
    #[serde(default)]
    pub parity_ratio: Option<f32>,
}

impl GaussianStrategy {
    fn validate(&self) -> Result<()> {
        if let Some(density) = self.density
            && !(0.0..=1.0).contains(&density)
        {
            return Err(PramError::InvalidParameter(format!(
                "density must be within [0, 1], got {density}"
            )));
        }
        if let Some(ratio) = self.parity_ratio {
            if self.size.len() != 2 || self.size[0] != self.size[1] {
                return Err(PramError::InvalidParameter(
                    "Currently only supporting parity on recurrent tensors".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&ratio) {
                return Err(PramError::InvalidParameter(format!(
                    "parity_ratio must be within [0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

impl BuildStrategy<Tensor> for GaussianStrategy {
    const NAME: &'static str = "GaussianStrategy";
    const REQUIRED: &'static [&'static str] = &["mean", "std", "size"];

    fn parse(raw: Value, ctx: &Context<'_>) -> std::result::Result<Mapping, StrategyNoMatch> {
        let Value::Mapping(mut map) = raw else {
            return Err(StrategyNoMatch);
        };
        backfill(&mut map, &["size", "parity_ratio"], ctx);
        if Self::matches(&map) {
            Ok(map)
        } else {
            Err(StrategyNoMatch)
        }
    }

    fn build(self) -> Result<Tensor> {
        self.validate()?;
        let mut tensor = Tensor::normal(&self.size, self.mean, self.std)?;

        if self.abs {
            tensor.map_inplace(f32::abs);
        }

        if self.round {
            tensor.map_inplace(f32::trunc);
        }

        if let Some(minimum) = self.minimum {
            tensor.map_inplace(|x| if x < minimum { minimum } else { x });
        }

        if let Some(maximum) = self.maximum {
            tensor.map_inplace(|x| if x > maximum { maximum } else { x });
        }

        if let Some(density) = self.density {
            let mut rng = rand::rng();
            for x in &mut tensor.data {
                if !rng.random_bool(f64::from(density)) {
                    *x = 0.0;
                }
            }
        }

        if let Some(ratio) = self.parity_ratio {
            apply_parity(&mut tensor, ratio);
        }

        if self.train {
            return Ok(tensor.into_parameter());
        }
        Ok(tensor)
    }
}

/// Multiply a square tensor by diag(sign): the first `n * ratio` columns are
/// excitatory and keep their sign, the rest are negated.
///
/// This completes the parity option on purpose: the sign mask is applied to
/// the samples, not only computed.
fn apply_parity(tensor: &mut Tensor, ratio: f32) {
    let n = tensor.shape[0];
    if n == 0 {
        return;
    }
    let num_exc = (n as f32 * ratio) as usize;
    for row in tensor.data.chunks_mut(n) {
        for x in &mut row[num_exc..] {
            *x = -*x;
        }
    }
}

/// Sample a tensor uniformly from [low, high)
#[derive(Debug, Clone, Deserialize)]
pub struct UniformStrategy {
    pub low: f32,
    pub high: f32,
    pub size: Vec<usize>,
    #[serde(default)]
    pub train: bool,
}

impl BuildStrategy<Tensor> for UniformStrategy {
    const NAME: &'static str = "UniformStrategy";
    const REQUIRED: &'static [&'static str] = &["low", "high", "size"];

    fn build(self) -> Result<Tensor> {
        let tensor = Tensor::uniform(&self.size, self.low, self.high)?;
        if self.train {
            return Ok(tensor.into_parameter());
        }
        Ok(tensor)
    }
}

/// Fill a tensor with a single number. Only bare numbers match; the shape
/// comes from the sibling `size` field.
#[derive(Debug, Clone, Deserialize)]
pub struct NumberStrategy {
    pub value: f32,
    pub size: Vec<usize>,
}

impl BuildStrategy<Tensor> for NumberStrategy {
    const NAME: &'static str = "NumberStrategy";
    const REQUIRED: &'static [&'static str] = &["value", "size"];

    fn parse(raw: Value, ctx: &Context<'_>) -> std::result::Result<Mapping, StrategyNoMatch> {
        if !raw.is_number() {
            return Err(StrategyNoMatch);
        }
        let size = ctx.sibling("size").ok_or(StrategyNoMatch)?;
        let mut map = Mapping::new();
        map.insert(Value::from("value"), raw);
        map.insert(Value::from("size"), size.clone());
        Ok(map)
    }

    fn build(self) -> Result<Tensor> {
        Tensor::full(&self.size, self.value)
    }
}

/// The tensor builder with the built-in strategies in priority order
pub fn default_strategies() -> Builder<Tensor> {
    Builder::new("Tensor")
        .recognise(Tensor::from_value)
        .with::<GaussianStrategy>()
        .with::<UniformStrategy>()
        .with::<NumberStrategy>()
}

impl Parameterise for Tensor {
    fn builder() -> &'static Builder<Tensor> {
        static BUILDER: OnceLock<Builder<Tensor>> = OnceLock::new();
        BUILDER.get_or_init(default_strategies)
    }
}
