//! Build tensors and typed records from declarative parameter files.
//!
//! A YAML specification is validated into records implementing
//! [`ParameterisedModel`]. Fields declared as parameterised are built by
//! the first matching strategy registered for their type, e.g. a Gaussian
//! sample for `{mean, std, size}` or a constant fill for a bare number.
//! Every record keeps the raw mapping it was built from as `params`.

pub mod builder;
pub mod context;
pub mod error;
pub mod model;
pub mod strategy;
pub mod tensor;

pub use builder::{BuildStrategy, Builder, Parameterise, StrategyEntry, backfill, parameterise};
pub use context::Context;
pub use error::{PramError, Result, StrategyNoMatch};
pub use model::{Fields, Params, ParameterisedModel, ParamsFormat, load_parameters};
pub use strategy::{GaussianStrategy, NumberStrategy, UniformStrategy, default_strategies};
pub use tensor::Tensor;
