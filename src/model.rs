//! Records that remember the parameters they were built from
//!
//! A record implements [`ParameterisedModel`] by reading its fields from a
//! [`Fields`] validator in declaration order:
//!
//! ```no_run
//! use pram::{Fields, Params, ParameterisedModel, Result, Tensor};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Synapse {
//!     weights: Tensor,
//!     tau: u32,
//!     #[serde(skip)]
//!     params: Params,
//! }
//!
//! impl ParameterisedModel for Synapse {
//!     const NAME: &'static str = "Synapse";
//!
//!     fn from_fields(fields: &Fields<'_>) -> Result<Self> {
//!         Ok(Synapse {
//!             weights: fields.parameterised("weights")?,
//!             tau: fields.value("tau")?,
//!             params: fields.params(),
//!         })
//!     }
//!
//!     fn params(&self) -> &Params {
//!         &self.params
//!     }
//! }
//!
//! let synapse = Synapse::from_parameters("synapse.yaml")?;
//! synapse.save("out/synapse.yaml", true)?;
//! # Ok::<(), pram::PramError>(())
//! ```

use crate::builder::Parameterise;
use crate::context::Context;
use crate::error::{PramError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Raw mapping a record was built from, shared by every record of one tree
pub type Params = Arc<Mapping>;

/// Reserved key: a mapping stored under it is taken as already-captured
/// parameters instead of a field.
pub const PARAMS_KEY: &str = "params";

/// Format of a parameters dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamsFormat {
    #[default]
    Yaml,
    Json,
}

/// Validator for the fields of one record.
///
/// Holds the record's raw mapping, the captured params and the outermost
/// specification, and hands each field to the right reader.
pub struct Fields<'a> {
    model: &'static str,
    path: String,
    raw: &'a Mapping,
    params: Params,
    global: Params,
}

fn captured(map: &Mapping) -> Option<Params> {
    map.get(PARAMS_KEY)
        .and_then(Value::as_mapping)
        .map(|p| Arc::new(p.clone()))
}

impl<'a> Fields<'a> {
    /// Validator for an outermost record. Without an explicit `global`
    /// context, the captured params serve as the outermost specification.
    pub fn root(model: &'static str, raw: &'a Value, global: Option<Params>) -> Result<Self> {
        let map = raw
            .as_mapping()
            .ok_or_else(|| PramError::NotAMapping(model.to_string()))?;
        let params = captured(map).unwrap_or_else(|| Arc::new(map.clone()));
        let global = global.unwrap_or_else(|| params.clone());
        Ok(Fields {
            model,
            path: String::new(),
            raw: map,
            params,
            global,
        })
    }

    fn child(&self, model: &'static str, path: String, raw: &'a Value) -> Result<Fields<'a>> {
        let map = raw
            .as_mapping()
            .ok_or_else(|| PramError::NotAMapping(path.clone()))?;
        let params = captured(map).unwrap_or_else(|| self.params.clone());
        Ok(Fields {
            model,
            path,
            raw: map,
            params,
            global: self.global.clone(),
        })
    }

    /// Dotted path of a field of this record
    pub fn path_of(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    /// Captured params, to be stored on the record
    pub fn params(&self) -> Params {
        self.params.clone()
    }

    /// Raw value of a field; null counts as absent
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        let raw: &'a Mapping = self.raw;
        raw.get(name).filter(|v| !v.is_null())
    }

    fn require(&self, name: &str) -> Result<&'a Value> {
        self.raw(name).ok_or_else(|| PramError::MissingField {
            model: self.model,
            field: self.path_of(name),
        })
    }

    fn build<T: Parameterise>(&self, name: &str, raw: &Value) -> Result<T> {
        let path = self.path_of(name);
        let ctx = Context::new(&path, self.raw, &self.global);
        T::builder().build(raw, &ctx)
    }

    /// A field built through the strategies registered for `T`
    pub fn parameterised<T: Parameterise>(&self, name: &str) -> Result<T> {
        let raw = self.require(name)?;
        self.build(name, raw)
    }

    pub fn optional_parameterised<T: Parameterise>(&self, name: &str) -> Result<Option<T>> {
        self.raw(name).map(|raw| self.build(name, raw)).transpose()
    }

    /// A plain typed field
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = self.require(name)?;
        self.decode(name, raw)
    }

    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.raw(name).map(|raw| self.decode(name, raw)).transpose()
    }

    pub fn value_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.optional(name)?.unwrap_or(default))
    }

    fn decode<T: DeserializeOwned>(&self, name: &str, raw: &Value) -> Result<T> {
        serde_yaml::from_value(raw.clone()).map_err(|source| PramError::InvalidField {
            field: self.path_of(name),
            source,
        })
    }

    /// A nested record. It shares this record's params and outermost context.
    pub fn model<M: ParameterisedModel>(&self, name: &str) -> Result<M> {
        let raw = self.require(name)?;
        M::from_fields(&self.child(M::NAME, self.path_of(name), raw)?)
    }

    pub fn optional_model<M: ParameterisedModel>(&self, name: &str) -> Result<Option<M>> {
        self.raw(name)
            .map(|raw| M::from_fields(&self.child(M::NAME, self.path_of(name), raw)?))
            .transpose()
    }

    /// A list of nested records
    pub fn models<M: ParameterisedModel>(&self, name: &str) -> Result<Vec<M>> {
        let raw = self.require(name)?;
        let items = raw.as_sequence().ok_or_else(|| PramError::InvalidField {
            field: self.path_of(name),
            source: serde::de::Error::custom("expected a sequence of records"),
        })?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let path = format!("{}[{}]", self.path_of(name), i);
                M::from_fields(&self.child(M::NAME, path, item)?)
            })
            .collect()
    }
}

/// A record that captures the raw parameters it was validated from.
///
/// Implementors read their fields in `from_fields` and store
/// `fields.params()`. The `Serialize` impl should skip the params; it is
/// used for the model dump.
pub trait ParameterisedModel: Serialize + Sized {
    const NAME: &'static str;

    fn from_fields(fields: &Fields<'_>) -> Result<Self>;

    fn params(&self) -> &Params;

    /// Validate a record on its own; its raw mapping is the outermost context
    fn model_validate(raw: &Value) -> Result<Self> {
        Self::from_fields(&Fields::root(Self::NAME, raw, None)?)
    }

    /// Validate a record against an explicit outermost specification
    fn model_validate_with_context(raw: &Value, context: Mapping) -> Result<Self> {
        Self::from_fields(&Fields::root(Self::NAME, raw, Some(Arc::new(context)))?)
    }

    /// Load a YAML specification and validate the whole tree against it
    fn from_parameters(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let params = load_parameters(file)?;
        tracing::info!(path = %file.display(), model = Self::NAME, "validating parameters");
        Self::model_validate(&Value::Mapping(params))
    }

    /// The built field values, tensors in their serialized form
    fn model_dump(&self) -> Result<Value> {
        Ok(serde_yaml::to_value(self)?)
    }

    fn save_parameters(&self, loc: impl AsRef<Path>, format: ParamsFormat) -> Result<()> {
        let loc = loc.as_ref();
        ensure_parent(loc)?;
        let text = match format {
            ParamsFormat::Yaml => serde_yaml::to_string(&**self.params())?,
            ParamsFormat::Json => serde_json::to_string_pretty(&**self.params())?,
        };
        fs::write(loc, text)?;
        tracing::info!(path = %loc.display(), ?format, "saved parameters");
        Ok(())
    }

    /// Write the model dump to `loc`, and the parameters to
    /// `<stem>_params.yaml` beside it when `with_parameters` is set.
    fn save(&self, loc: impl AsRef<Path>, with_parameters: bool) -> Result<()> {
        let loc = loc.as_ref();
        ensure_parent(loc)?;
        fs::write(loc, serde_yaml::to_string(self)?)?;
        tracing::info!(path = %loc.display(), model = Self::NAME, "saved model");

        if with_parameters {
            self.save_parameters(params_path(loc), ParamsFormat::Yaml)?;
        }
        Ok(())
    }
}

/// Read a YAML parameters file into a mapping
pub fn load_parameters(file: impl AsRef<Path>) -> Result<Mapping> {
    let file = file.as_ref();
    if !file.exists() {
        return Err(PramError::NotFound(file.to_path_buf()));
    }
    let text = fs::read_to_string(file)?;
    match serde_yaml::from_str::<Value>(&text)? {
        Value::Mapping(map) => Ok(map),
        _ => Err(PramError::NotAMapping(file.display().to_string())),
    }
}

/// `<dir>/<stem>_params.yaml` for a model dump at `<dir>/<stem>.<ext>`
pub fn params_path(loc: &Path) -> PathBuf {
    let stem = loc
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    loc.with_file_name(format!("{stem}_params.yaml"))
}

fn ensure_parent(loc: &Path) -> Result<()> {
    match loc.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            Err(PramError::NotFound(parent.to_path_buf()))
        }
        _ => Ok(()),
    }
}
