//! Strategy selection for parameterised fields
//!
//! A [`Builder`] holds an ordered list of strategies for one target type.
//! For each raw field value it tries the strategies in declaration order and
//! builds with the first one whose `parse` accepts the value.

use crate::context::Context;
use crate::error::{PramError, Result, StrategyNoMatch};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// Use a subset of parameters to build a `T`.
///
/// Implementors are plain serde structs: deserialization validates the field
/// types once a strategy has been selected.
pub trait BuildStrategy<T>: DeserializeOwned {
    /// Name used in logs and errors
    const NAME: &'static str;
    /// Field names that must be present for the strategy to apply
    const REQUIRED: &'static [&'static str];

    /// True iff every required field is present
    fn matches(raw: &Mapping) -> bool {
        Self::REQUIRED.iter().all(|k| raw.contains_key(*k))
    }

    /// Turn a raw value into the fields of this strategy.
    ///
    /// The default accepts mappings only, backfills missing required fields
    /// from sibling values and then checks `matches`. Override it to coerce
    /// scalars or inject derived fields.
    fn parse(raw: Value, ctx: &Context<'_>) -> std::result::Result<Mapping, StrategyNoMatch> {
        let Value::Mapping(mut map) = raw else {
            return Err(StrategyNoMatch);
        };
        backfill(&mut map, Self::REQUIRED, ctx);
        if Self::matches(&map) {
            Ok(map)
        } else {
            Err(StrategyNoMatch)
        }
    }

    /// Build the value from the validated fields
    fn build(self) -> Result<T>;
}

/// Copy missing `names` from the enclosing record's raw values.
/// Values already present in `map` are never overwritten.
pub fn backfill(map: &mut Mapping, names: &[&str], ctx: &Context<'_>) {
    for name in names {
        if !map.contains_key(*name)
            && let Some(value) = ctx.sibling(name)
        {
            map.insert(Value::from(*name), value.clone());
        }
    }
}

type ParseFn = fn(Value, &Context<'_>) -> std::result::Result<Mapping, StrategyNoMatch>;
type BuildFn<T> = fn(Mapping, &Context<'_>) -> Result<T>;

/// Type-erased descriptor of one strategy
pub struct StrategyEntry<T> {
    pub name: &'static str,
    pub required: &'static [&'static str],
    parse: ParseFn,
    build: BuildFn<T>,
}

impl<T> StrategyEntry<T> {
    pub fn of<S: BuildStrategy<T>>() -> Self {
        Self {
            name: S::NAME,
            required: S::REQUIRED,
            parse: <S as BuildStrategy<T>>::parse,
            build: instantiate::<T, S>,
        }
    }
}

fn instantiate<T, S: BuildStrategy<T>>(fields: Mapping, ctx: &Context<'_>) -> Result<T> {
    let strategy: S = serde_yaml::from_value(Value::Mapping(fields)).map_err(|source| {
        PramError::InvalidStrategy {
            strategy: S::NAME,
            field: ctx.path.to_string(),
            source,
        }
    })?;
    strategy.build()
}

/// Constructs a `T` from parameters using an ordered list of strategies
pub struct Builder<T> {
    name: &'static str,
    recognise: Option<fn(&Value) -> Option<T>>,
    strategies: Vec<StrategyEntry<T>>,
}

impl<T> Builder<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            recognise: None,
            strategies: Vec::new(),
        }
    }

    /// Register a recogniser for values that are already built. Matching
    /// values bypass strategy selection.
    #[must_use]
    pub fn recognise(mut self, f: fn(&Value) -> Option<T>) -> Self {
        self.recognise = Some(f);
        self
    }

    /// Append a strategy. Earlier strategies take priority.
    #[must_use]
    pub fn with<S: BuildStrategy<T>>(mut self) -> Self {
        self.strategies.push(StrategyEntry::of::<S>());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name).collect()
    }

    /// Find the first strategy that accepts `raw`, returning its index and
    /// the enriched fields. Does not build.
    pub fn select(&self, raw: &Value, ctx: &Context<'_>) -> Option<(usize, Mapping)> {
        for (idx, entry) in self.strategies.iter().enumerate() {
            match (entry.parse)(raw.clone(), ctx) {
                Ok(fields) => return Some((idx, fields)),
                Err(StrategyNoMatch) => {
                    tracing::trace!(field = ctx.path, strategy = entry.name, "strategy does not match");
                }
            }
        }
        None
    }

    /// Construct a field from its raw value
    pub fn build(&self, raw: &Value, ctx: &Context<'_>) -> Result<T> {
        if let Some(recognise) = self.recognise
            && let Some(built) = recognise(raw)
        {
            tracing::debug!(field = ctx.path, ty = self.name, "using prebuilt value");
            return Ok(built);
        }

        match self.select(raw, ctx) {
            Some((idx, fields)) => {
                let entry = &self.strategies[idx];
                tracing::debug!(field = ctx.path, strategy = entry.name, "building");
                (entry.build)(fields, ctx)
            }
            None => Err(PramError::NoSuitableStrategy {
                field: ctx.path.to_string(),
                keys: describe_keys(raw),
            }),
        }
    }
}

/// Target types that own a registered, immutable builder.
pub trait Parameterise: Sized + 'static {
    fn builder() -> &'static Builder<Self>;
}

/// The builder registered for `T`
pub fn parameterise<T: Parameterise>() -> &'static Builder<T> {
    T::builder()
}

fn describe_keys(raw: &Value) -> String {
    match raw {
        Value::Mapping(map) => map.keys().map(render).collect::<Vec<_>>().join(", "),
        other => format!("<none> (got {})", render(other)),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) => "sequence".to_string(),
        Value::Mapping(_) => "mapping".to_string(),
        Value::Tagged(t) => t.tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Constant {
        value: i64,
    }

    impl BuildStrategy<String> for Constant {
        const NAME: &'static str = "Constant";
        const REQUIRED: &'static [&'static str] = &["value"];

        fn build(self) -> Result<String> {
            Ok(format!("constant:{}", self.value))
        }
    }

    #[derive(Deserialize)]
    struct Doubled {
        value: i64,
    }

    impl BuildStrategy<String> for Doubled {
        const NAME: &'static str = "Doubled";
        const REQUIRED: &'static [&'static str] = &["value"];

        fn build(self) -> Result<String> {
            Ok(format!("doubled:{}", self.value * 2))
        }
    }

    #[derive(Deserialize)]
    struct Ranged {
        start: i64,
        stop: i64,
    }

    impl BuildStrategy<String> for Ranged {
        const NAME: &'static str = "Ranged";
        const REQUIRED: &'static [&'static str] = &["start", "stop"];

        fn build(self) -> Result<String> {
            if self.stop < self.start {
                return Err(PramError::InvalidParameter("stop before start".into()));
            }
            Ok(format!("range:{}..{}", self.start, self.stop))
        }
    }

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).unwrap()
    }

    fn run(builder: &Builder<String>, raw: &str, local: &str) -> Result<String> {
        let local = yaml(local);
        let local = local.as_mapping().unwrap();
        let global = Mapping::new();
        builder.build(&yaml(raw), &Context::new("field", local, &global))
    }

    #[test]
    fn test_first_declared_strategy_wins() {
        let builder = Builder::new("String").with::<Constant>().with::<Doubled>();
        assert_eq!(run(&builder, "{value: 3}", "{}").unwrap(), "constant:3");

        let reversed = Builder::new("String").with::<Doubled>().with::<Constant>();
        assert_eq!(run(&reversed, "{value: 3}", "{}").unwrap(), "doubled:6");
    }

    #[test]
    fn test_falls_through_to_later_strategy() {
        let builder = Builder::new("String").with::<Ranged>().with::<Constant>();
        assert_eq!(run(&builder, "{value: 1}", "{}").unwrap(), "constant:1");
        assert_eq!(run(&builder, "{start: 1, stop: 4}", "{}").unwrap(), "range:1..4");
    }

    #[test]
    fn test_backfill_from_siblings() {
        let builder = Builder::new("String").with::<Ranged>();
        assert_eq!(
            run(&builder, "{start: 2}", "{stop: 5, other: x}").unwrap(),
            "range:2..5"
        );
        // raw values win over siblings
        assert_eq!(
            run(&builder, "{start: 2, stop: 3}", "{stop: 5}").unwrap(),
            "range:2..3"
        );
    }

    #[test]
    fn test_no_suitable_strategy_names_keys() {
        let builder = Builder::new("String").with::<Ranged>().with::<Constant>();
        let err = run(&builder, "{start: 1, step: 2}", "{}").unwrap_err();
        match err {
            PramError::NoSuitableStrategy { field, keys } => {
                assert_eq!(field, "field");
                assert_eq!(keys, "start, step");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scalar_without_coercion_is_an_error() {
        let builder = Builder::new("String").with::<Constant>();
        let err = run(&builder, "7", "{}").unwrap_err();
        assert!(matches!(err, PramError::NoSuitableStrategy { .. }));
        assert!(err.to_string().contains("got 7"));
    }

    #[test]
    fn test_build_errors_propagate() {
        let builder = Builder::new("String").with::<Ranged>().with::<Constant>();
        let err = run(&builder, "{start: 5, stop: 1, value: 1}", "{}").unwrap_err();
        assert!(matches!(err, PramError::InvalidParameter(_)));
    }

    #[test]
    fn test_invalid_field_types_are_fatal() {
        let builder = Builder::new("String").with::<Constant>().with::<Doubled>();
        let err = run(&builder, "{value: not-a-number}", "{}").unwrap_err();
        assert!(matches!(
            err,
            PramError::InvalidStrategy {
                strategy: "Constant",
                ..
            }
        ));
    }

    #[test]
    fn test_prebuilt_values_pass_through() {
        fn recognise(raw: &Value) -> Option<String> {
            raw.as_str().map(str::to_owned)
        }
        let builder = Builder::new("String").recognise(recognise).with::<Constant>();
        assert_eq!(run(&builder, "already built", "{}").unwrap(), "already built");
        assert_eq!(run(&builder, "{value: 2}", "{}").unwrap(), "constant:2");
    }

    #[test]
    fn test_select_reports_index() {
        let builder = Builder::new("String").with::<Ranged>().with::<Constant>();
        let local = Mapping::new();
        let ctx = Context::new("field", &local, &local);
        let (idx, fields) = builder.select(&yaml("{value: 9}"), &ctx).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(fields.get("value"), Some(&Value::from(9)));
        assert_eq!(builder.strategy_names(), vec!["Ranged", "Constant"]);
    }
}
