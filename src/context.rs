use serde_yaml::{Mapping, Value};

/// Raw data visible to a strategy while one field is being built.
///
/// `local` is the raw mapping of the record that declares the field, so a
/// strategy can borrow sibling values such as `size`. `global` is the
/// outermost raw specification of the validation call.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    /// Dotted path of the field being built, e.g. `network.hidden.weights`
    pub path: &'a str,
    pub local: &'a Mapping,
    pub global: &'a Mapping,
}

impl<'a> Context<'a> {
    pub fn new(path: &'a str, local: &'a Mapping, global: &'a Mapping) -> Self {
        Self {
            path,
            local,
            global,
        }
    }

    /// Raw value of a sibling field in the enclosing record
    pub fn sibling(&self, name: &str) -> Option<&'a Value> {
        self.local.get(name).filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(src: &str) -> Mapping {
        serde_yaml::from_str(src).unwrap()
    }

    #[test]
    fn test_sibling_skips_null() {
        let local = mapping("{size: [2, 2], parity_ratio: null}");
        let global = Mapping::new();
        let ctx = Context::new("weights", &local, &global);
        assert!(ctx.sibling("size").is_some());
        assert!(ctx.sibling("parity_ratio").is_none());
        assert!(ctx.sibling("missing").is_none());
    }
}
