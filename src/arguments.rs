use crate::value::Value;

/// The named parameters of a single statement execution.
///
/// Comdb2 parameters are named, not positional: a statement refers to
/// `@name` and the binding supplies a value under `name`. Insertion order is
/// preserved because it is also the order parameters are bound in.
#[derive(Debug, Default, Clone)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one named parameter. Anything with a [`Value`] conversion can be
    /// passed directly, including `Option` for nullable bindings and vectors
    /// for array bindings.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.push((name.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<N, V> FromIterator<(N, V)> for Arguments
where
    N: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut arguments = Arguments::new();
        for (name, value) in iter {
            arguments.add(name, value);
        }
        arguments
    }
}
