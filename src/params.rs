use crate::types::{DbType, RowValues};

/// How a parameter participates in a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamRole {
    /// Data sent to the database.
    #[default]
    Input,
    /// A value produced by the command and read back afterwards.
    Output,
    /// The return-status indicator; a non-zero value after execution is a failure.
    Status,
}

/// A single named command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: RowValues,
    pub role: ParamRole,
    /// When set, the value is coerced to this type before binding.
    pub db_type: Option<DbType>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            role: ParamRole::Input,
            db_type: None,
        }
    }

    #[must_use]
    pub fn typed(name: impl Into<String>, db_type: DbType, value: impl Into<RowValues>) -> Self {
        Self {
            db_type: Some(db_type),
            ..Self::new(name, value)
        }
    }

    #[must_use]
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            role: ParamRole::Output,
            ..Self::new(name, RowValues::Null)
        }
    }

    #[must_use]
    pub fn status(name: impl Into<String>) -> Self {
        Self {
            role: ParamRole::Status,
            db_type: Some(DbType::Int),
            ..Self::new(name, RowValues::Null)
        }
    }

    /// The name without a leading `@`, `:` or `$` placeholder sigil.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        strip_sigil(&self.name)
    }

    /// Case-insensitive comparison of bare names.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.bare_name().eq_ignore_ascii_case(strip_sigil(name))
    }

    /// The value to hand to the driver, after applying the explicit type if one is set.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the value cannot be coerced.
    pub fn bound_value(&self) -> Result<RowValues, String> {
        match self.db_type {
            Some(target) => self
                .value
                .coerce(target)
                .map_err(|e| format!("parameter `{}`: {e}", self.name)),
            None => Ok(self.value.clone()),
        }
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        self.role == ParamRole::Input
    }
}

pub(crate) fn strip_sigil(name: &str) -> &str {
    name.strip_prefix(['@', ':', '$']).unwrap_or(name)
}

/// Ordered list of command parameters.
///
/// Entries keep insertion order and names are not required to be unique:
/// ```rust
/// use sql_dac::prelude::*;
///
/// let mut params = SqlParameters::new();
/// params.add("@id", 7).add("@id", 8).add_status("@ret");
/// assert_eq!(params.len(), 3);
/// assert_eq!(params.get("id"), Some(&RowValues::Int(7)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlParameters {
    items: Vec<Parameter>,
}

impl SqlParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append an input parameter.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<RowValues>) -> &mut Self {
        self.items.push(Parameter::new(name, value));
        self
    }

    pub fn add_typed(
        &mut self,
        name: impl Into<String>,
        db_type: DbType,
        value: impl Into<RowValues>,
    ) -> &mut Self {
        self.items.push(Parameter::typed(name, db_type, value));
        self
    }

    pub fn add_output(&mut self, name: impl Into<String>) -> &mut Self {
        self.items.push(Parameter::output(name));
        self
    }

    pub fn add_status(&mut self, name: impl Into<String>) -> &mut Self {
        self.items.push(Parameter::status(name));
        self
    }

    pub fn push(&mut self, parameter: Parameter) -> &mut Self {
        self.items.push(parameter);
        self
    }

    /// Consuming variant of [`SqlParameters::add`] for inline construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.add(name, value);
        self
    }

    /// Value of the first parameter matching `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.find(name).map(|p| &p.value)
    }

    /// First parameter matching `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.items.iter().find(|p| p.matches(name))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Parameter] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Input parameters in insertion order.
    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter().filter(|p| p.is_input())
    }

    /// True when any parameter expects a value back from the command.
    #[must_use]
    pub fn has_outputs(&self) -> bool {
        self.items.iter().any(|p| !p.is_input())
    }

    /// The status indicator; only the first one declared is consulted.
    #[must_use]
    pub fn status(&self) -> Option<&Parameter> {
        self.items.iter().find(|p| p.role == ParamRole::Status)
    }

    /// Overwrite output and status values from a `(column, value)` row.
    ///
    /// Each non-input parameter takes the first column whose name matches its bare name.
    /// Parameters without a matching column keep their current value.
    pub(crate) fn absorb_outputs<'a, I>(&mut self, row: I)
    where
        I: IntoIterator<Item = (&'a str, &'a RowValues)> + Clone,
    {
        for param in self.items.iter_mut().filter(|p| !p.is_input()) {
            if let Some((_, value)) = row.clone().into_iter().find(|(col, _)| param.matches(col)) {
                param.value = value.clone();
            }
        }
    }

    /// Only the output and status parameters.
    #[must_use]
    pub fn returned(&self) -> SqlParameters {
        self.items.iter().filter(|p| !p.is_input()).cloned().collect()
    }
}

impl From<Vec<Parameter>> for SqlParameters {
    fn from(items: Vec<Parameter>) -> Self {
        Self { items }
    }
}

impl From<&[Parameter]> for SqlParameters {
    fn from(items: &[Parameter]) -> Self {
        Self {
            items: items.to_vec(),
        }
    }
}

impl<N: Into<String>, V: Into<RowValues>> From<Vec<(N, V)>> for SqlParameters {
    fn from(pairs: Vec<(N, V)>) -> Self {
        pairs
            .into_iter()
            .map(|(name, value)| Parameter::new(name, value))
            .collect()
    }
}

impl FromIterator<Parameter> for SqlParameters {
    fn from_iter<T: IntoIterator<Item = Parameter>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SqlParameters {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a SqlParameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
