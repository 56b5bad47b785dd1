use std::ops::Index;
use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::value::Value;

/// One fully materialized record of a result set.
///
/// Every column is decoded into an owned [`Value`] the moment the record is
/// read, so a `Row` stays valid after the underlying stream has moved on.
#[derive(Debug, Clone)]
pub struct Row {
    pub(crate) values: Box<[Value]>,
    pub(crate) columns: Arc<Vec<Column>>,
}

impl Row {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look a value up by column name. Names are not necessarily unique; the
    /// first match wins.
    pub fn try_get(&self, name: &str) -> Result<&Value> {
        let column = self
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::Interface(format!("no column named {name:?} in this result set")))?;

        Ok(&self.values[column.ordinal])
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.into_vec()
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}
