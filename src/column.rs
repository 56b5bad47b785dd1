use crate::type_info::ColumnType;

/// Metadata for one column of a result set.
///
/// Produced fresh for every executed statement. Column names are not
/// necessarily unique within a result set.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) ordinal: usize,
    pub(crate) type_code: i32,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The declared wire type tag, exactly as reported by the server.
    pub fn type_code(&self) -> i32 {
        self.type_code
    }

    /// The declared type, if the tag is one this crate knows about.
    pub fn type_info(&self) -> Option<ColumnType> {
        ColumnType::from_code(self.type_code)
    }
}
