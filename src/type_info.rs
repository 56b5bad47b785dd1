use std::fmt::{self, Display, Formatter};

/// The wire type tags of the Comdb2 client protocol, from `cdb2_coltype` in
/// `cdb2api.h`.
///
/// Result columns declare one of these; bound parameters are sent tagged with
/// one of these. The interval tags exist on the wire but have no value
/// mapping in this crate; decoding a column declared with one of them fails
/// with an unsupported-type error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Real,
    Cstring,
    Blob,
    Datetime,
    IntervalYm,
    IntervalDs,
    DatetimeUs,
    IntervalDsUs,
}

impl ColumnType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => ColumnType::Integer,
            2 => ColumnType::Real,
            3 => ColumnType::Cstring,
            4 => ColumnType::Blob,
            6 => ColumnType::Datetime,
            7 => ColumnType::IntervalYm,
            8 => ColumnType::IntervalDs,
            9 => ColumnType::DatetimeUs,
            10 => ColumnType::IntervalDsUs,

            _ => {
                return None;
            }
        })
    }

    pub fn code(self) -> i32 {
        match self {
            ColumnType::Integer => 1,
            ColumnType::Real => 2,
            ColumnType::Cstring => 3,
            ColumnType::Blob => 4,
            ColumnType::Datetime => 6,
            ColumnType::IntervalYm => 7,
            ColumnType::IntervalDs => 8,
            ColumnType::DatetimeUs => 9,
            ColumnType::IntervalDsUs => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Cstring => "cstring",
            ColumnType::Blob => "blob",
            ColumnType::Datetime => "datetime",
            ColumnType::IntervalYm => "intervalym",
            ColumnType::IntervalDs => "intervalds",
            ColumnType::DatetimeUs => "datetimeus",
            ColumnType::IntervalDsUs => "intervaldsus",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::ColumnType;

    #[test]
    fn codes_round_trip() {
        for code in [1, 2, 3, 4, 6, 7, 8, 9, 10] {
            let ty = ColumnType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }

        assert_eq!(ColumnType::from_code(5), None);
        assert_eq!(ColumnType::from_code(0), None);
        assert_eq!(ColumnType::from_code(11), None);
    }
}
