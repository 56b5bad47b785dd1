use crate::error::{Error, Result};
use crate::timestamp::{DatetimePrecision, Timestamp};
use crate::type_info::ColumnType;

/// A single Comdb2 value, either bound as a parameter or read from a result
/// column.
///
/// `Datetime` and `DatetimeUs` are distinct variants because they are
/// distinct wire types with different sub-second precision; which one a value
/// is bound as controls how much of its fraction survives the round trip.
///
/// `Array` exists only on the bind side (the `CARRAY` extension for
/// `IN (...)` style predicates); result columns never carry it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Datetime(Timestamp),
    DatetimeUs(Timestamp),
    Array(Array),
}

/// A homogeneous parameter array.
///
/// Homogeneity is structural: no variant can hold a mixed or nested array,
/// and [`Array::try_from`] refuses to build one from values of differing
/// types.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Integer(Vec<i64>),
    Real(Vec<f64>),
    Text(Vec<String>),
    Blob(Vec<Vec<u8>>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::Integer(v) => v.len(),
            Array::Real(v) => v.len(),
            Array::Text(v) => v.len(),
            Array::Blob(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn element_type(&self) -> ColumnType {
        match self {
            Array::Integer(_) => ColumnType::Integer,
            Array::Real(_) => ColumnType::Real,
            Array::Text(_) => ColumnType::Cstring,
            Array::Blob(_) => ColumnType::Blob,
        }
    }
}

impl TryFrom<Vec<Value>> for Array {
    type Error = Error;

    /// Builds a homogeneous array from loose values, failing with
    /// [`Error::Unsupported`] on a mixed, nested, or null-containing vector.
    fn try_from(values: Vec<Value>) -> Result<Self> {
        fn mixed(expected: &'static str, found: &Value) -> Error {
            Error::Unsupported(format!(
                "array elements must share one type; found {} among {expected} elements",
                found.type_name(),
            ))
        }

        let mut iter = values.into_iter();

        let Some(first) = iter.next() else {
            // The element type of an empty array is moot; binding one is
            // rejected before it reaches the wire either way.
            return Ok(Array::Integer(Vec::new()));
        };

        match first {
            Value::Integer(v) => {
                let mut out = vec![v];
                for value in iter {
                    match value {
                        Value::Integer(v) => out.push(v),
                        other => return Err(mixed("integer", &other)),
                    }
                }
                Ok(Array::Integer(out))
            }

            Value::Real(v) => {
                let mut out = vec![v];
                for value in iter {
                    match value {
                        Value::Real(v) => out.push(v),
                        other => return Err(mixed("real", &other)),
                    }
                }
                Ok(Array::Real(out))
            }

            Value::Text(v) => {
                let mut out = vec![v];
                for value in iter {
                    match value {
                        Value::Text(v) => out.push(v),
                        other => return Err(mixed("text", &other)),
                    }
                }
                Ok(Array::Text(out))
            }

            Value::Blob(v) => {
                let mut out = vec![v];
                for value in iter {
                    match value {
                        Value::Blob(v) => out.push(v),
                        other => return Err(mixed("blob", &other)),
                    }
                }
                Ok(Array::Blob(out))
            }

            other => Err(Error::Unsupported(format!(
                "{} values cannot be array elements",
                other.type_name()
            ))),
        }
    }
}

impl Value {
    /// A short human name for this value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Datetime(_) => "datetime",
            Value::DatetimeUs(_) => "datetimeus",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::Datetime(v) | Value::DatetimeUs(v) => Some(v),
            _ => None,
        }
    }
}

/// A value fully serialized for binding, before any network call is made.
///
/// Every parameter of a statement is encoded up front so that a malformed
/// value fails the whole statement without touching the connection.
#[derive(Debug)]
pub(crate) enum Encoded {
    Scalar {
        ty: ColumnType,
        data: Option<Vec<u8>>,
    },
    Array {
        element_type: ColumnType,
        count: usize,
        data: Vec<u8>,
    },
}

fn array_len_u32(name: &str, len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::Unsupported(format!("array element of {len} bytes in {name:?} is too large")))
}

impl Value {
    /// Serialize for binding under the given parameter name. Naive datetimes
    /// are stamped with `default_zone`.
    pub(crate) fn encode(&self, name: &str, default_zone: &str) -> Result<Encoded> {
        Ok(match self {
            // A null carries no payload; the type tag sent with it is
            // arbitrary and the server ignores it.
            Value::Null => Encoded::Scalar {
                ty: ColumnType::Integer,
                data: None,
            },

            Value::Integer(v) => Encoded::Scalar {
                ty: ColumnType::Integer,
                data: Some(v.to_le_bytes().to_vec()),
            },

            Value::Real(v) => Encoded::Scalar {
                ty: ColumnType::Real,
                data: Some(v.to_le_bytes().to_vec()),
            },

            // Text goes over the wire NUL-terminated, terminator included in
            // the reported length.
            Value::Text(v) => {
                let mut data = Vec::with_capacity(v.len() + 1);
                data.extend_from_slice(v.as_bytes());
                data.push(0);
                Encoded::Scalar {
                    ty: ColumnType::Cstring,
                    data: Some(data),
                }
            }

            Value::Blob(v) => Encoded::Scalar {
                ty: ColumnType::Blob,
                data: Some(v.clone()),
            },

            Value::Datetime(ts) => Encoded::Scalar {
                ty: ColumnType::Datetime,
                data: Some(
                    ts.encode(DatetimePrecision::Millis, default_zone)
                        .map_err(|msg| {
                            Error::ConversionFailed(format!("parameter {name:?}: {msg}"))
                        })?,
                ),
            },

            Value::DatetimeUs(ts) => Encoded::Scalar {
                ty: ColumnType::DatetimeUs,
                data: Some(
                    ts.encode(DatetimePrecision::Micros, default_zone)
                        .map_err(|msg| {
                            Error::ConversionFailed(format!("parameter {name:?}: {msg}"))
                        })?,
                ),
            },

            Value::Array(array) => {
                if array.is_empty() {
                    return Err(Error::Unsupported(format!(
                        "cannot bind an empty array for parameter {name:?}"
                    )));
                }

                let data = match array {
                    Array::Integer(elems) => {
                        let mut data = Vec::with_capacity(elems.len() * 8);
                        for v in elems {
                            data.extend_from_slice(&v.to_le_bytes());
                        }
                        data
                    }

                    Array::Real(elems) => {
                        let mut data = Vec::with_capacity(elems.len() * 8);
                        for v in elems {
                            data.extend_from_slice(&v.to_le_bytes());
                        }
                        data
                    }

                    // Variable-width elements are sent as a length table
                    // followed by the concatenated payloads.
                    Array::Text(elems) => {
                        let mut data = Vec::new();
                        for v in elems {
                            let len = array_len_u32(name, v.len() + 1)?;
                            data.extend_from_slice(&len.to_le_bytes());
                        }
                        for v in elems {
                            data.extend_from_slice(v.as_bytes());
                            data.push(0);
                        }
                        data
                    }

                    Array::Blob(elems) => {
                        let mut data = Vec::new();
                        for v in elems {
                            let len = array_len_u32(name, v.len())?;
                            data.extend_from_slice(&len.to_le_bytes());
                        }
                        for v in elems {
                            data.extend_from_slice(v);
                        }
                        data
                    }
                };

                Encoded::Array {
                    element_type: array.element_type(),
                    count: array.len(),
                    data,
                }
            }
        })
    }
}

fn conversion(ordinal: usize, name: &str, msg: impl Into<String>) -> Error {
    Error::ConversionFailed(format!("column {ordinal} ({name:?}): {}", msg.into()))
}

/// Decode one column of the current record, as reported by the wire: a type
/// tag plus an optional payload (`None` is SQL null).
pub(crate) fn decode_column(
    type_code: i32,
    data: Option<&[u8]>,
    ordinal: usize,
    name: &str,
) -> Result<Value> {
    let Some(data) = data else {
        return Ok(Value::Null);
    };

    let ty = ColumnType::from_code(type_code).ok_or_else(|| {
        Error::Unsupported(format!(
            "column {ordinal} ({name:?}) has unknown type tag {type_code}"
        ))
    })?;

    Ok(match ty {
        ColumnType::Integer => {
            let raw: [u8; 8] = data.try_into().map_err(|_| {
                conversion(ordinal, name, format!("expected 8 bytes for an integer, got {}", data.len()))
            })?;
            Value::Integer(i64::from_le_bytes(raw))
        }

        ColumnType::Real => {
            let raw: [u8; 8] = data.try_into().map_err(|_| {
                conversion(ordinal, name, format!("expected 8 bytes for a real, got {}", data.len()))
            })?;
            Value::Real(f64::from_le_bytes(raw))
        }

        ColumnType::Cstring => {
            let stripped = data.strip_suffix(&[0]).ok_or_else(|| {
                conversion(ordinal, name, "text payload is missing its NUL terminator")
            })?;
            let text = std::str::from_utf8(stripped)
                .map_err(|_| conversion(ordinal, name, "text payload is not valid UTF-8"))?;
            Value::Text(text.to_owned())
        }

        ColumnType::Blob => Value::Blob(data.to_vec()),

        ColumnType::Datetime => Value::Datetime(
            Timestamp::decode(data, DatetimePrecision::Millis)
                .map_err(|msg| conversion(ordinal, name, msg))?,
        ),

        ColumnType::DatetimeUs => Value::DatetimeUs(
            Timestamp::decode(data, DatetimePrecision::Micros)
                .map_err(|msg| conversion(ordinal, name, msg))?,
        ),

        ColumnType::IntervalYm | ColumnType::IntervalDs | ColumnType::IntervalDsUs => {
            return Err(Error::Unsupported(format!(
                "column {ordinal} ({name:?}) has type {ty}, which has no value mapping"
            )));
        }
    })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Datetime(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::Datetime(Timestamp::naive(v))
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(Array::Integer(v))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Array::Real(v))
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(Array::Text(v))
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::Array(Array::Text(v.into_iter().map(str::to_owned).collect()))
    }
}

impl From<Vec<Vec<u8>>> for Value {
    fn from(v: Vec<Vec<u8>>) -> Self {
        Value::Array(Array::Blob(v))
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(encoded: Encoded) -> (ColumnType, Option<Vec<u8>>) {
        match encoded {
            Encoded::Scalar { ty, data } => (ty, data),
            Encoded::Array { .. } => panic!("expected a scalar encoding"),
        }
    }

    #[test]
    fn null_is_a_typed_tag_with_no_payload() {
        let (ty, data) = scalar(Value::Null.encode("p", "UTC").unwrap());
        assert_eq!(ty, ColumnType::Integer);
        assert_eq!(data, None);
    }

    #[test]
    fn integers_are_eight_little_endian_bytes() {
        let (ty, data) = scalar(Value::Integer(0x0102_0304).encode("p", "UTC").unwrap());
        assert_eq!(ty, ColumnType::Integer);
        assert_eq!(data.unwrap(), vec![4, 3, 2, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn text_carries_a_counted_nul_terminator() {
        let (ty, data) = scalar(Value::Text("ab".into()).encode("p", "UTC").unwrap());
        assert_eq!(ty, ColumnType::Cstring);
        assert_eq!(data.unwrap(), b"ab\0");

        // and the terminator is stripped again on the way back in
        let value = decode_column(ColumnType::Cstring.code(), Some(b"ab\0"), 0, "c").unwrap();
        assert_eq!(value, Value::Text("ab".into()));
    }

    #[test]
    fn text_without_a_terminator_fails_to_decode() {
        let err = decode_column(ColumnType::Cstring.code(), Some(b"ab"), 3, "c").unwrap_err();
        assert!(matches!(err, Error::ConversionFailed(msg) if msg.contains("column 3")));
    }

    #[test]
    fn invalid_utf8_text_names_the_column() {
        let err =
            decode_column(ColumnType::Cstring.code(), Some(&[0xff, 0xfe, 0]), 1, "name").unwrap_err();
        assert!(matches!(err, Error::ConversionFailed(msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn missing_payload_is_null_regardless_of_type() {
        for code in [1, 2, 3, 4, 6, 9] {
            assert_eq!(decode_column(code, None, 0, "c").unwrap(), Value::Null);
        }

        // even for tags that cannot otherwise be decoded
        assert_eq!(decode_column(7, None, 0, "c").unwrap(), Value::Null);
        assert_eq!(decode_column(999, None, 0, "c").unwrap(), Value::Null);
    }

    #[test]
    fn interval_columns_are_unsupported() {
        let err = decode_column(ColumnType::IntervalYm.code(), Some(&[0; 8]), 2, "c").unwrap_err();
        assert!(matches!(err, Error::Unsupported(msg) if msg.contains("intervalym")));
    }

    #[test]
    fn integer_arrays_use_a_fixed_stride() {
        let encoded = Value::from(vec![1i64, -1]).encode("p", "UTC").unwrap();
        match encoded {
            Encoded::Array {
                element_type,
                count,
                data,
            } => {
                assert_eq!(element_type, ColumnType::Integer);
                assert_eq!(count, 2);
                assert_eq!(data.len(), 16);
                assert_eq!(&data[..8], &1i64.to_le_bytes());
                assert_eq!(&data[8..], &(-1i64).to_le_bytes());
            }
            Encoded::Scalar { .. } => panic!("expected an array encoding"),
        }
    }

    #[test]
    fn text_arrays_use_a_length_table() {
        let encoded = Value::from(vec!["a", "bc"]).encode("p", "UTC").unwrap();
        match encoded {
            Encoded::Array {
                element_type,
                count,
                data,
            } => {
                assert_eq!(element_type, ColumnType::Cstring);
                assert_eq!(count, 2);
                // lengths include each element's NUL terminator
                assert_eq!(&data[..4], &2u32.to_le_bytes());
                assert_eq!(&data[4..8], &3u32.to_le_bytes());
                assert_eq!(&data[8..], b"a\0bc\0");
            }
            Encoded::Scalar { .. } => panic!("expected an array encoding"),
        }
    }

    #[test]
    fn empty_arrays_cannot_be_bound() {
        let err = Value::from(Vec::<i64>::new()).encode("ids", "UTC").unwrap_err();
        assert!(matches!(err, Error::Unsupported(msg) if msg.contains("ids")));
    }

    #[test]
    fn mixed_arrays_are_rejected_at_construction() {
        let err = Array::try_from(vec![Value::Integer(1), Value::Text("x".into())]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let err = Array::try_from(vec![Value::Null]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn option_binds_null_or_the_inner_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Integer(7));
    }
}
