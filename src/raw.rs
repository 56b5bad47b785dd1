use crate::effects::Effects;
use crate::error::{Comdb2Error, Result};
use crate::options::ConnectionFlags;
use crate::type_info::ColumnType;

/// Return code for a call that succeeded.
pub const OK: i32 = 0;

/// Return code from [`RawConnection::next_record`] when the result stream is
/// exhausted.
pub const OK_DONE: i32 = 1;

/// The low-level connection collaborator, mirroring the `cdb2_*` C calls one
/// to one.
///
/// Implementations own exactly one connection and its single current result
/// stream. Methods returning `i32` follow the C convention: [`OK`] on
/// success, [`OK_DONE`] where noted, anything else a Comdb2 error code whose
/// message is then available from [`error_string`][RawConnection::error_string].
///
/// Callers are expected to uphold the call protocol: bind parameters, run the
/// statement, step through records, and clear bindings before the next
/// statement. [`Handle`][crate::Handle] is the one place in this crate that
/// does so.
pub trait RawConnection: Send {
    /// Execute `sql` with whatever parameters are currently bound, replacing
    /// any previous result stream.
    fn run_statement(&mut self, sql: &str) -> i32;

    /// Bind a scalar parameter for the next `run_statement`. `None` binds
    /// SQL null.
    fn bind_parameter(&mut self, name: &str, ty: ColumnType, data: Option<&[u8]>) -> i32;

    /// Bind an array parameter (the `CARRAY` extension) for the next
    /// `run_statement`.
    fn bind_array_parameter(
        &mut self,
        name: &str,
        element_type: ColumnType,
        count: usize,
        data: &[u8],
    ) -> i32;

    /// Forget all bound parameters.
    fn clear_bindings(&mut self) -> i32;

    /// Advance to the next record of the current result stream. Returns
    /// [`OK`] if a record is available and [`OK_DONE`] at exhaustion.
    fn next_record(&mut self) -> i32;

    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> &str;

    fn column_type(&self, index: usize) -> i32;

    /// The raw payload of one column of the current record; `None` is SQL
    /// null. Only valid between a successful `next_record` and the next
    /// stream-moving call.
    fn column_value(&self, index: usize) -> Option<&[u8]>;

    /// The counts of rows affected by the statements executed so far. Usable
    /// only once the current result stream is exhausted; calling it earlier
    /// fails and may poison an open transaction.
    fn effects(&mut self) -> Result<Effects, i32>;

    /// The message for the most recent failed call.
    fn error_string(&self) -> String;

    fn close(&mut self) -> i32;
}

/// Opens [`RawConnection`]s. The seam where a real network client, or a
/// scripted fake in tests, is plugged in.
pub trait Connector {
    fn open(
        &self,
        database: &str,
        tier: &str,
        flags: ConnectionFlags,
    ) -> Result<Box<dyn RawConnection>, Comdb2Error>;
}
