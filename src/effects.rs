/// The count of rows affected by executed statements, from
/// `cdb2_get_effects`.
///
/// An immutable snapshot: within a transaction these counts are a running
/// total from the start of the transaction up through the last executed
/// statement; outside of a transaction they cover only the last statement.
/// The counts are reset once the handle begins executing a new statement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    /// The total number of rows that were affected.
    pub num_affected: u64,
    /// The number of rows that were selected.
    pub num_selected: u64,
    /// The number of rows that were updated.
    pub num_updated: u64,
    /// The number of rows that were deleted.
    pub num_deleted: u64,
    /// The number of rows that were inserted.
    pub num_inserted: u64,
}
