//! A client library for [Comdb2], Bloomberg's clustered relational database.
//!
//! Two layers are provided:
//!
//! - [`Handle`]: a thin, low-level connection. One handle is one connection
//!   with one current result stream; statements execute immediately and
//!   rows are pulled with [`Handle::next_row`] or through the [`Rows`]
//!   iterator.
//!
//! - [`Connection`] / [`Cursor`]: a DB-API style layer on top, with
//!   `%(name)s` placeholders, implicit transactions (unless autocommit),
//!   `fetchone`/`fetchmany`/`fetchall`, and a commit-gated `rowcount`.
//!
//! Values cross the wire as [`Value`]s; datetimes carry their timezone by
//! name in [`Timestamp`]. The actual network client is abstracted behind
//! [`raw::Connector`], with a scripted in-process implementation in
//! [`testing`] for tests.
//!
//! ```no_run
//! use comdb2::{connect, Arguments, ConnectOptions};
//!
//! # fn main() -> comdb2::Result<()> {
//! # let connector: Box<dyn comdb2::raw::Connector> = unimplemented!();
//! let options: ConnectOptions = "comdb2://mydb?tier=prod".parse()?;
//! let conn = connect(&options, &*connector)?;
//!
//! let mut cursor = conn.cursor();
//! let mut args = Arguments::new();
//! args.add("id", 42i64);
//! cursor.execute("select name from users where id = %(id)s", &args)?;
//!
//! while let Some(row) = cursor.fetchone()? {
//!     println!("{:?}", row[0]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [Comdb2]: https://bloomberg.github.io/comdb2/

mod arguments;
mod column;
mod connection;
mod effects;
mod error;
mod handle;
mod logger;
mod options;
mod row;
mod statement;
mod timestamp;
mod type_info;
mod value;

pub mod raw;
pub mod testing;

pub use crate::arguments::Arguments;
pub use crate::column::Column;
pub use crate::connection::{connect, Connection, Cursor, CursorIter};
pub use crate::effects::Effects;
pub use crate::error::{code, Comdb2Error, Error, ErrorKind, Result};
pub use crate::handle::{Handle, Rows};
pub use crate::logger::LogSettings;
pub use crate::options::{ConnectOptions, ConnectionFlags};
pub use crate::row::Row;
pub use crate::timestamp::Timestamp;
pub use crate::type_info::ColumnType;
pub use crate::value::{Array, Value};
