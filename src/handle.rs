use std::sync::Arc;

use parking_lot::Mutex;

use crate::arguments::Arguments;
use crate::column::Column;
use crate::effects::Effects;
use crate::error::{Comdb2Error, Error, Result};
use crate::logger::QueryLogger;
use crate::options::{ConnectOptions, ConnectionFlags};
use crate::raw::{Connector, RawConnection, OK, OK_DONE};
use crate::row::Row;
use crate::value::Encoded;

/// A low-level Comdb2 connection.
///
/// One `Handle` is one connection with one current result stream: executing
/// a statement drains and replaces whatever stream the previous statement
/// left behind. There is no client-side statement cache and no connection
/// pool; a handle is as stateful as the socket under it.
///
/// `Handle` is internally synchronized and cheap to clone; clones share the
/// one connection. For a DB-API style layer with cursors and implicit
/// transactions, see [`Connection`][crate::Connection].
#[derive(Clone)]
pub struct Handle {
    state: Arc<Mutex<HandleState>>,
}

struct HandleState {
    raw: Option<Box<dyn RawConnection>>,
    columns: Arc<Vec<Column>>,
    more_rows: bool,
    generation: u64,
    timezone: Option<String>,
    logger: Option<QueryLogger>,
    options: ConnectOptions,
}

fn raw_error(raw: &dyn RawConnection, rc: i32) -> Error {
    Comdb2Error::new(rc, raw.error_string()).into()
}

impl HandleState {
    fn raw_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut Box<dyn RawConnection>> {
        self.raw
            .as_mut()
            .ok_or(Error::NotConnected { operation })
    }

    /// Step the current stream to exhaustion so the connection is ready for
    /// another statement.
    fn drain(&mut self) -> Result<()> {
        while self.more_rows {
            let raw = match self.raw.as_mut() {
                Some(raw) => raw,
                None => {
                    self.more_rows = false;
                    break;
                }
            };

            match raw.next_record() {
                OK => {}
                OK_DONE => self.more_rows = false,
                rc => {
                    self.more_rows = false;
                    return Err(raw_error(&**raw, rc));
                }
            }
        }

        if let Some(logger) = &mut self.logger {
            logger.finish();
        }

        Ok(())
    }

    fn run(&mut self, operation: &'static str, sql: &str, arguments: &Arguments) -> Result<()> {
        self.drain()?;

        // Serialize every parameter before touching the connection, so a
        // malformed value cannot leave a statement half-bound.
        let zone = self.timezone.as_deref().unwrap_or("UTC");
        let mut encoded = Vec::with_capacity(arguments.len());
        for (name, value) in arguments.iter() {
            encoded.push((name, value.encode(name, zone)?));
        }

        let raw = self.raw_mut(operation)?;

        let mut bind_failure = None;
        for (name, parameter) in &encoded {
            let rc = match parameter {
                Encoded::Scalar { ty, data } => raw.bind_parameter(name, *ty, data.as_deref()),
                Encoded::Array {
                    element_type,
                    count,
                    data,
                } => raw.bind_array_parameter(name, *element_type, *count, data),
            };
            if rc != OK {
                bind_failure = Some(raw_error(&**raw, rc));
                break;
            }
        }

        let rc = match bind_failure {
            None => raw.run_statement(sql),
            Some(_) => OK,
        };

        // Bindings never outlive the statement they were made for, even a
        // failed one.
        raw.clear_bindings();

        if let Some(error) = bind_failure {
            return Err(error);
        }
        if rc != OK {
            return Err(raw_error(&**raw, rc));
        }

        let count = raw.column_count();
        let mut columns = Vec::with_capacity(count);
        for ordinal in 0..count {
            columns.push(Column {
                name: raw.column_name(ordinal).to_owned(),
                ordinal,
                type_code: raw.column_type(ordinal),
            });
        }

        self.columns = Arc::new(columns);
        self.more_rows = true;
        self.generation += 1;
        self.logger = Some(QueryLogger::new(sql, self.options.log_settings.clone()));

        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        if !self.more_rows {
            return Ok(None);
        }

        let Some(raw) = self.raw.as_mut() else {
            return Err(Error::NotConnected {
                operation: "next_record",
            });
        };

        match raw.next_record() {
            OK => {}
            OK_DONE => {
                self.more_rows = false;
                if let Some(logger) = &mut self.logger {
                    logger.finish();
                }
                return Ok(None);
            }
            rc => {
                self.more_rows = false;
                return Err(raw_error(&**raw, rc));
            }
        }

        let columns = Arc::clone(&self.columns);
        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            values.push(crate::value::decode_column(
                column.type_code,
                raw.column_value(column.ordinal),
                column.ordinal,
                &column.name,
            )?);
        }

        if let Some(logger) = &mut self.logger {
            logger.increment_rows_returned();
        }

        Ok(Some(Row {
            values: values.into_boxed_slice(),
            columns,
        }))
    }
}

impl Drop for HandleState {
    fn drop(&mut self) {
        if let Some(mut raw) = self.raw.take() {
            // Nothing useful can be done with a close failure here.
            let _ = raw.close();
        }
    }
}

impl Handle {
    /// Open a connection as described by `options`, using `connector` to
    /// reach the database.
    ///
    /// If a timezone is configured (the default is UTC), a
    /// `set timezone` command is sent before this returns, so every datetime
    /// on this connection speaks that zone from the first statement on.
    pub fn connect(options: &ConnectOptions, connector: &dyn Connector) -> Result<Self> {
        let (tier, flags) = match options.host.as_deref() {
            None => (options.tier.clone(), options.flags),
            Some(host) => {
                if options.tier != "default" {
                    return Err(Error::Interface(
                        "connecting to a specific host and a tier are mutually exclusive"
                            .to_owned(),
                    ));
                }
                (host.to_owned(), options.flags | ConnectionFlags::DIRECT_CPU)
            }
        };

        let raw = connector.open(&options.database, &tier, flags)?;

        let handle = Handle {
            state: Arc::new(Mutex::new(HandleState {
                raw: Some(raw),
                columns: Arc::new(Vec::new()),
                more_rows: false,
                generation: 0,
                timezone: options.timezone.clone(),
                logger: None,
                options: options.clone(),
            })),
        };

        if let Some(timezone) = options.timezone.as_deref() {
            handle.execute(&format!("set timezone {timezone}"), &Arguments::new())?;
        }

        Ok(handle)
    }

    /// Execute one statement, replacing the current result stream.
    ///
    /// Any rows left unread from the previous statement are drained first.
    /// The returned [`Rows`] reads from this handle's stream; it is
    /// invalidated the moment another statement executes.
    pub fn execute(&self, sql: &str, arguments: &Arguments) -> Result<Rows> {
        let mut state = self.state.lock();
        state.run("execute", sql, arguments)?;

        Ok(Rows {
            state: Arc::clone(&self.state),
            columns: Arc::clone(&state.columns),
            generation: state.generation,
        })
    }

    /// Read the next record of the current result stream. `Ok(None)` at
    /// exhaustion.
    pub fn next_row(&self) -> Result<Option<Row>> {
        self.state.lock().fetch_next()
    }

    /// A fresh view over the current result stream, picking up wherever it
    /// stands. Like the view returned by [`execute`][Handle::execute], it is
    /// invalidated by the next statement.
    pub fn rows(&self) -> Rows {
        let state = self.state.lock();

        Rows {
            state: Arc::clone(&self.state),
            columns: Arc::clone(&state.columns),
            generation: state.generation,
        }
    }

    /// The columns of the current result set.
    pub fn columns(&self) -> Result<Arc<Vec<Column>>> {
        let mut state = self.state.lock();
        state.raw_mut("columns")?;
        Ok(Arc::clone(&state.columns))
    }

    /// The column names of the current result set.
    pub fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns()?.iter().map(|c| c.name.clone()).collect())
    }

    /// The declared type codes of the current result set.
    pub fn column_types(&self) -> Result<Vec<i32>> {
        Ok(self.columns()?.iter().map(|c| c.type_code).collect())
    }

    /// The counts of rows affected by the statements executed so far.
    ///
    /// The current result stream is drained first: asking the server for
    /// effects mid-stream is invalid and can poison an open transaction.
    pub fn get_effects(&self) -> Result<Effects> {
        let mut state = self.state.lock();
        state.raw_mut("get_effects")?;
        state.drain()?;

        let raw = state.raw_mut("get_effects")?;
        raw.effects().map_err(|rc| raw_error(&**raw, rc))
    }

    /// Close the connection. A second close, or any later operation, fails
    /// with [`Error::NotConnected`].
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut raw = state
            .raw
            .take()
            .ok_or(Error::NotConnected { operation: "close" })?;

        state.more_rows = false;
        state.logger = None;

        let rc = raw.close();
        if rc != OK {
            return Err(raw_error(&*raw, rc));
        }

        Ok(())
    }

    pub(crate) fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Handle")
            .field("connected", &state.raw.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

/// The result rows of one executed statement.
///
/// A view over the handle's single stream, not a buffer: it is valid only
/// until the next statement executes on the same handle, after which reading
/// from it fails.
pub struct Rows {
    state: Arc<Mutex<HandleState>>,
    columns: Arc<Vec<Column>>,
    generation: u64,
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Rows {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The next row, or `Ok(None)` at exhaustion.
    pub fn try_next(&mut self) -> Result<Option<Row>> {
        let mut state = self.state.lock();

        if state.generation != self.generation {
            return Err(Error::Unsupported(
                "cursor used after invalidation".to_owned(),
            ));
        }

        state.fetch_next()
    }
}

impl Iterator for Rows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}
