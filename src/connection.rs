use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::arguments::Arguments;
use crate::column::Column;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::options::ConnectOptions;
use crate::raw::Connector;
use crate::row::Row;
use crate::statement;
use crate::value::Value;

/// Open a [`Connection`] as described by `options`.
pub fn connect(options: &ConnectOptions, connector: &dyn Connector) -> Result<Connection> {
    let handle = Handle::connect(options, connector)?;

    Ok(Connection {
        inner: Arc::new(ConnectionInner {
            handle,
            autocommit: options.autocommit,
            txn: Mutex::new(TxnState {
                in_transaction: false,
                active: Weak::new(),
            }),
        }),
    })
}

/// A DB-API style connection: cursors, implicit transactions, and
/// `%(name)s` placeholders layered over a [`Handle`].
///
/// Unless opened in autocommit mode, the first statement executed outside a
/// transaction implicitly begins one, and nothing is durable until
/// [`commit`][Connection::commit]. Cursors opened from one connection share
/// its single result stream: executing on any of them invalidates the
/// others' unread rows.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    handle: Handle,
    autocommit: bool,
    txn: Mutex<TxnState>,
}

struct TxnState {
    in_transaction: bool,
    // The cursor whose state tracks the current statement; commit and
    // rollback go through it so its rowcount reflects the transaction.
    active: Weak<Mutex<CursorState>>,
}

struct CursorState {
    description: Option<Arc<Vec<Column>>>,
    rowcount: i64,
    generation: u64,
    closed: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        CursorState {
            description: None,
            rowcount: -1,
            generation: 0,
            closed: false,
        }
    }
}

impl Connection {
    /// Open a new cursor. Cursors are independent objects but not
    /// independent streams; see the type-level notes.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            conn: Arc::clone(&self.inner),
            state: Arc::new(Mutex::new(CursorState::default())),
            arraysize: 1,
        }
    }

    /// Commit the current transaction. With no transaction open this fails
    /// server-side.
    pub fn commit(&self) -> Result<()> {
        self.control("commit")
    }

    /// Roll back the current transaction.
    pub fn rollback(&self) -> Result<()> {
        self.control("rollback")
    }

    fn control(&self, sql: &'static str) -> Result<()> {
        // Route through the cursor that ran the transaction's statements, if
        // it is still alive, so its rowcount picks up the committed counts.
        let active = self.inner.txn.lock().active.upgrade();
        let state = active.unwrap_or_default();

        raw_execute(&self.inner, &state, sql, &Arguments::new())
    }

    pub fn get_autocommit(&self) -> bool {
        self.inner.autocommit
    }

    /// Close the connection. The cursor driving the current statement is
    /// closed with it; any other cursor fails on its next use, once it
    /// reaches the closed handle.
    pub fn close(&self) -> Result<()> {
        if let Some(state) = self.inner.txn.lock().active.upgrade() {
            state.lock().closed = true;
        }

        self.inner.handle.close()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("autocommit", &self.inner.autocommit)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

/// A DB-API style cursor.
///
/// Holds the description and rowcount of its most recent statement, and
/// reads rows from the connection's stream until another cursor (or the
/// connection itself) executes and invalidates it.
pub struct Cursor {
    conn: Arc<ConnectionInner>,
    state: Arc<Mutex<CursorState>>,
    /// The default number of rows [`fetchmany`][Cursor::fetchmany] returns.
    pub arraysize: usize,
}

fn raw_execute(
    conn: &ConnectionInner,
    state: &Arc<Mutex<CursorState>>,
    sql: &str,
    arguments: &Arguments,
) -> Result<()> {
    let operation = statement::statement_operation(sql)
        .ok_or_else(|| Error::Interface("cannot determine the statement's operation".to_owned()))?;

    {
        let mut state = state.lock();
        state.description = None;
        state.rowcount = -1;
    }

    let mut txn = conn.txn.lock();

    if !conn.autocommit && !txn.in_transaction && !statement::is_set_command(&operation) {
        conn.handle.execute("begin", &Arguments::new())?;
        txn.in_transaction = true;
    }

    // The transaction is over once a commit or rollback is attempted,
    // whether or not it succeeds.
    if statement::ends_transaction(&operation) {
        txn.in_transaction = false;
    }

    let expanded = statement::expand_placeholders(sql, arguments)?;
    conn.handle.execute(&expanded, arguments)?;

    if operation == "begin" {
        txn.in_transaction = true;
    }

    txn.active = Arc::downgrade(state);
    let in_transaction = txn.in_transaction;
    drop(txn);

    let mut state = state.lock();
    state.generation = conn.handle.generation();

    let columns = conn.handle.columns()?;
    if !columns.is_empty() {
        state.description = Some(columns);
    }

    // Row counts are only trustworthy once the work is final: outside any
    // transaction, after a statement that can change rows.
    if !in_transaction && statement::modifies_rows(&operation) {
        let effects = conn.handle.get_effects()?;
        state.rowcount = i64::try_from(effects.num_affected).unwrap_or(i64::MAX);
    }

    Ok(())
}

impl Cursor {
    fn check_open(&self) -> Result<()> {
        if self.state.lock().closed {
            return Err(Error::Interface("attempted to use a closed cursor".to_owned()));
        }

        Ok(())
    }

    /// Execute one statement, with `%(name)s` placeholders bound from
    /// `arguments`.
    ///
    /// Outside autocommit mode, transaction control belongs to the
    /// connection: `begin`, `commit`, and `rollback` are rejected here.
    pub fn execute(&mut self, sql: &str, arguments: &Arguments) -> Result<()> {
        self.check_open()?;

        if !self.conn.autocommit {
            match statement::statement_operation(sql).as_deref() {
                Some("begin") => {
                    return Err(Error::Interface(
                        "transactions may not be started explicitly".to_owned(),
                    ));
                }
                Some("commit") => {
                    return Err(Error::Interface(
                        "use Connection.commit to commit transactions".to_owned(),
                    ));
                }
                Some("rollback") => {
                    return Err(Error::Interface(
                        "use Connection.rollback to roll back transactions".to_owned(),
                    ));
                }
                _ => {}
            }
        }

        raw_execute(&self.conn, &self.state, sql, arguments)
    }

    /// Execute the same statement once per parameter set.
    pub fn executemany(&mut self, sql: &str, parameter_sets: &[Arguments]) -> Result<()> {
        for arguments in parameter_sets {
            self.execute(sql, arguments)?;
        }

        Ok(())
    }

    /// Call a stored procedure, binding `parameters` positionally. Returns
    /// the parameters back, per the DB-API convention; result rows are
    /// fetched as usual.
    pub fn callproc(&mut self, procedure: &str, parameters: Vec<Value>) -> Result<Vec<Value>> {
        if !statement::is_valid_procedure_name(procedure) {
            return Err(Error::Interface(format!(
                "invalid procedure name {procedure:?}"
            )));
        }

        let placeholders: Vec<String> = (0..parameters.len())
            .map(|i| format!("%({i})s"))
            .collect();
        let sql = format!("exec procedure {procedure}({})", placeholders.join(", "));

        let arguments: Arguments = parameters
            .iter()
            .enumerate()
            .map(|(i, value)| (i.to_string(), value.clone()))
            .collect();

        self.execute(&sql, &arguments)?;

        Ok(parameters)
    }

    fn next_row(&self) -> Result<Option<Row>> {
        self.check_open()?;

        let generation = {
            let state = self.state.lock();
            if state.description.is_none() {
                return Err(Error::Interface("no result set exists".to_owned()));
            }
            state.generation
        };

        if generation != self.conn.handle.generation() {
            return Err(Error::Unsupported(
                "cursor used after invalidation".to_owned(),
            ));
        }

        self.conn.handle.next_row()
    }

    /// The next row of the result set, or `Ok(None)` once it is exhausted.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        self.next_row()
    }

    /// Up to `size` rows (default [`arraysize`][Cursor::arraysize]); fewer
    /// only at the end of the result set.
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or(self.arraysize);
        let mut rows = Vec::with_capacity(size);

        for _ in 0..size {
            match self.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }

        Ok(rows)
    }

    /// All remaining rows of the result set.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();

        while let Some(row) = self.next_row()? {
            rows.push(row);
        }

        Ok(rows)
    }

    /// The columns of the most recent statement's result set, or `None` if
    /// it returned no columns.
    pub fn description(&self) -> Option<Arc<Vec<Column>>> {
        self.state.lock().description.clone()
    }

    /// The number of rows the most recent refreshing statement affected, or
    /// -1 while no trustworthy count exists (selects, statements inside an
    /// uncommitted transaction, errors).
    pub fn rowcount(&self) -> i64 {
        self.state.lock().rowcount
    }

    /// The connection this cursor belongs to.
    pub fn connection(&self) -> Connection {
        Connection {
            inner: Arc::clone(&self.conn),
        }
    }

    /// Close the cursor; later use of it fails.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.state.lock().closed = true;

        Ok(())
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Cursor")
            .field("rowcount", &state.rowcount)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Iterate the remaining rows, DB-API style.
impl<'a> IntoIterator for &'a mut Cursor {
    type Item = Result<Row>;
    type IntoIter = CursorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        CursorIter { cursor: self }
    }
}

pub struct CursorIter<'a> {
    cursor: &'a mut Cursor,
}

impl Iterator for CursorIter<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_row().transpose()
    }
}
