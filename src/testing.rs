//! Scripted in-process stand-ins for a real database, for tests.
//!
//! [`ScriptedConnector`] opens connections that answer each executed
//! statement from a queue of [`Step`]s, while recording every open, bind,
//! and statement for later assertions. Statements beyond the end of the
//! script succeed with an empty result set, so housekeeping statements
//! (`set timezone`, implicit `begin`s) need no scripting.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::effects::Effects;
use crate::error::{code, Comdb2Error, Result};
use crate::options::ConnectionFlags;
use crate::raw::{Connector, RawConnection, OK, OK_DONE};
use crate::type_info::ColumnType;
use crate::value::{Encoded, Value};

/// The scripted outcome of one `run_statement` call.
#[derive(Debug, Clone, Default)]
pub struct Step {
    rc: i32,
    message: String,
    columns: Vec<(String, i32)>,
    rows: Vec<Vec<Value>>,
    effects: Option<Effects>,
    row_error: Option<(i32, String)>,
}

impl Step {
    /// A statement that succeeds with no result set.
    pub fn ok() -> Self {
        Step::default()
    }

    /// A statement that succeeds with the given columns and rows.
    pub fn rows(columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> Self {
        Step {
            columns: columns
                .iter()
                .map(|(name, ty)| ((*name).to_owned(), ty.code()))
                .collect(),
            rows,
            ..Step::default()
        }
    }

    /// A statement that fails outright.
    pub fn error(rc: i32, message: impl Into<String>) -> Self {
        Step {
            rc,
            message: message.into(),
            ..Step::default()
        }
    }

    /// The effects the server reports once this statement's stream is
    /// exhausted. Without this, asking for effects fails.
    pub fn effects(mut self, effects: Effects) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Fail the stream with this error after all scripted rows were read.
    pub fn row_error(mut self, rc: i32, message: impl Into<String>) -> Self {
        self.row_error = Some((rc, message.into()));
        self
    }
}

/// One recorded `cdb2_open` equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCall {
    pub database: String,
    pub tier: String,
    pub flags: ConnectionFlags,
}

/// One parameter as it was bound, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundParam {
    Scalar {
        name: String,
        type_code: i32,
        data: Option<Vec<u8>>,
    },
    Array {
        name: String,
        element_type_code: i32,
        count: usize,
        data: Vec<u8>,
    },
}

impl BoundParam {
    pub fn name(&self) -> &str {
        match self {
            BoundParam::Scalar { name, .. } | BoundParam::Array { name, .. } => name,
        }
    }
}

/// One recorded statement execution with the parameters bound for it.
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    pub sql: String,
    pub parameters: Vec<BoundParam>,
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Step>>,
    opens: Mutex<Vec<OpenCall>>,
    executed: Mutex<Vec<ExecutedStatement>>,
    clear_bindings_calls: Mutex<usize>,
    open_error: Mutex<Option<Comdb2Error>>,
}

/// A [`Connector`] whose connections replay a script.
///
/// Clones share the script and the recordings, so a test can keep one clone
/// for assertions after handing the other to [`connect`][crate::connect].
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one step; steps are consumed in order, one per statement.
    pub fn push(&self, step: Step) -> &Self {
        self.shared.script.lock().push_back(step);
        self
    }

    pub fn script(&self, steps: impl IntoIterator<Item = Step>) -> &Self {
        self.shared.script.lock().extend(steps);
        self
    }

    /// Make the next open fail with this error.
    pub fn fail_open(&self, error: Comdb2Error) -> &Self {
        *self.shared.open_error.lock() = Some(error);
        self
    }

    pub fn opens(&self) -> Vec<OpenCall> {
        self.shared.opens.lock().clone()
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.shared.executed.lock().clone()
    }

    /// Just the SQL texts, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.shared
            .executed
            .lock()
            .iter()
            .map(|e| e.sql.clone())
            .collect()
    }

    pub fn clear_bindings_calls(&self) -> usize {
        *self.shared.clear_bindings_calls.lock()
    }
}

impl Connector for ScriptedConnector {
    fn open(
        &self,
        database: &str,
        tier: &str,
        flags: ConnectionFlags,
    ) -> Result<Box<dyn RawConnection>, Comdb2Error> {
        if let Some(error) = self.shared.open_error.lock().take() {
            return Err(error);
        }

        self.shared.opens.lock().push(OpenCall {
            database: database.to_owned(),
            tier: tier.to_owned(),
            flags,
        });

        Ok(Box::new(ScriptedConnection {
            shared: Arc::clone(&self.shared),
            pending_binds: Vec::new(),
            stream: None,
            current_row: None,
            last_error: String::new(),
        }))
    }
}

struct Stream {
    columns: Vec<(String, i32)>,
    rows: VecDeque<Vec<Option<Vec<u8>>>>,
    effects: Option<Effects>,
    row_error: Option<(i32, String)>,
}

struct ScriptedConnection {
    shared: Arc<Shared>,
    pending_binds: Vec<BoundParam>,
    stream: Option<Stream>,
    current_row: Option<Vec<Option<Vec<u8>>>>,
    last_error: String,
}

// Values are pre-encoded at execution time so column_value can hand out
// plain byte slices. Scripts are test input; a value that cannot be encoded
// is a bug in the test.
fn encode_cell(value: &Value) -> Option<Vec<u8>> {
    match value.encode("", "UTC") {
        Ok(Encoded::Scalar { data, .. }) => data,
        Ok(Encoded::Array { .. }) => panic!("scripted rows cannot contain arrays"),
        Err(error) => panic!("unencodable scripted value {value:?}: {error}"),
    }
}

impl RawConnection for ScriptedConnection {
    fn run_statement(&mut self, sql: &str) -> i32 {
        self.shared.executed.lock().push(ExecutedStatement {
            sql: sql.to_owned(),
            parameters: std::mem::take(&mut self.pending_binds),
        });

        let step = self
            .shared
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(Step::ok);

        self.current_row = None;

        if step.rc != OK {
            self.stream = None;
            self.last_error = step.message;
            return step.rc;
        }

        self.stream = Some(Stream {
            columns: step.columns,
            rows: step
                .rows
                .iter()
                .map(|row| row.iter().map(encode_cell).collect())
                .collect(),
            effects: step.effects,
            row_error: step.row_error,
        });

        OK
    }

    fn bind_parameter(&mut self, name: &str, ty: ColumnType, data: Option<&[u8]>) -> i32 {
        self.pending_binds.push(BoundParam::Scalar {
            name: name.to_owned(),
            type_code: ty.code(),
            data: data.map(<[u8]>::to_vec),
        });
        OK
    }

    fn bind_array_parameter(
        &mut self,
        name: &str,
        element_type: ColumnType,
        count: usize,
        data: &[u8],
    ) -> i32 {
        self.pending_binds.push(BoundParam::Array {
            name: name.to_owned(),
            element_type_code: element_type.code(),
            count,
            data: data.to_vec(),
        });
        OK
    }

    fn clear_bindings(&mut self) -> i32 {
        *self.shared.clear_bindings_calls.lock() += 1;
        self.pending_binds.clear();
        OK
    }

    fn next_record(&mut self) -> i32 {
        let Some(stream) = self.stream.as_mut() else {
            return OK_DONE;
        };

        match stream.rows.pop_front() {
            Some(row) => {
                self.current_row = Some(row);
                OK
            }
            None => {
                self.current_row = None;
                match stream.row_error.take() {
                    Some((rc, message)) => {
                        self.last_error = message;
                        rc
                    }
                    None => OK_DONE,
                }
            }
        }
    }

    fn column_count(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.columns.len())
    }

    fn column_name(&self, index: usize) -> &str {
        self.stream
            .as_ref()
            .map_or("", |s| s.columns[index].0.as_str())
    }

    fn column_type(&self, index: usize) -> i32 {
        self.stream.as_ref().map_or(0, |s| s.columns[index].1)
    }

    fn column_value(&self, index: usize) -> Option<&[u8]> {
        self.current_row
            .as_ref()
            .and_then(|row| row[index].as_deref())
    }

    fn effects(&mut self) -> Result<Effects, i32> {
        match self.stream.as_ref().and_then(|s| s.effects) {
            Some(effects) => Ok(effects),
            None => {
                self.last_error = "no effects available".to_owned();
                Err(code::UNKNOWN)
            }
        }
    }

    fn error_string(&self) -> String {
        self.last_error.clone()
    }

    fn close(&mut self) -> i32 {
        self.stream = None;
        self.current_row = None;
        OK
    }
}
