use anyhow::Result;

use comdb2::testing::{BoundParam, OpenCall, ScriptedConnector, Step};
use comdb2::{
    code, Arguments, ColumnType, Comdb2Error, ConnectOptions, ConnectionFlags, Effects, Error,
    ErrorKind, Handle, Value,
};

fn options() -> ConnectOptions {
    ConnectOptions::new("testdb")
}

fn no_args() -> Arguments {
    Arguments::new()
}

#[test]
fn connect_opens_the_tier_and_sets_the_timezone() -> Result<()> {
    let connector = ScriptedConnector::new();
    Handle::connect(&options().tier("prod"), &connector)?;

    assert_eq!(
        connector.opens(),
        vec![OpenCall {
            database: "testdb".to_owned(),
            tier: "prod".to_owned(),
            flags: ConnectionFlags::empty(),
        }]
    );
    assert_eq!(connector.statements(), vec!["set timezone UTC"]);

    Ok(())
}

#[test]
fn connecting_to_a_host_implies_direct_cpu() -> Result<()> {
    let connector = ScriptedConnector::new();
    Handle::connect(&options().host("machine7"), &connector)?;

    let opens = connector.opens();
    assert_eq!(opens[0].tier, "machine7");
    assert!(opens[0].flags.contains(ConnectionFlags::DIRECT_CPU));

    Ok(())
}

#[test]
fn host_and_tier_are_mutually_exclusive() {
    let connector = ScriptedConnector::new();
    let result = Handle::connect(&options().tier("prod").host("machine7"), &connector);

    assert!(matches!(result, Err(Error::Interface(_))));
    assert!(connector.opens().is_empty());
}

#[test]
fn connect_failures_surface_the_database_error() {
    let connector = ScriptedConnector::new();
    connector.fail_open(Comdb2Error::new(code::CONNECT_ERROR, "no such db"));

    let result = Handle::connect(&options(), &connector);
    match result {
        Err(Error::Database(e)) => assert_eq!(e.code(), code::CONNECT_ERROR),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn disabling_the_timezone_skips_the_set_command() -> Result<()> {
    let connector = ScriptedConnector::new();
    Handle::connect(&options().timezone(None), &connector)?;

    assert!(connector.statements().is_empty());

    Ok(())
}

#[test]
fn select_streams_rows_to_exhaustion() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(Step::rows(
        &[("a", ColumnType::Integer), ("b", ColumnType::Cstring)],
        vec![
            vec![Value::Integer(1), Value::Text("x".into())],
            vec![Value::Integer(2), Value::Null],
        ],
    ));

    let mut rows = handle.execute("select a, b from t", &no_args())?;
    assert_eq!(handle.column_names()?, vec!["a", "b"]);
    assert_eq!(
        handle.column_types()?,
        vec![ColumnType::Integer.code(), ColumnType::Cstring.code()]
    );

    let first = rows.try_next()?.expect("first row");
    assert_eq!(first[0], Value::Integer(1));
    assert_eq!(first.try_get("b")?, &Value::Text("x".into()));

    let second = rows.try_next()?.expect("second row");
    assert!(second[1].is_null());

    assert!(rows.try_next()?.is_none());
    // exhaustion is sticky
    assert!(rows.try_next()?.is_none());

    Ok(())
}

#[test]
fn unread_rows_are_drained_before_the_next_statement() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(Step::rows(
        &[("n", ColumnType::Integer)],
        vec![
            vec![Value::Integer(1)],
            vec![Value::Integer(2)],
            vec![Value::Integer(3)],
        ],
    ));
    let mut rows = handle.execute("select n from t", &no_args())?;
    let _ = rows.try_next()?;

    // two rows are still unread; executing again must not trip over them
    connector.push(Step::rows(
        &[("m", ColumnType::Integer)],
        vec![vec![Value::Integer(9)]],
    ));
    let mut rows = handle.execute("select m from t2", &no_args())?;
    assert_eq!(rows.try_next()?.expect("row")[0], Value::Integer(9));

    Ok(())
}

#[test]
fn rows_are_invalidated_by_a_later_statement() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(Step::rows(
        &[("n", ColumnType::Integer)],
        vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
    ));
    let mut stale = handle.execute("select n from t", &no_args())?;

    handle.execute("select 1", &no_args())?;

    let err = stale.try_next().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    Ok(())
}

#[test]
fn parameters_are_bound_as_typed_little_endian_payloads() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    let mut args = Arguments::new();
    args.add("id", 7i64);
    args.add("name", "ada");
    args.add("score", 1.5f64);
    args.add("photo", vec![0xde_u8, 0xad]);
    args.add("note", None::<&str>);

    handle.execute("select * from t where id = @id", &args)?;

    let executed = connector.executed();
    let params = &executed.last().expect("statement").parameters;
    assert_eq!(params.len(), 5);

    assert_eq!(
        params[0],
        BoundParam::Scalar {
            name: "id".to_owned(),
            type_code: ColumnType::Integer.code(),
            data: Some(7i64.to_le_bytes().to_vec()),
        }
    );
    assert_eq!(
        params[1],
        BoundParam::Scalar {
            name: "name".to_owned(),
            type_code: ColumnType::Cstring.code(),
            data: Some(b"ada\0".to_vec()),
        }
    );
    assert_eq!(
        params[3],
        BoundParam::Scalar {
            name: "photo".to_owned(),
            type_code: ColumnType::Blob.code(),
            data: Some(vec![0xde, 0xad]),
        }
    );
    // null binds no payload
    assert_eq!(
        params[4],
        BoundParam::Scalar {
            name: "note".to_owned(),
            type_code: ColumnType::Integer.code(),
            data: None,
        }
    );

    Ok(())
}

#[test]
fn integer_arrays_bind_as_carrays() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    let mut args = Arguments::new();
    args.add("ids", vec![1i64, 2, 3]);
    handle.execute("select * from t where id in carray(@ids)", &args)?;

    let executed = connector.executed();
    match &executed.last().expect("statement").parameters[0] {
        BoundParam::Array {
            name,
            element_type_code,
            count,
            data,
        } => {
            assert_eq!(name, "ids");
            assert_eq!(*element_type_code, ColumnType::Integer.code());
            assert_eq!(*count, 3);
            assert_eq!(data.len(), 24);
        }
        other => panic!("expected an array bind, got {other:?}"),
    }

    Ok(())
}

#[test]
fn an_empty_array_fails_before_any_network_call() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    let mut args = Arguments::new();
    args.add("ids", Vec::<i64>::new());

    let err = handle
        .execute("select * from t where id in carray(@ids)", &args)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    // only the connect-time set command ever reached the connection
    assert_eq!(connector.statements(), vec!["set timezone UTC"]);

    Ok(())
}

#[test]
fn bindings_are_cleared_even_when_the_statement_fails() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;
    let clears_after_connect = connector.clear_bindings_calls();

    connector.push(Step::error(code::PREPARE_ERROR, "syntax error near 'frm'"));

    let mut args = Arguments::new();
    args.add("id", 1i64);
    let err = handle.execute("select * frm t where id = @id", &args).unwrap_err();

    match err {
        Error::Database(e) => {
            assert_eq!(e.code(), code::PREPARE_ERROR);
            assert!(e.message().contains("syntax error"));
            assert_eq!(e.kind(), ErrorKind::Programming);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(connector.clear_bindings_calls(), clears_after_connect + 1);

    Ok(())
}

#[test]
fn constraint_failures_classify_by_code() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(Step::error(code::DUPLICATE, "add key constraint duplicate key"));
    let err = handle.execute("insert into t values (1)", &no_args()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UniqueViolation);
    assert!(err.kind().is_integrity());

    Ok(())
}

#[test]
fn a_stream_can_fail_mid_read() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(
        Step::rows(&[("n", ColumnType::Integer)], vec![vec![Value::Integer(1)]])
            .row_error(code::IO_ERROR, "connection dropped"),
    );

    let mut rows = handle.execute("select n from t", &no_args())?;
    assert!(rows.try_next()?.is_some());

    match rows.try_next() {
        Err(Error::Database(e)) => assert_eq!(e.code(), code::IO_ERROR),
        other => panic!("unexpected result: {other:?}"),
    }

    Ok(())
}

#[test]
fn effects_are_read_after_draining_the_stream() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    connector.push(
        Step::rows(&[("n", ColumnType::Integer)], vec![vec![Value::Integer(1)]]).effects(
            Effects {
                num_affected: 1,
                num_selected: 1,
                ..Effects::default()
            },
        ),
    );

    handle.execute("select n from t", &no_args())?;

    // no rows were read; get_effects drains for us
    let effects = handle.get_effects()?;
    assert_eq!(effects.num_affected, 1);

    Ok(())
}

#[test]
fn datetime_columns_round_trip_with_their_zone() -> Result<()> {
    use chrono::NaiveDate;
    use comdb2::Timestamp;

    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    let ts = Timestamp::new(
        NaiveDate::from_ymd_opt(2023, 4, 5)
            .expect("date")
            .and_hms_milli_opt(6, 7, 8, 90)
            .expect("time"),
        "US/Eastern",
    );
    connector.push(Step::rows(
        &[("when", ColumnType::Datetime)],
        vec![vec![Value::Datetime(ts.clone())]],
    ));

    let mut rows = handle.execute("select when from t", &no_args())?;
    let row = rows.try_next()?.expect("row");
    assert_eq!(row[0], Value::Datetime(ts));

    Ok(())
}

#[test]
fn a_closed_handle_rejects_everything() -> Result<()> {
    let connector = ScriptedConnector::new();
    let handle = Handle::connect(&options(), &connector)?;

    handle.close()?;

    assert!(matches!(
        handle.execute("select 1", &no_args()),
        Err(Error::NotConnected { .. })
    ));
    assert!(matches!(handle.get_effects(), Err(Error::NotConnected { .. })));
    assert!(matches!(handle.close(), Err(Error::NotConnected { .. })));

    Ok(())
}
