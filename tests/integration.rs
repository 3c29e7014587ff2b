use std::{collections::HashSet, time::Duration};

use assert_matches::assert_matches;
use rmpv::Value;
use sha1::{Digest, Sha1};
use tarantool_iproto::{
    errors::HandshakeError, Connection, Error, ExecutorExt, IteratorType, Schema, SpaceSchema,
};

use crate::common::{codes, keys, Action, MockServer};

mod common;

fn expected_scramble(password: &str) -> Vec<u8> {
    let hash_1 = Sha1::digest(password.as_bytes());
    let hash_2 = Sha1::digest(hash_1);
    let mut hasher = Sha1::new();
    hasher.update(common::auth_salt());
    hasher.update(hash_2);
    let hash_3 = hasher.finalize();
    hash_1.iter().zip(hash_3.iter()).map(|(l, r)| l ^ r).collect()
}

async fn wait_until_dead(conn: &Connection) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while conn.alive() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn ping_without_auth() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| {
        assert_ne!(
            frame.request_type,
            codes::AUTH,
            "guest with empty password must not send AUTH"
        );
        Action::ReplyEmpty
    })
    .await;

    let conn = Connection::builder()
        .auth("guest", None)
        .build(server.addr())
        .await?;
    let elapsed = conn.ping().await?;
    assert!(elapsed > Duration::ZERO);
    assert!(conn.alive());
    Ok(())
}

#[tokio::test]
async fn auth_sends_chap_sha1_scramble() -> Result<(), anyhow::Error> {
    let expected = expected_scramble("A-4-7-1");
    let server = MockServer::start(move |frame| {
        if frame.request_type == codes::AUTH {
            let user = frame
                .body_field(keys::USER_NAME)
                .and_then(|x| x.as_str())
                .expect("user name in AUTH body");
            assert_eq!(user, "Sisko");
            let Some(Value::Array(tuple)) = frame.body_field(keys::TUPLE) else {
                panic!("tuple in AUTH body");
            };
            assert_eq!(tuple[0].as_str(), Some("chap-sha1"));
            let Value::Binary(scramble) = &tuple[1] else {
                panic!("scramble must be binary");
            };
            assert_eq!(*scramble, expected);
        }
        Action::ReplyEmpty
    })
    .await;

    let conn = Connection::builder()
        .auth("Sisko", "A-4-7-1")
        .build(server.addr())
        .await?;
    conn.ping().await?;
    Ok(())
}

#[tokio::test]
async fn auth_rejection_fails_handshake() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| {
        if frame.request_type == codes::AUTH {
            Action::ReplyError(47, "User not found or supplied credentials are invalid".into())
        } else {
            Action::ReplyEmpty
        }
    })
    .await;

    let result = Connection::builder()
        .auth("Quark", "Q-0-0-0")
        .build(server.addr())
        .await
        .map(drop);
    assert_matches!(
        result,
        Err(Error::Handshake(HandshakeError::Rejected(x))) if x.code == 47
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_calls_receive_their_own_responses() -> Result<(), anyhow::Error> {
    const CALLERS: u64 = 100;

    let mut seen_syncs = HashSet::new();
    let mut last_sync = None;
    let server = MockServer::start(move |frame| {
        assert!(seen_syncs.insert(frame.sync), "sync must never repeat");
        if let Some(last) = last_sync.replace(frame.sync) {
            assert!(frame.sync > last, "syncs must increase monotonically");
        }
        let arg = frame
            .body_field(keys::TUPLE)
            .and_then(|x| x.as_array()?.first()?.as_u64())
            .expect("call argument");
        // Later requests answer earlier, shuffling the reply order
        let delay = Duration::from_millis(CALLERS - arg);
        Action::ReplyDataAfter(Value::Array(vec![arg.into()]), delay)
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;
    let tasks: Vec<_> = (0..CALLERS)
        .map(|n| {
            let conn = conn.clone();
            tokio::spawn(async move {
                let response: (u64,) = conn.call("echo", (n,)).await?.decode()?;
                Result::<u64, Error>::Ok(response.0)
            })
        })
        .collect();

    for (n, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await?.unwrap(), n as u64);
    }
    Ok(())
}

#[tokio::test]
async fn timed_out_request_leaves_connection_alive() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| {
        if frame.request_type != codes::CALL {
            return Action::ReplyEmpty; // keep-alive pings
        }
        let name = frame
            .body_field(keys::FUNCTION_NAME)
            .and_then(|x| x.as_str())
            .expect("function name");
        if name == "slow" {
            Action::Ignore
        } else {
            Action::ReplyData(Value::Array(vec![1.into()]))
        }
    })
    .await;

    let conn = Connection::builder()
        .read_timeout(Duration::from_millis(300))
        .build(server.addr())
        .await?;

    assert_matches!(conn.call("slow", ()).await, Err(Error::Timeout));
    assert!(conn.alive());

    // the connection still serves requests afterwards
    let response: (u64,) = conn.call("fast", ()).await?.decode()?;
    assert_eq!(response.0, 1);
    assert!(conn.alive());
    Ok(())
}

#[tokio::test]
async fn server_drop_fails_all_pending_requests() -> Result<(), anyhow::Error> {
    const PENDING: usize = 5;

    let mut calls_seen = 0;
    let server = MockServer::start(move |frame| {
        if frame.request_type != codes::CALL {
            return Action::ReplyEmpty;
        }
        calls_seen += 1;
        if calls_seen == PENDING {
            Action::Drop
        } else {
            Action::Ignore
        }
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;
    let tasks: Vec<_> = (0..PENDING)
        .map(|_| {
            let conn = conn.clone();
            tokio::spawn(async move { conn.call("wait", ()).await.map(drop) })
        })
        .collect();

    for task in tasks {
        assert_matches!(
            task.await?,
            Err(Error::ConnectionClosed | Error::Io(_) | Error::Decode(_))
        );
    }

    wait_until_dead(&conn).await;
    assert!(!conn.alive());
    assert_matches!(conn.ping().await, Err(Error::ConnectionClosed));
    Ok(())
}

#[tokio::test]
async fn server_error_does_not_kill_connection() -> Result<(), anyhow::Error> {
    let mut first_call = true;
    let server = MockServer::start(move |frame| {
        if frame.request_type != codes::CALL {
            return Action::ReplyEmpty;
        }
        if first_call {
            first_call = false;
            Action::ReplyError(55, "Space not found".into())
        } else {
            Action::ReplyData(Value::Array(vec![1.into()]))
        }
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;
    assert_matches!(
        conn.call("broken", ()).await,
        Err(Error::Response(x)) if x.code == 55 && x.description == "Space not found"
    );
    assert!(conn.alive());

    let response: (u64,) = conn.call("works", ()).await?.decode()?;
    assert_eq!(response.0, 1);
    Ok(())
}

#[tokio::test]
async fn eval_returns_data() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| {
        if frame.request_type != codes::EVAL {
            return Action::ReplyEmpty;
        }
        let args = frame
            .body_field(keys::TUPLE)
            .and_then(|x| x.as_array().cloned())
            .expect("eval arguments");
        let sum: u64 = args.iter().filter_map(|x| x.as_u64()).sum();
        Action::ReplyData(Value::Array(vec![sum.into()]))
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;
    let sum: u64 = conn
        .eval("local a, b = ...; return a + b", (1, 2))
        .await?
        .decode_first()?;
    assert_eq!(sum, 3);
    Ok(())
}

#[tokio::test]
async fn dmo_responses_carry_rows() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| match frame.request_type {
        codes::INSERT => {
            let tuple = frame.body_field(keys::TUPLE).expect("tuple in body").clone();
            Action::ReplyData(Value::Array(vec![tuple]))
        }
        codes::UPDATE => Action::ReplyData(Value::Array(vec![Value::Array(vec![
            1.into(),
            "vladfaust".into(),
        ])])),
        _ => Action::ReplyEmpty,
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;

    let inserted: (u32, String) = conn.insert(999u32, (1u32, "vlad")).await?.decode()?;
    assert_eq!(inserted, (1, "vlad".to_owned()));

    let updated: (u32, String) = conn
        .update(999u32, 0u32, (1u32,), ((":", 1, 0, 0, "vlad"),))
        .await?
        .decode()?;
    assert_eq!(updated, (1, "vladfaust".to_owned()));
    Ok(())
}

fn schema_handler(frame: &common::Frame) -> Action {
    match frame.request_type {
        codes::EVAL => {
            let expr = frame
                .body_field(keys::EXPR)
                .and_then(|x| x.as_str())
                .expect("eval expression");
            match expr {
                "return box.space" => Action::ReplyData(Value::Array(vec![Value::Map(vec![
                    ("examples".into(), Value::Map(vec![])),
                    (999.into(), Value::Map(vec![])),
                ])])),
                "return box.space.examples.id" => {
                    Action::ReplyData(Value::Array(vec![999.into()]))
                }
                "return box.space.examples.index" => {
                    Action::ReplyData(Value::Array(vec![Value::Map(vec![
                        (
                            "primary".into(),
                            Value::Map(vec![("id".into(), 0.into()), ("unique".into(), true.into())]),
                        ),
                        (
                            0.into(),
                            Value::Map(vec![("id".into(), 0.into()), ("unique".into(), true.into())]),
                        ),
                    ])]))
                }
                rest => panic!("unexpected eval expression: {rest}"),
            }
        }
        codes::SELECT => {
            let space_id = frame
                .body_field(keys::SPACE_ID)
                .and_then(|x| x.as_u64())
                .expect("space id");
            let index_id = frame
                .body_field(keys::INDEX_ID)
                .and_then(|x| x.as_u64())
                .expect("index id");
            assert_eq!((space_id, index_id), (999, 0), "names must resolve to ids");
            Action::ReplyData(Value::Array(vec![Value::Array(vec![
                1.into(),
                "vlad".into(),
            ])]))
        }
        _ => Action::ReplyEmpty,
    }
}

#[tokio::test]
async fn parse_schema_enables_select_by_name() -> Result<(), anyhow::Error> {
    let server = MockServer::start(schema_handler).await;

    let conn = Connection::builder().build(server.addr()).await?;
    conn.parse_schema().await?;

    let schema = conn.schema();
    assert_eq!(schema.space("examples").map(|x| x.id()), Some(999));

    let rows: Vec<(u32, String)> = conn
        .select(
            "examples",
            "primary",
            None,
            None,
            Some(IteratorType::Equal),
            (1,),
        )
        .await?;
    assert_eq!(rows, vec![(1, "vlad".to_owned())]);
    Ok(())
}

#[tokio::test]
async fn seeded_schema_enables_select_by_name() -> Result<(), anyhow::Error> {
    let server = MockServer::start(schema_handler).await;

    let conn = Connection::builder().build(server.addr()).await?;

    let mut space = SpaceSchema::new(999);
    space.insert_index("primary", 0);
    let mut schema = Schema::default();
    schema.insert_space("examples", space);
    conn.set_schema(schema);

    let rows: Vec<(u32, String)> = conn
        .select("examples", "primary", None, None, None, (1,))
        .await?;
    assert_eq!(rows, vec![(1, "vlad".to_owned())]);
    Ok(())
}

#[tokio::test]
async fn select_by_unknown_name_fails_locally() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|_| Action::ReplyEmpty).await;
    let conn = Connection::builder().build(server.addr()).await?;

    let without_schema: Result<Vec<Value>, _> =
        conn.select("examples", 0u32, None, None, None, ()).await;
    assert_matches!(without_schema, Err(Error::SchemaNotLoaded));

    let mut schema = Schema::default();
    schema.insert_space("other", SpaceSchema::new(512));
    conn.set_schema(schema);
    let unknown: Result<Vec<Value>, _> = conn.select("examples", 0u32, None, None, None, ()).await;
    assert_matches!(unknown, Err(Error::UnknownSpace(_)));
    Ok(())
}

#[tokio::test]
async fn close_fails_pending_requests_and_marks_connection_dead() -> Result<(), anyhow::Error> {
    let server = MockServer::start(|frame| {
        if frame.request_type == codes::CALL {
            Action::Ignore
        } else {
            Action::ReplyEmpty
        }
    })
    .await;

    let conn = Connection::builder().build(server.addr()).await?;
    let pending = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.call("wait", ()).await.map(drop) })
    };
    // let the request reach the wire before closing
    tokio::time::sleep(Duration::from_millis(50)).await;

    conn.close().await;
    assert_matches!(pending.await?, Err(Error::ConnectionClosed));

    wait_until_dead(&conn).await;
    assert!(!conn.alive());
    assert_matches!(conn.ping().await, Err(Error::ConnectionClosed));
    Ok(())
}
