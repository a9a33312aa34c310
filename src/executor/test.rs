use std::{sync::Arc, time::Duration};

use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    cmap::{conn::wire::OpCode, StreamDescription},
    coll::Namespace,
    concern::WriteConcern,
    operation::{WriteOperation, WriteRequest},
    options::ConnectionOptions,
    sdam::{PrimarySelector, ServerType},
    test::util::{tracking_pool, MockServer, ScriptedReply},
    WriteExecutor,
};

#[tokio::test]
async fn timeout_releases_outbound_buffer_before_waiting() {
    let options = ConnectionOptions::builder()
        .socket_timeout(Duration::from_millis(300))
        .build();
    let (conn, server) =
        MockServer::start([ScriptedReply::Silent], StreamDescription::new_testing(), options);
    let conn = Arc::new(conn);
    let (pool, provider) = tracking_pool();
    let executor = WriteExecutor::with_buffer_provider(
        PrimarySelector::new([(ServerType::Standalone, conn.clone())]),
        provider,
    );

    let ns = Namespace::new("db", "coll");
    let write = WriteRequest::insert([doc! { "x": 1 }]);
    let op = WriteOperation::new(&ns, &write, &WriteConcern::acknowledged()).unwrap();

    let execution = executor.execute_on_connection(&op, &conn);
    tokio::pin!(execution);

    // Drive the write until the server has seen the whole chain.
    loop {
        tokio::select! {
            biased;
            result = &mut execution => panic!("write completed early: {:?}", result),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {
                if server.frames().len() == 2 {
                    break;
                }
            }
        }
    }
    tokio::select! {
        biased;
        result = &mut execution => panic!("write completed early: {:?}", result),
        _ = tokio::time::sleep(Duration::from_millis(20)) => {}
    }
    assert_eq!(pool.outstanding(), 0);

    let error = execution.await.unwrap_err();
    assert!(error.is_transport_error());
    assert!(error.is_timeout());
    assert!(conn.is_broken());
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn concurrent_writes_do_not_interleave() {
    let (conn, server) = MockServer::start_default([
        ScriptedReply::Reply(doc! { "ok": 1, "n": 0, "err": null, "which": 1 }),
        ScriptedReply::Reply(doc! { "ok": 1, "n": 0, "err": null, "which": 2 }),
    ]);
    let (pool, provider) = tracking_pool();
    let executor = WriteExecutor::with_buffer_provider(
        PrimarySelector::new([(ServerType::Standalone, Arc::new(conn))]),
        provider,
    );

    let ns = Namespace::new("db", "coll");
    let first = WriteRequest::insert([doc! { "a": 1 }, doc! { "a": 2 }]);
    let second = WriteRequest::insert([doc! { "b": 1 }]);
    let write_concern = WriteConcern::acknowledged();
    let (first_result, second_result) = tokio::join!(
        executor.execute(&first, &ns, &write_concern),
        executor.execute(&second, &ns, &write_concern),
    );
    let first_result = first_result.unwrap().unwrap();
    let second_result = second_result.unwrap().unwrap();
    assert_ne!(first_result.get("which"), second_result.get("which"));

    let frames = server.frames();
    let op_codes: Vec<_> = frames.iter().map(|frame| frame.op_code()).collect();
    assert_eq!(
        op_codes,
        vec![OpCode::Insert, OpCode::Query, OpCode::Insert, OpCode::Query]
    );
    // Each acknowledgment immediately follows its own write.
    for pair in frames.chunks(2) {
        assert!(pair[1].request_id() > pair[0].request_id());
    }
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn acknowledgment_reply_matches_last_frame() {
    let description = StreamDescription::builder()
        .initial_server_type(ServerType::Standalone)
        .max_write_batch_size(1)
        .build();
    let (conn, server) =
        MockServer::start([ScriptedReply::ok()], description, ConnectionOptions::default());
    let conn = Arc::new(conn);
    let (pool, provider) = tracking_pool();
    let executor = WriteExecutor::with_buffer_provider(
        PrimarySelector::new([(ServerType::Standalone, conn.clone())]),
        provider,
    );

    let ns = Namespace::new("db", "coll");
    let write = WriteRequest::insert([doc! { "a": 1 }, doc! { "a": 2 }, doc! { "a": 3 }]);
    let op = WriteOperation::new(&ns, &write, &WriteConcern::acknowledged()).unwrap();
    let result = executor
        .execute_on_connection(&op, &conn)
        .await
        .unwrap()
        .unwrap();
    assert!(result.ok);

    let frames = server.frames();
    assert_eq!(frames.len(), 4);
    assert!(frames[..3]
        .iter()
        .all(|frame| frame.op_code() == OpCode::Insert));
    assert_eq!(frames[3].op_code(), OpCode::Query);
    assert_eq!(pool.outstanding(), 0);
}
