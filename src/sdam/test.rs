use std::sync::Arc;

use tokio::io::DuplexStream;

use crate::{
    cmap::{Connection, StreamDescription},
    error::ErrorKind,
    options::ConnectionOptions,
    sdam::{PrimarySelector, ServerSelector, ServerType},
};

fn connection() -> Arc<Connection<DuplexStream>> {
    // Selection does no I/O, so the server half is not needed.
    let (client, _) = tokio::io::duplex(64);
    Arc::new(Connection::new(
        client,
        StreamDescription::new_testing(),
        ConnectionOptions::default(),
    ))
}

#[test]
fn writable_server_types() {
    assert!(ServerType::Standalone.is_writable());
    assert!(ServerType::RsPrimary.is_writable());
    assert!(ServerType::Mongos.is_writable());
    assert!(!ServerType::RsSecondary.is_writable());
    assert!(!ServerType::RsArbiter.is_writable());
    assert!(!ServerType::RsGhost.is_writable());
    assert!(!ServerType::Unknown.is_writable());
    assert_eq!(ServerType::default(), ServerType::Unknown);
}

#[tokio::test]
async fn selects_the_primary() {
    let secondary = connection();
    let primary = connection();
    let selector = PrimarySelector::new([
        (ServerType::RsSecondary, secondary.clone()),
        (ServerType::RsPrimary, primary.clone()),
    ]);

    let selected = selector.select_primary().await.unwrap();
    assert!(Arc::ptr_eq(&selected, &primary));
}

#[tokio::test]
async fn no_primary_is_a_selection_error() {
    let selector = PrimarySelector::new([
        (ServerType::RsSecondary, connection()),
        (ServerType::RsArbiter, connection()),
    ]);
    let error = selector.select_primary().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::ServerSelection { .. }));
    assert!(error.is_transport_error());

    let empty: PrimarySelector<DuplexStream> = PrimarySelector::new([]);
    assert!(empty.select_primary().await.is_err());
}

#[tokio::test]
async fn candidates_can_be_replaced() {
    let old_primary = connection();
    let new_primary = connection();
    let selector = PrimarySelector::new([(ServerType::RsPrimary, old_primary.clone())]);

    selector
        .set_candidates([
            (ServerType::RsSecondary, old_primary),
            (ServerType::RsPrimary, new_primary.clone()),
        ])
        .await;
    let selected = selector.select_primary().await.unwrap();
    assert!(Arc::ptr_eq(&selected, &new_primary));
}
