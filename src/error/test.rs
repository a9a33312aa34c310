use crate::{
    bson::doc,
    error::{CommandError, Error, ErrorKind, WriteConcernError, WriteError, WriteFailure},
    options::ServerAddress,
};

fn write_error(code: i32) -> Error {
    ErrorKind::Write(WriteFailure::WriteError(WriteError {
        code,
        message: "E11000 duplicate key error".to_string(),
        details: None,
    }))
    .into()
}

#[test]
fn error_categories() {
    let encoding = Error::encoding("document too large");
    assert!(encoding.is_encoding_error());
    assert!(!encoding.is_transport_error());

    let io: Error = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
    assert!(io.is_transport_error());
    assert!(!io.is_timeout());

    let timeout: Error = std::io::ErrorKind::TimedOut.into();
    assert!(timeout.is_transport_error());
    assert!(timeout.is_timeout());

    assert!(Error::server_selection("no primary").is_transport_error());
    assert!(Error::connection_closed(&ServerAddress::default()).is_transport_error());

    let command: Error = ErrorKind::Command(CommandError {
        code: 13,
        code_name: "Unauthorized".to_string(),
        message: "not authorized".to_string(),
        labels: vec!["Label".to_string()],
    })
    .into();
    assert!(command.is_command_error());
    assert!(!command.is_write_error());
    assert_eq!(command.code(), Some(13));
    assert!(command.contains_label("Label"));

    let write = write_error(11000);
    assert!(write.is_write_error());
    assert!(!write.is_command_error());
    assert_eq!(write.code(), Some(11000));
}

#[test]
fn duplicate_key_codes() {
    assert!(write_error(11000).is_duplicate_key());
    assert!(write_error(11001).is_duplicate_key());
    assert!(write_error(12582).is_duplicate_key());
    assert!(!write_error(121).is_duplicate_key());

    let wc: Error = ErrorKind::Write(WriteFailure::WriteConcernError(WriteConcernError {
        code: 64,
        message: "waiting for replication timed out".to_string(),
        timed_out: true,
        details: Some(doc! { "wtimeout": true }),
    }))
    .into();
    assert!(wc.is_write_error());
    assert!(!wc.is_duplicate_key());
    assert_eq!(wc.code(), Some(64));
}

#[test]
fn labels_from_constructor() {
    let err = Error::new(
        ErrorKind::InvalidResponse {
            message: "bad".to_string(),
        },
        Some(vec!["TransientError".to_string()]),
    );
    assert!(err.contains_label("TransientError"));
    assert!(!err.contains_label("Other"));
}
