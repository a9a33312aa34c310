
use serde::Deserialize;

use crate::{
    bson::{doc, Bson, Document},
    bson_util,
    cmap::conn::wire::{
        next_request_id,
        FrameBuilder,
        OpCode,
        Reply,
        ReplyMessage,
        RequestMessage,
        ResponseFlags,
    },
    coll::Namespace,
    concern::AcknowledgmentOptions,
    error::{CommandError, Error, ErrorKind, Result, WriteConcernError, WriteError, WriteFailure},
    options::ServerAddress,
    results::CommandResult,
};

/// The code reported for a write error whose reply names none.
const UNKNOWN_ERROR_CODE: i32 = 8;

/// The code reported when a `wtimeout` elapsed and the reply names no code.
const WRITE_CONCERN_TIMEOUT_CODE: i32 = 64;

/// The code reported for a `wnote`/`jnote` that comes without a code.
const UNSATISFIABLE_WRITE_CONCERN_CODE: i32 = 100;

/// The acknowledgment command sent after a write: asks the server for the outcome of the last
/// operation on the connection, waiting as long as the write concern requires.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GetLastError {
    ns: Namespace,
    options: AcknowledgmentOptions,
}

impl GetLastError {
    /// Creates the command acknowledging a write to `ns`. It is addressed to the command
    /// pseudo-collection of `ns`'s database.
    pub(crate) fn new(ns: &Namespace, options: AcknowledgmentOptions) -> Self {
        Self {
            ns: ns.command_namespace(),
            options,
        }
    }

    pub(crate) fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub(crate) fn to_document(&self) -> Result<Document> {
        let mut command = doc! { "getlasterror": 1 };
        command.extend(crate::bson::to_document(&self.options)?);
        Ok(command)
    }

    /// Appends this command to `buf` as an OP_QUERY that expects a single reply document.
    pub(crate) fn encode(
        &self,
        buf: &mut Vec<u8>,
        max_document_size: usize,
    ) -> Result<RequestMessage> {
        let command = self.to_document()?;
        let mut frame = FrameBuilder::begin(buf, OpCode::Query, next_request_id());
        frame.write_i32(0);
        frame.write_cstring(&self.ns.to_string())?;
        frame.write_i32(0);
        frame.write_i32(-1);
        frame.write_document(&command, max_document_size)?;
        frame.finish(true)
    }

    /// Translates the reply to this command into the write's result.
    ///
    /// A reply whose `ok` is not 1 is a command failure. A successful reply that still carries an
    /// `err`, `wnote` or `jnote` means the write itself was rejected or its write concern could not
    /// be satisfied.
    pub(crate) fn handle_response(
        &self,
        message: &ReplyMessage,
        address: &ServerAddress,
    ) -> Result<CommandResult> {
        let reply = Reply::parse(message)?;
        let query_failed = reply.flags.contains(ResponseFlags::QUERY_FAILURE);
        let response = reply.into_single_document()?;

        if query_failed {
            return Err(ErrorKind::Command(CommandError {
                code: response
                    .get("code")
                    .and_then(bson_util::get_int)
                    .and_then(|code| i32::try_from(code).ok())
                    .unwrap_or_default(),
                code_name: String::new(),
                message: response.get_str("$err").unwrap_or_default().to_string(),
                labels: Vec::new(),
            })
            .into());
        }

        let body: GetLastErrorReply = crate::bson::from_document(response.clone())?;
        let code = body
            .code
            .as_ref()
            .and_then(bson_util::get_int)
            .and_then(|code| i32::try_from(code).ok());

        if !bson_util::is_ok(body.ok.as_ref()) {
            return Err(ErrorKind::Command(CommandError {
                code: code.unwrap_or_default(),
                code_name: body.code_name.unwrap_or_default(),
                message: body.errmsg.or(body.err).unwrap_or_default(),
                labels: body.error_labels,
            })
            .into());
        }

        if let Some(message) = body.err {
            let failure = if body.wtimeout == Some(true) {
                WriteFailure::WriteConcernError(WriteConcernError {
                    code: code.unwrap_or(WRITE_CONCERN_TIMEOUT_CODE),
                    message,
                    timed_out: true,
                    details: body.err_info,
                })
            } else {
                WriteFailure::WriteError(WriteError {
                    code: code.unwrap_or(UNKNOWN_ERROR_CODE),
                    message,
                    details: body.err_info,
                })
            };
            return Err(Error::new(ErrorKind::Write(failure), Some(body.error_labels)));
        }

        if let Some(message) = body.wnote.or(body.jnote) {
            return Err(Error::new(
                ErrorKind::Write(WriteFailure::WriteConcernError(WriteConcernError {
                    code: code.unwrap_or(UNSATISFIABLE_WRITE_CONCERN_CODE),
                    message,
                    timed_out: false,
                    details: body.err_info,
                })),
                Some(body.error_labels),
            ));
        }

        Ok(CommandResult::new(address.clone(), response))
    }
}

/// The fields of a `getlasterror` reply that decide its outcome.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLastErrorReply {
    ok: Option<Bson>,
    err: Option<String>,
    code: Option<Bson>,
    code_name: Option<String>,
    errmsg: Option<String>,
    wtimeout: Option<bool>,
    wnote: Option<String>,
    jnote: Option<String>,
    err_info: Option<Document>,
    #[serde(default)]
    error_labels: Vec<String>,
}
