use crate::{
    config::Config,
    method::{UnsupportedMethod, Verb},
    query::QueryParams,
    report::{BodyLine, RequestReport, Sink},
};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use humansize::{format_size, DECIMAL};
use std::{io, string::FromUtf8Error, sync::Arc};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

macro_rules! silly {
    ($code:ident) => {
        (StatusCode::$code, StatusCode::$code.to_string())
    };
}

pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub sink: Sink,
}

pub type ArcState = Arc<AppState>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedMethod),
    #[error("Missing Content-Length header")]
    LengthRequired,
    #[error("Invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),
    #[error("Body of {0} bytes is above the {1} byte limit")]
    BodyAboveMaxSize(usize, usize),
    #[error("Body ended after {received} of {expected} bytes")]
    IncompleteBody { expected: usize, received: usize },
    #[error("Error while reading body: {0}")]
    BodyRead(io::Error),
    #[error("Body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("{}", self);
        match self {
            Self::Unsupported(err) => (StatusCode::NOT_IMPLEMENTED, err.to_string()),
            Self::LengthRequired => silly!(LENGTH_REQUIRED),
            Self::BodyAboveMaxSize(..) => silly!(PAYLOAD_TOO_LARGE),
            Self::InvalidContentLength(_)
            | Self::IncompleteBody { .. }
            | Self::BodyRead(_)
            | Self::InvalidUtf8(_) => silly!(BAD_REQUEST),
        }
        .into_response()
    }
}

fn content_length(headers: &HeaderMap) -> Result<usize, AppError> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or(AppError::LengthRequired)?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or_else(|| {
            AppError::InvalidContentLength(String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
}

/// Reads exactly `Content-Length` bytes of `body` and decodes them as UTF-8.
pub async fn read_body(
    headers: &HeaderMap,
    body: Body,
    max_body_size: usize,
) -> Result<String, AppError> {
    let expected = content_length(headers)?;

    if expected > max_body_size {
        return Err(AppError::BodyAboveMaxSize(expected, max_body_size));
    }

    debug!("reading body ({})", format_size(expected, DECIMAL));

    let reader = StreamReader::new(
        body.into_data_stream()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err)),
    );

    let mut buf = Vec::with_capacity(expected);
    reader
        .take(expected as u64)
        .read_to_end(&mut buf)
        .await
        .map_err(AppError::BodyRead)?;

    if buf.len() < expected {
        return Err(AppError::IncompleteBody {
            expected,
            received: buf.len(),
        });
    }

    Ok(String::from_utf8(buf)?)
}

/// The request target as the client sent it: absolute-form targets keep
/// their scheme and authority.
fn raw_target(uri: &Uri) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    uri.path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string()
}

pub async fn inspect(
    State(state): State<ArcState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let verb = Verb::try_from(&method)?;
    trace!("dispatching {} {}", <&str>::from(verb), uri);
    let query = QueryParams::from_uri(&uri);
    let raw_path = raw_target(&uri);

    let body = match verb {
        Verb::Get => Ok(None),
        Verb::Post => read_body(&headers, body, state.config.max_body_size)
            .await
            .map(Some),
    };

    let report = RequestReport {
        raw_path: &raw_path,
        path: uri.path(),
        query: &query,
        headers: &headers,
        body: match &body {
            Ok(None) => BodyLine::Absent,
            Ok(Some(text)) => BodyLine::Text(text),
            Err(err) => BodyLine::Rejected(err),
        },
    };

    if let Err(err) = state.sink.emit(&report) {
        error!("Error while writing request report: {}", err);
    }

    body?;

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], verb.greeting()).into_response())
}
