use crate::{handler::AppError, query::QueryParams};
use axum::http::HeaderMap;
use std::{
    fmt::{self, Display},
    io::{self, Write},
    sync::{Arc, Mutex},
};

pub const HEADER_FENCE: &str = "-----";

#[derive(Debug, Clone, Copy)]
pub enum BodyLine<'a> {
    /// GET requests carry no body line.
    Absent,
    Text(&'a str),
    /// The body could not be read or decoded; the record still goes out.
    Rejected(&'a AppError),
}

/// Everything logged about a single handled request.
#[derive(Debug)]
pub struct RequestReport<'a> {
    pub raw_path: &'a str,
    pub path: &'a str,
    pub query: &'a QueryParams,
    pub headers: &'a HeaderMap,
    pub body: BodyLine<'a>,
}

impl Display for RequestReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path = {}", self.raw_path)?;
        writeln!(f, "parsed: path = {}, query = {:?}", self.path, self.query)?;
        write!(f, "headers\r\n{}\r\n", HEADER_FENCE)?;
        for (name, value) in self.headers {
            write!(f, "{}: {}\r\n", name.as_str(), String::from_utf8_lossy(value.as_bytes()))?;
        }
        // blank line ends the header block, as on the wire
        write!(f, "\r\n")?;
        writeln!(f, "{}", HEADER_FENCE)?;
        match self.body {
            BodyLine::Absent => Ok(()),
            BodyLine::Text(body) => writeln!(f, "body = {}", body),
            BodyLine::Rejected(err) => writeln!(f, "body = <unreadable: {}>", err),
        }
    }
}

/// Shared destination for reports. Each report goes out in one write so
/// records from different requests never interleave.
#[derive(Clone)]
pub struct Sink(Arc<Mutex<Box<dyn Write + Send>>>);

impl Sink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn emit(&self, report: &RequestReport) -> io::Result<()> {
        let rendered = report.to_string();
        let mut writer = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "report sink poisoned"))?;
        writer.write_all(rendered.as_bytes())?;
        writer.flush()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sink")
    }
}

/// In-memory writer whose contents stay readable after being handed to a [`Sink`].
#[cfg(test)]
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:8080"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.4.0"));
        headers
    }

    #[test]
    fn renders_get_record() {
        let query = QueryParams::from_uri(&Uri::from_static("/anything?x=1&x=2"));
        let headers = headers();
        let report = RequestReport {
            raw_path: "/anything?x=1&x=2",
            path: "/anything",
            query: &query,
            headers: &headers,
            body: BodyLine::Absent,
        };

        assert_eq!(
            report.to_string(),
            "path = /anything?x=1&x=2\n\
             parsed: path = /anything, query = {\"x\": [\"1\", \"2\"]}\n\
             headers\r\n\
             -----\r\n\
             host: localhost:8080\r\n\
             user-agent: curl/8.4.0\r\n\
             \r\n\
             -----\n"
        );
    }

    #[test]
    fn body_line_follows_header_block() {
        let query = QueryParams::default();
        let headers = HeaderMap::new();
        let report = RequestReport {
            raw_path: "/submit",
            path: "/submit",
            query: &query,
            headers: &headers,
            body: BodyLine::Text("hello=world"),
        };

        let rendered = report.to_string();
        assert!(rendered.ends_with("headers\r\n-----\r\n\r\n-----\nbody = hello=world\n"));
    }

    #[test]
    fn rejected_body_keeps_the_rest_of_the_record() {
        let query = QueryParams::default();
        let headers = headers();
        let err = AppError::IncompleteBody {
            expected: 20,
            received: 5,
        };
        let report = RequestReport {
            raw_path: "/submit",
            path: "/submit",
            query: &query,
            headers: &headers,
            body: BodyLine::Rejected(&err),
        };

        let rendered = report.to_string();
        assert!(rendered.starts_with("path = /submit\n"));
        assert!(rendered.contains("user-agent: curl/8.4.0\r\n"));
        assert!(rendered.ends_with("-----\nbody = <unreadable: Body ended after 5 of 20 bytes>\n"));
    }

    #[test]
    fn sink_writes_whole_records() {
        let buffer = SharedBuffer::default();
        let sink = Sink::new(buffer.clone());
        let query = QueryParams::default();
        let headers = headers();
        let report = RequestReport {
            raw_path: "/",
            path: "/",
            query: &query,
            headers: &headers,
            body: BodyLine::Absent,
        };

        sink.emit(&report).unwrap();
        sink.emit(&report).unwrap();

        let contents = buffer.contents();
        assert_eq!(contents, report.to_string().repeat(2));
    }
}
