use axum::http::Method;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported method ('{0}')")]
pub struct UnsupportedMethod(pub String);

/// The methods the inspector answers. Anything else falls through to 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub fn greeting(self) -> &'static str {
        match self {
            Verb::Get => "Hello from do_GET",
            Verb::Post => "Hello from do_POST",
        }
    }
}

impl From<Verb> for &'static str {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

impl<'a> TryFrom<&'a Method> for Verb {
    type Error = UnsupportedMethod;

    fn try_from(method: &'a Method) -> Result<Self, Self::Error> {
        match method {
            &Method::GET => Ok(Self::Get),
            &Method::POST => Ok(Self::Post),
            _ => Err(UnsupportedMethod(method.as_str().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_get_and_post() {
        assert_eq!(Verb::try_from(&Method::GET), Ok(Verb::Get));
        assert_eq!(Verb::try_from(&Method::POST), Ok(Verb::Post));
        assert_eq!(<&str>::from(Verb::Post), "POST");
    }

    #[test]
    fn everything_else_is_unsupported() {
        for method in [Method::DELETE, Method::HEAD, Method::PUT, Method::OPTIONS] {
            let err = Verb::try_from(&method).unwrap_err();
            assert_eq!(err.0, method.as_str());
        }
        let custom = Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(
            Verb::try_from(&custom).unwrap_err().to_string(),
            "Unsupported method ('PURGE')"
        );
    }
}
