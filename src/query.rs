use axum::{extract::Query, http::Uri};
use std::fmt::{self, Debug};

/// Query string parameters grouped by key.
///
/// Keys keep the order they first appear in, and every value is kept, so
/// `a=1&a=2&b=3` becomes `{"a": ["1", "2"], "b": ["3"]}`. Pairs with an empty
/// value (including bare keys without `=`) are dropped. Decoding is lossy:
/// invalid UTF-8 becomes U+FFFD and malformed `%` escapes are kept verbatim.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);

impl QueryParams {
    pub fn from_uri(uri: &Uri) -> Self {
        // string pairs never fail to deserialize
        Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| Self::from_pairs(pairs))
            .unwrap_or_default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            params.push(key, value);
        }
        params
    }

    fn push(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, values)| values.as_slice())
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(key, values)| (key, values)))
            .finish()
    }
}
