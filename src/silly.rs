use axum::http::HeaderMap;
use owo_colors::Style;

/// First hop of `X-Forwarded-For`, for when we sit behind a reverse proxy.
pub fn get_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub fn color_status_code(status_code: u16) -> Style {
    match status_code {
        100..=199 => Style::new().white(),
        200..=299 => Style::new().bright_green(),
        300..=399 => Style::new().yellow(),
        400..=499 => Style::new().bright_red(),
        500..=599 => Style::new().red(),
        _ => Style::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_ip(&headers), None);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(get_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(get_ip(&headers), None);
    }
}
