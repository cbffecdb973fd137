//! Lenient URL splitting for site URLs and replace terms.
//!
//! Replace terms are often protocol-relative (`//example.com/blog`), which
//! strict URL parsers reject, so this keeps to plain string slicing.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UrlParts {
    /// `host[:port]` followed by path, query and fragment, with no scheme and
    /// no separators before query or fragment.
    pub fn without_scheme(&self) -> String {
        let mut out = String::new();
        if let Some(host) = &self.host {
            out.push_str(host);
        }
        if let Some(port) = &self.port {
            out.push(':');
            out.push_str(port);
        }
        for part in [&self.path, &self.query, &self.fragment].into_iter().flatten() {
            out.push_str(part);
        }
        out
    }

    /// The path as `/segment/`, or `/` when there is none.
    pub fn path_with_slashes(&self) -> String {
        let trimmed = self.path.as_deref().unwrap_or("").trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }
}

pub fn parse_url(url: &str) -> UrlParts {
    let url = url.trim();
    let mut parts = UrlParts::default();

    let (authority_follows, rest) = if let Some(rest) = url.strip_prefix("//") {
        (true, rest)
    } else if let Some(idx) = url.find("://").filter(|idx| is_scheme(&url[..*idx])) {
        parts.scheme = Some(url[..idx].to_string());
        (true, &url[idx + 3..])
    } else {
        (false, url)
    };

    let mut rest = rest;
    if authority_follows {
        let end = rest
            .find(|c: char| matches!(c, '/' | '?' | '#'))
            .unwrap_or(rest.len());
        let authority = &rest[..end];
        rest = &rest[end..];
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        match host_port.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                parts.host = Some(host.to_string());
                parts.port = Some(port.to_string());
            }
            _ if !host_port.is_empty() => parts.host = Some(host_port.to_string()),
            _ => {}
        }
    }

    if let Some((before, fragment)) = rest.split_once('#') {
        parts.fragment = Some(fragment.to_string()).filter(|f| !f.is_empty());
        rest = before;
    }
    if let Some((before, query)) = rest.split_once('?') {
        parts.query = Some(query.to_string()).filter(|q| !q.is_empty());
        rest = before;
    }
    if !rest.is_empty() {
        parts.path = Some(rest.to_string());
    }
    parts
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url() {
        let parts = parse_url("https://user:pw@example.com:8080/blog/?p=1#top");
        assert_eq!(parts.scheme.as_deref(), Some("https"));
        assert_eq!(parts.host.as_deref(), Some("example.com"));
        assert_eq!(parts.port.as_deref(), Some("8080"));
        assert_eq!(parts.path.as_deref(), Some("/blog/"));
        assert_eq!(parts.query.as_deref(), Some("p=1"));
        assert_eq!(parts.fragment.as_deref(), Some("top"));
        assert_eq!(parts.without_scheme(), "example.com:8080/blog/p=1top");
    }

    #[test]
    fn test_protocol_relative() {
        let parts = parse_url("//example.com/sub");
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.host.as_deref(), Some("example.com"));
        assert_eq!(parts.without_scheme(), "example.com/sub");
        assert_eq!(parts.path_with_slashes(), "/sub/");
    }

    #[test]
    fn test_bare_path() {
        let parts = parse_url("/var/www/html");
        assert_eq!(parts.host, None);
        assert_eq!(parts.path.as_deref(), Some("/var/www/html"));
        assert_eq!(parse_url("http://example.com").path_with_slashes(), "/");
    }
}
