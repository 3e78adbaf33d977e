use std::fmt::Display;
use std::time::Duration;

use headers::Header;
use http::header::{HeaderName, HeaderValue};
use regex::Regex;

lazy_static! {
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref TIMEOUT: HeaderName = HeaderName::from_static("timeout");
    static ref OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
    static ref DESTINATION: HeaderName = HeaderName::from_static("destination");
    static ref LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
    static ref IF: HeaderName = HeaderName::from_static("if");
    static ref CONTENT_LOCATION: HeaderName = HeaderName::from_static("content-location");
    static ref RE_IF_LIST: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
    static ref RE_STATE_TOKEN: Regex = Regex::new(r"<([^>]*)>").unwrap();
}

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(invalid)?;
    if values.next().is_some() {
        return Err(invalid());
    }
    Ok(v)
}

// helper
fn invalid() -> headers::Error {
    headers::Error::invalid()
}

// helper
fn map_invalid(_e: impl std::error::Error) -> headers::Error {
    headers::Error::invalid()
}

// helper, encode anything Display into one header value.
fn encode_display<E, T>(values: &mut E, t: T)
where
    E: Extend<HeaderValue>,
    T: Display,
{
    if let Ok(value) = HeaderValue::from_str(&t.to_string()) {
        values.extend(std::iter::once(value));
    }
}

/// Depth: header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        match value.as_bytes() {
            b"0" => Ok(Depth::Zero),
            b"1" => Ok(Depth::One),
            v if v.eq_ignore_ascii_case(b"infinity") => Ok(Depth::Infinity),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match *self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "Infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// One entry of a `Timeout:` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DavTimeout {
    Seconds(u32),
    Infinite,
}

/// Timeout: header, a list of preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeout(pub Vec<DavTimeout>);

impl Timeout {
    /// The first usable preference, limited to `max`, or `default`.
    pub fn duration(&self, default: Duration, max: Duration) -> Duration {
        match self.0.first() {
            Some(DavTimeout::Seconds(n)) => std::cmp::min(Duration::from_secs(*n as u64), max),
            Some(DavTimeout::Infinite) => max,
            None => default,
        }
    }
}

impl Header for Timeout {
    fn name() -> &'static HeaderName {
        &TIMEOUT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        let mut v = Vec::new();
        for word in value.to_str().map_err(map_invalid)?.split(',') {
            let word = word.trim();
            if word.eq_ignore_ascii_case("infinite") {
                v.push(DavTimeout::Infinite);
            } else if word.len() > 7 && word[..7].eq_ignore_ascii_case("second-") {
                let n = word[7..].parse::<u32>().map_err(map_invalid)?;
                v.push(DavTimeout::Seconds(n));
            } else {
                return Err(invalid());
            }
        }
        if v.is_empty() {
            return Err(invalid());
        }
        Ok(Timeout(v))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let words: Vec<String> = self
            .0
            .iter()
            .map(|t| match t {
                DavTimeout::Seconds(n) => format!("Second-{n}"),
                DavTimeout::Infinite => "Infinite".to_string(),
            })
            .collect();
        encode_display(values, words.join(", "));
    }
}

/// Destination: header, kept raw. The handler validates it against `Host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination(pub String);

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?.trim();
        if s.is_empty() {
            return Err(invalid());
        }
        Ok(Destination(s.to_string()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        encode_display(values, &self.0);
    }
}

/// Overwrite: header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Overwrite(pub bool);

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let line = one(values)?;
        match line.as_bytes() {
            b"F" | b"f" => Ok(Overwrite(false)),
            b"T" | b"t" => Ok(Overwrite(true)),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = if self.0 { "T" } else { "F" };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Lock-Token: header. The angle brackets are stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(pub String);

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?.trim();
        let token = s
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .ok_or_else(invalid)?;
        if token.is_empty() {
            return Err(invalid());
        }
        Ok(LockToken(token.to_string()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        encode_display(values, format!("<{}>", self.0));
    }
}

/// If: header, reduced to the state tokens it submits.
///
/// Resource tags (`<http://...>` outside of a list) and entity tags
/// (`[...]`) are not interpreted, a client proves it holds a lock by
/// naming the lock token anywhere in a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If(pub Vec<String>);

impl Header for If {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut tokens = Vec::new();
        for value in values {
            let s = value.to_str().map_err(map_invalid)?;
            for list in RE_IF_LIST.captures_iter(s) {
                for token in RE_STATE_TOKEN.captures_iter(&list[1]) {
                    tokens.push(token[1].trim().to_string());
                }
            }
        }
        if tokens.is_empty() {
            return Err(invalid());
        }
        Ok(If(tokens))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let lists: Vec<String> = self.0.iter().map(|t| format!("(<{t}>)")).collect();
        encode_display(values, lists.join(" "));
    }
}

/// Content-Location: header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLocation(pub String);

impl Header for ContentLocation {
    fn name() -> &'static HeaderName {
        &CONTENT_LOCATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        Ok(ContentLocation(
            one(values)?.to_str().map_err(map_invalid)?.to_string(),
        ))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        encode_display(values, &self.0);
    }
}
