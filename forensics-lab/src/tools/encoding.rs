//! URL and multipart encoding for backend requests

use rand::rngs::OsRng;
use rand::Rng;
use std::io::{Cursor, Read};

/// Percent-encode a string for use in a URL path segment or query value.
///
/// Only RFC 3986 unreserved characters pass through; everything else
/// (including `/`, `?`, `&` and space) is encoded per UTF-8 byte.
pub fn urlencoded(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(b as char);
            }
            _ => result.push_str(&format!("%{:02X}", b)),
        }
    }
    result
}

/// Decode a percent-encoded string. `+` is treated as a space.
pub fn urldecoded(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                result.push(hex_value(bytes[i + 1]) << 4 | hex_value(bytes[i + 2]));
                i += 3;
            }
            b'+' => {
                result.push(b' ');
                i += 1;
            }
            other => {
                result.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&result).to_string()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// Framing for a single-file `multipart/form-data` request body.
///
/// Only the part header and the closing boundary are held in memory; the
/// file contents are streamed between them by `reader`.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    head: Vec<u8>,
    tail: Vec<u8>,
}

impl MultipartBody {
    /// Frame a single file field.
    pub fn single_file(field: &str, filename: &str) -> Self {
        let boundary = generate_boundary();
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary,
            escape_quoted(field),
            escape_quoted(filename)
        )
        .into_bytes();
        let tail = format!("\r\n--{}--\r\n", boundary).into_bytes();

        Self {
            boundary,
            head,
            tail,
        }
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Total body length for file contents of `contents_len` bytes.
    pub fn content_length(&self, contents_len: u64) -> u64 {
        (self.head.len() + self.tail.len()) as u64 + contents_len
    }

    /// The full body: framing around `contents`.
    pub fn reader<'a, R: Read + 'a>(&'a self, contents: R) -> impl Read + 'a {
        Cursor::new(self.head.as_slice())
            .chain(contents)
            .chain(Cursor::new(self.tail.as_slice()))
    }
}

fn generate_boundary() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = OsRng;
    let suffix: String = (0..24)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("----forensics-lab-{}", suffix)
}

// Quotes and line breaks would terminate the header parameter early.
fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_unreserved_passthrough() {
        assert_eq!(urlencoded("abc-DEF_1.2~"), "abc-DEF_1.2~");
    }

    #[test]
    fn test_urlencoded_reserved() {
        assert_eq!(urlencoded("a/b c"), "a%2Fb%20c");
        assert_eq!(urlencoded("k=v&x?"), "k%3Dv%26x%3F");
        assert_eq!(urlencoded("é"), "%C3%A9");
    }

    #[test]
    fn test_urldecoded_roundtrip_unsafe_job_id() {
        let job_id = "case 7/image #2 (copy)";
        assert_eq!(urldecoded(&urlencoded(job_id)), job_id);
    }

    #[test]
    fn test_urldecoded_plus_and_malformed() {
        assert_eq!(urldecoded("a+b"), "a b");
        assert_eq!(urldecoded("100%"), "100%");
        assert_eq!(urldecoded("%zz"), "%zz");
    }

    fn body_bytes(body: &MultipartBody, contents: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        body.reader(contents).read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_urldecoded_requires_two_hex_digits() {
        assert_eq!(urldecoded("%+A"), "% A");
        assert_eq!(urldecoded("%-1x"), "%-1x");
        assert_eq!(urldecoded("%2f%2F"), "//");
    }

    #[test]
    fn test_multipart_single_file() {
        let body = MultipartBody::single_file("file", "evidence.img");
        let bytes = body_bytes(&body, b"\x00\x01raw");

        let mut expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"evidence.img\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = body.boundary()
        )
        .into_bytes();
        expected.extend_from_slice(b"\x00\x01raw");
        expected.extend_from_slice(format!("\r\n--{}--\r\n", body.boundary()).as_bytes());

        assert!(body.content_type().ends_with(body.boundary()));
        assert_eq!(bytes, expected);
        assert_eq!(body.content_length(5), bytes.len() as u64);
    }

    #[test]
    fn test_multipart_streams_from_reader() {
        let contents: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let body = MultipartBody::single_file("file", "mem.raw");

        let mut streamed = Vec::new();
        body.reader(Cursor::new(contents.clone()))
            .read_to_end(&mut streamed)
            .unwrap();
        assert_eq!(streamed, body_bytes(&body, &contents[..]));
        assert_eq!(body.content_length(contents.len() as u64), streamed.len() as u64);
    }

    #[test]
    fn test_multipart_boundaries_differ() {
        let a = MultipartBody::single_file("file", "a");
        let b = MultipartBody::single_file("file", "a");
        assert_ne!(a.boundary(), b.boundary());
    }

    #[test]
    fn test_multipart_escapes_filename() {
        let body = MultipartBody::single_file("file", "evil\"\r\nname");
        let text = String::from_utf8_lossy(&body_bytes(&body, b"x")).to_string();
        assert!(text.contains("filename=\"evil%22%0D%0Aname\""));
    }
}
