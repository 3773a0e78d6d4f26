use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use url::Url;

/// Prefix of comments marking where merged content came from.
pub const FILENAME_PREFIX: &str = "From: ";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("Cannot express {0} as a file URL (path must be absolute)")]
    NotAbsolute(Utf8PathBuf),
}

/// Creates the `From: file:///...` marker for a source file.
///
/// XML comments may not contain `--`, so any double hyphen in the URL is
/// percent-encoded. The result is not XML-escaped.
pub fn create_path_comment(path: &Utf8Path) -> Result<String, ProvenanceError> {
    let url = Url::from_file_path(path)
        .map_err(|_| ProvenanceError::NotAbsolute(path.to_path_buf()))?;

    let mut url = url.to_string();
    if url.contains("--") {
        url = url.replace("--", "%2D%2D");
    }

    Ok(format!("{}{}", FILENAME_PREFIX, url))
}

/// Escapes text for use as XML character data.
pub fn escape_xml_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The full comment appended to copied XML files.
pub fn xml_comment(text: &str) -> String {
    format!("<!-- {} -->", escape_xml_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_path_comment() {
        let comment = create_path_comment(Utf8Path::new("/work/res/values/strings.xml")).unwrap();
        assert_eq!(comment, "From: file:///work/res/values/strings.xml");
    }

    #[test]
    fn test_path_comment_escapes_double_dash() {
        let comment = create_path_comment(Utf8Path::new("/work/my--lib/values.xml")).unwrap();
        assert_eq!(comment, "From: file:///work/my%2D%2Dlib/values.xml");
        assert!(!comment.contains("--"));
    }

    #[test]
    fn test_path_comment_escapes_long_dash_runs() {
        let comment = create_path_comment(Utf8Path::new("/a---b/----/c.xml")).unwrap();
        assert!(!comment.contains("--"));
    }

    #[test]
    fn test_path_comment_percent_encodes_spaces() {
        let comment = create_path_comment(Utf8Path::new("/my res/values.xml")).unwrap();
        assert_eq!(comment, "From: file:///my%20res/values.xml");
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = create_path_comment(Utf8Path::new("res/values.xml")).unwrap_err();
        assert_eq!(err, ProvenanceError::NotAbsolute(Utf8PathBuf::from("res/values.xml")));
    }

    #[test]
    fn test_xml_comment_escapes_markup() {
        assert_eq!(xml_comment("From: a&b<c>"), "<!-- From: a&amp;b&lt;c&gt; -->");
    }

    proptest! {
        #[test]
        fn prop_path_comment_never_contains_double_dash(
            segments in prop::collection::vec("[a-z-]{1,8}", 1..5)
        ) {
            let path = format!("/{}/values.xml", segments.join("/"));
            let comment = create_path_comment(Utf8Path::new(&path)).unwrap();
            prop_assert!(!comment.contains("--"));
            prop_assert!(comment.starts_with(FILENAME_PREFIX));
        }
    }
}
