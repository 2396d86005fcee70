use crate::tags::{Node, TagParser, Token, TokenKind, TokenStream};
use crate::Result;

/// The `{% base_tag [type] %}` tag.
///
/// Emits a `<base>` element pointing at the site's base URL. The optional
/// type is matched case-insensitively against `xhtml`, anything else is
/// treated as `html`.
#[derive(Debug, Clone)]
pub struct BaseTag {
    base_url: String,
}

impl BaseTag {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl TagParser for BaseTag {
    fn tag(&self) -> &str {
        "base_tag"
    }

    fn parse(&self, _token: &Token, stream: &mut TokenStream<'_>) -> Result<Node> {
        let kind = match stream.next_if(TokenKind::Name, None)? {
            Some(token) => token.value.as_str().unwrap_or("html").to_owned(),
            None => String::from("html"),
        };
        stream.expect(TokenKind::BlockEnd, None)?;

        let xhtml = kind.eq_ignore_ascii_case("xhtml");
        Ok(Node::Text(base_tag(&self.base_url, xhtml)))
    }
}

/// Renders the `<base>` element for the given base URL.
///
/// The URL is normalized to end with exactly one `/`.
pub fn base_tag(base_url: &str, xhtml: bool) -> String {
    let base = base_url.trim_end_matches('/');
    if xhtml {
        format!(r#"<base href="{base}/" />"#)
    } else {
        format!(r#"<base href="{base}/">"#)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tag_normalizes_trailing_slash() {
        assert_eq!(base_tag("https://example.com", false), r#"<base href="https://example.com/">"#);
        assert_eq!(
            base_tag("https://example.com//", true),
            r#"<base href="https://example.com/" />"#
        );
        assert_eq!(base_tag("/", false), r#"<base href="/">"#);
    }

    #[test]
    fn parse_default_type() {
        let node = parse("{% base_tag %}").unwrap();
        assert_eq!(node, Node::Text(String::from(r#"<base href="/site/">"#)));
    }

    #[test]
    fn parse_xhtml_any_case() {
        for source in ["{% base_tag xhtml %}", "{% base_tag XHTML %}", "{% base_tag xHtMl %}"] {
            let node = parse(source).unwrap();
            assert_eq!(node, Node::Text(String::from(r#"<base href="/site/" />"#)));
        }
    }

    #[test]
    fn parse_unknown_type_is_html() {
        let node = parse("{% base_tag html5 %}").unwrap();
        assert_eq!(node, Node::Text(String::from(r#"<base href="/site/">"#)));
    }

    #[test]
    fn parse_missing_block_end() {
        let err = parse("{% base_tag xhtml 'extra' %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected end block, found string between bytes 18 and 25"
        );
    }

    fn parse(source: &str) -> Result<Node> {
        let mut stream = TokenStream::new(source);
        stream.next_raw()?;
        let token = stream.expect(TokenKind::Name, Some("base_tag"))?;
        BaseTag::new("/site").parse(&token, &mut stream)
    }
}
