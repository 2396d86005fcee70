use crate::tags::{Invoke, Node, TagArg, TagParser, Token, TokenKind, TokenStream};
use crate::Result;

/// The `{% require method(arg, ...) %}` tag.
///
/// Parses into a call on the `requirements` service. Arguments must be
/// string or number literals.
#[derive(Debug, Clone, Default)]
pub struct RequireTag;

impl RequireTag {
    /// The service the tag invokes.
    pub const SERVICE: &'static str = "requirements";
}

impl TagParser for RequireTag {
    fn tag(&self) -> &str {
        "require"
    }

    fn parse(&self, token: &Token, stream: &mut TokenStream<'_>) -> Result<Node> {
        let method = stream.expect(TokenKind::Name, None)?;
        stream.expect(TokenKind::Punctuation, Some("("))?;
        let args = parse_args(stream)?;
        stream.expect(TokenKind::Punctuation, Some(")"))?;
        stream.expect(TokenKind::BlockEnd, None)?;

        Ok(Node::Invoke(Invoke {
            service: String::from(Self::SERVICE),
            method: method.value.as_str().unwrap_or_default().to_owned(),
            args,
            line: token.line,
        }))
    }
}

/// Collects literal arguments until the first non-literal token or a missing
/// comma. The terminating token is left in the stream.
fn parse_args(stream: &mut TokenStream<'_>) -> Result<Vec<TagArg>> {
    let mut args = Vec::new();
    loop {
        let token = stream.look()?;
        let is_string = match token.kind {
            TokenKind::String => true,
            TokenKind::Number => false,
            _ => break,
        };
        stream.next()?;
        args.push(TagArg {
            value: token.value,
            is_string,
        });

        if stream.next_if(TokenKind::Punctuation, Some(","))?.is_none() {
            break;
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn parse_string_args() {
        let node = parse(r#"{% require themedCSS("layout", 'screen') %}"#).unwrap();
        assert_eq!(
            node,
            Node::Invoke(Invoke {
                service: String::from("requirements"),
                method: String::from("themedCSS"),
                args: vec![TagArg::string("layout"), TagArg::string("screen")],
                line: 1,
            })
        );
    }

    #[test]
    fn parse_numeric_args() {
        let node = parse("{% require custom(1, 2.5) %}").unwrap();
        let Node::Invoke(invoke) = node else {
            panic!("expected invoke");
        };
        assert_eq!(
            invoke.args,
            [
                TagArg {
                    value: Value::Integer(1),
                    is_string: false
                },
                TagArg {
                    value: Value::Float(2.5),
                    is_string: false
                },
            ]
        );
    }

    #[test]
    fn parse_no_args() {
        let node = parse("{% require clear() %}").unwrap();
        let Node::Invoke(invoke) = node else {
            panic!("expected invoke");
        };
        assert_eq!(invoke.method, "clear");
        assert!(invoke.args.is_empty());
    }

    #[test]
    fn parse_trailing_comma() {
        let node = parse("{% require javascript('app.js',) %}").unwrap();
        let Node::Invoke(invoke) = node else {
            panic!("expected invoke");
        };
        assert_eq!(invoke.args, [TagArg::string("app.js")]);
    }

    #[test]
    fn parse_line_number() {
        let node = parse("\n\n{% require css('a.css') %}").unwrap();
        let Node::Invoke(invoke) = node else {
            panic!("expected invoke");
        };
        assert_eq!(invoke.line, 3);
    }

    #[test]
    fn parse_err_non_literal_arg() {
        let err = parse("{% require css(file) %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected punctuation `)`, found name `file` between bytes 15 and 19"
        );
    }

    #[test]
    fn parse_err_missing_comma() {
        let err = parse("{% require css('a.css' 'b.css') %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected punctuation `)`, found string between bytes 23 and 30"
        );
    }

    #[test]
    fn parse_err_missing_paren() {
        let err = parse("{% require css %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected punctuation `(`, found end block between bytes 15 and 17"
        );
    }

    #[test]
    fn parse_err_missing_method() {
        let err = parse("{% require ('a.css') %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected name, found punctuation `(` between bytes 11 and 12"
        );
    }

    fn parse(source: &str) -> Result<Node> {
        let mut stream = TokenStream::new(source);
        stream.next_raw()?;
        let token = stream.expect(TokenKind::Name, Some("require"))?;
        RequireTag.parse(&token, &mut stream)
    }
}
