//! Structured form of a text graph configuration
//!
//! The configuration text is a protobuf text-format document. Only the parts
//! the pipeline needs are extracted: top-level `input_stream` and
//! `output_stream` declarations and each `node` block's calculator and
//! streams. Everything else (options, side packets, executors) is accepted
//! and skipped, but the document must still be lexically well formed.
//!
//! Stream references may carry a `TAG:` or `TAG:index:` prefix; only the
//! stream name after the last colon is kept.

use crate::error::{MediaGraphError, Result};

/// A calculator node declared in the graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphNode {
    pub calculator: String,
    pub input_streams: Vec<String>,
    pub output_streams: Vec<String>,
}

/// Parsed graph configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphConfig {
    pub input_streams: Vec<String>,
    pub output_streams: Vec<String>,
    pub nodes: Vec<GraphNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Colon,
    Open,
    Close,
}

struct Lexed {
    token: Token,
    line: usize,
}

fn parse_error(line: usize, message: impl Into<String>) -> MediaGraphError {
    MediaGraphError::ConfigParse {
        line,
        message: message.into(),
    }
}

fn tokenize(text: &str) -> Result<Vec<Lexed>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() || c == ',' || c == ';' => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ':' => {
                chars.next();
                tokens.push(Lexed { token: Token::Colon, line });
            }
            '{' | '<' => {
                chars.next();
                tokens.push(Lexed { token: Token::Open, line });
            }
            '}' | '>' => {
                chars.next();
                tokens.push(Lexed { token: Token::Close, line });
            }
            '"' | '\'' => {
                let quote = c;
                let start_line = line;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '\n' => return Err(parse_error(start_line, "unterminated string")),
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(parse_error(start_line, "unterminated string"));
                }
                tokens.push(Lexed {
                    token: Token::Str(value),
                    line: start_line,
                });
            }
            '[' => {
                // extension name, e.g. [mediapipe.FooOptions.ext]
                chars.next();
                let mut value = String::from("[");
                let mut closed = false;
                for c in chars.by_ref() {
                    value.push(c);
                    if c == ']' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(parse_error(line, "unterminated extension name"));
                }
                tokens.push(Lexed {
                    token: Token::Ident(value),
                    line,
                });
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '+' => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '+' {
                        value.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Lexed {
                    token: Token::Ident(value),
                    line,
                });
            }
            other => return Err(parse_error(line, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

/// Strip a `TAG:` / `TAG:index:` prefix from a stream reference
fn stream_name(reference: &str) -> String {
    reference
        .rsplit(':')
        .next()
        .unwrap_or(reference)
        .to_string()
}

struct Parser {
    tokens: Vec<Lexed>,
    pos: usize,
}

/// A field value: either a scalar or a nested message
enum Value {
    Scalar(String),
    Message(Vec<(String, Value)>),
}

impl Parser {
    fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(1)
    }

    fn peek(&self) -> Option<&Lexed> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Lexed> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    /// Parse fields until `Close` (nested) or end of input (top level)
    fn fields(&mut self, nested: bool, open_line: usize) -> Result<Vec<(String, Value)>> {
        let mut fields = Vec::new();
        loop {
            let Some((token, line)) = self.next().map(|t| (t.token.clone(), t.line)) else {
                if nested {
                    return Err(parse_error(open_line, "unclosed '{'"));
                }
                return Ok(fields);
            };
            let name = match token {
                Token::Ident(name) => name,
                Token::Close if nested => return Ok(fields),
                Token::Close => return Err(parse_error(line, "unexpected '}'")),
                other => return Err(parse_error(line, format!("expected field name, found {:?}", other))),
            };

            let has_colon = matches!(self.peek().map(|t| &t.token), Some(Token::Colon));
            if has_colon {
                self.pos += 1;
            }

            let next = self.next().map(|t| (t.token.clone(), t.line));
            let value = match next {
                Some((Token::Open, line)) => Value::Message(self.fields(true, line)?),
                Some((Token::Str(s), _)) if has_colon => Value::Scalar(s),
                Some((Token::Ident(s), _)) if has_colon => Value::Scalar(s),
                Some((_, line)) => {
                    return Err(parse_error(line, format!("missing value for field '{}'", name)))
                }
                None => {
                    return Err(parse_error(
                        self.last_line(),
                        format!("missing value for field '{}'", name),
                    ))
                }
            };
            fields.push((name, value));
        }
    }
}

impl GraphConfig {
    /// Parse configuration text
    ///
    /// Fails on lexical errors, unbalanced braces, or a document that
    /// declares neither streams nor nodes.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let fields = parser.fields(false, 1)?;

        let mut config = GraphConfig::default();
        for (name, value) in fields {
            match (name.as_str(), value) {
                ("input_stream", Value::Scalar(s)) => config.input_streams.push(stream_name(&s)),
                ("output_stream", Value::Scalar(s)) => config.output_streams.push(stream_name(&s)),
                ("node", Value::Message(node_fields)) => {
                    let mut node = GraphNode::default();
                    for (field, value) in node_fields {
                        match (field.as_str(), value) {
                            ("calculator", Value::Scalar(s)) => node.calculator = s,
                            ("input_stream", Value::Scalar(s)) => {
                                node.input_streams.push(stream_name(&s))
                            }
                            ("output_stream", Value::Scalar(s)) => {
                                node.output_streams.push(stream_name(&s))
                            }
                            _ => {}
                        }
                    }
                    if node.calculator.is_empty() {
                        return Err(parse_error(parser.last_line(), "node without calculator"));
                    }
                    config.nodes.push(node);
                }
                _ => {}
            }
        }

        if config.input_streams.is_empty() && config.output_streams.is_empty() && config.nodes.is_empty() {
            return Err(parse_error(1, "graph declares no streams or nodes"));
        }

        Ok(config)
    }

    /// Whether `stream` is produced anywhere in the graph
    pub fn has_output_stream(&self, stream: &str) -> bool {
        self.output_streams.iter().any(|s| s == stream)
            || self
                .nodes
                .iter()
                .any(|n| n.output_streams.iter().any(|s| s == stream))
    }

    /// Whether `stream` is a declared graph input
    pub fn has_input_stream(&self, stream: &str) -> bool {
        self.input_streams.iter().any(|s| s == stream)
    }

    /// All streams that can be observed, in declaration order, without duplicates
    pub fn observable_streams(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .output_streams
            .iter()
            .chain(self.nodes.iter().flat_map(|n| n.output_streams.iter()));
        for stream in all {
            if !out.contains(stream) {
                out.push(stream.clone());
            }
        }
        out
    }
}
