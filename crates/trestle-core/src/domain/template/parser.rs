//! Template lexer and parser.
//!
//! The lexer splits the source into text and tag segments; the parser folds
//! the segment stream into a node tree. Block tags (`{% %}`) and comments
//! (`{# #}`) that stand alone on a line swallow that line, including its
//! newline, so control flow does not leave blank lines behind.

use super::filters::Helper;
use super::TemplateError;
use crate::domain::expression::Expression;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Variable(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Substitute {
        line: usize,
        value: Operand,
        helpers: Vec<Helper>,
    },
    If {
        line: usize,
        branches: Vec<(Expression, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    For {
        line: usize,
        binding: String,
        iterable: String,
        body: Vec<Node>,
    },
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Output,
    Block,
    Comment,
}

#[derive(Debug)]
enum Segment<'a> {
    Text(&'a str),
    Tag {
        kind: TagKind,
        inner: &'a str,
        line: usize,
    },
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

fn lex(source: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut search = 0;
    // Line of `counted`; advanced incrementally so lexing stays linear.
    let mut line = 1;
    let mut counted = 0;

    while let Some(rel) = source[search..].find('{') {
        let start = search + rel;
        let (kind, close) = match source.as_bytes().get(start + 1) {
            Some(b'{') => (TagKind::Output, "}}"),
            Some(b'%') => (TagKind::Block, "%}"),
            Some(b'#') => (TagKind::Comment, "#}"),
            _ => {
                search = start + 1;
                continue;
            }
        };

        line += source[counted..start].matches('\n').count();
        counted = start;
        let inner_start = start + 2;
        let Some(close_rel) = source[inner_start..].find(close) else {
            return Err(TemplateError::Syntax {
                line,
                message: format!("unclosed tag, expected '{close}'"),
            });
        };
        let inner_end = inner_start + close_rel;
        let end = inner_end + 2;

        let (text_end, resume) = if kind == TagKind::Output {
            (start, end)
        } else {
            let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
            let line_end = source[end..].find('\n').map(|i| end + i);
            let rest = &source[end..line_end.unwrap_or(source.len())];
            if line_start >= cursor && is_blank(&source[line_start..start]) && is_blank(rest) {
                (line_start, line_end.map_or(source.len(), |i| i + 1))
            } else {
                (start, end)
            }
        };

        if text_end > cursor {
            segments.push(Segment::Text(&source[cursor..text_end]));
        }
        segments.push(Segment::Tag {
            kind,
            inner: &source[inner_start..inner_end],
            line,
        });
        cursor = resume;
        search = resume;
    }

    if cursor < source.len() {
        segments.push(Segment::Text(&source[cursor..]));
    }
    Ok(segments)
}

// ============================================================================
// Parser
// ============================================================================

/// Block keyword that ended a nested node list.
enum Terminator<'a> {
    Elif(&'a str, usize),
    Else(usize),
    EndIf(usize),
    EndFor(usize),
}

impl Terminator<'_> {
    fn describe(&self) -> (&'static str, usize) {
        match self {
            Self::Elif(_, line) => ("elif", *line),
            Self::Else(line) => ("else", *line),
            Self::EndIf(line) => ("endif", *line),
            Self::EndFor(line) => ("endfor", *line),
        }
    }
}

type Stream<'a> = std::vec::IntoIter<Segment<'a>>;

pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut stream = lex(source)?.into_iter();
    let (nodes, terminator) = parse_until(&mut stream)?;
    match terminator {
        None => Ok(nodes),
        Some(t) => {
            let (keyword, line) = t.describe();
            Err(TemplateError::Syntax {
                line,
                message: format!("'{keyword}' without a matching opening block"),
            })
        }
    }
}

fn parse_until<'a>(
    stream: &mut Stream<'a>,
) -> Result<(Vec<Node>, Option<Terminator<'a>>), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(segment) = stream.next() {
        let (kind, inner, line) = match segment {
            Segment::Text(text) => {
                nodes.push(Node::Text(text.to_string()));
                continue;
            }
            Segment::Tag { kind, inner, line } => (kind, inner, line),
        };

        match kind {
            TagKind::Comment => {}
            TagKind::Output => nodes.push(parse_output(inner, line)?),
            TagKind::Block => {
                let body = inner.trim();
                let (keyword, rest) = body
                    .split_once(char::is_whitespace)
                    .map_or((body, ""), |(k, r)| (k, r.trim()));
                match keyword {
                    "if" => nodes.push(parse_if(stream, rest, line)?),
                    "for" => nodes.push(parse_for(stream, rest, line)?),
                    "elif" => return Ok((nodes, Some(Terminator::Elif(rest, line)))),
                    "else" => return Ok((nodes, Some(Terminator::Else(line)))),
                    "endif" => return Ok((nodes, Some(Terminator::EndIf(line)))),
                    "endfor" => return Ok((nodes, Some(Terminator::EndFor(line)))),
                    other => {
                        return Err(TemplateError::Syntax {
                            line,
                            message: format!("unknown block tag '{other}'"),
                        });
                    }
                }
            }
        }
    }

    Ok((nodes, None))
}

fn parse_condition(source: &str, line: usize) -> Result<Expression, TemplateError> {
    if source.is_empty() {
        return Err(TemplateError::Syntax {
            line,
            message: "missing condition".into(),
        });
    }
    Expression::parse(source).map_err(|source| TemplateError::Expression { line, source })
}

fn parse_if(stream: &mut Stream<'_>, condition: &str, line: usize) -> Result<Node, TemplateError> {
    let mut branches = Vec::new();
    let mut condition = parse_condition(condition, line)?;

    loop {
        let (body, terminator) = parse_until(stream)?;
        match terminator {
            Some(Terminator::Elif(next, elif_line)) => {
                branches.push((condition, body));
                condition = parse_condition(next, elif_line)?;
            }
            Some(Terminator::Else(_)) => {
                branches.push((condition, body));
                let (otherwise, end) = parse_until(stream)?;
                return match end {
                    Some(Terminator::EndIf(_)) => Ok(Node::If {
                        line,
                        branches,
                        otherwise,
                    }),
                    _ => Err(unclosed("if", line)),
                };
            }
            Some(Terminator::EndIf(_)) => {
                branches.push((condition, body));
                return Ok(Node::If {
                    line,
                    branches,
                    otherwise: Vec::new(),
                });
            }
            _ => return Err(unclosed("if", line)),
        }
    }
}

fn parse_for(stream: &mut Stream<'_>, header: &str, line: usize) -> Result<Node, TemplateError> {
    let parts: Vec<&str> = header.split_whitespace().collect();
    let [binding, "in", iterable] = parts.as_slice() else {
        return Err(TemplateError::Syntax {
            line,
            message: format!("expected 'for <name> in <list>', found 'for {header}'"),
        });
    };
    for name in [binding, iterable] {
        if !is_identifier(name) {
            return Err(TemplateError::Syntax {
                line,
                message: format!("'{name}' is not a valid variable name"),
            });
        }
    }

    let (body, terminator) = parse_until(stream)?;
    match terminator {
        Some(Terminator::EndFor(_)) => Ok(Node::For {
            line,
            binding: (*binding).to_string(),
            iterable: (*iterable).to_string(),
            body,
        }),
        _ => Err(unclosed("for", line)),
    }
}

fn unclosed(block: &str, line: usize) -> TemplateError {
    TemplateError::Syntax {
        line,
        message: format!("'{block}' block is not closed"),
    }
}

fn parse_output(inner: &str, line: usize) -> Result<Node, TemplateError> {
    let mut pieces = split_pipes(inner).into_iter().map(str::trim);
    let head = pieces.next().unwrap_or_default();

    let value = if let Some(text) = quoted(head) {
        Operand::Literal(text.to_string())
    } else if is_identifier(head) {
        Operand::Variable(head.to_string())
    } else {
        return Err(TemplateError::Syntax {
            line,
            message: format!("expected a variable name or string literal, found '{head}'"),
        });
    };

    let helpers = pieces
        .map(|name| {
            Helper::from_name(name).ok_or_else(|| TemplateError::UnknownHelper {
                line,
                name: name.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node::Substitute {
        line,
        value,
        helpers,
    })
}

/// Split on `|` outside of quoted literals.
fn split_pipes(inner: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, '|') => {
                pieces.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&inner[start..]);
    pieces
}

fn quoted(s: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|q| s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
