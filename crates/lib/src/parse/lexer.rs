//! Logical-line tokenizer for Python source.
//!
//! This is not a full Python lexer: it produces just enough structure to
//! locate and parse import statements without being fooled by strings,
//! comments, bracket continuation, or backslash continuation. String
//! literals (including raw/byte/format prefixes and triple quotes) are
//! consumed as opaque tokens; newlines inside brackets do not terminate
//! the logical line.

/// One lexed token with the physical line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
  /// Identifier or keyword (`import`, `from` and `as` are plain idents).
  Ident(String),
  Dot,
  Comma,
  Star,
  LParen,
  RParen,
  /// End of a statement via `;`.
  Semi,
  /// End of a logical line (suppressed inside brackets).
  Newline,
  /// Anything the import parser does not care about: strings, numbers,
  /// operators, remaining punctuation.
  Other,
}

/// Lexical error that makes the file unparseable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
  pub line: usize,
  pub message: String,
}

/// Tokenize `source` into a flat token stream.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
  let chars: Vec<char> = source.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;
  let mut line = 1usize;
  let mut depth = 0usize;

  while i < chars.len() {
    let c = chars[i];

    match c {
      ' ' | '\t' | '\r' => i += 1,
      '\n' => {
        if depth == 0 && tokens.last().map(|t: &Token| t.kind != TokenKind::Newline).unwrap_or(false) {
          tokens.push(Token {
            kind: TokenKind::Newline,
            line,
          });
        }
        line += 1;
        i += 1;
      }
      '\\' => {
        // Explicit line continuation; anything else after a backslash is
        // not import syntax.
        if matches!(chars.get(i + 1), Some('\n')) {
          line += 1;
          i += 2;
        } else if matches!(chars.get(i + 1), Some('\r')) && matches!(chars.get(i + 2), Some('\n')) {
          line += 1;
          i += 3;
        } else {
          tokens.push(Token {
            kind: TokenKind::Other,
            line,
          });
          i += 1;
        }
      }
      '#' => {
        while i < chars.len() && chars[i] != '\n' {
          i += 1;
        }
      }
      '\'' | '"' => {
        let start_line = line;
        i = consume_string(&chars, i, false, &mut line).ok_or_else(|| LexError {
          line: start_line,
          message: "unterminated string literal".to_string(),
        })?;
        tokens.push(Token {
          kind: TokenKind::Other,
          line: start_line,
        });
      }
      '.' => {
        tokens.push(Token { kind: TokenKind::Dot, line });
        i += 1;
      }
      ',' => {
        tokens.push(Token { kind: TokenKind::Comma, line });
        i += 1;
      }
      '*' => {
        tokens.push(Token { kind: TokenKind::Star, line });
        i += 1;
      }
      ';' => {
        tokens.push(Token { kind: TokenKind::Semi, line });
        i += 1;
      }
      '(' => {
        depth += 1;
        tokens.push(Token { kind: TokenKind::LParen, line });
        i += 1;
      }
      ')' => {
        if depth == 0 {
          return Err(LexError {
            line,
            message: "unmatched ')'".to_string(),
          });
        }
        depth -= 1;
        tokens.push(Token { kind: TokenKind::RParen, line });
        i += 1;
      }
      '[' | '{' => {
        depth += 1;
        tokens.push(Token { kind: TokenKind::Other, line });
        i += 1;
      }
      ']' | '}' => {
        if depth == 0 {
          return Err(LexError {
            line,
            message: format!("unmatched '{}'", c),
          });
        }
        depth -= 1;
        tokens.push(Token { kind: TokenKind::Other, line });
        i += 1;
      }
      c if c.is_ascii_digit() => {
        // Consume the whole numeric literal so its dots are not mistaken
        // for relative-import dots.
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
          i += 1;
        }
        tokens.push(Token {
          kind: TokenKind::Other,
          line,
        });
      }
      c if c.is_alphabetic() || c == '_' => {
        let start = i;
        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
          i += 1;
        }
        let ident: String = chars[start..i].iter().collect();

        // A short prefix like r, b, f, rb directly before a quote starts a
        // string literal, not an identifier.
        if matches!(chars.get(i), Some('\'') | Some('"')) && is_string_prefix(&ident) {
          let raw = ident.chars().any(|p| p == 'r' || p == 'R');
          let start_line = line;
          i = consume_string(&chars, i, raw, &mut line).ok_or_else(|| LexError {
            line: start_line,
            message: "unterminated string literal".to_string(),
          })?;
          tokens.push(Token {
            kind: TokenKind::Other,
            line: start_line,
          });
        } else {
          tokens.push(Token {
            kind: TokenKind::Ident(ident),
            line,
          });
        }
      }
      _ => {
        tokens.push(Token {
          kind: TokenKind::Other,
          line,
        });
        i += 1;
      }
    }
  }

  if depth > 0 {
    return Err(LexError {
      line,
      message: "unexpected end of file inside brackets".to_string(),
    });
  }

  Ok(tokens)
}

fn is_string_prefix(ident: &str) -> bool {
  ident.len() <= 2
    && ident
      .chars()
      .all(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F'))
}

/// Consume a string literal starting at the opening quote.
///
/// Returns the index one past the closing quote, or `None` when the
/// literal is unterminated. `line` is advanced for embedded newlines.
fn consume_string(chars: &[char], start: usize, raw: bool, line: &mut usize) -> Option<usize> {
  let quote = chars[start];
  let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
  let mut i = if triple { start + 3 } else { start + 1 };

  while i < chars.len() {
    let c = chars[i];
    if c == '\\' && !raw {
      if chars.get(i + 1) == Some(&'\n') {
        *line += 1;
      }
      i += 2;
      continue;
    }
    if c == '\\' && raw {
      // In raw strings a backslash still prevents the next quote from
      // closing the literal.
      i += 2;
      continue;
    }
    if c == '\n' {
      if !triple {
        return None;
      }
      *line += 1;
      i += 1;
      continue;
    }
    if c == quote {
      if !triple {
        return Some(i + 1);
      }
      if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
        return Some(i + 3);
      }
    }
    i += 1;
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;

  fn idents(tokens: &[Token]) -> Vec<String> {
    tokens
      .iter()
      .filter_map(|t| match &t.kind {
        TokenKind::Ident(s) => Some(s.clone()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn keywords_inside_strings_are_opaque() {
    let tokens = tokenize("x = \"import os\"\n").unwrap();
    assert_eq!(idents(&tokens), vec!["x"]);
  }

  #[test]
  fn keywords_inside_comments_are_opaque() {
    let tokens = tokenize("x = 1  # import os\nimport sys\n").unwrap();
    assert_eq!(idents(&tokens), vec!["x", "import", "sys"]);
  }

  #[test]
  fn triple_quoted_strings_span_lines() {
    let src = "doc = \"\"\"\nimport os\nfrom x import y\n\"\"\"\nimport json\n";
    let tokens = tokenize(src).unwrap();
    assert_eq!(idents(&tokens), vec!["doc", "import", "json"]);
    // The import after the docstring carries its real line number.
    let import_tok = tokens
      .iter()
      .find(|t| t.kind == TokenKind::Ident("import".to_string()))
      .unwrap();
    assert_eq!(import_tok.line, 5);
  }

  #[test]
  fn raw_string_backslash_does_not_escape_termination() {
    let tokens = tokenize("p = r\"C:\\path\\\\\"\nimport os\n").unwrap();
    assert_eq!(idents(&tokens), vec!["p", "import", "os"]);
  }

  #[test]
  fn newline_inside_brackets_does_not_end_the_line() {
    let tokens = tokenize("from m import (\n    a,\n    b,\n)\n").unwrap();
    let newlines = tokens.iter().filter(|t| t.kind == TokenKind::Newline).count();
    assert_eq!(newlines, 1);
  }

  #[test]
  fn backslash_continuation_joins_lines() {
    let tokens = tokenize("import \\\n    os\n").unwrap();
    assert_eq!(idents(&tokens), vec!["import", "os"]);
    let newlines = tokens.iter().filter(|t| t.kind == TokenKind::Newline).count();
    assert_eq!(newlines, 1);
  }

  #[test]
  fn unterminated_string_is_an_error() {
    let err = tokenize("x = \"oops\nimport os\n").unwrap_err();
    assert_eq!(err.line, 1);
  }

  #[test]
  fn unbalanced_bracket_is_an_error() {
    assert!(tokenize("from m import (a, b\n").is_err());
    assert!(tokenize("x = )\n").is_err());
  }

  #[test]
  fn numeric_dots_are_not_dot_tokens() {
    let tokens = tokenize("x = 1.5\n").unwrap();
    assert!(!tokens.iter().any(|t| t.kind == TokenKind::Dot));
  }
}
