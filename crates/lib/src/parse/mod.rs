//! Syntax-aware extraction of import declarations.
//!
//! Every logical line whose first token is `import` or `from` is parsed
//! into [`ImportDeclaration`]s, at any indentation, so imports nested in
//! functions or conditionals are found too. Statements are yielded in
//! source order. A malformed import statement or a lexical error makes the
//! whole file unparseable; callers skip the file and surface a warning.

mod lexer;

use std::path::Path;

use thiserror::Error;
use tracing::trace;

use crate::types::ImportDeclaration;
use lexer::{Token, TokenKind, tokenize};

/// Syntax error that prevents extraction from a file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
  pub line: usize,
  pub message: String,
}

/// Extract all import declarations from one file's text, in source order.
pub fn extract_imports(source: &str, declaring_file: &Path) -> Result<Vec<ImportDeclaration>, ParseError> {
  let tokens = tokenize(source).map_err(|e| ParseError {
    line: e.line,
    message: e.message,
  })?;

  let mut parser = Parser {
    tokens: &tokens,
    pos: 0,
    declaring_file,
  };
  let mut declarations = Vec::new();

  while parser.pos < tokens.len() {
    let keyword = match &tokens[parser.pos].kind {
      TokenKind::Ident(name) if name == "import" || name == "from" => name.clone(),
      _ => String::new(),
    };
    match keyword.as_str() {
      "import" => parser.parse_import(&mut declarations)?,
      "from" => parser.parse_from(&mut declarations)?,
      _ => parser.skip_statement(),
    }
  }

  trace!(file = %declaring_file.display(), count = declarations.len(), "extracted imports");
  Ok(declarations)
}

struct Parser<'a> {
  tokens: &'a [Token],
  pos: usize,
  declaring_file: &'a Path,
}

impl Parser<'_> {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<&Token> {
    let token = self.tokens.get(self.pos);
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn current_line(&self) -> usize {
    self
      .peek()
      .map(|t| t.line)
      .or_else(|| self.tokens.last().map(|t| t.line))
      .unwrap_or(1)
  }

  fn error(&self, message: impl Into<String>) -> ParseError {
    ParseError {
      line: self.current_line(),
      message: message.into(),
    }
  }

  /// Consume tokens up to and including the next statement boundary.
  fn skip_statement(&mut self) {
    while let Some(token) = self.next() {
      if matches!(token.kind, TokenKind::Newline | TokenKind::Semi) {
        break;
      }
    }
  }

  fn at_statement_end(&self) -> bool {
    match self.peek() {
      None => true,
      Some(t) => matches!(t.kind, TokenKind::Newline | TokenKind::Semi),
    }
  }

  fn expect_statement_end(&mut self) -> Result<(), ParseError> {
    if !self.at_statement_end() {
      return Err(self.error("unexpected token in import statement"));
    }
    self.next();
    Ok(())
  }

  /// Parse a dotted name: `ident (DOT ident)*`.
  fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
    let mut name = match self.next().map(|t| t.kind.clone()) {
      Some(TokenKind::Ident(s)) => s,
      _ => return Err(self.error("expected module name")),
    };

    while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
      self.next();
      match self.next().map(|t| t.kind.clone()) {
        Some(TokenKind::Ident(s)) => {
          name.push('.');
          name.push_str(&s);
        }
        _ => return Err(self.error("expected name after '.'")),
      }
    }

    Ok(name)
  }

  /// Consume an optional `as alias` clause; the alias itself is discarded.
  fn skip_alias(&mut self) -> Result<(), ParseError> {
    let has_alias = matches!(
      self.peek().map(|t| &t.kind),
      Some(TokenKind::Ident(name)) if name == "as"
    );
    if has_alias {
      self.next();
      match self.next().map(|t| t.kind.clone()) {
        Some(TokenKind::Ident(_)) => {}
        _ => return Err(self.error("expected alias after 'as'")),
      }
    }
    Ok(())
  }

  /// `import a.b.c as x, d`: one declaration per comma-separated module.
  fn parse_import(&mut self, out: &mut Vec<ImportDeclaration>) -> Result<(), ParseError> {
    let line = self.current_line();
    self.next(); // `import`

    loop {
      let module_path = self.parse_dotted_name()?;
      self.skip_alias()?;

      out.push(ImportDeclaration {
        module_path,
        imported_symbols: Vec::new(),
        relative_level: 0,
        declaring_file: self.declaring_file.to_path_buf(),
        line_number: line,
      });

      if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
        self.next();
      } else {
        break;
      }
    }

    self.expect_statement_end()
  }

  /// `from [dots][module] import target-list`.
  fn parse_from(&mut self, out: &mut Vec<ImportDeclaration>) -> Result<(), ParseError> {
    let line = self.current_line();
    self.next(); // `from`

    let mut relative_level = 0u32;
    while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
      self.next();
      relative_level += 1;
    }

    let has_module = match self.peek().map(|t| &t.kind) {
      Some(TokenKind::Ident(name)) => name != "import",
      _ => false,
    };
    let module_path = if has_module { self.parse_dotted_name()? } else { String::new() };

    if module_path.is_empty() && relative_level == 0 {
      return Err(self.error("expected module name after 'from'"));
    }

    match self.next().map(|t| t.kind.clone()) {
      Some(TokenKind::Ident(kw)) if kw == "import" => {}
      _ => return Err(self.error("expected 'import' in from-statement")),
    }

    let imported_symbols = self.parse_import_targets()?;

    out.push(ImportDeclaration {
      module_path,
      imported_symbols,
      relative_level,
      declaring_file: self.declaring_file.to_path_buf(),
      line_number: line,
    });

    self.expect_statement_end()
  }

  /// Target list of a from-import: `*`, a parenthesized list, or a bare
  /// comma-separated list. Aliased targets keep their source name.
  fn parse_import_targets(&mut self) -> Result<Vec<String>, ParseError> {
    if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Star)) {
      self.next();
      return Ok(vec!["*".to_string()]);
    }

    let parenthesized = matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen));
    if parenthesized {
      self.next();
    }

    let mut symbols = Vec::new();
    loop {
      match self.next().map(|t| t.kind.clone()) {
        Some(TokenKind::Ident(name)) => {
          symbols.push(name);
          self.skip_alias()?;
        }
        _ => return Err(self.error("expected imported name")),
      }

      if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
        self.next();
        // Trailing comma is allowed inside parentheses.
        if parenthesized && matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
          break;
        }
      } else {
        break;
      }
    }

    if parenthesized {
      match self.next().map(|t| t.kind.clone()) {
        Some(TokenKind::RParen) => {}
        _ => return Err(self.error("expected ')'")),
      }
    }

    Ok(symbols)
  }
}
