//! Lexical analysis: turns the raw source text into a vector of tokens.
//!
//! Scanning is single-pass and greedy. Two-character operators are matched
//! before their one-character prefixes, so `..` never lexes as two dots and
//! `<=` never as `<` `=`. Whitespace separates tokens and is otherwise
//! discarded; the language has no comments.

use crate::error::{Diagnostic, LexError, SourcePos};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Number,
  Str,
  Ident,
  // keywords
  Loop,
  Check,
  Else,
  Choose,
  Default,
  Display,
  Give,
  In,
  // operators and punctuation
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Tilde,
  EqEq,
  BangEq,
  Lt,
  Le,
  Gt,
  Ge,
  Assign,
  Colon,
  Range,
  LBrace,
  RBrace,
  LParen,
  RParen,
  EndOfInput,
}

/// A single token with its source position (1-based line and column).
///
/// `Number` tokens keep their decimal digit string as the lexeme; `Str`
/// tokens keep the interior of the literal with the quotes stripped and the
/// two recognised escapes (`\"` and `\\`) decoded.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: u32,
  pub column: u32,
}

impl Token {
  pub fn pos(&self) -> SourcePos {
    SourcePos {
      line: self.line,
      column: self.column,
    }
  }
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: &Token) -> String {
  match token.kind {
    TokenKind::EndOfInput => "end of input".to_string(),
    TokenKind::Str => format!("\"{}\"", token.lexeme),
    _ => format!("'{}'", token.lexeme),
  }
}

/// Lex the source into a flat token vector terminated by `EndOfInput`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
  Scanner::new(source).run()
}

struct Scanner {
  chars: Vec<char>,
  pos: usize,
  line: u32,
  column: u32,
}

impl Scanner {
  fn new(source: &str) -> Self {
    Self {
      chars: source.chars().collect(),
      pos: 0,
      line: 1,
      column: 1,
    }
  }

  fn run(mut self) -> Result<Vec<Token>, Diagnostic> {
    let mut tokens = Vec::new();
    loop {
      self.skip_whitespace();
      let (line, column) = (self.line, self.column);
      let Some(ch) = self.peek() else {
        tokens.push(Token {
          kind: TokenKind::EndOfInput,
          lexeme: String::new(),
          line,
          column,
        });
        return Ok(tokens);
      };

      let token = if ch.is_ascii_alphabetic() || ch == '_' {
        self.scan_word(line, column)
      } else if ch.is_ascii_digit() {
        self.scan_number(line, column)
      } else if ch == '"' {
        self.scan_string(line, column)?
      } else {
        self.scan_operator(ch, line, column)?
      };
      tokens.push(token);
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_next(&self) -> Option<char> {
    self.chars.get(self.pos + 1).copied()
  }

  fn advance(&mut self) -> Option<char> {
    let ch = self.peek()?;
    self.pos += 1;
    if ch == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(ch)
  }

  fn skip_whitespace(&mut self) {
    while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
      self.advance();
    }
  }

  fn scan_word(&mut self, line: u32, column: u32) -> Token {
    let mut lexeme = String::new();
    while let Some(ch) = self.peek()
      && (ch.is_ascii_alphanumeric() || ch == '_')
    {
      lexeme.push(ch);
      self.advance();
    }
    let kind = match lexeme.as_str() {
      "loop" => TokenKind::Loop,
      "check" => TokenKind::Check,
      "else" => TokenKind::Else,
      "choose" => TokenKind::Choose,
      "default" => TokenKind::Default,
      "display" => TokenKind::Display,
      "give" => TokenKind::Give,
      "in" => TokenKind::In,
      _ => TokenKind::Ident,
    };
    Token {
      kind,
      lexeme,
      line,
      column,
    }
  }

  fn scan_number(&mut self, line: u32, column: u32) -> Token {
    let mut lexeme = String::new();
    while let Some(ch) = self.peek()
      && ch.is_ascii_digit()
    {
      lexeme.push(ch);
      self.advance();
    }
    Token {
      kind: TokenKind::Number,
      lexeme,
      line,
      column,
    }
  }

  fn scan_string(&mut self, line: u32, column: u32) -> Result<Token, Diagnostic> {
    let start = SourcePos { line, column };
    self.advance(); // opening quote
    let mut interior = String::new();
    loop {
      match self.peek() {
        None | Some('\n') => {
          return Err(Diagnostic::lex(LexError::UnterminatedString, start));
        }
        Some('"') => {
          self.advance();
          break;
        }
        Some('\\') => match self.peek_next() {
          Some(escaped @ ('"' | '\\')) => {
            interior.push(escaped);
            self.advance();
            self.advance();
          }
          // any other backslash is kept literally
          _ => {
            interior.push('\\');
            self.advance();
          }
        },
        Some(ch) => {
          interior.push(ch);
          self.advance();
        }
      }
    }
    Ok(Token {
      kind: TokenKind::Str,
      lexeme: interior,
      line,
      column,
    })
  }

  fn scan_operator(&mut self, ch: char, line: u32, column: u32) -> Result<Token, Diagnostic> {
    // two-character operators take precedence over their prefixes
    let two = match (ch, self.peek_next()) {
      ('=', Some('=')) => Some(TokenKind::EqEq),
      ('!', Some('=')) => Some(TokenKind::BangEq),
      ('<', Some('=')) => Some(TokenKind::Le),
      ('>', Some('=')) => Some(TokenKind::Ge),
      ('.', Some('.')) => Some(TokenKind::Range),
      _ => None,
    };
    if let Some(kind) = two {
      let mut lexeme = String::new();
      lexeme.push(self.advance().expect("first operator character"));
      lexeme.push(self.advance().expect("second operator character"));
      return Ok(Token {
        kind,
        lexeme,
        line,
        column,
      });
    }

    let kind = match ch {
      '+' => TokenKind::Plus,
      '-' => TokenKind::Minus,
      '*' => TokenKind::Star,
      '/' => TokenKind::Slash,
      '%' => TokenKind::Percent,
      '~' => TokenKind::Tilde,
      '<' => TokenKind::Lt,
      '>' => TokenKind::Gt,
      '=' => TokenKind::Assign,
      ':' => TokenKind::Colon,
      '{' => TokenKind::LBrace,
      '}' => TokenKind::RBrace,
      '(' => TokenKind::LParen,
      ')' => TokenKind::RParen,
      _ => {
        return Err(Diagnostic::lex(
          LexError::IllegalCharacter { ch },
          SourcePos { line, column },
        ));
      }
    };
    self.advance();
    Ok(Token {
      kind,
      lexeme: ch.to_string(),
      line,
      column,
    })
  }
}
