//! Tokeniser converting SPDX license expressions into typed tokens.

use std::fmt;

use crate::errors::LexError;

/// Kind of a lexical token in a license expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// The `AND` conjunction.
    And,
    /// The `OR` disjunction.
    Or,
    /// The `WITH` exception operator.
    With,
    /// The `+` "or later" suffix.
    Plus,
    /// An opening parenthesis.
    LParen,
    /// A closing parenthesis.
    RParen,
    /// A license or exception identifier such as `Apache-2.0`.
    Identifier,
}

impl TokenKind {
    /// Return the conventional upper-case name of the kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use peridot_expr::TokenKind;
    ///
    /// assert_eq!(TokenKind::LParen.as_str(), "LPAREN");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::With => "WITH",
            Self::Plus => "PLUS",
            Self::LParen => "LPAREN",
            Self::RParen => "RPAREN",
            Self::Identifier => "IDENTIFIER",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token together with its source text and byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// The matched source text, verbatim.
    pub text: String,
    /// Zero-based byte offset of the token in the expression.
    pub offset: usize,
}

impl Token {
    /// Create a token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Byte offset immediately after the token text.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.text)
    }
}

const KEYWORDS: [(&str, TokenKind); 3] = [
    ("AND", TokenKind::And),
    ("OR", TokenKind::Or),
    ("WITH", TokenKind::With),
];

/// Immutable tokeniser for license expressions.
///
/// Construct one explicitly and share it freely; it holds no mutable state.
///
/// # Examples
///
/// ```
/// use peridot_expr::{TokenKind, Tokenizer};
///
/// let tokens = Tokenizer::new().tokenize("MIT OR Zlib").unwrap_or_default();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, [TokenKind::Identifier, TokenKind::Or, TokenKind::Identifier]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    keywords: &'static [(&'static str, TokenKind)],
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a tokeniser recognising the SPDX `AND`, `OR` and `WITH` keywords.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keywords: &KEYWORDS,
        }
    }

    /// Split `expression` into tokens, skipping whitespace, escaped newlines
    /// and `#` comments.
    ///
    /// # Errors
    /// Returns [`LexError`] at the first character that starts no token.
    pub fn tokenize(&self, expression: &str) -> Result<Vec<Token>, LexError> {
        let bytes = expression.as_bytes();
        let mut tokens = Vec::new();
        let mut pos = 0;

        while let Some(&b) = bytes.get(pos) {
            match b {
                b' ' | b'\t' | b'\x0c' | b'\n' | b'\r' => pos += 1,
                b'#' => pos = skip_comment(bytes, pos),
                b'\\' if bytes.get(pos + 1) == Some(&b'\n') => pos += 2,
                b'+' => {
                    tokens.push(Token::new(TokenKind::Plus, "+", pos));
                    pos += 1;
                }
                b'(' => {
                    tokens.push(Token::new(TokenKind::LParen, "(", pos));
                    pos += 1;
                }
                b')' => {
                    tokens.push(Token::new(TokenKind::RParen, ")", pos));
                    pos += 1;
                }
                _ if is_identifier_byte(b) => {
                    let end = scan_identifier(bytes, pos);
                    let text = expression.get(pos..end).unwrap_or_default();
                    tokens.push(Token::new(self.classify(text), text, pos));
                    pos = end;
                }
                _ => {
                    let found = expression
                        .get(pos..)
                        .and_then(|rest| rest.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    return Err(LexError { offset: pos, found });
                }
            }
        }

        Ok(tokens)
    }

    fn classify(&self, word: &str) -> TokenKind {
        self.keywords
            .iter()
            .find(|(keyword, _)| *keyword == word)
            .map_or(TokenKind::Identifier, |(_, kind)| *kind)
    }
}

/// Tokenise `expression` with a default [`Tokenizer`].
///
/// # Errors
/// Returns [`LexError`] when the input contains an unrecognised character.
pub fn tokenize(expression: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new().tokenize(expression)
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.')
}

fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while bytes.get(end).copied().is_some_and(is_identifier_byte) {
        end += 1;
    }
    end
}

// Stops on the newline so it is skipped as ordinary whitespace.
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while bytes.get(end).is_some_and(|&b| b != b'\n') {
        end += 1;
    }
    end
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise lexing fallibility")]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<TokenKind> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenises_single_identifier() {
        let tokens = tokenize("Apache-2.0").unwrap();
        assert_eq!(tokens, vec![Token::new(TokenKind::Identifier, "Apache-2.0", 0)]);
    }

    #[test]
    fn tokenises_plus_suffix_with_offsets() {
        let tokens = tokenize("MPL-2.0+").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Identifier, "MPL-2.0", 0),
                Token::new(TokenKind::Plus, "+", 7),
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive_whole_words() {
        assert_eq!(
            kinds("ORder and ANDROID WITH"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::With,
            ]
        );
    }

    #[test]
    fn skips_comments_and_escaped_newlines() {
        let tokens = tokenize("MIT \\\nAND # trailing words ( +\r\n Zlib").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["MIT", "AND", "Zlib"]);
    }

    #[test]
    fn parentheses_need_no_surrounding_space() {
        assert_eq!(
            kinds("(MIT)OR(X11)"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Or,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("  \t# only a comment").unwrap().is_empty());
    }

    #[test]
    fn reports_unrecognised_character() {
        let err = tokenize("MIT / Zlib").unwrap_err();
        assert_eq!(err, LexError { offset: 4, found: '/' });
    }

    #[test]
    fn reports_lone_backslash() {
        let err = tokenize("MIT \\ AND").unwrap_err();
        assert_eq!(err.offset, 4);
        assert_eq!(err.found, '\\');
    }

    #[test]
    fn reports_non_ascii_character() {
        let err = tokenize("MIT AND Zlíb").unwrap_err();
        assert_eq!(err.offset, 10);
        assert_eq!(err.found, 'í');
    }
}
