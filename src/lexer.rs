use std::{iter::Peekable, rc::Rc};

use crate::{
    report::ErrorReporter,
    token::{Position, Token, TokenKind, KEYWORDS},
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Interpolations may nest up to this many levels.
pub const MAX_INTERPOLATION_DEPTH: usize = 6;

/// Scans the provided source, producing the tokens into the provided buffer.
///
/// The buffer always ends with an [`TokenKind::Eof`] token.
pub fn scan_into(src: &str, file: Rc<str>, reporter: &dyn ErrorReporter, tokens: &mut Vec<Token>) {
    Scanner::new(src, file, reporter, tokens).scan();
}

/// A convenience function that allocates a new buffer per scanned input and
/// returns it.
pub fn scan(src: &str, file: Rc<str>, reporter: &dyn ErrorReporter) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() / 2 + 16));
    scan_into(src, file, reporter, &mut tokens);
    tokens
}

/// The Phase scanner
struct Scanner<'src, 'tok, 'r> {
    src: &'src str,
    file: Rc<str>,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    interpolation_depth: usize,
    tokens: &'tok mut Vec<Token>,
    reporter: &'r dyn ErrorReporter,
}

impl Scanner<'_, '_, '_> {
    /// Scans the source string until the input is exhausted.
    fn scan(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        while !self.is_at_end() {
            self.scan_token();
        }
        self.current_lo = self.cursor;
        self.produce(TokenKind::Eof);
        tracing::debug!(file = %self.file, tokens = self.tokens.len(), "scanned");
    }

    /// Scans the current character, producing zero or more tokens.
    fn scan_token(&mut self) {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '@' => At,
            '#' => Hash,
            '$' => Dollar,
            '(' => LeftParen,
            ')' => RightParen,
            '{' => LeftBrace,
            '}' => RightBrace,
            '[' => LeftBracket,
            ']' => RightBracket,
            ',' => Comma,
            ';' => Semicolon,
            '*' => Star,
            '?' => Question,
            '.' => match (self.peek(), self.peek_nth(1)) {
                ('.', '.') => {
                    self.advance();
                    self.advance_with(Range)
                }
                _ => Dot,
            },
            '-' => match self.peek() {
                '-' => self.advance_with(MinusMinus),
                '>' => self.advance_with(Arrow),
                _ => Minus,
            },
            '+' => match (self.peek(), self.peek_nth(1)) {
                ('+', '+') => {
                    self.advance();
                    self.advance_with(Concat)
                }
                ('+', _) => self.advance_with(PlusPlus),
                ('=', _) => self.advance_with(PlusEqual),
                _ => Plus,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AndAnd),
                _ => Amp,
            },
            '|' => match self.peek() {
                '|' => self.advance_with(OrOr),
                '>' => self.advance_with(Pipe),
                _ => Bar,
            },
            ':' => match self.peek() {
                ':' => self.advance_with(ColonColon),
                _ => Colon,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(BangEqual),
                _ => Bang,
            },
            '=' => match self.peek() {
                '=' => self.advance_with(EqualEqual),
                _ => Equal,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEqual),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEqual),
                _ => Greater,
            },
            '/' => match self.peek() {
                '/' => return self.inline_comment(),
                _ => Slash,
            },
            ' ' | '\r' | '\t' => return,
            '\n' => {
                self.produce(Newline);
                return self.blank_lines();
            }
            quote @ ('"' | '\'') => return self.string(quote),
            c if c.is_ascii_digit() => self.number(),
            c if is_identifier_start(c) => return self.identifier_or_keyword(),
            c => {
                let message = format!("Unexpected character: {c}");
                self.report(&message);
                return;
            }
        };
        self.produce(kind);
    }

    /// Scans a string delimited by `quote`. The opening quote (or, when
    /// resuming after an interpolation, the closing `}`) is already consumed.
    fn string(&mut self, quote: char) {
        let src = self.src;
        let mut content_lo = self.cursor;
        loop {
            if self.is_at_end() {
                self.report("Unterminated string");
                return;
            }
            match self.peek() {
                '\\' => {
                    self.advance();
                    self.advance();
                }
                '$' if self.peek_nth(1) == '{' => {
                    let literal = &src[content_lo..self.cursor];
                    self.advance();
                    self.advance();
                    self.produce_literal(TokenKind::Interpolation, literal);
                    if !self.interpolation() {
                        self.report("Unterminated string");
                        return;
                    }
                    // The closing brace belongs to the next string fragment.
                    self.mark_advance();
                    content_lo = self.cursor;
                }
                c if c == quote => {
                    let literal = &src[content_lo..self.cursor];
                    self.advance();
                    self.produce_literal(TokenKind::String, literal);
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Scans the tokens of an embedded `${...}` expression, stopping (without
    /// consuming) at its matching `}`. Returns false if the input ended first.
    fn interpolation(&mut self) -> bool {
        self.interpolation_depth += 1;
        if self.interpolation_depth > MAX_INTERPOLATION_DEPTH {
            let message =
                format!("Interpolation too deep: only {MAX_INTERPOLATION_DEPTH} levels allowed");
            self.report(&message);
        }

        let mut braces = 0_usize;
        let closed = loop {
            if self.is_at_end() {
                break false;
            }
            if braces == 0 && self.peek() == '}' {
                break true;
            }
            let produced = self.tokens.len();
            self.scan_token();
            for token in &self.tokens[produced..] {
                match token.kind {
                    TokenKind::LeftBrace => braces += 1,
                    TokenKind::RightBrace => braces = braces.saturating_sub(1),
                    _ => (),
                }
            }
        };

        self.interpolation_depth -= 1;
        closed
    }

    fn identifier_or_keyword(&mut self) {
        while is_identifier_suffix(self.peek()) {
            self.advance();
        }
        let next = self.peek();
        let substr = self.substr();
        let kind = if substr.starts_with(|c: char| c.is_ascii_uppercase()) {
            TokenKind::TypeIdentifier
        } else if let Some(keyword) = KEYWORDS.get(substr).copied() {
            keyword
        } else if matches!(next, '"' | '\'') {
            TokenKind::TemplateTag
        } else {
            TokenKind::Identifier
        };
        self.produce(kind);
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_nth(1).is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        TokenKind::Number
    }

    fn inline_comment(&mut self) {
        while !matches!(self.peek(), '\n' | '\0') {
            self.advance();
        }
    }

    /// Swallows blank and comment-only lines following a newline, so a run of
    /// them yields a single [`TokenKind::Newline`].
    fn blank_lines(&mut self) {
        loop {
            match (self.peek(), self.peek_nth(1)) {
                ('\n' | ' ' | '\r' | '\t', _) => {
                    self.advance();
                }
                ('/', '/') => self.inline_comment(),
                _ => break,
            }
        }
    }
}

impl Scanner<'_, '_, '_> {
    /// Constructs a new scanner with the default state.
    fn new<'src, 'tok, 'r>(
        src: &'src str,
        file: Rc<str>,
        reporter: &'r dyn ErrorReporter,
        tokens: &'tok mut Vec<Token>,
    ) -> Scanner<'src, 'tok, 'r> {
        Scanner {
            src,
            file,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            interpolation_depth: 0,
            tokens,
            reporter,
        }
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.src.len()
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next char and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the char `n` positions after the next one, without advancing.
    fn peek_nth(&self, n: usize) -> char {
        self.src[self.cursor..].chars().nth(n).unwrap_or('\0')
    }

    /// Returns the current marked position.
    fn pos(&self) -> Position {
        Position::new(self.current_lo, self.cursor, Rc::clone(&self.file))
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        &self.src[self.current_lo..self.cursor]
    }

    fn report(&self, message: &str) {
        self.reporter.report(&self.pos(), message);
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let literal = (kind == TokenKind::Number).then(|| self.substr());
        let token = Token::new(kind, self.substr(), literal, self.pos());
        self.tokens.push(token);
    }

    /// Produces a token using the marked bounds and the given payload.
    fn produce_literal(&mut self, kind: TokenKind, literal: &str) {
        let token = Token::new(kind, self.substr(), Some(literal), self.pos());
        self.tokens.push(token);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_suffix(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use pretty_assertions::assert_eq;

    fn scan_str(src: &str) -> (Vec<Token>, Vec<String>) {
        let reporter = CollectingReporter::new();
        let tokens = scan(src, "test.phs".into(), &reporter);
        (tokens, reporter.messages())
    }

    fn kinds_and_lexemes(src: &str) -> Vec<(TokenKind, String)> {
        let (tokens, errors) = scan_str(src);
        assert_eq!(errors, Vec::<String>::new());
        tokens
            .into_iter()
            .map(|t| (t.kind, t.lexeme.into_string()))
            .collect()
    }

    #[test]
    fn tests_with_lexeme() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+ ++ += +++ - -- -> ... . :: :" => [
                (Plus, "+"),
                (PlusPlus, "++"),
                (PlusEqual, "+="),
                (Concat, "+++"),
                (Minus, "-"),
                (MinusMinus, "--"),
                (Arrow, "->"),
                (Range, "..."),
                (Dot, "."),
                (ColonColon, "::"),
                (Colon, ":"),
                (Eof, ""),
            ],
            "| || |> & && ! != = == < <= > >= ? $ @ #" => [
                (Bar, "|"),
                (OrOr, "||"),
                (Pipe, "|>"),
                (Amp, "&"),
                (AndAnd, "&&"),
                (Bang, "!"),
                (BangEqual, "!="),
                (Equal, "="),
                (EqualEqual, "=="),
                (Less, "<"),
                (LessEqual, "<="),
                (Greater, ">"),
                (GreaterEqual, ">="),
                (Question, "?"),
                (Dollar, "$"),
                (At, "@"),
                (Hash, "#"),
                (Eof, ""),
            ],
            "foo Foo class _bar if Match" => [
                (Identifier, "foo"),
                (TypeIdentifier, "Foo"),
                (Class, "class"),
                (Identifier, "_bar"),
                (If, "if"),
                (TypeIdentifier, "Match"),
                (Eof, ""),
            ],
            "tag\"x\" if'y'" => [
                (TemplateTag, "tag"),
                (String, "\"x\""),
                (If, "if"),
                (String, "'y'"),
                (Eof, ""),
            ],
            "3.14 10 1...5 2." => [
                (Number, "3.14"),
                (Number, "10"),
                (Number, "1"),
                (Range, "..."),
                (Number, "5"),
                (Number, "2"),
                (Dot, "."),
                (Eof, ""),
            ],
            "a\n\n  \n// comment\n\tb // trailing" => [
                (Identifier, "a"),
                (Newline, "\n"),
                (Identifier, "b"),
                (Eof, ""),
            ],
        });

        for (input, tokens) in cases {
            assert_eq!(kinds_and_lexemes(input), *tokens, "input: {input:?}");
        }
    }

    #[test]
    fn test_positions() {
        let (tokens, _) = scan_str("var x\n");
        let spans: Vec<_> = tokens.iter().map(|t| (t.pos.start, t.pos.end)).collect();
        assert_eq!(spans, [(0, 3), (4, 5), (5, 6), (6, 6)]);
        assert_eq!(&*tokens[0].pos.file, "test.phs");
    }

    #[test]
    fn test_multibyte_content() {
        let (tokens, errors) = scan_str("\"héllo\" x");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal.as_deref(), Some("héllo"));
        assert_eq!((tokens[1].pos.start, tokens[1].pos.end), (9, 10));
    }

    #[test]
    fn test_string_literals() {
        let (tokens, errors) = scan_str(r#""a\"b" 'it''s'"#);
        assert!(errors.is_empty());
        let literals: Vec<_> = tokens.iter().map(|t| t.literal.as_deref()).collect();
        assert_eq!(literals, [Some(r#"a\"b"#), Some("it"), Some("s"), None]);
    }

    #[test]
    fn test_interpolation() {
        use TokenKind::*;
        let (tokens, errors) = scan_str(r#""a${1+1}b""#);
        assert!(errors.is_empty());
        let actual: Vec<_> = tokens
            .iter()
            .map(|t| (t.kind, &*t.lexeme, t.literal.as_deref()))
            .collect();
        assert_eq!(
            actual,
            [
                (Interpolation, r#""a${"#, Some("a")),
                (Number, "1", Some("1")),
                (Plus, "+", None),
                (Number, "1", Some("1")),
                (String, r#"}b""#, Some("b")),
                (Eof, "", None),
            ]
        );
    }

    #[test]
    fn test_interpolation_with_braces_and_nested_strings() {
        use TokenKind::*;
        let (tokens, errors) = scan_str(r#""x${ f({ it }) + "${y}" }z""#);
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                Interpolation,
                Identifier,
                LeftParen,
                LeftBrace,
                Identifier,
                RightBrace,
                RightParen,
                Plus,
                Interpolation,
                Identifier,
                String,
                String,
                Eof,
            ]
        );
        assert_eq!(tokens[10].literal.as_deref(), Some(""));
        assert_eq!(tokens[11].literal.as_deref(), Some("z"));
    }

    fn nested_interpolation(levels: usize) -> std::string::String {
        if levels == 0 {
            "1".to_owned()
        } else {
            format!("\"${{{}}}\"", nested_interpolation(levels - 1))
        }
    }

    #[test]
    fn test_interpolation_depth_limit() {
        let (_, errors) = scan_str(&nested_interpolation(MAX_INTERPOLATION_DEPTH));
        assert!(errors.is_empty(), "{errors:?}");

        let (tokens, errors) = scan_str(&nested_interpolation(MAX_INTERPOLATION_DEPTH + 1));
        assert_eq!(errors, ["Interpolation too deep: only 6 levels allowed"]);
        assert!(tokens.last().is_some_and(Token::is_eof));
    }

    #[test]
    fn test_errors_do_not_abort() {
        let (tokens, errors) = scan_str("a ~ b");
        assert_eq!(errors, ["Unexpected character: ~"]);
        let lexemes: Vec<_> = tokens.iter().map(|t| &*t.lexeme).collect();
        assert_eq!(lexemes, ["a", "b", ""]);

        let (tokens, errors) = scan_str("\"abc");
        assert_eq!(errors, ["Unterminated string"]);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eof());

        let (_, errors) = scan_str("\"a${b");
        assert_eq!(errors, ["Unterminated string"]);
    }

    #[test]
    fn test_lexemes_reproduce_input() {
        let src = indoc::indoc! {r#"
            namespace App {
              class Point {
                new(this.x: Int, this.y: Int) {}
                sum(): Int { x + y }
              }
              var label = "p=${Point(1, 2).sum()}!"
              items |> map { it * 2.5 }
            }
        "#};
        let (tokens, errors) = scan_str(src);
        assert!(errors.is_empty());
        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<std::string::String>();
        let joined: std::string::String = tokens.iter().map(|t| &*t.lexeme).collect();
        assert_eq!(strip(&joined), strip(src));
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $lexeme:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![$(($kind, $lexeme.to_owned())),*],
            )),*]
        }};
    }
    use cases;
}
