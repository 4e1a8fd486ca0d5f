use std::{fmt, rc::Rc};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The raw source text of the token.
    pub lexeme: Box<str>,
    /// Decoded payload: string contents, number text or the literal fragment
    /// preceding an interpolation.
    pub literal: Option<Box<str>>,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: &str, literal: Option<&str>, pos: Position) -> Token {
        Token {
            kind,
            lexeme: lexeme.into(),
            literal: literal.map(Into::into),
            pos,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns the literal payload, falling back to the lexeme.
    pub fn text(&self) -> &str {
        self.literal.as_deref().unwrap_or(&self.lexeme)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.lexeme, self.pos)
    }
}

/// A source span, in byte offsets, within some file.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub start: usize,
    pub end: usize,
    pub file: Rc<str>,
}

impl Position {
    pub fn new(start: usize, end: usize, file: Rc<str>) -> Position {
        debug_assert!(start <= end);
        Position { start, end, file }
    }

    /// Spans from the start of `self` to the end of `other`.
    pub fn merge(&self, other: &Position) -> Position {
        debug_assert_eq!(self.file, other.file);
        Position {
            start: self.start,
            end: other.end.max(self.start),
            file: Rc::clone(&self.file),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the substring of the provided source delimited by this span.
    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.start..self.end]
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({self})")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Position { start, end, file } = self;
        write!(f, "{file}:{start}..{end}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    At,
    Hash,
    Dollar,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Bar,
    Comma,
    Dot,
    Minus,
    MinusMinus,
    Plus,
    PlusPlus,
    PlusEqual,
    /// `+++`
    Concat,
    Colon,
    Semicolon,
    Newline,
    Slash,
    Star,
    Amp,
    Question,
    AndAnd,
    OrOr,
    /// `::`
    ColonColon,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    /// `...`
    Range,
    /// `|>`
    Pipe,
    /// `->`
    Arrow,

    Class,
    Interface,
    Trait,
    Enum,
    Namespace,
    Extends,
    Implements,
    Static,
    Private,
    Public,
    Abstract,
    Const,
    False,
    True,
    Else,
    Function,
    For,
    If,
    Null,
    Return,
    Super,
    This,
    Var,
    Global,
    Do,
    While,
    Use,
    As,
    In,
    Is,
    Throw,
    Try,
    Catch,
    Switch,
    Match,
    Case,
    Default,

    Identifier,
    TypeIdentifier,
    /// An identifier immediately followed by a string, as in `tag"..."`.
    TemplateTag,
    String,
    Number,
    /// A string fragment that ends at a `${` interpolation.
    Interpolation,

    Eof,
}

impl TokenKind {
    /// Tokens that, when starting the next line, continue the current
    /// expression instead of terminating the statement.
    pub fn is_continuation(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Dot | Plus | Concat | Pipe | Minus | EqualEqual | BangEqual | AndAnd | OrOr
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            At => "@",
            Hash => "#",
            Dollar => "$",
            LeftParen => "(",
            RightParen => ")",
            LeftBrace => "{",
            RightBrace => "}",
            LeftBracket => "[",
            RightBracket => "]",
            Bar => "|",
            Comma => ",",
            Dot => ".",
            Minus => "-",
            MinusMinus => "--",
            Plus => "+",
            PlusPlus => "++",
            PlusEqual => "+=",
            Concat => "+++",
            Colon => ":",
            Semicolon => ";",
            Newline => "[newline]",
            Slash => "/",
            Star => "*",
            Amp => "&",
            Question => "?",
            AndAnd => "&&",
            OrOr => "||",
            ColonColon => "::",
            Bang => "!",
            BangEqual => "!=",
            Equal => "=",
            EqualEqual => "==",
            Greater => ">",
            GreaterEqual => ">=",
            Less => "<",
            LessEqual => "<=",
            Range => "...",
            Pipe => "|>",
            Arrow => "->",
            Identifier => "[identifier]",
            TypeIdentifier => "[type-identifier]",
            TemplateTag => "[template]",
            String => "[string]",
            Number => "[number]",
            Interpolation => "[interpolation]",
            Eof => "[eof]",
            keyword => {
                let name = KEYWORDS
                    .entries()
                    .find_map(|(name, kind)| (kind == keyword).then_some(*name))
                    .unwrap_or("[keyword]");
                return f.write_str(name);
            }
        };
        f.write_str(s)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "class" => TokenKind::Class,
    "interface" => TokenKind::Interface,
    "trait" => TokenKind::Trait,
    "enum" => TokenKind::Enum,
    "namespace" => TokenKind::Namespace,
    "extends" => TokenKind::Extends,
    "implements" => TokenKind::Implements,
    "static" => TokenKind::Static,
    "private" => TokenKind::Private,
    "public" => TokenKind::Public,
    "abstract" => TokenKind::Abstract,
    "const" => TokenKind::Const,
    "false" => TokenKind::False,
    "true" => TokenKind::True,
    "else" => TokenKind::Else,
    "function" => TokenKind::Function,
    "for" => TokenKind::For,
    "if" => TokenKind::If,
    "null" => TokenKind::Null,
    "return" => TokenKind::Return,
    "super" => TokenKind::Super,
    "this" => TokenKind::This,
    "var" => TokenKind::Var,
    "global" => TokenKind::Global,
    "do" => TokenKind::Do,
    "while" => TokenKind::While,
    "use" => TokenKind::Use,
    "as" => TokenKind::As,
    "in" => TokenKind::In,
    "is" => TokenKind::Is,
    "throw" => TokenKind::Throw,
    "try" => TokenKind::Try,
    "catch" => TokenKind::Catch,
    "switch" => TokenKind::Switch,
    "match" => TokenKind::Match,
    "case" => TokenKind::Case,
    "default" => TokenKind::Default,
};
