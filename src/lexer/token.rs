//! Token definitions for the script lexer

use crate::error::SourceLocation;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of the token
    pub text: &'src str,
    /// Location in source
    pub location: SourceLocation,
}

impl Token<'_> {
    /// Byte offset just past the end of this token
    pub fn end_offset(&self) -> usize {
        self.location.offset + self.text.len()
    }
}

/// The kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal (42, 3.14, 0xFF)
    NumberLiteral,
    /// String literal ("hello", 'world')
    StringLiteral,

    // Identifiers and keywords
    /// Identifier (foo, bar, $baz)
    Identifier,
    /// Keyword (let, const, function, etc.)
    Keyword(Keyword),

    // Punctuators
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `??`
    QuestionQuestion,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    StarStar,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,

    // Comparison operators
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEquals,
    /// `>=`
    GreaterEquals,
    /// `==`
    EqualsEquals,
    /// `===`
    EqualsEqualsEquals,
    /// `!=`
    BangEquals,
    /// `!==`
    BangEqualsEquals,

    // Logical operators
    /// `!`
    Bang,
    /// `&&`
    AmpersandAmpersand,
    /// `||`
    PipePipe,

    // Assignment operators
    /// `=`
    Equals,
    /// `+=`
    PlusEquals,
    /// `-=`
    MinusEquals,
    /// `*=`
    StarEquals,
    /// `/=`
    SlashEquals,
    /// `%=`
    PercentEquals,

    // Arrow
    /// `=>`
    Arrow,

    // End of file
    /// End of input
    Eof,
}

/// Script keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Catch,
    Const,
    Continue,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    Let,
    New,
    Null,
    Return,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    While,

    // Contextual keywords
    Of,
}

impl Keyword {
    /// Look up a keyword by its source spelling
    pub fn lookup(text: &str) -> Option<Keyword> {
        let keyword = match text {
            "break" => Keyword::Break,
            "catch" => Keyword::Catch,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "do" => Keyword::Do,
            "else" => Keyword::Else,
            "false" => Keyword::False,
            "finally" => Keyword::Finally,
            "for" => Keyword::For,
            "function" => Keyword::Function,
            "if" => Keyword::If,
            "let" => Keyword::Let,
            "new" => Keyword::New,
            "null" => Keyword::Null,
            "return" => Keyword::Return,
            "throw" => Keyword::Throw,
            "true" => Keyword::True,
            "try" => Keyword::Try,
            "typeof" => Keyword::Typeof,
            "var" => Keyword::Var,
            "while" => Keyword::While,
            "of" => Keyword::Of,
            _ => return None,
        };
        Some(keyword)
    }

    /// Check if this keyword is a reserved word that cannot be used as an identifier
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Keyword::Of)
    }

    /// Get the string representation of the keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Break => "break",
            Keyword::Catch => "catch",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::False => "false",
            Keyword::Finally => "finally",
            Keyword::For => "for",
            Keyword::Function => "function",
            Keyword::If => "if",
            Keyword::Let => "let",
            Keyword::New => "new",
            Keyword::Null => "null",
            Keyword::Return => "return",
            Keyword::Throw => "throw",
            Keyword::True => "true",
            Keyword::Try => "try",
            Keyword::Typeof => "typeof",
            Keyword::Var => "var",
            Keyword::While => "while",
            Keyword::Of => "of",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TokenKind {
    /// Check if this token is an assignment operator
    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Equals
                | TokenKind::PlusEquals
                | TokenKind::MinusEquals
                | TokenKind::StarEquals
                | TokenKind::SlashEquals
                | TokenKind::PercentEquals
        )
    }
}
