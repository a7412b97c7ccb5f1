//! SQL tokens.
//!
//! Statements are assembled as token streams and only turned into text at the
//! end, once the dialect's quoting and placeholder rules are known.

use super::dialect::{Dialect, SqlDialect};

/// Every element the statement builder emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Query Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    Fetch,
    Next,
    Rows,
    Only,
    Top,
    In,
    Between,
    Like,
    Escape,
    IsNull,
    IsNotNull,
    Count,

    // === Upsert Keywords ===
    Insert,
    Into,
    Values,
    Default,
    Update,
    Set,
    Returning,
    Output,
    Inserted,
    Excluded,
    Using,
    Conflict,
    Do,
    Nothing,
    Merge,
    When,
    Matched,
    Then,
    Duplicate,
    Key,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,
    Semicolon,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace ===
    Space,

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Qualified identifier: schema.table or just table
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    /// Integer literal
    LitInt(i64),
    /// String literal, single-quoted
    LitStr(String),
    /// Bound parameter. `index` is the zero-based binding position.
    Param { name: String, index: usize },

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass user input to this variant.** Raw SQL is not sanitized.
    /// Table hints are the one caller-supplied string emitted this way; they
    /// are documented as trusted input.
    Raw(String),
}

impl Token {
    /// Fixed text of keywords, operators and punctuation. `None` for tokens
    /// whose text depends on the dialect or carries data.
    pub fn fixed_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::As => "AS",
            Token::On => "ON",
            Token::OrderBy => "ORDER BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::Fetch => "FETCH",
            Token::Next => "NEXT",
            Token::Rows => "ROWS",
            Token::Only => "ONLY",
            Token::Top => "TOP",
            Token::In => "IN",
            Token::Between => "BETWEEN",
            Token::Like => "LIKE",
            Token::Escape => "ESCAPE",
            Token::IsNull => "IS NULL",
            Token::IsNotNull => "IS NOT NULL",
            Token::Count => "COUNT",
            Token::Insert => "INSERT",
            Token::Into => "INTO",
            Token::Values => "VALUES",
            Token::Default => "DEFAULT",
            Token::Update => "UPDATE",
            Token::Set => "SET",
            Token::Returning => "RETURNING",
            Token::Output => "OUTPUT",
            Token::Inserted => "INSERTED",
            Token::Excluded => "excluded",
            Token::Using => "USING",
            Token::Conflict => "CONFLICT",
            Token::Do => "DO",
            Token::Nothing => "NOTHING",
            Token::Merge => "MERGE",
            Token::When => "WHEN",
            Token::Matched => "MATCHED",
            Token::Then => "THEN",
            Token::Duplicate => "DUPLICATE",
            Token::Key => "KEY",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Star => "*",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Semicolon => ";",
            Token::Eq => "=",
            Token::Ne => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Space => " ",
            Token::Ident(_)
            | Token::QualifiedIdent { .. }
            | Token::LitInt(_)
            | Token::LitStr(_)
            | Token::Param { .. }
            | Token::Raw(_) => return None,
        };
        Some(text)
    }

    /// Serialize this token for `dialect`.
    pub fn serialize(&self, dialect: Dialect) -> String {
        if let Some(text) = self.fixed_text() {
            return text.to_string();
        }
        match self {
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { schema: Some(schema), name } => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(name)
            ),
            Token::QualifiedIdent { schema: None, name } => dialect.quote_identifier(name),
            Token::LitInt(n) => n.to_string(),
            Token::LitStr(s) => format!("'{}'", s.replace('\'', "''")),
            Token::Param { name, index } => dialect.parameter_placeholder(name, *index),
            Token::Raw(sql) => sql.clone(),
            _ => String::new(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Push `items` separated by `", "`.
    pub fn comma_separated<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = TokenStream>,
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.comma().space();
            }
            self.append(&item);
        }
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    pub fn ident(&mut self, name: impl Into<String>) -> &mut Self {
        self.push(Token::Ident(name.into()))
    }
}

impl From<Token> for TokenStream {
    fn from(token: Token) -> Self {
        Self {
            tokens: vec![token],
        }
    }
}
