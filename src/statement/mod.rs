//! Statement building.
//!
//! [`StatementBuilder::build`] turns a [`StatementRequest`] (operation,
//! entity, columns, normalized condition tree, ordering, paging, hints) into a
//! [`CompiledStatement`] for one dialect. It is a pure function of its inputs
//! apart from filling the type resolution cache.
//!
//! # Example
//!
//! ```ignore
//! let types = TypeResolutionChain::default();
//! let builder = StatementBuilder::new(Dialect::TSql, &types);
//! let group = normalize(record! { "Id" => 5 }, &entity)?;
//! let stmt = builder.build(&StatementRequest::new(&entity, Operation::Query).filter(group))?;
//! assert_eq!(stmt.sql(), "SELECT [Id], [Name] FROM [Customer] WHERE [Id] = @p0");
//! ```

mod compiled;
mod conditions;
mod upsert;

pub use compiled::{parameter_name, CompiledStatement, Parameter};

use tracing::debug;

use crate::entity::EntityDefinition;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Direction, Field, FieldCase, OrderField, QueryGroup};
use crate::paging::PageSpec;
use crate::sql::dialect::{Dialect, HintPosition, SqlDialect};
use crate::sql::token::{Token, TokenStream};
use crate::types::{DbType, TypeResolutionChain};
use crate::value::{Record, ValueKind};
use compiled::ParameterSet;

pub(crate) use upsert::resolve_keys;

/// Alias of the scalar produced by [`Operation::Count`].
pub const COUNT_ALIAS: &str = "CountValue";

/// Input of an upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSpec {
    /// Values to write, keyed by property or column name.
    pub record: Record,
    /// Match-on fields. Empty means the entity's key.
    pub qualifiers: Vec<Field>,
    /// Key columns reported by the database, used when the entity declares
    /// none.
    pub key_columns: Vec<String>,
}

impl MergeSpec {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    pub fn qualifiers(mut self, qualifiers: impl IntoIterator<Item = impl Into<Field>>) -> Self {
        self.qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn key_columns(mut self, columns: Vec<String>) -> Self {
        self.key_columns = columns;
        self
    }
}

/// The statement to build.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Query,
    BatchQuery(PageSpec),
    Count,
    Merge(MergeSpec),
}

/// Everything the builder needs for one statement.
#[derive(Debug, Clone)]
#[must_use]
pub struct StatementRequest<'a> {
    pub entity: &'a EntityDefinition,
    pub operation: Operation,
    /// Projected columns. Empty means every mapped column, or `*` for
    /// dynamic entities.
    pub columns: Vec<Field>,
    pub filter: QueryGroup,
    pub order_by: Vec<OrderField>,
    pub top: Option<u64>,
    /// Inserted verbatim. Must come from trusted code.
    pub hints: Option<String>,
}

impl<'a> StatementRequest<'a> {
    pub fn new(entity: &'a EntityDefinition, operation: Operation) -> Self {
        Self {
            entity,
            operation,
            columns: Vec::new(),
            filter: QueryGroup::default(),
            order_by: Vec::new(),
            top: None,
            hints: None,
        }
    }

    pub fn columns(mut self, columns: Vec<Field>) -> Self {
        self.columns = columns;
        self
    }

    pub fn filter(mut self, filter: QueryGroup) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderField>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn top(mut self, top: Option<u64>) -> Self {
        self.top = top;
        self
    }

    pub fn hints(mut self, hints: Option<impl Into<String>>) -> Self {
        self.hints = hints.map(Into::into);
        self
    }
}

/// Builder policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub field_case: FieldCase,
    /// Reject paging without ORDER BY on every dialect, not only those whose
    /// paging syntax demands it.
    pub require_order_by: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            field_case: FieldCase::Exact,
            require_order_by: true,
        }
    }
}

/// A field name resolved against the entity.
pub(crate) struct ResolvedColumn {
    pub(crate) name: String,
    pub(crate) db_type: Option<DbType>,
}

/// Entity, resolver and case policy shared by the renderers.
pub(crate) struct Scope<'a> {
    pub(crate) entity: &'a EntityDefinition,
    types: &'a TypeResolutionChain,
    case: FieldCase,
}

impl<'a> Scope<'a> {
    /// Map a caller-supplied name to its column. Unknown names pass through
    /// verbatim and resolve by value kind only.
    pub(crate) fn column(&self, name: &str, kind: Option<ValueKind>) -> ResolvedColumn {
        match self.entity.property(name, self.case) {
            Some(property) => ResolvedColumn {
                name: property.column_name().to_string(),
                db_type: self.types.resolve(self.entity.name(), property),
            },
            None => ResolvedColumn {
                name: name.to_string(),
                db_type: kind.and_then(|k| self.types.resolve_kind(k)),
            },
        }
    }
}

pub(crate) fn table_token(entity: &EntityDefinition) -> Token {
    let table = entity.table();
    Token::QualifiedIdent {
        schema: table.schema.clone(),
        name: table.name.clone(),
    }
}

/// Compiles requests for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: Dialect,
    types: &'a TypeResolutionChain,
    options: BuildOptions,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: Dialect, types: &'a TypeResolutionChain) -> Self {
        Self {
            dialect,
            types,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn scope<'e>(&self, entity: &'e EntityDefinition) -> Scope<'e>
    where
        'a: 'e,
    {
        Scope {
            entity,
            types: self.types,
            case: self.options.field_case,
        }
    }

    pub fn build(&self, request: &StatementRequest<'_>) -> QueryResult<CompiledStatement> {
        let statement = match &request.operation {
            Operation::Query => self.select(request, None),
            Operation::BatchQuery(page) => self.select(request, Some(*page)),
            Operation::Count => self.count(request),
            Operation::Merge(spec) => upsert::render(
                &self.scope(request.entity),
                self.dialect,
                spec,
                request.hints.as_deref(),
            ),
        }?;
        debug!(
            dialect = %self.dialect,
            parameters = statement.parameters().len(),
            sql = statement.sql(),
            "built statement"
        );
        Ok(statement)
    }

    fn select(
        &self,
        request: &StatementRequest<'_>,
        page: Option<PageSpec>,
    ) -> QueryResult<CompiledStatement> {
        if page.is_some()
            && request.order_by.is_empty()
            && (self.dialect.requires_order_by_for_offset() || self.options.require_order_by)
        {
            return Err(QueryError::MissingOrderForPaging {
                dialect: self.dialect,
            });
        }

        let scope = self.scope(request.entity);
        let mut params = ParameterSet::default();
        let mut ts = TokenStream::new();
        let hints = request.hints.as_deref();

        self.prefix_hints(&mut ts, hints);
        ts.push(Token::Select).space();

        let top = match (page, request.top) {
            (None, Some(n)) => Some(i64::try_from(n).map_err(|_| {
                QueryError::InvalidPageArgument(format!("top {} exceeds {}", n, i64::MAX))
            })?),
            _ => None,
        };
        if let (Some(n), true) = (top, self.dialect.supports_top()) {
            ts.push(Token::Top)
                .space()
                .lparen()
                .push(Token::LitInt(n))
                .rparen()
                .space();
        }

        ts.append(&self.projection(&scope, request));
        self.from(&mut ts, request.entity, hints);
        self.where_clause(&mut ts, &scope, &request.filter, &mut params)?;

        if !request.order_by.is_empty() {
            let terms = request.order_by.iter().map(|o| {
                let mut term = TokenStream::new();
                term.ident(scope.column(o.field.name(), o.field.kind()).name)
                    .space()
                    .push(match o.direction {
                        Direction::Ascending => Token::Asc,
                        Direction::Descending => Token::Desc,
                    });
                term
            });
            ts.space()
                .push(Token::OrderBy)
                .space()
                .comma_separated(terms);
        }

        if let Some(page) = page {
            ts.space().append(
                &self
                    .dialect
                    .emit_limit_offset(Some(page.limit()), Some(page.offset())),
            );
        } else if let (Some(n), false) = (top, self.dialect.supports_top()) {
            ts.space()
                .append(&self.dialect.emit_limit_offset(Some(n), None));
        }

        Ok(CompiledStatement::new(
            self.dialect,
            ts.serialize(self.dialect),
            params.into_vec(),
        ))
    }

    fn count(&self, request: &StatementRequest<'_>) -> QueryResult<CompiledStatement> {
        let scope = self.scope(request.entity);
        let mut params = ParameterSet::default();
        let mut ts = TokenStream::new();
        let hints = request.hints.as_deref();

        self.prefix_hints(&mut ts, hints);
        ts.push(Token::Select)
            .space()
            .push(Token::Count)
            .lparen()
            .push(Token::Star)
            .rparen()
            .space()
            .push(Token::As)
            .space()
            .ident(COUNT_ALIAS);
        self.from(&mut ts, request.entity, hints);
        self.where_clause(&mut ts, &scope, &request.filter, &mut params)?;

        Ok(CompiledStatement::new(
            self.dialect,
            ts.serialize(self.dialect),
            params.into_vec(),
        ))
    }

    fn projection(&self, scope: &Scope<'_>, request: &StatementRequest<'_>) -> TokenStream {
        let names: Vec<String> = if request.columns.is_empty() {
            request
                .entity
                .properties()
                .iter()
                .map(|p| p.column_name().to_string())
                .collect()
        } else {
            request
                .columns
                .iter()
                .map(|f| scope.column(f.name(), f.kind()).name)
                .collect()
        };

        let mut ts = TokenStream::new();
        if names.is_empty() {
            ts.push(Token::Star);
        } else {
            ts.comma_separated(names.into_iter().map(|n| Token::Ident(n).into()));
        }
        ts
    }

    fn prefix_hints(&self, ts: &mut TokenStream, hints: Option<&str>) {
        if let (Some(h), HintPosition::StatementPrefix) = (hints, self.dialect.hint_position()) {
            ts.push(Token::Raw(h.to_string())).space();
        }
    }

    fn from(&self, ts: &mut TokenStream, entity: &EntityDefinition, hints: Option<&str>) {
        ts.space()
            .push(Token::From)
            .space()
            .push(table_token(entity));
        if let (Some(h), HintPosition::AfterTable) = (hints, self.dialect.hint_position()) {
            ts.space().push(Token::Raw(h.to_string()));
        }
    }

    fn where_clause(
        &self,
        ts: &mut TokenStream,
        scope: &Scope<'_>,
        filter: &QueryGroup,
        params: &mut ParameterSet,
    ) -> QueryResult<()> {
        if let Some(condition) = conditions::render_group(scope, filter, params)? {
            ts.space().push(Token::Where).space().append(&condition);
        }
        Ok(())
    }
}
