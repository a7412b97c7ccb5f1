//! Upsert rendering: MERGE, ON CONFLICT and ON DUPLICATE KEY UPDATE.

use tracing::debug;

use super::compiled::{CompiledStatement, ParameterSet};
use super::{table_token, MergeSpec, Scope};
use crate::error::{QueryError, QueryResult};
use crate::sql::dialect::{Dialect, HintPosition, SqlDialect, UpsertStyle};
use crate::sql::token::{Token, TokenStream};
use crate::types::DbType;
use crate::value::Value;

const TARGET: &str = "T";
const SOURCE: &str = "S";
const RESULT: &str = "Result";

struct Column {
    name: String,
    value: Value,
    db_type: Option<DbType>,
}

/// What an upsert matches on and what it reports back.
pub(crate) struct UpsertKeys {
    pub(crate) qualifiers: Vec<String>,
    /// Column returned by the statement and used as the merge result.
    pub(crate) result: Option<String>,
    /// Declared identity column; never inserted explicitly by MERGE.
    identity: Option<String>,
}

/// Resolve qualifiers and the result column of a merge.
pub(crate) fn resolve_keys(scope: &Scope<'_>, spec: &MergeSpec) -> QueryResult<UpsertKeys> {
    let entity = scope.entity;
    let present = |column: &str| spec.record.names().any(|n| scope.column(n, None).name == column);

    let qualifiers: Vec<String> = if !spec.qualifiers.is_empty() {
        spec.qualifiers
            .iter()
            .map(|field| {
                let column = scope.column(field.name(), field.kind()).name;
                if present(column.as_str()) {
                    Ok(column)
                } else {
                    Err(QueryError::UnknownQualifier {
                        field: field.name().to_string(),
                    })
                }
            })
            .collect::<QueryResult<_>>()?
    } else {
        let keys = declared_keys(scope, spec);
        if keys.is_empty() {
            return Err(QueryError::NoQualifierAvailable {
                table: entity.table().to_string(),
            });
        }
        if let Some(missing) = keys.iter().find(|k| !present(k.as_str())) {
            return Err(QueryError::UnknownQualifier {
                field: missing.clone(),
            });
        }
        keys
    };

    let identity = entity.identity().map(|p| p.column_name().to_string());
    let result = identity
        .clone()
        .or_else(|| {
            entity
                .key_properties()
                .first()
                .map(|p| p.column_name().to_string())
        })
        .or_else(|| spec.key_columns.first().cloned());

    Ok(UpsertKeys {
        qualifiers,
        result,
        identity,
    })
}

/// Key columns of the entity, else those reported by the connection.
fn declared_keys(scope: &Scope<'_>, spec: &MergeSpec) -> Vec<String> {
    let keys: Vec<String> = scope
        .entity
        .key_properties()
        .iter()
        .map(|p| p.column_name().to_string())
        .collect();
    if keys.is_empty() {
        spec.key_columns.clone()
    } else {
        keys
    }
}

pub(crate) fn render(
    scope: &Scope<'_>,
    dialect: Dialect,
    spec: &MergeSpec,
    hints: Option<&str>,
) -> QueryResult<CompiledStatement> {
    if let Some((name, _)) = spec.record.iter().find(|(_, v)| matches!(v, Value::List(_))) {
        return Err(QueryError::MergeListValue {
            field: name.to_string(),
        });
    }

    let keys = resolve_keys(scope, spec)?;

    // ON DUPLICATE KEY matches on every unique key of the table, so explicit
    // qualifiers are only exact when they are the declared key.
    if matches!(dialect.upsert_style(), UpsertStyle::OnDuplicateKey) && !spec.qualifiers.is_empty()
    {
        let mut wanted = keys.qualifiers.clone();
        let mut declared = declared_keys(scope, spec);
        wanted.sort();
        declared.sort();
        if wanted != declared {
            return Err(QueryError::QualifierNotKey {
                dialect,
                qualifiers: keys.qualifiers.join(", "),
            });
        }
    }
    let columns: Vec<Column> = spec
        .record
        .iter()
        .map(|(name, value)| {
            let column = scope.column(name, value.kind());
            Column {
                name: column.name,
                value: value.clone(),
                db_type: column.db_type,
            }
        })
        .collect();

    let hints = hints.filter(|h| {
        let supported = dialect.supports_upsert_hints();
        if !supported {
            debug!(dialect = %dialect, hints = *h, "table hints ignored for upsert");
        }
        supported
    });

    let mut params = ParameterSet::default();
    let mut ts = TokenStream::new();
    if let (Some(h), HintPosition::StatementPrefix) = (hints, dialect.hint_position()) {
        ts.push(Token::Raw(h.to_string())).space();
    }
    let table_hints = hints.filter(|_| dialect.hint_position() == HintPosition::AfterTable);

    match dialect.upsert_style() {
        UpsertStyle::Merge => merge(scope, &keys, &columns, table_hints, &mut params, &mut ts),
        UpsertStyle::OnConflict => on_conflict(scope, dialect, &keys, &columns, &mut params, &mut ts),
        UpsertStyle::OnDuplicateKey => on_duplicate_key(scope, &keys, &columns, &mut params, &mut ts),
    }

    Ok(CompiledStatement::new(
        dialect,
        ts.serialize(dialect),
        params.into_vec(),
    ))
}

/// Columns written on insert. A null identity or result column is left to
/// the database.
fn insertable<'c>(keys: &UpsertKeys, columns: &'c [Column], merge: bool) -> Vec<&'c Column> {
    columns
        .iter()
        .filter(|c| {
            let is_identity = keys.identity.as_deref() == Some(c.name.as_str());
            let is_result = keys.result.as_deref() == Some(c.name.as_str());
            !((merge && is_identity) || ((is_identity || is_result) && c.value.is_null()))
        })
        .collect()
}

/// Columns overwritten when the row already exists.
fn updatable<'c>(keys: &UpsertKeys, columns: &'c [Column]) -> Vec<&'c Column> {
    columns
        .iter()
        .filter(|c| {
            !keys.qualifiers.contains(&c.name) && keys.identity.as_deref() != Some(c.name.as_str())
        })
        .collect()
}

fn idents<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<TokenStream> {
    names
        .into_iter()
        .map(|n| Token::Ident(n.to_string()).into())
        .collect()
}

fn qualified(alias: &str, column: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.ident(alias).push(Token::Dot).ident(column);
    ts
}

fn merge(
    scope: &Scope<'_>,
    keys: &UpsertKeys,
    columns: &[Column],
    hints: Option<&str>,
    params: &mut ParameterSet,
    ts: &mut TokenStream,
) {
    ts.push(Token::Merge)
        .space()
        .push(Token::Into)
        .space()
        .push(table_token(scope.entity));
    if let Some(h) = hints {
        ts.space().push(Token::Raw(h.to_string()));
    }
    ts.space().push(Token::As).space().ident(TARGET);

    // USING (SELECT @p0 AS [Id], ...) AS [S]
    let source: Vec<TokenStream> = columns
        .iter()
        .map(|c| {
            let mut item = TokenStream::new();
            item.push(params.bind(c.value.clone(), c.db_type))
                .space()
                .push(Token::As)
                .space()
                .ident(c.name.as_str());
            item
        })
        .collect();
    ts.space()
        .push(Token::Using)
        .space()
        .lparen()
        .push(Token::Select)
        .space()
        .comma_separated(source)
        .rparen()
        .space()
        .push(Token::As)
        .space()
        .ident(SOURCE);

    // ON ([T].[Id] = [S].[Id] AND ...)
    ts.space().push(Token::On).space().lparen();
    for (i, q) in keys.qualifiers.iter().enumerate() {
        if i > 0 {
            ts.space().push(Token::And).space();
        }
        ts.append(&qualified(TARGET, q))
            .space()
            .push(Token::Eq)
            .space()
            .append(&qualified(SOURCE, q));
    }
    ts.rparen();

    let inserted = insertable(keys, columns, true);
    ts.space()
        .push(Token::When)
        .space()
        .push(Token::Not)
        .space()
        .push(Token::Matched)
        .space()
        .push(Token::Then)
        .space()
        .push(Token::Insert)
        .space();
    if inserted.is_empty() {
        ts.push(Token::Default).space().push(Token::Values);
    } else {
        ts.lparen()
            .comma_separated(idents(inserted.iter().map(|c| c.name.as_str())))
            .rparen()
            .space()
            .push(Token::Values)
            .space()
            .lparen()
            .comma_separated(inserted.iter().map(|c| qualified(SOURCE, &c.name)))
            .rparen();
    }

    let updated = updatable(keys, columns);
    if !updated.is_empty() {
        let assignments = updated.iter().map(|c| {
            let mut a = TokenStream::new();
            a.ident(c.name.as_str())
                .space()
                .push(Token::Eq)
                .space()
                .append(&qualified(SOURCE, &c.name));
            a
        });
        ts.space()
            .push(Token::When)
            .space()
            .push(Token::Matched)
            .space()
            .push(Token::Then)
            .space()
            .push(Token::Update)
            .space()
            .push(Token::Set)
            .space()
            .comma_separated(assignments);
    }

    if let Some(result) = &keys.result {
        ts.space()
            .push(Token::Output)
            .space()
            .push(Token::Inserted)
            .push(Token::Dot)
            .ident(result.as_str())
            .space()
            .push(Token::As)
            .space()
            .ident(RESULT);
    }

    // T-SQL requires MERGE to end with a semicolon
    ts.push(Token::Semicolon);
}

/// `INSERT INTO t (cols) VALUES (params)` or `INSERT INTO t DEFAULT VALUES`.
/// Returns whether a column list was written.
fn insert_values(
    scope: &Scope<'_>,
    inserted: &[&Column],
    params: &mut ParameterSet,
    ts: &mut TokenStream,
) -> bool {
    ts.push(Token::Insert)
        .space()
        .push(Token::Into)
        .space()
        .push(table_token(scope.entity))
        .space();
    if inserted.is_empty() {
        ts.push(Token::Default).space().push(Token::Values);
        return false;
    }
    let values: Vec<TokenStream> = inserted
        .iter()
        .map(|c| params.bind(c.value.clone(), c.db_type).into())
        .collect();
    ts.lparen()
        .comma_separated(idents(inserted.iter().map(|c| c.name.as_str())))
        .rparen()
        .space()
        .push(Token::Values)
        .space()
        .lparen()
        .comma_separated(values)
        .rparen();
    true
}

fn on_conflict(
    scope: &Scope<'_>,
    dialect: Dialect,
    keys: &UpsertKeys,
    columns: &[Column],
    params: &mut ParameterSet,
    ts: &mut TokenStream,
) {
    let inserted = insertable(keys, columns, false);
    if insert_values(scope, &inserted, params, ts) {
        ts.space()
            .push(Token::On)
            .space()
            .push(Token::Conflict)
            .space()
            .lparen()
            .comma_separated(idents(keys.qualifiers.iter().map(String::as_str)))
            .rparen()
            .space()
            .push(Token::Do)
            .space();

        let updated: Vec<_> = updatable(keys, columns)
            .into_iter()
            .filter(|c| inserted.iter().any(|i| i.name == c.name))
            .collect();
        if updated.is_empty() {
            ts.push(Token::Nothing);
        } else {
            let assignments = updated.iter().map(|c| {
                let mut a = TokenStream::new();
                a.ident(c.name.as_str())
                    .space()
                    .push(Token::Eq)
                    .space()
                    .push(Token::Excluded)
                    .push(Token::Dot)
                    .ident(c.name.as_str());
                a
            });
            ts.push(Token::Update)
                .space()
                .push(Token::Set)
                .space()
                .comma_separated(assignments);
        }
    }

    if let (Some(result), true) = (&keys.result, dialect.supports_returning()) {
        ts.space().push(Token::Returning).space().ident(result.as_str());
    }
}

fn on_duplicate_key(
    scope: &Scope<'_>,
    keys: &UpsertKeys,
    columns: &[Column],
    params: &mut ParameterSet,
    ts: &mut TokenStream,
) {
    let inserted = insertable(keys, columns, false);
    if !insert_values(scope, &inserted, params, ts) {
        return;
    }

    let updated: Vec<&str> = updatable(keys, columns)
        .into_iter()
        .filter(|c| inserted.iter().any(|i| i.name == c.name))
        .map(|c| c.name.as_str())
        .collect();
    let assignments: Vec<TokenStream> = if updated.is_empty() {
        // No-op assignment keeps the row unchanged on conflict.
        keys.qualifiers
            .first()
            .map(|q| {
                let mut a = TokenStream::new();
                a.ident(q.as_str()).space().push(Token::Eq).space().ident(q.as_str());
                a
            })
            .into_iter()
            .collect()
    } else {
        updated
            .iter()
            .map(|name| {
                let mut a = TokenStream::new();
                a.ident(*name)
                    .space()
                    .push(Token::Eq)
                    .space()
                    .push(Token::Values)
                    .lparen()
                    .ident(*name)
                    .rparen();
                a
            })
            .collect()
    };
    ts.space()
        .push(Token::On)
        .space()
        .push(Token::Duplicate)
        .space()
        .push(Token::Key)
        .space()
        .push(Token::Update)
        .space()
        .comma_separated(assignments);
}
