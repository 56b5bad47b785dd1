use once_cell::sync::Lazy;
use regex::Regex;

use crate::arguments::Arguments;
use crate::error::{Error, Result};

// The first word of the statement, skipping leading /* */ and -- comments.
static FIRST_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A(?:\s*/\*.*?\*/|\s*--[^\n]*\n)*\s*(\w+)").unwrap());

static VALID_SP_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap());

/// The operation a statement performs: its first word, lowercased, with
/// leading comments skipped. `None` for an empty or unparseable statement.
pub(crate) fn statement_operation(sql: &str) -> Option<String> {
    FIRST_WORD
        .captures(sql)
        .map(|captures| captures[1].to_ascii_lowercase())
}

/// Whether executing this operation ends any open transaction.
pub(crate) fn ends_transaction(operation: &str) -> bool {
    operation == "commit" || operation == "rollback"
}

/// Whether this operation can change the row counts reported by the server.
pub(crate) fn modifies_rows(operation: &str) -> bool {
    // Commit is in this set: deferred work inside a transaction is only
    // reflected in the counts once the commit runs.
    matches!(operation, "commit" | "insert" | "update" | "delete")
}

pub(crate) fn is_set_command(operation: &str) -> bool {
    operation == "set"
}

pub(crate) fn is_valid_procedure_name(name: &str) -> bool {
    VALID_SP_NAME.is_match(name)
}

/// Rewrite `%(name)s` placeholders into the `@name` form the server binds
/// against, with `%%` as the escape for a literal percent.
///
/// Applied only when parameters were supplied: a parameterless statement is
/// passed through verbatim, percent signs and all.
pub(crate) fn expand_placeholders(sql: &str, arguments: &Arguments) -> Result<String> {
    if arguments.is_empty() {
        return Ok(sql.to_owned());
    }

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(tail) = tail.strip_prefix('%') {
            out.push('%');
            rest = tail;
            continue;
        }

        let Some(tail) = tail.strip_prefix('(') else {
            return Err(Error::Interface(
                "invalid '%' in statement; write '%%' for a literal percent when binding parameters"
                    .to_owned(),
            ));
        };

        let end = tail.find(')').ok_or_else(|| {
            Error::Interface("unterminated placeholder; expected '%(name)s'".to_owned())
        })?;
        let name = &tail[..end];
        let rest_after = tail[end + 1..].strip_prefix('s').ok_or_else(|| {
            Error::Interface(format!(
                "malformed placeholder for parameter {name:?}; expected '%({name})s'"
            ))
        })?;

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Interface(format!("invalid parameter name {name:?}")));
        }

        if !arguments.contains(name) {
            return Err(Error::Interface(format!(
                "no value provided for parameter {name:?}"
            )));
        }

        out.push('@');
        out.push_str(name);
        rest = rest_after;
    }

    out.push_str(rest);
    Ok(out)
}
