//! Statement classification by first keyword.
//!
//! Text starting with `CREATE`, `DROP` or `ALTER` (case-sensitive) is administrative and
//! is split on `;` outside quoted regions. `CREATE DATABASE` / `DROP DATABASE` become
//! dedicated variants; everything else in the batch is passthrough DDL. Text starting
//! with `SELECT` or `WITH` is a read; anything else is rejected.

use crate::error::RunnerError;

/// Classified statement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Administrative(AdminStatement),
    Select(String),
}

/// Administrative statement variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminStatement {
    CreateDatabase { name: String, if_not_exists: bool },
    DropDatabase { name: String, if_exists: bool },
    SchemaUpdate(Vec<String>),
}

const ADMIN_KEYWORDS: [&str; 3] = ["CREATE", "DROP", "ALTER"];

fn first_token(text: &str) -> &str {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
}

/// Split on `;` outside quotes, trimming fragments and dropping empty ones
pub fn split_statements(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in text.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None if ch == ';' => fragments.push(std::mem::take(&mut current)),
            None => {
                if matches!(ch, '\'' | '"' | '`') {
                    quote = Some(ch);
                }
                current.push(ch);
            }
        }
    }
    fragments.push(current);
    fragments
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

pub fn classify(text: &str) -> Result<Statement, RunnerError> {
    let trimmed = text.trim();
    let keyword = first_token(trimmed);

    if ADMIN_KEYWORDS.contains(&keyword) {
        return classify_administrative(trimmed).map(Statement::Administrative);
    }
    if keyword.eq_ignore_ascii_case("SELECT")
        || keyword.eq_ignore_ascii_case("WITH")
        || trimmed.starts_with('(')
    {
        let select = trimmed.trim_end_matches(';').trim_end().to_string();
        return Ok(Statement::Select(select));
    }
    Err(RunnerError::Unhandled(trimmed.to_string()))
}

fn is_database_statement(fragment: &str) -> bool {
    let mut tokens = fragment.split_whitespace();
    matches!(tokens.next(), Some("CREATE") | Some("DROP")) && tokens.next() == Some("DATABASE")
}

fn classify_administrative(text: &str) -> Result<AdminStatement, RunnerError> {
    let fragments = split_statements(text);
    if fragments.iter().any(|f| is_database_statement(f)) {
        if fragments.len() > 1 {
            return Err(RunnerError::Shape(
                "database statements cannot be batched with other statements".to_string(),
            ));
        }
        return parse_database_statement(&fragments[0]);
    }
    if let Some(fragment) = fragments
        .iter()
        .find(|f| !ADMIN_KEYWORDS.contains(&first_token(f)))
    {
        return Err(RunnerError::Shape(format!(
            "non-DDL statement in schema batch: {fragment}"
        )));
    }
    Ok(AdminStatement::SchemaUpdate(fragments))
}

fn parse_database_statement(fragment: &str) -> Result<AdminStatement, RunnerError> {
    let tokens: Vec<&str> = fragment.split_whitespace().collect();
    let rest = &tokens[2..];
    match tokens[0] {
        "CREATE" => match rest {
            ["IF", "NOT", "EXISTS", name] => Ok(AdminStatement::CreateDatabase {
                name: database_name(name)?,
                if_not_exists: true,
            }),
            ["IF", ..] => Err(RunnerError::Shape(format!(
                "expected CREATE DATABASE IF NOT EXISTS <name>: {fragment}"
            ))),
            [name] => Ok(AdminStatement::CreateDatabase {
                name: database_name(name)?,
                if_not_exists: false,
            }),
            [] => Err(RunnerError::Shape(format!("missing database name: {fragment}"))),
            _ => Err(RunnerError::Shape(format!(
                "unexpected tokens after database name: {fragment}"
            ))),
        },
        _ => match rest {
            ["IF", "EXISTS", name] => Ok(AdminStatement::DropDatabase {
                name: database_name(name)?,
                if_exists: true,
            }),
            ["IF", ..] => Err(RunnerError::Shape(format!(
                "expected DROP DATABASE IF EXISTS <name>: {fragment}"
            ))),
            [name] => Ok(AdminStatement::DropDatabase {
                name: database_name(name)?,
                if_exists: false,
            }),
            [] => Err(RunnerError::Shape(format!("missing database name: {fragment}"))),
            _ => Err(RunnerError::Shape(format!(
                "unexpected tokens after database name: {fragment}"
            ))),
        },
    }
}

fn database_name(token: &str) -> Result<String, RunnerError> {
    let name = token.trim_matches('`');
    if name.is_empty() {
        return Err(RunnerError::Shape("empty database name".to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_variants() {
        assert_eq!(
            classify("CREATE DATABASE shop").unwrap(),
            Statement::Administrative(AdminStatement::CreateDatabase {
                name: "shop".to_string(),
                if_not_exists: false,
            })
        );
        assert_eq!(
            classify("CREATE DATABASE IF NOT EXISTS `shop`;").unwrap(),
            Statement::Administrative(AdminStatement::CreateDatabase {
                name: "shop".to_string(),
                if_not_exists: true,
            })
        );
    }

    #[test]
    fn test_drop_database_variants() {
        assert_eq!(
            classify("DROP DATABASE IF EXISTS shop").unwrap(),
            Statement::Administrative(AdminStatement::DropDatabase {
                name: "shop".to_string(),
                if_exists: true,
            })
        );
    }

    #[test]
    fn test_malformed_if_clauses_are_shape_errors() {
        for text in [
            "CREATE DATABASE IF NOT shop",
            "CREATE DATABASE IF NOT EXISTS",
            "CREATE DATABASE",
            "DROP DATABASE IF shop",
            "DROP DATABASE a b",
        ] {
            assert!(
                matches!(classify(text), Err(RunnerError::Shape(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_schema_batch_split_respects_quotes() {
        let statement = classify(
            "CREATE TABLE a (x STRING(MAX)) PRIMARY KEY (x);\n ALTER TABLE `b;c` ADD COLUMN y INT64; ;",
        )
        .unwrap();
        assert_eq!(
            statement,
            Statement::Administrative(AdminStatement::SchemaUpdate(vec![
                "CREATE TABLE a (x STRING(MAX)) PRIMARY KEY (x)".to_string(),
                "ALTER TABLE `b;c` ADD COLUMN y INT64".to_string(),
            ]))
        );
    }

    #[test]
    fn test_database_statement_cannot_be_batched() {
        assert!(matches!(
            classify("CREATE DATABASE a; CREATE TABLE t (x INT64) PRIMARY KEY (x)"),
            Err(RunnerError::Shape(_))
        ));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert!(matches!(
            classify("create table t (x INT64) PRIMARY KEY (x)"),
            Err(RunnerError::Unhandled(_))
        ));
    }

    #[test]
    fn test_select_and_unhandled() {
        assert_eq!(
            classify("  select 1; ").unwrap(),
            Statement::Select("select 1".to_string())
        );
        assert!(matches!(
            classify("WITH x AS (SELECT 1) SELECT * FROM x").unwrap(),
            Statement::Select(_)
        ));
        assert!(matches!(
            classify("INSERT INTO t (x) VALUES (1)"),
            Err(RunnerError::Unhandled(_))
        ));
    }
}
