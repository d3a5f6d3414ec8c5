use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
    MySQL,
    Unknown,
}

pub struct ConnectionStringParser {
    connection_string: String,
}

impl ConnectionStringParser {
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.trim().to_string(),
        }
    }

    pub fn get_database_type(&self) -> DatabaseType {
        let conn_str = self.connection_string.as_str();

        match Url::parse(conn_str) {
            Ok(url) => match url.scheme().to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => DatabaseType::PostgreSQL,
                "mysql" | "mariadb" | "mysqlx" => DatabaseType::MySQL,
                "sqlite" | "file" => DatabaseType::SQLite,
                // Windows drive letters parse as one-letter schemes
                _ => detect_by_shape(conn_str),
            },
            Err(_) => detect_by_shape(conn_str),
        }
    }
}

fn detect_by_shape(conn_str: &str) -> DatabaseType {
    let lower = conn_str.to_ascii_lowercase();

    if lower == ":memory:" || lower == "sqlite::memory:" || lower.starts_with("file::memory:") {
        return DatabaseType::SQLite;
    }

    let windows_path = conn_str.contains('\\') && conn_str.chars().nth(1) == Some(':');
    let looks_like_path = conn_str.starts_with("./")
        || conn_str.starts_with("../")
        || conn_str.starts_with('/')
        || windows_path;
    if looks_like_path
        || [".db", ".sqlite", ".sqlite3"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    {
        return DatabaseType::SQLite;
    }

    if is_libpq_keywords(conn_str) {
        return DatabaseType::PostgreSQL;
    }

    // user:pass@tcp(host:3306)/dbname
    if lower.contains("@tcp(") && lower.contains(")/") {
        return DatabaseType::MySQL;
    }

    DatabaseType::Unknown
}

/// `host=localhost user=app dbname=app` style strings.
fn is_libpq_keywords(conn_str: &str) -> bool {
    conn_str
        .split_whitespace()
        .all(|token| matches!(token.split_once('='), Some((key, _)) if !key.is_empty()))
        && !conn_str.trim().is_empty()
}

/// The filesystem path (or `:memory:`) SQLite should open for `conn_str`.
pub fn sqlite_path(conn_str: &str) -> String {
    let conn_str = conn_str.trim();
    let lower = conn_str.to_ascii_lowercase();

    if lower == "sqlite::memory:" || lower.starts_with("file::memory:") {
        return ":memory:".to_string();
    }

    for prefix in ["sqlite://", "sqlite:", "file://", "file:"] {
        if lower.starts_with(prefix) {
            let rest = &conn_str[prefix.len()..];
            // Drop URL query parameters such as ?mode=rwc
            return rest.split('?').next().unwrap_or(rest).to_string();
        }
    }

    conn_str.to_string()
}
