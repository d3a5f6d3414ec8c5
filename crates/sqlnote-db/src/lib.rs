pub mod connection_string;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use sqlnote_host_traits::db::{Connection, DBTrait, Error, ErrorCode};

use connection_string::{ConnectionStringParser, DatabaseType};

/// Opens connections for whichever engine a connection string names.
#[derive(Clone, Default)]
pub struct DBBackend {}

impl DBBackend {
    pub fn new() -> Self {
        Self {}
    }
}

impl DBTrait for DBBackend {
    fn open(&mut self, name: String) -> Result<Connection, Error> {
        match ConnectionStringParser::new(&name).get_database_type() {
            #[cfg(feature = "sqlite")]
            DatabaseType::SQLite => {
                let connection: Box<dyn sqlnote_host_traits::db::DBConnection> =
                    Box::new(sqlite::SQLiteDBConnection::new(&name)?);
                Ok(connection.into())
            }
            database_type => {
                log::warn!("No backend enabled for {:?} connection strings", database_type);
                Err(Error::msg(
                    ErrorCode::NotEnabled,
                    format!("{:?} backend is not enabled", database_type),
                ))
            }
        }
    }
}

/// Shorthand for `DBBackend::new().open(..)`.
pub fn open(connection_string: &str) -> Result<Connection, Error> {
    DBBackend::new().open(connection_string.to_string())
}
