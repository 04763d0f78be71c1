use super::error::{CouchDaoError, CouchResult};

const DEFAULT_BASE_URL: &str = "http://localhost:5984";
const DEFAULT_DATABASE: &str = "puzzle_sync";

/// Where the two game documents live in CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL without trailing slash.
    pub base_url: String,
    /// Database holding both documents.
    pub database: String,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Configuration without credentials.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    ///
    /// Credentials must be given together.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let database = std::env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());
        let config = Self::new(base_url, database);

        match (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Ok(config.with_credentials(username, password)),
            (Some(_), None) => Err(CouchDaoError::MissingEnvVar {
                var: "COUCH_PASSWORD",
            }),
            (None, Some(_)) => Err(CouchDaoError::MissingEnvVar {
                var: "COUCH_USERNAME",
            }),
            (None, None) => Ok(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let config = CouchConfig::new("http://couch:5984/", "games");
        assert_eq!(config.base_url, "http://couch:5984");
        assert!(config.username.is_none());
    }
}
