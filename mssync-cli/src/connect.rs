//! Connection-string assembly.
//!
//! The engine consumes opaque ADO.NET-style connection strings; this module
//! is where credentials and authentication mode are decided. Azure SQL hosts
//! (`*.database.windows.net`) require SQL credentials from the environment,
//! everything else falls back to Windows integrated security when no
//! credentials are given.

use anyhow::{Context, bail};
use secrecy::{ExposeSecret, SecretString};

/// Which end of the sync a connection string is for; selects the credential
/// environment variables.
#[derive(Debug, Clone, Copy)]
pub enum Role {
    Source,
    Target,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "SOURCE",
            Role::Target => "TARGET",
        }
    }
}

/// Returns the connection string for one endpoint: the explicit override
/// when given, otherwise a string assembled from host and database.
pub fn resolve_conn_string(
    role: Role,
    explicit: Option<&str>,
    host: Option<&str>,
    database: Option<&str>,
) -> anyhow::Result<String> {
    if let Some(conn) = explicit {
        return Ok(conn.to_string());
    }

    let which = role.as_str().to_lowercase();
    let host = host.with_context(|| format!("missing {which} host (or --{which}-conn)"))?;
    let database = database.with_context(|| format!("missing {which} database name"))?;

    build_conn_string(role, host, database)
}

fn build_conn_string(role: Role, host: &str, database: &str) -> anyhow::Result<String> {
    let user_var = format!("MSSYNC_{}_USER", role.as_str());
    let password_var = format!("MSSYNC_{}_PASSWORD", role.as_str());
    let user = std::env::var(&user_var).ok().filter(|v| !v.is_empty());
    let password = std::env::var(&password_var)
        .ok()
        .map(SecretString::from);

    let mut parts = vec![
        format!("Server=tcp:{host},1433"),
        format!("Database={database}"),
        "TrustServerCertificate=true".to_string(),
    ];

    match (user, password) {
        (Some(user), Some(password)) => {
            parts.push(format!("User ID={user}"));
            parts.push(format!("Password={}", password.expose_secret()));
        }
        _ if is_azure_host(host) => {
            bail!(
                "Azure SQL host `{host}` requires SQL credentials in \
                 {user_var} and {password_var}"
            );
        }
        _ => parts.push("IntegratedSecurity=SSPI".to_string()),
    }

    Ok(parts.join(";"))
}

fn is_azure_host(host: &str) -> bool {
    host.to_lowercase().ends_with(".database.windows.net")
}
