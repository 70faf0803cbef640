use tiberius::{BulkLoadRequest, Client, Config, QueryStream, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// A single SQL Server connection speaking TDS over TCP.
///
/// Each sync worker owns its own pair of these (source and target);
/// connections are never shared across tasks. Statements run without a
/// command timeout, since bulk operations are expected to be long-running;
/// transport failures surface as driver errors and are classified upstream.
pub struct MssqlClient {
    inner: Client<Compat<TcpStream>>,
}

impl MssqlClient {
    /// Connects using an ADO.NET-style connection string.
    ///
    /// `read_only` applies the ReadOnly application intent, which routes to a
    /// readable secondary where one is available. The connection string is
    /// treated as opaque: credentials and authentication mode are whatever
    /// the caller put in it.
    pub async fn connect(conn_str: &str, read_only: bool) -> Result<Self, tiberius::error::Error> {
        let mut config = Config::from_ado_string(conn_str)?;
        if read_only {
            config.readonly(true);
        }

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let inner = Client::connect(config, tcp.compat_write()).await?;
        debug!(read_only, "connected to sql server");

        Ok(Self { inner })
    }

    /// Runs a query and materializes the first result set.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, tiberius::error::Error> {
        let stream = self.inner.query(sql, params).await?;
        stream.into_first_result().await
    }

    /// Runs a query and returns the row stream without materializing it,
    /// for readers over arbitrarily large tables.
    pub async fn query_stream(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<QueryStream<'_>, tiberius::error::Error> {
        self.inner.query(sql, params).await
    }

    /// Runs a query expected to return a single scalar row.
    pub async fn query_row(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<Row>, tiberius::error::Error> {
        let stream = self.inner.query(sql, params).await?;
        stream.into_row().await
    }

    /// Executes a statement and returns the total affected row count.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<u64, tiberius::error::Error> {
        let result = self.inner.execute(sql, params).await?;
        Ok(result.total())
    }

    pub async fn begin_transaction(&mut self) -> Result<(), tiberius::error::Error> {
        self.execute("BEGIN TRANSACTION", &[]).await?;
        Ok(())
    }

    pub async fn commit_transaction(&mut self) -> Result<(), tiberius::error::Error> {
        self.execute("COMMIT TRANSACTION", &[]).await?;
        Ok(())
    }

    pub async fn rollback_transaction(&mut self) -> Result<(), tiberius::error::Error> {
        self.execute("ROLLBACK TRANSACTION", &[]).await?;
        Ok(())
    }

    /// Opens a bulk-load request against `table` (which may be a session
    /// temporary table created on this connection).
    pub async fn bulk_insert<'a>(
        &'a mut self,
        table: &'a str,
    ) -> Result<BulkLoadRequest<'a, Compat<TcpStream>>, tiberius::error::Error> {
        self.inner.bulk_insert(table).await
    }
}
