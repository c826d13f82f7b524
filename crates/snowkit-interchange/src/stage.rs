//! Uploading tables to warehouse stages

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use snowkit_connection::ConnectionManager;
use snowkit_core::{Connection, Result, SnowkitError, Table};
use uuid::Uuid;

use crate::csv::{CsvOptions, to_csv};

/// Serialisation used for staged files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Csv,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
        }
    }
}

impl FromStr for FileFormat {
    type Err = SnowkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            other => Err(SnowkitError::NotSupported(format!(
                "file format '{}' (only csv can be staged)",
                other
            ))),
        }
    }
}

/// Compression requested for the staged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Gzip,
    None,
}

impl Compression {
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

impl FromStr for Compression {
    type Err = SnowkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "auto" => Ok(Compression::Gzip),
            "none" => Ok(Compression::None),
            other => Err(SnowkitError::invalid_config(
                "compression",
                format!("expected gzip or none, got '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOptions {
    /// Stage location, e.g. `@my_stage` or `@my_stage/path`
    pub stage: String,
    pub file_format: FileFormat,
    pub compression: Compression,
}

impl StageOptions {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            file_format: FileFormat::default(),
            compression: Compression::default(),
        }
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Upload `table` as a uniquely named file on a stage and return its remote path.
///
/// Streams the bytes when the connector can; otherwise the file is written
/// to a temporary directory and sent with `PUT`. The temporary copy is
/// removed whether or not the upload succeeds.
#[tracing::instrument(skip(manager, table, options), fields(stage = %options.stage, rows = table.row_count()))]
pub async fn stage_table(
    manager: &ConnectionManager,
    table: &Table,
    options: &StageOptions,
) -> Result<String> {
    let file_name = format!("{}.{}", Uuid::new_v4().simple(), options.file_format.extension());
    let stage = options.stage.trim_end_matches('/');
    let remote_path = format!("{}/{}", stage, file_name);
    let data = to_csv(table, &CsvOptions::default()).into_bytes();
    let compress = options.compression.is_compressed();

    let conn = manager.get_connection().await?;

    match conn.upload_stream(data.clone(), &remote_path, compress).await {
        Ok(()) => {
            tracing::info!(remote = %remote_path, bytes = data.len(), "streamed table to stage");
            return Ok(remote_path);
        }
        Err(e) if e.is_not_supported() => {
            tracing::debug!(error = %e, "streaming upload unavailable, falling back to PUT");
        }
        Err(e) => return Err(e),
    }

    put_from_temp_file(conn.as_ref(), &data, &file_name, stage, compress).await?;
    tracing::info!(remote = %remote_path, bytes = data.len(), "uploaded table to stage");
    Ok(remote_path)
}

async fn put_from_temp_file(
    conn: &dyn Connection,
    data: &[u8],
    file_name: &str,
    stage: &str,
    compress: bool,
) -> Result<()> {
    // Dropping the directory removes the file on every path out of here
    let dir = tempfile::Builder::new().prefix("snowkit-stage-").tempdir()?;
    let local_path = dir.path().join(file_name);
    {
        let mut file = std::fs::File::create(&local_path)?;
        file.write_all(data)?;
        file.flush()?;
    }

    let sql = put_statement(&local_path, stage, compress);
    tracing::debug!(sql = %sql, "issuing PUT");
    conn.execute(&sql, None).await?;
    Ok(())
}

/// `PUT` keeps the local file name, so the target is the stage prefix
fn put_statement(local_path: &Path, stage: &str, compress: bool) -> String {
    let local = local_path.to_string_lossy().replace('\\', "/");
    format!(
        "PUT 'file://{}' {} OVERWRITE = TRUE AUTO_COMPRESS = {}",
        local,
        stage,
        if compress { "TRUE" } else { "FALSE" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingConnection, manager_for};
    use pretty_assertions::assert_eq;
    use snowkit_config::SnowflakeConfig;
    use snowkit_core::Value;
    use std::sync::Arc;

    fn table() -> Table {
        Table::from_records(
            ["ID", "NAME"],
            vec![vec![Value::Int64(1), Value::String("a,b".into())]],
        )
    }

    #[test]
    fn test_format_and_compression_parsing() {
        assert_eq!("CSV".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert!("parquet".parse::<FileFormat>().unwrap_err().is_not_supported());
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert!("zstd".parse::<Compression>().is_err());
    }

    #[test]
    fn test_put_statement() {
        let sql = put_statement(Path::new("/tmp/x/abc.csv"), "@raw", false);
        assert_eq!(sql, "PUT 'file:///tmp/x/abc.csv' @raw OVERWRITE = TRUE AUTO_COMPRESS = FALSE");
    }

    #[tokio::test]
    async fn test_streaming_upload() {
        let conn = Arc::new(RecordingConnection::streaming());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());

        let remote = stage_table(&manager, &table(), &StageOptions::new("@raw/"))
            .await
            .unwrap();

        assert!(remote.starts_with("@raw/"));
        assert!(remote.ends_with(".csv"));
        assert_eq!(remote.len(), "@raw/".len() + 32 + ".csv".len());

        let uploads = conn.uploads();
        assert_eq!(uploads.len(), 1);
        let (path, data, compress) = &uploads[0];
        assert_eq!(path, &remote);
        assert_eq!(String::from_utf8_lossy(data), "ID,NAME\n1,\"a,b\"\n");
        assert!(compress);
        assert!(conn.log().is_empty());
    }

    #[tokio::test]
    async fn test_put_fallback_removes_temp_file() {
        let conn = Arc::new(RecordingConnection::default());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());

        let remote = stage_table(
            &manager,
            &table(),
            &StageOptions::new("@raw").compression(Compression::None),
        )
        .await
        .unwrap();

        let log = conn.log();
        assert_eq!(log.len(), 1);
        let put = &log[0];
        assert!(put.starts_with("PUT 'file://"));
        assert!(put.ends_with("' @raw OVERWRITE = TRUE AUTO_COMPRESS = FALSE"));

        let file_name = remote.trim_start_matches("@raw/");
        assert!(put.contains(file_name));

        let local = put
            .trim_start_matches("PUT 'file://")
            .split('\'')
            .next()
            .unwrap();
        assert!(!Path::new(local).exists());
    }

    #[tokio::test]
    async fn test_failed_put_still_removes_temp_file() {
        let conn = Arc::new(RecordingConnection::failing_put());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());

        let err = stage_table(&manager, &table(), &StageOptions::new("@raw"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnowkitError::Query(_)));

        let log = conn.log();
        let local = log[0]
            .trim_start_matches("PUT 'file://")
            .split('\'')
            .next()
            .unwrap()
            .to_string();
        assert!(!Path::new(&local).exists());
    }

    #[tokio::test]
    async fn test_unique_file_names() {
        let conn = Arc::new(RecordingConnection::streaming());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());
        let options = StageOptions::new("@raw");

        let a = stage_table(&manager, &table(), &options).await.unwrap();
        let b = stage_table(&manager, &table(), &options).await.unwrap();
        assert_ne!(a, b);
    }
}
