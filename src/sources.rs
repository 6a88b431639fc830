//! The two upstream sources and the concurrent pull over both.
//!
//! The document store is reached through [`DocumentStore`]; the bundled
//! implementation reads a JSON export of the collection. The tabular export
//! is fetched over HTTP or read from disk.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::types::SourceKind;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in the activity collection, as loosely typed JSON.
    async fn fetch_documents(&self) -> AppResult<Vec<Value>>;
}

#[async_trait]
pub trait SheetProvider: Send + Sync {
    /// Raw CSV text of the export, header row included.
    async fn fetch_sheet(&self) -> AppResult<String>;
}

/// Document collection exported to a JSON file.
///
/// Accepts a top-level array, `{"documents": [...]}`, or an object keyed by
/// document id. Keyed exports keep their file order.
#[derive(Debug, Clone)]
pub struct JsonExportStore {
    path: PathBuf,
}

impl JsonExportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn documents_from_json(value: Value) -> AppResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(source_error(SourceKind::DocumentStore, "`documents` is not an array")),
            None => Ok(map.into_iter().map(|(_, doc)| doc).collect()),
        },
        _ => Err(source_error(
            SourceKind::DocumentStore,
            "expected an array or object of documents",
        )),
    }
}

#[async_trait]
impl DocumentStore for JsonExportStore {
    async fn fetch_documents(&self) -> AppResult<Vec<Value>> {
        debug!(path = %self.path.display(), "reading document export");
        let text = tokio::fs::read_to_string(&self.path).await?;
        documents_from_json(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Clone)]
pub enum SheetSource {
    Url { client: reqwest::Client, url: String },
    File(PathBuf),
}

impl SheetSource {
    pub fn url(url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(SheetSource::Url {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SheetProvider for SheetSource {
    async fn fetch_sheet(&self) -> AppResult<String> {
        match self {
            SheetSource::Url { client, url } => {
                debug!(%url, "downloading tabular export");
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            }
            SheetSource::File(path) => {
                debug!(path = %path.display(), "reading tabular export");
                Ok(tokio::fs::read_to_string(path).await?)
            }
        }
    }
}

/// Both sources as configured. A source left unconfigured reports a fetch
/// failure instead of contributing an empty list.
#[derive(Default)]
pub struct Sources {
    pub documents: Option<Box<dyn DocumentStore>>,
    pub sheet: Option<Box<dyn SheetProvider>>,
}

impl Sources {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let sheet: Option<Box<dyn SheetProvider>> = match (&config.sheet_url, &config.sheet_path) {
            (Some(url), _) => Some(Box::new(SheetSource::url(url.clone())?)),
            (None, Some(path)) => Some(Box::new(SheetSource::File(path.clone()))),
            (None, None) => None,
        };
        let documents: Option<Box<dyn DocumentStore>> = config
            .documents_path
            .as_ref()
            .map(|p| Box::new(JsonExportStore::new(p.clone())) as Box<dyn DocumentStore>);
        Ok(Self { documents, sheet })
    }

    /// Pull both sources concurrently and wait for both.
    pub async fn fetch_all(&self) -> (AppResult<Vec<Value>>, AppResult<String>) {
        let documents = async {
            match &self.documents {
                Some(store) => store.fetch_documents().await,
                None => Err(source_error(SourceKind::DocumentStore, "not configured")),
            }
        };
        let sheet = async {
            match &self.sheet {
                Some(provider) => provider.fetch_sheet().await,
                None => Err(source_error(SourceKind::TabularExport, "not configured")),
            }
        };
        tokio::join!(documents, sheet)
    }
}

pub fn source_error(kind: SourceKind, message: impl Into<String>) -> AppError {
    AppError::Source {
        kind,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_the_three_export_shapes() {
        assert_eq!(documents_from_json(json!([{"a": 1}])).unwrap().len(), 1);
        assert_eq!(
            documents_from_json(json!({"documents": [{"a": 1}, {"a": 2}]}))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            documents_from_json(json!({"id1": {"a": 1}, "id2": {"a": 2}}))
                .unwrap()
                .len(),
            2
        );
        assert!(documents_from_json(json!("nope")).is_err());
        assert!(documents_from_json(json!({"documents": 3})).is_err());
    }

    #[test]
    fn keyed_export_keeps_file_order() {
        let value: Value =
            serde_json::from_str(r#"{"zz": {"namaKapal": "MV First"}, "aa": {"namaKapal": "MV Second"}}"#)
                .unwrap();
        let docs = documents_from_json(value).unwrap();
        assert_eq!(docs[0]["namaKapal"], "MV First");
        assert_eq!(docs[1]["namaKapal"], "MV Second");
    }

    #[tokio::test]
    async fn reads_files_for_both_sources() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("laporan.json");
        let sheet = dir.path().join("sheet.csv");
        std::fs::write(&docs, r#"[{"namaKapal": "MV File"}]"#).unwrap();
        std::fs::write(&sheet, "h\nrow\n").unwrap();

        let sources = Sources {
            documents: Some(Box::new(JsonExportStore::new(&docs))),
            sheet: Some(Box::new(SheetSource::File(sheet))),
        };
        let (d, s) = sources.fetch_all().await;
        assert_eq!(d.unwrap()[0]["namaKapal"], "MV File");
        assert_eq!(s.unwrap(), "h\nrow\n");
    }

    #[tokio::test]
    async fn unconfigured_sources_fail_loudly() {
        let (d, s) = Sources::default().fetch_all().await;
        assert!(matches!(
            d,
            Err(AppError::Source {
                kind: SourceKind::DocumentStore,
                ..
            })
        ));
        assert!(matches!(
            s,
            Err(AppError::Source {
                kind: SourceKind::TabularExport,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let store = JsonExportStore::new("/definitely/not/here.json");
        assert!(matches!(store.fetch_documents().await, Err(AppError::Io(_))));
    }
}
