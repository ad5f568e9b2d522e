use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    mirrorlink_common::ChannelId,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{Error, Result};

/// Durable storage for the linked channel list.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Read the persisted list. A store that was never written yields an
    /// empty list.
    async fn load(&self) -> Result<Vec<ChannelId>>;

    /// Replace the persisted list.
    async fn save(&self, links: &[ChannelId]) -> Result<()>;
}

/// On-disk shape of the link file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LinkFile {
    linked_channels: Vec<ChannelId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkFileCompat {
    Current(LinkFile),
    /// Plain JSON array, as written by hand.
    Bare(Vec<ChannelId>),
}

/// JSON file-backed link store.
///
/// Writes go to a sibling temp file first and are renamed into place so a
/// crash mid-write never leaves a truncated list behind.
#[derive(Debug, Clone)]
pub struct JsonLinkStore {
    path: PathBuf,
}

impl JsonLinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "links.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LinkStore for JsonLinkStore {
    async fn load(&self) -> Result<Vec<ChannelId>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no link file yet");
                return Ok(Vec::new());
            },
            Err(e) => return Err(Error::persistence("read", e)),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: LinkFileCompat =
            serde_json::from_str(&data).map_err(|e| Error::persistence("parse", e))?;
        let links = match parsed {
            LinkFileCompat::Current(file) => file.linked_channels,
            LinkFileCompat::Bare(links) => links,
        };
        Ok(links)
    }

    async fn save(&self, links: &[ChannelId]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::persistence("create directory", e))?;
        }
        let file = LinkFile {
            linked_channels: links.to_vec(),
        };
        let data =
            serde_json::to_string_pretty(&file).map_err(|e| Error::persistence("serialize", e))?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Error::persistence("write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::persistence("rename", e))?;

        debug!(path = %self.path.display(), count = links.len(), "saved link file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ChannelId> {
        raw.iter().map(|s| ChannelId::from(*s)).collect()
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinkStore::new(dir.path().join("links.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("links.json");
        let store = JsonLinkStore::new(&path);

        store.save(&ids(&["30", "10", "20"])).await.unwrap();

        let reloaded = JsonLinkStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded, ids(&["30", "10", "20"]));
        assert!(!dir.path().join("nested").join("links.json.tmp").exists());
    }

    #[tokio::test]
    async fn accepts_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, r#"["1","2"]"#).unwrap();

        let store = JsonLinkStore::new(&path);
        assert_eq!(store.load().await.unwrap(), ids(&["1", "2"]));
    }

    #[tokio::test]
    async fn malformed_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = JsonLinkStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[tokio::test]
    async fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let store = JsonLinkStore::new(blocker.join("links.json"));
        let err = store.save(&ids(&["1"])).await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
