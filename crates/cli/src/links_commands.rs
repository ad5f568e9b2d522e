use {
    anyhow::Result,
    clap::Subcommand,
    mirrorlink_relay::{JsonLinkStore, LinkStore},
};

#[derive(Subcommand)]
pub enum LinksAction {
    /// Print the persisted linked channel IDs, one per line.
    List {
        /// Print the raw JSON array instead.
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_links(action: LinksAction) -> Result<()> {
    let config = mirrorlink_config::discover_and_load();
    let store = JsonLinkStore::new(config.links.resolved_path());
    match action {
        LinksAction::List { json } => {
            print!("{}", list(&store, json).await?);
            Ok(())
        },
    }
}

async fn list(store: &JsonLinkStore, json: bool) -> Result<String> {
    let links = store.load().await?;
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&links)?));
    }
    if links.is_empty() {
        return Ok(format!("No linked channels in {}\n", store.path().display()));
    }
    Ok(links.iter().map(|id| format!("{id}\n")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_ids_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, r#"{"linked_channels":["20","10"]}"#).unwrap();
        let store = JsonLinkStore::new(&path);

        assert_eq!(list(&store, false).await.unwrap(), "20\n10\n");
        let json: serde_json::Value =
            serde_json::from_str(&list(&store, true).await.unwrap()).unwrap();
        assert_eq!(json, serde_json::json!(["20", "10"]));
    }

    #[tokio::test]
    async fn empty_store_says_so() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinkStore::new(dir.path().join("links.json"));
        assert!(
            list(&store, false)
                .await
                .unwrap()
                .starts_with("No linked channels")
        );
    }
}
