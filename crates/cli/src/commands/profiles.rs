//! Profile store inspection and editing.
//!
//! Uses the same [`ProfileStore`] as the server. Writes take the document's
//! file lock, so they are safe while the server is running.

use std::path::Path;

use tracing::info;

use storynest_core::{ProfileId, ProfileRecord};
use storynest_server::db::ProfileStore;

/// Print every stored PIN, one per line.
///
/// # Errors
///
/// Returns an error if the document cannot be read.
#[allow(clippy::print_stdout)]
pub async fn list(data_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = ProfileStore::open(data_file).await?;
    let ids = store.list_ids().await?;

    info!(path = %data_file.display(), count = ids.len(), "Listing profiles");
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

/// Print the profile stored under `pin` as pretty JSON.
///
/// # Errors
///
/// Returns an error if the PIN is invalid, no profile exists, or the
/// document cannot be read.
#[allow(clippy::print_stdout)]
pub async fn get(data_file: &Path, pin: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = ProfileId::parse(pin)?;
    let store = ProfileStore::open(data_file).await?;

    let record = store
        .get(&id)
        .await?
        .ok_or_else(|| format!("No profile stored under {id}"))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Replace the profile stored under `pin` with the JSON object in `json`.
///
/// # Errors
///
/// Returns an error if the PIN is invalid, `json` is not an object, or the
/// document cannot be written.
pub async fn put(data_file: &Path, pin: &str, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = ProfileId::parse(pin)?;
    let record = parse_record(json)?;

    let store = ProfileStore::open(data_file).await?;
    store.put(&id, record).await?;

    info!(profile_id = %id, path = %data_file.display(), "Profile saved");
    Ok(())
}

fn parse_record(json: &str) -> Result<ProfileRecord, Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    ProfileRecord::from_value(value).ok_or_else(|| "profile data must be a JSON object".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_requires_object() {
        let record = parse_record(r#"{"childName":"Maya"}"#).unwrap();
        assert_eq!(record.get_str("childName"), Some("Maya"));

        assert!(parse_record("[1, 2]").is_err());
        assert!(parse_record("not json").is_err());
    }

    #[tokio::test]
    async fn test_put_then_store_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        put(&path, "4821", r#"{"childName":"Maya","pronouns":"she"}"#)
            .await
            .unwrap();

        let store = ProfileStore::open(&path).await.unwrap();
        let record = store
            .get(&ProfileId::parse("4821").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.get_str("pronouns"), Some("she"));
        assert_eq!(store.list_ids().await.unwrap(), vec!["4821".to_string()]);
    }

    #[tokio::test]
    async fn test_get_missing_profile_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        assert!(get(&path, "0000").await.is_err());
    }
}
