//! Free-form key/value settings

use rusqlite::types::Value;

use super::Database;
use crate::error::Result;

/// Settings store
pub struct SettingsStore<'a> {
    db: &'a Database,
}

impl<'a> SettingsStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load a setting
    pub async fn get(&self, setting: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row(
                "SELECT value FROM settings WHERE setting = ?1",
                vec![Value::from(setting.to_string())],
                |row| row.get::<_, Option<String>>(0),
            )
            .await?;
        Ok(value.flatten())
    }

    /// Save a setting, replacing any previous value
    pub async fn set(&self, setting: &str, value: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO settings (setting, value) VALUES (?1, ?2)
                 ON CONFLICT(setting) DO UPDATE SET value = excluded.value",
                vec![
                    Value::from(setting.to_string()),
                    Value::from(value.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Delete a setting
    pub async fn remove(&self, setting: &str) -> Result<bool> {
        let changed = self
            .db
            .execute(
                "DELETE FROM settings WHERE setting = ?1",
                vec![Value::from(setting.to_string())],
            )
            .await?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settings_save_load() {
        let db = Database::open_in_memory().await.unwrap();
        let store = db.settings();

        assert!(store.get("motd").await.unwrap().is_none());
        store.set("motd", "hello").await.unwrap();
        store.set("motd", "hello again").await.unwrap();
        assert_eq!(store.get("motd").await.unwrap().as_deref(), Some("hello again"));

        assert!(store.remove("motd").await.unwrap());
        assert!(!store.remove("motd").await.unwrap());
        assert!(store.get("motd").await.unwrap().is_none());
    }
}
