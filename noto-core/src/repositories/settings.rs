//! Settings repository
//!
//! The settings singleton is stored as one JSON record. Field streams are
//! projections of it and only emit when the projected value changes.

use crate::database::{
    rows, EntityStore, Font, Language, Settings, Subscription, Table, TableSet, Theme,
    VaultTimeout,
};
use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};

#[derive(Clone)]
pub struct SettingsRepository {
    store: EntityStore,
}

impl SettingsRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Stream one field (or any projection) of the settings
    pub async fn watch<T, F>(&self, project: F) -> Result<Subscription<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&Settings) -> T + Send + Sync + Clone + 'static,
    {
        self.store
            .subscribe(TableSet::of(&[Table::Settings]), move |pool| {
                let project = project.clone();
                async move {
                    let mut conn = pool.acquire().await?;
                    let settings = rows::load_settings(&mut conn).await?;
                    Ok(project(&settings))
                }
            })
            .await
    }

    pub async fn theme(&self) -> Result<Subscription<Theme>> {
        self.watch(|s| s.theme).await
    }

    pub async fn font(&self) -> Result<Subscription<Font>> {
        self.watch(|s| s.font).await
    }

    pub async fn language(&self) -> Result<Subscription<Language>> {
        self.watch(|s| s.language).await
    }

    pub async fn vault_passcode(&self) -> Result<Subscription<Option<String>>> {
        self.watch(|s| s.vault_passcode.clone()).await
    }

    pub async fn main_interface_id(&self) -> Result<Subscription<i64>> {
        self.watch(|s| s.main_interface_id).await
    }

    pub async fn read_all(&self) -> Result<Settings> {
        let mut conn = self.store.read().await?;
        rows::load_settings(&mut conn).await
    }

    /// Overwrite the whole settings record
    pub async fn write_all(&self, settings: &Settings) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        rows::store_settings(txn.conn(), settings).await?;
        txn.touch(Table::Settings);
        txn.commit().await
    }

    /// Read-modify-write of the settings in one transaction
    pub async fn update<F>(&self, apply: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings) + Send,
    {
        let mut txn = self.store.begin_write().await?;
        let mut settings = rows::load_settings(txn.conn()).await?;
        apply(&mut settings);
        rows::store_settings(txn.conn(), &settings).await?;
        txn.touch(Table::Settings);
        txn.commit().await?;

        Ok(settings)
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.update(|s| s.theme = theme).await.map(drop)
    }

    pub async fn set_font(&self, font: Font) -> Result<()> {
        self.update(|s| s.font = font).await.map(drop)
    }

    pub async fn set_language(&self, language: Language) -> Result<()> {
        self.update(|s| s.language = language).await.map(drop)
    }

    pub async fn set_show_notes_count(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.is_show_notes_count = enabled).await.map(drop)
    }

    pub async fn set_do_not_disturb(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.is_do_not_disturb = enabled).await.map(drop)
    }

    pub async fn set_screen_on(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.is_screen_on = enabled).await.map(drop)
    }

    pub async fn set_full_screen(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.is_full_screen = enabled).await.map(drop)
    }

    pub async fn set_vault_timeout(&self, timeout: VaultTimeout) -> Result<()> {
        self.update(|s| s.vault_timeout = timeout).await.map(drop)
    }

    pub async fn set_bio_auth_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.is_bio_auth_enabled = enabled).await.map(drop)
    }

    pub async fn set_last_version(&self, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        self.update(|s| s.last_version = version).await.map(drop)
    }

    /// Store only the SHA-256 digest of the passcode
    pub async fn set_vault_passcode(&self, passcode: &str) -> Result<()> {
        if passcode.is_empty() {
            return Err(AppError::InvalidArgument(
                "vault passcode cannot be empty".to_string(),
            ));
        }
        let digest = hash_passcode(passcode);
        self.update(|s| s.vault_passcode = Some(digest)).await.map(drop)
    }

    pub async fn clear_vault_passcode(&self) -> Result<()> {
        self.update(|s| s.vault_passcode = None).await.map(drop)
    }

    pub async fn verify_vault_passcode(&self, passcode: &str) -> Result<bool> {
        let settings = self.read_all().await?;
        Ok(settings.vault_passcode.as_deref() == Some(hash_passcode(passcode).as_str()))
    }

    /// Point the main interface at an existing folder
    pub async fn set_main_interface_id(&self, folder_id: i64) -> Result<()> {
        let mut txn = self.store.begin_write().await?;
        if !rows::folder_exists(txn.conn(), folder_id).await? {
            return Err(AppError::InvalidArgument(format!(
                "folder {} does not exist",
                folder_id
            )));
        }
        let mut settings = rows::load_settings(txn.conn()).await?;
        settings.main_interface_id = folder_id;
        rows::store_settings(txn.conn(), &settings).await?;
        txn.touch(Table::Settings);
        txn.commit().await
    }
}

fn hash_passcode(passcode: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(passcode.as_bytes());
    format!("{:x}", hasher.finalize())
}
