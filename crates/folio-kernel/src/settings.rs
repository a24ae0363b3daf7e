//! Generic key/value site settings.
//!
//! One `settings(key, value)` table holds every toggle; new keys need no
//! migration. Values are stored in a canonical text form and callers apply
//! their own defaults and parsing.

use rusqlite::types::ValueRef;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::Kernel;

pub const MAX_KEY_LEN: usize = 100;

/// Canonical defaults inserted on first run. Existing values always win.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("maintenance_mode", "0"),
    ("maintenance_end_time", "null"),
    ("announcement_active", "0"),
    ("announcement_text", ""),
    ("announcement_type", "banner"),
    ("announcement_color", "#333"),
    ("site_title", ""),
    ("meta_description", ""),
    ("meta_keywords", ""),
    ("profile_name", ""),
    ("profile_headline", ""),
    ("profile_about", ""),
    ("resume_link", ""),
    ("social_github", ""),
    ("social_linkedin", ""),
    ("social_instagram", ""),
    ("social_twitter", ""),
];

pub fn default_settings() -> BTreeMap<String, String> {
    DEFAULT_SETTINGS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A value on its way into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Null,
    Json(Value),
}

impl SettingValue {
    /// Text form written to storage: booleans lowercase, numbers as decimal
    /// text, absent values as the `"null"` sentinel.
    pub fn canonical(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(n) => n.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Null => "null".to_string(),
            SettingValue::Json(v) => v.to_string(),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => SettingValue::Text(s.clone()),
            Value::Bool(b) => SettingValue::Bool(*b),
            Value::Null => SettingValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => SettingValue::Int(i),
                None => match n.as_f64() {
                    Some(f) if n.is_f64() => SettingValue::Float(f),
                    // u64 beyond i64::MAX
                    _ => SettingValue::Text(n.to_string()),
                },
            },
            other => SettingValue::Json(other.clone()),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Text(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Text(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v.into())
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<Value> for SettingValue {
    fn from(v: Value) -> Self {
        SettingValue::from_json(&v)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SettingsSnapshot {
    pub values: BTreeMap<String, String>,
    /// Keys present in storage whose value could not be read as text.
    pub skipped: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SetManyOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct SettingsStore {
    kernel: Kernel,
}

impl SettingsStore {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = validate_key(key)?;
        let conn = self.kernel.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key=?1")?;
        let found = stmt
            .query_row(params![key], |row| Ok(value_text(row.get_ref(0)?)))
            .optional()?;
        Ok(found.flatten())
    }

    /// Every readable entry. Unreadable rows are reported, not fatal.
    pub fn get_all(&self) -> StoreResult<SettingsSnapshot> {
        let conn = self.kernel.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let mut rows = stmt.query([])?;
        let mut snap = SettingsSnapshot::default();
        while let Some(row) = rows.next()? {
            let key = match row.get_ref(0)?.as_str() {
                Ok(k) => k.to_string(),
                Err(_) => continue,
            };
            match value_text(row.get_ref(1)?) {
                Some(v) => {
                    snap.values.insert(key, v);
                }
                None => snap.skipped.push(key),
            }
        }
        if !snap.skipped.is_empty() {
            warn!(
                target: "folio::settings",
                skipped = ?snap.skipped,
                "settings rows without a readable value"
            );
        }
        Ok(snap)
    }

    /// Upsert one key and return the canonical text that was stored.
    pub fn set(&self, key: &str, value: impl Into<SettingValue>) -> StoreResult<String> {
        let key = validate_key(key)?;
        let text = value.into().canonical();
        let conn = self.kernel.conn()?;
        upsert(&conn, key, &text)?;
        debug!(target: "folio::settings", key, "setting updated");
        Ok(text)
    }

    /// Upsert each pair on its own. One bad key or failed write does not
    /// undo or block the others.
    pub fn set_many(&self, entries: &[(String, SettingValue)]) -> SetManyOutcome {
        let mut out = SetManyOutcome::default();
        let conn = match self.kernel.conn() {
            Ok(conn) => conn,
            Err(err) => {
                let reason = err.to_string();
                out.failed = entries
                    .iter()
                    .map(|(k, _)| (k.clone(), reason.clone()))
                    .collect();
                return out;
            }
        };
        for (key, value) in entries {
            let res = validate_key(key).and_then(|k| {
                upsert(&conn, k, &value.canonical())?;
                Ok(k.to_string())
            });
            match res {
                Ok(k) => out.updated.push(k),
                Err(err) => {
                    warn!(target: "folio::settings", key = %key, error = %err, "setting write failed");
                    out.failed.push((key.clone(), err.to_string()));
                }
            }
        }
        out
    }

    /// Insert each default only when its key is absent. Returns how many
    /// keys were inserted; running it again inserts nothing.
    pub fn seed_defaults<'a, I>(&self, defaults: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let conn = self.kernel.conn()?;
        let mut stmt = conn.prepare("INSERT OR IGNORE INTO settings(key, value) VALUES (?1, ?2)")?;
        let mut inserted = 0;
        for (key, value) in defaults {
            let key = validate_key(key)?;
            inserted += stmt.execute(params![key, value])?;
        }
        if inserted > 0 {
            debug!(target: "folio::settings", inserted, "seeded default settings");
        }
        Ok(inserted)
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------

    pub async fn get_async(&self, key: &str) -> StoreResult<Option<String>> {
        let s = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || s.get(&key)).await?
    }

    pub async fn get_all_async(&self) -> StoreResult<SettingsSnapshot> {
        let s = self.clone();
        tokio::task::spawn_blocking(move || s.get_all()).await?
    }

    pub async fn set_async(&self, key: &str, value: SettingValue) -> StoreResult<String> {
        let s = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || s.set(&key, value)).await?
    }

    pub async fn set_many_async(
        &self,
        entries: Vec<(String, SettingValue)>,
    ) -> StoreResult<SetManyOutcome> {
        let s = self.clone();
        Ok(tokio::task::spawn_blocking(move || s.set_many(&entries)).await?)
    }

    pub async fn seed_defaults_async(
        &self,
        defaults: BTreeMap<String, String>,
    ) -> StoreResult<usize> {
        let s = self.clone();
        tokio::task::spawn_blocking(move || {
            s.seed_defaults(defaults.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        })
        .await?
    }
}

fn upsert(conn: &rusqlite::Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Keys are stored exactly as given. A blank key, one with leading or
/// trailing whitespace, or one longer than [`MAX_KEY_LEN`] bytes is
/// `InvalidKey`; nothing is silently normalised onto another key.
pub fn validate_key(raw: &str) -> StoreResult<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() != raw.len() || raw.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(raw.to_string()));
    }
    Ok(raw)
}

/// Text view of a stored value. Older releases wrote numbers unquoted and
/// occasionally NULL; numbers are rendered back as text, NULL and non-UTF-8
/// blobs are treated as unreadable.
fn value_text(v: ValueRef<'_>) -> Option<String> {
    match v {
        ValueRef::Text(t) => std::str::from_utf8(t).ok().map(str::to_string),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Blob(b) => std::str::from_utf8(b).ok().map(str::to_string),
        ValueRef::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use serde_json::json;

    #[test]
    fn seeding_is_insert_only_and_idempotent() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        assert_eq!(store.seed_defaults([("hero_video", "on")]).unwrap(), 1);
        assert_eq!(store.get("hero_video").unwrap().as_deref(), Some("on"));

        assert_eq!(store.seed_defaults([("hero_video", "off")]).unwrap(), 0);
        assert_eq!(store.get("hero_video").unwrap().as_deref(), Some("on"));
    }

    #[test]
    fn seeding_never_overwrites_an_empty_string() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("site_title", "").unwrap();
        store.seed_defaults([("site_title", "Portfolio")]).unwrap();
        assert_eq!(store.get("site_title").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn last_write_wins_without_duplicates() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("maintenance_mode", "1").unwrap();
        store.set("maintenance_mode", "0").unwrap();
        assert_eq!(store.get("maintenance_mode").unwrap().as_deref(), Some("0"));

        let conn = kernel.conn().unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM settings WHERE key='maintenance_mode'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn get_all_contains_every_write() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        let snap = store.get_all().unwrap();
        assert_eq!(snap.values.get("a").map(String::as_str), Some("1"));
        assert_eq!(snap.values.get("b").map(String::as_str), Some("2"));
        assert!(snap.skipped.is_empty());
    }

    #[test]
    fn missing_key_is_absent_not_error() {
        let (_dir, kernel) = test_support::migrated_kernel();
        assert_eq!(kernel.settings().get("nope").unwrap(), None);
    }

    #[test]
    fn values_are_coerced_to_canonical_text() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        assert_eq!(store.set("flag", true).unwrap(), "true");
        assert_eq!(store.set("flag_off", false).unwrap(), "false");
        assert_eq!(store.set("count", 42i64).unwrap(), "42");
        assert_eq!(store.set("end", SettingValue::Null).unwrap(), "null");
        assert_eq!(store.get("flag").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn json_values_map_to_natural_text() {
        assert_eq!(SettingValue::from_json(&json!(true)).canonical(), "true");
        assert_eq!(SettingValue::from_json(&json!(7)).canonical(), "7");
        assert_eq!(SettingValue::from_json(&json!(-3)).canonical(), "-3");
        assert_eq!(SettingValue::from_json(&json!(1.5)).canonical(), "1.5");
        assert_eq!(SettingValue::from_json(&json!(null)).canonical(), "null");
        assert_eq!(SettingValue::from_json(&json!("#333")).canonical(), "#333");
        assert_eq!(
            SettingValue::from_json(&json!({"a": [1, 2]})).canonical(),
            r#"{"a":[1,2]}"#
        );
    }

    #[test]
    fn any_key_is_accepted_without_migration() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("brand_new_toggle", "yes").unwrap();
        assert_eq!(
            store.get("brand_new_toggle").unwrap().as_deref(),
            Some("yes")
        );
    }

    #[test]
    fn blank_and_oversized_keys_are_rejected() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        assert!(matches!(
            store.set("   ", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        let long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(store.get(&long), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn padded_key_never_lands_on_the_plain_key() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("site_title", "real").unwrap();
        for padded in [" site_title ", "site_title\t", "\nsite_title"] {
            assert!(matches!(
                store.set(padded, "padded"),
                Err(StoreError::InvalidKey(k)) if k == padded
            ));
            assert!(matches!(store.get(padded), Err(StoreError::InvalidKey(_))));
        }
        let outcome = store.set_many(&[
            (" site_title".to_string(), SettingValue::from("padded")),
            ("hero_count".to_string(), SettingValue::from("3")),
        ]);
        assert_eq!(outcome.updated, vec!["hero_count"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, " site_title");
        assert_eq!(store.get("site_title").unwrap().as_deref(), Some("real"));
        // inner whitespace is part of the key
        store.set("hero title", "x").unwrap();
        assert_eq!(store.get("hero title").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn get_all_skips_unreadable_rows() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store.set("ok", "fine").unwrap();
        let conn = kernel.conn().unwrap();
        conn.execute("INSERT INTO settings(key, value) VALUES ('broken', NULL)", [])
            .unwrap();
        conn.execute("INSERT INTO settings(key, value) VALUES ('legacy_num', 5)", [])
            .unwrap();

        let snap = store.get_all().unwrap();
        assert_eq!(snap.values.get("ok").map(String::as_str), Some("fine"));
        assert_eq!(snap.values.get("legacy_num").map(String::as_str), Some("5"));
        assert_eq!(snap.skipped, vec!["broken".to_string()]);
        assert_eq!(store.get("broken").unwrap(), None);
    }

    #[test]
    fn set_many_reports_per_key_failures() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        let out = store.set_many(&[
            ("announcement_active".into(), SettingValue::Bool(true)),
            ("".into(), SettingValue::Text("x".into())),
            ("announcement_text".into(), SettingValue::Text("Hello".into())),
        ]);
        assert_eq!(out.updated, vec!["announcement_active", "announcement_text"]);
        assert_eq!(out.failed.len(), 1);
        assert_eq!(
            store.get("announcement_active").unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn default_map_declares_maintenance_off() {
        let defaults = default_settings();
        assert_eq!(defaults.get("maintenance_mode").map(String::as_str), Some("0"));
        assert_eq!(defaults.len(), DEFAULT_SETTINGS.len());
    }

    #[tokio::test]
    async fn async_wrappers_round_trip_through_blocking_pool() {
        let (_dir, kernel) = test_support::migrated_kernel();
        let store = kernel.settings();
        store
            .seed_defaults_async(default_settings())
            .await
            .unwrap();
        store
            .set_async("maintenance_mode", SettingValue::Bool(true))
            .await
            .unwrap();
        assert_eq!(
            store.get_async("maintenance_mode").await.unwrap().as_deref(),
            Some("true")
        );
        let snap = store.get_all_async().await.unwrap();
        assert_eq!(snap.values.len(), DEFAULT_SETTINGS.len());
    }
}
