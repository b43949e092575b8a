//! 認証 Cookie の保持・永続化・期限管理

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::storage::KeyValueStorage;

/// 認証済みとみなす Cookie 名（判定はヒューリスティック）
pub const AUTH_COOKIE_NAMES: [&str; 6] = ["JSESSIONID", "sessionid", "token", "x-token", "auth", "login"];

/// 保存形式でレコード本体と衝突するため属性としては受け付けない名前
const RESERVED_ATTRIBUTE_NAMES: [&str; 2] = ["value", "timestamp"];

/// Cookie 属性の値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// `Set-Cookie` の属性値を解釈する。空なら真のフラグ
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "" | "true" => AttributeValue::Flag(true),
            "false" => AttributeValue::Flag(false),
            _ => raw
                .parse::<f64>()
                .map(AttributeValue::Number)
                .unwrap_or_else(|_| AttributeValue::Text(raw.to_string())),
        }
    }

    /// 数値として読む（文字列で保存された旧データも受け付ける）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(number) => Some(*number),
            AttributeValue::Text(text) => text.trim().parse().ok(),
            AttributeValue::Flag(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Flag(flag) => write!(f, "{}", flag),
            AttributeValue::Number(number) => write!(f, "{}", number),
            AttributeValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// 属性名（小文字・ハイフン無し）から値へのマップ
pub type CookieAttributes = BTreeMap<String, AttributeValue>;

/// `[("maxage", 3600i64.into()), ("path", "/".into())]` 形式から属性マップを作る
pub fn cookie_attributes<I, K>(pairs: I) -> CookieAttributes
where
    I: IntoIterator<Item = (K, AttributeValue)>,
    K: AsRef<str>,
{
    pairs
        .into_iter()
        .filter_map(|(name, value)| attribute_name(name.as_ref()).map(|name| (name, value)))
        .collect()
}

/// 小文字化してハイフンを除く。空名と予約名は None
fn attribute_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase().replace('-', "");
    if name.is_empty() {
        return None;
    }
    if RESERVED_ATTRIBUTE_NAMES.contains(&name.as_str()) {
        warn!(attribute = %name, "Ignoring reserved cookie attribute name");
        return None;
    }
    Some(name)
}

/// 保存される Cookie 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub value: String,
    #[serde(flatten)]
    pub attributes: CookieAttributes,
    /// 最終更新時刻（エポックミリ秒で保存）
    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl CookieRecord {
    pub fn max_age_seconds(&self) -> Option<f64> {
        self.attributes.get("maxage").and_then(AttributeValue::as_f64)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.attributes
            .get("expires")
            .and_then(AttributeValue::as_text)
            .and_then(parse_cookie_date)
    }

    /// maxage が優先。0 以下は即時失効
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(max_age) = self.max_age_seconds() {
            if max_age <= 0.0 {
                return true;
            }
            let age = now.signed_duration_since(self.timestamp);
            return age > Duration::milliseconds((max_age * 1000.0) as i64);
        }

        match self.expires_at() {
            Some(expires) => now > expires,
            None => false,
        }
    }
}

/// `Expires` 属性の日付を解釈する
fn parse_cookie_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// 認証状態のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub count: usize,
    pub cookies: BTreeMap<String, String>,
    pub header_string: String,
}

/// Cookie マネージャー
///
/// `Arc<CookieManager>` で共有する。内部のロックは await をまたいで保持しない。
pub struct CookieManager {
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    cookies: Mutex<BTreeMap<String, CookieRecord>>,
    /// 変更ごとに増える世代番号（ロック内で採番）
    generation: AtomicU64,
    /// 最後に書き込んだ世代。古いスナップショットで上書きしない
    written: Mutex<u64>,
}

impl fmt::Debug for CookieManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieManager")
            .field("storage_key", &self.storage_key)
            .field("count", &self.len())
            .finish_non_exhaustive()
    }
}

impl CookieManager {
    /// 永続化済みの Cookie を読み込んで作成する。読み込み失敗時は空で開始
    pub fn new(storage: Arc<dyn KeyValueStorage>, storage_key: impl Into<String>) -> Self {
        let storage_key = storage_key.into();
        let cookies = load_cookies(storage.as_ref(), &storage_key);

        Self {
            storage,
            storage_key,
            cookies: Mutex::new(cookies),
            generation: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CookieRecord>> {
        self.cookies.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 追加または置き換え
    pub fn set(&self, name: &str, value: &str, mut attributes: CookieAttributes) {
        drop_reserved(&mut attributes);
        let mut cookies = self.lock();
        cookies.insert(
            name.to_string(),
            CookieRecord {
                value: value.to_string(),
                attributes,
                timestamp: Utc::now(),
            },
        );
        let snapshot = self.snapshot(&cookies);
        drop(cookies);
        self.persist(snapshot);
        debug!(cookie = name, "Cookie set");
    }

    /// 既存レコードの属性に新しい属性を重ねて更新
    pub fn update(&self, name: &str, value: &str, mut attributes: CookieAttributes) {
        drop_reserved(&mut attributes);
        let mut cookies = self.lock();
        let mut merged = cookies
            .get(name)
            .map(|existing| existing.attributes.clone())
            .unwrap_or_default();
        merged.extend(attributes);

        cookies.insert(
            name.to_string(),
            CookieRecord {
                value: value.to_string(),
                attributes: merged,
                timestamp: Utc::now(),
            },
        );
        let snapshot = self.snapshot(&cookies);
        drop(cookies);
        self.persist(snapshot);
        debug!(cookie = name, "Cookie updated");
    }

    /// `Set-Cookie` ヘッダーを取り込み、保存した件数を返す
    pub fn set_from_headers<I, S>(&self, headers: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = Utc::now();
        let parsed: Vec<(String, CookieRecord)> = headers
            .into_iter()
            .filter_map(|header| {
                let header = header.as_ref();
                let parsed = parse_set_cookie(header, now);
                if parsed.is_none() {
                    warn!(header_len = header.len(), "Skipping malformed Set-Cookie header");
                }
                parsed
            })
            .collect();

        if parsed.is_empty() {
            return 0;
        }

        let count = parsed.len();
        let mut cookies = self.lock();
        for (name, record) in parsed {
            debug!(cookie = %name, "Cookie captured from response");
            cookies.insert(name, record);
        }
        let snapshot = self.snapshot(&cookies);
        drop(cookies);
        self.persist(snapshot);
        count
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|record| record.value.clone())
    }

    pub fn record(&self, name: &str) -> Option<CookieRecord> {
        self.lock().get(name).cloned()
    }

    /// 名前から値へのマップ
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(name, record)| (name.clone(), record.value.clone()))
            .collect()
    }

    /// `Cookie` リクエストヘッダー用の文字列
    pub fn to_header_string(&self) -> String {
        header_string(&self.lock())
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut cookies = self.lock();
        let removed = cookies.remove(name).is_some();
        if removed {
            let snapshot = self.snapshot(&cookies);
            drop(cookies);
            self.persist(snapshot);
            debug!(cookie = name, "Cookie removed");
        }
        removed
    }

    pub fn clear(&self) {
        let mut cookies = self.lock();
        cookies.clear();
        let snapshot = self.snapshot(&cookies);
        drop(cookies);
        self.persist(snapshot);
        info!("All cookies cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn has_auth_cookies(&self) -> bool {
        let cookies = self.lock();
        AUTH_COOKIE_NAMES.iter().any(|name| cookies.contains_key(*name))
    }

    pub fn auth_status(&self) -> AuthStatus {
        let cookies = self.lock();
        AuthStatus {
            authenticated: AUTH_COOKIE_NAMES.iter().any(|name| cookies.contains_key(*name)),
            count: cookies.len(),
            cookies: cookies
                .iter()
                .map(|(name, record)| (name.clone(), record.value.clone()))
                .collect(),
            header_string: header_string(&cookies),
        }
    }

    pub fn is_expired(&self, name: &str) -> bool {
        self.is_expired_at(name, Utc::now())
    }

    /// 記録が無ければ失効扱い
    pub fn is_expired_at(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.lock()
            .get(name)
            .map_or(true, |record| record.is_expired_at(now))
    }

    pub fn sweep_expired(&self) -> Vec<String> {
        self.sweep_expired_at(Utc::now())
    }

    /// 失効した Cookie をまとめて削除し、削除した名前を返す
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut cookies = self.lock();
        let expired: Vec<String> = cookies
            .iter()
            .filter(|(_, record)| record.is_expired_at(now))
            .map(|(name, _)| name.clone())
            .collect();

        if expired.is_empty() {
            return expired;
        }

        for name in &expired {
            cookies.remove(name);
        }
        let snapshot = self.snapshot(&cookies);
        drop(cookies);
        self.persist(snapshot);
        info!(removed = ?expired, "Expired cookies swept");
        expired
    }

    /// ロックを保持したまま呼ぶ。書き込みはロック解放後に `persist` で行う
    fn snapshot(&self, cookies: &BTreeMap<String, CookieRecord>) -> Snapshot {
        Snapshot {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            json: serde_json::to_string(cookies).map_err(shared::AppError::from),
        }
    }

    /// 保存失敗はログのみ。メモリ上の状態が正
    fn persist(&self, snapshot: Snapshot) {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.generation <= *written {
            debug!(generation = snapshot.generation, "Skipping stale cookie snapshot");
            return;
        }

        let result = snapshot
            .json
            .and_then(|json| self.storage.set_item(&self.storage_key, &json));
        match result {
            Ok(()) => *written = snapshot.generation,
            Err(e) => warn!(key = %self.storage_key, error = %e, "Failed to persist cookies"),
        }
    }
}

/// 永続化する直列化済みの状態
struct Snapshot {
    generation: u64,
    json: Result<String, shared::AppError>,
}

fn drop_reserved(attributes: &mut CookieAttributes) {
    attributes.retain(|name, _| !RESERVED_ATTRIBUTE_NAMES.contains(&name.as_str()));
}

fn header_string(cookies: &BTreeMap<String, CookieRecord>) -> String {
    cookies
        .iter()
        .map(|(name, record)| format!("{}={}", name, record.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 不正なエントリは読み飛ばす
fn load_cookies(storage: &dyn KeyValueStorage, key: &str) -> BTreeMap<String, CookieRecord> {
    let stored = match storage.get_item(key) {
        Ok(Some(stored)) => stored,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored cookies");
            return BTreeMap::new();
        }
    };

    let entries: serde_json::Map<String, Value> = match serde_json::from_str(&stored) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(key, error = %e, "Stored cookies are not a JSON object");
            return BTreeMap::new();
        }
    };

    let cookies: BTreeMap<String, CookieRecord> = entries
        .into_iter()
        .filter_map(|(name, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some((name, record)),
            Err(e) => {
                warn!(cookie = %name, error = %e, "Skipping unreadable stored cookie");
                None
            }
        })
        .collect();

    info!(count = cookies.len(), "Loaded stored cookies");
    cookies
}

/// `name=value; Attr=val; Flag` を解釈する
fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<(String, CookieRecord)> {
    let mut segments = header.split(';');
    let (name, value) = segments.next()?.trim().split_once('=')?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return None;
    }

    let attributes = segments
        .filter_map(|segment| {
            let segment = segment.trim();
            let (key, raw) = segment.split_once('=').unwrap_or((segment, ""));
            attribute_name(key).map(|key| (key, AttributeValue::parse(raw)))
        })
        .collect();

    Some((
        name.to_string(),
        CookieRecord {
            value: value.to_string(),
            attributes,
            timestamp: now,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn manager() -> (Arc<MemoryStorage>, CookieManager) {
        let storage = Arc::new(MemoryStorage::new());
        let manager = CookieManager::new(storage.clone(), "auth_cookies");
        (storage, manager)
    }

    #[test]
    fn parses_set_cookie_headers() {
        let (_, manager) = manager();
        let stored = manager.set_from_headers([
            "JSESSIONID=abc123; Path=/; HttpOnly",
            "token=a=b==; Max-Age=3600; Secure",
            "broken-header",
            "=novalue",
            "empty=; Path=/",
        ]);

        assert_eq!(stored, 2);
        assert_eq!(manager.get("JSESSIONID").as_deref(), Some("abc123"));
        // 値の中の `=` は保持する
        assert_eq!(manager.get("token").as_deref(), Some("a=b=="));

        let record = manager.record("token").unwrap();
        assert_eq!(record.attributes["maxage"], AttributeValue::Number(3600.0));
        assert_eq!(record.attributes["secure"], AttributeValue::Flag(true));
        let session = manager.record("JSESSIONID").unwrap();
        assert_eq!(session.attributes["path"], AttributeValue::Text("/".into()));
        assert_eq!(session.attributes["httponly"], AttributeValue::Flag(true));
    }

    #[test]
    fn header_string_is_sorted_and_joined() {
        let (_, manager) = manager();
        assert_eq!(manager.to_header_string(), "");
        manager.set("b", "2", CookieAttributes::new());
        manager.set("a", "1", CookieAttributes::new());
        assert_eq!(manager.to_header_string(), "a=1; b=2");
    }

    #[test]
    fn update_merges_attributes() {
        let (_, manager) = manager();
        manager.set(
            "x-token",
            "old",
            cookie_attributes([("Max-Age", 60i64.into()), ("path", "/".into())]),
        );
        manager.update("x-token", "new", cookie_attributes([("maxage", 120i64.into())]));

        let record = manager.record("x-token").unwrap();
        assert_eq!(record.value, "new");
        assert_eq!(record.max_age_seconds(), Some(120.0));
        assert_eq!(record.attributes["path"], AttributeValue::Text("/".into()));
    }

    #[test]
    fn expiry_rules() {
        let (_, manager) = manager();
        let now = Utc::now();

        assert!(manager.is_expired_at("missing", now));

        manager.set("zero", "v", cookie_attributes([("maxage", 0i64.into())]));
        assert!(manager.is_expired_at("zero", now));

        manager.set("hour", "v", cookie_attributes([("maxage", 3600i64.into())]));
        assert!(!manager.is_expired_at("hour", now));
        assert!(manager.is_expired_at("hour", now + Duration::seconds(3601)));

        manager.set(
            "past",
            "v",
            cookie_attributes([("expires", "Wed, 21 Oct 2015 07:28:00 GMT".into())]),
        );
        assert!(manager.is_expired_at("past", now));

        manager.set(
            "future",
            "v",
            cookie_attributes([("expires", "Fri, 01-Jan-2100 00:00:00 GMT".into())]),
        );
        assert!(!manager.is_expired_at("future", now));

        manager.set("session", "v", CookieAttributes::new());
        assert!(!manager.is_expired_at("session", now + Duration::days(365)));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (storage, manager) = manager();
        let now = Utc::now();
        manager.set("keep", "1", cookie_attributes([("maxage", 3600i64.into())]));
        manager.set("drop", "2", cookie_attributes([("maxage", 0i64.into())]));

        let removed = manager.sweep_expired_at(now);
        assert_eq!(removed, vec!["drop".to_string()]);
        assert_eq!(manager.get_all().keys().collect::<Vec<_>>(), vec!["keep"]);

        let persisted = storage.get_item("auth_cookies").unwrap().unwrap();
        assert!(!persisted.contains("drop"));
        assert!(manager.sweep_expired_at(now).is_empty());
    }

    #[test]
    fn auth_status_reports_known_cookie_names() {
        let (_, manager) = manager();
        assert!(!manager.auth_status().authenticated);

        manager.set("loginStatus", "success", CookieAttributes::new());
        assert!(!manager.has_auth_cookies());

        manager.set("x-token", "t", CookieAttributes::new());
        let status = manager.auth_status();
        assert!(status.authenticated);
        assert_eq!(status.count, 2);
        assert_eq!(status.header_string, "loginStatus=success; x-token=t");
    }

    #[test]
    fn cookies_survive_reload() {
        let temp = tempfile::tempdir().unwrap();
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(temp.path()));

        let first = CookieManager::new(storage.clone(), "auth_cookies");
        first.set("JSESSIONID", "abc", cookie_attributes([("path", "/".into())]));
        first.set("tmp", "x", CookieAttributes::new());
        assert!(first.remove("tmp"));
        assert!(!first.remove("tmp"));

        let second = CookieManager::new(storage, "auth_cookies");
        assert_eq!(second.get("JSESSIONID").as_deref(), Some("abc"));
        assert_eq!(second.len(), 1);

        second.clear();
        assert!(second.is_empty());
    }

    #[test]
    fn unreadable_storage_starts_empty_and_skips_bad_entries() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("broken", "not json").unwrap();
        assert!(CookieManager::new(storage.clone(), "broken").is_empty());

        storage
            .set_item(
                "mixed",
                r#"{"good":{"value":"1","maxage":"3600","timestamp":1700000000000},"bad":{"nope":true}}"#,
            )
            .unwrap();
        let manager = CookieManager::new(storage, "mixed");
        assert_eq!(manager.len(), 1);
        // 旧形式の文字列 maxage も数値として扱う
        assert_eq!(manager.record("good").unwrap().max_age_seconds(), Some(3600.0));
    }

    #[test]
    fn reserved_attribute_names_cannot_replace_value_after_reload() {
        let temp = tempfile::tempdir().unwrap();
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(temp.path()));

        let first = CookieManager::new(storage.clone(), "auth_cookies");
        assert_eq!(first.set_from_headers(["a=1; Path=/; Value=x; Timestamp=5"]), 1);
        let record = first.record("a").unwrap();
        assert!(!record.attributes.contains_key("value"));
        assert!(!record.attributes.contains_key("timestamp"));

        let second = CookieManager::new(storage, "auth_cookies");
        assert_eq!(second.get("a").as_deref(), Some("1"));
        assert_eq!(
            second.record("a").unwrap().attributes["path"],
            AttributeValue::Text("/".into())
        );

        let attributes = cookie_attributes([("Value", "x".into()), ("path", "/".into())]);
        assert_eq!(attributes.len(), 1);

        let mut raw = CookieAttributes::new();
        raw.insert("value".to_string(), "x".into());
        second.set("b", "2", raw);
        assert!(second.record("b").unwrap().attributes.is_empty());
    }

    /// 書き込み時にジャーのロックが取れるかを記録するストレージ
    #[derive(Default)]
    struct LockObservingStorage {
        inner: MemoryStorage,
        manager: Mutex<Option<std::sync::Weak<CookieManager>>>,
        lock_free: Mutex<Vec<bool>>,
    }

    impl KeyValueStorage for LockObservingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, shared::AppError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), shared::AppError> {
            let manager = self.manager.lock().unwrap().as_ref().and_then(|weak| weak.upgrade());
            if let Some(manager) = manager {
                let free = manager.cookies.try_lock().is_ok();
                self.lock_free.lock().unwrap().push(free);
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), shared::AppError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn storage_is_written_after_the_jar_lock_is_released() {
        let storage = Arc::new(LockObservingStorage::default());
        let manager = Arc::new(CookieManager::new(storage.clone(), "auth_cookies"));
        *storage.manager.lock().unwrap() = Some(Arc::downgrade(&manager));

        manager.set("a", "1", CookieAttributes::new());
        manager.update("a", "2", CookieAttributes::new());
        manager.set_from_headers(["b=1; Max-Age=0"]);
        manager.sweep_expired();
        manager.remove("a");
        manager.clear();

        let observed = storage.lock_free.lock().unwrap().clone();
        assert_eq!(observed.len(), 6);
        assert!(observed.iter().all(|free| *free));
    }

    #[test]
    fn stale_snapshot_does_not_overwrite_newer_state() {
        let (storage, manager) = manager();
        manager.set("a", "1", CookieAttributes::new());
        manager.set("b", "2", CookieAttributes::new());

        manager.persist(Snapshot {
            generation: 1,
            json: Ok("{}".to_string()),
        });

        let stored = storage.get_item("auth_cookies").unwrap().unwrap();
        assert!(stored.contains("\"b\""));
    }
}
