/// Persisted race collection: load, merge on race identity, atomic save
use crate::ratings::{RaceIdentity, RaceRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default location of the persisted collection
pub const DEFAULT_RACES_FILE: &str = "races.json";

/// The persisted document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCollection {
    /// Date of the last successful merge
    #[serde(
        rename = "lastUpdated",
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<NaiveDate>,
    /// Races, newest first
    #[serde(default)]
    pub races: Vec<RaceRecord>,
}

impl PersistedCollection {
    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn get(&self, identity: &RaceIdentity) -> Option<&RaceRecord> {
        self.races.iter().find(|race| &race.identity() == identity)
    }
}

/// Read `lastUpdated` as a date when it is one, `None` otherwise.
///
/// Seed files carry `"lastUpdated": ""`; the races must still load.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => return Ok(None),
        Some(value) => value,
    };

    let date = value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    if date.is_none() {
        warn!("Ignoring unreadable lastUpdated value {}", value);
    }
    Ok(date)
}

/// Merge fresh records into an existing collection.
///
/// A fresh record replaces the existing record with the same identity in
/// place; new identities are appended. The result is stably sorted newest
/// first and stamped with `today`.
pub fn merge_races(existing: PersistedCollection, fresh: Vec<RaceRecord>, today: NaiveDate) -> PersistedCollection {
    let mut races: Vec<RaceRecord> = Vec::with_capacity(existing.races.len() + fresh.len());
    let mut index: HashMap<RaceIdentity, usize> = HashMap::new();

    for record in existing.races.into_iter().chain(fresh) {
        let key = record.identity();
        match index.get(&key).copied() {
            Some(position) => {
                debug!("Replacing {} {} ({})", record.date, record.venue, record.category);
                races[position] = record;
            }
            None => {
                index.insert(key, races.len());
                races.push(record);
            }
        }
    }

    races.sort_by(|a, b| b.date.cmp(&a.date));

    PersistedCollection {
        last_updated: Some(today),
        races,
    }
}

/// Serialize a collection exactly as the historical writer did:
/// two-space indent, no trailing newline, non-ASCII escaped
pub fn to_json_string(collection: &PersistedCollection) -> Result<String> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, AsciiPrettyFormatter::new());
    collection.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Pretty formatter that escapes every non-ASCII character as `\uXXXX`
struct AsciiPrettyFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl<'a> AsciiPrettyFormatter<'a> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"  "),
        }
    }
}

impl<'a> Formatter for AsciiPrettyFormatter<'a> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() && c != '\x7f' {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Summary of a persisted collection
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_races: usize,
    pub by_series: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    /// Race count per star rating
    pub by_stars: BTreeMap<u8, usize>,
    pub newest: Option<NaiveDate>,
    pub oldest: Option<NaiveDate>,
    pub last_updated: Option<NaiveDate>,
}

impl CollectionStats {
    pub fn from_collection(collection: &PersistedCollection) -> Self {
        let mut stats = Self {
            total_races: collection.races.len(),
            last_updated: collection.last_updated,
            ..Self::default()
        };

        for race in &collection.races {
            *stats.by_series.entry(race.series.clone()).or_default() += 1;
            *stats.by_category.entry(race.category.clone()).or_default() += 1;
            *stats.by_stars.entry(race.rating).or_default() += 1;
            stats.newest = stats.newest.max(Some(race.date));
            stats.oldest = Some(stats.oldest.map_or(race.date, |d| d.min(race.date)));
        }

        stats
    }
}

/// State of the race file before a merge
#[derive(Debug)]
enum StoredFile {
    Missing,
    Loaded(PersistedCollection),
    Unreadable(anyhow::Error),
}

/// Reads and writes the persisted collection at a fixed path
#[derive(Debug, Clone)]
pub struct RaceStore {
    path: PathBuf,
}

impl RaceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable race file is copied before it gets replaced
    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Load the collection; missing or unreadable files yield an empty one
    pub async fn load(&self) -> PersistedCollection {
        match self.read_stored().await {
            StoredFile::Missing => PersistedCollection::default(),
            StoredFile::Loaded(collection) => collection,
            StoredFile::Unreadable(e) => {
                warn!("Failed to load race file {}, starting fresh: {:#}", self.path.display(), e);
                PersistedCollection::default()
            }
        }
    }

    async fn read_stored(&self) -> StoredFile {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("📭 No existing race file at {}, starting fresh", self.path.display());
                return StoredFile::Missing;
            }
            Err(e) => {
                return StoredFile::Unreadable(anyhow::Error::new(e).context(format!("reading {}", self.path.display())))
            }
        };

        match serde_json::from_str::<PersistedCollection>(&content) {
            Ok(collection) => {
                info!("📚 Loaded {} races from {}", collection.len(), self.path.display());
                StoredFile::Loaded(collection)
            }
            Err(e) => StoredFile::Unreadable(anyhow::Error::new(e).context(format!("parsing {}", self.path.display()))),
        }
    }

    /// Copy an unreadable race file aside so replacing it loses nothing
    async fn back_up_unreadable(&self, error: &anyhow::Error) -> Result<()> {
        let backup = self.backup_path();
        warn!(
            "⚠️ Race file {} is unreadable ({:#}), keeping a copy at {}",
            self.path.display(),
            error,
            backup.display()
        );
        tokio::fs::copy(&self.path, &backup)
            .await
            .with_context(|| format!("backing up {} to {}", self.path.display(), backup.display()))?;
        Ok(())
    }

    /// Write the collection through a temporary file in the same directory.
    ///
    /// The target is only replaced once the new content is fully on disk.
    pub async fn save(&self, collection: &PersistedCollection) -> Result<()> {
        let content = to_json_string(collection)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .context("save task panicked")??;

        info!("💾 Saved {} races to {}", collection.len(), self.path.display());
        Ok(())
    }

    /// Load, merge `fresh` on race identity, stamp with today's date and save.
    ///
    /// An existing file that cannot be read is copied to [`RaceStore::backup_path`]
    /// first; if that copy fails nothing is written.
    pub async fn merge_and_save(&self, fresh: Vec<RaceRecord>) -> Result<PersistedCollection> {
        let today = chrono::Local::now().date_naive();
        self.merge_and_save_on(fresh, today).await
    }

    /// [`RaceStore::merge_and_save`] with an explicit merge date
    pub async fn merge_and_save_on(&self, fresh: Vec<RaceRecord>, today: NaiveDate) -> Result<PersistedCollection> {
        let existing = match self.read_stored().await {
            StoredFile::Missing => PersistedCollection::default(),
            StoredFile::Loaded(collection) => collection,
            StoredFile::Unreadable(e) => {
                self.back_up_unreadable(&e).await?;
                PersistedCollection::default()
            }
        };
        let before = existing.len();
        let fresh_count = fresh.len();

        let merged = merge_races(existing, fresh, today);
        info!(
            "🔀 Merged {} fresh races into {} existing ({} total)",
            fresh_count,
            before,
            merged.len()
        );

        self.save(&merged).await?;
        Ok(merged)
    }

    /// Statistics over the stored collection
    pub async fn stats(&self) -> CollectionStats {
        CollectionStats::from_collection(&self.load().await)
    }
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn race(d: &str, venue: &str, category: &str, rating: u8) -> RaceRecord {
        RaceRecord {
            date: date(d),
            venue: venue.to_string(),
            country: "BEL".to_string(),
            series: "Superprestige".to_string(),
            category: category.to_string(),
            rating,
        }
    }

    fn collection(races: Vec<RaceRecord>) -> PersistedCollection {
        PersistedCollection {
            last_updated: Some(date("2025-01-01")),
            races,
        }
    }

    #[test]
    fn test_merge_overwrites_same_identity() {
        let existing = collection(vec![race("2025-11-01", "Niel", "Elite Men", 2)]);
        let fresh = vec![race("2025-11-01", "Niel", "Elite Men", 5)];

        let merged = merge_races(existing, fresh, date("2025-11-02"));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.races[0].rating, 5);
        assert_eq!(merged.last_updated, Some(date("2025-11-02")));
    }

    #[test]
    fn test_merge_keeps_distinct_categories() {
        let existing = collection(vec![race("2025-11-01", "Niel", "Elite Men", 2)]);
        let fresh = vec![race("2025-11-01", "Niel", "Elite Women", 4)];

        let merged = merge_races(existing, fresh, date("2025-11-02"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let existing = collection(vec![
            race("2025-10-12", "Overijse", "Elite Men", 3),
            race("2025-12-21", "Namur", "Elite Men", 4),
        ]);
        let fresh = vec![
            race("2025-11-01", "Niel", "Elite Men", 2),
            race("2026-01-25", "Hulst", "Elite Women", 5),
        ];

        let merged = merge_races(existing, fresh, date("2026-01-26"));
        assert!(merged.races.windows(2).all(|w| w[0].date >= w[1].date));
        assert_eq!(merged.races[0].venue, "Hulst");
        assert_eq!(merged.races[3].venue, "Overijse");
    }

    #[test]
    fn test_merge_with_nothing_fresh_only_touches_date() {
        let first = merge_races(
            PersistedCollection::default(),
            vec![race("2025-11-01", "Niel", "Elite Men", 2), race("2025-11-01", "Niel", "Elite Women", 3)],
            date("2025-11-02"),
        );
        let second = merge_races(first.clone(), Vec::new(), date("2025-11-02"));
        assert_eq!(first, second);

        let later = merge_races(first.clone(), Vec::new(), date("2025-12-01"));
        assert_eq!(later.races, first.races);
        assert_eq!(later.last_updated, Some(date("2025-12-01")));
    }

    #[test]
    fn test_duplicate_fresh_records_last_wins() {
        let fresh = vec![
            race("2025-11-01", "Niel", "Elite Men", 2),
            race("2025-11-01", "Niel", "Elite Men", 4),
        ];
        let merged = merge_races(PersistedCollection::default(), fresh, date("2025-11-02"));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.races[0].rating, 4);
    }

    #[test]
    fn test_json_layout_matches_historical_writer() {
        let merged = PersistedCollection {
            last_updated: Some(date("2025-11-24")),
            races: vec![RaceRecord {
                date: date("2025-11-23"),
                venue: "Tábor".to_string(),
                country: "".to_string(),
                series: "UCI World Cup".to_string(),
                category: "Elite Men".to_string(),
                rating: 4,
            }],
        };

        let expected = "{\n  \"lastUpdated\": \"2025-11-24\",\n  \"races\": [\n    {\n      \"date\": \"2025-11-23\",\n      \"venue\": \"T\\u00e1bor\",\n      \"country\": \"\",\n      \"series\": \"UCI World Cup\",\n      \"category\": \"Elite Men\",\n      \"rating\": 4\n    }\n  ]\n}";
        assert_eq!(to_json_string(&merged).unwrap(), expected);
    }

    #[test]
    fn test_empty_collection_layout() {
        let empty = PersistedCollection {
            last_updated: Some(date("2025-11-24")),
            races: Vec::new(),
        };
        assert_eq!(
            to_json_string(&empty).unwrap(),
            "{\n  \"lastUpdated\": \"2025-11-24\",\n  \"races\": []\n}"
        );
    }

    #[test]
    fn test_astral_characters_use_surrogate_pairs() {
        let mut record = race("2025-11-01", "Niel 🚲", "Elite Men", 2);
        record.country = "\u{7f}".to_string();
        let json = to_json_string(&collection(vec![record])).unwrap();
        assert!(json.contains("Niel \\ud83d\\udeb2"));
        assert!(json.contains("\\u007f"));

        let back: PersistedCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.races[0].venue, "Niel 🚲");
    }

    #[test]
    fn test_blank_last_updated_keeps_races() {
        let json = r#"{"lastUpdated": "", "races": [{"date": "2025-11-01", "venue": "Niel", "country": "BEL", "series": "Superprestige", "category": "Elite Men", "rating": 2}]}"#;
        let loaded: PersistedCollection = serde_json::from_str(json).unwrap();
        assert_eq!(loaded.last_updated, None);
        assert_eq!(loaded.races, vec![race("2025-11-01", "Niel", "Elite Men", 2)]);

        for value in ["null", "\"yesterday\"", "20251101"] {
            let json = format!(r#"{{"lastUpdated": {}, "races": []}}"#, value);
            let loaded: PersistedCollection = serde_json::from_str(&json).unwrap();
            assert_eq!(loaded.last_updated, None, "lastUpdated {}", value);
        }

        let missing: PersistedCollection = serde_json::from_str(r#"{"races": []}"#).unwrap();
        assert_eq!(missing.last_updated, None);
    }

    #[test]
    fn test_backup_path() {
        let store = RaceStore::new("data/races.json");
        assert_eq!(store.backup_path(), PathBuf::from("data/races.json.bak"));
    }

    #[test]
    fn test_stats() {
        let mut records = vec![
            race("2025-11-01", "Niel", "Elite Men", 2),
            race("2025-11-01", "Niel", "Elite Women", 5),
            race("2025-12-21", "Namur", "Elite Men", 5),
        ];
        records[2].series = "UCI World Cup".to_string();

        let stats = CollectionStats::from_collection(&collection(records));
        assert_eq!(stats.total_races, 3);
        assert_eq!(stats.by_series.get("Superprestige"), Some(&2));
        assert_eq!(stats.by_stars.get(&5), Some(&2));
        assert_eq!(stats.by_category.get("Elite Men"), Some(&2));
        assert_eq!(stats.newest, Some(date("2025-12-21")));
        assert_eq!(stats.oldest, Some(date("2025-11-01")));
    }
}
