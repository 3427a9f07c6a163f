//! Partitioned, deduplicated CSV output.
//!
//! Every resolved profile lands in exactly one of three files, decided by its
//! field state at write time. A [`DedupIndex`] built from all three files at
//! start-up keeps re-runs from appending a lead twice.

use crate::error::Result;
use crate::profile::{dedup_key, CandidateProfile, LeadRow};
use csv::StringRecord;
use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const WITH_WIKIPEDIA_FILE: &str = "qualified_scholar_profiles_with_wikipedia.csv";
pub const WITHOUT_WIKIPEDIA_FILE: &str = "qualified_scholar_profiles_without_wikipedia.csv";
pub const WITHOUT_EMAIL_FILE: &str = "without_email.csv";

/// Output file a profile belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    WithWikipedia,
    WithoutWikipedia,
    WithoutEmail,
}

impl Partition {
    pub const ALL: [Partition; 3] = [
        Partition::WithWikipedia,
        Partition::WithoutWikipedia,
        Partition::WithoutEmail,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Partition::WithWikipedia => WITH_WIKIPEDIA_FILE,
            Partition::WithoutWikipedia => WITHOUT_WIKIPEDIA_FILE,
            Partition::WithoutEmail => WITHOUT_EMAIL_FILE,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Partition::WithWikipedia => "with Wikipedia",
            Partition::WithoutWikipedia => "without Wikipedia",
            Partition::WithoutEmail => "without email",
        };
        f.write_str(label)
    }
}

/// Email missing wins over everything; then Wikipedia presence decides.
pub fn partition_of(profile: &CandidateProfile) -> Partition {
    if !profile.has_email() {
        Partition::WithoutEmail
    } else if profile.has_wikipedia() {
        Partition::WithWikipedia
    } else {
        Partition::WithoutWikipedia
    }
}

/// The three output paths inside `dir`
pub fn output_paths(dir: &Path) -> Vec<PathBuf> {
    Partition::ALL.iter().map(|p| dir.join(p.file_name())).collect()
}

/// Column positions of the fields that make up the dedup key
struct KeyColumns {
    name: usize,
    wikipedia: Option<usize>,
    email: Option<usize>,
}

impl KeyColumns {
    fn from_headers(headers: &StringRecord) -> Option<Self> {
        let find = |wanted: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(wanted));
        Some(Self {
            name: find("name")?,
            wikipedia: find("wikipedia_url"),
            email: find("email"),
        })
    }

    fn key(&self, record: &StringRecord) -> (String, String) {
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or_default();
        dedup_key(cell(Some(self.name)), cell(self.wikipedia), cell(self.email))
    }
}

/// Keys of every lead already written
#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: HashSet<(String, String)>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &(String, String)) -> bool {
        self.keys.contains(key)
    }

    /// Returns false when the key was already present.
    pub fn insert(&mut self, key: (String, String)) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add the keys of an existing CSV. A missing file adds nothing.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let Some(columns) = KeyColumns::from_headers(reader.headers()?) else {
            warn!(path = %path.display(), "CSV has no Name column, skipped");
            return Ok(0);
        };

        let mut added = 0;
        for record in reader.records() {
            if self.insert(columns.key(&record?)) {
                added += 1;
            }
        }
        debug!(path = %path.display(), keys = added, "Indexed existing leads");
        Ok(added)
    }
}

/// Profiles grouped by output file
#[derive(Debug, Default)]
pub struct Partitions {
    pub with_wiki: Vec<CandidateProfile>,
    pub without_wiki: Vec<CandidateProfile>,
    pub without_email: Vec<CandidateProfile>,
}

impl Partitions {
    pub fn get(&self, partition: Partition) -> &[CandidateProfile] {
        match partition {
            Partition::WithWikipedia => &self.with_wiki,
            Partition::WithoutWikipedia => &self.without_wiki,
            Partition::WithoutEmail => &self.without_email,
        }
    }

    pub fn len(&self) -> usize {
        self.with_wiki.len() + self.without_wiki.len() + self.without_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split profiles into partitions, dropping any whose key is already indexed.
///
/// Accepted keys are added to `index`, so duplicates within the batch are
/// dropped too.
pub fn assemble_and_partition(profiles: Vec<CandidateProfile>, index: &mut DedupIndex) -> Partitions {
    let mut partitions = Partitions::default();

    for profile in profiles {
        let key = profile.dedup_key();
        if !index.insert(key.clone()) {
            info!(name = %profile.name, key = ?key, "Skipping duplicate lead");
            continue;
        }
        match partition_of(&profile) {
            Partition::WithWikipedia => partitions.with_wiki.push(profile),
            Partition::WithoutWikipedia => partitions.without_wiki.push(profile),
            Partition::WithoutEmail => partitions.without_email.push(profile),
        }
    }

    partitions
}

/// Append-only writer over the three partition files
pub struct LeadSink {
    dir: PathBuf,
    index: DedupIndex,
}

impl LeadSink {
    /// Create the output directory if needed and index every existing row.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut index = DedupIndex::new();
        for path in output_paths(dir) {
            index.load_file(&path)?;
        }
        info!(dir = %dir.display(), existing = index.len(), "Opened lead output");
        Ok(Self {
            dir: dir.to_path_buf(),
            index,
        })
    }

    /// Open without indexing existing rows, so leads already on disk are
    /// written again.
    pub fn open_unindexed(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            index: DedupIndex::new(),
        })
    }

    pub fn path(&self, partition: Partition) -> PathBuf {
        self.dir.join(partition.file_name())
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }

    /// Write one profile right away. Returns `None` for a duplicate.
    pub fn append(&mut self, profile: &CandidateProfile) -> Result<Option<Partition>> {
        let key = profile.dedup_key();
        if self.index.contains(&key) {
            info!(name = %profile.name, key = ?key, "Skipping duplicate lead");
            return Ok(None);
        }

        let partition = partition_of(profile);
        append_row(&self.path(partition), &profile.to_row())?;
        self.index.insert(key);
        debug!(name = %profile.name, partition = %partition, "Appended lead");
        Ok(Some(partition))
    }
}

fn append_row(path: &Path, row: &LeadRow) -> Result<()> {
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(LeadRow::HEADER)?;
    }
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Rewrite a CSV in place keeping the first row per key.
///
/// Every column is preserved. Returns the number of rows removed; a missing
/// file removes nothing.
pub fn dedup_file(path: &Path) -> Result<usize> {
    if !path.exists() {
        debug!(path = %path.display(), "File does not exist, skipping");
        return Ok(0);
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let Some(columns) = KeyColumns::from_headers(&headers) else {
        warn!(path = %path.display(), "CSV has no Name column, skipped");
        return Ok(0);
    };

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut removed = 0;
    for record in reader.records() {
        let record = record?;
        let key = columns.key(&record);
        if seen.insert(key.clone()) {
            unique.push(record);
        } else {
            debug!(key = ?key, "Removing duplicate row");
            removed += 1;
        }
    }
    drop(reader);

    if removed > 0 {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record(&headers)?;
        for record in &unique {
            writer.write_record(record)?;
        }
        writer.flush()?;
        info!(path = %path.display(), removed = removed, "Removed duplicates");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Resolution;

    fn profile(name: &str, email: Option<&str>, wiki: Option<&str>) -> CandidateProfile {
        CandidateProfile {
            name: name.to_string(),
            email: email
                .map(|e| Resolution::Found(e.to_string()))
                .unwrap_or(Resolution::NotFound),
            wikipedia_url: wiki
                .map(|w| Resolution::Found(w.to_string()))
                .unwrap_or(Resolution::NotFound),
            summary: "Geneticist".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_partition_of() {
        let wiki = Some("https://en.wikipedia.org/wiki/George_Church");
        assert_eq!(
            partition_of(&profile("George Church", Some("gc@harvard.edu"), wiki)),
            Partition::WithWikipedia
        );
        assert_eq!(
            partition_of(&profile("Jane Doe", Some("jd@harvard.edu"), None)),
            Partition::WithoutWikipedia
        );
        assert_eq!(partition_of(&profile("George Church", None, wiki)), Partition::WithoutEmail);

        let mut errored = profile("Jane Doe", None, None);
        errored.email = Resolution::Error;
        assert_eq!(partition_of(&errored), Partition::WithoutEmail);
    }

    #[test]
    fn test_assemble_and_partition() {
        let wiki = Some("https://en.wikipedia.org/wiki/George_Church");
        let mut index = DedupIndex::new();
        index.insert(("known person".to_string(), "known@harvard.edu".to_string()));

        let profiles = vec![
            profile("George Church", Some("gc@harvard.edu"), wiki),
            profile("george church", Some("other@harvard.edu"), wiki),
            profile("Jane Doe", Some("jd@harvard.edu"), None),
            profile("Known Person", Some("known@harvard.edu"), None),
            profile("Ann Lee", None, None),
        ];
        let partitions = assemble_and_partition(profiles, &mut index);

        assert_eq!(partitions.with_wiki.len(), 1);
        assert_eq!(partitions.without_wiki.len(), 1);
        assert_eq!(partitions.without_email.len(), 1);
        assert_eq!(partitions.len(), 3);
        assert_eq!(index.len(), 4);

        for partition in Partition::ALL {
            for p in partitions.get(partition) {
                assert_eq!(partition_of(p), partition);
            }
        }
    }

    #[test]
    fn test_sink_appends_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let lead = profile("Jane Doe", Some("jd@harvard.edu"), None);

        let mut sink = LeadSink::open(dir.path())?;
        assert_eq!(sink.append(&lead)?, Some(Partition::WithoutWikipedia));
        assert_eq!(sink.append(&lead)?, None);

        let mut reopened = LeadSink::open(dir.path())?;
        assert_eq!(reopened.index().len(), 1);
        assert_eq!(reopened.append(&lead)?, None);

        let content = std::fs::read_to_string(dir.path().join(WITHOUT_WIKIPEDIA_FILE))?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["Name,email,wikipedia_url,info,is_wiki", "Jane Doe,jd@harvard.edu,N/A,Geneticist,0"]);

        let mut unindexed = LeadSink::open_unindexed(dir.path())?;
        assert!(unindexed.index().is_empty());
        assert_eq!(unindexed.append(&lead)?, Some(Partition::WithoutWikipedia));
        let content = std::fs::read_to_string(dir.path().join(WITHOUT_WIKIPEDIA_FILE))?;
        assert_eq!(content.lines().count(), 3);
        Ok(())
    }

    #[test]
    fn test_header_written_to_empty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(WITHOUT_EMAIL_FILE), "")?;

        let mut sink = LeadSink::open(dir.path())?;
        sink.append(&profile("Ann Lee", None, None))?;

        let content = std::fs::read_to_string(sink.path(Partition::WithoutEmail))?;
        assert!(content.starts_with("Name,email,wikipedia_url,info,is_wiki\n"));
        assert_eq!(content.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn test_dedup_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("leads.csv");
        std::fs::write(
            &path,
            "Name,email,wikipedia_url,info,is_wiki,notes\n\
             George Church,gc@harvard.edu,https://en.wikipedia.org/wiki/George_Church,a,1,first\n\
             GEORGE CHURCH,other@harvard.edu,https://en.wikipedia.org/wiki/George_Church,b,1,second\n\
             Jane Doe,jd@harvard.edu,N/A,c,0,third\n\
             Jane Doe,JD@harvard.edu ,n/a,d,0,fourth\n\
             Jane Doe,jane@mit.edu,N/A,e,0,fifth\n",
        )?;

        assert_eq!(dedup_file(&path)?, 2);
        let content = std::fs::read_to_string(&path)?;
        assert!(content.starts_with("Name,email,wikipedia_url,info,is_wiki,notes\n"));
        assert!(content.contains("first"));
        assert!(!content.contains("second"));
        assert!(content.contains("third"));
        assert!(!content.contains("fourth"));
        assert!(content.contains("fifth"));

        assert_eq!(dedup_file(&path)?, 0);
        assert_eq!(dedup_file(&dir.path().join("missing.csv"))?, 0);
        Ok(())
    }
}
