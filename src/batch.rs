//! Enrichment of an existing lead CSV.
//!
//! Rows are read as [`LeadRow`]s and rebuilt into profiles. Each profile gets
//! its missing Wikipedia page looked up and a fresh summary, then goes to a
//! [`LeadSink`]. Emails are kept as they are. A row whose `Name|email` key
//! already appears in the output was handled by an earlier run and is skipped,
//! so an interrupted batch resumes where it stopped.

use crate::assembler::{LeadSink, Partition};
use crate::error::{OptionExt, Result};
use crate::normalize::fold_for_matching;
use crate::profile::{CandidateProfile, LeadRow, Resolution};
use crate::resolver::CandidateResolver;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// How much of the input to take on
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Upper bound on rows enriched this run, counted after resume filtering
    pub max_entries: Option<usize>,
    /// Ignore rows already present in the output
    pub force: bool,
}

/// Counters of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub read: usize,
    pub already_processed: usize,
    pub repeated: usize,
    pub unknown: usize,
    pub enriched: usize,
    pub written: usize,
    pub duplicates: usize,
    pub write_errors: usize,
}

/// Resume key of a lead: folded name and normalized email cell.
pub fn resume_key(name: &str, email_cell: &str) -> String {
    format!(
        "{}|{}",
        fold_for_matching(name),
        Resolution::from_cell(email_cell).email_cell().to_lowercase()
    )
}

/// Read every row of a lead CSV. Extra columns are ignored.
pub fn read_lead_rows(path: &Path) -> Result<Vec<LeadRow>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    reader
        .headers()?
        .iter()
        .position(|h| h.trim() == LeadRow::HEADER[0])
        .ok_or_parse(&format!("{} has no Name column", path.display()))?;

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<LeadRow>, _>>()?;
    debug!(path = %path.display(), rows = rows.len(), "Read lead rows");
    Ok(rows)
}

/// Resume keys of everything the sink has already written.
pub fn processed_keys(sink: &LeadSink) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();
    for partition in Partition::ALL {
        let path = sink.path(partition);
        if !path.exists() {
            continue;
        }
        for row in read_lead_rows(&path)? {
            keys.insert(resume_key(&row.name, &row.email));
        }
    }
    Ok(keys)
}

/// Rows left to enrich.
#[derive(Debug, Default)]
pub struct Pending {
    pub rows: Vec<LeadRow>,
    pub already_processed: usize,
    pub repeated: usize,
}

/// Drop processed rows and repeats of the same lead, then cap at `max_entries`.
pub fn select_pending(
    rows: Vec<LeadRow>,
    processed: &HashSet<String>,
    max_entries: Option<usize>,
) -> Pending {
    let mut pending = Pending::default();
    let mut seen = HashSet::new();

    for row in rows {
        if processed.contains(&resume_key(&row.name, &row.email)) {
            pending.already_processed += 1;
        } else if !seen.insert(row.dedup_key()) {
            pending.repeated += 1;
        } else {
            pending.rows.push(row);
        }
    }

    if let Some(max) = max_entries {
        pending.rows.truncate(max);
    }
    pending
}

/// Enrich the rows of `input` into `sink`.
pub async fn enrich_csv(
    resolver: &CandidateResolver,
    input: &Path,
    sink: &mut LeadSink,
    options: BatchOptions,
) -> Result<BatchStats> {
    let rows = read_lead_rows(input)?;
    let processed = if options.force {
        HashSet::new()
    } else {
        processed_keys(sink)?
    };

    let mut stats = BatchStats {
        read: rows.len(),
        ..Default::default()
    };
    let pending = select_pending(rows, &processed, options.max_entries);
    stats.already_processed = pending.already_processed;
    stats.repeated = pending.repeated;
    info!(
        input = %input.display(),
        pending = pending.rows.len(),
        skipped = stats.already_processed,
        "Starting batch enrichment"
    );

    let total = pending.rows.len();
    for (i, row) in pending.rows.iter().enumerate() {
        let mut profile = CandidateProfile::from_row(row);
        if profile.is_unknown() {
            warn!(row = i + 1, raw = %row.name, "Row has no usable name, skipped");
            stats.unknown += 1;
            continue;
        }

        info!(name = %profile.name, row = i + 1, total = total, "Enriching lead");
        resolver.refresh(&mut profile).await;
        stats.enriched += 1;

        match sink.append(&profile) {
            Ok(Some(_)) => stats.written += 1,
            Ok(None) => stats.duplicates += 1,
            Err(e) => {
                stats.write_errors += 1;
                warn!(name = %profile.name, error = %e, "Failed to write lead");
            }
        }
    }

    Ok(stats)
}
