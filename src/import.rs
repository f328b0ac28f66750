//! Loading book documents from NDJSON or JSON-array files.

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use bson::Document as BsonDocument;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Count malformed NDJSON lines instead of failing on the first one. Applies to NDJSON
    /// only: a JSON array is parsed as a whole and a malformed array always fails.
    pub skip_errors: bool,
    /// Log progress every N inserted records.
    pub progress_every: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: u64,
}

fn insert(collection: &Collection, bdoc: BsonDocument, opts: &ImportOptions, report: &mut ImportReport) {
    collection.insert_document(Document::new(bdoc));
    report.inserted += 1;
    if let Some(n) = opts.progress_every {
        if n > 0 && report.inserted % n as u64 == 0 {
            log::info!("imported {} records", report.inserted);
        }
    }
}

/// Reads NDJSON, or a JSON array when the first non-blank character is `[`.
///
/// # Errors
/// I/O errors, a malformed JSON array, or (without `skip_errors`) a malformed line.
pub fn import_reader<R: Read>(
    collection: &Collection,
    reader: R,
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    let mut report = ImportReport::default();
    let mut reader = BufReader::new(reader);
    let array_mode = {
        let buf = reader.fill_buf()?;
        buf.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[')
    };
    if array_mode {
        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        let docs: Vec<BsonDocument> = serde_json::from_str(&s)?;
        for d in docs {
            insert(collection, d, opts, &mut report);
        }
    } else {
        import_lines(collection, reader, opts, &mut report)?;
    }
    log::info!(
        "import into {} done: {} inserted, {} skipped",
        collection.name_str(),
        report.inserted,
        report.skipped
    );
    Ok(report)
}

fn import_lines<R: BufRead>(
    collection: &Collection,
    mut reader: R,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> Result<(), DbError> {
    let mut line_no = 0usize;
    let mut buf = String::with_capacity(8 * 1024);
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BsonDocument>(line) {
            Ok(d) => insert(collection, d, opts, report),
            Err(e) if opts.skip_errors => {
                log::warn!("skipping line {line_no}: {e}");
                report.skipped += 1;
            }
            Err(e) => return Err(DbError::QueryError(format!("line {line_no}: {e}"))),
        }
    }
    Ok(())
}

/// # Errors
/// See [`import_reader`]; also fails if `path` cannot be opened.
pub fn import_file(collection: &Collection, path: &Path, opts: &ImportOptions) -> Result<ImportReport, DbError> {
    let f = std::fs::File::open(path)
        .map_err(|e| DbError::Io(format!("cannot open {}: {e}", path.display())))?;
    import_reader(collection, f, opts)
}
