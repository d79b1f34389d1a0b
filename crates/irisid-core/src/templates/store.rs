use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::templates::model::{
    ensure_valid_features, validate_subject_id, SubjectId, Template,
};

const LABEL_COLUMN: &str = "label";
const FEATURE_COLUMN_PREFIX: &str = "f";

/// Append-only table of enrolled templates.
///
/// Reads may run concurrently; `append` holds exclusive access for its whole
/// read-check-write cycle.
pub trait TemplateStore {
    /// Adds one template. The first template fixes the store dimensionality;
    /// later vectors of another length fail with `DimensionMismatch` and
    /// leave the store untouched. Subjects that cannot be stored as a label
    /// fail with `InvalidSubject` before anything is read or written.
    fn append(&self, features: &[f64], subject: &SubjectId) -> AppResult<()>;

    /// Every template in insertion order.
    fn load_all(&self) -> AppResult<Vec<Template>>;

    fn filter_by_identity(&self, subject: &SubjectId) -> AppResult<Vec<Template>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|template| &template.subject == subject)
            .collect())
    }

    fn is_empty(&self) -> AppResult<bool> {
        Ok(self.load_all()?.is_empty())
    }

    fn dimension(&self) -> AppResult<Option<usize>> {
        Ok(self.load_all()?.first().map(Template::dimension))
    }
}

/// CSV-backed store: one `f1..fD` column per feature plus a `label` column.
#[derive(Debug)]
pub struct CsvTemplateStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl CsvTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateStore for CsvTemplateStore {
    fn append(&self, features: &[f64], subject: &SubjectId) -> AppResult<()> {
        validate_subject_id(subject.as_str())?;
        let found = ensure_valid_features(features)?;
        let _guard = self.lock.write();

        let mut templates = read_template_table(&self.path)?;
        check_dimension(&templates, found)?;
        templates.push(Template {
            features: features.to_vec(),
            subject: subject.clone(),
        });
        write_template_table(&self.path, &templates)?;

        debug!(
            path = %self.path.display(),
            subject = %subject,
            rows = templates.len(),
            "appended template"
        );
        Ok(())
    }

    fn load_all(&self) -> AppResult<Vec<Template>> {
        let _guard = self.lock.read();
        read_template_table(&self.path)
    }
}

/// Process-local store with the same append rules as the CSV table.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<Vec<Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: Vec<Template>) -> AppResult<Self> {
        let store = Self::new();
        for template in templates {
            store.append(&template.features, &template.subject)?;
        }
        Ok(store)
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn append(&self, features: &[f64], subject: &SubjectId) -> AppResult<()> {
        validate_subject_id(subject.as_str())?;
        let found = ensure_valid_features(features)?;
        let mut templates = self.templates.write();
        check_dimension(&templates, found)?;
        templates.push(Template {
            features: features.to_vec(),
            subject: subject.clone(),
        });
        Ok(())
    }

    fn load_all(&self) -> AppResult<Vec<Template>> {
        Ok(self.templates.read().clone())
    }
}

pub fn check_dimension(existing: &[Template], found: usize) -> AppResult<()> {
    match existing.first().map(Template::dimension) {
        Some(expected) if expected != found => {
            Err(AppError::DimensionMismatch { expected, found })
        }
        _ => Ok(()),
    }
}

/// Reads the whole table. A missing or zero-length file is an empty store.
pub fn read_template_table(path: &Path) -> AppResult<Vec<Template>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(unreadable(path, format!("failed to open: {err}"))),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));
    let headers = reader
        .headers()
        .map_err(|err| unreadable(path, format!("invalid header: {err}")))?
        .clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let dimension = parse_header(path, &headers)?;

    let mut templates = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = record.map_err(|err| unreadable(path, format!("row {row}: {err}")))?;
        templates.push(parse_row(path, row, dimension, &headers, &record)?);
    }

    debug!(path = %path.display(), rows = templates.len(), "loaded template table");
    Ok(templates)
}

fn parse_header(path: &Path, headers: &StringRecord) -> AppResult<usize> {
    if headers.len() < 2 {
        return Err(unreadable(
            path,
            format!(
                "expected at least one feature column and a '{LABEL_COLUMN}' column, found {} column(s)",
                headers.len()
            ),
        ));
    }

    let last = headers.get(headers.len() - 1).unwrap_or_default();
    if last.trim() != LABEL_COLUMN {
        return Err(unreadable(
            path,
            format!("last column must be '{LABEL_COLUMN}', found '{last}'"),
        ));
    }

    Ok(headers.len() - 1)
}

fn parse_row(
    path: &Path,
    row: usize,
    dimension: usize,
    headers: &StringRecord,
    record: &StringRecord,
) -> AppResult<Template> {
    if record.len() != dimension + 1 {
        return Err(unreadable(
            path,
            format!(
                "row {row}: expected {} columns, found {}",
                dimension + 1,
                record.len()
            ),
        ));
    }

    let mut features = Vec::with_capacity(dimension);
    for (col, field) in record.iter().take(dimension).enumerate() {
        let value = field
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                unreadable(
                    path,
                    format!(
                        "row {row}, column '{}': '{field}' is not a finite number",
                        headers.get(col).unwrap_or_default()
                    ),
                )
            })?;
        features.push(value);
    }

    let label = record.get(dimension).unwrap_or_default();
    if label.is_empty() {
        return Err(unreadable(path, format!("row {row}: empty {LABEL_COLUMN}")));
    }

    Ok(Template {
        features,
        subject: SubjectId::new(label),
    })
}

/// Rewrites the table through a temporary sibling file that is synced and
/// renamed over `path`.
pub fn write_template_table(path: &Path, templates: &[Template]) -> AppResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::StoreWrite {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let dimension = templates.first().map(Template::dimension).unwrap_or(0);
        let mut writer = csv::Writer::from_writer(BufWriter::new(tmp.as_file_mut()));
        let header = (1..=dimension)
            .map(|idx| format!("{FEATURE_COLUMN_PREFIX}{idx}"))
            .chain(std::iter::once(LABEL_COLUMN.to_string()));
        writer
            .write_record(header)
            .map_err(|err| store_write(path, err))?;
        for template in templates {
            let row = template
                .features
                .iter()
                .map(f64::to_string)
                .chain(std::iter::once(template.subject.to_string()));
            writer
                .write_record(row)
                .map_err(|err| store_write(path, err))?;
        }
        writer.flush().map_err(|source| AppError::StoreWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    tmp.as_file()
        .sync_all()
        .map_err(|source| AppError::StoreWrite {
            path: path.to_path_buf(),
            source,
        })?;

    let file = tmp.persist(path).map_err(|err| AppError::StoreWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file
            .metadata()
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?
            .permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }

    Ok(())
}

fn unreadable(path: &Path, message: String) -> AppError {
    AppError::StoreUnreadable {
        path: path.to_path_buf(),
        message,
    }
}

fn store_write(path: &Path, err: csv::Error) -> AppError {
    AppError::StoreWrite {
        path: path.to_path_buf(),
        source: io::Error::from(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn subject(id: &str) -> SubjectId {
        SubjectId::from(id)
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = CsvTemplateStore::new(tmp.path().join("absent.csv"));
        assert!(store.is_empty().unwrap());
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(store.dimension().unwrap(), None);
    }

    #[test]
    fn append_creates_table_with_generic_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/templates.csv");
        let store = CsvTemplateStore::new(&path);
        store.append(&[0.5, -1.25, 3.0], &subject("7")).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("f1,f2,f3,label"));
        assert_eq!(lines.next(), Some("0.5,-1.25,3,7"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn values_round_trip_exactly() {
        let tmp = TempDir::new().unwrap();
        let store = CsvTemplateStore::new(tmp.path().join("templates.csv"));
        let features = vec![0.1, 1.0 / 3.0, -2.5e10, 1e-300, 0.0];
        store.append(&features, &subject("alice")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![Template::new(features, "alice")]);
    }

    #[test]
    fn rows_keep_insertion_order_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = CsvTemplateStore::new(tmp.path().join("templates.csv"));
        store.append(&[1.0, 0.0], &subject("A")).unwrap();
        store.append(&[0.0, 1.0], &subject("B")).unwrap();
        store.append(&[1.0, 0.0], &subject("A")).unwrap();

        let loaded = store.load_all().unwrap();
        let labels: Vec<&str> = loaded.iter().map(|t| t.subject.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "A"]);
        assert_eq!(store.filter_by_identity(&subject("A")).unwrap().len(), 2);
        assert_eq!(store.dimension().unwrap(), Some(2));
    }

    #[test]
    fn unknown_identity_filters_to_empty() {
        let tmp = TempDir::new().unwrap();
        let store = CsvTemplateStore::new(tmp.path().join("templates.csv"));
        store.append(&[1.0], &subject("A")).unwrap();
        assert!(store.filter_by_identity(&subject("Z")).unwrap().is_empty());
    }

    #[test]
    fn labels_with_separators_are_quoted() {
        let tmp = TempDir::new().unwrap();
        let store = CsvTemplateStore::new(tmp.path().join("templates.csv"));
        let tricky = subject("doe, \"jane\"");
        store.append(&[2.0, 4.0], &tricky).unwrap();

        let loaded = store.filter_by_identity(&tricky).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].subject, tricky);
    }

    #[test]
    fn dimension_mismatch_leaves_table_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        let store = CsvTemplateStore::new(&path);
        store.append(&[1.0, 2.0, 3.0], &subject("A")).unwrap();
        let before = fs::read(&path).unwrap();

        let err = store.append(&[1.0, 2.0], &subject("B")).unwrap_err();
        match err {
            AppError::DimensionMismatch { expected, found } => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn header_only_table_does_not_fix_dimension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,f2,label\n").unwrap();
        let store = CsvTemplateStore::new(&path);
        assert!(store.is_empty().unwrap());

        store.append(&[1.0, 2.0, 3.0, 4.0], &subject("A")).unwrap();
        assert_eq!(store.dimension().unwrap(), Some(4));
    }

    #[test]
    fn zero_length_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "").unwrap();
        assert!(CsvTemplateStore::new(&path).is_empty().unwrap());
    }

    #[test]
    fn empty_subject_is_rejected_and_table_stays_readable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        let store = CsvTemplateStore::new(&path);
        store.append(&[1.0, 2.0], &subject("A")).unwrap();
        let before = fs::read(&path).unwrap();

        let err = store.append(&[3.0, 4.0], &subject("")).unwrap_err();
        assert!(matches!(err, AppError::InvalidSubject { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.load_all().unwrap().len(), 1);
        assert_eq!(store.filter_by_identity(&subject("A")).unwrap().len(), 1);
    }

    #[test]
    fn memory_store_rejects_unstorable_subjects() {
        let store = MemoryTemplateStore::new();
        for bad in ["", " padded", "line\nbreak"] {
            let err = store.append(&[1.0], &subject(bad)).unwrap_err();
            assert!(matches!(err, AppError::InvalidSubject { .. }), "{bad:?}");
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn non_numeric_feature_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,f2,label\n0.1,abc,A\n").unwrap();

        let err = CsvTemplateStore::new(&path).load_all().unwrap_err();
        match err {
            AppError::StoreUnreadable { path: err_path, message } => {
                assert_eq!(err_path, path);
                assert!(message.contains("row 1"), "{message}");
                assert!(message.contains("f2"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ragged_row_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,f2,label\n0.1,0.2,A\n0.3,B\n").unwrap();

        let err = CsvTemplateStore::new(&path).load_all().unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
    }

    #[test]
    fn missing_label_column_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,f2,f3\n0.1,0.2,0.3\n").unwrap();

        let err = CsvTemplateStore::new(&path).load_all().unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
    }

    #[test]
    fn non_finite_cells_are_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,label\nNaN,A\n").unwrap();

        let err = CsvTemplateStore::new(&path).load_all().unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
    }

    #[test]
    fn append_onto_corrupt_table_fails_without_rewriting() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        fs::write(&path, "f1,label\nxyz,A\n").unwrap();

        let err = CsvTemplateStore::new(&path)
            .append(&[1.0], &subject("B"))
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "f1,label\nxyz,A\n");
    }

    #[cfg(unix)]
    #[test]
    fn written_table_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("templates.csv");
        CsvTemplateStore::new(&path)
            .append(&[1.0], &subject("A"))
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_enforces_dimension() {
        let store = MemoryTemplateStore::new();
        store.append(&[1.0, 2.0], &subject("A")).unwrap();
        let err = store.append(&[1.0], &subject("A")).unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 2,
                found: 1
            }
        ));
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_from_templates_rejects_mixed_lengths() {
        let err = MemoryTemplateStore::from_templates(vec![
            Template::new(vec![1.0, 0.0], "A"),
            Template::new(vec![1.0], "B"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { .. }));
    }

    #[test]
    fn append_rejects_invalid_features() {
        let store = MemoryTemplateStore::new();
        assert!(matches!(
            store.append(&[], &subject("A")).unwrap_err(),
            AppError::InvalidFeatures { .. }
        ));
        assert!(store.is_empty().unwrap());
    }
}
