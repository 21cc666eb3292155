//! Series handles - main API for reading an ordered list of files as one dataset
//!
//! A [`SeriesHandle`] owns the ordered file list and everything derived from it. The
//! derived state, together with the file list it came from, lives in an immutable snapshot
//! that is replaced wholesale on every rebuild; reads already in flight keep the snapshot
//! they started with. Rebuilds are serialized, so a slower rebuild never overwrites the
//! result of one that started after it.

use crate::config::SeriesOptions;
use crate::dimension::SeriesDimension;
use crate::document::SeriesDocument;
use crate::engine::{ArrayEngine, FileHandle, Location};
use crate::error::{NcError, Result};
use crate::types::{Attribute, Dimension, VariableSchema};
use crate::utils::{format_bytes, format_shape};
use crate::variable::SeriesVariable;
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything derived from one version of the file list
#[derive(Debug)]
pub(crate) struct SeriesSnapshot {
    locations: Vec<Location>,
    files: Vec<Arc<FileHandle>>,
    dimensions: Vec<SeriesDimension>,
    variables: Vec<SeriesVariable>,
    incompatibilities: Vec<String>,
}

impl SeriesSnapshot {
    /// The first file; it supplies fixed data and global attributes
    pub(crate) fn root(&self) -> &FileHandle {
        &self.files[0]
    }

    pub(crate) fn file(&self, index: usize) -> Result<&FileHandle> {
        self.files
            .get(index)
            .map(|f| f.as_ref())
            .ok_or_else(|| NcError::OutOfRange(format!("no file at index {}", index)))
    }

    fn growable_dimension(&self) -> Option<&SeriesDimension> {
        self.dimensions.iter().find(|d| d.is_growable())
    }
}

/// Collects schema disagreements according to the compatibility mode
struct Incompatibilities {
    strict: bool,
    found: Vec<String>,
}

impl Incompatibilities {
    fn report(&mut self, message: String) -> Result<()> {
        if self.strict {
            return Err(NcError::ConstructionMismatch(message));
        }
        tracing::warn!(%message, "series incompatibility");
        self.found.push(message);
        Ok(())
    }
}

/// Derive dimensions and variables from already opened files
fn derive_snapshot(
    locations: Vec<Location>,
    files: Vec<Arc<FileHandle>>,
    options: &SeriesOptions,
) -> Result<Arc<SeriesSnapshot>> {
    let root = files
        .first()
        .ok_or_else(|| NcError::ConstructionMismatch("a series needs at least one file".to_string()))?;
    let mut problems = Incompatibilities {
        strict: options.is_strict(),
        found: Vec::new(),
    };

    let mut dimensions = Vec::with_capacity(root.schema().dimensions.len());
    for dimension in &root.schema().dimensions {
        let series_dimension = SeriesDimension::from_files(dimension, &files)?;

        if series_dimension.is_growable() {
            for (file, &length) in files.iter().zip(series_dimension.local_lengths()) {
                if length == 0 {
                    problems.report(format!(
                        "{} holds no records along {}",
                        file.location(),
                        dimension.name
                    ))?;
                }
            }
        } else {
            for file in &files[1..] {
                match file.dimension_length(&dimension.name) {
                    None => problems.report(format!(
                        "{} has no dimension {}",
                        file.location(),
                        dimension.name
                    ))?,
                    Some(length) if length != dimension.length => problems.report(format!(
                        "dimension {} is {} long in {}, {} in the root file",
                        dimension.name,
                        length,
                        file.location(),
                        dimension.length
                    ))?,
                    Some(_) => {}
                }
            }
        }

        dimensions.push(series_dimension);
    }

    let mut variables = Vec::with_capacity(root.schema().variables.len());
    for schema in &root.schema().variables {
        match SeriesVariable::new(schema, &dimensions, &files) {
            Ok(variable) => variables.push(variable),
            Err(NcError::ConstructionMismatch(message)) => problems.report(message)?,
            Err(e) => return Err(e),
        }
    }

    let snapshot = Arc::new_cyclic(|weak| SeriesSnapshot {
        locations,
        files,
        dimensions,
        variables: variables
            .into_iter()
            .map(|v| v.attach(weak.clone()))
            .collect(),
        incompatibilities: problems.found,
    });

    tracing::info!(
        files = snapshot.files.len(),
        dimensions = snapshot.dimensions.len(),
        variables = snapshot.variables.len(),
        records = snapshot.growable_dimension().map(SeriesDimension::len),
        "built series"
    );
    Ok(snapshot)
}

/// Main interface for accessing a multi-file series
pub struct SeriesHandle {
    engine: Arc<dyn ArrayEngine>,
    options: SeriesOptions,
    current: RwLock<Arc<SeriesSnapshot>>,
    rebuild_lock: Mutex<()>,
}

impl SeriesHandle {
    /// Open an ordered list of files as one series
    ///
    /// The order is taken as given; files are never re-sorted by content.
    pub async fn open<I, S>(engine: Arc<dyn ArrayEngine>, locations: I, options: SeriesOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        options.validate()?;
        let locations = parse_locations(locations)?;
        let snapshot = Self::build(engine.as_ref(), locations, &options).await?;

        Ok(Self {
            engine,
            options,
            current: RwLock::new(snapshot),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Open the series listed in a saved series document
    pub async fn open_document(
        engine: Arc<dyn ArrayEngine>,
        path: impl AsRef<Path>,
        options: SeriesOptions,
    ) -> Result<Self> {
        let document = SeriesDocument::load(path).await?;
        Self::open(engine, &document.locations, options).await
    }

    /// Save the ordered file list as a series document
    pub async fn write_document(&self, path: impl AsRef<Path>) -> Result<()> {
        let locations = self
            .locations()
            .iter()
            .map(|l| l.as_str().to_string())
            .collect();
        SeriesDocument::new(locations).save(path).await
    }

    async fn build(
        engine: &dyn ArrayEngine,
        locations: Vec<Location>,
        options: &SeriesOptions,
    ) -> Result<Arc<SeriesSnapshot>> {
        if locations.is_empty() {
            return Err(NcError::ConstructionMismatch(
                "a series needs at least one file".to_string(),
            ));
        }

        let files: Vec<Arc<FileHandle>> = stream::iter(locations.iter().cloned())
            .map(|location| async move { FileHandle::open(engine, location).await.map(Arc::new) })
            .buffered(options.open_concurrency)
            .try_collect()
            .await?;

        derive_snapshot(locations, files, options)
    }

    /// Reopen every file and replace all derived state
    ///
    /// Waits for any rebuild or location change already in progress, then reopens the file
    /// list that is current at that point.
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;
        let locations = self.locations();
        let files = locations.len();
        let snapshot = Self::build(self.engine.as_ref(), locations, &self.options).await?;
        *self.current.write() = snapshot;
        tracing::info!(files, "rebuilt series");
        Ok(())
    }

    /// Switch to a new ordered file list
    ///
    /// On failure the handle keeps its previous files and state.
    pub async fn replace_locations<I, S>(&self, locations: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let locations = parse_locations(locations)?;
        let _guard = self.rebuild_lock.lock().await;
        let snapshot = Self::build(self.engine.as_ref(), locations, &self.options).await?;
        *self.current.write() = snapshot;
        Ok(())
    }

    fn snapshot(&self) -> Arc<SeriesSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    /// The ordered file list
    pub fn locations(&self) -> Vec<Location> {
        self.snapshot().locations.clone()
    }

    pub fn handle_count(&self) -> usize {
        self.snapshot().files.len()
    }

    pub fn files(&self) -> Vec<Arc<FileHandle>> {
        self.snapshot().files.clone()
    }

    pub fn file(&self, index: usize) -> Option<Arc<FileHandle>> {
        self.snapshot().files.get(index).cloned()
    }

    /// The first file of the series
    pub fn root_file(&self) -> Arc<FileHandle> {
        Arc::clone(&self.snapshot().files[0])
    }

    pub fn root_global_attributes(&self) -> Vec<Attribute> {
        self.root_file().schema().global_attributes.clone()
    }

    pub fn root_global_attribute(&self, name: &str) -> Option<Attribute> {
        self.root_file().schema().global_attribute(name).cloned()
    }

    pub fn root_dimensions(&self) -> Vec<Dimension> {
        self.root_file().schema().dimensions.clone()
    }

    pub fn root_variables(&self) -> Vec<VariableSchema> {
        self.root_file().schema().variables.clone()
    }

    /// Root-file variables that do not use the growable dimension
    pub fn root_fixed_variables(&self) -> Vec<VariableSchema> {
        let root = self.root_file();
        let growable = root.schema().growable_dimension().map(|d| d.name.clone());
        root.schema()
            .variables
            .iter()
            .filter(|v| {
                growable
                    .as_ref()
                    .map_or(true, |name| !v.dimension_names.contains(name))
            })
            .cloned()
            .collect()
    }

    pub fn dimensions(&self) -> Vec<SeriesDimension> {
        self.snapshot().dimensions.clone()
    }

    pub fn variables(&self) -> Vec<SeriesVariable> {
        self.snapshot().variables.clone()
    }

    pub fn dimension(&self, name: &str) -> Option<SeriesDimension> {
        self.snapshot()
            .dimensions
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    /// Look up a variable; it stays bound to the current snapshot
    pub fn variable(&self, name: &str) -> Option<SeriesVariable> {
        self.snapshot()
            .variables
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    pub fn growable_dimension(&self) -> Option<SeriesDimension> {
        self.snapshot().growable_dimension().cloned()
    }

    /// Problems tolerated in lenient mode during the last build
    pub fn incompatibilities(&self) -> Vec<String> {
        self.snapshot().incompatibilities.clone()
    }

    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        let records = snapshot
            .growable_dimension()
            .map(|d| format!("{} {} records", d.len(), d.name()))
            .unwrap_or_else(|| "no growable dimension".to_string());
        let bytes: usize = snapshot.variables.iter().map(SeriesVariable::byte_size).sum();
        let lengths: Vec<usize> = snapshot.dimensions.iter().map(SeriesDimension::len).collect();

        format!(
            "Series of {} files: {}, dimensions [{}], {} variables, {}",
            snapshot.files.len(),
            records,
            format_shape(&lengths),
            snapshot.variables.len(),
            format_bytes(bytes)
        )
    }
}

fn parse_locations<I, S>(locations: I) -> Result<Vec<Location>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    locations
        .into_iter()
        .map(|l| Location::parse(l.as_ref()))
        .collect()
}
