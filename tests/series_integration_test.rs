//! Integration tests reading multi-file series end to end
//!
//! Series are assembled from in-memory files, snapshot files on disk, and a wrapping
//! engine that injects read failures.

use async_trait::async_trait;
use bytes::Bytes;
use ncseries::{
    engine::ENOENT, snapshot::write_snapshot, types::decode_elements, ArrayEngine, Codec,
    DataFile, DataType, Dimension, FileSchema, Location, MemoryEngine, MemoryFile, NcError,
    SeriesHandle, SeriesOptions, SnapshotEngine, Value, VariableSchema,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn int_bytes(values: impl IntoIterator<Item = i32>) -> Vec<u8> {
    values.into_iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn ints(bytes: &[u8]) -> Vec<i32> {
    decode_elements(DataType::Int, bytes).unwrap()
}

/// 1-D record file holding `first..first + records`
fn counter_file(first: i32, records: usize) -> MemoryFile {
    MemoryFile::new()
        .with_dimension(Dimension::growable("time", records))
        .with_variable(
            VariableSchema::new("counter", DataType::Int, &["time"]),
            int_bytes(first..first + records as i32),
        )
        .unwrap()
}

/// 3-D record file: value = global_record * 100 + row * 10 + col
fn grid_file(first_record: usize, records: usize) -> MemoryFile {
    let mut values = Vec::new();
    for t in first_record..first_record + records {
        for row in 0..2 {
            for col in 0..3 {
                values.push((t * 100 + row * 10 + col) as i32);
            }
        }
    }
    let times: Vec<u8> = (first_record..first_record + records)
        .flat_map(|t| (t as f64 * 0.5).to_ne_bytes())
        .collect();

    MemoryFile::new()
        .with_dimension(Dimension::growable("time", records))
        .with_dimension(Dimension::new("row", 2))
        .with_dimension(Dimension::new("col", 3))
        .with_variable(VariableSchema::new("time", DataType::Double, &["time"]), times)
        .unwrap()
        .with_variable(
            VariableSchema::new("field", DataType::Int, &["time", "row", "col"]),
            int_bytes(values),
        )
        .unwrap()
}

async fn counter_series() -> (Arc<MemoryEngine>, SeriesHandle) {
    let engine = Arc::new(MemoryEngine::new());
    engine.insert("/s/a.nc", counter_file(0, 2)).unwrap();
    engine.insert("/s/b.nc", counter_file(2, 3)).unwrap();
    engine.insert("/s/c.nc", counter_file(5, 4)).unwrap();

    let series = SeriesHandle::open(
        engine.clone(),
        ["/s/a.nc", "/s/b.nc", "/s/c.nc"],
        SeriesOptions::default(),
    )
    .await
    .unwrap();
    (engine, series)
}

#[tokio::test]
async fn test_read_spans_file_boundaries() {
    let (_engine, series) = counter_series().await;
    let counter = series.variable("counter").unwrap();

    let bytes = counter.read(&[1], &[5]).await.unwrap();
    assert_eq!(ints(&bytes), vec![1, 2, 3, 4, 5]);

    assert_eq!(ints(&counter.read_all().await.unwrap()), (0..9).collect::<Vec<_>>());
    assert_eq!(counter.single_value(&[8]).await.unwrap(), Value::Int(8));
    assert_eq!(counter.string_value(&[4]).await.unwrap(), "4");
}

#[tokio::test]
async fn test_every_range_matches_concatenation() {
    let (_engine, series) = counter_series().await;
    let counter = series.variable("counter").unwrap();

    for start in 0..=9usize {
        for length in 0..=(9 - start) {
            let bytes = counter.read(&[start], &[length]).await.unwrap();
            let expected: Vec<i32> = (start as i32..(start + length) as i32).collect();
            assert_eq!(ints(&bytes), expected, "start {} length {}", start, length);
        }
    }
}

#[tokio::test]
async fn test_out_of_range_requests() {
    let (_engine, series) = counter_series().await;
    let counter = series.variable("counter").unwrap();

    assert!(counter.read(&[0], &[9]).await.is_ok());
    assert!(counter.read(&[8], &[1]).await.is_ok());
    assert!(matches!(
        counter.read(&[8], &[2]).await,
        Err(NcError::OutOfRange(_))
    ));
    assert!(matches!(
        counter.read(&[0, 0], &[1, 1]).await,
        Err(NcError::OutOfRange(_))
    ));
}

#[tokio::test]
async fn test_multidimensional_reads_and_slabs() {
    let engine = Arc::new(MemoryEngine::new());
    engine.insert("/g/1.nc", grid_file(0, 2)).unwrap();
    engine.insert("/g/2.nc", grid_file(2, 1)).unwrap();
    engine.insert("/g/3.nc", grid_file(3, 3)).unwrap();

    let series = SeriesHandle::open(
        engine,
        ["/g/1.nc", "/g/2.nc", "/g/3.nc"],
        SeriesOptions::default(),
    )
    .await
    .unwrap();

    let field = series.variable("field").unwrap();
    assert_eq!(field.shape(), &[6, 2, 3]);
    assert_eq!(field.type_with_dim_description(), "int field(time, row, col)");

    let bytes = field.read(&[1, 1, 1], &[3, 1, 2]).await.unwrap();
    assert_eq!(ints(&bytes), vec![111, 112, 211, 212, 311, 312]);

    let slab = field.read_all_slab().await.unwrap();
    assert_eq!(slab.lengths(), &[6, 2, 3]);
    assert_eq!(slab.value_at(&[4, 1, 2]).unwrap(), Value::Int(412));
    let corner = slab.sub_slab(&[2, 0, 0], &[3, 2, 3]).unwrap();
    assert_eq!(ints(&corner)[..4], [200, 201, 202, 210]);

    let time = series.variable("time").unwrap();
    assert!(time.is_dimension_variable());
    assert_eq!(time.single_value(&[5]).await.unwrap(), Value::Double(2.5));

    let array = field
        .read_slab(&[0, 0, 0], &[6, 2, 3])
        .await
        .unwrap()
        .to_ndarray::<i32>()
        .unwrap();
    assert_eq!(array[[3, 0, 2]], 302);
}

#[tokio::test]
async fn test_growable_axis_must_be_first() {
    let file = MemoryFile::new()
        .with_dimension(Dimension::new("station", 2))
        .with_dimension(Dimension::growable("time", 2))
        .with_variable(
            VariableSchema::new("obs", DataType::Int, &["station", "time"]),
            int_bytes(0..4),
        )
        .unwrap();
    let engine = Arc::new(MemoryEngine::new());
    engine.insert("/late.nc", file).unwrap();

    let err = SeriesHandle::open(engine, ["/late.nc"], SeriesOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, NcError::ConstructionMismatch(_)));
}

#[tokio::test]
async fn test_type_disagreement_is_a_construction_mismatch() {
    let floats = MemoryFile::new()
        .with_dimension(Dimension::growable("time", 1))
        .with_variable(
            VariableSchema::new("counter", DataType::Float, &["time"]),
            1.0f32.to_ne_bytes().to_vec(),
        )
        .unwrap();
    let engine = Arc::new(MemoryEngine::new());
    engine.insert("/a.nc", counter_file(0, 2)).unwrap();
    engine.insert("/b.nc", floats).unwrap();

    let err = SeriesHandle::open(engine, ["/a.nc", "/b.nc"], SeriesOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, NcError::ConstructionMismatch(_)));
}

#[tokio::test]
async fn test_rebuild_picks_up_new_lengths() {
    let (engine, series) = counter_series().await;
    let before = series.growable_dimension().unwrap();
    assert_eq!(before.boundaries(), &[2, 5, 9]);

    engine.insert("/s/b.nc", counter_file(2, 6)).unwrap();
    series.rebuild().await.unwrap();

    let after = series.growable_dimension().unwrap();
    assert_eq!(after.len(), 12);
    assert_eq!(after.local_lengths(), &[2, 6, 4]);
    assert_eq!(after.boundaries(), &[2, 8, 12]);
    assert_eq!(series.variable("counter").unwrap().shape(), &[12]);

    // Dimensions handed out earlier are values and keep the old table
    assert_eq!(before.boundaries(), &[2, 5, 9]);
}

#[tokio::test]
async fn test_variables_detach_after_rebuild() {
    let (_engine, series) = counter_series().await;
    let stale = series.variable("counter").unwrap();
    assert!(stale.read(&[0], &[1]).await.is_ok());

    series.rebuild().await.unwrap();
    assert!(matches!(
        stale.read(&[0], &[1]).await,
        Err(NcError::Detached(_))
    ));

    let fresh = series.variable("counter").unwrap();
    assert!(fresh.read(&[0], &[1]).await.is_ok());

    drop(series);
    assert!(matches!(
        fresh.read_all().await,
        Err(NcError::Detached(_))
    ));
}

#[tokio::test]
async fn test_replace_locations_keeps_state_on_failure() {
    let (_engine, series) = counter_series().await;

    let err = series.replace_locations(["/s/a.nc", "/s/missing.nc"]).await;
    assert_eq!(err.err().unwrap().native_code(), Some(ENOENT));
    assert_eq!(series.handle_count(), 3);

    series.replace_locations(["/s/c.nc", "/s/a.nc"]).await.unwrap();
    assert_eq!(series.handle_count(), 2);
    let counter = series.variable("counter").unwrap();
    // Caller order is kept even though it is not chronological
    assert_eq!(
        ints(&counter.read_all().await.unwrap()),
        vec![5, 6, 7, 8, 0, 1]
    );
}

/// Opens through a [`MemoryEngine`] but fails every read of one location
struct FailingEngine {
    inner: MemoryEngine,
    failing: String,
    reads: Arc<AtomicUsize>,
}

struct FailingFile {
    inner: Box<dyn DataFile>,
    fail: bool,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl DataFile for FailingFile {
    async fn schema(&mut self) -> ncseries::Result<FileSchema> {
        self.inner.schema().await
    }

    async fn read(
        &mut self,
        variable: &str,
        start: &[usize],
        edges: &[usize],
    ) -> ncseries::Result<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NcError::UnderlyingIo {
                code: -101,
                message: "HDF error".to_string(),
            });
        }
        self.inner.read(variable, start, edges).await
    }
}

#[async_trait]
impl ArrayEngine for FailingEngine {
    async fn open(&self, location: &Location) -> ncseries::Result<Box<dyn DataFile>> {
        let inner = self.inner.open(location).await?;
        Ok(Box::new(FailingFile {
            inner,
            fail: location.as_str() == self.failing,
            reads: Arc::clone(&self.reads),
        }))
    }
}

#[tokio::test]
async fn test_first_failed_fragment_aborts_the_read() {
    let inner = MemoryEngine::new();
    inner.insert("/f/a.nc", counter_file(0, 2)).unwrap();
    inner.insert("/f/b.nc", counter_file(2, 3)).unwrap();
    inner.insert("/f/c.nc", counter_file(5, 4)).unwrap();
    let reads = Arc::new(AtomicUsize::new(0));
    let engine = Arc::new(FailingEngine {
        inner,
        failing: "/f/b.nc".to_string(),
        reads: Arc::clone(&reads),
    });

    let series = SeriesHandle::open(
        engine,
        ["/f/a.nc", "/f/b.nc", "/f/c.nc"],
        SeriesOptions::default(),
    )
    .await
    .unwrap();
    let counter = series.variable("counter").unwrap();

    let err = counter.read(&[0], &[9]).await.unwrap_err();
    assert_eq!(err.native_code(), Some(-101));
    // a.nc then b.nc; c.nc is never touched
    assert_eq!(reads.load(Ordering::SeqCst), 2);

    // Ranges that avoid the failing file still work
    assert_eq!(ints(&counter.read(&[5], &[4]).await.unwrap()), vec![5, 6, 7, 8]);
}

#[tokio::test]
async fn test_document_round_trip_recomputes_boundaries() {
    let temp_dir = TempDir::new().unwrap();
    let doc_path = temp_dir.path().join("series.json");
    let (engine, series) = counter_series().await;

    series.write_document(&doc_path).await.unwrap();
    let saved = std::fs::read_to_string(&doc_path).unwrap();
    assert!(!saved.contains("boundaries"));

    engine.insert("/s/c.nc", counter_file(5, 1)).unwrap();
    let reopened = SeriesHandle::open_document(engine, &doc_path, SeriesOptions::default())
        .await
        .unwrap();
    assert_eq!(reopened.locations(), series.locations());
    assert_eq!(reopened.growable_dimension().unwrap().boundaries(), &[2, 5, 6]);
}

#[tokio::test]
async fn test_snapshot_files_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("2001.ncs");
    let second = temp_dir.path().join("2002.ncs");
    write_snapshot(&first, &grid_file(0, 2), Codec::Zstd)
        .await
        .unwrap();
    write_snapshot(&second, &grid_file(2, 2), Codec::Deflate)
        .await
        .unwrap();

    let locations = [
        format!("file://{}", first.display()),
        second.display().to_string(),
    ];
    let series = SeriesHandle::open(
        Arc::new(SnapshotEngine::new()),
        &locations,
        SeriesOptions::default(),
    )
    .await
    .unwrap();

    let field = series.variable("field").unwrap();
    let bytes = field.read(&[1, 0, 0], &[2, 1, 1]).await.unwrap();
    assert_eq!(ints(&bytes), vec![100, 200]);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_series() {
    let (_engine, series) = counter_series().await;
    let series = Arc::new(series);

    let tasks: Vec<_> = (0..8usize)
        .map(|start| {
            let series = Arc::clone(&series);
            tokio::spawn(async move {
                let counter = series.variable("counter").unwrap();
                let bytes = counter.read(&[start], &[1]).await.unwrap();
                ints(&bytes)[0]
            })
        })
        .collect();

    for (start, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), start as i32);
    }
}
