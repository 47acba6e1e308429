use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use burn::data::dataloader::DataLoader;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend as BackendTrait;
use burn_ndarray::NdArray;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

use biam_paragraphs::{
    DatasetConfig, DatasetSplit, FormsSource, LoaderConfig, ParagraphCache, ParagraphVocab,
    ParagraphsDataModule, PipelineConfig, Stage,
};

/// `(id, width, height, transcription json)`
const FORMS: [(&str, u32, u32, &str); 4] = [
    ("a01", 80, 60, r#"{"line": [{"label": "&garb cat"}, {"label": "dog"}]}"#),
    ("a02", 40, 90, r#"{"line": [{"label": "আমি"}, {"polygon": []}]}"#),
    ("b01", 64, 64, r#"{"form": "no lines"}"#),
    ("c01", 50, 20, r#"{"line": [{"label": "x &deg"}]}"#),
];

const LONGEST_LABEL: usize = 13; // "&garb cat\ndog"

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 200) as u8 + 40]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .expect("encode jpeg");
    bytes.into_inner()
}

const SPLITS: [(&str, &str); 3] = [("train", "a02\na01\n"), ("val", "b01\n"), ("test", "c01\n")];

fn write_archive(path: &Path, splits: &[(&str, &str)]) {
    let file = File::create(path).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (id, width, height, json) in FORMS {
        zip.start_file(format!("forms/{id}.jpg"), options)
            .expect("start form");
        zip.write_all(&jpeg_bytes(width, height)).expect("write form");
        zip.start_file(format!("json/{id}.json"), options)
            .expect("start json");
        zip.write_all(json.as_bytes()).expect("write json");
    }

    for (split, ids) in splits {
        zip.start_file(format!("task/{split}_ids.txt"), options)
            .expect("start task");
        zip.write_all(ids.as_bytes()).expect("write task");
    }
    zip.finish().expect("finish archive");
}

fn fixture_with(include_val: bool, max_label_length: usize) -> (TempDir, PipelineConfig) {
    let splits: Vec<_> = SPLITS
        .into_iter()
        .filter(|(split, _)| include_val || *split != "val")
        .collect();
    fixture_with_splits(&splits, max_label_length)
}

fn fixture_with_splits(
    splits: &[(&str, &str)],
    max_label_length: usize,
) -> (TempDir, PipelineConfig) {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("zip").join("B_IAM.zip");
    fs::create_dir_all(archive.parent().expect("parent")).expect("mkdir zip");
    write_archive(&archive, splits);

    let mut dataset = DatasetConfig::new(
        archive,
        dir.path().join("raw").join("B_IAM"),
        dir.path().join("processed").join("B_IAM_paragraphs"),
    );
    dataset.dims.image_height = 100;
    dataset.dims.image_width = 100;
    dataset.dims.max_label_length = max_label_length;

    let config = PipelineConfig {
        dataset,
        loader: LoaderConfig::default(),
    };
    (dir, config)
}

fn fixture() -> (TempDir, PipelineConfig) {
    fixture_with(true, 32)
}

#[test]
fn prepare_writes_cache_layout() {
    let (_dir, config) = fixture();
    let cache = ParagraphCache::new(&config.dataset);

    assert!(cache.prepare().expect("prepare"));

    let cfg = &config.dataset;
    assert!(cfg.properties_path().is_file());
    for split in DatasetSplit::ALL {
        assert!(cfg.labels_path(split).is_file(), "{split} labels missing");
    }
    assert!(cfg.crop_path("a01", DatasetSplit::Train).is_file());
    assert!(cfg.crop_path("b01", DatasetSplit::Val).is_file());
    assert!(cfg.crop_path("c01", DatasetSplit::Test).is_file());
    assert!(!cfg.crop_path("c01", DatasetSplit::Train).exists());

    let labels = fs::read_to_string(cfg.labels_path(DatasetSplit::Train)).expect("labels");
    assert!(labels.contains("আমি"), "non-ascii labels are written verbatim");
}

#[test]
fn second_prepare_is_a_no_op() {
    let (_dir, config) = fixture();
    let cache = ParagraphCache::new(&config.dataset);

    assert!(cache.prepare().expect("first prepare"));
    let first = fs::read(config.dataset.properties_path()).expect("read properties");

    assert!(!cache.prepare().expect("second prepare"));
    let second = fs::read(config.dataset.properties_path()).expect("read properties");
    assert_eq!(first, second);
}

#[test]
fn properties_reflect_downscaled_crops() {
    let (_dir, config) = fixture();
    let cache = ParagraphCache::new(&config.dataset);
    cache.prepare().expect("prepare");

    let forms = cache.form_properties().expect("form properties");
    assert_eq!(forms.len(), FORMS.len());
    assert_eq!(forms["a01"].crop_shape, [30, 40]);
    assert_eq!(forms["a01"].num_lines, 2);
    assert_eq!(forms["b01"].label_length, 0);
    assert_eq!(forms["b01"].num_lines, 1);

    let props = cache.properties().expect("properties");
    assert_eq!(props.crop_shape.max, [45, 40]);
    assert_eq!(props.crop_shape.min, [10, 20]);
    assert_eq!(props.label_length.max, LONGEST_LABEL);
    assert!((props.aspect_ratio.max - 2.5).abs() < 1e-9);
}

#[test]
fn load_returns_id_sorted_aligned_split() {
    let (_dir, config) = fixture();
    let cache = ParagraphCache::new(&config.dataset);
    cache.prepare().expect("prepare");

    let train = cache.load(DatasetSplit::Train).expect("load train");
    assert_eq!(train.ids, vec!["a01", "a02"]);
    assert_eq!(train.crops.len(), train.labels.len());
    assert_eq!(train.labels, vec!["&garb cat\ndog", "আমি\n"]);
    assert_eq!(train.crops[0].dimensions(), (40, 30));
    assert_eq!(train.crops[1].dimensions(), (20, 45));

    let val = cache.load(DatasetSplit::Val).expect("load val");
    assert_eq!(val.labels, vec![""]);
}

#[test]
fn crops_are_inverted() {
    let (_dir, config) = fixture();
    ParagraphCache::new(&config.dataset)
        .prepare()
        .expect("prepare");

    // Source pixels lie in 40..240, so inverted crops stay within 15..215.
    let crop = image::open(config.dataset.crop_path("b01", DatasetSplit::Val))
        .expect("open crop")
        .to_luma8();
    let mean = crop.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / crop.len() as f64;
    assert!(mean > 40.0 && mean < 200.0, "unexpected mean {mean}");
    let source = FormsSource::new(&config.dataset);
    let original = source.load_image("b01").expect("load form");
    assert_eq!(original.dimensions(), (64, 64));
}

#[test]
fn missing_crop_fails_at_load() {
    let (_dir, config) = fixture();
    let cache = ParagraphCache::new(&config.dataset);
    cache.prepare().expect("prepare");
    fs::remove_file(config.dataset.crop_path("a02", DatasetSplit::Train)).expect("remove crop");

    let err = cache.load(DatasetSplit::Train).expect_err("missing crop");
    assert!(format!("{err:#}").contains("a02.png"));
}

#[test]
fn missing_split_file_is_fatal() {
    let (_dir, config) = fixture_with(false, 32);
    let cache = ParagraphCache::new(&config.dataset);

    let err = cache.prepare().expect_err("missing val split");
    assert!(format!("{err:#}").contains("val_ids.txt"));
    assert!(!cache.is_prepared());
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn form_listed_in_two_splits_is_cropped_once_and_reported() {
    let (_dir, config) = fixture_with_splits(
        &[("train", "a01\nc01\na02\n"), ("val", "b01\n"), ("test", "c01\n")],
        32,
    );
    let cache = ParagraphCache::new(&config.dataset);

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, || cache.prepare().expect("prepare"));

    let cfg = &config.dataset;
    assert!(cfg.crop_path("c01", DatasetSplit::Test).is_file());
    assert!(!cfg.crop_path("c01", DatasetSplit::Train).exists());
    assert_eq!(cache.load(DatasetSplit::Train).expect("train").ids, vec!["a01", "a02"]);
    assert_eq!(cache.form_properties().expect("properties").len(), FORMS.len());

    let output = String::from_utf8(logs.0.lock().expect("log buffer").clone()).expect("utf8 logs");
    assert!(output.contains("WARN"), "no warning in {output:?}");
    assert!(output.contains("c01"), "warning does not name the form: {output:?}");
}

#[test]
fn forms_source_summarises_extracted_archive() {
    let (_dir, config) = fixture();
    let source = FormsSource::new(&config.dataset);
    assert!(source.prepare_data().expect("extract"));
    assert!(!source.prepare_data().expect("extract again"));

    assert_eq!(source.all_ids().expect("ids"), vec!["a01", "a02", "b01", "c01"]);
    assert_eq!(source.form_filenames_by_id().expect("forms").len(), 4);

    let summary = source.summary().expect("summary");
    assert_eq!(summary.total_images, 4);
    assert_eq!(summary.total_test_images, 1);
    assert_eq!(summary.total_lines, 5);
}

#[test]
fn module_setup_encodes_fixed_length_targets() {
    let (_dir, config) = fixture();
    let mut module = ParagraphsDataModule::new(&config).expect("module");
    module.setup(Some(Stage::Fit)).expect("setup");

    assert!(module.dataset(DatasetSplit::Test).is_none());
    let train = module.dataset(DatasetSplit::Train).expect("train split");
    assert_eq!(train.len(), 2);

    let vocab = ParagraphVocab::builtin();
    let item = train.get(0).expect("first item");
    assert_eq!(item.id, "a01");
    assert_eq!(item.target.len(), 32);
    let symbols: Vec<&str> = item.target[..12]
        .iter()
        .map(|&id| vocab.symbol(id).expect("symbol"))
        .collect();
    assert_eq!(
        symbols,
        vec!["<S>", "<G>", " ", "c", "a", "t", "\n", "d", "o", "g", "<E>", "<P>"]
    );

    assert!(module.cache().is_prepared());
    assert_eq!(module.vocab().mapping(), module.config().mapping);

    let summary = module.to_string();
    assert!(summary.contains("Train/val/test sizes: 2, 1, -"));
}

#[test]
fn setup_rejects_output_length_below_label_plus_two() {
    let (_dir, config) = fixture_with(true, LONGEST_LABEL + 1);
    let mut module = ParagraphsDataModule::new(&config).expect("module");
    let err = module.setup(None).expect_err("too short");
    assert!(err.to_string().contains("output length"));

    let (_dir, config) = fixture_with(true, LONGEST_LABEL + 2);
    let mut module = ParagraphsDataModule::new(&config).expect("module");
    module.setup(None).expect("exact fit passes");
}

#[test]
fn dataloader_batches_match_configured_shape() {
    let (_dir, config) = fixture();
    let mut module = ParagraphsDataModule::new(&config).expect("module");
    module.setup(None).expect("setup");

    type Backend = NdArray<f32>;
    let device = <Backend as BackendTrait>::Device::default();
    let loader = module
        .dataloader::<Backend>(DatasetSplit::Train, &device)
        .expect("loader");

    let batch = loader.iter().next().expect("batch");
    assert_eq!(batch.images.dims(), [2, 1, 100, 100]);
    assert_eq!(batch.targets.dims(), [2, 32]);

    let targets: Vec<i64> = batch
        .targets
        .to_data()
        .convert::<i64>()
        .into_vec::<i64>()
        .expect("targets vec");
    let start = i64::from(ParagraphVocab::builtin().start());
    assert_eq!(targets[0], start);
    assert_eq!(targets[32], start);
}
