//! Directory-structured image datasets and batch loading.
//!
//! A partition directory holds one subfolder per class:
//!
//! ```text
//! split_data/train/
//!     Cracked/ img001.jpg ...
//!     Normal/  img101.jpg ...
//! ```
//!
//! Class indices follow the sorted folder names, so `Cracked` is 0 and
//! `Normal` is 1, matching the sigmoid output of the model.

use super::augment::Augmenter;
use crate::core::{CLASS_LABELS, ClassifierError, ClassifierResult, Tensor4D};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tirescan_core::processors::ImagePreprocessor;
use tirescan_core::utils::{has_image_extension, load_image};
use tracing::{debug, warn};

/// Images of one partition with their class indices.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    /// Scans `root` for class subfolders and image files.
    ///
    /// Files without a recognized image extension are ignored. Samples are
    /// ordered by class, then by file name.
    ///
    /// # Errors
    ///
    /// Returns an IO error if `root` cannot be read and
    /// `ClassifierError::InvalidInput` if it has no class subfolders.
    pub fn open(root: impl AsRef<Path>) -> ClassifierResult<Self> {
        let root = root.as_ref();
        let mut class_dirs = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                class_dirs.push(entry.path());
            }
        }
        class_dirs.sort();
        if class_dirs.is_empty() {
            return Err(ClassifierError::invalid_input(format!(
                "no class folders in {}",
                root.display()
            )));
        }

        let mut classes = Vec::with_capacity(class_dirs.len());
        let mut samples = Vec::new();
        for (index, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut files = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && has_image_extension(&path) {
                    files.push(path);
                }
            }
            files.sort();
            debug!(class = %name, index, images = files.len(), "found class folder");
            samples.extend(files.into_iter().map(|p| (p, index)));
            classes.push(name);
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes,
            samples,
        })
    }

    /// Opens a partition that must contain exactly the two tire classes.
    ///
    /// Folder names other than `Cracked`/`Normal` are accepted with a warning,
    /// since only their sorted order determines the labels.
    pub fn open_binary(root: impl AsRef<Path>) -> ClassifierResult<Self> {
        let folder = Self::open(root)?;
        if folder.classes.len() != CLASS_LABELS.len() {
            return Err(ClassifierError::invalid_input(format!(
                "{} must contain exactly {} class folders, found {:?}",
                folder.root.display(),
                CLASS_LABELS.len(),
                folder.classes
            )));
        }
        if folder.classes.iter().map(String::as_str).ne(CLASS_LABELS) {
            warn!(
                found = ?folder.classes,
                expected = ?CLASS_LABELS,
                "class folders differ from the expected labels; using sorted order"
            );
        }
        if folder.samples.is_empty() {
            return Err(ClassifierError::invalid_input(format!(
                "no images found in {}",
                folder.root.display()
            )));
        }
        Ok(folder)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class names in index order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// `(path, class index)` pairs.
    pub fn samples(&self) -> &[(PathBuf, usize)] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A batch ready for the backbone.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Rescaled images.
    pub images: Tensor4D,
    /// Class index of each image as `0.0`/`1.0`.
    pub labels: Vec<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Iterates a dataset in batches, optionally shuffled and augmented.
///
/// Images within a batch are decoded in parallel. Augmentation draws one seed
/// per image from the loader's generator before the parallel step, so a given
/// seed always yields the same batches.
#[derive(Debug)]
pub struct DataLoader<'a> {
    dataset: &'a ImageFolder,
    preprocessor: ImagePreprocessor,
    batch_size: usize,
    shuffle: bool,
    augmenter: Option<Augmenter>,
    rng: StdRng,
}

impl<'a> DataLoader<'a> {
    /// Creates a loader that visits the dataset in order without augmentation.
    pub fn new(dataset: &'a ImageFolder, preprocessor: ImagePreprocessor, batch_size: usize) -> Self {
        Self {
            dataset,
            preprocessor,
            batch_size: batch_size.max(1),
            shuffle: false,
            augmenter: None,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Reshuffles the sample order at the start of every epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Applies random augmentation to every image.
    pub fn with_augmenter(mut self, augmenter: Augmenter) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    pub fn dataset(&self) -> &ImageFolder {
        self.dataset
    }

    /// Number of batches per epoch; the last batch may be smaller.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Sample indices for the next epoch, grouped into batches.
    pub fn epoch_batches(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        order.chunks(self.batch_size).map(<[usize]>::to_vec).collect()
    }

    /// Loads, resizes, augments and stacks the given samples.
    ///
    /// # Errors
    ///
    /// Fails on the first image that cannot be read or decoded.
    pub fn load_batch(&mut self, indices: &[usize]) -> ClassifierResult<Batch> {
        let seeds: Vec<u64> = match self.augmenter {
            Some(_) => indices.iter().map(|_| self.rng.r#gen()).collect(),
            None => vec![0; indices.len()],
        };

        let samples = self.dataset.samples();
        let preprocessor = &self.preprocessor;
        let augmenter = self.augmenter.as_ref();
        let images = indices
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(&idx, &seed)| {
                let (path, _) = samples.get(idx).ok_or_else(|| {
                    ClassifierError::invalid_input(format!("sample index {idx} out of range"))
                })?;
                let img = preprocessor.resize(&load_image(path)?);
                Ok(match augmenter {
                    Some(aug) => aug.augment(&mut StdRng::seed_from_u64(seed), &img),
                    None => img,
                })
            })
            .collect::<ClassifierResult<Vec<_>>>()?;

        let labels = indices
            .iter()
            .map(|&idx| samples[idx].1 as f32)
            .collect();
        Ok(Batch {
            images: preprocessor.to_batch(&images)?,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AugmentationConfig;
    use image::{Rgb, RgbImage};

    fn write_image(path: &Path, value: u8) {
        RgbImage::from_pixel(8, 8, Rgb([value, value, value]))
            .save(path)
            .unwrap();
    }

    fn make_dataset(root: &Path, per_class: usize) {
        for (class, value) in [("Normal", 255u8), ("Cracked", 0u8)] {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..per_class {
                write_image(&dir.join(format!("{i:03}.png")), value);
            }
            std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();
        }
    }

    #[test]
    fn test_class_indices_follow_sorted_folders() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset(dir.path(), 2);
        let folder = ImageFolder::open_binary(dir.path()).unwrap();
        assert_eq!(folder.classes(), &["Cracked".to_string(), "Normal".to_string()]);
        assert_eq!(folder.len(), 4);
        assert!(folder.samples()[..2].iter().all(|(_, c)| *c == 0));
        assert!(folder.samples()[2..].iter().all(|(_, c)| *c == 1));
    }

    #[test]
    fn test_three_classes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset(dir.path(), 1);
        std::fs::create_dir(dir.path().join("Unknown")).unwrap();
        assert!(ImageFolder::open_binary(dir.path()).is_err());
    }

    #[test]
    fn test_unshuffled_loader_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset(dir.path(), 3);
        let folder = ImageFolder::open_binary(dir.path()).unwrap();
        let mut loader = DataLoader::new(&folder, ImagePreprocessor::default(), 4);
        assert_eq!(loader.num_batches(), 2);
        let first = loader.epoch_batches();
        let second = loader.epoch_batches();
        assert_eq!(first, vec![vec![0, 1, 2, 3], vec![4, 5]]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shuffled_loader_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset(dir.path(), 10);
        let folder = ImageFolder::open_binary(dir.path()).unwrap();
        let mut a = DataLoader::new(&folder, ImagePreprocessor::default(), 16).shuffled(42);
        let mut b = DataLoader::new(&folder, ImagePreprocessor::default(), 16).shuffled(42);
        let epoch = a.epoch_batches();
        assert_eq!(epoch, b.epoch_batches());
        let mut flat: Vec<usize> = epoch.concat();
        flat.sort_unstable();
        assert_eq!(flat, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_load_batch_labels_and_pixels() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset(dir.path(), 1);
        let folder = ImageFolder::open_binary(dir.path()).unwrap();
        let mut loader = DataLoader::new(&folder, ImagePreprocessor::default(), 2)
            .with_augmenter(Augmenter::new(AugmentationConfig::default()));
        let batch = loader.load_batch(&[1, 0]).unwrap();
        assert_eq!(batch.labels, vec![1.0, 0.0]);
        assert_eq!(batch.images.shape(), &[2, 224, 224, 3]);
        // uniform images are unaffected by augmentation
        assert!(batch.images.index_axis(ndarray::Axis(0), 0).iter().all(|&v| v == 1.0));
        assert!(batch.images.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 0.0));
    }
}
