//! Batching windows into tensors.

use burn::prelude::*;
use burn::tensor::TensorData;

use deepar_core::{InputShapes, Seed};

use crate::dataset::{Window, WindowDataset};
use crate::error::{DataError, Result};
use crate::sampler::{RandomSampler, Sampler, SequentialSampler};

/// Tensors for a batch of `N` windows with history `H` and horizon `P`.
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Static category, `[N, 1]` (0 when the window has none).
    pub static_cat: Tensor<B, 2, Int>,
    /// History features, `[N, H, F + 1]`.
    pub past_time_feat: Tensor<B, 3>,
    /// History values, `[N, H]`.
    pub past_target: Tensor<B, 2>,
    /// History observation mask, `[N, H]`.
    pub past_observed: Tensor<B, 2>,
    /// Horizon features, `[N, P, F + 1]`.
    pub future_time_feat: Tensor<B, 3>,
    /// Horizon values, `[N, P]`.
    pub future_target: Tensor<B, 2>,
    /// Horizon observation mask, `[N, P]`.
    pub future_observed: Tensor<B, 2>,
}

impl<B: Backend> WindowBatch<B> {
    /// Stack windows into one batch.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty slice or windows of differing lengths.
    pub fn from_windows(windows: &[Window], device: &B::Device) -> Result<Self> {
        let first = windows.first().ok_or(DataError::EmptyDataset)?;
        let n = windows.len();
        let h = first.history_length();
        let p = first.prediction_length();
        let f = first.calendar_features.ncols();

        let mut static_cat = Vec::with_capacity(n);
        let mut past_time_feat = Vec::with_capacity(n * h * f);
        let mut past_target = Vec::with_capacity(n * h);
        let mut past_observed = Vec::with_capacity(n * h);
        let mut future_time_feat = Vec::with_capacity(n * p * f);
        let mut future_target = Vec::with_capacity(n * p);
        let mut future_observed = Vec::with_capacity(n * p);

        for (i, w) in windows.iter().enumerate() {
            if w.history_length() != h
                || w.prediction_length() != p
                || w.calendar_features.dim() != (h + p, f)
            {
                return Err(DataError::InconsistentWindows(format!(
                    "window {} has history {}, horizon {}, features {:?}; expected {}, {}, {:?}",
                    i,
                    w.history_length(),
                    w.prediction_length(),
                    w.calendar_features.dim(),
                    h,
                    p,
                    (h + p, f)
                )));
            }
            static_cat.push(w.static_category.unwrap_or(0) as i64);
            past_time_feat.extend(w.past_time_features().iter().copied());
            past_target.extend_from_slice(&w.context);
            past_observed.extend_from_slice(&w.context_observed);
            future_time_feat.extend(w.future_time_features().iter().copied());
            future_target.extend_from_slice(&w.target);
            future_observed.extend_from_slice(&w.target_observed);
        }

        Ok(Self {
            static_cat: Tensor::from_data(TensorData::new(static_cat, [n, 1]), device),
            past_time_feat: float_tensor(past_time_feat, [n, h, f], device),
            past_target: float_tensor(past_target, [n, h], device),
            past_observed: float_tensor(past_observed, [n, h], device),
            future_time_feat: float_tensor(future_time_feat, [n, p, f], device),
            future_target: float_tensor(future_target, [n, p], device),
            future_observed: float_tensor(future_observed, [n, p], device),
        })
    }

    /// Number of windows in the batch.
    pub fn batch_size(&self) -> usize {
        self.past_target.dims()[0]
    }

    /// Shapes of the tensors in this batch.
    pub fn input_shapes(&self) -> InputShapes {
        InputShapes {
            static_cat: self.static_cat.dims(),
            past_time_feat: self.past_time_feat.dims(),
            past_target: self.past_target.dims(),
            future_time_feat: self.future_time_feat.dims(),
            future_target: self.future_target.dims(),
        }
    }

    /// Stack `times` copies of the batch along the batch dimension.
    ///
    /// Row `s * N + i` of the result is window `i` of copy `s`.
    pub fn repeat(&self, times: usize) -> Self {
        fn tile<B: Backend, const D: usize, K>(t: &Tensor<B, D, K>, times: usize) -> Tensor<B, D, K>
        where
            K: burn::tensor::BasicOps<B>,
        {
            Tensor::cat(vec![t.clone(); times], 0)
        }
        Self {
            static_cat: tile(&self.static_cat, times),
            past_time_feat: tile(&self.past_time_feat, times),
            past_target: tile(&self.past_target, times),
            past_observed: tile(&self.past_observed, times),
            future_time_feat: tile(&self.future_time_feat, times),
            future_target: tile(&self.future_target, times),
            future_observed: tile(&self.future_observed, times),
        }
    }
}

fn float_tensor<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Iterates a [`WindowDataset`] in batches.
///
/// # Example
///
/// ```rust,ignore
/// use deepar_data::WindowLoader;
/// use deepar_core::Seed;
///
/// let loader = WindowLoader::builder(&train)
///     .batch_size(32)
///     .shuffle(true)
///     .seed(Seed::new(42))
///     .build()?;
///
/// for batch in loader.iter::<NdArray>(epoch, &device) {
///     let batch = batch?;
/// }
/// ```
pub struct WindowLoader<'a, D: WindowDataset + ?Sized> {
    dataset: &'a D,
    batch_size: usize,
    shuffle: bool,
    seed: Seed,
}

impl<'a, D: WindowDataset + ?Sized> WindowLoader<'a, D> {
    /// Create a new loader builder.
    #[must_use]
    pub fn builder(dataset: &'a D) -> WindowLoaderBuilder<'a, D> {
        WindowLoaderBuilder::new(dataset)
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Get the number of batches per pass.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        self.dataset.size().div_ceil(self.batch_size)
    }

    /// Windows of one pass, grouped into batches.
    ///
    /// With shuffling enabled, the order depends on the seed and `epoch`
    /// only, so a rerun visits the same batches.
    #[must_use]
    pub fn window_chunks(&self, epoch: usize) -> WindowChunks<'a, D> {
        let n = self.dataset.size();
        let indices = if self.shuffle {
            RandomSampler::new(self.seed.derive(&format!("shuffle/{epoch}"))).sample(n)
        } else {
            SequentialSampler.sample(n)
        };
        WindowChunks {
            dataset: self.dataset,
            indices,
            batch_size: self.batch_size,
            position: 0,
        }
    }

    /// Tensor batches of one pass.
    #[must_use]
    pub fn iter<B: Backend>(&self, epoch: usize, device: &B::Device) -> WindowLoaderIter<'a, D, B> {
        WindowLoaderIter {
            chunks: self.window_chunks(epoch),
            device: device.clone(),
        }
    }
}

/// Builder for [`WindowLoader`].
pub struct WindowLoaderBuilder<'a, D: WindowDataset + ?Sized> {
    dataset: &'a D,
    batch_size: usize,
    shuffle: bool,
    seed: Seed,
}

impl<'a, D: WindowDataset + ?Sized> WindowLoaderBuilder<'a, D> {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: &'a D) -> Self {
        Self {
            dataset,
            batch_size: 32,
            shuffle: false,
            seed: Seed::default(),
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable seeded shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Build the loader.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero batch size or an empty dataset.
    pub fn build(self) -> Result<WindowLoader<'a, D>> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        Ok(WindowLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            seed: self.seed,
        })
    }
}

/// Iterator over the windows of one pass, one `Vec` per batch.
pub struct WindowChunks<'a, D: WindowDataset + ?Sized> {
    dataset: &'a D,
    indices: Vec<usize>,
    batch_size: usize,
    position: usize,
}

impl<'a, D: WindowDataset + ?Sized> Iterator for WindowChunks<'a, D> {
    type Item = Result<Vec<Window>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.indices.len() {
            return None;
        }
        let end = (self.position + self.batch_size).min(self.indices.len());
        let chunk = &self.indices[self.position..end];
        self.position = end;
        Some(chunk.iter().map(|&i| self.dataset.get_window(i)).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.indices.len() - self.position).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

/// Iterator over tensor batches of one pass.
pub struct WindowLoaderIter<'a, D: WindowDataset + ?Sized, B: Backend> {
    chunks: WindowChunks<'a, D>,
    device: B::Device,
}

impl<'a, D: WindowDataset + ?Sized, B: Backend> Iterator for WindowLoaderIter<'a, D, B> {
    type Item = Result<WindowBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        let windows = self.chunks.next()?;
        Some(windows.and_then(|w| WindowBatch::from_windows(&w, &self.device)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{WindowConfig, WindowedSeriesDataset};
    use crate::series::{Series, YearMonth};
    use burn_ndarray::NdArray;
    use deepar_core::{Frequency, Usage};
    use std::sync::Arc;

    type TestBackend = NdArray;

    fn train_dataset() -> WindowedSeriesDataset {
        let values = (0..144).map(|i| 100.0 + i as f32).collect();
        let series = Arc::new(Series::new(YearMonth::new(1949, 1).unwrap(), values).unwrap());
        WindowedSeriesDataset::build(series, Usage::Train, WindowConfig::new(Frequency::Monthly, 12, 12))
            .unwrap()
    }

    #[test]
    fn test_batch_shapes() {
        let ds = train_dataset();
        let device = Default::default();
        let loader = WindowLoader::builder(&ds).batch_size(32).build().unwrap();
        assert_eq!(loader.n_batches(), 4);

        let batches: Vec<_> = loader
            .iter::<TestBackend>(0, &device)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].past_time_feat.dims(), [32, 49, 2]);
        assert_eq!(batches[0].future_target.dims(), [32, 12]);
        assert_eq!(batches[3].batch_size(), 16);
        assert!(batches[0]
            .input_shapes()
            .check_against(&ds.input_shapes(1))
            .is_ok());
    }

    #[test]
    fn test_batch_values_match_windows() {
        let ds = train_dataset();
        let device = Default::default();
        let windows = vec![ds.get_window(50).unwrap(), ds.get_window(51).unwrap()];
        let batch = WindowBatch::<TestBackend>::from_windows(&windows, &device).unwrap();

        let past = batch.past_target.into_data().to_vec::<f32>().unwrap();
        assert_eq!(&past[..49], windows[0].context.as_slice());
        assert_eq!(&past[49..], windows[1].context.as_slice());
    }

    #[test]
    fn test_shuffle_is_seeded_per_epoch() {
        let ds = train_dataset();
        let loader = WindowLoader::builder(&ds)
            .batch_size(112)
            .shuffle(true)
            .seed(Seed::new(1))
            .build()
            .unwrap();
        let order = |epoch: usize| -> Vec<usize> {
            loader
                .window_chunks(epoch)
                .next()
                .unwrap()
                .unwrap()
                .iter()
                .map(|w| w.forecast_start)
                .collect()
        };
        assert_eq!(order(0), order(0));
        assert_ne!(order(0), order(1));
    }

    #[test]
    fn test_repeat_tiles_batch() {
        let ds = train_dataset();
        let device = Default::default();
        let windows = vec![ds.get_window(0).unwrap(), ds.get_window(1).unwrap()];
        let batch = WindowBatch::<TestBackend>::from_windows(&windows, &device).unwrap();
        let tiled = batch.repeat(3);
        assert_eq!(tiled.batch_size(), 6);
        assert_eq!(tiled.past_time_feat.dims(), [6, 49, 2]);
    }

    #[test]
    fn test_empty_and_zero_batch_rejected() {
        let ds = train_dataset();
        assert!(matches!(
            WindowLoader::builder(&ds).batch_size(0).build(),
            Err(DataError::InvalidBatchSize(_))
        ));
        let device = Default::default();
        assert!(WindowBatch::<TestBackend>::from_windows(&[], &device).is_err());
    }
}
