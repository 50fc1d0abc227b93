//! Line plots of the training curves.
//!
//! Draws "train vs validation" curves for accuracy and loss into PNG files,
//! with a light grid and a legend. Titles and legend labels need a TrueType
//! font; without one the curves and legend swatches are still drawn.

use crate::training::TrainingHistory;
use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tirescan_core::core::{ClassifierError, ClassifierResult, ProcessingStage};
use tracing::{debug, info};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;
const MARGIN_LEFT: f32 = 70.0;
const MARGIN_RIGHT: f32 = 30.0;
const MARGIN_TOP: f32 = 50.0;
const MARGIN_BOTTOM: f32 = 60.0;
const GRID_LINES: usize = 5;

const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const GRID_COLOR: Rgb<u8> = Rgb([220, 220, 220]);
const TRAIN_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const VAL_COLOR: Rgb<u8> = Rgb([255, 127, 14]);

/// File name of the accuracy plot.
pub const ACCURACY_PLOT: &str = "accuracy.png";
/// File name of the loss plot.
pub const LOSS_PLOT: &str = "loss.png";
/// File name of the JSON history.
pub const HISTORY_FILE: &str = "history.json";

/// One named curve.
pub struct Series<'a> {
    pub label: &'a str,
    pub values: &'a [f64],
    pub color: Rgb<u8>,
}

/// Settings for the plots.
#[derive(Default)]
pub struct PlotConfig {
    /// Font for titles and labels. Text is skipped when `None`.
    pub font: Option<FontVec>,
}

impl PlotConfig {
    /// Loads the font at `font_path`.
    ///
    /// # Arguments
    ///
    /// * `font_path` - Path to a TrueType or OpenType font
    ///
    /// # Returns
    ///
    /// The configuration, or an error if the file cannot be read or parsed.
    pub fn with_font_path(font_path: &Path) -> ClassifierResult<Self> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data).map_err(|e| {
            ClassifierError::processing_error(
                ProcessingStage::Rendering,
                &format!("failed to parse font file: {}", font_path.display()),
                e,
            )
        })?;
        Ok(Self { font: Some(font) })
    }

    /// Uses the font at `font_path` when given, otherwise tries a few common
    /// system fonts and falls back to no text.
    pub fn from_optional_path(font_path: Option<&Path>) -> Self {
        if let Some(path) = font_path {
            match Self::with_font_path(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("cannot load plot font {}: {e}", path.display()),
            }
        }

        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];
        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(font_data)
            {
                debug!("Loaded system font: {}", path);
                return Self { font: Some(font) };
            }
        }
        debug!("No system font found, plot text will be skipped");
        Self::default()
    }
}

/// Renders the series as a line chart.
///
/// # Arguments
///
/// * `title` - Title drawn above the chart
/// * `y_label` - Label of the vertical axis
/// * `series` - Curves to draw, one point per epoch
/// * `config` - Plot settings
pub fn render_line_chart(title: &str, y_label: &str, series: &[Series<'_>], config: &PlotConfig) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND_COLOR);
    let plot_w = WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;

    let points = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let (y_min, y_max) = value_range(series);
    let to_x = |i: usize| {
        if points <= 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + plot_w * i as f32 / (points - 1) as f32
        }
    };
    let to_y = |v: f64| MARGIN_TOP + plot_h * (1.0 - ((v - y_min) / (y_max - y_min)) as f32);

    for i in 0..=GRID_LINES {
        let y = MARGIN_TOP + plot_h * i as f32 / GRID_LINES as f32;
        draw_line_segment_mut(&mut img, (MARGIN_LEFT, y), (MARGIN_LEFT + plot_w, y), GRID_COLOR);
        if let Some(font) = &config.font {
            let value = y_max - (y_max - y_min) * i as f64 / GRID_LINES as f64;
            draw_text_mut(&mut img, AXIS_COLOR, 8, y as i32 - 7, 14.0, font, &format!("{value:.3}"));
        }
    }
    for i in 0..points {
        let x = to_x(i);
        draw_line_segment_mut(&mut img, (x, MARGIN_TOP), (x, MARGIN_TOP + plot_h), GRID_COLOR);
        if let Some(font) = &config.font {
            let y = (MARGIN_TOP + plot_h + 6.0) as i32;
            draw_text_mut(&mut img, AXIS_COLOR, x as i32 - 4, y, 14.0, font, &i.to_string());
        }
    }
    draw_hollow_rect_mut(
        &mut img,
        Rect::at(MARGIN_LEFT as i32, MARGIN_TOP as i32).of_size(plot_w as u32, plot_h as u32),
        AXIS_COLOR,
    );

    for s in series {
        for (i, pair) in s.values.windows(2).enumerate() {
            let start = (to_x(i), to_y(pair[0]));
            let end = (to_x(i + 1), to_y(pair[1]));
            draw_line_segment_mut(&mut img, start, end, s.color);
            // second pass one pixel lower for a thicker stroke
            draw_line_segment_mut(&mut img, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0), s.color);
        }
        for (i, &v) in s.values.iter().enumerate() {
            let (x, y) = (to_x(i) as i32, to_y(v) as i32);
            draw_filled_rect_mut(&mut img, Rect::at(x - 2, y - 2).of_size(5, 5), s.color);
        }
    }

    let legend_x = (MARGIN_LEFT + plot_w) as i32 - 170;
    for (i, s) in series.iter().enumerate() {
        let y = MARGIN_TOP as i32 + 10 + 22 * i as i32;
        draw_filled_rect_mut(&mut img, Rect::at(legend_x, y + 4).of_size(24, 6), s.color);
        if let Some(font) = &config.font {
            draw_text_mut(&mut img, AXIS_COLOR, legend_x + 32, y - 2, 16.0, font, s.label);
        }
    }

    if let Some(font) = &config.font {
        draw_text_mut(&mut img, AXIS_COLOR, (WIDTH / 2) as i32 - 60, 14, 22.0, font, title);
        draw_text_mut(
            &mut img,
            AXIS_COLOR,
            (WIDTH / 2) as i32 - 20,
            HEIGHT as i32 - 28,
            16.0,
            font,
            "Epoch",
        );
        draw_text_mut(&mut img, AXIS_COLOR, 8, 20, 16.0, font, y_label);
    }

    img
}

fn value_range(series: &[Series<'_>]) -> (f64, f64) {
    let finite = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1e-3);
    (min - pad, max + pad)
}

/// Writes `accuracy.png`, `loss.png` and `history.json` into `dir`.
///
/// Returns the paths of the written files.
pub fn save_training_plots(
    history: &TrainingHistory,
    dir: &Path,
    config: &PlotConfig,
) -> ClassifierResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let accuracy = render_line_chart(
        "Model Accuracy",
        "Accuracy",
        &[
            Series {
                label: "Train Accuracy",
                values: &history.accuracy,
                color: TRAIN_COLOR,
            },
            Series {
                label: "Val Accuracy",
                values: &history.val_accuracy,
                color: VAL_COLOR,
            },
        ],
        config,
    );
    let loss = render_line_chart(
        "Model Loss",
        "Loss",
        &[
            Series {
                label: "Train Loss",
                values: &history.loss,
                color: TRAIN_COLOR,
            },
            Series {
                label: "Val Loss",
                values: &history.val_loss,
                color: VAL_COLOR,
            },
        ],
        config,
    );

    let accuracy_path = dir.join(ACCURACY_PLOT);
    let loss_path = dir.join(LOSS_PLOT);
    let history_path = dir.join(HISTORY_FILE);
    for (img, path) in [(&accuracy, &accuracy_path), (&loss, &loss_path)] {
        img.save(path).map_err(|e| {
            ClassifierError::processing_error(
                ProcessingStage::Rendering,
                &format!("failed to save plot {}", path.display()),
                e,
            )
        })?;
    }
    history.save_json(&history_path)?;
    info!("Training plots saved to {}", dir.display());

    Ok(vec![accuracy_path, loss_path, history_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::EpochMetrics;

    #[test]
    fn test_chart_draws_curves_without_font() {
        let values = [0.2, 0.6, 0.9];
        let img = render_line_chart(
            "t",
            "y",
            &[Series {
                label: "a",
                values: &values,
                color: TRAIN_COLOR,
            }],
            &PlotConfig::default(),
        );
        assert_eq!(img.dimensions(), (WIDTH, HEIGHT));
        assert!(img.pixels().any(|p| *p == TRAIN_COLOR));
    }

    #[test]
    fn test_value_range_handles_flat_and_empty() {
        assert_eq!(value_range(&[]), (0.0, 1.0));
        let flat = [0.5, 0.5];
        let (lo, hi) = value_range(&[Series {
            label: "flat",
            values: &flat,
            color: VAL_COLOR,
        }]);
        assert!(lo < 0.5 && hi > 0.5);
    }

    #[test]
    fn test_save_training_plots_writes_files() {
        let mut history = TrainingHistory::default();
        for epoch in 0..3 {
            let e = epoch as f64;
            history.push(EpochMetrics {
                loss: 0.7 - 0.1 * e,
                accuracy: 0.5 + 0.1 * e,
                val_loss: 0.72 - 0.1 * e,
                val_accuracy: 0.48 + 0.1 * e,
                learning_rate: 1e-4,
            });
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");
        let files = save_training_plots(&history, &out, &PlotConfig::default()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.is_file()));
    }
}
