//! Chart capture: producing the raster image embedded in the chart band.
//!
//! A [`ChartSource`] turns whatever backs the chart into a [`ChartImage`].
//! Decorations such as drop shadows are requested explicitly through
//! [`CaptureOptions`] instead of being toggled on a shared element around the
//! capture.  The built-in [`BarChart`] rasterizes a chart series with the
//! [`image`] crate and labels it with `rusttype` glyphs; [`StaticChart`] and
//! [`EncodedChart`] wrap images captured elsewhere.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use crate::aggregate::ProductCount;
use crate::model::ChartImage;

/// Whether cosmetic decorations are drawn into the captured raster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Decorations {
    #[default]
    Shown,
    Suppressed,
}

/// Parameters of a single capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    pub decorations: Decorations,
    /// Integer supersampling factor applied to the natural chart size.
    pub scale: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            decorations: Decorations::Shown,
            scale: 1,
        }
    }
}

impl CaptureOptions {
    /// Options used when embedding a chart into the PDF report.
    pub fn for_print() -> Self {
        Self {
            decorations: Decorations::Suppressed,
            scale: 2,
        }
    }
}

/// Errors raised while capturing a chart image.
#[derive(Debug)]
pub enum CaptureError {
    /// The encoded image could not be decoded.
    Decode(image::ImageError),
    /// The image file could not be read.
    Io(io::Error),
    /// The label font could not be parsed.
    Font(rusttype::Error),
    /// Raw pixel data did not match the declared dimensions.
    PixelBuffer {
        width: u32,
        height: u32,
        actual: usize,
    },
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err)
    }
}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "Failed to decode chart image: {err}"),
            Self::Io(err) => write!(f, "Failed to read chart image: {err}"),
            Self::Font(err) => write!(f, "Failed to parse chart font: {err}"),
            Self::PixelBuffer {
                width,
                height,
                actual,
            } => write!(
                f,
                "Chart pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                actual,
                (*width as usize) * (*height as usize) * 4,
                width,
                height
            ),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Font(err) => Some(err),
            Self::PixelBuffer { .. } => None,
        }
    }
}

/// Something that can produce the chart raster.
pub trait ChartSource {
    /// Captures the chart.  `Ok(None)` means there is nothing to plot.
    fn capture(&self, options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError>;
}

impl<T: ChartSource + ?Sized> ChartSource for Box<T> {
    fn capture(&self, options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError> {
        (**self).capture(options)
    }
}

/// An image that has already been captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticChart(ChartImage);

impl StaticChart {
    pub fn new(image: ChartImage) -> Self {
        Self(image)
    }

    /// Wraps raw RGBA8 pixels, validating the buffer length.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CaptureError> {
        let actual = pixels.len();
        ChartImage::from_rgba(width, height, pixels)
            .map(Self)
            .ok_or(CaptureError::PixelBuffer {
                width,
                height,
                actual,
            })
    }
}

impl ChartSource for StaticChart {
    fn capture(&self, _options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError> {
        Ok(Some(self.0.clone()).filter(|image| !image.is_empty()))
    }
}

/// Encoded image data (PNG, JPEG, ...) held in memory or on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodedChart {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl EncodedChart {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// Decodes an image from in-memory bytes.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<image::DynamicImage, CaptureError> {
    Ok(image::load_from_memory(bytes.as_ref())?)
}

/// Decodes the image file at `path`, guessing its format from the content.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, CaptureError> {
    let reader = image::io::Reader::open(path.as_ref())?.with_guessed_format()?;
    Ok(reader.decode()?)
}

impl ChartSource for EncodedChart {
    fn capture(&self, _options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError> {
        let image = match self {
            Self::Bytes(bytes) => decode_image_from_bytes(bytes)?,
            Self::Path(path) => decode_image_from_path(path)?,
        };
        let image = ChartImage::from(image.to_rgba8());
        Ok(Some(image).filter(|image| !image.is_empty()))
    }
}

/// Bar fill colors, cycled per category.
pub const BAR_PALETTE: [[u8; 3]; 5] = [
    [0x4f, 0x77, 0x2d],
    [0x31, 0x57, 0x2c],
    [0x13, 0x2a, 0x13],
    [0x90, 0xa9, 0x55],
    [0xec, 0xf3, 0x9e],
];

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GRID: Rgba<u8> = Rgba([204, 204, 204, 255]);
const AXIS: Rgba<u8> = Rgba([102, 102, 102, 255]);
const SHADOW: Rgba<u8> = Rgba([190, 190, 190, 255]);

const DEFAULT_WIDTH_PX: u32 = 800;
const DEFAULT_HEIGHT_PX: u32 = 300;
const MIN_SIDE_PX: u32 = 64;
const MAX_SIDE_PX: u32 = 2048;
const MAX_SCALE: u32 = 4;
const PLOT_LEFT_PX: u32 = 40;
const PLOT_RIGHT_PX: u32 = 10;
const PLOT_TOP_PX: u32 = 10;
const PLOT_BOTTOM_PX: u32 = 30;
const DASH_PX: u32 = 3;
const SHADOW_OFFSET_PX: u32 = 3;
const MAX_GRID_LINES: usize = 5;
const LABEL_SIZE_PX: f32 = 12.0;
const LABEL_GAP_PX: u32 = 4;
const TRUNCATION: &str = "...";

/// TrueType face used for the category and value labels of a [`BarChart`].
#[derive(Clone)]
pub struct ChartFont(Font<'static>);

impl fmt::Debug for ChartFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartFont").finish_non_exhaustive()
    }
}

impl ChartFont {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, CaptureError> {
        Font::from_bytes(bytes.into())
            .map(Self)
            .map_err(CaptureError::Font)
    }

    fn text_width(&self, text: &str, scale: Scale) -> f32 {
        self.0
            .glyphs_for(text.chars())
            .map(|glyph| glyph.scaled(scale).h_metrics().advance_width)
            .sum()
    }

    fn ascent(&self, scale: Scale) -> f32 {
        self.0.v_metrics(scale).ascent
    }

    /// Shortens `label` with a trailing ellipsis until it fits `max_width`.
    fn fit_label(&self, label: &str, scale: Scale, max_width: f32) -> String {
        if self.text_width(label, scale) <= max_width {
            return label.to_owned();
        }
        let mut fitted = label.to_owned();
        while fitted.pop().is_some() {
            let candidate = format!("{}{}", fitted.trim_end(), TRUNCATION);
            if self.text_width(&candidate, scale) <= max_width {
                return candidate;
            }
        }
        String::new()
    }

    /// Blends the glyph coverage of `text` over the canvas, starting at the
    /// baseline origin (`x`, `baseline`).
    fn draw(&self, canvas: &mut RgbaImage, text: &str, scale: Scale, x: f32, baseline: f32) {
        let (width, height) = (canvas.width() as i32, canvas.height() as i32);
        for glyph in self.0.layout(text, scale, point(x, baseline)) {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bounds.min.x + gx as i32;
                let py = bounds.min.y + gy as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                for channel in 0..3 {
                    let blended = f32::from(AXIS[channel]) * coverage
                        + f32::from(pixel[channel]) * (1.0 - coverage);
                    pixel[channel] = blended.round() as u8;
                }
            });
        }
    }
}

/// One plotted category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bar {
    pub label: String,
    pub value: usize,
}

/// Horizontal extent of one category on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BarSlot {
    index: usize,
    slot_left: u32,
    slot_right: u32,
    bar_left: u32,
    bar_right: u32,
}

impl BarSlot {
    fn center(&self) -> f32 {
        (self.slot_left + self.slot_right) as f32 / 2.0
    }
}

/// Bar chart of customers per product.
///
/// Category names and value ticks are only drawn once a [`ChartFont`] is
/// attached; without one the chart carries bars, grid and axes.
#[derive(Clone, Debug)]
pub struct BarChart {
    bars: Vec<Bar>,
    reversed: bool,
    width: u32,
    height: u32,
    font: Option<ChartFont>,
}

impl BarChart {
    /// Builds a chart plotting `series` with the categories in reversed
    /// order, matching the on-screen dashboard.
    pub fn from_series(series: &[ProductCount<'_>]) -> Self {
        Self::new(series.iter().map(|entry| Bar {
            label: entry.product.name.clone(),
            value: entry.count,
        }))
    }

    pub fn new<I>(bars: I) -> Self
    where
        I: IntoIterator<Item = Bar>,
    {
        Self {
            bars: bars.into_iter().collect(),
            reversed: true,
            width: DEFAULT_WIDTH_PX,
            height: DEFAULT_HEIGHT_PX,
            font: None,
        }
    }

    /// Labels categories and grid values with `font`.
    pub fn with_font(mut self, font: ChartFont) -> Self {
        self.font = Some(font);
        self
    }

    /// Sets whether categories are drawn right to left.
    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Sets the natural size in pixels, before the capture scale is applied.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.clamp(MIN_SIDE_PX, MAX_SIDE_PX);
        self.height = height.clamp(MIN_SIDE_PX, MAX_SIDE_PX);
        self
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Splits the plot area between `left` and `right` into one slot per
    /// category, in drawing order.
    fn slots(&self, left: u32, right: u32) -> Vec<BarSlot> {
        let count = self.bars.len();
        let slot = f64::from(right - left) / count as f64;
        let at = |fraction: f64| left + (slot * fraction).round() as u32;

        (0..count)
            .map(|position| {
                let index = if self.reversed {
                    count - 1 - position
                } else {
                    position
                };
                let position = position as f64;
                BarSlot {
                    index,
                    slot_left: at(position),
                    slot_right: at(position + 1.0),
                    bar_left: at(position + 0.1),
                    bar_right: at(position + 0.9),
                }
            })
            .collect()
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    let x1 = x1.min(canvas.width());
    let y1 = y1.min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Values at which horizontal grid lines are drawn, excluding zero.
fn grid_steps(max_value: usize) -> Vec<usize> {
    let step = (max_value + MAX_GRID_LINES - 1) / MAX_GRID_LINES;
    let step = step.max(1);
    (1..)
        .map(|index| index * step)
        .take_while(|value| *value <= max_value)
        .collect()
}

impl ChartSource for BarChart {
    fn capture(&self, options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError> {
        if self.bars.is_empty() {
            return Ok(None);
        }

        let scale = options.scale.clamp(1, MAX_SCALE);
        let (width, height) = (self.width * scale, self.height * scale);
        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

        let left = PLOT_LEFT_PX * scale;
        let right = width - PLOT_RIGHT_PX * scale;
        let top = PLOT_TOP_PX * scale;
        let bottom = height - PLOT_BOTTOM_PX * scale;
        let plot_height = f64::from(bottom - top);
        let max_value = self.bars.iter().map(|bar| bar.value).max().unwrap_or(0).max(1);

        let y_for = |value: usize| -> u32 {
            let ratio = value as f64 / max_value as f64;
            bottom - (ratio * plot_height).round() as u32
        };

        let grid = grid_steps(max_value);
        for &value in &grid {
            let y = y_for(value);
            for x in (left..right).filter(|x| (x / (DASH_PX * scale)) % 2 == 0) {
                canvas.put_pixel(x, y, GRID);
            }
        }

        let slots = self.slots(left, right);
        for slot in &slots {
            let bar = &self.bars[slot.index];
            if bar.value == 0 {
                continue;
            }
            let y0 = y_for(bar.value);

            if options.decorations == Decorations::Shown {
                let offset = SHADOW_OFFSET_PX * scale;
                fill_rect(
                    &mut canvas,
                    slot.bar_left + offset,
                    y0 + offset,
                    slot.bar_right + offset,
                    bottom,
                    SHADOW,
                );
            }

            let [r, g, b] = BAR_PALETTE[slot.index % BAR_PALETTE.len()];
            fill_rect(&mut canvas, slot.bar_left, y0, slot.bar_right, bottom, Rgba([r, g, b, 255]));
        }

        fill_rect(&mut canvas, left, bottom, right, bottom + scale, AXIS);
        fill_rect(&mut canvas, left.saturating_sub(scale), top, left, bottom + scale, AXIS);

        if let Some(font) = &self.font {
            let text_scale = Scale::uniform(LABEL_SIZE_PX * scale as f32);
            let ascent = font.ascent(text_scale);
            let gap = (LABEL_GAP_PX * scale) as f32;

            for value in std::iter::once(0).chain(grid.iter().copied()) {
                let text = value.to_string();
                let x = left as f32 - gap - font.text_width(&text, text_scale);
                let baseline = y_for(value) as f32 + ascent / 2.0;
                font.draw(&mut canvas, &text, text_scale, x, baseline);
            }

            let baseline = (bottom + scale) as f32 + gap + ascent;
            for slot in &slots {
                let available = (slot.slot_right - slot.slot_left) as f32;
                let text = font.fit_label(&self.bars[slot.index].label, text_scale, available);
                let x = slot.center() - font.text_width(&text, text_scale) / 2.0;
                font.draw(&mut canvas, &text, text_scale, x, baseline);
            }
        }

        Ok(Some(ChartImage::from(canvas)))
    }
}
