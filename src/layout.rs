//! Fixed-coordinate page layout for the dashboard report.
//!
//! The layout works on an A4 page in millimetres with the origin in the top
//! left corner and produces a flat display list of [`DrawOp`] values.  It does
//! not touch the PDF backend: text widths needed for right alignment come from
//! a [`TextMetrics`] implementation, which keeps the whole procedure testable
//! without font files.

use genpdf::style::Color;
use log::debug;

use crate::aggregate::{self, RECENT_CUSTOMER_LIMIT};
use crate::model::{ChartImage, Snapshot};

/// A4 portrait page width.
pub const PAGE_WIDTH_MM: f64 = 210.0;
/// A4 portrait page height.
pub const PAGE_HEIGHT_MM: f64 = 297.0;
/// Width used by the bands; the page margin is applied on the left.
pub const CONTENT_WIDTH_MM: f64 = 190.0;
pub const MARGIN_MM: f64 = 10.0;
pub const CELL_PADDING_MM: f64 = 5.0;
pub const ROW_HEIGHT_MM: f64 = 7.0;
/// Space reserved above the first row of a panel for its header.
pub const PANEL_HEADER_MM: f64 = 20.0;
pub const CHART_BAND_HEIGHT_MM: f64 = 70.0;

const TITLE_HEIGHT_MM: f64 = 15.0;
const TOTALS_HEIGHT_MM: f64 = 20.0;
const TOTALS_GAP_MM: f64 = 2.0;
const SECTION_GAP_MM: f64 = 5.0;
const PANEL_GUTTER_MM: f64 = 5.0;
const RULE_OFFSET_MM: f64 = 2.0;
const ROW_INDENT_MM: f64 = 2.0;
const CHART_IMAGE_TOP_MM: f64 = 15.0;
const CHART_HEADER_ALLOWANCE_MM: f64 = 20.0;
const CHART_PLACEHOLDER_BASELINE_MM: f64 = 40.0;

const TITLE_FONT_SIZE: u8 = 18;
const TOTALS_FONT_SIZE: u8 = 14;
const HEADER_FONT_SIZE: u8 = 16;
const ROW_FONT_SIZE: u8 = 12;

pub const ACCENT_COLOR: Color = Color::Rgb(79, 119, 45);
pub const RULE_COLOR: Color = Color::Rgb(156, 163, 175);
pub const TEXT_COLOR: Color = Color::Rgb(0, 0, 0);
pub const TITLE_TEXT_COLOR: Color = Color::Rgb(255, 255, 255);

/// Top edge of the two list panels.
pub const PANELS_TOP_MM: f64 = MARGIN_MM + TITLE_HEIGHT_MM + TOTALS_HEIGHT_MM + SECTION_GAP_MM;

/// Measures rendered text widths.
pub trait TextMetrics {
    /// Width in millimetres of `text` rendered at `font_size` points.
    fn text_width(&self, text: &str, font_size: u8, weight: FontWeight) -> f64;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Point on the page, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Font attributes of a text run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub font_size: u8,
    pub weight: FontWeight,
    pub color: Color,
}

impl TextStyle {
    fn regular(font_size: u8) -> Self {
        Self {
            font_size,
            weight: FontWeight::Regular,
            color: TEXT_COLOR,
        }
    }

    fn bold(font_size: u8) -> Self {
        Self {
            weight: FontWeight::Bold,
            ..Self::regular(font_size)
        }
    }

    fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// A single drawing instruction of the display list.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// Rectangle filled with `fill` and outlined with `outline`.
    FilledRect {
        rect: Rect,
        fill: Color,
        outline: Color,
    },
    /// Outlined rectangle.
    StrokedRect { rect: Rect, outline: Color },
    /// Thin straight rule.
    Line { from: Point, to: Point, color: Color },
    /// Text run positioned at its baseline origin.
    Text {
        text: String,
        origin: Point,
        style: TextStyle,
    },
    /// The chart image, scaled into `rect`.
    Image { rect: Rect },
}

/// User-visible strings of the report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLabels {
    pub title: String,
    pub total_customers: String,
    pub total_products: String,
    pub recent_customers: String,
    pub customers_per_product: String,
    pub chart: String,
    pub chart_placeholder: String,
    pub more_rows: String,
    pub deleted_product: String,
}

impl Default for ReportLabels {
    fn default() -> Self {
        Self {
            title: "Dashboard".to_owned(),
            total_customers: "Total customers:".to_owned(),
            total_products: "Total products:".to_owned(),
            recent_customers: "Recent customers:".to_owned(),
            customers_per_product: "Customers per product:".to_owned(),
            chart: "Product distribution by customer".to_owned(),
            chart_placeholder: "No data to display".to_owned(),
            more_rows: "more".to_owned(),
            deleted_product: "Deleted product".to_owned(),
        }
    }
}

impl ReportLabels {
    fn overflow_row(&self, hidden: usize) -> String {
        format!("+{} {}", hidden, self.more_rows)
    }
}

/// Result of laying out the dashboard page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
    pub panel_height: f64,
    pub chart_band: Rect,
}

impl PageLayout {
    /// Iterates over the text runs in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, Point)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, origin, .. } => Some((text.as_str(), *origin)),
            _ => None,
        })
    }

    /// Returns the rectangle the chart image is drawn into, if any.
    pub fn image_rect(&self) -> Option<Rect> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Image { rect } => Some(*rect),
            _ => None,
        })
    }
}

/// Height shared by both list panels: tall enough for the longer list.
pub fn panel_height(customer_count: usize, product_count: usize) -> f64 {
    let customer_rows = customer_count.min(RECENT_CUSTOMER_LIMIT) as f64;
    let product_rows = product_count as f64;
    let customers = customer_rows * ROW_HEIGHT_MM + PANEL_HEADER_MM;
    let products = product_rows * ROW_HEIGHT_MM + PANEL_HEADER_MM;
    customers.max(products)
}

/// Largest number of rows a panel can hold while the chart band still fits
/// above the bottom margin.
pub fn max_panel_rows() -> usize {
    let available = PAGE_HEIGHT_MM
        - MARGIN_MM
        - PANELS_TOP_MM
        - SECTION_GAP_MM
        - CHART_BAND_HEIGHT_MM
        - PANEL_HEADER_MM;
    (available / ROW_HEIGHT_MM).floor() as usize
}

/// Splits `len` rows into the number drawn verbatim and the number folded
/// into a trailing `+N more` row.
pub fn visible_rows(len: usize, max_rows: usize) -> (usize, usize) {
    if len <= max_rows || max_rows == 0 {
        (len.min(max_rows), len.saturating_sub(max_rows))
    } else {
        let shown = max_rows - 1;
        (shown, len - shown)
    }
}

/// Scales a `width` × `height` source to fit within `max_width` ×
/// `max_height` while keeping its aspect ratio.
pub fn fit_image(width: f64, height: f64, max_width: f64, max_height: f64) -> (f64, f64) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_width / width).min(max_height / height);
    (width * scale, height * scale)
}

struct Painter<'m, M: ?Sized> {
    ops: Vec<DrawOp>,
    metrics: &'m M,
}

impl<'m, M: TextMetrics + ?Sized> Painter<'m, M> {
    fn text(&mut self, text: impl Into<String>, x: f64, y: f64, style: TextStyle) {
        self.ops.push(DrawOp::Text {
            text: text.into(),
            origin: Point::new(x, y),
            style,
        });
    }

    fn text_right(&mut self, text: impl Into<String>, right: f64, y: f64, style: TextStyle) {
        let text: String = text.into();
        let width = self.metrics.text_width(&text, style.font_size, style.weight);
        self.text(text, right - width, y, style);
    }

    fn rule(&mut self, from_x: f64, to_x: f64, y: f64) {
        self.ops.push(DrawOp::Line {
            from: Point::new(from_x, y),
            to: Point::new(to_x, y),
            color: RULE_COLOR,
        });
    }

    fn stroke(&mut self, rect: Rect) {
        self.ops.push(DrawOp::StrokedRect {
            rect,
            outline: TEXT_COLOR,
        });
    }

    /// Draws a bordered panel with a header and `(left, right)` rows.  An
    /// empty right cell is left blank.
    fn panel<I>(&mut self, rect: Rect, header: &str, rows: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.stroke(rect);
        self.text(
            header,
            rect.x + CELL_PADDING_MM,
            rect.y + 10.0,
            TextStyle::bold(HEADER_FONT_SIZE),
        );

        let style = TextStyle::regular(ROW_FONT_SIZE);
        let inner_left = rect.x + CELL_PADDING_MM;
        let inner_right = rect.right() - CELL_PADDING_MM;
        let mut baseline = rect.y + PANEL_HEADER_MM;
        for (left, right) in rows {
            self.text(left, inner_left + ROW_INDENT_MM, baseline, style);
            if !right.is_empty() {
                self.text_right(right, inner_right, baseline, style);
            }
            self.rule(inner_left, inner_right, baseline + RULE_OFFSET_MM);
            baseline += ROW_HEIGHT_MM;
        }
    }
}

/// Lays out the whole dashboard page for `snapshot`.
///
/// `chart` is embedded when present and non-empty; otherwise the chart band
/// shows the placeholder label.
pub fn layout_dashboard<M>(
    snapshot: &Snapshot,
    chart: Option<&ChartImage>,
    labels: &ReportLabels,
    metrics: &M,
) -> PageLayout
where
    M: TextMetrics + ?Sized,
{
    let mut painter = Painter {
        ops: Vec::new(),
        metrics,
    };

    // Title band.
    let title = Rect::new(MARGIN_MM, MARGIN_MM, CONTENT_WIDTH_MM, TITLE_HEIGHT_MM);
    painter.ops.push(DrawOp::FilledRect {
        rect: title,
        fill: ACCENT_COLOR,
        outline: TEXT_COLOR,
    });
    painter.text(
        labels.title.as_str(),
        title.x + CELL_PADDING_MM,
        title.y + 11.0,
        TextStyle::bold(TITLE_FONT_SIZE).with_color(TITLE_TEXT_COLOR),
    );

    // Totals band.
    let totals = Rect::new(
        MARGIN_MM,
        title.bottom() + TOTALS_GAP_MM,
        CONTENT_WIDTH_MM,
        TOTALS_HEIGHT_MM,
    );
    painter.stroke(totals);
    let totals_baseline = title.bottom() + 12.0;
    painter.text(
        format!("{} {}", labels.total_customers, snapshot.customers.len()),
        totals.x + CELL_PADDING_MM,
        totals_baseline,
        TextStyle::regular(TOTALS_FONT_SIZE),
    );
    painter.text(
        format!("{} {}", labels.total_products, snapshot.products.len()),
        totals.x + CONTENT_WIDTH_MM / 2.0 + CELL_PADDING_MM,
        totals_baseline,
        TextStyle::regular(TOTALS_FONT_SIZE),
    );

    // List panels.
    let recent = aggregate::recent_customers(&snapshot.customers, RECENT_CUSTOMER_LIMIT);
    let counts = aggregate::customers_per_product(&snapshot.products, &snapshot.links);
    let (shown_products, hidden_products) = visible_rows(counts.len(), max_panel_rows());
    let product_rows = shown_products + usize::from(hidden_products > 0);
    if hidden_products > 0 {
        debug!(
            "product panel overflows the page: drawing {} of {} products",
            shown_products,
            counts.len()
        );
    }

    let height = panel_height(recent.len(), product_rows);
    let panel_width = CONTENT_WIDTH_MM / 2.0 - PANEL_GUTTER_MM;
    let left = Rect::new(MARGIN_MM, PANELS_TOP_MM, panel_width, height);
    let right = Rect::new(
        MARGIN_MM + CONTENT_WIDTH_MM / 2.0 + PANEL_GUTTER_MM,
        PANELS_TOP_MM,
        panel_width,
        height,
    );

    painter.panel(
        left,
        &labels.recent_customers,
        recent
            .iter()
            .map(|customer| (format!("- {}", customer.name), customer.email.clone())),
    );

    let overflow =
        (hidden_products > 0).then(|| (labels.overflow_row(hidden_products), String::new()));
    painter.panel(
        right,
        &labels.customers_per_product,
        counts
            .iter()
            .take(shown_products)
            .map(|entry| (format!("- {}", entry.product.name), entry.count.to_string()))
            .chain(overflow),
    );

    // Chart band.
    let band = Rect::new(
        MARGIN_MM,
        PANELS_TOP_MM + height + SECTION_GAP_MM,
        CONTENT_WIDTH_MM,
        CHART_BAND_HEIGHT_MM,
    );
    painter.stroke(band);
    painter.text(
        labels.chart.as_str(),
        band.x + CELL_PADDING_MM,
        band.y + 10.0,
        TextStyle::bold(HEADER_FONT_SIZE),
    );

    match chart.filter(|image| !image.is_empty()) {
        Some(image) => {
            let (width, height) = fit_image(
                f64::from(image.width()),
                f64::from(image.height()),
                band.width - CELL_PADDING_MM * 2.0,
                band.height - CHART_HEADER_ALLOWANCE_MM,
            );
            let x = band.x + (band.width - width) / 2.0;
            let y = band.y + CHART_IMAGE_TOP_MM;
            painter.ops.push(DrawOp::Image {
                rect: Rect::new(x, y, width, height),
            });
        }
        None => painter.text(
            labels.chart_placeholder.as_str(),
            band.x + CELL_PADDING_MM,
            band.y + CHART_PLACEHOLDER_BASELINE_MM,
            TextStyle::regular(ROW_FONT_SIZE),
        ),
    }

    PageLayout {
        ops: painter.ops,
        panel_height: height,
        chart_band: band,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Customer, CustomerProductLink, Product};

    /// Every glyph advances by a fifth of the font size, in millimetres.
    struct FixedAdvance;

    impl TextMetrics for FixedAdvance {
        fn text_width(&self, text: &str, font_size: u8, _weight: FontWeight) -> f64 {
            text.chars().count() as f64 * f64::from(font_size) * 0.2
        }
    }

    fn scenario() -> Snapshot {
        Snapshot::new()
            .with_customers((1..=4).map(|id| {
                Customer::new(id, format!("Customer {id}"), format!("c{id}@example.com"))
            }))
            .with_products([Product::new(10, "A")])
            .with_links([CustomerProductLink::new(1, 10), CustomerProductLink::new(2, 10)])
    }

    fn sample_chart() -> ChartImage {
        ChartImage::from_rgba(400, 100, vec![255; 400 * 100 * 4]).expect("valid buffer")
    }

    fn find_text(layout: &PageLayout, text: &str) -> Option<Point> {
        layout
            .texts()
            .find(|(candidate, _)| *candidate == text)
            .map(|(_, origin)| origin)
    }

    #[test]
    fn panel_height_fits_longer_list() {
        assert_eq!(panel_height(0, 0), 20.0);
        assert_eq!(panel_height(4, 1), 41.0);
        assert_eq!(panel_height(1, 5), 55.0);
    }

    #[test]
    fn panel_height_is_monotonic() {
        for products in 0..10 {
            for customers in 0..6 {
                assert!(panel_height(customers + 1, products) >= panel_height(customers, products));
                assert!(panel_height(customers, products + 1) >= panel_height(customers, products));
            }
        }
    }

    #[test]
    fn fitted_image_stays_within_bounds_and_keeps_ratio() {
        for &(width, height) in &[(1600.0, 600.0), (100.0, 900.0), (500.0, 50.0), (180.0, 50.0)] {
            let (w, h) = fit_image(width, height, 180.0, 50.0);
            assert!(w <= 180.0 + 1e-9 && h <= 50.0 + 1e-9);
            assert!(((w / h) - (width / height)).abs() < 1e-9);
        }
    }

    #[test]
    fn end_to_end_scenario() {
        let snapshot = scenario();
        let chart = sample_chart();
        let layout = layout_dashboard(&snapshot, Some(&chart), &ReportLabels::default(), &FixedAdvance);

        assert!(find_text(&layout, "Total customers: 4").is_some());
        assert!(find_text(&layout, "Total products: 1").is_some());

        let name = find_text(&layout, "- A").expect("product row");
        let count = find_text(&layout, "2").expect("count cell");
        assert_eq!(name.y, count.y);
        let expected_right = MARGIN_MM + CONTENT_WIDTH_MM - CELL_PADDING_MM;
        let width = FixedAdvance.text_width("2", ROW_FONT_SIZE, FontWeight::Regular);
        assert!((count.x + width - expected_right).abs() < 1e-9);

        let recent: Vec<_> = layout
            .texts()
            .filter(|(text, _)| text.starts_with("- Customer"))
            .map(|(text, _)| text)
            .collect();
        assert_eq!(recent, vec!["- Customer 4", "- Customer 3", "- Customer 2"]);
    }

    #[test]
    fn chart_image_is_centered_in_band() {
        let chart = sample_chart();
        let layout = layout_dashboard(&scenario(), Some(&chart), &ReportLabels::default(), &FixedAdvance);

        let rect = layout.image_rect().expect("image drawn");
        assert!((rect.width - 180.0).abs() < 1e-9);
        assert!((rect.height - 45.0).abs() < 1e-9);
        let left_gap = rect.x - layout.chart_band.x;
        let right_gap = layout.chart_band.right() - rect.right();
        assert!((left_gap - right_gap).abs() < 1e-9);
        assert_eq!(rect.y, layout.chart_band.y + 15.0);
    }

    #[test]
    fn empty_state_renders_placeholder() {
        let snapshot = Snapshot::new();
        let labels = ReportLabels::default();
        let layout = layout_dashboard(&snapshot, None, &labels, &FixedAdvance);

        assert!(layout.image_rect().is_none());
        let placeholder = find_text(&layout, &labels.chart_placeholder).expect("placeholder");
        assert_eq!(placeholder.y, layout.chart_band.y + 40.0);
    }

    #[test]
    fn empty_chart_image_falls_back_to_placeholder() {
        let empty = ChartImage::from_rgba(0, 0, Vec::new()).expect("valid buffer");
        let labels = ReportLabels::default();
        let layout = layout_dashboard(&scenario(), Some(&empty), &labels, &FixedAdvance);

        assert!(layout.image_rect().is_none());
        assert!(find_text(&layout, &labels.chart_placeholder).is_some());
    }

    #[test]
    fn overflowing_products_are_folded_into_more_row() {
        let snapshot = Snapshot::new()
            .with_products((0..30).map(|id| Product::new(id, format!("P{id}"))));
        let layout = layout_dashboard(&snapshot, None, &ReportLabels::default(), &FixedAdvance);

        assert_eq!(max_panel_rows(), 20);
        assert!(find_text(&layout, "- P18").is_some());
        assert!(find_text(&layout, "- P19").is_none());
        assert!(find_text(&layout, "+11 more").is_some());
        assert!(layout.chart_band.bottom() <= PAGE_HEIGHT_MM - MARGIN_MM);
    }

    #[test]
    fn exactly_full_panel_is_not_truncated() {
        assert_eq!(visible_rows(20, 20), (20, 0));
        assert_eq!(visible_rows(21, 20), (19, 2));
        assert_eq!(visible_rows(3, 20), (3, 0));
    }
}
