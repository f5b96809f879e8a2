//! Entry points producing the dashboard PDF.

use std::fs;
use std::path::Path;

use log::{debug, error, info};

use crate::aggregate;
use crate::chart::{BarChart, CaptureOptions, ChartSource};
use crate::error::ReportError;
use crate::fonts::ReportFonts;
use crate::layout::{self, PageLayout, ReportLabels};
use crate::model::{ChartImage, Snapshot};
use crate::render;

/// File name the report is saved under by [`export_dashboard`].
pub const DEFAULT_OUTPUT_FILE: &str = "dashboard.pdf";

enum ChartChoice {
    /// Bar chart rasterized from the snapshot aggregates.
    Aggregates,
    Source(Box<dyn ChartSource>),
    Omitted,
}

/// Rendered document together with the layout it was painted from.
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub layout: PageLayout,
}

/// Builder for the dashboard report of one [`Snapshot`].
///
/// By default the chart band embeds a bar chart of customers per product
/// computed from the snapshot itself.
pub struct DashboardReport {
    snapshot: Snapshot,
    labels: ReportLabels,
    chart: ChartChoice,
    fonts: Option<ReportFonts>,
}

impl DashboardReport {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            labels: ReportLabels::default(),
            chart: ChartChoice::Aggregates,
            fonts: None,
        }
    }

    /// Replaces the user-visible strings.
    pub fn with_labels(mut self, labels: ReportLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Embeds the image captured from `source` instead of the built-in chart.
    pub fn with_chart_source<S>(mut self, source: S) -> Self
    where
        S: ChartSource + 'static,
    {
        self.chart = ChartChoice::Source(Box::new(source));
        self
    }

    /// Leaves the chart band with its placeholder text.
    pub fn without_chart(mut self) -> Self {
        self.chart = ChartChoice::Omitted;
        self
    }

    /// Uses already loaded fonts instead of searching for them on render.
    pub fn with_fonts(mut self, fonts: ReportFonts) -> Self {
        self.fonts = Some(fonts);
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn labels(&self) -> &ReportLabels {
        &self.labels
    }

    /// Captures the chart image with decorations suppressed.  The built-in
    /// chart is labelled only when fonts were supplied with [`Self::with_fonts`].
    pub fn capture_chart(&self) -> Result<Option<ChartImage>, ReportError> {
        self.capture_with(self.fonts.as_ref())
    }

    fn capture_with(&self, fonts: Option<&ReportFonts>) -> Result<Option<ChartImage>, ReportError> {
        let options = CaptureOptions::for_print();
        let image = match &self.chart {
            ChartChoice::Aggregates => {
                let series = aggregate::chart_series(&self.snapshot.products, &self.snapshot.links);
                let mut chart = BarChart::from_series(&series);
                if let Some(fonts) = fonts {
                    chart = chart.with_font(fonts.chart_font()?);
                }
                chart.capture(options)?
            }
            ChartChoice::Source(source) => source.capture(options)?,
            ChartChoice::Omitted => None,
        };
        Ok(image)
    }

    /// Renders the report into memory.
    pub fn render(&self) -> Result<RenderedReport, ReportError> {
        let loaded;
        let fonts = match &self.fonts {
            Some(fonts) => fonts,
            None => {
                loaded = ReportFonts::load().map_err(ReportError::FontLoad)?;
                &loaded
            }
        };

        let chart = self.capture_with(Some(fonts))?;
        debug!(
            "rendering dashboard: {} customers, {} products, {} links, chart: {}",
            self.snapshot.customers.len(),
            self.snapshot.products.len(),
            self.snapshot.links.len(),
            chart
                .as_ref()
                .map(|image| format!("{}x{}", image.width(), image.height()))
                .unwrap_or_else(|| "none".to_owned())
        );

        let layout = layout::layout_dashboard(&self.snapshot, chart.as_ref(), &self.labels, fonts);
        let bytes = render::render_pdf(&self.labels.title, &layout, chart.as_ref(), fonts)?;
        Ok(RenderedReport { bytes, layout })
    }

    /// Renders the report and writes it to `path`.  Nothing is written when
    /// rendering fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<RenderedReport, ReportError> {
        let path = path.as_ref();
        let report = self.render()?;
        fs::write(path, &report.bytes)?;
        info!(
            "Saved dashboard report to {} ({} bytes)",
            path.display(),
            report.bytes.len()
        );
        Ok(report)
    }
}

/// Renders `snapshot` to [`DEFAULT_OUTPUT_FILE`] in the working directory.
///
/// Failures are logged and otherwise ignored; use [`DashboardReport::save`]
/// to handle them.
pub fn export_dashboard(snapshot: Snapshot) {
    if let Err(err) = DashboardReport::new(snapshot).save(DEFAULT_OUTPUT_FILE) {
        error!("Error generating the dashboard PDF: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{CaptureError, StaticChart};
    use crate::model::{CustomerProductLink, Product};

    struct FailingChart;

    impl ChartSource for FailingChart {
        fn capture(&self, _options: CaptureOptions) -> Result<Option<ChartImage>, CaptureError> {
            Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "element detached",
            )))
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new()
            .with_products([Product::new(10, "A")])
            .with_links([CustomerProductLink::new(1, 10)])
    }

    #[test]
    fn default_chart_comes_from_aggregates() {
        let chart = DashboardReport::new(snapshot()).capture_chart().unwrap();
        assert!(chart.is_some());
    }

    #[test]
    fn empty_snapshot_has_no_chart() {
        let chart = DashboardReport::new(Snapshot::new()).capture_chart().unwrap();
        assert!(chart.is_none());
    }

    #[test]
    fn omitted_chart_captures_nothing() {
        let report = DashboardReport::new(snapshot()).without_chart();
        assert!(report.capture_chart().unwrap().is_none());
    }

    #[test]
    fn custom_source_replaces_builtin_chart() {
        let source = StaticChart::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap();
        let chart = DashboardReport::new(snapshot())
            .with_chart_source(source)
            .capture_chart()
            .unwrap()
            .expect("static image");
        assert_eq!((chart.width(), chart.height()), (1, 1));
    }

    #[test]
    fn capture_failure_is_reported() {
        let err = DashboardReport::new(snapshot())
            .with_chart_source(FailingChart)
            .capture_chart()
            .err()
            .expect("capture fails");
        assert!(matches!(err, ReportError::Capture(_)));
    }

    #[test]
    fn failed_save_writes_nothing() {
        let path = std::env::temp_dir().join("dashboard_report_capture_failure.pdf");
        let _ = fs::remove_file(&path);

        let result = DashboardReport::new(snapshot())
            .with_chart_source(FailingChart)
            .save(&path);

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
