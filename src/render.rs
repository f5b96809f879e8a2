//! PDF backend painting a [`PageLayout`] onto a single A4 page.
//!
//! The layout is expressed with a top-left origin while PDF user space starts
//! at the bottom left, so every vertical coordinate is flipped here.

use std::io::BufWriter;

use genpdf::style::Color;
use printpdf::{
    IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point as PdfPoint, Rgb,
};

use crate::error::ReportError;
use crate::fonts::ReportFonts;
use crate::layout::{DrawOp, FontWeight, PageLayout, Rect, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::model::ChartImage;

const IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const OUTLINE_THICKNESS_PT: f64 = 0.57;
const LAYER_NAME: &str = "Dashboard";

fn pdf_color(color: Color) -> printpdf::Color {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Greyscale(value) => (value, value, value),
        Color::Cmyk(c, m, y, k) => {
            let channel = |value: u8| {
                let white = (255 - u16::from(value)) * (255 - u16::from(k)) / 255;
                white as u8
            };
            (channel(c), channel(m), channel(y))
        }
    };
    printpdf::Color::Rgb(Rgb::new(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
        None,
    ))
}

fn page_point(x: f64, y: f64) -> PdfPoint {
    PdfPoint::new(Mm(x), Mm(PAGE_HEIGHT_MM - y))
}

fn rect_outline(rect: Rect, has_fill: bool) -> Line {
    Line {
        points: vec![
            (page_point(rect.x, rect.y), false),
            (page_point(rect.right(), rect.y), false),
            (page_point(rect.right(), rect.bottom()), false),
            (page_point(rect.x, rect.bottom()), false),
        ],
        is_closed: true,
        has_fill,
        has_stroke: true,
        is_clipping_path: false,
    }
}

struct PageFonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl PageFonts {
    fn get(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

fn add_image(layer: &PdfLayerReference, image: &ChartImage, rect: Rect) -> Result<(), ReportError> {
    let dynamic = image.to_dynamic_image().ok_or_else(|| {
        ReportError::Pdf("chart pixel buffer does not match its dimensions".to_owned())
    })?;
    // Embedded as RGB; the chart is drawn on an opaque background.
    let rgb = image::DynamicImage::ImageRgb8(dynamic.to_rgb8());

    let natural_width = MM_PER_INCH * f64::from(image.width()) / IMAGE_DPI;
    let natural_height = MM_PER_INCH * f64::from(image.height()) / IMAGE_DPI;

    printpdf::Image::from_dynamic_image(&rgb).add_to_layer(
        layer.clone(),
        Some(Mm(rect.x)),
        Some(Mm(PAGE_HEIGHT_MM - rect.bottom())),
        None,
        Some(rect.width / natural_width),
        Some(rect.height / natural_height),
        Some(IMAGE_DPI),
    );
    Ok(())
}

fn paint(
    layer: &PdfLayerReference,
    layout: &PageLayout,
    chart: Option<&ChartImage>,
    fonts: &PageFonts,
) -> Result<(), ReportError> {
    layer.set_outline_thickness(OUTLINE_THICKNESS_PT);

    for op in &layout.ops {
        match op {
            DrawOp::FilledRect {
                rect,
                fill,
                outline,
            } => {
                layer.set_fill_color(pdf_color(*fill));
                layer.set_outline_color(pdf_color(*outline));
                layer.add_shape(rect_outline(*rect, true));
            }
            DrawOp::StrokedRect { rect, outline } => {
                layer.set_outline_color(pdf_color(*outline));
                layer.add_shape(rect_outline(*rect, false));
            }
            DrawOp::Line { from, to, color } => {
                layer.set_outline_color(pdf_color(*color));
                layer.add_shape(Line {
                    points: vec![(page_point(from.x, from.y), false), (page_point(to.x, to.y), false)],
                    is_closed: false,
                    has_fill: false,
                    has_stroke: true,
                    is_clipping_path: false,
                });
            }
            DrawOp::Text {
                text,
                origin,
                style,
            } => {
                layer.set_fill_color(pdf_color(style.color));
                layer.use_text(
                    text.as_str(),
                    f64::from(style.font_size),
                    Mm(origin.x),
                    Mm(PAGE_HEIGHT_MM - origin.y),
                    fonts.get(style.weight),
                );
            }
            DrawOp::Image { rect } => match chart {
                Some(image) => add_image(layer, image, *rect)?,
                None => log::warn!("layout requested a chart image but none was captured"),
            },
        }
    }

    Ok(())
}

/// Paints `layout` and returns the serialized PDF document.
pub fn render_pdf(
    title: &str,
    layout: &PageLayout,
    chart: Option<&ChartImage>,
    fonts: &ReportFonts,
) -> Result<Vec<u8>, ReportError> {
    assemble(title, layout, chart, |document| {
        Ok(PageFonts {
            regular: document
                .add_external_font(fonts.face_bytes(FontWeight::Regular))
                .map_err(|err| ReportError::Pdf(format!("failed to embed regular font: {err}")))?,
            bold: document
                .add_external_font(fonts.face_bytes(FontWeight::Bold))
                .map_err(|err| ReportError::Pdf(format!("failed to embed bold font: {err}")))?,
        })
    })
}

fn assemble<F>(
    title: &str,
    layout: &PageLayout,
    chart: Option<&ChartImage>,
    embed_fonts: F,
) -> Result<Vec<u8>, ReportError>
where
    F: FnOnce(&PdfDocumentReference) -> Result<PageFonts, ReportError>,
{
    let (document, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
    let page_fonts = embed_fonts(&document)?;

    {
        let layer = document.get_page(page).get_layer(layer);
        paint(&layer, layout, chart, &page_fonts)?;
    }

    let mut writer = BufWriter::new(Vec::new());
    document
        .save(&mut writer)
        .map_err(|err| ReportError::Pdf(format!("failed to serialize document: {err}")))?;
    writer
        .into_inner()
        .map_err(|err| ReportError::Io(err.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{layout_dashboard, ReportLabels, TextMetrics};
    use crate::model::{Customer, CustomerProductLink, Product, Snapshot};
    use lopdf::content::Operation;
    use printpdf::BuiltinFont;

    const PT_PER_MM: f64 = 72.0 / 25.4;
    // Content stream reals are written with two decimals.
    const PT_TOLERANCE: f64 = 0.02;

    struct FixedAdvance;

    impl TextMetrics for FixedAdvance {
        fn text_width(&self, text: &str, font_size: u8, _weight: FontWeight) -> f64 {
            text.chars().count() as f64 * f64::from(font_size) * 0.2
        }
    }

    fn builtin_fonts(document: &PdfDocumentReference) -> Result<PageFonts, ReportError> {
        let embed = |font| {
            document
                .add_builtin_font(font)
                .map_err(|err| ReportError::Pdf(err.to_string()))
        };
        Ok(PageFonts {
            regular: embed(BuiltinFont::Helvetica)?,
            bold: embed(BuiltinFont::HelveticaBold)?,
        })
    }

    fn painted_page(chart: Option<&ChartImage>) -> (PageLayout, lopdf::Document, Vec<Operation>) {
        let snapshot = Snapshot::new()
            .with_customers([
                Customer::new(1, "Ana", "ana@example.com"),
                Customer::new(2, "Luis", "luis@example.com"),
            ])
            .with_products([Product::new(10, "Hosting"), Product::new(20, "Backups")])
            .with_links([CustomerProductLink::new(1, 10), CustomerProductLink::new(2, 10)]);
        let layout = layout_dashboard(&snapshot, chart, &ReportLabels::default(), &FixedAdvance);

        let bytes = assemble("Dashboard", &layout, chart, builtin_fonts).expect("assemble pdf");
        let document = lopdf::Document::load_mem(&bytes).expect("parse pdf");
        let page = *document.get_pages().values().next().expect("one page");
        let operations = document
            .get_and_decode_page_content(page)
            .expect("decode page content")
            .operations;
        (layout, document, operations)
    }

    fn operands(operation: &Operation) -> Vec<f64> {
        operation
            .operands
            .iter()
            .map(|operand| f64::from(operand.as_float().expect("numeric operand")))
            .collect()
    }

    fn assert_pt(actual: f64, expected_mm: f64) {
        let expected = expected_mm * PT_PER_MM;
        assert!(
            (actual - expected).abs() < PT_TOLERANCE,
            "expected {expected} pt, got {actual} pt"
        );
    }

    #[test]
    fn page_points_flip_the_vertical_axis() {
        let top_left = page_point(10.0, 0.0);
        assert_pt(top_left.x.0, 10.0);
        assert_pt(top_left.y.0, PAGE_HEIGHT_MM);

        let bottom = page_point(0.0, PAGE_HEIGHT_MM);
        assert_pt(bottom.y.0, 0.0);
    }

    #[test]
    fn rect_outline_walks_the_corners_clockwise() {
        let outline = rect_outline(Rect::new(10.0, 20.0, 30.0, 40.0), true);
        assert!(outline.is_closed && outline.has_fill && outline.has_stroke);

        let corners: Vec<(f64, f64)> = outline
            .points
            .iter()
            .map(|(point, _)| (point.x.0 / PT_PER_MM, point.y.0 / PT_PER_MM))
            .collect();
        let expected = [(10.0, 277.0), (40.0, 277.0), (40.0, 237.0), (10.0, 237.0)];
        for ((x, y), (ex, ey)) in corners.into_iter().zip(expected) {
            assert!((x - ex).abs() < 1e-6 && (y - ey).abs() < 1e-6);
        }
    }

    #[test]
    fn text_runs_are_written_at_their_layout_origins() {
        let (layout, _, operations) = painted_page(None);

        let shown: Vec<String> = operations
            .iter()
            .filter(|operation| operation.operator == "Tj")
            .map(|operation| {
                let bytes = operation.operands[0].as_str().expect("string operand");
                String::from_utf8_lossy(bytes).into_owned()
            })
            .collect();
        let expected: Vec<&str> = layout.texts().map(|(text, _)| text).collect();
        assert_eq!(shown, expected);
        assert_eq!(shown[0], "Dashboard");

        let cursors: Vec<Vec<f64>> = operations
            .iter()
            .filter(|operation| operation.operator == "Td")
            .map(operands)
            .collect();
        assert_eq!(cursors.len(), expected.len());
        for (cursor, (_, origin)) in cursors.iter().zip(layout.texts()) {
            assert_pt(cursor[0], origin.x);
            assert_pt(cursor[1], PAGE_HEIGHT_MM - origin.y);
        }
    }

    #[test]
    fn chart_image_is_placed_at_its_layout_rectangle() {
        let chart = ChartImage::from_rgba(4, 2, vec![200; 32]).expect("valid pixels");
        let (layout, document, operations) = painted_page(Some(&chart));
        let rect = layout.image_rect().expect("image placed");

        let draw = operations
            .iter()
            .position(|operation| operation.operator == "Do")
            .expect("image drawn");
        let transforms: Vec<Vec<f64>> = operations[..draw]
            .iter()
            .filter(|operation| operation.operator == "cm")
            .map(operands)
            .collect();
        let [.., translate, scale] = transforms.as_slice() else {
            panic!("expected translate and scale before the image");
        };

        assert_pt(translate[4], rect.x);
        assert_pt(translate[5], PAGE_HEIGHT_MM - rect.bottom());
        assert_pt(scale[0], rect.width);
        assert_pt(scale[3], rect.height);

        let image_width = document.objects.values().find_map(|object| {
            let stream = object.as_stream().ok()?;
            let subtype = stream.dict.get(b"Subtype").and_then(|value| value.as_name_str());
            if subtype.ok()? != "Image" {
                return None;
            }
            stream.dict.get(b"Width").and_then(|value| value.as_i64()).ok()
        });
        assert_eq!(image_width, Some(4));
    }

    #[test]
    fn missing_chart_leaves_the_page_without_images() {
        let (_, _, operations) = painted_page(None);
        assert!(!operations.iter().any(|operation| operation.operator == "Do"));
    }

    #[test]
    fn colors_are_normalized() {
        match pdf_color(Color::Rgb(255, 0, 51)) {
            printpdf::Color::Rgb(rgb) => {
                assert_eq!(rgb.r, 1.0);
                assert_eq!(rgb.g, 0.0);
                assert!((rgb.b - 0.2).abs() < 1e-9);
            }
            _ => panic!("expected an RGB color"),
        }
    }
}
