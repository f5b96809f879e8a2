use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use dashboard_report::aggregate::{self, RECENT_CUSTOMER_LIMIT};
use dashboard_report::chart::EncodedChart;
use dashboard_report::layout::ReportLabels;
use dashboard_report::{DashboardReport, Snapshot, DEFAULT_OUTPUT_FILE};

/// Renders and inspects customer/product dashboard snapshots.
///
/// Fonts are searched under `DASHBOARD_REPORT_FONTS_DIR`, then `assets/fonts`
/// next to the executable or the library crate. Set `RUST_LOG=debug` for
/// layout diagnostics.
#[derive(Parser)]
#[command(author, version, about = "Dashboard PDF export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// JSON snapshot with `customers`, `products` and `links` arrays.
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the dashboard PDF.
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Output file.
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Embed this image instead of the generated bar chart.
        #[arg(long, conflicts_with = "no_chart")]
        chart: Option<PathBuf>,

        /// Leave the chart band empty.
        #[arg(long)]
        no_chart: bool,
    },

    /// Print totals, recent customers and customers per product.
    Summary {
        #[command(flatten)]
        input: InputArgs,
    },

    /// List customers with their assigned products.
    #[command(aliases = ["directory"])]
    Customers {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            input,
            output,
            chart,
            no_chart,
        } => render(&input.input, &output, chart, no_chart),
        Commands::Summary { input } => summary(&input.input),
        Commands::Customers { input } => customers(&input.input),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn load_snapshot(path: &Path) -> Result<Snapshot, Box<dyn Error>> {
    let json = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read snapshot {}: {}", path.display(), err))?;
    let snapshot = Snapshot::from_json(&json)?;
    log::debug!(
        "loaded snapshot from {}: {} customers, {} products, {} links",
        path.display(),
        snapshot.customers.len(),
        snapshot.products.len(),
        snapshot.links.len()
    );
    Ok(snapshot)
}

fn render(
    input: &Path,
    output: &Path,
    chart: Option<PathBuf>,
    no_chart: bool,
) -> Result<(), Box<dyn Error>> {
    let mut report = DashboardReport::new(load_snapshot(input)?);
    if no_chart {
        report = report.without_chart();
    } else if let Some(chart) = chart {
        report = report.with_chart_source(EncodedChart::from_path(chart));
    }

    let rendered = report.save(output)?;
    println!(
        "Generated {} ({} bytes)",
        output.display(),
        rendered.bytes.len()
    );
    Ok(())
}

fn summary(input: &Path) -> Result<(), Box<dyn Error>> {
    let snapshot = load_snapshot(input)?;
    let labels = ReportLabels::default();

    println!("{} {}", labels.total_customers, snapshot.customers.len());
    println!("{} {}", labels.total_products, snapshot.products.len());

    println!();
    println!("{}", labels.recent_customers);
    for customer in aggregate::recent_customers(&snapshot.customers, RECENT_CUSTOMER_LIMIT) {
        println!("  - {} <{}>", customer.name, customer.email);
    }

    println!();
    println!("{}", labels.customers_per_product);
    for entry in aggregate::customers_per_product(&snapshot.products, &snapshot.links) {
        println!("  - {}: {}", entry.product.name, entry.count);
    }
    Ok(())
}

fn customers(input: &Path) -> Result<(), Box<dyn Error>> {
    let snapshot = load_snapshot(input)?;
    let labels = ReportLabels::default();

    for entry in aggregate::customer_directory(&snapshot.customers, &snapshot.products, &snapshot.links) {
        let products = if entry.products.is_empty() {
            "no products assigned".to_owned()
        } else {
            entry
                .products
                .iter()
                .map(|label| label.display(&labels.deleted_product))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{} <{}>: {}",
            entry.customer.name, entry.customer.email, products
        );
    }
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
