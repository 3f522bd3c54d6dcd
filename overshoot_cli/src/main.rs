use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use overshoot::chart::{TITLE, X_LABEL, X_TICKS, Y_LABEL, Y_TICKS};
use overshoot::{run_pipeline, DebtChart, DebtTable, PipelineConfig};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ecological overshoot day and debt CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute overshoot days and ecological debt, then draw the debt chart
    Run(RunArgs),
    /// Compute the annotated annual table without drawing anything
    Table(TableArgs),
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// JSON file with pipeline settings; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Base directory holding the data and figures directories
    #[arg(long, value_hint = ValueHint::DirPath)]
    root: Option<PathBuf>,

    /// Data directory, relative to the root
    #[arg(long, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Figures directory, relative to the root
    #[arg(long, value_hint = ValueHint::DirPath)]
    figures_dir: Option<PathBuf>,

    /// Trends CSV file name inside the data directory
    #[arg(long)]
    trends_file: Option<String>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Figure file name inside the figures directory
    #[arg(long)]
    figure_name: Option<String>,

    /// Also write the chart as SVG
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Optional CSV path for the annotated table
    #[arg(long, value_hint = ValueHint::FilePath)]
    table: Option<PathBuf>,

    /// Optional JSON path for the chart data
    #[arg(long, value_hint = ValueHint::FilePath)]
    chart_json: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TableArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Run(args) => args.config.verbose,
        Command::Table(args) => args.config.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Table(args) => handle_table(args),
    }
}

fn resolve_config(args: &ConfigArgs) -> Result<PipelineConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = args.root.as_ref() {
        config.root = root.clone();
    }
    if let Some(dir) = args.data_dir.as_ref() {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = args.figures_dir.as_ref() {
        config.figures_dir = dir.clone();
    }
    if let Some(name) = args.trends_file.as_ref() {
        config.trends_file = name.clone();
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid pipeline config", path.display()))?;
    Ok(config)
}

fn compute(config: &PipelineConfig) -> Result<DebtTable> {
    let trends = config.trends_path();
    let table = run_pipeline(config, None)
        .with_context(|| format!("failed to process {}", trends.display()))?;

    let years = table.year_range();
    let last = *years.end();
    info!(
        "Loaded {} years ({}..{})",
        table.len(),
        years.start(),
        years.end()
    );
    if let Some(year) = table.first_overshoot_year() {
        info!("First overshoot year: {}", year);
    }
    let debt = table.final_cumulative_debt();
    info!(
        "Cumulative debt carried into {}: {:.1} days ({:.2} years)",
        last,
        debt,
        debt / config.days_per_year
    );
    Ok(table)
}

fn handle_run(args: RunArgs) -> Result<()> {
    let mut config = resolve_config(&args.config)?;
    if let Some(name) = args.figure_name.as_ref() {
        config.figure_name = name.clone();
    }

    let table = compute(&config)?;

    if let Some(path) = args.table.as_ref() {
        write_table_csv(&table, path)?;
        info!("Wrote annual table: {}", path.display());
    }

    let chart = DebtChart::from_records(&table, &config);

    if let Some(path) = args.chart_json.as_ref() {
        let text = serde_json::to_string_pretty(&chart)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote chart data: {}", path.display());
    }

    if args.no_plot {
        return Ok(());
    }

    let figures = config.figures_path();
    fs::create_dir_all(&figures)
        .with_context(|| format!("failed to create {}", figures.display()))?;

    let png_path = config.figure_path();
    render_chart_guard(&chart, &png_path, ChartKind::Png)
        .map_err(|err| anyhow!("failed to render {}: {}", png_path.display(), err))?;
    info!("Wrote plot: {}", png_path.display());

    if let Some(path) = args.svg.as_ref() {
        if let Err(err) = render_chart_guard(&chart, path, ChartKind::Svg) {
            warn!("Skipping SVG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote plot: {}", path.display());
        }
    }

    Ok(())
}

fn handle_table(args: TableArgs) -> Result<()> {
    let config = resolve_config(&args.config)?;
    let table = compute(&config)?;

    if args.output.as_os_str() == "-" {
        write_table_stdout(&table)?;
    } else {
        write_table_csv(&table, &args.output)?;
        info!("Wrote annual table: {}", args.output.display());
    }
    Ok(())
}

fn write_table_stdout(table: &DebtTable) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_table_rows(table, &mut writer)
}

fn write_table_csv(table: &DebtTable, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_table_rows(table, &mut writer)
}

fn write_table_rows<W: Write>(table: &DebtTable, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "year",
        "eco_footprint",
        "biocapacity",
        "overshoot_day",
        "overshoot_day_formatted",
        "annual_debt",
        "cumulative_debt",
    ])?;

    for record in table.records() {
        let annual = &record.overshoot.annual;
        writer.write_record([
            annual.year.to_string(),
            annual.eco_footprint.to_string(),
            annual.biocapacity.to_string(),
            format!("{:.3}", record.overshoot.overshoot_day),
            record.overshoot.overshoot_day_formatted.to_string(),
            format_days(record.annual_debt),
            format_days(record.cumulative_debt),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn format_days(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:.3}", value)
    }
}

enum ChartKind {
    Png,
    Svg,
}

fn render_chart_guard(chart: &DebtChart, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_chart(chart, path, kind).map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(chart: &DebtChart, path: &Path, kind: ChartKind) -> Result<()> {
    match kind {
        ChartKind::Png => {
            let backend = BitMapBackend::new(path, (1000, 700));
            let root = FontSafeBackend::new(backend).into_drawing_area();
            draw_chart(root, chart)?;
        }
        ChartKind::Svg => {
            let backend = SVGBackend::new(path, (1000, 700));
            let root = FontSafeBackend::new(backend).into_drawing_area();
            draw_chart(root, chart)?;
        }
    }
    Ok(())
}

fn draw_chart<DB>(root: DrawingArea<DB, plotters::coord::Shift>, data: &DebtChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (x0, x1) = data.x_range;
    let (y0, y1) = data.y_range;
    let title_font = FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Normal);
    let axis_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal);

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, title_font)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Right, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x0..x1, y0..y1)?
        .set_secondary_coord(x0..x1, y0..y1);

    let x_labels = ((x1 - x0) / X_TICKS.0).floor() as usize + 1;
    let y_labels = ((y1 - y0) / Y_TICKS.0).floor() as usize + 1;

    chart
        .configure_mesh()
        .bold_line_style(&TRANSPARENT)
        .light_line_style(&BLACK.mix(0.05))
        .max_light_lines((Y_TICKS.0 / Y_TICKS.1) as usize - 1)
        .x_labels(x_labels)
        .y_labels(y_labels)
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.clone().color(&BLACK.mix(0.85)))
        .draw()?;

    chart
        .configure_secondary_axes()
        .y_labels(y_labels)
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    chart
        .draw_series(data.visible_bars().map(|bar| {
            let x = bar.year as f64;
            Rectangle::new([(x - 0.5, 0.0), (x + 0.5, bar.value)], BLACK.mix(0.25).filled())
        }))?
        .label(data.legend.clone())
        .legend(|(x, y)| Rectangle::new([(x, y - 6), (x + 20, y + 6)], BLACK.mix(0.25).filled()));

    chart.draw_series(data.visible_bars().map(|bar| {
        let x = bar.year as f64;
        Rectangle::new([(x - 0.5, 0.0), (x + 0.5, bar.value)], plotters::style::Color::stroke_width(&BLACK, 1))
    }))?;

    let legend_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal);
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(legend_font.color(&BLACK))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Passes drawing through to `inner`, but drops text the font stack cannot
/// render instead of failing the whole figure.
struct FontSafeBackend<DB> {
    inner: DB,
}

impl<DB> FontSafeBackend<DB> {
    fn new(inner: DB) -> Self {
        Self { inner }
    }
}

impl<DB: DrawingBackend> DrawingBackend for FontSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.draw_text(text, style, pos)
        })) {
            Ok(Err(DrawingErrorKind::FontError(err))) => {
                warn!("Dropping label '{}': {}", text, err);
                Ok(())
            }
            Ok(result) => result,
            Err(_) => {
                warn!("Dropping label '{}': font backend panicked", text);
                Ok(())
            }
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.estimate_text_size(text, style)
        })) {
            Ok(Ok(size)) => Ok(size),
            _ => {
                // Rough box: glyphs about 0.6 em wide, one em tall.
                let em = style.size().max(1.0);
                let width = text.chars().count() as f64 * em * 0.6;
                Ok((width.ceil() as u32, em.ceil() as u32))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_days_blanks_nan() {
        assert_eq!(format_days(f64::NAN), "");
        assert_eq!(format_days(73.0), "73.000");
        assert_eq!(format_days(-3.25), "-3.250");
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"data_dir": "inputs", "figures_dir": "plots"}"#).unwrap();

        let args = ConfigArgs {
            config: Some(path),
            root: Some(PathBuf::from("/srv")),
            data_dir: None,
            figures_dir: Some(PathBuf::from("out")),
            trends_file: None,
            verbose: false,
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(
            config.trends_path(),
            PathBuf::from("/srv/inputs/Country_Trends.csv")
        );
        assert_eq!(config.figures_path(), PathBuf::from("/srv/out"));
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "overshoot",
            "run",
            "--root",
            "/tmp/eco",
            "--no-plot",
            "--table",
            "debt.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert!(args.no_plot);
                assert_eq!(args.table, Some(PathBuf::from("debt.csv")));
                assert_eq!(args.config.root, Some(PathBuf::from("/tmp/eco")));
            }
            Command::Table(_) => panic!("expected run"),
        }
    }
}
