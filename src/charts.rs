use crate::config::ChartsConfig;
use crate::error::{PipelineError, Result};
use crate::report::{format_count, Report};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// One bar of a ranked chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub label: String,
    pub value: u64,
}

/// A horizontal ranked bar chart: bars in rank order, first bar drawn on top.
#[derive(Debug, Clone)]
pub struct BarChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
    pub color: RGBColor,
}

impl BarChartSpec {
    pub fn deaths(report: &Report) -> Self {
        Self {
            title: format!("Top {} cities by number of deaths", report.top_n),
            x_label: "Number of deaths".to_string(),
            y_label: "City".to_string(),
            bars: report
                .top_deaths()
                .iter()
                .map(|t| Bar {
                    label: t.city.clone(),
                    value: t.deaths,
                })
                .collect(),
            color: RGBColor(178, 34, 34),
        }
    }

    /// Cities without a population estimate have no bar to draw and are skipped.
    pub fn population(report: &Report) -> Self {
        Self {
            title: format!(
                "Top {} most populous cities (2019 estimate)",
                report.top_n
            ),
            x_label: "Estimated population".to_string(),
            y_label: "City".to_string(),
            bars: report
                .top_population()
                .iter()
                .filter_map(|e| {
                    e.estimated_population.map(|value| Bar {
                        label: e.city.clone(),
                        value,
                    })
                })
                .collect(),
            color: RGBColor(31, 119, 180),
        }
    }

    fn x_max(&self) -> u64 {
        let max = self.bars.iter().map(|b| b.value).max().unwrap_or(0).max(1);
        // headroom so the longest bar does not touch the frame
        max.saturating_add(max / 20).max(max.saturating_add(1))
    }

    /// Bar label for a y segment; rank 0 sits in the topmost segment.
    fn label_at(&self, segment: usize) -> Option<&str> {
        let n = self.bars.len();
        if segment >= n {
            return None;
        }
        Some(self.bars[n - 1 - segment].label.as_str())
    }
}

fn chart_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Chart(e.to_string())
}

/// Render `spec` to `path`. `.svg` files use the SVG backend, anything else is a bitmap.
#[instrument(skip_all, fields(path = %path.display(), bars = spec.bars.len()))]
pub fn render_bar_chart(path: &Path, spec: &BarChartSpec, size: (u32, u32)) -> Result<()> {
    let is_svg = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_bar_chart(&root, spec)?;
        root.present().map_err(chart_error)?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_bar_chart(&root, spec)?;
        root.present().map_err(chart_error)?;
    }
    Ok(())
}

fn draw_bar_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &BarChartSpec,
) -> Result<()> {
    root.fill(&WHITE).map_err(chart_error)?;

    let rows = spec.bars.len().max(1);
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(200)
        .build_cartesian_2d(0u64..spec.x_max(), (0usize..rows).into_segmented())
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        // segment boundaries carry no label, so their ticks would stand alone
        .set_tick_mark_size(LabelAreaPosition::Left, 0)
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .y_labels(rows)
        .x_label_formatter(&|v: &u64| format_count(*v))
        .y_label_formatter(&|v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => spec.label_at(*i).unwrap_or_default().to_string(),
            _ => String::new(),
        })
        .draw()
        .map_err(chart_error)?;

    let n = spec.bars.len();
    let style = spec.color.filled();
    chart
        .draw_series(spec.bars.iter().enumerate().map(|(rank, bar)| {
            let row = n - 1 - rank;
            let mut rect = Rectangle::new(
                [
                    (0u64, SegmentValue::Exact(row)),
                    (bar.value, SegmentValue::Exact(row + 1)),
                ],
                style,
            );
            rect.set_margin(3, 3, 0, 0);
            rect
        }))
        .map_err(chart_error)?;

    Ok(())
}

/// Render the deaths and population charts for `report` into `config.output_dir`.
/// Returns the written paths in that order.
pub fn render_report_charts(report: &Report, config: &ChartsConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.output_dir)?;
    let size = (config.width, config.height);

    let charts = [
        (&config.deaths_file, BarChartSpec::deaths(report)),
        (&config.population_file, BarChartSpec::population(report)),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file, spec) in charts {
        let path = config.output_dir.join(file);
        render_bar_chart(&path, &spec, size)?;
        info!("Saved chart {}", path.display());
        println!("Chart '{}' saved.", path.display());
        written.push(path);
    }
    Ok(written)
}
