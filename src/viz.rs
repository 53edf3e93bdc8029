//! Chart rendering: trend lines, regional coverage, state rankings, to
//! **PNG** or **SVG**, plus the choropleth color-bucketing helper used by
//! map frontends.
//!
//! - `.svg` extension selects the SVG backend; anything else rasterizes
//!   through the bitmap backend at 2× the requested logical size over a
//!   white background.
//! - Fixed series colors match the dashboard palette (region colors are
//!   stable per macro-region, not positional).

use crate::compare::{RegionalTrendRow, TrendRow};
use crate::models::EstablishmentCount;
use crate::regions::Region;
use anyhow::{Result, anyhow};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::LineSeries;

use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;

use std::path::Path;
use std::sync::Once;

/// Raster output renders at this multiple of the logical size.
const RASTER_SCALE: u32 = 2;

/// Sequential choropleth palette, lightest to darkest.
pub const CHOROPLETH_PALETTE: [RGBColor; 6] = [
    RGBColor(0xFE, 0xE5, 0xD9),
    RGBColor(0xFC, 0xBB, 0xA1),
    RGBColor(0xFC, 0x92, 0x72),
    RGBColor(0xFB, 0x6A, 0x4A),
    RGBColor(0xDE, 0x2D, 0x26),
    RGBColor(0xA5, 0x0F, 0x15),
];

/// Headline metric colors: total (blue), SUS (green), critical (red).
const TREND_COLORS: [RGBColor; 3] = [
    RGBColor(0x3B, 0x82, 0xF6),
    RGBColor(0x16, 0xA3, 0x4A),
    RGBColor(0xEF, 0x44, 0x44),
];

/// Default series color for values outside the region palette.
pub const COR_PADRAO: RGBColor = RGBColor(0x00, 0x4F, 0x6D);

/// Stable chart color for a macro-region.
pub fn region_color(region: Region) -> RGBColor {
    match region {
        Region::Norte => RGBColor(0x3B, 0x82, 0xF6),
        Region::Nordeste => RGBColor(0xEF, 0x44, 0x44),
        Region::CentroOeste => RGBColor(0x22, 0xC5, 0x5E),
        Region::Sudeste => RGBColor(0xF5, 0x9E, 0x0B),
        Region::Sul => RGBColor(0x8B, 0x5C, 0xF6),
    }
}

/// Map a continuous value onto the 6-bucket choropleth palette.
///
/// A degenerate range (`min == max`) always lands in the first bucket;
/// otherwise `floor((value-min)/(max-min) * 6)` clamped to `[0, 5]`.
pub fn bucket_index(value: f64, min: f64, max: f64) -> usize {
    if min == max {
        return 0;
    }
    let percentage = (value - min) / (max - min);
    ((percentage * CHOROPLETH_PALETTE.len() as f64).floor() as isize)
        .clamp(0, CHOROPLETH_PALETTE.len() as isize - 1) as usize
}

/// Bucketed choropleth color for a value within `[min, max]`.
pub fn bucket_color(value: f64, min: f64, max: f64) -> RGBColor {
    CHOROPLETH_PALETTE[bucket_index(value, min, max)]
}

/// One-time registration for a fallback "sans-serif" font when using the
/// `ab_glyph` text path. Required because `ab_glyph` doesn't discover OS
/// fonts.
static INIT_FONTS: Once = Once::new();

fn ensure_fonts_registered() {
    // Safe to call many times; only runs once.
    INIT_FONTS.call_once(|| {
        let _ = plotters::style::register_font(
            "sans-serif",
            plotters::style::FontStyle::Normal,
            include_bytes!("../assets/DejaVuSans.ttf"),
        );
    });
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Evolução de Leitos: one line per headline metric across years.
pub fn plot_trend<P: AsRef<Path>>(
    rows: &[TrendRow],
    out_path: P,
    width: u32,
    height: u32,
) -> Result<()> {
    if rows.is_empty() {
        return Err(anyhow!("no data to plot"));
    }
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    if is_svg(out_path) {
        let root = SVGBackend::new(out_path, (width, height)).into_drawing_area();
        draw_trend(&root, rows, 1)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(
            out_path,
            (width * RASTER_SCALE, height * RASTER_SCALE),
        )
        .into_drawing_area();
        draw_trend(&root, rows, RASTER_SCALE)?;
        root.present()?;
    }
    Ok(())
}

/// Cobertura Regional: beds-per-1k coverage per macro-region across years.
pub fn plot_regional_trend<P: AsRef<Path>>(
    rows: &[RegionalTrendRow],
    out_path: P,
    width: u32,
    height: u32,
) -> Result<()> {
    if rows.is_empty() {
        return Err(anyhow!("no data to plot"));
    }
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    if is_svg(out_path) {
        let root = SVGBackend::new(out_path, (width, height)).into_drawing_area();
        draw_regional_trend(&root, rows, 1)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(
            out_path,
            (width * RASTER_SCALE, height * RASTER_SCALE),
        )
        .into_drawing_area();
        draw_regional_trend(&root, rows, RASTER_SCALE)?;
        root.present()?;
    }
    Ok(())
}

/// Ranking de Estados: establishment counts per state, descending.
pub fn plot_state_ranking<P: AsRef<Path>>(
    counts: &[EstablishmentCount],
    out_path: P,
    width: u32,
    height: u32,
) -> Result<()> {
    if counts.is_empty() {
        return Err(anyhow!("no data to plot"));
    }
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    if is_svg(out_path) {
        let root = SVGBackend::new(out_path, (width, height)).into_drawing_area();
        draw_ranking(&root, counts, 1)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(
            out_path,
            (width * RASTER_SCALE, height * RASTER_SCALE),
        )
        .into_drawing_area();
        draw_ranking(&root, counts, RASTER_SCALE)?;
        root.present()?;
    }
    Ok(())
}

fn year_range(anos: impl Iterator<Item = i32>) -> (i32, i32) {
    let anos: Vec<i32> = anos.collect();
    let mut min = anos.iter().copied().min().unwrap_or(0);
    let mut max = anos.iter().copied().max().unwrap_or(0);
    // A single year still needs a non-degenerate axis.
    if min == max {
        min -= 1;
        max += 1;
    }
    (min, max)
}

fn draw_trend<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[TrendRow],
    scale: u32,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let s = scale as i32;
    let (min_ano, max_ano) = year_range(rows.iter().map(|r| r.ano));
    let max_val = rows
        .iter()
        .map(|r| r.total_leitos.max(r.leitos_sus).max(r.criticos))
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;

    let mut chart = ChartBuilder::on(root)
        .caption("Evolução de Leitos", ("sans-serif", 18 * s))
        .margin(10 * s)
        .x_label_area_size(30 * s)
        .y_label_area_size(60 * s)
        .build_cartesian_2d(min_ano..max_ano, 0f64..max_val)?;

    chart
        .configure_mesh()
        .x_labels(rows.len().max(2))
        .x_label_formatter(&|ano| ano.to_string())
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(("sans-serif", 11 * s))
        .draw()?;

    let series: [(&str, fn(&TrendRow) -> u64); 3] = [
        ("Total de Leitos", |r| r.total_leitos),
        ("Leitos SUS", |r| r.leitos_sus),
        ("Leitos Críticos", |r| r.criticos),
    ];
    for (idx, (label, get)) in series.into_iter().enumerate() {
        let color = TREND_COLORS[idx];
        chart
            .draw_series(LineSeries::new(
                rows.iter().map(|r| (r.ano, get(r) as f64)),
                color.stroke_width(2 * scale),
            ))?
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(
                    vec![(x, y), (x + 16 * s, y)],
                    color.stroke_width(2 * scale),
                )
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK.mix(0.3))
        .label_font(("sans-serif", 11 * s))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;
    Ok(())
}

fn draw_regional_trend<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[RegionalTrendRow],
    scale: u32,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let s = scale as i32;
    let (min_ano, max_ano) = year_range(rows.iter().map(|r| r.ano));
    let max_val = rows
        .iter()
        .flat_map(|r| r.coberturas.iter().map(|(_, v)| *v))
        .fold(0.0f64, f64::max)
        .max(0.1)
        * 1.15;

    let mut chart = ChartBuilder::on(root)
        .caption(
            "Cobertura Regional (Leitos / 1k Hab.)",
            ("sans-serif", 18 * s),
        )
        .margin(10 * s)
        .x_label_area_size(30 * s)
        .y_label_area_size(50 * s)
        .build_cartesian_2d(min_ano..max_ano, 0f64..max_val)?;

    chart
        .configure_mesh()
        .x_labels(rows.len().max(2))
        .x_label_formatter(&|ano| ano.to_string())
        .y_label_formatter(&|v| format!("{:.1}", v))
        .label_style(("sans-serif", 11 * s))
        .draw()?;

    for region in crate::regions::REGIONS {
        let color = region_color(region);
        chart
            .draw_series(LineSeries::new(
                rows.iter().map(|r| {
                    let v = r
                        .coberturas
                        .iter()
                        .find(|(reg, _)| *reg == region)
                        .map(|(_, v)| *v)
                        .unwrap_or(0.0);
                    (r.ano, v)
                }),
                color.stroke_width(2 * scale),
            ))?
            .label(region.nome())
            .legend(move |(x, y)| {
                PathElement::new(
                    vec![(x, y), (x + 16 * s, y)],
                    color.stroke_width(2 * scale),
                )
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK.mix(0.3))
        .label_font(("sans-serif", 11 * s))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    Ok(())
}

fn draw_ranking<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    counts: &[EstablishmentCount],
    scale: u32,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let s = scale as i32;
    let mut data = counts.to_vec();
    data.sort_by(|a, b| b.estabelecimentos.cmp(&a.estabelecimentos));
    let max_val = data
        .iter()
        .map(|c| c.estabelecimentos)
        .max()
        .unwrap_or(0)
        .max(1);

    let mut chart = ChartBuilder::on(root)
        .caption("Estabelecimentos por Estado", ("sans-serif", 18 * s))
        .margin(10 * s)
        .x_label_area_size(30 * s)
        .y_label_area_size(60 * s)
        .build_cartesian_2d(
            (0usize..data.len()).into_segmented(),
            0u64..(max_val + max_val / 10),
        )?;

    {
        let siglas: Vec<String> = data.iter().map(|c| c.sigla.clone()).collect();
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(data.len())
            .x_label_formatter(&|seg| match seg {
                SegmentValue::CenterOf(i) => {
                    siglas.get(*i).cloned().unwrap_or_default()
                }
                _ => String::new(),
            })
            .label_style(("sans-serif", 10 * s))
            .draw()?;
    }

    chart.draw_series(data.iter().enumerate().map(|(i, c)| {
        Rectangle::new(
            [
                (SegmentValue::Exact(i), 0),
                (SegmentValue::Exact(i + 1), c.estabelecimentos),
            ],
            COR_PADRAO.filled(),
        )
    }))?;
    Ok(())
}
