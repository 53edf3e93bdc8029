use cnes_rs::compare::{RegionalTrendRow, TrendRow};
use cnes_rs::models::EstablishmentCount;
use cnes_rs::regions::REGIONS;
use cnes_rs::viz;
use tempfile::tempdir;

fn trend_rows() -> Vec<TrendRow> {
    vec![
        TrendRow {
            ano: 2020,
            total_leitos: 300_000,
            leitos_sus: 180_000,
            criticos: 38_000,
        },
        TrendRow {
            ano: 2023,
            total_leitos: 330_000,
            leitos_sus: 190_000,
            criticos: 41_000,
        },
    ]
}

fn regional_rows() -> Vec<RegionalTrendRow> {
    [2020, 2023]
        .into_iter()
        .map(|ano| RegionalTrendRow {
            ano,
            coberturas: REGIONS
                .iter()
                .enumerate()
                .map(|(i, &r)| (r, 1.0 + i as f64 * 0.3 + (ano - 2020) as f64 * 0.05))
                .collect(),
        })
        .collect()
}

fn counts() -> Vec<EstablishmentCount> {
    vec![
        EstablishmentCount {
            cod_uf: 35,
            sigla: "SP".into(),
            nome: "São Paulo".into(),
            regiao: "Sudeste".into(),
            populacao: 46_000_000,
            estabelecimentos: 92_000,
        },
        EstablishmentCount {
            cod_uf: 12,
            sigla: "AC".into(),
            nome: "Acre".into(),
            regiao: "Norte".into(),
            populacao: 900_000,
            estabelecimentos: 1_800,
        },
    ]
}

fn assert_non_empty(path: &std::path::Path) {
    let meta = std::fs::metadata(path).unwrap();
    assert!(meta.len() > 0, "{} is empty", path.display());
}

#[test]
fn render_trend_png_and_svg() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("tendencia.png");
    let svg = dir.path().join("tendencia.svg");

    viz::plot_trend(&trend_rows(), &png, 640, 400).unwrap();
    viz::plot_trend(&trend_rows(), &svg, 640, 400).unwrap();
    assert_non_empty(&png);
    assert_non_empty(&svg);
}

#[test]
fn render_regional_trend() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("cobertura.png");
    viz::plot_regional_trend(&regional_rows(), &png, 640, 400).unwrap();
    assert_non_empty(&png);
}

#[test]
fn render_state_ranking() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("ranking.png");
    viz::plot_state_ranking(&counts(), &png, 640, 400).unwrap();
    assert_non_empty(&png);
}

#[test]
fn empty_series_is_an_error() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("vazio.png");
    assert!(viz::plot_trend(&[], &png, 640, 400).is_err());
    assert!(!png.exists());
}

#[test]
fn single_year_series_still_renders() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("um_ano.png");
    viz::plot_trend(&trend_rows()[..1], &png, 640, 400).unwrap();
    assert_non_empty(&png);
}
