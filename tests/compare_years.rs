use cnes_rs::compare::{ComparisonSet, YearSnapshot, pct_delta};
use cnes_rs::models::{BedIndicators, BedsByRegion};
use cnes_rs::regions::Region;

fn indicators(total: u64, sus: u64, criticos: u64) -> BedIndicators {
    BedIndicators {
        total_leitos: total,
        leitos_sus: sus,
        leitos_disponiveis: 0,
        ocupacao_media: 0.0,
        criticos,
    }
}

fn region(nome: &str, total: u64, cobertura: f64) -> BedsByRegion {
    BedsByRegion {
        nome_regiao: nome.into(),
        populacao: 0,
        total_leitos: total,
        leitos_sus: 0,
        ocupacao_media: 0.0,
        cobertura_leitos_por_1k_hab: cobertura,
    }
}

fn snapshot(ano: i32, ind: BedIndicators, by_region: Vec<BedsByRegion>) -> YearSnapshot {
    YearSnapshot {
        ano,
        indicators: ind,
        by_region,
    }
}

#[test]
fn delta_policy() {
    assert_eq!(pct_delta(0.0, 123_456.0), 0.0);
    assert_eq!(pct_delta(100.0, 150.0), 50.0);
    assert_eq!(pct_delta(100.0, 50.0), -50.0);
}

#[test]
fn kpi_delta_for_two_years() {
    let set = ComparisonSet::new(vec![
        snapshot(2023, indicators(330_000, 200_000, 40_000), vec![]),
        snapshot(2020, indicators(300_000, 210_000, 0), vec![]),
    ]);
    let kpis = set.kpis().unwrap();

    assert_eq!(kpis.ano_base, 2020);
    assert_eq!(kpis.ano_comparacao, 2023);
    assert!((kpis.total_leitos.delta_pct - 10.0).abs() < 1e-9);
    // Shrinkage is negative.
    assert!(kpis.leitos_sus.delta_pct < 0.0);
    // Zero base is zero delta, regardless of the comparison value.
    assert_eq!(kpis.criticos.base, 0);
    assert_eq!(kpis.criticos.delta_pct, 0.0);
}

#[test]
fn snapshots_sort_by_year_regardless_of_insertion_order() {
    let set = ComparisonSet::new(vec![
        snapshot(2022, indicators(2, 0, 0), vec![]),
        snapshot(2019, indicators(1, 0, 0), vec![]),
        snapshot(2024, indicators(3, 0, 0), vec![]),
    ]);
    let anos: Vec<i32> = set.trend_rows().iter().map(|r| r.ano).collect();
    assert_eq!(anos, vec![2019, 2022, 2024]);
}

#[test]
fn regional_trend_defaults_absent_regions_to_zero() {
    let set = ComparisonSet::new(vec![
        snapshot(
            2020,
            indicators(0, 0, 0),
            vec![region("Norte", 10_000, 1.5), region("Sul", 20_000, 2.8)],
        ),
        // 2023 response is missing Norte entirely.
        snapshot(2023, indicators(0, 0, 0), vec![region("Sul", 25_000, 3.1)]),
    ]);

    let trend = set.regional_trend();
    assert_eq!(trend.len(), 2);
    // Every row covers all five regions.
    for row in &trend {
        assert_eq!(row.coberturas.len(), 5);
    }

    let norte_2020 = lookup(&trend[0].coberturas, Region::Norte);
    let norte_2023 = lookup(&trend[1].coberturas, Region::Norte);
    assert!((norte_2020 - 1.5).abs() < 1e-9);
    assert_eq!(norte_2023, 0.0);
}

#[test]
fn comparison_tables_have_year_columns_sorted() {
    let set = ComparisonSet::new(vec![
        snapshot(
            2023,
            indicators(330_000, 190_000, 41_000),
            vec![region("Sudeste", 150_000, 2.2)],
        ),
        snapshot(
            2020,
            indicators(300_000, 180_000, 38_000),
            vec![region("Sudeste", 140_000, 2.1)],
        ),
    ]);

    let indicadores = set.indicator_table();
    assert_eq!(
        indicadores.headers,
        vec!["Indicador", "Ano 2020", "Ano 2023"]
    );
    assert_eq!(
        indicadores.rows[0],
        vec!["Total de Leitos", "300000", "330000"]
    );

    let regioes = set.region_table();
    assert_eq!(regioes.headers, vec!["Região", "Leitos 2020", "Leitos 2023"]);
    // Five fixed regions, absent ones zero-filled.
    assert_eq!(regioes.rows.len(), 5);
    let sudeste = regioes
        .rows
        .iter()
        .find(|r| r[0] == "Sudeste")
        .unwrap();
    assert_eq!(sudeste[1..], ["140000".to_string(), "150000".to_string()]);
    let norte = regioes.rows.iter().find(|r| r[0] == "Norte").unwrap();
    assert_eq!(norte[1..], ["0".to_string(), "0".to_string()]);
}

#[test]
fn empty_set_has_no_kpis() {
    let set = ComparisonSet::new(vec![]);
    assert!(set.is_empty());
    assert!(set.kpis().is_none());
    assert!(set.trend_rows().is_empty());
}

fn lookup(coberturas: &[(Region, f64)], region: Region) -> f64 {
    coberturas
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, v)| *v)
        .unwrap()
}
