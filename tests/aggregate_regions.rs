use cnes_rs::aggregate::{
    POR_1K_HAB, POR_100K_HAB, RegionRecord, aggregate_by_region, regions_from_bed_states,
    regions_from_establishments,
};
use cnes_rs::models::{BedsByState, EstablishmentCount};
use cnes_rs::regions::REGIAO_DESCONHECIDA;

fn rec(regiao: &str, total: u64, populacao: u64) -> RegionRecord {
    RegionRecord {
        regiao: regiao.into(),
        total,
        populacao,
        ocupacao: 0.0,
    }
}

#[test]
fn regional_totals_equal_state_sums() {
    let records = vec![
        rec("Sudeste", 90_000, 46_000_000),
        rec("Sudeste", 30_000, 21_000_000),
        rec("Sul", 20_000, 11_400_000),
    ];
    let breakdown = aggregate_by_region(&records, POR_100K_HAB);

    let sudeste = breakdown.rows.iter().find(|r| r.regiao == "Sudeste").unwrap();
    assert_eq!(sudeste.total, 120_000);
    assert_eq!(sudeste.populacao, 67_000_000);

    let sum_rows: u64 = breakdown.rows.iter().map(|r| r.total).sum();
    let sum_records: u64 = records.iter().map(|r| r.total).sum();
    assert_eq!(sum_rows, sum_records);
}

#[test]
fn ratio_is_recomputed_from_sums_not_averaged() {
    // Two states with very different populations: the naive mean of the
    // per-state ratios would be (10 + 1) / 2 = 5.5 per 1k; the
    // population-weighted truth is 20_000 / 11_000_000 * 1000 ≈ 1.818.
    let records = vec![
        rec("Sul", 10_000, 1_000_000),  // 10 per 1k
        rec("Sul", 10_000, 10_000_000), // 1 per 1k
    ];
    let breakdown = aggregate_by_region(&records, POR_1K_HAB);
    let sul = &breakdown.rows[0];

    let expected = 20_000.0 / (11_000_000.0 / 1_000.0);
    assert!((sul.cobertura - expected).abs() < 1e-9);
    assert!((sul.cobertura - 5.5).abs() > 1.0);
}

#[test]
fn zero_population_region_has_zero_ratio() {
    let breakdown = aggregate_by_region(&[rec("Norte", 5_000, 0)], POR_1K_HAB);
    assert_eq!(breakdown.rows[0].cobertura, 0.0);
}

#[test]
fn unknown_regions_are_bucketed_and_counted() {
    let records = vec![
        rec("Sudeste", 100, 1_000_000),
        rec("sudeste", 50, 500_000), // wrong casing: not a known region
        rec("", 25, 0),
    ];
    let breakdown = aggregate_by_region(&records, POR_100K_HAB);

    assert_eq!(breakdown.desconhecidos, 2);
    let unknown = breakdown
        .rows
        .iter()
        .find(|r| r.regiao == REGIAO_DESCONHECIDA)
        .expect("unknown bucket present");
    assert_eq!(unknown.total, 75);

    // Nothing dropped: totals still add up.
    let sum_rows: u64 = breakdown.rows.iter().map(|r| r.total).sum();
    assert_eq!(sum_rows, 175);
}

#[test]
fn occupancy_is_weighted_by_beds() {
    let states = vec![
        beds_state("Sul", 3_000, 1_000_000, 90.0),
        beds_state("Sul", 1_000, 1_000_000, 50.0),
    ];
    let breakdown = regions_from_bed_states(&states);
    let sul = &breakdown.rows[0];
    // (90 * 3000 + 50 * 1000) / 4000 = 80
    assert!((sul.ocupacao_media - 80.0).abs() < 1e-9);
}

#[test]
fn establishment_adapter_uses_100k_scale() {
    let counts = vec![EstablishmentCount {
        cod_uf: 35,
        sigla: "SP".into(),
        nome: "São Paulo".into(),
        regiao: "Sudeste".into(),
        populacao: 46_000_000,
        estabelecimentos: 92_000,
    }];
    let breakdown = regions_from_establishments(&counts);
    // 92_000 / (46_000_000 / 100_000) = 200 per 100k
    assert!((breakdown.rows[0].cobertura - 200.0).abs() < 1e-9);
    assert_eq!(breakdown.desconhecidos, 0);
}

#[test]
fn coverage_method_recomputes_from_fields() {
    let mut count = EstablishmentCount {
        cod_uf: 33,
        sigla: "RJ".into(),
        nome: "Rio de Janeiro".into(),
        regiao: "Sudeste".into(),
        populacao: 17_300_000,
        estabelecimentos: 34_600,
    };
    assert!((count.cobertura_por_100k() - 200.0).abs() < 1e-9);

    count.populacao = 0;
    assert_eq!(count.cobertura_por_100k(), 0.0);
}

#[test]
fn rows_sorted_by_descending_total() {
    let records = vec![
        rec("Norte", 10, 1),
        rec("Sudeste", 1_000, 1),
        rec("Sul", 100, 1),
    ];
    let breakdown = aggregate_by_region(&records, POR_1K_HAB);
    let totals: Vec<u64> = breakdown.rows.iter().map(|r| r.total).collect();
    assert_eq!(totals, vec![1_000, 100, 10]);
}

fn beds_state(regiao: &str, total_leitos: u64, populacao: u64, ocupacao: f64) -> BedsByState {
    BedsByState {
        cod_uf: 0,
        nome_uf: String::new(),
        sigla_uf: String::new(),
        regiao: regiao.into(),
        populacao,
        total_leitos,
        leitos_sus: 0,
        leitos_disponiveis: 0,
        ocupacao_media: ocupacao,
        criticos: 0,
        cobertura_leitos_por_1k_hab: 0.0,
    }
}
