//! Multi-year comparison: fetch indicator snapshots for a set of years and
//! derive headline deltas, trend series, and comparison tables.

use crate::api::{CancelToken, Client};
use crate::export::Table;
use crate::models::{BedIndicators, BedsByRegion, BedsQuery};
use crate::regions::{REGIONS, Region};
use serde::{Deserialize, Serialize};

/// One year's fetched pair: headline indicators plus the regional breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YearSnapshot {
    pub ano: i32,
    pub indicators: BedIndicators,
    pub by_region: Vec<BedsByRegion>,
}

/// Percentage change between a base and a comparison value.
///
/// A zero base is defined as zero delta. That is a policy decision, not a
/// numerical identity: new capacity appearing from nothing reads as "no
/// trend", never as an infinite growth rate.
pub fn pct_delta(base: f64, atual: f64) -> f64 {
    if base > 0.0 {
        (atual - base) / base * 100.0
    } else {
        0.0
    }
}

/// Base/comparison pair for one headline metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KpiDelta {
    pub base: u64,
    pub atual: u64,
    pub delta_pct: f64,
}

impl KpiDelta {
    fn new(base: u64, atual: u64) -> Self {
        Self {
            base,
            atual,
            delta_pct: pct_delta(base as f64, atual as f64),
        }
    }
}

/// Headline KPI deltas between the earliest and latest selected years.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonKpis {
    pub ano_base: i32,
    pub ano_comparacao: i32,
    pub total_leitos: KpiDelta,
    pub leitos_sus: KpiDelta,
    pub criticos: KpiDelta,
}

/// One line-chart row: headline metrics at a given year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendRow {
    pub ano: i32,
    pub total_leitos: u64,
    pub leitos_sus: u64,
    pub criticos: u64,
}

/// One regional-trend row: beds-per-1k coverage for each of the five fixed
/// macro-regions at a given year. Regions absent from that year's response
/// carry 0 so chart rendering never sees a hole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionalTrendRow {
    pub ano: i32,
    pub coberturas: Vec<(Region, f64)>,
}

/// Snapshots for the selected years, held sorted ascending by year
/// regardless of fetch-completion or selection order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComparisonSet {
    snapshots: Vec<YearSnapshot>,
}

impl ComparisonSet {
    pub fn new(mut snapshots: Vec<YearSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.ano);
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &[YearSnapshot] {
        &self.snapshots
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Headline deltas: base year = earliest, comparison year = latest.
    /// `None` when no snapshot survived fetching.
    pub fn kpis(&self) -> Option<ComparisonKpis> {
        let base = self.snapshots.first()?;
        let atual = self.snapshots.last()?;
        Some(ComparisonKpis {
            ano_base: base.ano,
            ano_comparacao: atual.ano,
            total_leitos: KpiDelta::new(
                base.indicators.total_leitos,
                atual.indicators.total_leitos,
            ),
            leitos_sus: KpiDelta::new(base.indicators.leitos_sus, atual.indicators.leitos_sus),
            criticos: KpiDelta::new(base.indicators.criticos, atual.indicators.criticos),
        })
    }

    /// One row per year with each headline metric, ascending by year.
    pub fn trend_rows(&self) -> Vec<TrendRow> {
        self.snapshots
            .iter()
            .map(|s| TrendRow {
                ano: s.ano,
                total_leitos: s.indicators.total_leitos,
                leitos_sus: s.indicators.leitos_sus,
                criticos: s.indicators.criticos,
            })
            .collect()
    }

    /// Beds-per-1k coverage per year for the five fixed regions.
    pub fn regional_trend(&self) -> Vec<RegionalTrendRow> {
        self.snapshots
            .iter()
            .map(|s| RegionalTrendRow {
                ano: s.ano,
                coberturas: REGIONS
                    .iter()
                    .map(|&region| (region, region_coverage(&s.by_region, region)))
                    .collect(),
            })
            .collect()
    }

    /// Comparison table of headline indicators across the selected years.
    pub fn indicator_table(&self) -> Table {
        let mut headers = vec!["Indicador".to_string()];
        headers.extend(self.snapshots.iter().map(|s| format!("Ano {}", s.ano)));

        let metric =
            |label: &str, get: fn(&BedIndicators) -> u64| -> Vec<String> {
                let mut row = vec![label.to_string()];
                row.extend(
                    self.snapshots
                        .iter()
                        .map(|s| get(&s.indicators).to_string()),
                );
                row
            };

        Table {
            headers,
            rows: vec![
                metric("Total de Leitos", |i| i.total_leitos),
                metric("Leitos SUS", |i| i.leitos_sus),
                metric("Leitos Críticos", |i| i.criticos),
            ],
        }
    }

    /// Comparison table of total beds per region across the selected years.
    pub fn region_table(&self) -> Table {
        let mut headers = vec!["Região".to_string()];
        headers.extend(self.snapshots.iter().map(|s| format!("Leitos {}", s.ano)));

        let rows = REGIONS
            .iter()
            .map(|&region| {
                let mut row = vec![region.nome().to_string()];
                row.extend(self.snapshots.iter().map(|s| {
                    s.by_region
                        .iter()
                        .find(|r| r.nome_regiao == region.nome())
                        .map(|r| r.total_leitos)
                        .unwrap_or(0)
                        .to_string()
                }));
                row
            })
            .collect();

        Table { headers, rows }
    }
}

fn region_coverage(by_region: &[BedsByRegion], region: Region) -> f64 {
    by_region
        .iter()
        .find(|r| r.nome_regiao == region.nome())
        .map(|r| r.cobertura_leitos_por_1k_hab)
        .unwrap_or(0.0)
}

/// Fetch one snapshot per selected year, concurrently (one scoped thread per
/// year, two GETs per thread).
///
/// Caller contract: at least two distinct years; fewer is the caller's
/// responsibility to reject before invoking the comparator. A year whose
/// fetch fails is logged and excluded, so partial results survive. The
/// cancel token is consulted before each year's fetch starts.
pub fn fetch_comparison(
    client: &Client,
    anos: &[i32],
    filtro: &BedsQuery,
    cancel: &CancelToken,
) -> ComparisonSet {
    let snapshots: Vec<YearSnapshot> = std::thread::scope(|scope| {
        let handles: Vec<_> = anos
            .iter()
            .map(|&ano| {
                let query = BedsQuery {
                    ano,
                    mes: filtro.mes,
                    tipo: filtro.tipo.clone(),
                    ufs: Vec::new(),
                };
                scope.spawn(move || fetch_year(client, query, cancel))
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().ok().flatten())
            .collect()
    });
    ComparisonSet::new(snapshots)
}

fn fetch_year(client: &Client, query: BedsQuery, cancel: &CancelToken) -> Option<YearSnapshot> {
    if cancel.is_cancelled() {
        return None;
    }
    let ano = query.ano;
    let indicators = match client.bed_indicators(&query) {
        Ok(i) => i,
        Err(err) => {
            log::warn!("indicators fetch failed for {}: {:#}", ano, err);
            return None;
        }
    };
    let by_region = match client.bed_indicators_by_region(&query) {
        Ok(r) => r,
        Err(err) => {
            log::warn!("regional fetch failed for {}: {:#}", ano, err);
            return None;
        }
    };
    Some(YearSnapshot {
        ano,
        indicators,
        by_region,
    })
}
