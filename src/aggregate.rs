//! Regional aggregation: fold per-state rows into per-region summaries.
//!
//! Ratios are recomputed from the summed totals, never averaged from
//! per-state ratios, so population weighting stays correct.

use crate::models::{BedsByState, EstablishmentCount};
use crate::regions::{REGIAO_DESCONHECIDA, Region};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scale factor for beds per 1,000 inhabitants.
pub const POR_1K_HAB: f64 = 1_000.0;
/// Scale factor for establishments per 100,000 inhabitants.
pub const POR_100K_HAB: f64 = 100_000.0;

/// One per-state input row, reduced to what regional grouping needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionRecord {
    pub regiao: String,
    pub total: u64,
    pub populacao: u64,
    /// Occupancy percentage for this row; 0 when the source has none.
    pub ocupacao: f64,
}

/// Aggregated figures for one region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSummary {
    pub regiao: String,
    pub total: u64,
    pub populacao: u64,
    /// Total per `escala` inhabitants, recomputed from the summed figures.
    pub cobertura: f64,
    /// Mean occupancy weighted by each member row's total.
    pub ocupacao_media: f64,
}

/// Regional breakdown plus the count of rows that landed in the
/// "Desconhecido" bucket, for observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionBreakdown {
    /// Sorted by descending total.
    pub rows: Vec<RegionSummary>,
    pub desconhecidos: usize,
}

/// Group records by exact region-name match and sum totals and population.
///
/// Rows whose region name matches none of the five macro-regions are never
/// dropped: they are bucketed under [`REGIAO_DESCONHECIDA`] and counted in
/// `desconhecidos`. A region with zero summed population gets coverage 0.
pub fn aggregate_by_region(records: &[RegionRecord], escala: f64) -> RegionBreakdown {
    struct Acc {
        total: u64,
        populacao: u64,
        ocupacao_ponderada: f64,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    let mut desconhecidos = 0usize;

    for rec in records {
        let key = if Region::from_nome(&rec.regiao).is_some() {
            rec.regiao.clone()
        } else {
            desconhecidos += 1;
            REGIAO_DESCONHECIDA.to_string()
        };
        let acc = groups.entry(key).or_insert(Acc {
            total: 0,
            populacao: 0,
            ocupacao_ponderada: 0.0,
        });
        acc.total += rec.total;
        acc.populacao += rec.populacao;
        acc.ocupacao_ponderada += rec.ocupacao * rec.total as f64;
    }

    let mut rows: Vec<RegionSummary> = groups
        .into_iter()
        .map(|(regiao, acc)| {
            let cobertura = if acc.populacao == 0 {
                0.0
            } else {
                acc.total as f64 / (acc.populacao as f64 / escala)
            };
            let ocupacao_media = if acc.total == 0 {
                0.0
            } else {
                acc.ocupacao_ponderada / acc.total as f64
            };
            RegionSummary {
                regiao,
                total: acc.total,
                populacao: acc.populacao,
                cobertura,
                ocupacao_media,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));

    RegionBreakdown { rows, desconhecidos }
}

/// Regional bed capacity from per-state bed indicators
/// (beds per 1,000 inhabitants).
pub fn regions_from_bed_states(states: &[BedsByState]) -> RegionBreakdown {
    let records: Vec<RegionRecord> = states
        .iter()
        .map(|s| RegionRecord {
            regiao: s.regiao.clone(),
            total: s.total_leitos,
            populacao: s.populacao,
            ocupacao: s.ocupacao_media,
        })
        .collect();
    aggregate_by_region(&records, POR_1K_HAB)
}

/// Regional establishment coverage from enriched per-state counts
/// (establishments per 100,000 inhabitants).
pub fn regions_from_establishments(counts: &[EstablishmentCount]) -> RegionBreakdown {
    let records: Vec<RegionRecord> = counts
        .iter()
        .map(|c| RegionRecord {
            regiao: c.regiao.clone(),
            total: c.estabelecimentos,
            populacao: c.populacao,
            ocupacao: 0.0,
        })
        .collect();
    aggregate_by_region(&records, POR_100K_HAB)
}
