use serde::{Deserialize, Serialize};

use crate::regions;

/// Paginated envelope shared by the list endpoints.
///
/// The API is .NET-flavored camelCase; counters occasionally arrive as JSON
/// strings, so they go through a tolerant deserializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, deserialize_with = "de_u32_from_string_or_number")]
    pub current_page: u32,
    #[serde(default, deserialize_with = "de_u32_from_string_or_number")]
    pub page_size: u32,
    #[serde(default, deserialize_with = "de_u64_from_string_or_number")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "de_u32_from_string_or_number")]
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    /// Safe default used when the server returns a malformed page body.
    pub fn empty(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            page_size,
            total_count: 0,
            total_pages: 0,
        }
    }
}

/// Serde helper: parse `u32` from either a JSON number or a string.
fn de_u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    de_u64_from_string_or_number(deserializer).map(|v| v as u32)
}

/// Serde helper: parse `u64` from either a JSON number or a string.
fn de_u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct U64Visitor;

    impl<'de> Visitor<'de> for U64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or integer representing a non-negative number")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("negative value for unsigned counter"));
            }
            Ok(v as u64)
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.parse::<u64>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U64Visitor)
}

/// Serde helper: treat an explicit JSON `null` like a missing field.
/// The upstream emits `null` for counters it has no data for.
fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of `GET /api/v1/Estabelecimento` (summary listing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstablishmentSummary {
    pub cod_cnes: u64,
    #[serde(default)]
    pub nm_fantasia: Option<String>,
    #[serde(default)]
    pub cod_uf: Option<u32>,
}

/// Identification block of a detailed establishment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Caracteristicas {
    #[serde(default)]
    pub nm_razao_social: Option<String>,
    #[serde(default)]
    pub nm_fantasia: Option<String>,
    #[serde(default)]
    pub num_cnpj: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub num_telefone: Option<String>,
}

/// Address/coordinates block of a detailed establishment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Localizacao {
    #[serde(default)]
    pub endereco: Option<String>,
    #[serde(default)]
    pub bairro: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub cod_ibge: Option<u64>,
    #[serde(default)]
    pub cod_uf: Option<u32>,
}

/// Administrative block of a detailed establishment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Organizacao {
    #[serde(default)]
    pub tp_unidade: Option<u32>,
    #[serde(default)]
    pub tp_gestao: Option<String>,
    #[serde(default)]
    pub dscr_esfera_administrativa: Option<String>,
    #[serde(default)]
    pub dscr_natureza_organizacao: Option<String>,
}

/// One row of `GET /api/v1/Estabelecimento/info`, trimmed to the groups the
/// pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstablishmentInfo {
    pub cod_cnes: u64,
    #[serde(default)]
    pub caracteristicas: Caracteristicas,
    #[serde(default)]
    pub localizacao: Localizacao,
    #[serde(default)]
    pub organizacao: Organizacao,
}

/// One row of `GET /api/v1/Estabelecimento/uf`: raw per-state count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UfCount {
    pub cod_uf: u32,
    #[serde(alias = "total", deserialize_with = "de_u64_from_string_or_number")]
    pub quantidade: u64,
}

/// Per-state establishment count enriched with the static UF reference data.
///
/// Coverage per 100k inhabitants is always recomputed from `estabelecimentos`
/// and `populacao`; it is intentionally not a stored field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstablishmentCount {
    pub cod_uf: u32,
    pub sigla: String,
    pub nome: String,
    pub regiao: String,
    pub populacao: u64,
    pub estabelecimentos: u64,
}

impl EstablishmentCount {
    /// Establishments per 100,000 inhabitants. Zero population yields 0.
    pub fn cobertura_por_100k(&self) -> f64 {
        if self.populacao == 0 {
            return 0.0;
        }
        self.estabelecimentos as f64 / (self.populacao as f64 / 100_000.0)
    }

    /// Enrich a raw UF count with the static reference table.
    /// Returns `None` for UF codes outside the table.
    pub fn from_uf_count(raw: &UfCount) -> Option<Self> {
        let uf = regions::uf_from_code(raw.cod_uf)?;
        Some(Self {
            cod_uf: raw.cod_uf,
            sigla: uf.sigla.to_string(),
            nome: uf.nome.to_string(),
            regiao: uf.regiao.nome().to_string(),
            populacao: uf.populacao,
            estabelecimentos: raw.quantidade,
        })
    }
}

/// Aggregate bed KPIs for one filter scope (`GET /api/v1/Leitos/indicadores`).
///
/// Fetched fresh per filter combination and never mutated, only replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BedIndicators {
    #[serde(default, deserialize_with = "de_null_default")]
    pub total_leitos: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_sus: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_disponiveis: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub ocupacao_media: f64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub criticos: u64,
}

/// Bed KPIs for one state (`GET /api/v1/Leitos/indicadores-por-estado`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BedsByState {
    pub cod_uf: u32,
    #[serde(default)]
    pub nome_uf: String,
    #[serde(default)]
    pub sigla_uf: String,
    #[serde(default)]
    pub regiao: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub populacao: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub total_leitos: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_sus: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_disponiveis: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub ocupacao_media: f64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub criticos: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub cobertura_leitos_por_1k_hab: f64,
}

/// Bed KPIs for one macro-region (`GET /api/v1/Leitos/indicadores-por-regiao`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BedsByRegion {
    pub nome_regiao: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub populacao: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub total_leitos: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_sus: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub ocupacao_media: f64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub cobertura_leitos_por_1k_hab: f64,
}

/// One row of the paginated `GET /api/v1/Leitos` hospital listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BedItem {
    #[serde(default)]
    pub cod_cnes: Option<u64>,
    #[serde(default)]
    pub nome_estabelecimento: Option<String>,
    #[serde(default)]
    pub endereco_completo: Option<String>,
    #[serde(default)]
    pub localizacao_uf: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub total_leitos: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_sus: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub leitos_disponiveis: u64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub porcentagem_ocupacao: f64,
}

/// Year/month/bed-type filter scope shared by the bed endpoints.
///
/// `Anomes` (`YYYYMM`) is derived only when a month is set; it narrows the
/// plain `Ano` filter to a single reference month for that call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BedsQuery {
    pub ano: i32,
    pub mes: Option<u32>,
    pub tipo: Option<String>,
    pub ufs: Vec<String>,
}

impl BedsQuery {
    pub fn for_year(ano: i32) -> Self {
        Self {
            ano,
            mes: None,
            tipo: None,
            ufs: Vec::new(),
        }
    }

    /// The 6-digit `YYYYMM` period string, when a month filter is active.
    pub fn anomes(&self) -> Option<String> {
        self.mes.map(|m| format!("{}{:02}", self.ano, m))
    }

    /// Common query pairs (`Ano`, `Anomes`, `Tipo`). UF parameters are
    /// appended by the endpoint wrappers because their names differ
    /// (`Uf` on listings, `Ufs` on the per-state indicators).
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("Ano", self.ano.to_string())];
        if let Some(anomes) = self.anomes() {
            pairs.push(("Anomes", anomes));
        }
        if let Some(tipo) = self.tipo.as_deref() {
            if !tipo.is_empty() {
                pairs.push(("Tipo", tipo.to_string()));
            }
        }
        pairs
    }
}

/// Geographic bounding box for the geojson endpoint (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

/// GeoJSON feature collection returned by `GET /api/v1/Estabelecimento/geojson`.
/// Geometry and properties stay untyped; the pipeline passes them through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<serde_json::Value>,
}
