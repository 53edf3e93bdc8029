use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cnes_rs::aggregate::{self, RegionBreakdown};
use cnes_rs::api::{CancelToken, Client};
use cnes_rs::compare;
use cnes_rs::config::FilterState;
use cnes_rs::export::{self, Table};
use cnes_rs::models::{BedsQuery, BoundingBox};
use cnes_rs::viz;
use num_format::{Locale, ToFormattedString};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "cnes",
    version,
    about = "Fetch, aggregate, compare & export CNES/SUS establishment and bed data"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Establishment counts by state and region.
    Estabelecimentos(EstabelecimentosArgs),
    /// Bed indicators for one reference period.
    Leitos(LeitosArgs),
    /// Multi-year comparison of bed indicators.
    Comparar(CompararArgs),
    /// Detailed establishment records for one UF.
    Detalhes(DetalhesArgs),
    /// Server-side CSV export of establishment details.
    Exportar(ExportarArgs),
    /// Establishments within a bounding box, as GeoJSON.
    Geojson(GeojsonArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Xlsx,
}

#[derive(Args, Debug)]
struct EstabelecimentosArgs {
    /// Save the state table to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or xlsx). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Create a ranking chart at the given path (.png or .svg).
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Width of the plot (default 1000).
    #[arg(long, default_value_t = 1000)]
    width: u32,
    /// Height of the plot (default 600).
    #[arg(long, default_value_t = 600)]
    height: u32,
}

#[derive(Args, Debug)]
struct LeitosArgs {
    /// Reference year (defaults to the saved filter state).
    #[arg(long)]
    ano: Option<i32>,
    /// Reference month (1-12); derives the Anomes period filter.
    #[arg(long)]
    mes: Option<u32>,
    /// Bed type filter (e.g. UTI_ADULTO).
    #[arg(long)]
    tipo: Option<String>,
    /// Restrict to UF siglas (repeatable).
    #[arg(long = "uf")]
    ufs: Vec<String>,
    /// Also list the first hospitals of the filtered listing.
    #[arg(long, default_value_t = 0)]
    hospitais: usize,
    /// Save the state table to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or xlsx). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Persist this filter selection for later runs.
    #[arg(long, default_value_t = false)]
    salvar_filtros: bool,
}

#[derive(Args, Debug)]
struct CompararArgs {
    /// Years separated by comma or semicolon (e.g. 2020,2023). At least two.
    /// Defaults to the saved filter state.
    #[arg(long)]
    anos: Option<String>,
    /// Reference month (1-12); derives the Anomes period filter.
    #[arg(long)]
    mes: Option<u32>,
    /// Bed type filter (e.g. UTI_ADULTO).
    #[arg(long)]
    tipo: Option<String>,
    /// Save the comparison tables to files (indicator/region suffixes added).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or xlsx). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Create the trend chart at the given path (.png or .svg).
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Create the regional coverage chart at the given path (.png or .svg).
    #[arg(long)]
    plot_regional: Option<PathBuf>,
    /// Width of the plots (default 1000).
    #[arg(long, default_value_t = 1000)]
    width: u32,
    /// Height of the plots (default 600).
    #[arg(long, default_value_t = 600)]
    height: u32,
    /// Persist this filter selection for later runs.
    #[arg(long, default_value_t = false)]
    salvar_filtros: bool,
}

#[derive(Args, Debug)]
struct DetalhesArgs {
    /// UF sigla (e.g. SP).
    #[arg(long)]
    uf: String,
    /// Maximum number of records to fetch.
    #[arg(long, default_value_t = 30)]
    limite: usize,
}

#[derive(Args, Debug)]
struct ExportarArgs {
    /// Restrict to UF siglas (repeatable).
    #[arg(long = "uf")]
    ufs: Vec<String>,
    /// Destination file (.csv or .xlsx).
    #[arg(long)]
    out: PathBuf,
    /// Output format (csv or xlsx). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

#[derive(Args, Debug)]
struct GeojsonArgs {
    #[arg(long, allow_negative_numbers = true)]
    min_lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    min_lon: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_lon: f64,
    /// Map zoom level forwarded to the endpoint.
    #[arg(long, default_value_t = 4)]
    zoom: u32,
    /// Save the feature collection to file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn fmt_count(n: u64) -> String {
    n.to_formatted_string(&Locale::pt)
}

fn parse_years(s: &str) -> Vec<i32> {
    let mut years: Vec<i32> = s
        .split([',', ';'])
        .filter_map(|x| x.trim().parse::<i32>().ok())
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}

fn resolve_format(format: Option<&OutFormat>, path: &Path) -> Result<OutFormat> {
    match format {
        Some(OutFormat::Csv) => Ok(OutFormat::Csv),
        Some(OutFormat::Xlsx) => Ok(OutFormat::Xlsx),
        None => {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("csv")
                .to_ascii_lowercase();
            match ext.as_str() {
                "csv" => Ok(OutFormat::Csv),
                "xlsx" => Ok(OutFormat::Xlsx),
                other => anyhow::bail!("unsupported format: {}", other),
            }
        }
    }
}

fn save_table(table: &Table, path: &Path, format: Option<&OutFormat>) -> Result<()> {
    match resolve_format(format, path)? {
        OutFormat::Csv => export::save_csv(table, path)?,
        OutFormat::Xlsx => export::save_xlsx(table, path)?,
    }
    eprintln!("Saved {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

fn print_regions(breakdown: &RegionBreakdown, unidade: &str) {
    for row in &breakdown.rows {
        println!(
            "{:<14} total={:>12}  população={:>12}  {}={:.2}",
            row.regiao,
            fmt_count(row.total),
            fmt_count(row.populacao),
            unidade,
            row.cobertura
        );
    }
    if breakdown.desconhecidos > 0 {
        eprintln!(
            "Atenção: {} registro(s) com região desconhecida",
            breakdown.desconhecidos
        );
    }
}

fn load_filter_state() -> FilterState {
    match FilterState::default_path() {
        Some(path) => FilterState::load(&path).unwrap_or_else(|err| {
            eprintln!("Ignorando filtros salvos inválidos: {:#}", err);
            FilterState::default()
        }),
        None => FilterState::default(),
    }
}

fn persist_filter_state(state: &FilterState) -> Result<()> {
    if let Some(path) = FilterState::default_path() {
        state.save(&path)?;
        eprintln!("Filtros salvos em {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Estabelecimentos(args) => cmd_estabelecimentos(args),
        Command::Leitos(args) => cmd_leitos(args),
        Command::Comparar(args) => cmd_comparar(args),
        Command::Detalhes(args) => cmd_detalhes(args),
        Command::Exportar(args) => cmd_exportar(args),
        Command::Geojson(args) => cmd_geojson(args),
    }
}

fn cmd_estabelecimentos(args: EstabelecimentosArgs) -> Result<()> {
    let client = Client::default();
    let counts = client.establishment_counts_by_uf()?;
    let total = client.establishments_total()?;

    println!("Total nacional: {} estabelecimentos", fmt_count(total));
    println!();
    println!(
        "{:<4} {:<22} {:<14} {:>12} {:>16} {:>14}",
        "UF", "Estado", "Região", "População", "Estabelecimentos", "Est./100k hab."
    );
    for c in &counts {
        println!(
            "{:<4} {:<22} {:<14} {:>12} {:>16} {:>14.1}",
            c.sigla,
            c.nome,
            c.regiao,
            fmt_count(c.populacao),
            fmt_count(c.estabelecimentos),
            c.cobertura_por_100k()
        );
    }

    println!();
    println!("Por região:");
    let breakdown = aggregate::regions_from_establishments(&counts);
    print_regions(&breakdown, "est/100k");

    if let Some(path) = args.out.as_ref() {
        let table = Table::new(
            vec![
                "UF".into(),
                "Estado".into(),
                "Região".into(),
                "População".into(),
                "Estabelecimentos".into(),
                "Est./100k hab.".into(),
            ],
            counts
                .iter()
                .map(|c| {
                    vec![
                        c.sigla.clone(),
                        c.nome.clone(),
                        c.regiao.clone(),
                        c.populacao.to_string(),
                        c.estabelecimentos.to_string(),
                        format!("{:.1}", c.cobertura_por_100k()),
                    ]
                })
                .collect(),
        );
        save_table(&table, path, args.format.as_ref())?;
    }

    if let Some(plot_path) = args.plot.as_ref() {
        viz::plot_state_ranking(&counts, plot_path, args.width, args.height)?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }

    Ok(())
}

fn cmd_leitos(args: LeitosArgs) -> Result<()> {
    let client = Client::default();
    let saved = load_filter_state();
    let state = FilterState {
        ano: args.ano.unwrap_or(saved.ano),
        mes: args.mes.or(saved.mes),
        tipo_leito: args.tipo.clone().or(saved.tipo_leito.clone()),
        ufs: if args.ufs.is_empty() {
            saved.ufs.clone()
        } else {
            args.ufs.clone()
        },
        anos_comparacao: saved.anos_comparacao.clone(),
    };
    if args.salvar_filtros {
        persist_filter_state(&state)?;
    }
    let query = state.to_beds_query();

    let indicators = client.bed_indicators(&query)?;
    println!("Indicadores ({}):", query.anomes().unwrap_or_else(|| query.ano.to_string()));
    println!("  Total de Leitos: {}", fmt_count(indicators.total_leitos));
    println!("  Leitos SUS:      {}", fmt_count(indicators.leitos_sus));
    println!("  Críticos:        {}", fmt_count(indicators.criticos));

    let by_state = client.bed_indicators_by_state(&query)?;
    println!();
    println!(
        "{:<4} {:<22} {:<14} {:>12} {:>12} {:>16}",
        "UF", "Estado", "Região", "Leitos", "Leitos SUS", "Leitos/1k hab."
    );
    for s in &by_state {
        println!(
            "{:<4} {:<22} {:<14} {:>12} {:>12} {:>16.2}",
            s.sigla_uf,
            s.nome_uf,
            s.regiao,
            fmt_count(s.total_leitos),
            fmt_count(s.leitos_sus),
            s.cobertura_leitos_por_1k_hab
        );
    }

    println!();
    println!("Por região:");
    print_regions(&aggregate::regions_from_bed_states(&by_state), "leitos/1k");

    if args.hospitais > 0 {
        let cancel = CancelToken::new();
        let page_size = args.hospitais.min(100) as u32;
        let max_pages = args.hospitais.div_ceil(page_size as usize) as u32;
        let mut items = client.beds_all(&query, page_size, max_pages, &cancel)?;
        items.truncate(args.hospitais);
        println!();
        println!("Hospitais:");
        for item in &items {
            println!(
                "  {:<45} {:<3} leitos={:>6} sus={:>6}",
                item.nome_estabelecimento.as_deref().unwrap_or("Estabelecimento"),
                item.localizacao_uf.as_deref().unwrap_or(""),
                fmt_count(item.total_leitos),
                fmt_count(item.leitos_sus)
            );
        }
    }

    if let Some(path) = args.out.as_ref() {
        let table = Table::new(
            vec![
                "UF".into(),
                "Estado".into(),
                "Região".into(),
                "Leitos".into(),
                "Leitos SUS".into(),
                "Leitos/1k hab.".into(),
            ],
            by_state
                .iter()
                .map(|s| {
                    vec![
                        s.sigla_uf.clone(),
                        s.nome_uf.clone(),
                        s.regiao.clone(),
                        s.total_leitos.to_string(),
                        s.leitos_sus.to_string(),
                        format!("{:.2}", s.cobertura_leitos_por_1k_hab),
                    ]
                })
                .collect(),
        );
        save_table(&table, path, args.format.as_ref())?;
    }

    Ok(())
}

fn cmd_comparar(args: CompararArgs) -> Result<()> {
    let client = Client::default();
    let saved = load_filter_state();
    let anos = match args.anos.as_deref() {
        Some(s) => parse_years(s),
        None => saved.anos_comparacao.clone(),
    };
    if anos.len() < 2 {
        anyhow::bail!("selecione 2 ou mais anos distintos (--anos 2020,2023)");
    }
    let state = FilterState {
        mes: args.mes.or(saved.mes),
        tipo_leito: args.tipo.clone().or(saved.tipo_leito.clone()),
        anos_comparacao: anos.clone(),
        ..saved
    };
    if args.salvar_filtros {
        persist_filter_state(&state)?;
    }

    let filtro = BedsQuery {
        ano: anos[0],
        mes: state.mes,
        tipo: state.to_beds_query().tipo,
        ufs: Vec::new(),
    };
    let comparison = compare::fetch_comparison(&client, &anos, &filtro, &CancelToken::new());
    if comparison.is_empty() {
        anyhow::bail!("nenhum ano retornou dados; tente novamente mais tarde");
    }
    if comparison.len() < anos.len() {
        eprintln!(
            "Atenção: {} de {} anos sem dados; exibindo resultados parciais",
            anos.len() - comparison.len(),
            anos.len()
        );
    }

    if let Some(kpis) = comparison.kpis() {
        println!("Comparação {} → {}:", kpis.ano_base, kpis.ano_comparacao);
        println!(
            "  Total de Leitos: {} → {}  ({:+.1}%)",
            fmt_count(kpis.total_leitos.base),
            fmt_count(kpis.total_leitos.atual),
            kpis.total_leitos.delta_pct
        );
        println!(
            "  Leitos SUS:      {} → {}  ({:+.1}%)",
            fmt_count(kpis.leitos_sus.base),
            fmt_count(kpis.leitos_sus.atual),
            kpis.leitos_sus.delta_pct
        );
        println!(
            "  Críticos:        {} → {}  ({:+.1}%)",
            fmt_count(kpis.criticos.base),
            fmt_count(kpis.criticos.atual),
            kpis.criticos.delta_pct
        );
    }

    println!();
    println!("Série histórica:");
    for row in comparison.trend_rows() {
        println!(
            "  {}  total={:>12}  sus={:>12}  críticos={:>10}",
            row.ano,
            fmt_count(row.total_leitos),
            fmt_count(row.leitos_sus),
            fmt_count(row.criticos)
        );
    }

    if let Some(path) = args.out.as_ref() {
        let fmt = args.format.as_ref();
        save_table(&comparison.indicator_table(), &with_suffix(path, "indicadores"), fmt)?;
        save_table(&comparison.region_table(), &with_suffix(path, "regioes"), fmt)?;
    }

    if let Some(plot_path) = args.plot.as_ref() {
        viz::plot_trend(&comparison.trend_rows(), plot_path, args.width, args.height)?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }
    if let Some(plot_path) = args.plot_regional.as_ref() {
        viz::plot_regional_trend(
            &comparison.regional_trend(),
            plot_path,
            args.width,
            args.height,
        )?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }

    Ok(())
}

/// `analise.csv` + `indicadores` → `analise_indicadores.csv`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("csv");
    path.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
}

fn cmd_detalhes(args: DetalhesArgs) -> Result<()> {
    let client = Client::default();
    let items = client.establishment_info_all(&args.uf, args.limite, &CancelToken::new())?;

    println!("{} estabelecimento(s) em {}:", items.len(), args.uf.to_uppercase());
    for item in &items {
        let nome = item
            .caracteristicas
            .nm_fantasia
            .as_deref()
            .or(item.caracteristicas.nm_razao_social.as_deref())
            .unwrap_or("(sem nome)");
        let bairro = item.localizacao.bairro.as_deref().unwrap_or("");
        println!("  {:<8} {:<45} {}", item.cod_cnes, nome, bairro);
    }
    Ok(())
}

fn cmd_exportar(args: ExportarArgs) -> Result<()> {
    let client = Client::default();
    let csv_text = client.export_establishment_details(&args.ufs)?;
    match resolve_format(args.format.as_ref(), &args.out)? {
        OutFormat::Csv => export::save_csv_text(&csv_text, &args.out)?,
        OutFormat::Xlsx => export::save_xlsx_from_csv(&csv_text, &args.out)?,
    }
    eprintln!("Saved export to {}", args.out.display());
    Ok(())
}

fn cmd_geojson(args: GeojsonArgs) -> Result<()> {
    let client = Client::default();
    let bounds = BoundingBox {
        min_latitude: args.min_lat,
        max_latitude: args.max_lat,
        min_longitude: args.min_lon,
        max_longitude: args.max_lon,
    };
    let collection = client.establishments_geojson(&bounds, args.zoom)?;
    let text = serde_json::to_string_pretty(&collection)?;
    match args.out.as_ref() {
        Some(path) => {
            std::fs::write(path, text)?;
            eprintln!(
                "Saved {} features to {}",
                collection.features.len(),
                path.display()
            );
        }
        None => println!("{}", text),
    }
    Ok(())
}
