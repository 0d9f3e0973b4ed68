// Entry point and interactive menu.
//
// - [1] imports a file (server analysis first, local decoding as fallback).
// - [2] prints the dashboard reports and writes the CSV export and summary.json.
// - The remaining options filter, search and drill into the imported dataset,
//   or manage the session and users when a backend is configured.
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use supplier_score::auth::{ApiClient, Role, SessionStore, UserCreateInput, UserUpdateInput};
use supplier_score::config::{Config, Overrides};
use supplier_score::ingest::{AnalyzeOptions, IngestOutcome, Ingestor};
use supplier_score::loader::UploadFile;
use supplier_score::remote::RemoteAnalyzer;
use supplier_score::store::DatasetStore;
use supplier_score::types::{FilterKey, ReportSummary, SortKey, SortOrder};
use supplier_score::{output, reports, util};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for supplier-score
#[derive(Parser, Debug)]
#[command(name = "supplier-score")]
#[command(about = "Import, normalize and report on supplier performance tables")]
#[command(version)]
struct Args {
    /// TOML configuration file (defaults to ./supplier-score.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the analysis and auth backend
    #[arg(long, env = "SUPPLIER_SCORE_API_URL")]
    api_url: Option<String>,

    /// Directory holding the persisted dataset and session
    #[arg(long, env = "SUPPLIER_SCORE_STATE_DIR")]
    state_dir: Option<PathBuf>,
}

/// Menu choice returned once input is exhausted.
const EXIT_CHOICE: &str = "0";

/// One trimmed line, or `None` at end of input.
fn read_trimmed_line(input: &mut impl BufRead) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn choice_from(input: &mut impl BufRead) -> String {
    read_trimmed_line(input).unwrap_or_else(|| EXIT_CHOICE.to_string())
}

/// Print `label` and read one trimmed line.
fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_trimmed_line(&mut io::stdin().lock()).unwrap_or_default()
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    choice_from(&mut io::stdin().lock())
}

fn save_dataset(config: &Config, dataset: &DatasetStore) {
    if let Err(e) = dataset.save(&config.dataset_path()) {
        eprintln!("Could not save dataset: {}", e);
    }
}

fn save_session(config: &Config, session: &SessionStore) {
    if let Err(e) = session.save(&config.session_path()) {
        eprintln!("Could not save session: {}", e);
    }
}

/// Option [1]: import a file and replace the dataset.
async fn handle_import(config: &Config, ingestor: &Ingestor, dataset: &mut DatasetStore) {
    let path = prompt("File path (.csv, .xlsx, .xls, .xlsm): ");
    if path.is_empty() {
        println!("No file given.\n");
        return;
    }
    let file = match UploadFile::from_path(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to read file: {}\n", e);
            return;
        }
    };

    let mut options = AnalyzeOptions::default();
    if ingestor.has_service() {
        let s2 = prompt(&format!("Sheet 2 [{}]: ", config.sheet2));
        let s3 = prompt(&format!("Sheet 3 [{}]: ", config.sheet3));
        options.sheet2 = Some(s2).filter(|s| !s.is_empty());
        options.sheet3 = Some(s3).filter(|s| !s.is_empty());
    }

    println!("Processing {}...", file.name);
    let outcome = ingestor.analyze_tagged(&file, &options).await;
    let source = outcome.source();
    match outcome {
        IngestOutcome::Remote(rows) | IngestOutcome::Local(rows) => {
            println!(
                "{} rows imported ({} analysis).\n",
                util::format_int(rows.len()),
                source
            );
            dataset.replace_from_import(rows);
            save_dataset(config, dataset);
        }
        IngestOutcome::Failed(e) => {
            eprintln!("Import failed: {}\n", e);
        }
    }
}

/// Option [2]: dashboard reports for the filtered rows.
fn handle_reports(config: &Config, dataset: &DatasetStore) {
    if dataset.rows().is_empty() {
        println!("Error: No data loaded. Please import a file first (option 1).\n");
        return;
    }
    let rows = dataset.filtered_rows();
    let kpis = reports::kpi_summary(&rows);

    println!("Dashboard");
    if !dataset.filters().is_empty() {
        let f = dataset.filters();
        println!(
            "(Filtered: famille='{}' ss-famille='{}' fournisseur='{}')",
            f.famille, f.ss_famille, f.fournisseur
        );
    }
    println!("  SS-Familles : {}", util::format_int(kpis.ss_familles));
    println!("  Fournisseurs: {}", util::format_int(kpis.fournisseurs));
    println!("  CA total    : {}", util::format_mad(kpis.total_ca));
    println!("  Marge moy.  : {}\n", util::format_pct(kpis.avg_marge));

    println!("Top SS-Familles by CA\n");
    let top = reports::top_ss_familles(&rows, reports::TOP_SS_FAMILLES);
    output::preview_table_rows(&reports::render_top_ss_familles(&top), reports::TOP_SS_FAMILLES);

    println!("Supplier ranking (by score)\n");
    output::preview_table_rows(&reports::supplier_ranking(&rows, 5), 5);

    match output::write_export_csv(&config.export_path, &rows) {
        Ok(()) => println!("(Full table exported to {})", config.export_path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }

    let summary = ReportSummary {
        source_rows: dataset.rows().len(),
        filtered_rows: rows.len(),
        filters: dataset.filters().clone(),
        kpis,
        generated_at: chrono::Utc::now(),
    };
    match output::write_json(std::path::Path::new("summary.json"), &summary) {
        Ok(()) => println!("(Summary written to summary.json)\n"),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

/// Option [3]: pick one value for a filter.
fn handle_set_filter(config: &Config, dataset: &mut DatasetStore) {
    println!("[1] Famille  [2] SS-Famille  [3] Fournisseur");
    let key = match read_choice().as_str() {
        "1" => FilterKey::Famille,
        "2" => FilterKey::SsFamille,
        "3" => FilterKey::Fournisseur,
        _ => {
            println!("Invalid choice.\n");
            return;
        }
    };
    let values = reports::distinct_values(dataset.rows(), key);
    if values.is_empty() {
        println!("No values available.\n");
        return;
    }
    println!("[0] (all)");
    for (idx, v) in values.iter().enumerate() {
        println!("[{}] {}", idx + 1, v);
    }
    match read_choice().parse::<usize>() {
        Ok(0) => dataset.set_filter(key, ""),
        Ok(n) if n <= values.len() => dataset.set_filter(key, values[n - 1].clone()),
        _ => {
            println!("Invalid choice.\n");
            return;
        }
    }
    save_dataset(config, dataset);
    println!("{} rows match.\n", util::format_int(dataset.filtered_rows().len()));
}

/// Option [5]: search, sort and page through the rows.
fn handle_search(dataset: &DatasetStore) {
    let term = prompt("Search (famille, ss-famille, fournisseur): ");
    let mut hits = reports::search_rows(dataset.rows(), &term);
    println!("Sort by: [1] CA  [2] Score  [3] Marge  [4] Fournisseur");
    let (key, order) = match read_choice().as_str() {
        "2" => (SortKey::ScoreFournisseur, SortOrder::Desc),
        "3" => (SortKey::MargeArriere, SortOrder::Desc),
        "4" => (SortKey::Fournisseur, SortOrder::Asc),
        _ => (SortKey::CaFournisseurDansSsf, SortOrder::Desc),
    };
    reports::sort_rows(&mut hits, key, order);

    let pages = reports::page_count(hits.len(), reports::ITEMS_PER_PAGE);
    let mut page = 1;
    loop {
        let slice = reports::paginate(&hits, page, reports::ITEMS_PER_PAGE);
        let first = (page - 1) * reports::ITEMS_PER_PAGE + 1;
        output::preview_table_rows(&reports::ranking_rows(slice, first), reports::ITEMS_PER_PAGE);
        println!("Page {}/{} ({} results)", page, pages, util::format_int(hits.len()));
        match prompt("Page number (Enter to go back): ").parse::<usize>() {
            Ok(n) if (1..=pages).contains(&n) => page = n,
            _ => {
                println!();
                return;
            }
        }
    }
}

/// Option [6]: suppliers competing in one sub-category.
fn handle_drill_down(dataset: &DatasetStore) {
    let ss_famille = prompt("SS-Famille: ");
    let peers = reports::competitors_in(dataset.rows(), &ss_famille);
    if peers.is_empty() {
        println!("No supplier in '{}'.\n", ss_famille);
        return;
    }
    output::preview_table_rows(&peers, peers.len());
}

/// Option [8]: sign in, or sign out when already signed in.
async fn handle_session(config: &Config, api: Option<&ApiClient>, session: &mut SessionStore) {
    if session.is_authed() {
        session.logout();
        save_session(config, session);
        println!("Signed out.\n");
        return;
    }
    let Some(api) = api else {
        println!("No backend configured (set api_url).\n");
        return;
    };
    let identifier = prompt("Email or username: ");
    let password = prompt("Password: ");
    match api.login(&identifier, &password).await {
        Ok(resp) => {
            println!("Welcome {}.\n", resp.user.full_name.as_deref().unwrap_or(&resp.user.username));
            session.login(resp);
            save_session(config, session);
        }
        Err(e) => eprintln!("Sign in failed: {}\n", e),
    }
}

/// Option [9]: user administration, admin only.
async fn handle_users(api: Option<&ApiClient>, session: &SessionStore) {
    let Some(api) = api else {
        println!("No backend configured (set api_url).\n");
        return;
    };
    let token = match session.require_admin() {
        Ok(t) => t,
        Err(e) => {
            println!("{}.\n", e);
            return;
        }
    };

    match api.list_users(token).await {
        Ok(users) => {
            for u in &users {
                println!(
                    "#{} {} <{}> {:?} joined {}",
                    u.id,
                    u.username,
                    u.email,
                    u.role,
                    u.joined_at.format("%Y-%m-%d")
                );
            }
            println!();
        }
        Err(e) => {
            eprintln!("Could not list users: {}\n", e);
            return;
        }
    }

    println!("[1] Create user  [2] Change role  [3] Delete user  [Enter] Back");
    let result = match read_choice().as_str() {
        "1" => {
            let input = UserCreateInput {
                email: prompt("Email: "),
                username: Some(prompt("Username (optional): ")).filter(|s| !s.is_empty()),
                full_name: Some(prompt("Full name (optional): ")).filter(|s| !s.is_empty()),
                password: prompt("Password: "),
                role: if prompt("Admin? (Y/N): ").eq_ignore_ascii_case("y") {
                    Role::Admin
                } else {
                    Role::User
                },
            };
            api.create_user(token, &input).await.map(|u| format!("Created #{}.", u.id))
        }
        "2" => {
            let Ok(id) = prompt("User id: ").parse::<i64>() else {
                println!("Invalid id.\n");
                return;
            };
            let role = if prompt("Admin? (Y/N): ").eq_ignore_ascii_case("y") {
                Role::Admin
            } else {
                Role::User
            };
            let patch = UserUpdateInput {
                role: Some(role),
                ..Default::default()
            };
            api.update_user(token, id, &patch).await.map(|u| format!("Updated #{}.", u.id))
        }
        "3" => {
            let Ok(id) = prompt("User id: ").parse::<i64>() else {
                println!("Invalid id.\n");
                return;
            };
            api.delete_user(token, id).await.map(|_| format!("Deleted #{}.", id))
        }
        _ => return,
    };
    match result {
        Ok(msg) => println!("{}\n", msg),
        Err(e) => eprintln!("Request failed: {}\n", e),
    }
}

/// Drop a stored session the backend no longer accepts.
async fn revalidate_session(config: &Config, api: Option<&ApiClient>, session: &mut SessionStore) {
    let (Some(api), Some(token)) = (api, session.token()) else {
        return;
    };
    match api.me(token).await {
        Ok(_) => {}
        Err(e) if e.is_auth_rejection() => {
            tracing::warn!(error = %e, "Stored session rejected, signing out");
            session.logout();
            save_session(config, session);
        }
        Err(e) => tracing::warn!(error = %e, "Could not check stored session, keeping it"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(Overrides {
            api_url: args.api_url,
            state_dir: args.state_dir,
        });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut ingestor = Ingestor::local();
    let mut api = None;
    if let Some(url) = config.api_url() {
        match RemoteAnalyzer::new(url, config.analyze_timeout()) {
            Ok(remote) => ingestor = Ingestor::with_service(Box::new(remote)),
            Err(e) => tracing::warn!(error = %e, "Analysis client unavailable, using local analysis only"),
        }
        api = Some(ApiClient::new(url, config.api_timeout()).context("Failed to build API client")?);
        tracing::info!(api_url = url, "Backend configured");
    }
    let ingestor = ingestor.with_sheet_defaults(config.sheet2.clone(), config.sheet3.clone());

    let mut dataset = DatasetStore::load_or_default(&config.dataset_path());
    let mut session = SessionStore::load_or_default(&config.session_path());
    revalidate_session(&config, api.as_ref(), &mut session).await;

    loop {
        match session.user() {
            Some(u) => println!("Supplier Score ({} rows, signed in as {})", dataset.rows().len(), u.username),
            None => println!("Supplier Score ({} rows)", dataset.rows().len()),
        }
        println!("[1] Import a file");
        println!("[2] Generate reports");
        println!("[3] Set a filter");
        println!("[4] Clear filters");
        println!("[5] Search suppliers");
        println!("[6] Sub-category drill-down");
        println!("[7] Clear data");
        println!("[8] {}", if session.is_authed() { "Sign out" } else { "Sign in" });
        if session.is_admin() {
            println!("[9] Users");
        }
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_import(&config, &ingestor, &mut dataset).await,
            "2" => {
                println!();
                handle_reports(&config, &dataset);
            }
            "3" => handle_set_filter(&config, &mut dataset),
            "4" => {
                dataset.clear_filters();
                save_dataset(&config, &dataset);
                println!("Filters cleared.\n");
            }
            "5" => handle_search(&dataset),
            "6" => handle_drill_down(&dataset),
            "7" => {
                dataset.clear_rows();
                dataset.clear_filters();
                save_dataset(&config, &dataset);
                println!("Data cleared.\n");
            }
            "8" => handle_session(&config, api.as_ref(), &mut session).await,
            "9" => handle_users(api.as_ref(), &session).await,
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter a number from the menu.\n"),
        }
    }
    Ok(())
}
