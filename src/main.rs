// Entry point and interactive menu.
//
// - Option [1] pulls both sources and replaces the working snapshot.
// - Option [2] filters, sorts and reconciles the snapshot, writes the report
//   files and prints previews.
// - Options [3] and [4] edit the filter and sort selections.
use berth_report::config::{Config, DEFAULT_CONFIG_FILE};
use berth_report::error::{AppError, AppResult};
use berth_report::ingest::{self, Snapshot};
use berth_report::reconcile::resolve_with_audit;
use berth_report::reports::{self, FilterCriteria, SortDirection, SortKey};
use berth_report::sources::Sources;
use berth_report::{logging, output, util};
use chrono::NaiveDate;
use clap::Parser;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::{Mutex, MutexGuard};

/// Berth activity reconciliation reports.
#[derive(Debug, Parser)]
#[command(name = "berth_report")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

// The current snapshot plus the user's selections. A refresh swaps the
// snapshot out whole.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        snapshot: None,
        criteria: FilterCriteria::for_day(chrono::Local::now().date_naive()),
        sort: None,
    })
});

struct AppState {
    snapshot: Option<Snapshot>,
    criteria: FilterCriteria,
    sort: Option<(SortKey, SortDirection)>,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Print `label` and read one trimmed line.
fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice: ")
}

fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]: pull both sources and replace the snapshot.
async fn handle_refresh(sources: &Sources, config: &Config) {
    let normalizer = match config.normalizer() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{}\n", e);
            return;
        }
    };
    match ingest::refresh(sources, &normalizer).await {
        Ok(snapshot) => {
            for r in &snapshot.reports {
                println!(
                    "{}: {} rows read, {} kept, {} dropped (no vessel name), {} undated",
                    r.source,
                    util::format_int(r.total_rows),
                    util::format_int(r.kept_rows),
                    util::format_int(r.dropped_rows),
                    util::format_int(r.undated_rows)
                );
            }
            for f in &snapshot.failures {
                println!("Warning: {} is unavailable; results are partial.", f);
            }
            println!();
            state().snapshot = Some(snapshot);
        }
        Err(e) => eprintln!("Refresh failed: {}\n", e),
    }
}

/// Option [2]: write the record table, the slot table and the summary.
fn handle_generate_reports(config: &Config) -> AppResult<()> {
    let (snapshot, criteria, sort) = {
        let st = state();
        (st.snapshot.clone(), st.criteria.clone(), st.sort)
    };
    let snapshot = snapshot.ok_or(AppError::NoData)?;

    let mut filtered = reports::filter(&snapshot.records, &criteria);
    if let Some((key, direction)) = sort {
        reports::sort_records(&mut filtered, key, direction);
    }
    let (slots, audit) = resolve_with_audit(&config.slots, &snapshot.records, config.berth_matching);

    std::fs::create_dir_all(&config.output_dir)?;

    let record_rows = reports::record_rows(&filtered);
    let file1 = config.output_dir.join("records.csv");
    output::write_csv(&file1, &record_rows)?;
    println!("Activity Records ({} shown of {})\n", filtered.len(), snapshot.records.len());
    output::preview_table_rows(&record_rows, 5);
    println!("(Full table exported to {})\n", file1.display());

    let slot_rows = reports::slot_rows(&slots);
    let file2 = config.output_dir.join("berth_slots.csv");
    output::write_csv(&file2, &slot_rows)?;
    println!("Berth Slots\n");
    output::preview_table_rows(&slot_rows, slot_rows.len());
    println!("(Full table exported to {})\n", file2.display());

    let summary = reports::generate_summary(&snapshot, &filtered, &slots, &audit);
    let file3 = config.output_dir.join("summary.json");
    output::write_json(&file3, &summary)?;
    println!(
        "Delay: {}  On Schedule: {}",
        util::format_int(summary.delay_count),
        util::format_int(summary.on_schedule_count)
    );
    if summary.reconciliation_ties > 0 || summary.vessels_in_multiple_slots > 0 {
        println!(
            "Audit: {} tied slot(s), {} vessel(s) in more than one slot",
            summary.reconciliation_ties, summary.vessels_in_multiple_slots
        );
    }
    for f in &snapshot.failures {
        println!("Partial data: {}", f);
    }
    println!("(Summary saved to {})\n", file3.display());
    Ok(())
}

fn read_optional_date(label: &str, current: Option<NaiveDate>) -> Option<NaiveDate> {
    let shown = current.map(|d| d.to_string()).unwrap_or_else(|| "none".into());
    loop {
        let input = prompt(&format!("{} [YYYY-MM-DD, '-' for none, blank keeps {}]: ", label, shown));
        match input.as_str() {
            "" => return current,
            "-" => return None,
            s => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => return Some(d),
                Err(_) => println!("Invalid date."),
            },
        }
    }
}

/// Option [3]: edit the filter selections.
fn handle_set_filters() {
    let mut criteria = state().criteria.clone();
    criteria.start_date = read_optional_date("Start date", criteria.start_date);
    criteria.end_date = read_optional_date("End date", criteria.end_date);

    let shift = prompt("Shift code (e.g. I, II, III; blank for all): ");
    criteria.shift = (!shift.is_empty()).then_some(shift);

    let terminals = prompt("Terminals, comma separated (blank for all): ");
    criteria.terminals = terminals
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    state().criteria = criteria;
    println!("Filters updated.\n");
}

/// Option [4]: pick the record table's sort column.
fn handle_set_sort() {
    for (i, key) in SortKey::ALL.iter().enumerate() {
        println!("[{}] {:?}", i + 1, key);
    }
    println!("[0] No sorting");
    let choice = read_choice();
    let Ok(n) = choice.parse::<usize>() else {
        println!("Invalid choice.\n");
        return;
    };
    if n == 0 {
        state().sort = None;
        println!("Sorting cleared.\n");
        return;
    }
    let Some(&key) = SortKey::ALL.get(n - 1) else {
        println!("Invalid choice.\n");
        return;
    };
    let direction = match prompt("Direction (A/D): ").to_uppercase().as_str() {
        "D" => SortDirection::Descending,
        _ => SortDirection::Ascending,
    };
    state().sort = Some((key, direction));
    println!("Sorting by {:?} ({:?}).\n", key, direction);
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {}: {}", cli.config.display(), e);
            process::exit(1);
        }
    };
    let sources = match Sources::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to set up sources: {}", e);
            process::exit(1);
        }
    };

    loop {
        println!("Berth Activity Reports");
        println!("[1] Refresh data");
        println!("[2] Generate reports");
        println!("[3] Set filters");
        println!("[4] Sort records");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_refresh(&sources, &config).await,
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&config) {
                    match e {
                        AppError::NoData => {
                            println!("Error: No data loaded. Please refresh first (option 1).\n")
                        }
                        other => eprintln!("Report error: {}\n", other),
                    }
                    continue;
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_set_filters(),
            "4" => handle_set_sort(),
            "5" => break,
            _ => println!("Invalid choice. Please enter 1-5.\n"),
        }
    }
}
