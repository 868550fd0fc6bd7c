use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use pillsplit_core::status::pill_days;
use pillsplit_core::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pillsplit")]
#[command(about = "Medication distribution planner for two-household custody", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate as of this date instead of today (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show inventory, refill and next distribution (default)
    Status {
        /// Custody calendar export to read instead of the configured one
        #[arg(long)]
        events: Option<PathBuf>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a prescription fill
    Fill {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        quantity: u32,

        #[arg(long)]
        pharmacy: Option<String>,

        #[arg(long)]
        rx: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Correct a recorded fill (only the given fields change)
    Correct {
        /// Id of the fill to correct
        #[arg(long)]
        fill: Uuid,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        quantity: Option<u32>,

        #[arg(long)]
        pharmacy: Option<String>,

        #[arg(long)]
        rx: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Record pills handed to the other parent
    Distribute {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        quantity: u32,

        /// Fill the pills came from (defaults to the latest fill)
        #[arg(long)]
        fill: Option<Uuid>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Show who gives the pill on each day
    Schedule {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,

        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// List recent fills and distributions
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Export the distribution history to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Print upcoming reminders as JSON lines
    Reminders {
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    pillsplit_core::logging::init_with_level(pillsplit_core::logging::level_for_verbosity(
        cli.verbose,
    ));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let ledger = Ledger::open(&data_dir);
    tracing::debug!("Using data directory {:?}, today is {}", data_dir, today);

    let app = App {
        config: &config,
        data_dir: &data_dir,
        ledger: &ledger,
        today,
    };

    match cli.command {
        Some(Commands::Status { events, json }) => cmd_status(&app, events.as_deref(), json),
        Some(Commands::Fill {
            date,
            quantity,
            pharmacy,
            rx,
            notes,
        }) => cmd_fill(
            &app,
            NewFill {
                fill_date: date,
                quantity,
                pharmacy,
                rx_number: rx,
                notes,
            },
        ),
        Some(Commands::Correct {
            fill,
            date,
            quantity,
            pharmacy,
            rx,
            notes,
        }) => cmd_correct(
            &app,
            fill,
            FillChanges {
                date,
                quantity,
                pharmacy,
                rx_number: rx,
                notes,
            },
        ),
        Some(Commands::Distribute {
            date,
            quantity,
            fill,
            notes,
        }) => cmd_distribute(&app, date, quantity, fill, notes),
        Some(Commands::Schedule { from, to, events }) => {
            cmd_schedule(&app, from, to, events.as_deref())
        }
        Some(Commands::History { limit }) => cmd_history(&app, limit),
        Some(Commands::Export { out }) => cmd_export(&app, &out),
        Some(Commands::Reminders { events }) => cmd_reminders(&app, events.as_deref()),
        None => {
            // Default to "status" command
            cmd_status(&app, None, false)
        }
    }
}

/// Shared state for every command
struct App<'a> {
    config: &'a Config,
    data_dir: &'a Path,
    ledger: &'a Ledger,
    today: NaiveDate,
}

impl App<'_> {
    fn events(&self, events_override: Option<&Path>) -> Result<Vec<RawEvent>> {
        let path = events_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.events_path(self.data_dir));
        load_custody_events(&path)
    }

    fn snapshot(&self, events_override: Option<&Path>) -> Result<StatusSnapshot> {
        let household = self.config.household()?;
        let policy = self.config.refill_policy()?;
        let events = self.events(events_override)?;

        let latest_fill = self.ledger.latest_fill()?;
        let distributions = match &latest_fill {
            Some(fill) => self.ledger.distributions_for(fill.id)?,
            None => Vec::new(),
        };

        build_status(StatusInput {
            latest_fill: latest_fill.as_ref(),
            distributions: &distributions,
            events: &events,
            household: &household,
            policy: &policy,
            today: self.today,
        })
    }
}

fn cmd_status(app: &App, events: Option<&Path>, json: bool) -> Result<()> {
    let snapshot = app.snapshot(events)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    display_status(&snapshot);
    Ok(())
}

fn cmd_fill(app: &App, new: NewFill) -> Result<()> {
    let fill = app.ledger.record_fill(new)?;
    let policy = app.config.refill_policy()?;
    let eligible = earliest_refill_date(fill.fill_date, fill.quantity, policy.threshold_percent)?;

    println!("✓ Fill recorded: {} pills on {}", fill.quantity, fill.fill_date);
    println!("  Id: {}", fill.id);
    println!("  Refill eligible: {}", eligible);
    Ok(())
}

/// Fields to overwrite on a recorded fill
struct FillChanges {
    date: Option<NaiveDate>,
    quantity: Option<u32>,
    pharmacy: Option<String>,
    rx_number: Option<String>,
    notes: Option<String>,
}

fn cmd_correct(app: &App, fill_id: Uuid, changes: FillChanges) -> Result<()> {
    let fill = app.ledger.correct_fill(fill_id, |fill| {
        if let Some(date) = changes.date {
            fill.fill_date = date;
        }
        if let Some(quantity) = changes.quantity {
            fill.quantity = quantity;
        }
        if changes.pharmacy.is_some() {
            fill.pharmacy = changes.pharmacy;
        }
        if changes.rx_number.is_some() {
            fill.rx_number = changes.rx_number;
        }
        if changes.notes.is_some() {
            fill.notes = changes.notes;
        }
    })?;

    println!("✓ Fill corrected: {} pills on {}", fill.quantity, fill.fill_date);
    println!("  Id: {}", fill.id);
    Ok(())
}

fn cmd_distribute(
    app: &App,
    date: NaiveDate,
    quantity: u32,
    fill_id: Option<Uuid>,
    notes: Option<String>,
) -> Result<()> {
    let fill_id = match fill_id {
        Some(id) => id,
        None => app
            .ledger
            .latest_fill()?
            .map(|f| f.id)
            .ok_or_else(|| Error::Ledger("no fill recorded yet".into()))?,
    };

    let distribution = app.ledger.record_distribution(NewDistribution {
        date,
        quantity,
        fill_id,
        notes,
    })?;

    println!(
        "✓ Distribution recorded: {} pills on {}",
        distribution.quantity, distribution.date
    );
    Ok(())
}

fn cmd_schedule(app: &App, from: NaiveDate, to: NaiveDate, events: Option<&Path>) -> Result<()> {
    let household = app.config.household()?;
    let window = DateWindow::new(from, to)?;
    let events = app.events(events)?;

    let (has_custody_data, assignments) = pill_days(&events, &household, window)?;
    if !has_custody_data {
        println!(
            "⚠ No custody entries matched; every day goes to {}",
            household.default_owner
        );
    }

    for assignment in &assignments {
        println!(
            "{}  {}  {}",
            assignment.date,
            assignment.date.format("%a"),
            assignment.responsible
        );
    }

    println!();
    for (parent, days) in &tally(&assignments).days {
        println!("{}: {} pill days", parent, days.len());
    }
    Ok(())
}

fn cmd_history(app: &App, limit: usize) -> Result<()> {
    let fills = app.ledger.fill_history(limit)?;
    let distributions = app.ledger.distribution_history(limit)?;

    if fills.is_empty() {
        println!("No fills recorded.");
        return Ok(());
    }

    println!("Fills:");
    for fill in &fills {
        println!(
            "  {}  {:>4} pills  {}  {}",
            fill.fill_date,
            fill.quantity,
            fill.pharmacy.as_deref().unwrap_or("-"),
            fill.id
        );
    }

    println!("Distributions:");
    if distributions.is_empty() {
        println!("  none");
    }
    for distribution in &distributions {
        println!(
            "  {}  {:>4} pills  {}",
            distribution.date,
            distribution.quantity,
            distribution.notes.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_export(app: &App, out: &Path) -> Result<()> {
    let count = export_distributions(app.ledger, out)?;

    println!("✓ Exported {} distributions", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_reminders(app: &App, events: Option<&Path>) -> Result<()> {
    let snapshot = app.snapshot(events)?;
    let target = app.config.household()?.target;

    for event in plan_reminders(&snapshot, target.as_str()) {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn display_status(snapshot: &StatusSnapshot) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  PILLSPLIT STATUS  {}", snapshot.today);
    println!("╰─────────────────────────────────────────╯");
    println!();

    let Some(fill) = &snapshot.fill else {
        println!("  No prescription fill recorded.");
        println!("  Record one with: pillsplit fill --date YYYY-MM-DD --quantity N");
        println!();
        return;
    };

    println!(
        "  Fill: {} pills on {} ({} days ago)",
        fill.quantity, fill.date, fill.days_ago
    );
    if let Some(pharmacy) = &fill.pharmacy {
        println!("  Pharmacy: {}", pharmacy);
    }

    if let Some(refill) = &snapshot.refill {
        if refill.can_refill {
            println!("  Refill: eligible since {}", refill.eligible_date);
        } else {
            println!(
                "  Refill: eligible {} (in {} days)",
                refill.eligible_date, refill.days_until
            );
        }
    }
    println!();

    if let Some(inventory) = &snapshot.inventory {
        println!(
            "  {}: {} pills remaining",
            inventory.target, inventory.pills_remaining
        );
        match (inventory.run_out_date, inventory.days_until_run_out) {
            (Some(date), _) if inventory.is_out => println!("  → Out since {}", date),
            (Some(date), Some(days)) => println!("  → Runs out {} (in {} days)", date, days),
            _ if inventory.total_distributed == 0 => println!("  → Nothing handed out yet"),
            _ => println!("  → Covered past the planning window"),
        }
        println!(
            "  {} holds {} pills",
            inventory.holder, inventory.pills_with_holder
        );
        if let Some(last) = &inventory.last_distribution {
            println!(
                "  Last handed out: {} pills on {} ({} days ago)",
                last.quantity, last.date, last.days_ago
            );
        }
        println!();
    }

    if let Some(plan) = &snapshot.next_distribution {
        println!(
            "  Next distribution: {} pills on {}",
            plan.quantity, plan.distribution_date
        );
        println!("  → First pill day {}", plan.pill_day);
        println!("  → Covers {}", plan.supply_window);
        if let Some(blocked) = &plan.blocked_by {
            println!("  ⚠ Waiting on refill, eligible {}", blocked.eligible_date);
            if plan.uncovered_pill_days > 0 {
                println!(
                    "  ⚠ {} pill days before then have no stock",
                    plan.uncovered_pill_days
                );
            }
        }
        println!();
    }

    if let Some(breakdown) = &snapshot.breakdown {
        println!("  Pill days {}:", breakdown.window);
        for (parent, days) in &breakdown.tally.days {
            println!("    {}: {}", parent, days.len());
        }
        println!();
    }

    if !snapshot.has_custody_data {
        println!("  ⚠ No custody calendar entries matched; check the parent matchers.");
        println!();
    }
}
