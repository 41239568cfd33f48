use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use sheds_core::blend::max_operating_depth;
use sheds_core::compressor::{format_hms, operable};
use sheds_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheds")]
#[command(about = "Dive club shed manager: nitrox blending, compressors, loans and inventory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Who is operating (defaults to the name in local settings)
    #[arg(long, global = true)]
    operator: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a nitrox blend, and optionally record it
    Blend(BlendArgs),

    /// Show the O2 banks and their current pressures
    Banks,

    /// Set an O2 bank's pressure after a refill or gauge check
    FixBank {
        /// Bank id
        bank: String,
        /// Pressure now in the bank, bar
        bar: f64,
    },

    /// Compressor runtime log
    #[command(subcommand)]
    Compressor(CompressorCommand),

    /// Equipment loans
    #[command(subcommand)]
    Loan(LoanCommand),

    /// Role lists (member, operator, blender)
    #[command(subcommand)]
    Roles(RolesCommand),

    /// Equipment inventory
    #[command(subcommand)]
    Inventory(InventoryCommand),

    /// Read or change the club configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct BlendArgs {
    /// Pressure in the cylinder now, bar
    #[arg(long, default_value_t = 0.0)]
    start_bar: f64,

    /// O2 in the cylinder now, percent
    #[arg(long, default_value_t = 20.9)]
    start_mix: f64,

    /// Cylinder water capacity, litres
    #[arg(long, default_value_t = 12.0)]
    size: f64,

    /// Pressure wanted, bar
    #[arg(long, default_value_t = 232.0)]
    target_bar: f64,

    /// O2 wanted, percent
    #[arg(long)]
    target_mix: f64,

    /// Ambient temperature, °C
    #[arg(long, default_value_t = 20.0)]
    temperature: f64,

    /// O2 in the fill gas, percent
    #[arg(long, default_value_t = 100.0)]
    fill_mix: f64,

    /// O2 in the top-off gas, percent
    #[arg(long, default_value_t = 20.9)]
    top_off_mix: f64,

    /// Bank to draw from, in order of use (repeatable; default all banks)
    #[arg(long = "bank")]
    banks: Vec<String>,

    /// ppO2 limit used for the maximum operating depth, bar
    #[arg(long, default_value_t = 1.4)]
    ppo2_max: f64,

    /// Draw from the banks and record the fill
    #[arg(long)]
    commit: bool,

    /// Who is blending (defaults to the operator)
    #[arg(long)]
    blender: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum CompressorCommand {
    /// Record a compressor session
    Log {
        /// Compressor id (portable, fixed)
        id: String,
        /// Total runtime at the end of the session, hours
        #[arg(long)]
        runtime: f64,
        /// Intake temperature, °C
        #[arg(long)]
        temperature: Option<f64>,
        /// Relative humidity, percent
        #[arg(long)]
        humidity: Option<f64>,
    },

    /// Record a filter change at the current runtime
    FiltersChanged { id: String },

    /// Show runtime and remaining filter life
    Status {
        id: String,
        /// Check condensate at this intake temperature, °C
        #[arg(long, requires = "humidity")]
        temperature: Option<f64>,
        /// Check condensate at this relative humidity, percent
        #[arg(long, requires = "temperature")]
        humidity: Option<f64>,
    },
}

#[derive(Subcommand)]
enum LoanCommand {
    /// Lend equipment
    Add {
        /// Inventory descriptor of the item
        #[arg(long)]
        item: String,
        #[arg(long, default_value = "1")]
        count: String,
        #[arg(long)]
        borrower: String,
        /// Operator lending the item (defaults to the operator)
        #[arg(long)]
        lender: Option<String>,
        #[arg(long, default_value = "")]
        donation: String,
        /// Loan date, YYYY-MM-DD (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List loans (active only unless --all)
    List {
        #[arg(long, conflicts_with = "overdue")]
        all: bool,
        #[arg(long)]
        overdue: bool,
    },

    /// Record the return of a loan
    Return {
        /// Loan number as shown by `loan list`
        index: usize,
    },

    /// How many of an item are out on loan
    OnLoan { item: String },
}

#[derive(Subcommand)]
enum RolesCommand {
    /// Replace the names holding a role
    Set {
        role: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show all roles
    Show,
}

#[derive(Subcommand)]
enum InventoryCommand {
    /// Import one sheet from a CSV file
    Import { class: String, file: PathBuf },
    /// Show items and whether they can be lent
    Show { class: Option<String> },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the value at a colon path (whole tree if omitted)
    Get { path: Option<String> },
    /// Set a value at a colon path. The value is parsed as JSON, or taken as a string.
    Set { path: String, value: String },
}

fn main() -> Result<()> {
    sheds_core::logging::init();

    let cli = Cli::parse();

    let settings = Settings::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| settings.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let store = FileStore::new(data_dir);
    let operator = cli.operator.or_else(|| settings.operator.name.clone());
    let now = Utc::now();

    match cli.command {
        Commands::Blend(args) => cmd_blend(&store, args, operator, now),
        Commands::Banks => cmd_banks(&store),
        Commands::FixBank { bank, bar } => {
            let operator = require_operator(operator)?;
            let mut config = Config::load(&store)?;
            NitroxLog::load(&store)?.fix_bank(&store, &mut config, &bank, bar, &operator, now)?;
            println!("✓ Bank {} set to {} bar", bank, bar);
            Ok(())
        }
        Commands::Compressor(command) => cmd_compressor(&store, command, operator, now),
        Commands::Loan(command) => cmd_loan(&store, command, operator, now),
        Commands::Roles(command) => cmd_roles(&store, command),
        Commands::Inventory(command) => cmd_inventory(&store, command),
        Commands::Config(command) => cmd_config(&store, command),
    }
}

fn require_operator(operator: Option<String>) -> Result<String> {
    operator.ok_or_else(|| {
        Error::Config("No operator given: pass --operator or set operator.name in settings".into())
    })
}

fn cmd_blend(
    store: &FileStore,
    args: BlendArgs,
    operator: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let config = Config::load(store)?;
    let all_banks = NitroxLog::load(store)?.current_banks(&config)?;

    let mut banks = if args.banks.is_empty() {
        all_banks
    } else {
        args.banks
            .iter()
            .map(|id| {
                all_banks
                    .iter()
                    .find(|b| &b.id == id)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("No O2 bank {}", id)))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let conditions = BlendConditions {
        temperature: args.temperature,
        start_pressure: args.start_bar,
        start_mix: args.start_mix / 100.0,
        cylinder_size: args.size,
        target_pressure: args.target_bar,
        target_mix: args.target_mix / 100.0,
        fill_mix: args.fill_mix / 100.0,
        top_off_mix: args.top_off_mix / 100.0,
        min_o2_price: config.cheapest_o2_price()?.unwrap_or(0.0),
    };
    let planner = BlendPlanner::new(conditions);

    let plan = if args.commit {
        let blender = require_operator(args.blender.or(operator))?;
        let plan = planner.blend(&mut banks)?.into_result()?;
        NitroxLog::load(store)?.commit(store, &plan, &blender, now)?;
        plan
    } else {
        planner.preview(&banks)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    match plan.infeasibility {
        None => {
            println!("Blend {:.0} bar of {:.1}% nitrox:", args.target_bar, args.target_mix);
            print!("{}", plan.render());
            println!("Total cost: {:.2}", plan.total_cost);
            if let Some(depth) = max_operating_depth(args.ppo2_max, args.target_mix / 100.0) {
                println!("MOD at ppO2 {}: {} m", args.ppo2_max, depth);
            }
            if args.commit {
                println!("✓ Fill recorded");
            }
        }
        Some(Infeasibility::BanksExhausted { shortfall_litres }) => {
            println!(
                "Blend not feasible: the selected banks are {:.0} litres of O2 short",
                shortfall_litres
            );
        }
        Some(Infeasibility::UnreachableMix) => {
            println!("Blend not feasible: the target mix cannot be reached with these gases");
        }
    }
    Ok(())
}

fn cmd_banks(store: &FileStore) -> Result<()> {
    let config = Config::load(store)?;
    for bank in NitroxLog::load(store)?.current_banks(&config)? {
        println!(
            "Bank {}: {:.0} bar, {} L, {:.0} L available at {}/L",
            bank.id,
            bank.bar,
            bank.size_litres,
            bank.available_litres(),
            bank.price_per_litre
        );
    }
    Ok(())
}

fn cmd_compressor(
    store: &FileStore,
    command: CompressorCommand,
    operator: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        CompressorCommand::Log {
            id,
            runtime,
            temperature,
            humidity,
        } => {
            let record = CompressorRecord {
                date: now,
                operator: require_operator(operator)?,
                temperature,
                humidity,
                runtime_hours: runtime,
                filters_changed: false,
            };
            Compressor::load(store, &id)?.add_record(store, record)?;
            println!("✓ Logged {} at {}", id, format_hms(runtime));
            Ok(())
        }
        CompressorCommand::FiltersChanged { id } => {
            let operator = require_operator(operator)?;
            Compressor::load(store, &id)?.change_filters(store, &operator, now)?;
            println!("✓ Filters changed on {}", id);
            Ok(())
        }
        CompressorCommand::Status {
            id,
            temperature,
            humidity,
        } => {
            let config = Config::load(store)?;
            let compressor = Compressor::load(store, &id)?;
            let remaining = compressor.remaining_filter_life(&config.filter_params(&id)?);

            println!("Compressor {}", id);
            println!("  Runtime: {}", format_hms(compressor.runtime()));
            match compressor.last_filter_change() {
                Some(date) => println!("  Filters last changed: {}", date.format("%Y-%m-%d")),
                None => println!("  Filters last changed: never"),
            }
            if remaining < 0.0 {
                println!("  Filter life: overdue by {}", format_hms(-remaining));
            } else {
                println!("  Filter life remaining: {}", format_hms(remaining));
            }

            if let (Some(t), Some(h)) = (temperature, humidity) {
                let params = config.condensate_params(&id)?;
                if operable(t, h, &params) {
                    println!("  OK to run at {}°C, {}% humidity", t, h);
                } else {
                    println!("  Do not run at {}°C, {}% humidity: too much condensate", t, h);
                }
            }
            Ok(())
        }
    }
}

fn cmd_loan(
    store: &FileStore,
    command: LoanCommand,
    operator: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut ledger = LoanLedger::load(store)?;
    match command {
        LoanCommand::Add {
            item,
            count,
            borrower,
            lender,
            donation,
            date,
        } => {
            let roles = Roles::load(store)?;
            let inventory = Inventory::load(store)?;
            // An unreadable count is left for validation to report
            if let (Some(found), Ok(n)) = (inventory.find(&item, &ledger), count.trim().parse::<u32>()) {
                if !found.can_lend(n) {
                    let held = found.count.map_or(String::new(), |c| format!(" of {}", c));
                    return Err(Error::Other(format!(
                        "Cannot lend {} x {}: {}{} already on loan",
                        n, item, found.on_loan, held
                    )));
                }
            }
            let candidate = LoanCandidate {
                date: date.unwrap_or_else(|| now.to_rfc3339()),
                item,
                count,
                borrower,
                lender: require_operator(lender.or(operator))?,
                donation,
            };
            ledger.add_loan(store, &candidate, &roles, now)?.into_result()?;
            println!("✓ Lent {} x {} to {}", candidate.count, candidate.item, candidate.borrower);
            Ok(())
        }
        LoanCommand::List { all, overdue } => {
            let days = Config::load(store)?.loan_return_days();
            let late: Vec<usize> = ledger.overdue(now, days).map(|(i, _)| i).collect();
            let shown: Vec<(usize, &LoanRecord)> = if all {
                ledger.records().iter().enumerate().collect()
            } else if overdue {
                ledger.active().filter(|(i, _)| late.contains(i)).collect()
            } else {
                ledger.active().collect()
            };

            if shown.is_empty() {
                println!("No loans.");
            }
            for (index, loan) in shown {
                let status = match (&loan.returned, late.contains(&index)) {
                    (Some(by), _) if !loan.is_active() => format!("returned to {}", by),
                    (_, true) => "OVERDUE".to_string(),
                    _ => "on loan".to_string(),
                };
                println!(
                    "{:>3}  {}  {} x {}  {} (lent by {}, donation {:.2})  {}",
                    index,
                    loan.date.format("%Y-%m-%d"),
                    loan.count,
                    loan.item,
                    loan.borrower,
                    loan.lender,
                    loan.donation,
                    status
                );
            }
            Ok(())
        }
        LoanCommand::Return { index } => {
            let operator = require_operator(operator)?;
            ledger.mark_returned(store, index, &operator, &Roles::load(store)?)?;
            println!("✓ Loan {} returned to {}", index, operator);
            Ok(())
        }
        LoanCommand::OnLoan { item } => {
            println!("{}", ledger.number_on_loan(&item));
            Ok(())
        }
    }
}

fn cmd_roles(store: &FileStore, command: RolesCommand) -> Result<()> {
    let mut roles = Roles::load(store)?;
    match command {
        RolesCommand::Set { role, names } => {
            roles.set_role(store, &role, &names)?;
            println!("✓ {}: {}", role, names.join(", "));
        }
        RolesCommand::Show => {
            for record in roles.roles() {
                println!("{}: {}", record.role, record.names().join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_inventory(store: &FileStore, command: InventoryCommand) -> Result<()> {
    let mut inventory = Inventory::load(store)?;
    match command {
        InventoryCommand::Import { class, file } => {
            let text = std::fs::read_to_string(&file)?;
            let count = inventory.import_csv(&class, &text)?;
            inventory.save(store)?;
            println!("✓ Imported {} {} items", count, class);
        }
        InventoryCommand::Show { class } => {
            let ledger = LoanLedger::load(store)?;
            let classes: Vec<String> = match class {
                Some(class) => vec![class],
                None => inventory.sheets().iter().map(|s| s.class.clone()).collect(),
            };
            for class in classes {
                let items = inventory
                    .availability(&class, &ledger)
                    .ok_or_else(|| Error::Other(format!("No inventory sheet {}", class)))?;
                println!("{}", class);
                for item in items {
                    let mark = if item.can_pick { ' ' } else { '*' };
                    match item.count {
                        Some(count) => println!(
                            "  {} {} ({} of {} on loan)",
                            mark, item.descriptor, item.on_loan, count
                        ),
                        None if item.on_loan > 0 => {
                            println!("  {} {} (on loan)", mark, item.descriptor)
                        }
                        None => println!("  {} {}", mark, item.descriptor),
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(store: &FileStore, command: ConfigCommand) -> Result<()> {
    let mut config = Config::load(store)?;
    match command {
        ConfigCommand::Get { path } => {
            let value = match path {
                Some(path) => config
                    .get(&path)
                    .ok_or_else(|| Error::Config(format!("Missing config key {}", path)))?,
                None => config.as_value(),
            };
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        ConfigCommand::Set { path, value } => {
            let parsed = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
            config.set(&path, parsed);
            config.save(store)?;
            println!("✓ {} = {}", path, value);
        }
    }
    Ok(())
}
