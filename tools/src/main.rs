//! billing-runner: headless command runner for the billing engine.
//!
//! Usage:
//!   billing-runner --db billing.db create-loan --user u-1 --amount 1000000 --weeks 50
//!   billing-runner --db billing.db pay --loan <id> --amount 110000
//!   billing-runner --config billing.json --ipc-mode

use anyhow::Result;
use billing_core::{
    config::BillingConfig,
    engine::BillingEngine,
    error::BillingError,
    pricing::PricingRequest,
    repository::Page,
    store::SqliteStore,
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};

/// One request, from the command line or one stdin line in IPC mode.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    CreateLoan {
        user_id:     String,
        loan_amount: f64,
        loan_length: i64,
    },
    Outstanding {
        loan_id: String,
    },
    Payment {
        loan_id:        String,
        payment_amount: f64,
    },
    Delinquency {
        loan_id: String,
    },
    Loan {
        loan_id: String,
    },
    Loans {
        #[serde(default)]
        page:  i64,
        #[serde(default)]
        limit: i64,
    },
    History {
        loan_id: String,
    },
    Pricing(PricingRequest),
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match flag(&args, "--config") {
        Some(path) => BillingConfig::load(path)?,
        None => BillingConfig::default(),
    };
    if let Some(db) = flag(&args, "--db") {
        config.database = db.to_string();
    }
    if let Some(seed) = flag(&args, "--seed").and_then(|v| v.parse().ok()) {
        config.code_seed = Some(seed);
    }
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let store = SqliteStore::open(&config.database)?;
    store.migrate()?;
    log::info!("store={} migrated", store.path().unwrap_or(":memory:"));

    let mut engine = BillingEngine::build(store, config.code_seed);
    if let Some(pricing) = &config.default_pricing {
        if let Some(p) = engine.seed_default_pricing(pricing)? {
            log::info!("seeded default pricing {}", p.id);
        }
    }

    if ipc_mode {
        return run_ipc_loop(&mut engine);
    }

    let cmd = command_from_args(&args)?;
    let response = respond(&mut engine, cmd);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_ipc_loop(engine: &mut BillingEngine<SqliteStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        writeln!(stdout, "{}", respond(engine, cmd))?;
        stdout.flush()?;
    }
    Ok(())
}

fn respond(engine: &mut BillingEngine<SqliteStore>, cmd: IpcCommand) -> Value {
    match execute(engine, cmd) {
        Ok(v) => v,
        Err(e) => json!({ "error": e.to_string(), "kind": error_kind(&e) }),
    }
}

fn execute(engine: &mut BillingEngine<SqliteStore>, cmd: IpcCommand) -> Result<Value, BillingError> {
    let value = match cmd {
        IpcCommand::CreateLoan { user_id, loan_amount, loan_length } => {
            let loan = engine.create_loan(&user_id, loan_amount, loan_length)?;
            json!({ "message": "Loan created successfully", "loan": engine.loan_detail(&loan.id)? })
        }
        IpcCommand::Outstanding { loan_id } => json!({
            "message": "Outstanding fetched successfully",
            "outstanding_information": engine.get_outstanding(&loan_id)?,
        }),
        IpcCommand::Payment { loan_id, payment_amount } => json!({
            "message": "Payment processed successfully",
            "payment": engine.apply_payment(&loan_id, payment_amount)?,
        }),
        IpcCommand::Delinquency { loan_id } => json!({
            "message": "Delinquent installments fetched successfully",
            "data": engine.get_delinquency(&loan_id)?,
        }),
        IpcCommand::Loan { loan_id } => json!({
            "message": "Loan detail fetched successfully",
            "loan": engine.loan_detail(&loan_id)?,
        }),
        IpcCommand::Loans { page, limit } => {
            let page = Page::new(page, limit);
            json!({
                "message": "Loans fetched successfully",
                "page": page.page,
                "limit": page.limit,
                "loans": engine.list_loans(page)?,
            })
        }
        IpcCommand::History { loan_id } => json!({
            "message": "Loan history fetched successfully",
            "events": engine.loan_history(&loan_id)?,
        }),
        IpcCommand::Pricing(request) => json!({
            "message": "Pricing saved successfully",
            "pricing": engine.upsert_pricing(&request)?,
        }),
        IpcCommand::Quit => json!({ "message": "bye" }),
    };
    Ok(value)
}

fn error_kind(e: &BillingError) -> &'static str {
    match e {
        BillingError::InvalidLoanParameters { .. }      => "invalid_loan_parameters",
        BillingError::NoPricingAvailable                => "no_pricing_available",
        BillingError::ActiveLoanExists { .. }           => "active_loan_exists",
        BillingError::LoanNotFound { .. }               => "loan_not_found",
        BillingError::NoPendingInstallments { .. }      => "no_pending_installments",
        BillingError::PaymentExceedsOutstanding { .. }  => "payment_exceeds_outstanding",
        BillingError::PaymentBelowMinimumOverdue { .. } => "payment_below_minimum_overdue",
        BillingError::InvalidPayment { .. }             => "invalid_payment",
        BillingError::InvalidPricing { .. }             => "invalid_pricing",
        BillingError::PricingNotFound { .. }            => "pricing_not_found",
        BillingError::PricingInUse { .. }               => "pricing_in_use",
        BillingError::DuplicatePricing { .. }           => "duplicate_pricing",
        BillingError::PersistenceFailure { .. }         => "persistence_failure",
        BillingError::Serialization(_)                  => "serialization",
        BillingError::Other(_)                          => "other",
    }
}

/// Map `<command> --flag value ...` onto an IpcCommand.
fn command_from_args(args: &[String]) -> Result<IpcCommand> {
    let command = args
        .iter()
        .skip(1)
        .enumerate()
        .find(|(i, a)| !a.starts_with("--") && !is_flag_value(args, i + 1))
        .map(|(_, a)| a.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing command"))?;

    let cmd = match command {
        "create-loan" => IpcCommand::CreateLoan {
            user_id:     required(args, "--user")?.to_string(),
            loan_amount: required(args, "--amount")?.parse()?,
            loan_length: required(args, "--weeks")?.parse()?,
        },
        "outstanding" => IpcCommand::Outstanding { loan_id: required(args, "--loan")?.to_string() },
        "pay" => IpcCommand::Payment {
            loan_id:        required(args, "--loan")?.to_string(),
            payment_amount: required(args, "--amount")?.parse()?,
        },
        "delinquency" => IpcCommand::Delinquency { loan_id: required(args, "--loan")?.to_string() },
        "loan" => IpcCommand::Loan { loan_id: required(args, "--loan")?.to_string() },
        "loans" => IpcCommand::Loans {
            page:  parse_arg(args, "--page", 1),
            limit: parse_arg(args, "--limit", Page::DEFAULT_LIMIT as i64),
        },
        "history" => IpcCommand::History { loan_id: required(args, "--loan")?.to_string() },
        "pricing" => IpcCommand::Pricing(PricingRequest {
            id:            flag(args, "--id").map(str::to_string),
            interest_rate: required(args, "--interest-rate")?.parse()?,
            admin_rate:    required(args, "--admin-rate")?.parse()?,
        }),
        other => anyhow::bail!("unknown command: {other}"),
    };
    Ok(cmd)
}

/// True when `args[i]` is the value of the flag before it.
fn is_flag_value(args: &[String], i: usize) -> bool {
    i > 0
        && args[i - 1].starts_with("--")
        && args[i - 1] != "--ipc-mode"
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

fn required<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    flag(args, name).ok_or_else(|| anyhow::anyhow!("missing {name}"))
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag_name: &str, default: T) -> T {
    flag(args, flag_name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
