use std::fmt::Write as _;
use std::io::{self, BufRead};
use std::process;

#[macro_use]
extern crate log;

mod features;
use features::{IdentityPolicy, LedgerOps, OpError, PaymentMethod, PersonalView, StatsView, Store};

const HELP: &str = "\
Commands:
  setup <name>              register yourself under a display name
  register <account> <key>  bind an account to a participant key
  bought <amount> <price> [crypto|paypal|mobilepay]
  sold <amount> <price> [crypto|paypal|mobilepay]
  stats                     aggregate view
  personal                  your own totals
  reset RESET               wipe the ledger (exact confirmation required)
  quit";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = clap::Command::new("bgl-ledger")
        .about("Shared BGL inventory ledger")
        .arg(
            clap::Arg::new("data-dir")
                .long("data-dir")
                .takes_value(true)
                .default_value(".")
                .help("Directory holding data.json and config.json"),
        )
        .arg(
            clap::Arg::new("account")
                .long("account")
                .takes_value(true)
                .default_value("local")
                .help("Caller identity used for trades"),
        )
        .arg(
            clap::Arg::new("participants")
                .long("participants")
                .takes_value(true)
                .help("Comma-separated closed participant set; omit for the open policy"),
        )
        .arg(
            clap::Arg::new("shares")
                .long("shares")
                .takes_value(true)
                .help("Fixed profit split count (defaults to the participant set size)"),
        )
        .get_matches();

    let policy = match matches.value_of("participants") {
        Some(list) => IdentityPolicy::ClosedRegistered {
            keys: list.split(',').map(|key| key.trim().to_string()).collect(),
        },
        None => IdentityPolicy::Open,
    };
    let mut ops = LedgerOps::new(Store::open(matches.value_of("data-dir").unwrap()), policy);
    if let Some(shares) = matches.value_of("shares") {
        ops = ops.with_profit_shares(shares.parse::<u32>()?);
    }
    let account = matches.value_of("account").unwrap();

    println!("{HELP}");
    for line in io::stdin().lock().lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            fields => match execute(&ops, account, fields) {
                Ok(reply) => println!("{reply}"),
                Err(e) => {
                    warn!("rejected command {line:?}: {e}");
                    println!("❌ {e}");
                }
            },
        }
    }
    Ok(())
}

fn execute(ops: &LedgerOps, account: &str, fields: &[&str]) -> Result<String, OpError> {
    match fields {
        ["setup", name] => {
            let key = ops.register(account, name)?;
            Ok(format!("✅ You are now registered as {key}"))
        }
        ["register", acct, key] => {
            let key = ops.register(acct, key)?;
            Ok(format!("✅ {acct} is now registered as {key}"))
        }
        ["bought", amount, price, rest @ ..] => {
            let outcome = ops.record_purchase(account, amount, price, payment(rest)?)?;
            Ok(format!(
                "✅ {} bought {} BGL for {}€{}, inventory is now {} BGL",
                outcome.key,
                outcome.amount,
                outcome.price.abs(),
                payment_suffix(outcome.payment),
                outcome.inventory
            ))
        }
        ["sold", amount, price, rest @ ..] => {
            let outcome = ops.record_sale(account, amount, price, payment(rest)?)?;
            Ok(format!(
                "✅ {} sold {} BGL for {}€{}, inventory is now {} BGL",
                outcome.key,
                outcome.amount,
                outcome.price,
                payment_suffix(outcome.payment),
                outcome.inventory
            ))
        }
        ["stats"] => Ok(render_stats(&ops.stats()?)),
        ["personal"] => Ok(render_personal(&ops.personal_stats(account)?)),
        ["reset", token] => {
            ops.reset(token)?;
            Ok("✅ Ledger reset, all statistics cleared".to_string())
        }
        ["help"] => Ok(HELP.to_string()),
        _ => Ok(format!("Unknown command\n{HELP}")),
    }
}

fn payment(rest: &[&str]) -> Result<Option<PaymentMethod>, OpError> {
    match rest {
        [] => Ok(None),
        [method] => PaymentMethod::parse(method)
            .map(Some)
            .ok_or_else(|| OpError::InvalidPayment(method.to_string())),
        _ => Err(OpError::InvalidPayment(rest.join(" "))),
    }
}

fn payment_suffix(method: Option<PaymentMethod>) -> String {
    method.map(|m| format!(" ({m})")).unwrap_or_default()
}

fn render_stats(view: &StatsView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 Stats");
    let _ = writeln!(out, "💼 Inventory: {} BGL", view.inventory);
    for (key, summary) in &view.participants {
        let _ = writeln!(
            out,
            "  {key}: bought {}€, sold +{}€, profit {}€",
            summary.total_bought.abs().round_dp(2),
            summary.total_sold.round_dp(2),
            summary.profit.round_dp(2)
        );
    }
    let _ = writeln!(
        out,
        "💰 Total: bought {}€, sold +{}€, profit {}€, split {}€ / person",
        view.totals.total_bought.abs().round_dp(2),
        view.totals.total_sold.round_dp(2),
        view.totals.profit.round_dp(2),
        view.profit_per_person.round_dp(2)
    );
    for (method, totals) in &view.methods {
        let _ = writeln!(
            out,
            "💳 {method}: money {}€, sold {} BGL ({}€)",
            totals.money.round_dp(2),
            totals.sold_amount,
            totals.sold_money.round_dp(2)
        );
    }
    out.trim_end().to_string()
}

fn render_personal(view: &PersonalView) -> String {
    format!(
        "📊 {} stats\nBought: {}€\nSold: +{}€\nProfit: {}€",
        view.key,
        view.summary.total_bought.abs().round_dp(2),
        view.summary.total_sold.round_dp(2),
        view.summary.profit.round_dp(2)
    )
}
