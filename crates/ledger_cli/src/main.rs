//! CLI demo for `ledger_core`.
//!
//! Seeds two members into a SQLite file (when missing), runs one transfer
//! through the transactional service and prints both balances.
//!
//! Environment overrides: `LEDGER_DB`, `LEDGER_LOG_DIR`, `LEDGER_LOG_LEVEL`.
//! Positional arguments: `<from> <to> <amount>` (default `memberA memberB 2000`).

use ledger_core::{
    init_logging, AppError, AppResult, ConnectionSource, LoggingConfig, Member, MemberRepository,
    PooledSource, SourceConfig, SqliteMemberRepository, TransactionalMemberService,
    TransferPolicy,
};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

const SEED_BALANCE: i64 = 10_000;

fn main() -> ExitCode {
    let logging = LoggingConfig {
        level: std::env::var("LEDGER_LOG_LEVEL")
            .unwrap_or_else(|_| ledger_core::default_log_level().to_string()),
        log_dir: std::env::var("LEDGER_LOG_DIR").unwrap_or_else(|_| {
            std::env::temp_dir()
                .join("ledger-logs")
                .to_string_lossy()
                .into_owned()
        }),
        ..LoggingConfig::default()
    };
    if let Err(message) = init_logging(&logging) {
        eprintln!("logging disabled: {message}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let from = args.first().map_or("memberA", String::as_str);
    let to = args.get(1).map_or("memberB", String::as_str);
    let amount = match args.get(2).map(|raw| raw.parse::<i64>()) {
        None => 2_000,
        Some(Ok(amount)) => amount,
        Some(Err(err)) => {
            eprintln!("invalid amount: {err}");
            return ExitCode::from(2);
        }
    };

    match run(from, to, amount) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error kind={} error={err}", err.kind());
            eprintln!("transfer failed ({}): {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn run(from: &str, to: &str, amount: i64) -> AppResult<()> {
    let db_path = std::env::var("LEDGER_DB").unwrap_or_else(|_| "ledger.db".to_string());
    let source = Arc::new(PooledSource::open(&db_path, SourceConfig::default())?);
    let repo = SqliteMemberRepository::new();

    seed_if_missing(source.as_ref(), &repo, from)?;
    seed_if_missing(source.as_ref(), &repo, to)?;

    let service =
        TransactionalMemberService::over_source(repo, TransferPolicy::default(), source.clone());
    let outcome = service.account_transfer(from, to, amount);

    for member_id in [from, to] {
        let member = service.find_member(member_id)?;
        println!("{} money={}", member.member_id, member.money);
    }
    outcome
}

fn seed_if_missing(
    source: &dyn ConnectionSource,
    repo: &SqliteMemberRepository,
    member_id: &str,
) -> AppResult<()> {
    let conn = source.acquire()?;
    let result = match repo.find_by_id(&conn, member_id) {
        Ok(_) => Ok(()),
        Err(AppError::NotFound { .. }) => repo
            .save(&conn, &Member::new(member_id, SEED_BALANCE))
            .map(|_| ()),
        Err(err) => Err(err),
    };
    source.release(conn);
    result
}
