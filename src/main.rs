mod cli;

use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;

use chainlens::config::{self, Config};
use chainlens::core::{ChainHandle, Session};
use chainlens::modules::export::{self, Format};
use chainlens::modules::history::HistoryPaginator;
use chainlens::modules::permit::{
    ConfirmingWallet, FeePayer, LocalKeyWallet, PermitRelay, RelayForm, WalletProvider,
};
use chainlens::modules::scanner::{FieldFilter, RangeScanner, ScanSettings};
use chainlens::modules::stats::{self, StatsMonitor};
use chainlens::modules::toolkit::parse_address;
use chainlens::modules::{explorer, inspect};
use chainlens::store::{AbiCache, RelayJournal, RelayStatus};

use crate::cli::{Cli, Commands, RelayArgs, ScanArgs};

const FEE_PAYER_KEY_ENV: &str = "CHAINLENS_FEE_PAYER_KEY";
const OWNER_KEY_ENV: &str = "CHAINLENS_OWNER_KEY";

#[tokio::main]
async fn main() -> Result<()> {
    chainlens::init_tracing();

    let cli = Cli::parse();
    let config = config::load();
    let output = Output {
        format: if cli.csv { Format::Csv } else { Format::Json },
        save: cli.save,
    };

    if let Commands::Networks = cli.command {
        return output.json("networks", &config.network_names());
    }
    if let Commands::Journal { status, resolve, note } = &cli.command {
        return journal(&output, status.as_deref(), *resolve, note);
    }

    let network = config
        .network(cli.network.as_deref())
        .with_context(|| format!("unknown network; known: {}", config.network_names().join(", ")))?;
    let session = Session::new(ChainHandle::connect(network, cli.rpc.clone()).await?);
    let handle = session.handle();

    match cli.command {
        Commands::Scan(args) => scan(&output, &config, &handle, args).await?,
        Commands::History {
            address,
            page,
            pages,
            depth,
        } => {
            if handle.indexer.is_some() {
                let mut paginator = HistoryPaginator::new(config.history.page_size);
                let mut last = paginator.page(&handle, &address, page).await?;
                for _ in 1..pages {
                    if !last.has_more {
                        break;
                    }
                    last = paginator.load_more(&handle).await?;
                }
                match output.format {
                    Format::Csv => output.transactions("history", paginator.records())?,
                    Format::Json => output.json(
                        "history",
                        &json!({
                            "address": address,
                            "last_page": last.page,
                            "has_more": paginator.has_more(),
                            "records": paginator.records(),
                        }),
                    )?,
                }
            } else {
                tracing::info!(depth, "no indexer configured, walking recent blocks");
                let records = explorer::recent_transactions(&handle, &address, depth, 10).await?;
                match output.format {
                    Format::Csv => output.transactions("history", &records)?,
                    Format::Json => output.json("history", &records)?,
                }
            }
        }
        Commands::Describe { address } => {
            let cache = open_abi_cache();
            let descriptor = inspect::describe(&handle, cache.as_ref(), &address).await?;
            output.json("contract", &descriptor)?;
        }
        Commands::Address { address } => {
            let snapshot = explorer::snapshot(&handle, &address, &config.tokens).await?;
            output.json("address", &snapshot)?;
        }
        Commands::Block { number } => {
            let number = if number.eq_ignore_ascii_case("latest") {
                explorer::latest_block_number(&handle).await?
            } else {
                number
                    .parse::<u64>()
                    .with_context(|| format!("invalid block number: {}", number))?
            };
            let details = explorer::block(&handle, number).await?;
            match output.format {
                Format::Csv => output.transactions("block", &details.transactions)?,
                Format::Json => output.json("block", &details)?,
            }
        }
        Commands::Tx { hash, receipt } => {
            let tx = explorer::transaction(&handle, &hash).await?;
            if receipt {
                let receipt = explorer::receipt(&handle, &hash).await?;
                output.json("tx", &json!({ "transaction": tx, "receipt": receipt }))?;
            } else {
                output.json("tx", &tx)?;
            }
        }
        Commands::Stats { watch, interval } => {
            if watch {
                let monitor = StatsMonitor::spawn(handle.clone(), Duration::from_secs(interval.max(1)));
                let mut updates = monitor.subscribe();
                while updates.changed().await.is_ok() {
                    let latest = updates.borrow_and_update().clone();
                    if let Some(stats) = latest {
                        output.json("stats", &stats)?;
                    }
                }
            } else {
                output.json("stats", &stats::network_stats(&handle).await?)?;
            }
        }
        Commands::Relay(args) => relay(&output, &handle, args).await?,
        Commands::Journal { .. } | Commands::Networks => {}
    }

    Ok(())
}

async fn scan(output: &Output, config: &Config, handle: &ChainHandle, args: ScanArgs) -> Result<()> {
    let contract = parse_address(&args.contract)?;
    let to = match args.to {
        Some(to) => to,
        None => explorer::latest_block_number(handle).await?,
    };
    let filter = args.filter.as_deref().map(FieldFilter::parse).transpose()?;

    let mut settings = ScanSettings::from(&config.scanner);
    if let Some(size) = args.window_size {
        settings.window_size = size;
    }
    if let Some(decimals) = args.decimals {
        settings.token_decimals = decimals;
    }

    let cache = open_abi_cache();
    let registry = inspect::registry(handle, cache.as_ref(), &args.contract).await?;
    let report = RangeScanner::new(handle, contract, &registry)
        .with_settings(settings)
        .scan_with_report(&args.event, args.from, to, args.max, filter.as_ref())
        .await?;

    if !report.is_complete() {
        tracing::warn!(skipped = report.skipped.len(), "scan result is incomplete");
    }

    let event_name = args.event.split('(').next().unwrap_or("scan");
    let prefix = format!("{}-events", event_name.to_lowercase());
    match output.format {
        Format::Csv => output.events(&prefix, &report.records),
        Format::Json => output.json(&prefix, &report),
    }
}

async fn relay(output: &Output, handle: &ChainHandle, args: RelayArgs) -> Result<()> {
    let fee_payer_key = args
        .fee_payer_key
        .or_else(|| std::env::var(FEE_PAYER_KEY_ENV).ok())
        .with_context(|| format!("fee payer key required (--fee-payer-key or {})", FEE_PAYER_KEY_ENV))?;
    let owner_key = args
        .owner_key
        .or_else(|| std::env::var(OWNER_KEY_ENV).ok())
        .with_context(|| format!("owner key required (--owner-key or {})", OWNER_KEY_ENV))?;

    let spender = match args.spender {
        Some(spender) => spender,
        None => FeePayer::from_key(&fee_payer_key)?.address().to_checksum(None),
    };

    let local = LocalKeyWallet::from_key(&owner_key)?;
    let wallet: Box<dyn WalletProvider> = if args.yes {
        Box::new(local)
    } else {
        Box::new(ConfirmingWallet::terminal(local))
    };

    let form = RelayForm {
        token: args.token,
        amount: args.amount,
        spender,
        recipient: args.recipient,
        fee_payer_key,
    };

    let journal = if args.no_journal { None } else { open_journal() };
    let mut relay = PermitRelay::new(handle, wallet.as_ref());
    if let Some(journal) = journal.as_ref() {
        relay = relay.with_journal(journal);
    }

    let receipt = relay.run(&form).await?;
    output.json("relay", &receipt)
}

fn journal(output: &Output, status: Option<&str>, resolve: Option<i64>, note: &str) -> Result<()> {
    let path = config::journal_path().context("no data directory for the relay journal")?;
    let journal = RelayJournal::open(&path)?;

    if let Some(id) = resolve {
        if !journal.resolve(id, note)? {
            bail!("relay attempt {} is not a partial failure", id);
        }
        tracing::info!(id, "relay attempt resolved");
    }

    let status = status.map(str::parse::<RelayStatus>).transpose()?;
    let attempts = journal.list(status)?;
    match output.format {
        Format::Csv => output.write("journal", |w| export::write_relay_attempts(w, &attempts).map(|_| ())),
        Format::Json => output.json("journal", &attempts),
    }
}

fn open_abi_cache() -> Option<AbiCache> {
    let path = config::abi_cache_path()?;
    match AbiCache::open(&path) {
        Ok(cache) => Some(cache),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{:#}", err), "ABI cache unavailable");
            None
        }
    }
}

fn open_journal() -> Option<RelayJournal> {
    let Some(path) = config::journal_path() else {
        tracing::warn!("no data directory, relaying without a journal");
        return None;
    };
    match RelayJournal::open(&path) {
        Ok(journal) => Some(journal),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{:#}", err), "relay journal unavailable");
            None
        }
    }
}

struct Output {
    format: Format,
    save: bool,
}

impl Output {
    fn json<T: Serialize + ?Sized>(&self, prefix: &str, value: &T) -> Result<()> {
        self.write_as(prefix, Format::Json, |w| export::write_json(w, value))
    }

    fn events(&self, prefix: &str, records: &[chainlens::domain::EventRecord]) -> Result<()> {
        self.write(prefix, |w| export::write_events(w, records).map(|_| ()))
    }

    fn transactions(&self, prefix: &str, records: &[chainlens::domain::TransactionRecord]) -> Result<()> {
        self.write(prefix, |w| export::write_transactions(w, records).map(|_| ()))
    }

    fn write(&self, prefix: &str, render: impl Fn(&mut dyn Write) -> Result<()>) -> Result<()> {
        self.write_as(prefix, self.format, render)
    }

    /// Render to stdout and, with `--save`, to a timestamped export file
    fn write_as(
        &self,
        prefix: &str,
        format: Format,
        render: impl Fn(&mut dyn Write) -> Result<()>,
    ) -> Result<()> {
        {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            render(&mut lock)?;
        }

        if self.save {
            let path = export::export_dir()?.join(export::generate_filename(prefix, format));
            let mut file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
            render(&mut file)?;
            tracing::info!(path = %path.display(), "saved export");
        }
        Ok(())
    }
}
