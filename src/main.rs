use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pactpay::application::checkout::{CheckoutOutcome, CheckoutService};
use pactpay::application::registry::PactRegistry;
use pactpay::application::signer::{WalletProvider, WalletSession, WalletSignerAdapter};
use pactpay::application::tracker::PaymentConfirmationTracker;
use pactpay::chain::rpc::{ChainRpc, HttpRpcClient};
use pactpay::config::{Cli, Command, Config, CreateArgs};
use pactpay::domain::amount::{Amount, NATIVE_DECIMALS, TokenMint};
use pactpay::domain::keys::Pubkey;
use pactpay::domain::pact::{PactDraft, PactId, ParticipantDraft};
use pactpay::domain::ports::{IdentityResolverBox, NotifierBox, PactStoreBox};
use pactpay::infrastructure::in_memory::{InMemoryPactStore, StaticDirectory};
use pactpay::infrastructure::keypair_wallet::KeypairWallet;
use pactpay::infrastructure::notify::{HttpNotifier, LogNotifier};
#[cfg(feature = "storage-rocksdb")]
use pactpay::infrastructure::rocksdb::RocksDBStore;
use pactpay::interfaces::csv::directory_reader::read_directory;
use pactpay::interfaces::csv::link_writer::LinkWriter;
use pactpay::interfaces::csv::participant_reader::ParticipantReader;
use pactpay::payment::qr;
use pactpay::payment::request::PaymentRequest;
use std::fs::File;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use spl_associated_token_account::get_associated_token_address;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.config.log_level);

    let registry = Arc::new(PactRegistry::new(
        open_store(&cli.config)?,
        open_directory(&cli.config)?,
        open_notifier(&cli.config)?,
    ));

    match cli.command {
        Command::Create(args) => create(&registry, args).await,
        Command::Show { pact_id } => {
            let pact = registry.require(parse_id(&pact_id)?).await.into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&pact).into_diagnostic()?);
            Ok(())
        }
        Command::Links { pact_id } => {
            let pact = registry.require(parse_id(&pact_id)?).await.into_diagnostic()?;
            write_links(&PactRegistry::payment_links(&pact).into_diagnostic()?)
        }
        Command::Qr {
            pact_id,
            index,
            out,
            size,
        } => {
            let pact = registry.require(parse_id(&pact_id)?).await.into_diagnostic()?;
            let uri = PaymentRequest::for_participant(&pact, index)
                .and_then(|request| request.encode())
                .into_diagnostic()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, qr::render_svg(&uri, size).into_diagnostic()?)
                        .into_diagnostic()?;
                    eprintln!("Wrote {}", path.display());
                }
                None => println!("{}", qr::render_text(&uri).into_diagnostic()?),
            }
            println!("{uri}");
            Ok(())
        }
        Command::List {
            creator,
            participant,
        } => {
            let pacts = match (creator, participant) {
                (Some(creator), _) => registry.list_by_creator(&creator).await,
                (None, Some(wallet)) => {
                    let wallet: Pubkey = wallet.parse().into_diagnostic()?;
                    registry.list_by_participant(&wallet).await
                }
                (None, None) => Ok(Vec::new()),
            }
            .into_diagnostic()?;

            let mut writer = csv::Writer::from_writer(io::stdout().lock());
            writer
                .write_record(["pact_id", "name", "amount_per_person", "due_date", "paid", "participants"])
                .into_diagnostic()?;
            for pact in pacts {
                let paid = pact.participants.iter().filter(|p| p.paid).count();
                writer
                    .write_record([
                        pact.id.to_string(),
                        pact.name,
                        pact.amount_per_person.to_string(),
                        pact.due_date.to_rfc3339(),
                        paid.to_string(),
                        pact.participants.len().to_string(),
                    ])
                    .into_diagnostic()?;
            }
            writer.flush().into_diagnostic()
        }
        Command::Pay {
            pact_id,
            index,
            keypair,
        } => {
            let pact_id = parse_id(&pact_id)?;
            let wallet = Arc::new(KeypairWallet::from_file(keypair).into_diagnostic()?);
            let owner = wallet.pubkey();
            let rpc = connect_rpc(&cli.config).await?;
            let signer = WalletSignerAdapter::probe(WalletProvider::default().with_sign_only(wallet), rpc.clone())
                .into_diagnostic()?;
            let session = WalletSession::new(owner, signer);
            let checkout = CheckoutService::new(rpc.clone(), registry.clone(), tracker(&cli.config, rpc, &registry));

            match checkout.pay(&session, pact_id, index).await.into_diagnostic()? {
                CheckoutOutcome::Submitted {
                    signature,
                    transition,
                } => println!("{signature},{transition:?}"),
                CheckoutOutcome::AlreadyPaid => eprintln!("Participant {index} has already paid"),
            }
            Ok(())
        }
        Command::Sync { pact_id } => {
            let pact_id = parse_id(&pact_id)?;
            let rpc = connect_rpc(&cli.config).await?;
            let recorded = tracker(&cli.config, rpc, &registry)
                .reconcile_pact(pact_id)
                .await
                .into_diagnostic()?;
            if recorded.is_empty() {
                eprintln!("No new payments found");
            }
            for (index, signature, transition) in recorded {
                println!("{index},{signature},{transition:?}");
            }
            Ok(())
        }
        Command::Balance { wallet, token_mint } => {
            let wallet: Pubkey = wallet.parse().into_diagnostic()?;
            let rpc = connect_rpc(&cli.config).await?;
            match token_mint {
                Some(mint) => {
                    let mint: Pubkey = mint.parse().into_diagnostic()?;
                    let account = get_associated_token_address(&wallet, &mint);
                    let balance = rpc.token_account_balance(&account).await.into_diagnostic()?;
                    let ui = balance.ui_amount_string.unwrap_or_else(|| {
                        Amount::from_base_units(balance.amount, balance.decimals).to_string()
                    });
                    println!("{ui} {mint}");
                }
                None => {
                    let lamports = rpc.balance(&wallet).await.into_diagnostic()?;
                    println!("{} SOL", Amount::from_base_units(lamports, NATIVE_DECIMALS).normalize());
                }
            }
            Ok(())
        }
    }
}

fn init_tracing(fallback: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_store(config: &Config) -> Result<PactStoreBox> {
    match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryPactStore::new()))
        }
        None => Ok(Box::new(InMemoryPactStore::new())),
    }
}

fn open_directory(config: &Config) -> Result<IdentityResolverBox> {
    let directory = match &config.directory {
        Some(path) => read_directory(File::open(path).into_diagnostic()?).into_diagnostic()?,
        None => StaticDirectory::new(),
    };
    Ok(Box::new(directory))
}

fn open_notifier(config: &Config) -> Result<NotifierBox> {
    match &config.notify_url {
        Some(url) => Ok(Box::new(
            HttpNotifier::new(url, http_timeout(config)).into_diagnostic()?,
        )),
        None => Ok(Box::new(LogNotifier)),
    }
}

fn http_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.http_timeout_secs)
}

async fn connect_rpc(config: &Config) -> Result<Arc<dyn ChainRpc>> {
    let client = HttpRpcClient::connect(config.rpc_urls.clone(), config.commitment, http_timeout(config))
        .await
        .into_diagnostic()?;
    tracing::info!(endpoint = client.preferred_endpoint(), "Using RPC endpoint");
    Ok(Arc::new(client))
}

fn tracker(
    config: &Config,
    rpc: Arc<dyn ChainRpc>,
    registry: &Arc<PactRegistry>,
) -> PaymentConfirmationTracker {
    PaymentConfirmationTracker::new(rpc, registry.clone())
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .with_confirmation_timeout(Duration::from_secs(config.confirmation_timeout_secs))
}

fn parse_id(text: &str) -> Result<PactId> {
    text.parse().into_diagnostic()
}

fn write_links(links: &[pactpay::application::registry::PaymentLink]) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = LinkWriter::new(stdout.lock());
    writer.write_links(links).into_diagnostic()
}

async fn create(registry: &PactRegistry, args: CreateArgs) -> Result<()> {
    let mut participants = args
        .participants
        .iter()
        .map(|identity| ParticipantDraft::parse_identity(identity))
        .collect::<pactpay::error::Result<Vec<_>>>()
        .into_diagnostic()?;
    if let Some(path) = &args.participants_csv {
        let reader = ParticipantReader::new(File::open(path).into_diagnostic()?);
        for participant in reader.participants() {
            participants.push(participant.into_diagnostic()?);
        }
    }

    let token = match (&args.token_mint, args.token_decimals) {
        (Some(mint), Some(decimals)) => Some(
            TokenMint::new(mint.parse().into_diagnostic()?, decimals).into_diagnostic()?,
        ),
        _ => None,
    };

    let draft = PactDraft {
        name: args.name,
        amount_per_person: Amount::new(args.amount).into_diagnostic()?,
        receiver_wallet: args.receiver.parse().into_diagnostic()?,
        due_date: args.due,
        created_by: args.creator,
        token,
        participants,
    };

    let pact_id = registry.create(draft).await.into_diagnostic()?;
    eprintln!("Created pact {pact_id}");

    let pact = registry.require(pact_id).await.into_diagnostic()?;
    write_links(&PactRegistry::payment_links(&pact).into_diagnostic()?)
}
