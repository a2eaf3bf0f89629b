use clap::{Parser, Subcommand};
use mpsse_host::session::engine::freq;
use mpsse_host::session::{Endianness, Engine, Mode, SessionRegistry};
use mpsse_host::{logging, Config, Dispatcher, LibMpsse, Loopback, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "mpsse", about = "Drive an FTDI MPSSE engine session")]
struct Args {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to libmpsse (overrides config)
    #[arg(long, global = true)]
    library: Option<PathBuf>,
    /// Use the in-process loopback engine instead of libmpsse
    #[arg(long, global = true)]
    loopback: bool,
    /// Max threads running engine calls (overrides config)
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open and close a session to check the device is reachable
    Probe(BusArgs),
    /// Run one start/write/read/stop transaction
    Transfer {
        #[command(flatten)]
        bus: BusArgs,
        /// Bytes to send, as hex
        #[arg(long, default_value = "")]
        write: String,
        /// Number of bytes to read back
        #[arg(long, default_value_t = 0)]
        read: u64,
    },
}

#[derive(clap::Args, Clone, Copy)]
struct BusArgs {
    /// Raw mode value (1-4 SPI0-3, 5 I2C, 6 GPIO, 7 bitbang)
    #[arg(long, default_value_t = Mode::Spi0 as i64)]
    mode: i64,
    /// Clock in Hz
    #[arg(long, default_value_t = freq::ONE_MHZ as i64)]
    frequency: i64,
    /// Raw bit order value (0 MSB first, 8 LSB first)
    #[arg(long, default_value_t = Endianness::Msb as i64)]
    endianness: i64,
}

fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_overrides(|key| std::env::var(key).ok())?;
    if let Some(library) = args.library.clone() {
        config.library = Some(library);
    }
    if let Some(threads) = args.threads {
        config.blocking_threads = threads;
    }
    logging::init(&config.log_filter);

    let pool = WorkerPool::new(config.blocking_threads)?;
    let registry = Arc::new(SessionRegistry::new());

    if args.loopback {
        let dispatcher =
            Dispatcher::with_registry(Loopback::new(), pool.handle(), registry);
        pool.block_on(run(&dispatcher, args.command))?;
        dispatcher.registry().ensure_idle()?;
    } else {
        let engine = match &config.library {
            Some(path) => LibMpsse::load(path)?,
            None => LibMpsse::load_default()?,
        };
        let dispatcher =
            Dispatcher::with_registry(engine, pool.handle(), registry);
        pool.block_on(run(&dispatcher, args.command))?;
        dispatcher.registry().ensure_idle()?;
    }
    Ok(())
}

async fn run<E: Engine>(
    dispatcher: &Dispatcher<E>,
    command: Command,
) -> Result<(), BoxError> {
    match command {
        Command::Probe(bus) => {
            let session =
                dispatcher.open(bus.mode, bus.frequency, bus.endianness).await?;
            dispatcher.close(&session).await?;
            println!("ok");
        }
        Command::Transfer { bus, write, read } => {
            let data = hex::decode(write.trim())?;
            let session =
                dispatcher.open(bus.mode, bus.frequency, bus.endianness).await?;

            dispatcher.start(&session).await?;
            if !data.is_empty() {
                dispatcher.write(&session, data).await?;
            }
            let received = dispatcher.read(&session, read).await?;
            let ack = dispatcher.get_ack(&session).await?;
            dispatcher.stop(&session).await?;
            dispatcher.close(&session).await?;

            println!("read: {}", hex::encode(received));
            println!("ack: {}", ack);
        }
    }
    Ok(())
}
