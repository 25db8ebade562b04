use clap::Parser;
use client::network::{BoxError, Client, ClientOptions, SessionOutcome};
use log::{error, info};
use shared::Encoding;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, env = "ARENA_SERVER", default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Number of concurrent bots
    #[arg(short = 'b', long, default_value = "1")]
    bots: usize,

    /// Leave after this many seconds (0 runs until the server closes)
    #[arg(short = 'd', long, default_value = "0")]
    duration_secs: u64,

    /// Milliseconds between movement updates
    #[arg(long, default_value = "50")]
    move_interval_ms: u64,

    /// Use bincode binary frames instead of JSON text frames
    #[arg(long)]
    binary: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting {} bot(s) against {}", args.bots, args.server);

    let options = ClientOptions {
        server_url: args.server.clone(),
        encoding: if args.binary {
            Encoding::Bincode
        } else {
            Encoding::Json
        },
        move_interval: Duration::from_millis(args.move_interval_ms.max(1)),
        duration: (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs)),
        ..ClientOptions::default()
    };

    let mut handles = Vec::with_capacity(args.bots);
    for bot in 0..args.bots {
        let options = options.clone();
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(options).await?;
            let outcome = client.run().await?;
            Ok::<_, BoxError>((bot, outcome, client.latency().average()))
        }));
    }

    for handle in handles {
        match handle.await? {
            Ok((bot, SessionOutcome::Left { final_size }, rtt)) => {
                info!("Bot {} left at size {:?}, average rtt {:?}", bot, final_size, rtt)
            }
            Ok((bot, outcome, _)) => info!("Bot {} ended: {:?}", bot, outcome),
            Err(e) => error!("Bot failed: {}", e),
        }
    }

    Ok(())
}
