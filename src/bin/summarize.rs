use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_stream::wrappers::WatchStream;

use summary_stream::backends::MockSource;
use summary_stream::stream::{HttpTransport, LocalTransport, Transport};
use summary_stream::{GenerationRequest, LifecycleController, LifecycleState, SummaryStyle};

#[derive(Parser)]
#[command(name = "summarize")]
#[command(about = "Stream a summary of a document to the terminal")]
#[command(version)]
struct Args {
    /// Document to summarize, stdin when omitted
    file: Option<PathBuf>,

    /// Summary style: concise or detailed
    #[arg(short, long, default_value = "concise")]
    style: SummaryStyle,

    /// Summary server base URL
    #[arg(long, env = "SUMMARY_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Use the built-in mock backend instead of a server
    #[arg(long)]
    local: bool,

    /// Pause between fragments in local mode, in milliseconds
    #[arg(long, default_value_t = 30)]
    delay_ms: u64,

    /// Give up when no data arrives for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let content = match &args.file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let transport: Arc<dyn Transport> = if args.local {
        Arc::new(
            LocalTransport::new(Arc::new(MockSource::new()))
                .with_pacing(Duration::from_millis(args.delay_ms)),
        )
    } else {
        Arc::new(HttpTransport::new(&args.url))
    };

    let mut controller = LifecycleController::new(transport);
    if let Some(secs) = args.idle_timeout {
        controller = controller.with_idle_timeout(Duration::from_secs(secs));
    }

    let epoch = controller.generate(GenerationRequest::new(content, args.style));
    let mut updates = WatchStream::new(controller.subscribe());
    let mut printed = 0;
    let mut stdout = std::io::stdout();

    let settled = loop {
        let snapshot = tokio::select! {
            next = updates.next() => match next {
                Some(snapshot) => snapshot,
                None => break controller.current_state(),
            },
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                break controller.current_state();
            }
        };

        let text = snapshot.state.text();
        if text.len() > printed {
            write!(stdout, "{}", &text[printed..])?;
            stdout.flush()?;
            printed = text.len();
        }

        if snapshot.epoch != epoch || !snapshot.state.is_loading() {
            break snapshot.state;
        }
    };

    match settled {
        LifecycleState::Succeeded { .. } => {
            writeln!(stdout)?;
            Ok(())
        }
        LifecycleState::Failed { error, .. } => {
            eprintln!("\n❌ {}", error);
            std::process::exit(1);
        }
        _ => {
            eprintln!("\n🛑 Cancelled");
            std::process::exit(130);
        }
    }
}
