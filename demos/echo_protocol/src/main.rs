//! Echo Protocol Example
//!
//! A toy "console" protocol built on Ryanvk. Two exported collectors make up
//! the protocol:
//!
//! - `console/base`: sends messages to friends and groups, answers `/echo`
//! - `console/shout`: overrides group sends, upper-casing the text before
//!   falling through to the base implementation with `super_call`
//!
//! `ryanvk.toml` composes both, `shout` on top.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-protocol
//! cargo run --package echo-protocol -- --account console-2 --profile production
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use clap::Parser;
use ryanvk::prelude::*;
use ryanvk_core::{OverloadResult, TwinId};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// ============================================================================
// Capabilities
// ============================================================================

/// A message to deliver.
#[derive(Debug, Clone)]
struct Outgoing {
    target: Address,
    text: String,
}

/// Something that happened on the console.
#[derive(Debug, Clone)]
enum ConsoleEvent {
    Message { from: Address, text: String },
    Poke,
}

/// Sends a message, returning its id. Overloaded by target address.
static SEND_MESSAGE: LazyLock<Capability<Outgoing, String>> = LazyLock::new(|| {
    Capability::declare("send_message")
        .overload(Strategy::PatternAddress, "target", |m: &Outgoing| Probe::address(&m.target))
        .build()
});

/// Handles an incoming event. Events nobody handles are dropped.
static HANDLE_EVENT: LazyLock<Capability<ConsoleEvent, ()>> = LazyLock::new(|| {
    Capability::declare("handle_event")
        .overload(
            Strategy::predicate(|_, value| match value.downcast_ref::<ConsoleEvent>()? {
                ConsoleEvent::Message { .. } => Some("message".into()),
                ConsoleEvent::Poke => Some("poke".into()),
            }),
            "event",
            |e: &ConsoleEvent| Probe::value(e),
        )
        .optional()
        .build()
});

// ============================================================================
// Performer
// ============================================================================

#[derive(Performer)]
#[performer(exit = "report_sent")]
struct ConsolePerformer {
    #[access]
    outbox: Component<mpsc::UnboundedSender<String>>,
    #[access]
    account: Component<String>,
    sent: AtomicUsize,
}

impl ConsolePerformer {
    fn deliver(&self, staff: &Staff, target: &Address, text: &str) -> Result<String, BoxError> {
        let account = self.account.get(staff)?;
        let seq = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        self.outbox
            .get(staff)?
            .send(format!("[{account} -> {target}] {text}"))?;
        Ok(format!("{account}-{seq}"))
    }

    async fn report_sent(&self) -> Result<(), BoxError> {
        info!(sent = self.sent.load(Ordering::Relaxed), "Console performer closed");
        Ok(())
    }
}

/// Where a reply to a message from `from` goes.
fn reply_target(from: &Address) -> Address {
    match from.get("group") {
        Some(group) => Address::new().with("group", group),
        None => from.clone(),
    }
}

// ============================================================================
// Collectors
// ============================================================================

fn report(registered: OverloadResult<TwinId>) {
    if let Err(e) = registered {
        error!("Failed to register implementation: {e}");
    }
}

fn build_base() -> Artifacts {
    let mut collector = Collector::<ConsolePerformer>::new("console", "base");

    for pattern in ["friend", "group"] {
        let registered = collector
            .register(&*SEND_MESSAGE)
            .on("target", pattern)
            .implement(|this, cx, message| async move {
                this.deliver(cx.staff(), &message.target, &message.text)
            });
        report(registered);
    }

    let registered = collector
        .register(&*HANDLE_EVENT)
        .on("event", "message")
        .implement(|_, cx, event| async move {
            let ConsoleEvent::Message { from, text } = event else {
                return Ok(());
            };
            if let Some(content) = text.strip_prefix("/echo ") {
                let outgoing = Outgoing {
                    target: reply_target(&from),
                    text: content.to_owned(),
                };
                let id = cx.staff().call(&SEND_MESSAGE, outgoing).await?;
                info!(message_id = %id, "Echoed");
            }
            Ok(())
        });
    report(registered);

    collector.close()
}

fn build_shout() -> Artifacts {
    let mut collector = Collector::<ConsolePerformer>::new("console", "shout");

    let registered = collector
        .register(&*SEND_MESSAGE)
        .on("target", "group")
        .implement(|_, cx, message| async move {
            let loud = Outgoing {
                text: message.text.to_uppercase(),
                ..message
            };
            cx.super_call(loud).await
        });
    report(registered);

    collector.close()
}

export_collector! {
    static CONSOLE_BASE = ("console", "base", build_base);
}

export_collector! {
    static CONSOLE_SHOUT = ("console", "shout", build_shout);
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Parser, Debug)]
#[command(about = "Console protocol demo for Ryanvk")]
struct Args {
    /// Configuration file; defaults to the demo's ryanvk.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(short, long, default_value = "development")]
    profile: String,

    /// Account to connect as
    #[arg(short, long, default_value = "console-1")]
    account: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let builder = RyanvkRuntime::builder().profile(args.profile);
    let builder = match args.config {
        Some(path) => builder.config_file(path),
        None => builder.search_path(env!("CARGO_MANIFEST_DIR")),
    };
    let runtime = builder.build().await?;

    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = inbox.recv().await {
            println!("{line}");
        }
    });

    let staff = runtime
        .connect(
            "console",
            &args.account,
            Components::new().with("outbox", outbox),
        )
        .await?;

    let alice = Address::new().with("land", "console").with("friend", "alice");
    let bob_in_42 = Address::new()
        .with("land", "console")
        .with("group", "42")
        .with("member", "bob");

    let script = [
        ConsoleEvent::Message {
            from: alice,
            text: "/echo hello there".into(),
        },
        ConsoleEvent::Message {
            from: bob_in_42,
            text: "/echo group chat is loud".into(),
        },
        ConsoleEvent::Poke,
    ];

    for event in script {
        match staff.call_optional(&HANDLE_EVENT, event.clone()).await {
            Ok(Some(())) => {}
            Ok(None) => warn!(?event, "No handler for event"),
            Err(e) => warn!(error = %e, "Event handler failed"),
        }
    }

    runtime.disconnect("console", &args.account).await?;
    drop(staff);
    printer.await?;

    Ok(())
}
