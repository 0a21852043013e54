// crates/chatcli/src/main.rs

use anyhow::{Context, Result};
use chatcore::{
    AutomationEvent, Condition, Connection, ContactState, FlowGraph, FlowRecord, InboundEvent, Node,
    NodeKind, Trigger,
};
use chatruntime::{ChatRuntime, NodeRegistry, RuntimeConfig, WorkerConfig, DEFAULT_QUEUE_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "chatflow")]
#[command(about = "Chat automation CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play inbound events against a flow with in-memory collaborators
    Simulate {
        /// Path to flow JSON file
        #[arg(short, long)]
        flow: PathBuf,

        /// DM keyword that starts the flow; a welcome trigger is used when omitted
        #[arg(short, long)]
        keyword: Option<String>,

        /// Inbound events in order; `button:<payload>` sends a button click
        #[arg(short, long = "send")]
        send: Vec<String>,

        /// Contact first name used for placeholders
        #[arg(long, default_value = "Sam")]
        first_name: String,

        /// Keep a worker running this long to replay wait steps (Ctrl-C stops early)
        #[arg(long, default_value_t = 0)]
        wait_secs: u64,

        #[arg(long, env = "CHATFLOW_POLL_INTERVAL_MS", default_value_t = 1000)]
        poll_interval_ms: u64,

        #[arg(long, env = "CHATFLOW_LOCK_TTL_SECS", default_value_t = 300)]
        lock_ttl_secs: u64,

        #[arg(long, env = "CHATFLOW_QUEUE", default_value = DEFAULT_QUEUE_NAME)]
        queue: String,
    },

    /// Validate a flow file
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create an example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            flow,
            keyword,
            send,
            first_name,
            wait_secs,
            poll_interval_ms,
            lock_ttl_secs,
            queue,
        } => {
            let worker_config = WorkerConfig {
                poll_interval: Duration::from_millis(poll_interval_ms),
                lock_ttl: Duration::from_secs(lock_ttl_secs),
                ..WorkerConfig::default()
            };
            let runtime_config = RuntimeConfig {
                queue_name: queue,
                ..RuntimeConfig::default()
            };
            let options = SimulateOptions {
                keyword,
                send,
                first_name,
                wait: Duration::from_secs(wait_secs),
            };
            simulate(flow, options, runtime_config, worker_config).await?;
        }

        Commands::Validate { file } => {
            validate_flow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_flow(output)?;
        }
    }

    Ok(())
}

struct SimulateOptions {
    keyword: Option<String>,
    send: Vec<String>,
    first_name: String,
    wait: Duration,
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    chatnodes::register_all(&mut registry);
    registry
}

async fn simulate(
    file: PathBuf,
    options: SimulateOptions,
    runtime_config: RuntimeConfig,
    worker_config: WorkerConfig,
) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());

    let json = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let definition: serde_json::Value = serde_json::from_str(&json)?;
    let graph = FlowGraph::from_json(definition.clone())?;
    println!("📋 Flow: {} nodes, start '{}'", graph.nodes().len(), graph.start_node_id());
    println!();

    let runtime = ChatRuntime::with_config(registry(), runtime_config);
    let contact = ContactState::new(Uuid::new_v4(), "simulated-user").with_name(options.first_name, None);
    let flow = FlowRecord::new(contact.account_id, "simulated", definition);
    let trigger = match &options.keyword {
        Some(keyword) => Trigger::dm_keyword(flow.id, keyword.as_str()),
        None => Trigger::welcome(flow.id),
    };
    runtime.store().insert_flow(flow).await;
    runtime.store().insert_trigger(trigger).await;
    runtime.store().insert_contact(contact.clone()).await;
    runtime.store().open_conversation(contact.id).await;

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                AutomationEvent::FlowStarted { node_id, .. } => {
                    println!("▶️  Flow started at '{}'", node_id);
                }
                AutomationEvent::NodeExecuted { node_id, node_type, duration_ms, .. } => {
                    println!("  ✅ Node {} ({}) done in {}ms", node_id, node_type, duration_ms);
                }
                AutomationEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                AutomationEvent::FlowCompleted { .. } => {
                    println!("✨ Flow completed");
                }
                AutomationEvent::FlowAbandoned { reason, .. } => {
                    println!("💥 Flow abandoned: {:?}", reason);
                }
                AutomationEvent::TaskScheduled { job_id, ready_at, .. } => {
                    println!("  ⏳ Task {} scheduled (ready at {:?})", job_id, ready_at);
                }
            }
        }
    });

    for input in &options.send {
        let event = match input.strip_prefix("button:") {
            Some(payload) => InboundEvent::postback(&contact, payload),
            None => InboundEvent::message(&contact, input.as_str()),
        };
        println!("📨 Inbound: {}", input);
        match runtime.executor().handle_event(&event).await {
            Ok(transition) => println!("   → {:?}", transition),
            Err(e) => println!("   → error: {}", e),
        }
    }

    if !options.wait.is_zero() {
        println!();
        println!("⏳ Running worker for {:?} (Ctrl-C to stop)", options.wait);

        let worker = runtime.worker(worker_config);
        let shutdown = CancellationToken::new();
        let stopper = {
            let shutdown = shutdown.clone();
            let wait = options.wait;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                shutdown.cancel();
            })
        };

        let stats = worker.run(shutdown).await?;
        stopper.abort();
        println!(
            "   Worker: {} completed, {} skipped, {} failed",
            stats.completed, stats.skipped, stats.failed
        );
    }

    runtime.shutdown().await?;

    // Let the event printer catch up
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📤 Outbound messages:");
    for message in runtime.channel().sent().await {
        let text = message
            .content
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(no text)");
        println!("   → {}: {}", message.recipient_id, text);
    }

    if let Some(state) = runtime.store().contact(contact.id).await {
        println!();
        println!("📊 Contact state:");
        match (state.current_flow_id(), state.current_step_node_id()) {
            (Some(flow_id), Some(node_id)) => println!("   In flow {} at '{}'", flow_id, node_id),
            _ => println!("   Idle"),
        }
        if !state.tags.is_empty() {
            let tags: Vec<&str> = state.tags.iter().map(String::as_str).collect();
            println!("   Tags: {}", tags.join(", "));
        }
    }

    Ok(())
}

fn validate_flow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let json = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let graph = FlowGraph::parse(&json)?;

    let registry = registry();
    let unknown: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|node| !registry.contains(&node.kind))
        .collect();

    println!("✅ Flow is valid:");
    println!("   Start: {}", graph.start_node_id());
    println!("   Nodes: {}", graph.nodes().len());
    println!(
        "   Connections: {}",
        graph.nodes().iter().map(|n| n.connections.len()).sum::<usize>()
    );
    for node in unknown {
        println!("   ⚠️  Node '{}' has unknown type '{}'", node.id, node.kind);
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for kind in registry.list_node_kinds() {
        println!("  • {}", kind);
        if let Some(description) = registry.description(&kind).filter(|d| !d.is_empty()) {
            println!("    {}", description);
        }
    }
}

fn create_example_flow(output: PathBuf) -> Result<()> {
    let graph = FlowGraph::new(
        "welcome",
        vec![
            Node::new("welcome", NodeKind::Message)
                .with_name("Welcome")
                .with_content("text", "Hi {{contact.firstName}}! Want our price list?")
                .connect(Connection::when("ask-email", Condition::ButtonPayload("YES".into())))
                .connect(Connection::when("goodbye", Condition::ButtonPayload("NO".into()))),
            Node::new("ask-email", NodeKind::GetInput)
                .with_name("Ask for email")
                .with_attribute("inputType", "email")
                .with_attribute("prompt", "Where should we send it?")
                .connect(Connection::when("tag", Condition::InputValid(true)))
                .connect(Connection::when("ask-email", Condition::InputValid(false))),
            Node::new("tag", NodeKind::TagContact)
                .with_name("Tag lead")
                .with_attribute("tagName", "lead")
                .connect(Connection::to("follow-up")),
            Node::new("follow-up", NodeKind::Wait)
                .with_attribute("durationSeconds", 5.0)
                .connect(Connection::to("sent")),
            Node::new("sent", NodeKind::Message).with_content("text", "Sent! Check your inbox."),
            Node::new("goodbye", NodeKind::Message).with_content("text", "No problem, bye!"),
        ],
    )?;

    let json = serde_json::to_string_pretty(graph.definition())?;
    std::fs::write(&output, json)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Try it with:");
    println!(
        "  chatflow simulate --flow {} --keyword price --send price --send button:YES --send me@example.com --send ok --wait-secs 7",
        output.display()
    );

    Ok(())
}
