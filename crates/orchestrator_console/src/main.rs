use std::io;
use std::sync::Arc;

use agent_runtime_mock::MockRuntime;
use orchestrator_console::render::describe;
use orchestrator_console::{dispatch, start_lines, Flow};
use session_orchestrator::{ui_channel, OrchestratorConfig, SessionController, UiEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ORCHESTRATOR_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    init_tracing();

    let mut config = OrchestratorConfig::from_env().map_err(io::Error::other)?;
    if config.workspace_root.is_relative() {
        config.workspace_root = std::env::current_dir()?.join(&config.workspace_root);
    }
    info!(
        workspace = %config.workspace_root.display(),
        model = %config.work_model,
        "console starting"
    );

    let (runtime, mut runtime_events) = MockRuntime::new();
    let runtime = Arc::new(runtime.with_persistence(config.workspace_root.clone()));
    runtime.set_auto_reply(true);

    let (publisher, mut ui_events) = ui_channel();
    let mut controller =
        SessionController::new(runtime, config, publisher).map_err(io::Error::other)?;

    match controller.start().await {
        Ok(outcome) => print_lines(start_lines(outcome)),
        Err(error) => println!("error: {error}"),
    }
    println!("{}", orchestrator_console::commands::HELP_TEXT);
    print_ui_events(&mut ui_events);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let (flow, output) = dispatch(&mut controller, &line).await;
                print_lines(output);
                if flow == Flow::Quit {
                    break;
                }
            }
            Some(event) = runtime_events.recv() => controller.handle_event(event),
        }
        print_ui_events(&mut ui_events);
    }

    controller.shutdown().await;
    print_ui_events(&mut ui_events);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_ui_events(events: &mut UnboundedReceiver<UiEvent>) {
    while let Ok(event) = events.try_recv() {
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
