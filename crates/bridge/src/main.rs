use {clap::Parser, std::process::ExitCode};

#[tokio::main]
async fn main() -> ExitCode {
    let args = bridge::arguments::Arguments::parse();
    observe::tracing::initialize(&args.logging.observe_config());
    tracing::info!("running watcher with validated arguments:\n{}", args);
    match bridge::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(?err, "watcher failed");
            ExitCode::FAILURE
        }
    }
}
