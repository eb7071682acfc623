use anyhow::Result;
use krill::Interpreter;
use krill::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("KRILL_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_default();
    let mut shell = Interpreter::default();
    shell.repl(&config.prompt)
}
