use clap::Parser;

mod catalog;
mod cli;
mod commands;
mod domain;
mod services;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = cli::Cli::parse();
    let cfg = cli::Config::resolve(&args)?;
    commands::handle_runtime_commands(&args, &cfg)
}

fn init_tracing() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("cipbuild=info".parse().expect("valid directive"))
            .add_directive("reqwest=warn".parse().expect("valid directive"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    });
}
