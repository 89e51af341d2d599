use clap::Parser;
use musicroom::{
    cli::{self, Cli},
    config::Config,
    util::{hook::set_panic_hook, log::initialize_logging},
};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> color_eyre::Result<()> {
    let cli = Cli::parse();
    let config = setup()?;

    cli::run(cli, config).await
}

fn setup() -> color_eyre::Result<Config> {
    color_eyre::install()?;
    dotenv::dotenv().ok();
    set_panic_hook();

    let config = Config::from_env()?;
    initialize_logging(&config.data_dir)?;
    Ok(config)
}
