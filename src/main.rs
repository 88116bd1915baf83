use clap::Parser;
use kubecheck::cli::Cli;
use kubecheck::error::render_chain;
use std::process;

fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = kubecheck::run_command(cli.command) {
        eprintln!("Error: {}", render_chain(&e));
        process::exit(1);
    }
}
