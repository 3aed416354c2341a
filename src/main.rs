mod cli;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    match cli::run(cli) {
        Ok(()) => {}
        // The reader went away (e.g. `snaplog log | head`); stop quietly.
        Err(e) if e.is_broken_pipe() => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
