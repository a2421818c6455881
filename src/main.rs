use clap::Parser;
use os1sh::cli::ShellArgs;
use std::process::exit;

fn main() {
    let args = ShellArgs::parse();

    if let Err(e) = os1sh::logging::setup_logging() {
        eprintln!("os1sh: logging disabled: {}", e);
    }

    match os1sh::run_shell(&args) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("os1sh: {}", e);
            exit(1);
        }
    }
}
