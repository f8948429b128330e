mod buildid;
mod cli;
mod commands;
mod env_loader;
mod error;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
