use clap::Parser;

mod cli;
pub mod exit_codes;

use cli::args::Cli;
use cli::commands::dispatch;

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            if let Some(remedy) = exit_codes::remedy(&e) {
                eprintln!("hint: {remedy}");
            }
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}
