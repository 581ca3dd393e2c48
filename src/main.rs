mod assets;
mod assistant;
mod cli;
mod commands;
mod daylog;
mod env_loader;
mod error;

fn main() {
    env_loader::load_dotenv();

    match cli::run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
