use pget_core::logging;

mod cli;

fn main() {
    // Initialize logging as early as possible; fall back to stderr if the
    // state directory is unwritable.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = cli::run() {
        eprintln!("pget error: {:#}", err);
        std::process::exit(1);
    }
}
