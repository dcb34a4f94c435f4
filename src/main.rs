use copy_code_cleaner_lib::commands::{self, Command, CommandError, USAGE};
use copy_code_cleaner_lib::{config, init_tracing};
use tracing::error;

#[tokio::main]
async fn main() {
    let config = config::load_config();
    init_tracing(config.log_level);

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = commands::run(command, &config).await {
        error!(error = %e, "Command failed");
        eprintln!("copy-code-cleaner: {}", e);
        let code = if matches!(e, CommandError::Usage(_)) { 2 } else { 1 };
        std::process::exit(code);
    }
}
