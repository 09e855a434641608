mod cli;
mod exit_codes;
mod logging;
mod output;
mod profile;
mod run;
mod run_error;

use clap::Parser;
use exit_codes::ExitCode;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(usage_exit_code(&err).as_i32());
        }
    };

    let code = match cli.command {
        cli::Command::Run(args) => run::run(args).await.unwrap_or_else(|err| {
            eprintln!("error: {err}");
            err.exit_code()
        }),
    };

    std::process::exit(code.as_i32());
}

/// `--help` and `--version` are not failures.
fn usage_exit_code(err: &clap::Error) -> ExitCode {
    use clap::error::ErrorKind;
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success,
        _ => ExitCode::InvalidInput,
    }
}
