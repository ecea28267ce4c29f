use anyhow::Context;
use pipesh::{Args, Environment, ExitCode, Interpreter, ShellConfig, StdStreams, signals};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PIPESH_LOG";

fn main() {
    init_tracing();
    let args: Args = argh::from_env();
    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pipesh: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let env = Environment::new();
    let config = ShellConfig::from_args(&args, &env);
    let mut shell = Interpreter::with_environment(config, env, StdStreams::inherit());

    if let Some(line) = args.command {
        return Ok(shell.run_line(&line).status());
    }

    signals::install_sigint_handler().context("cannot install SIGINT handler")?;
    shell.repl()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
