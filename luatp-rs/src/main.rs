use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use luatp::cli::{CliArgs, OutputTarget, RunConfig, VERSION_BANNER};
use luatp::{Error, Preprocessor, Result};

fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help reports success; every usage error is a fatal error.
            return if e.exit_code() == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE };
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .without_time()
        .init();

    if args.version {
        println!("{VERSION_BANNER}");
        return ExitCode::SUCCESS;
    }

    match args.into_run_config().and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: RunConfig) -> Result<()> {
    let mut out: Box<dyn Write> = match &config.output {
        OutputTarget::Console => Box::new(BufWriter::new(io::stdout().lock())),
        OutputTarget::File(path) => {
            let file = File::create(path)
                .map_err(|source| Error::Create { path: path.clone(), source })?;
            Box::new(BufWriter::new(file))
        }
    };
    let pp = Preprocessor::new()?;
    pp.run(&config.scripts, &config.inputs, &mut *out)
}
