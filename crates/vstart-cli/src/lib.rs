//! Command-line runtime for the `vstart` local cluster orchestrator.
//!
//! The runtime splits configuration flags from action flags, loads the
//! layered configuration, initialises telemetry and hands the ordered actions
//! to the lifecycle engine. Progress lines go to stdout; any fatal error is
//! written to stderr as a single line and turned into a failing exit status.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::error::ErrorKind;
use vstart_config::Config;
use vstart_engine::{
    Collaborators, ConsoleReporter, DetachedLauncher, DirectoryLayout, HttpStatusClient,
    Orchestrator, SystemCommandRunner, reaper_for, telemetry,
};

mod cli;
mod config;
mod errors;

use cli::Invocation;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::AppError;

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    loader: &'a L,
}

impl<W, E, L> CliRunner<'_, W, E, L>
where
    W: Write + Send,
    E: Write,
    L: ConfigLoader,
{
    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let invocation = match Invocation::parse(split.cli_arguments) {
            Ok(invocation) => invocation,
            Err(error) if is_informational(&error) => {
                let _ = write!(self.stdout, "{error}");
                return ExitCode::SUCCESS;
            }
            Err(error) => return self.fail(&AppError::CliUsage(error)),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| self.execute(&invocation, &config));
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => self.fail(&error),
        }
    }

    fn execute(&mut self, invocation: &Invocation, config: &Config) -> Result<(), AppError> {
        let _telemetry = telemetry::initialise(config)?;
        let mut layout = DirectoryLayout::resolve(
            config.install_root(),
            config.cluster_version(),
            config.topology(),
        )?;
        if let Some(bin_dir) = config.bin_dir() {
            layout = layout.with_bin_dir(bin_dir);
        }

        let launcher = DetachedLauncher::new();
        let reaper = reaper_for(config.reap_strategy(), &layout);
        let client = HttpStatusClient::new()?;
        let commands = SystemCommandRunner::new();
        let reporter = ConsoleReporter::new(&mut *self.stdout);
        let collaborators = Collaborators {
            launcher: &launcher,
            reaper: reaper.as_ref(),
            client: &client,
            commands: &commands,
            reporter: &reporter,
        };

        let orchestrator = Orchestrator::from_config(config, layout, collaborators)?;
        orchestrator.execute(&invocation.plan())?;
        if invocation.rmdir {
            orchestrator.teardown()?;
        }
        Ok(())
    }

    fn fail(&mut self, error: &AppError) -> ExitCode {
        let _ = writeln!(self.stderr, "{error}");
        ExitCode::FAILURE
    }
}

fn is_informational(error: &clap::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    )
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write + Send,
    E: Write,
{
    CliRunner {
        stdout,
        stderr,
        loader: &OrthoConfigLoader,
    }
    .run(args)
}
