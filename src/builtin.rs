use crate::command::ExitCode;
use crate::config::ExportMode;
use crate::interpreter::ShellContext;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::env;
use std::fs;
use std::io::Write;
use std::sync::LazyLock;

/// Status of `exit` with a malformed code.
const INVALID_EXIT_CODE: ExitCode = 255;

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"));

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed against
/// the shell's own state instead of a new program image.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Arguments are plain values even when they start with `-` (`exit -1`);
    /// only a lone `--help` is still read as a flag.
    const VALUES_ONLY: bool = false;

    /// Executes the command. An `Err` is reported on `stderr` and becomes status 1.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode>;
}

/// The builtins recognized by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Export,
    Exit,
    History,
}

impl Builtin {
    const ALL: [Builtin; 5] = [
        Builtin::Cd,
        Builtin::Pwd,
        Builtin::Export,
        Builtin::Exit,
        Builtin::History,
    ];

    /// The builtin named exactly `name`, if any.
    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => Cd::name(),
            Builtin::Pwd => Pwd::name(),
            Builtin::Export => Export::name(),
            Builtin::Exit => Exit::name(),
            Builtin::History => HistoryCmd::name(),
        }
    }

    /// Run with `argv` (`argv[0]` is the builtin name) and return the exit status.
    pub fn run(
        self,
        argv: &[String],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> ExitCode {
        let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
        tracing::debug!(builtin = self.name(), ?args, "running builtin");
        let code = match self {
            Builtin::Cd => run_builtin::<Cd>(&args, stdout, stderr, ctx),
            Builtin::Pwd => run_builtin::<Pwd>(&args, stdout, stderr, ctx),
            Builtin::Export => run_builtin::<Export>(&args, stdout, stderr, ctx),
            Builtin::Exit => run_builtin::<Exit>(&args, stdout, stderr, ctx),
            Builtin::History => run_builtin::<HistoryCmd>(&args, stdout, stderr, ctx),
        };
        let _ = stdout.flush();
        code
    }
}

fn run_builtin<T: BuiltinCommand>(
    args: &[&str],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    ctx: &mut ShellContext,
) -> ExitCode {
    let separated: Vec<&str>;
    let args = if T::VALUES_ONLY && *args != ["--help"] {
        separated = std::iter::once("--").chain(args.iter().copied()).collect();
        &separated[..]
    } else {
        args
    };
    let cmd = match T::from_args(&[T::name()], args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            return match status {
                Ok(()) => {
                    let _ = writeln!(stdout, "{}", output.trim_end());
                    0
                }
                Err(()) => {
                    let _ = writeln!(stderr, "{}", output.trim_end());
                    1
                }
            };
        }
    };
    match cmd.execute(stdout, stderr, ctx) {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(stderr, "{e:#}");
            1
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode> {
        if !ctx.env.current_dir.is_dir() {
            return Err(anyhow!("cwd failed"));
        }
        writeln!(stdout, "{}", ctx.env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode> {
        let target = self.target.ok_or_else(|| anyhow!("Insufficient arguments"))?;
        let new_dir = ctx.env.resolve_path(&target);

        let canonical = fs::canonicalize(&new_dir).with_context(|| format!("cd: {target}"))?;
        env::set_current_dir(&canonical).with_context(|| format!("cd: {target}"))?;
        ctx.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set shell variables, inherited by every command started afterwards.
/// Without arguments, list all variables.
pub struct Export {
    #[argh(positional, greedy)]
    /// assignments of the form NAME or NAME=VALUE
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode> {
        if self.assignments.is_empty() {
            let mut vars: Vec<_> = ctx.env.vars.iter().collect();
            vars.sort();
            for (k, v) in vars {
                writeln!(stdout, "{k}={v}")?;
            }
            return Ok(0);
        }

        let mut code = 0;
        for assignment in &self.assignments {
            let (name, value) = assignment
                .split_once('=')
                .unwrap_or((assignment.as_str(), ""));
            if VARIABLE_NAME.is_match(name) {
                ctx.env.set_var(name, value);
                continue;
            }
            writeln!(stderr, "export: not a valid identifier: {assignment}")?;
            code = 1;
            if ctx.config.export_mode == ExportMode::StopOnError {
                break;
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status (0 when omitted).
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status
    pub code: Vec<String>,
}

impl BuiltinCommand for Exit {
    const VALUES_ONLY: bool = true;

    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode> {
        let code = match self.code.as_slice() {
            [] => 0,
            [code] => match code.parse::<i64>() {
                Ok(code) => (code & 0xff) as ExitCode,
                Err(_) => {
                    writeln!(stderr, "Invalid exit code")?;
                    INVALID_EXIT_CODE
                }
            },
            _ => {
                writeln!(stderr, "exit: too many arguments")?;
                INVALID_EXIT_CODE
            }
        };
        ctx.env.request_exit(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// List the command history, oldest first.
pub struct HistoryCmd {
    #[argh(positional)]
    /// show only the last N entries
    pub count: Option<String>,
}

impl BuiltinCommand for HistoryCmd {
    const VALUES_ONLY: bool = true;

    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut ShellContext,
    ) -> Result<ExitCode> {
        let last = match self.count {
            None => None,
            Some(n) => Some(n.parse::<usize>().map_err(|_| anyhow!("Invalid number"))?),
        };
        ctx.history.write_listing(last, stdout)?;
        Ok(0)
    }
}
