use crate::command::ExitCode;
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::history::{History, HistoryFile};
use crate::io_adapters::StdStreams;
use crate::parser;
use crate::pipeline;
use crate::signals;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;

/// Status reported for lines the shell itself rejects (syntax, redirection,
/// recall and spawn errors).
const SHELL_ERROR: ExitCode = 1;

/// Mutable shell state shared by the interpreter and the builtins.
#[derive(Debug)]
pub struct ShellContext {
    pub env: Environment,
    pub history: History,
    pub config: ShellConfig,
}

/// What the loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue(ExitCode),
    Exit(ExitCode),
}

impl Flow {
    pub fn status(self) -> ExitCode {
        match self {
            Flow::Continue(code) | Flow::Exit(code) => code,
        }
    }
}

/// The shell loop: reads lines, records them in the history and runs them as
/// pipelines.
///
/// Example
/// ```
/// use pipesh::{Environment, Flow, Interpreter, ShellConfig, StdStreams};
/// let mut sh = Interpreter::with_environment(
///     ShellConfig::default(),
///     Environment::new(),
///     StdStreams::inherit(),
/// );
/// assert_eq!(sh.run_line("export GREETING=hello"), Flow::Continue(0));
/// assert_eq!(sh.context().env.get_var("GREETING"), Some("hello"));
/// assert_eq!(sh.run_line("exit 3"), Flow::Exit(3));
/// ```
pub struct Interpreter {
    ctx: ShellContext,
    streams: StdStreams,
    history_file: Option<HistoryFile>,
    last_status: ExitCode,
}

impl Interpreter {
    /// A shell over the process environment and standard streams.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_environment(config, Environment::new(), StdStreams::inherit())
    }

    /// A shell with an explicit environment and default streams. The history
    /// file named by `config`, if any, is loaded here.
    pub fn with_environment(config: ShellConfig, env: Environment, streams: StdStreams) -> Self {
        let history_file = config.history_path.clone().map(HistoryFile::new);
        let entries = match &history_file {
            Some(file) => file.load().unwrap_or_else(|e| {
                tracing::warn!(path = %file.path().display(), error = %e, "cannot read history file");
                Vec::new()
            }),
            None => Vec::new(),
        };
        tracing::debug!(entries = entries.len(), "history loaded");
        Self {
            ctx: ShellContext {
                env,
                history: History::from_entries(entries),
                config,
            },
            streams,
            history_file,
            last_status: 0,
        }
    }

    pub fn context(&self) -> &ShellContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ShellContext {
        &mut self.ctx
    }

    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Process one input line: resolve a history recall, record the line, run it.
    ///
    /// Blank lines are ignored and not recorded. Errors are reported on stderr
    /// and never end the shell; only `exit` does.
    pub fn run_line(&mut self, line: &str) -> Flow {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return Flow::Continue(self.last_status);
        }

        let line = match self.ctx.history.recall(line.trim()) {
            None => line.to_string(),
            Some(Ok(recalled)) => {
                self.echo(&recalled);
                recalled
            }
            Some(Err(e)) => {
                eprintln!("{e}");
                self.last_status = SHELL_ERROR;
                return Flow::Continue(SHELL_ERROR);
            }
        };
        self.record(&line);

        self.last_status = self.execute(&line);
        match self.ctx.env.exit_request.take() {
            Some(code) => Flow::Exit(code),
            None => Flow::Continue(self.last_status),
        }
    }

    fn echo(&self, line: &str) {
        let echoed = self.streams.writer().and_then(|mut out| {
            writeln!(out, "{line}")?;
            out.flush()
        });
        if let Err(e) = echoed {
            tracing::warn!(error = %e, "cannot echo recalled command");
        }
    }

    fn record(&mut self, line: &str) {
        self.ctx.history.push(line);
        if let Some(file) = &self.history_file {
            if let Err(e) = file.append(line) {
                tracing::warn!(path = %file.path().display(), error = %e, "cannot append to history file");
            }
        }
    }

    fn execute(&mut self, line: &str) -> ExitCode {
        let pipeline = match parser::parse_line(line, &self.ctx.env) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("{e}");
                return SHELL_ERROR;
            }
        };
        tracing::debug!(stages = pipeline.len(), "parsed");
        match pipeline::run_pipeline(&pipeline, &mut self.ctx, &self.streams) {
            Ok(outcome) => outcome.status(),
            Err(e) => {
                eprintln!("{e}");
                SHELL_ERROR
            }
        }
    }

    /// Interactive read-eval loop. Returns the status the shell should exit with.
    ///
    /// Ctrl-C at the prompt discards the line and prompts again; end of input
    /// prints `exit` and ends the shell with status 0.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        for entry in self.ctx.history.entries() {
            let _ = rl.add_history_entry(entry.as_str());
        }

        loop {
            let readline = rl.readline(&self.ctx.config.prompt);
            match readline {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    signals::take_interrupt();
                    let flow = self.run_line(&line);
                    if signals::take_interrupt() {
                        println!();
                    }
                    if let Flow::Exit(code) = flow {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    signals::take_interrupt();
                }
                Err(ReadlineError::Eof) => {
                    println!("exit");
                    return Ok(0);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};

    struct Fixture {
        dir: tempfile::TempDir,
        shell: Interpreter,
    }

    impl Fixture {
        fn new(history_path: Option<PathBuf>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut env = Environment::with_vars(HashMap::new(), dir.path().to_path_buf());
            env.set_var("PATH", "/usr/local/bin:/usr/bin:/bin");
            let streams = StdStreams::inherit()
                .with_stdin(File::open("/dev/null").unwrap())
                .with_stdout(File::create(dir.path().join("stdout")).unwrap());
            let config = ShellConfig {
                history_path,
                ..ShellConfig::default()
            };
            let shell = Interpreter::with_environment(config, env, streams);
            Self { dir, shell }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn stdout(&self) -> String {
            fs::read_to_string(self.path("stdout")).unwrap()
        }

        fn history(&self) -> Vec<&str> {
            self.shell
                .context()
                .history
                .entries()
                .iter()
                .map(String::as_str)
                .collect()
        }
    }

    #[test]
    fn test_blank_lines_are_not_recorded() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line(""), Flow::Continue(0));
        assert_eq!(f.shell.run_line("   \n"), Flow::Continue(0));
        assert!(f.history().is_empty());
    }

    #[test]
    fn test_recall_last_reruns_and_records_content() {
        let mut f = Fixture::new(None);
        f.shell.run_line("pwd");
        f.shell.run_line("!!");

        assert_eq!(f.history(), vec!["pwd", "pwd"]);
        let dir = f.dir.path().display().to_string();
        assert_eq!(f.stdout(), format!("{dir}\npwd\n{dir}\n"));
    }

    #[test]
    fn test_recall_by_number() {
        let mut f = Fixture::new(None);
        f.shell.run_line("export A=1");
        f.shell.run_line("export B=2");
        f.shell.run_line("!1");

        assert_eq!(f.history(), vec!["export A=1", "export B=2", "export A=1"]);
        assert_eq!(f.stdout(), "export A=1\n");
    }

    #[test]
    fn test_recall_errors_are_not_recorded() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line("!!"), Flow::Continue(SHELL_ERROR));
        f.shell.run_line("pwd");
        assert_eq!(f.shell.run_line("!7"), Flow::Continue(SHELL_ERROR));
        assert_eq!(f.shell.run_line("!abc"), Flow::Continue(SHELL_ERROR));
        assert_eq!(f.history(), vec!["pwd"]);
    }

    #[test]
    fn test_syntax_error_is_recorded_and_reported() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line("echo 'open"), Flow::Continue(SHELL_ERROR));
        assert_eq!(f.shell.run_line("ls | | wc"), Flow::Continue(SHELL_ERROR));
        assert_eq!(f.history(), vec!["echo 'open", "ls | | wc"]);
    }

    #[test]
    fn test_export_then_expand() {
        let mut f = Fixture::new(None);
        f.shell.run_line("export NAME=world");
        assert_eq!(f.shell.run_line("printf $NAME > out"), Flow::Continue(0));
        assert_eq!(fs::read_to_string(f.path("out")).unwrap(), "world");
    }

    #[test]
    fn test_exit_requests_termination() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line("exit 7"), Flow::Exit(7));
        assert_eq!(f.shell.run_line("exit"), Flow::Exit(0));
        assert_eq!(f.shell.run_line("exit nope"), Flow::Exit(255));
        assert_eq!(f.shell.run_line("exit -1"), Flow::Exit(255));
        assert_eq!(f.shell.run_line("exit 1 2"), Flow::Exit(255));
    }

    #[test]
    fn test_exit_inside_pipeline_does_not_end_shell() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line("exit 4 | cat"), Flow::Continue(0));
    }

    #[test]
    fn test_last_status_tracks_pipeline() {
        let mut f = Fixture::new(None);
        assert_eq!(f.shell.run_line("false"), Flow::Continue(1));
        assert_eq!(f.shell.last_status(), 1);
        assert_eq!(f.shell.run_line("true"), Flow::Continue(0));
    }

    #[test]
    fn test_history_file_is_loaded_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        fs::write(&path, "echo one\necho two\n").unwrap();

        let mut f = Fixture::new(Some(path.clone()));
        assert_eq!(f.history(), vec!["echo one", "echo two"]);
        f.shell.run_line("history 1 > last");
        assert_eq!(f.shell.run_line("!1 extra"), Flow::Continue(SHELL_ERROR));

        assert_eq!(fs::read_to_string(f.path("last")).unwrap(), "3  history 1 > last\n");
        let stored = fs::read_to_string(&path).unwrap();
        assert_eq!(stored, "echo one\necho two\nhistory 1 > last\n");
    }

    #[test]
    fn test_missing_history_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path: &Path = &dir.path().join("absent");
        let mut f = Fixture::new(Some(path.to_path_buf()));
        assert!(f.history().is_empty());
        f.shell.run_line("pwd");
        assert_eq!(fs::read_to_string(path).unwrap(), "pwd\n");
    }
}
