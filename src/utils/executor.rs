//! Command execution abstraction for testability
//!
//! Every external tool (mysqldump, tar, gzip, gpg, ...) is invoked through
//! [`CommandExecutor`], so tests can record calls and simulate tools.

use anyhow::Result;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command with optional timeout
    fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Output>;

    /// Run a command and return stdout as string
    fn run_command_stdout(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let output = self.run_command(program, args, working_dir, timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Output> {
        super::command::run_command(program, args, working_dir, timeout)
    }

    fn run_command_stdout(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        super::command::run_command_stdout(program, args, working_dir, timeout)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub working_dir: Option<String>,
    }

    impl CommandCall {
        /// Whether any argument contains the given text
        pub fn has_arg_containing(&self, needle: &str) -> bool {
            self.args.iter().any(|a| a.contains(needle))
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    impl MockResponse {
        pub fn stdout(stdout: &str) -> Self {
            MockResponse::Success {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub fn failure(stderr: &str) -> Self {
            MockResponse::Failure {
                stderr: stderr.to_string(),
                exit_code: 1,
            }
        }
    }

    /// Simulated effect of a successful tool run, e.g. writing its output file
    pub type SideEffect = Arc<dyn Fn(&[String]) -> std::io::Result<()> + Send + Sync>;

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: program name -> response
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Responses used when an argument contains a given text
        arg_responses: Arc<Mutex<Vec<(String, String, MockResponse)>>>,
        /// Side effects applied after a successful response
        side_effects: Arc<Mutex<HashMap<String, SideEffect>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a specific program
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.to_string(), response);
            self
        }

        /// Configure a response for calls whose arguments contain `needle`
        pub fn expect_with_arg(self, program: &str, needle: &str, response: MockResponse) -> Self {
            self.arg_responses.lock().unwrap().push((
                program.to_string(),
                needle.to_string(),
                response,
            ));
            self
        }

        /// Register a side effect run after each successful call to `program`
        pub fn with_side_effect<F>(self, program: &str, effect: F) -> Self
        where
            F: Fn(&[String]) -> std::io::Result<()> + Send + Sync + 'static,
        {
            self.side_effects
                .lock()
                .unwrap()
                .insert(program.to_string(), Arc::new(effect));
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Get recorded calls to one program, in order
        pub fn calls_to(&self, program: &str) -> Vec<CommandCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .cloned()
                .collect()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            self.call_count(program) > 0
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        /// Order in which programs were invoked
        pub fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }

        fn record_call(
            &self,
            program: &str,
            args: &[&str],
            working_dir: Option<&Path>,
        ) -> CommandCall {
            let call = CommandCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                working_dir: working_dir.map(|p| p.display().to_string()),
            };
            self.calls.lock().unwrap().push(call.clone());
            call
        }

        fn get_response(&self, call: &CommandCall) -> MockResponse {
            let by_arg = self
                .arg_responses
                .lock()
                .unwrap()
                .iter()
                .find(|(program, needle, _)| {
                    *program == call.program && call.has_arg_containing(needle)
                })
                .map(|(_, _, response)| response.clone());

            by_arg
                .or_else(|| self.responses.lock().unwrap().get(&call.program).cloned())
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }

        fn execute_response(&self, call: &CommandCall, response: MockResponse) -> Result<Output> {
            match response {
                MockResponse::Success { stdout, stderr } => {
                    let effect = self.side_effects.lock().unwrap().get(&call.program).cloned();
                    if let Some(effect) = effect {
                        effect(&call.args).map_err(|e| {
                            anyhow::anyhow!("{} failed while writing output: {}", call.program, e)
                        })?;
                    }
                    Ok(Output {
                        status: std::process::ExitStatus::default(),
                        stdout: stdout.into_bytes(),
                        stderr: stderr.into_bytes(),
                    })
                }
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!(
                        "{} failed with exit code {:?}: {}",
                        call.program,
                        exit_code,
                        stderr
                    )
                }
                MockResponse::Timeout => {
                    anyhow::bail!("{} timed out", call.program)
                }
            }
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run_command(
            &self,
            program: &str,
            args: &[&str],
            working_dir: Option<&Path>,
            _timeout: Option<Duration>,
        ) -> Result<Output> {
            let call = self.record_call(program, args, working_dir);
            let response = self.get_response(&call);
            self.execute_response(&call, response)
        }
    }
}
