//! SMT-LIB2 solver driven over a child process's stdin/stdout.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::backends::sexpr::{self, SExpr};
use crate::backends::smtlib_printer::{decl_to_smtlib, sort_declarations, symbol, to_smtlib};
use crate::solver::{Model, SatResult, SmtSolver};
use crate::sorts::{Declaration, SmtSort};
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum ProcessSolverError {
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver binary not found: {0}")]
    NotFound(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("failed to parse solver output: {0}")]
    ParseError(String),
}

/// Solver executables with a known command-line dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SolverBinary {
    #[default]
    Cvc5,
    Z3,
}

impl SolverBinary {
    pub fn default_command(self) -> &'static str {
        match self {
            SolverBinary::Cvc5 => "cvc5",
            SolverBinary::Z3 => "z3",
        }
    }

    fn args(self, timeout_ms: u64) -> Vec<String> {
        match self {
            SolverBinary::Cvc5 => {
                let mut args = vec![
                    "--lang".to_string(),
                    "smt2".to_string(),
                    "--incremental".to_string(),
                    "--produce-models".to_string(),
                    "--produce-unsat-assumptions".to_string(),
                ];
                if timeout_ms > 0 {
                    args.push(format!("--tlimit-per={timeout_ms}"));
                }
                args
            }
            SolverBinary::Z3 => vec!["-in".to_string(), "-smt2".to_string()],
        }
    }
}

impl std::str::FromStr for SolverBinary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cvc5" => Ok(SolverBinary::Cvc5),
            "z3" => Ok(SolverBinary::Z3),
            other => Err(format!("unknown solver `{other}` (expected cvc5 or z3)")),
        }
    }
}

/// Incremental solver session over an external cvc5 or z3 process.
///
/// A command that fails leaves the process in an unknown state; the next
/// [`SmtSolver::reset`] restarts it.
pub struct SmtLibProcess {
    binary: SolverBinary,
    command: String,
    logic: String,
    timeout_ms: u64,
    io: ProcessIo,
    vars: HashMap<String, SmtSort>,
    declared_sorts: Vec<String>,
    last_assumptions: Vec<String>,
    poisoned: bool,
}

struct ProcessIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ProcessIo {
    fn spawn(command: &str, args: &[String]) -> Result<Self, ProcessSolverError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessSolverError::NotFound(format!("{command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture stdout".into()))?;
        let stderr = child.stderr.take();

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
        })
    }

    fn shutdown(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl SmtLibProcess {
    pub fn new(binary: SolverBinary) -> Result<Self, ProcessSolverError> {
        Self::with_command(binary, binary.default_command())
    }

    pub fn with_command(binary: SolverBinary, command: &str) -> Result<Self, ProcessSolverError> {
        let io = ProcessIo::spawn(command, &binary.args(0))?;
        let mut solver = Self {
            binary,
            command: command.to_string(),
            logic: "ALL".to_string(),
            timeout_ms: 0,
            io,
            vars: HashMap::new(),
            declared_sorts: Vec::new(),
            last_assumptions: Vec::new(),
            poisoned: false,
        };
        solver.preamble()?;
        Ok(solver)
    }

    /// Use `logic` instead of `ALL` from the next reset on.
    pub fn with_logic(mut self, logic: impl Into<String>) -> Result<Self, ProcessSolverError> {
        self.logic = logic.into();
        self.reset()?;
        Ok(self)
    }

    pub fn binary(&self) -> SolverBinary {
        self.binary
    }

    fn preamble(&mut self) -> Result<(), ProcessSolverError> {
        if self.binary == SolverBinary::Z3 {
            self.send_command_no_response("(set-option :produce-models true)")?;
            self.send_command_no_response("(set-option :produce-unsat-cores true)")?;
            if self.timeout_ms > 0 {
                let cmd = format!("(set-option :timeout {})", self.timeout_ms);
                self.send_command_no_response(&cmd)?;
            }
        }
        let cmd = format!("(set-logic {})", self.logic);
        self.send_command_no_response(&cmd)
    }

    fn restart(&mut self) -> Result<(), ProcessSolverError> {
        debug!(command = %self.command, "restarting solver process");
        self.io.kill();
        self.io = ProcessIo::spawn(&self.command, &self.binary.args(self.timeout_ms))?;
        self.poisoned = false;
        self.preamble()
    }

    fn send_command_no_response(&mut self, cmd: &str) -> Result<(), ProcessSolverError> {
        trace!(cmd, "smt >");
        writeln!(self.io.stdin, "{cmd}")?;
        self.io.stdin.flush()?;
        Ok(())
    }

    /// Send a command and read back one complete s-expression.
    fn send_command(&mut self, cmd: &str) -> Result<SExpr, ProcessSolverError> {
        self.send_command_no_response(cmd)?;

        let mut response = String::new();
        loop {
            let read = self.io.stdout.read_line(&mut response)?;
            if read == 0 {
                self.poisoned = true;
                let mut stderr = String::new();
                if let Some(err) = self.io.stderr.as_mut() {
                    let _ = err.read_to_string(&mut stderr);
                }
                return Err(ProcessSolverError::SolverError(format!(
                    "no response for command `{cmd}`. stderr: {}",
                    stderr.trim()
                )));
            }
            if sexpr::is_complete(&response) {
                break;
            }
        }
        trace!(response = response.trim_end(), "smt <");

        let expr = sexpr::parse(response.trim()).map_err(|e| {
            self.poisoned = true;
            ProcessSolverError::ParseError(format!("{e} in `{}`", response.trim()))
        })?;
        if let Some(message) = error_message(&expr) {
            self.poisoned = true;
            return Err(ProcessSolverError::SolverError(message));
        }
        Ok(expr)
    }

    fn read_sat_result(&mut self, cmd: &str) -> Result<SatResult, ProcessSolverError> {
        let response = self.send_command(cmd)?;
        match response.as_atom() {
            Some("sat") => Ok(SatResult::Sat),
            Some("unsat") => Ok(SatResult::Unsat),
            Some("unknown") => Ok(SatResult::Unknown(self.reason_unknown())),
            _ => {
                self.poisoned = true;
                Err(ProcessSolverError::SolverError(response.to_string()))
            }
        }
    }

    fn reason_unknown(&mut self) -> String {
        let fallback = format!("{} returned unknown", self.binary.default_command());
        match self.send_command("(get-info :reason-unknown)") {
            Ok(SExpr::List(items)) => items
                .get(1)
                .map(|reason| {
                    reason
                        .text()
                        .map(str::to_string)
                        .unwrap_or_else(|| reason.to_string())
                })
                .unwrap_or(fallback),
            Ok(_) | Err(_) => fallback,
        }
    }

    /// Declare every constant (and the uninterpreted sorts they use).
    pub fn declare_all(&mut self, decls: &[Declaration]) -> Result<(), ProcessSolverError> {
        for line in sort_declarations(decls) {
            if !self.declared_sorts.contains(&line) {
                self.send_command_no_response(&line)?;
                self.declared_sorts.push(line);
            }
        }
        for decl in decls {
            self.send_command_no_response(&decl_to_smtlib(decl))?;
            self.vars.insert(decl.name.clone(), decl.sort.clone());
        }
        Ok(())
    }
}

fn error_message(expr: &SExpr) -> Option<String> {
    match expr.as_list()? {
        [SExpr::Atom(head), message] if head == "error" => {
            Some(
            message
                .text()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string()),
        )
        }
        _ => None,
    }
}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        self.io.shutdown();
    }
}

impl SmtSolver for SmtLibProcess {
    type Error = ProcessSolverError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), ProcessSolverError> {
        self.declare_all(&[Declaration::new(name, sort.clone())])
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), ProcessSolverError> {
        let smt_str = to_smtlib(term);
        self.send_command_no_response(&format!("(assert {smt_str})"))
    }

    fn push(&mut self) -> Result<(), ProcessSolverError> {
        self.send_command_no_response("(push 1)")
    }

    fn pop(&mut self) -> Result<(), ProcessSolverError> {
        self.send_command_no_response("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, ProcessSolverError> {
        self.read_sat_result("(check-sat)")
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), ProcessSolverError> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }

        let mut model = Model::new();
        for &(name, sort) in var_names {
            let response = self.send_command(&format!("(get-value ({}))", symbol(name)))?;
            // Response format: ((name value))
            let value = response
                .as_list()
                .and_then(|pairs| pairs.first())
                .and_then(SExpr::as_list)
                .and_then(|pair| pair.get(1))
                .ok_or_else(|| ProcessSolverError::ParseError(response.to_string()))?;
            model.insert(name, sexpr::to_model_value(value, sort));
        }

        Ok((SatResult::Sat, Some(model)))
    }

    fn supports_assumption_unsat_core(&self) -> bool {
        true
    }

    fn check_sat_assuming(
        &mut self,
        assumptions: &[String],
    ) -> Result<SatResult, ProcessSolverError> {
        for name in assumptions {
            match self.vars.get(name) {
                Some(SmtSort::Bool) => {}
                Some(_) => {
                    return Err(ProcessSolverError::SolverError(format!(
                        "assumption `{name}` is not declared as Bool"
                    )));
                }
                None => {
                    return Err(ProcessSolverError::SolverError(format!(
                        "assumption `{name}` is not declared"
                    )));
                }
            }
        }
        self.last_assumptions = assumptions.to_vec();
        let payload: Vec<String> = assumptions.iter().map(|a| symbol(a)).collect();
        self.read_sat_result(&format!("(check-sat-assuming ({}))", payload.join(" ")))
    }

    fn get_unsat_core_assumptions(&mut self) -> Result<Vec<String>, ProcessSolverError> {
        let cmd = match self.binary {
            SolverBinary::Cvc5 => "(get-unsat-assumptions)",
            SolverBinary::Z3 => "(get-unsat-core)",
        };
        let response = self.send_command(cmd)?;
        let names = response
            .as_list()
            .ok_or_else(|| ProcessSolverError::ParseError(response.to_string()))?;
        Ok(names
            .iter()
            .filter_map(SExpr::as_atom)
            .filter(|name| self.last_assumptions.iter().any(|a| a == name))
            .map(str::to_string)
            .collect())
    }

    fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), ProcessSolverError> {
        if timeout_ms == self.timeout_ms {
            return Ok(());
        }
        self.timeout_ms = timeout_ms;
        match self.binary {
            // cvc5 only honours the per-check limit from the command line.
            SolverBinary::Cvc5 => self.restart(),
            SolverBinary::Z3 => {
                self.send_command_no_response(&format!("(set-option :timeout {timeout_ms})"))
            }
        }
    }

    fn reset(&mut self) -> Result<(), ProcessSolverError> {
        self.vars.clear();
        self.declared_sorts.clear();
        self.last_assumptions.clear();
        let exited = matches!(self.io.child.try_wait(), Ok(Some(_)));
        if self.poisoned || exited {
            return self.restart();
        }
        self.send_command_no_response("(reset)")?;
        self.preamble()
    }
}
