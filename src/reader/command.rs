//! Builds the reader process command line.
//!
//! The contract with the reader executable is fixed: a `loop` subcommand plus
//! four named flags carrying the wiring fields. The flag names match the
//! reference reader program and are part of the wire contract, not a style
//! choice.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::SourceConfig;

/// Returns the command that runs the reader in `loop` mode for `source`.
///
/// stdout is piped (one line per changed reading), stderr is piped
/// (diagnostics only), stdin is closed. `kill_on_drop` backstops the
/// explicit SIGKILL teardown so an aborted actor cannot leak the process.
pub(crate) fn reader_command(program: &Path, source: &SourceConfig) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("loop")
        .arg("--serialOut")
        .arg(source.serial_out.to_string())
        .arg("--loadData")
        .arg(source.load_data.to_string())
        .arg("--clock")
        .arg(source.clock.to_string())
        .arg("--bits")
        .arg(source.bits.to_string());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_matches_reader_contract() {
        let source = SourceConfig {
            serial_out: 11,
            load_data: 13,
            clock: 15,
            bits: 8,
        };
        let cmd = reader_command(Path::new("/opt/ichipy/74HC165.py"), &source);

        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "/opt/ichipy/74HC165.py");

        let args: Vec<&str> = std_cmd
            .get_args()
            .map(|a| a.to_str().unwrap())
            .collect();
        assert_eq!(
            args,
            [
                "loop",
                "--serialOut",
                "11",
                "--loadData",
                "13",
                "--clock",
                "15",
                "--bits",
                "8"
            ]
        );
    }
}
