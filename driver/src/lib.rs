//! Assemble-and-run harness shared by the CLI and the end-to-end tests.

use std::fs;
use std::process::Command;

use tempfile::tempdir;

/// Assemble the emitted text with gcc in a scratch directory, run the
/// resulting binary, and hand back its exit code and captured stdout.
pub fn compile_and_run(assembly: &str) -> Result<(i32, String), Box<dyn std::error::Error>> {
  let scratch = tempdir()?;
  let asm_path = scratch.path().join("out.s");
  let exe_path = scratch.path().join("out");

  fs::write(&asm_path, assembly)?;

  let assembler = Command::new("gcc")
    .arg(&asm_path)
    .arg("-o")
    .arg(&exe_path)
    .output()?;
  if !assembler.status.success() {
    return Err(
      format!(
        "gcc failed: {}",
        String::from_utf8_lossy(&assembler.stderr)
      )
      .into(),
    );
  }

  let run = Command::new(&exe_path).output()?;
  let stdout = String::from_utf8(run.stdout)?;
  let exit_code = run.status.code().unwrap_or(-1);

  Ok((exit_code, stdout))
}
