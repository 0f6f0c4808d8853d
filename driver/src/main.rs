use std::env;
use std::fs;
use std::process;

use colour::red_ln;
use driver::compile_and_run;

fn compile(path: &str) -> Result<String, String> {
  let source = fs::read_to_string(path).map_err(|e| format!("error reading {path}: {e}"))?;

  let lowered = frontend::front_end(&source).map_err(|e| e.to_string())?;
  for diagnostic in &lowered.diagnostics {
    red_ln!("lowering: {}", diagnostic);
  }

  let generated = backend::generate(&lowered.unit).map_err(|e| e.to_string())?;
  for diagnostic in &generated.diagnostics {
    red_ln!("codegen: {}", diagnostic);
  }

  Ok(generated.assembly)
}

fn main() {
  let path = env::args().nth(1).unwrap_or_else(|| "test.c".to_string());
  let assembly = compile(&path).unwrap_or_else(|e| {
    red_ln!("{}", e);
    process::exit(1);
  });

  println!("{assembly}");
  match compile_and_run(&assembly) {
    Ok((exit_code, stdout)) => {
      if !stdout.is_empty() {
        print!("{stdout}");
      }
      println!("exit code: {exit_code}");
    }
    Err(e) => {
      red_ln!("{}", e);
      process::exit(1);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn returns(path: &str, expected: i32) {
    let assembly = compile(path).expect("compilation should succeed");
    let (exit_code, _) = compile_and_run(&assembly).expect("assembly should build and run");
    assert_eq!(exit_code, expected);
  }

  fn prints(path: &str, expected: &str) {
    let assembly = compile(path).expect("compilation should succeed");
    let (_, stdout) = compile_and_run(&assembly).expect("assembly should build and run");
    assert_eq!(stdout, expected);
  }

  #[test]
  fn return_literal() {
    returns("test_programs/return_literal.c", 42);
  }

  #[test]
  fn arithmetic() {
    returns("test_programs/arithmetic.c", 12);
  }

  #[test]
  fn division() {
    returns("test_programs/division.c", 6);
  }

  #[test]
  fn locals_and_initializers() {
    returns("test_programs/locals.c", 12);
  }

  #[test]
  fn parameters() {
    returns("test_programs/parameters.c", 42);
  }

  #[test]
  fn conditional() {
    returns("test_programs/conditional.c", 1);
  }

  #[test]
  fn if_else() {
    returns("test_programs/if_else.c", 7);
  }

  #[test]
  fn nested_scopes() {
    returns("test_programs/nested_scope.c", 3);
  }

  #[test]
  fn arrays() {
    returns("test_programs/array.c", 16);
  }

  #[test]
  fn goto_loop() {
    returns("test_programs/goto_loop.c", 10);
  }

  #[test]
  fn logical_operators() {
    returns("test_programs/logical.c", 1);
  }

  #[test]
  fn recursion() {
    returns("test_programs/recursion.c", 120);
  }

  #[test]
  fn prototypes() {
    returns("test_programs/prototype.c", 42);
  }

  #[test]
  fn print_helper() {
    prints("test_programs/print.c", "42\n");
  }
}
