use std::env;
use std::fs;
use std::process;

fn main() {
  let path = env::args().nth(1).unwrap_or_else(|| "test.c".to_string());
  let source = match fs::read_to_string(&path) {
    Ok(contents) => contents,
    Err(e) => {
      eprintln!("error reading {path}: {e}");
      process::exit(1);
    }
  };

  match frontend::front_end(&source) {
    Ok(output) => {
      for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
      }
      dbg!(&output.unit);
    }
    Err(e) => {
      eprintln!("{e}");
      process::exit(1);
    }
  }
}
