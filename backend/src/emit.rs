//! Append-only assembly text sink.
//!
//! Instructions are tab indented, labels sit flush left; nothing written is
//! ever revisited.

#[derive(Debug, Default)]
pub struct Assembly {
  text: String,
}

impl Assembly {
  pub fn new() -> Self {
    Assembly { text: String::new() }
  }

  /// Append one tab-indented instruction line.
  pub fn ins(&mut self, instruction: &str) {
    self.text.push('\t');
    self.text.push_str(instruction);
    self.text.push('\n');
  }

  /// Append a label line.
  pub fn label(&mut self, name: &str) {
    self.text.push_str(name);
    self.text.push_str(":\n");
  }

  /// Append preformatted text verbatim.
  pub fn raw(&mut self, text: &str) {
    self.text.push_str(text);
  }

  pub fn finish(self) -> String {
    self.text
  }
}
