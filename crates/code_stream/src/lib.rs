#![forbid(unsafe_code)]

//! Append-only text sink with scoped brace blocks for emitted source code.

const INDENT: &str = "    ";

/// A brace on the scope stack. Plain scopes come from [`CodeStream::scope`],
/// tagged brackets from [`CodeStream::open_tagged`]; a tagged bracket must be
/// closed with the same tag, in the same function that opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brace {
    Plain,
    Tagged(u32),
}

#[derive(Debug, Default)]
pub struct CodeStream {
    buf: String,
    stack: Vec<Brace>,
}

impl CodeStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn put_indent(&mut self) {
        for _ in 0..self.stack.len() {
            self.buf.push_str(INDENT);
        }
    }

    /// Emit a single line at the current indent level.
    pub fn line(&mut self, line: &str) {
        self.put_indent();
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Emit a possibly multi-line code fragment, re-indenting each line.
    pub fn fragment(&mut self, code: &str) {
        if code.trim().is_empty() {
            return;
        }
        for line in code.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                self.buf.push('\n');
            } else {
                self.line(line.trim_start());
            }
        }
    }

    /// Open a `{` block after `header` (or a bare `{` when `header` is
    /// empty), run `body`, then close it. Nesting is arbitrary; closure
    /// structure guarantees the braces pair even if `body` emits nothing.
    pub fn scope(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{} {{", header));
        }
        self.stack.push(Brace::Plain);
        body(self);
        let closed = self.stack.pop();
        debug_assert_eq!(closed, Some(Brace::Plain));
        self.line("}");
    }

    /// Open a labelled bracket. Used where the opening and closing sites are
    /// textually far apart (conditional guards around user fragments).
    pub fn open_tagged(&mut self, header: &str, tag: u32) {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{} {{", header));
        }
        self.stack.push(Brace::Tagged(tag));
    }

    /// Close the innermost bracket, which must be labelled with `tag`.
    /// A mismatch is a bug in the emitter, not a model error.
    pub fn close_tagged(&mut self, tag: u32) {
        match self.stack.pop() {
            Some(Brace::Tagged(open)) if open == tag => {}
            other => panic!("bracket {} closed against {:?}", tag, other),
        }
        self.line("}");
    }

    pub fn is_balanced(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Consume the stream, asserting that every scope and bracket closed.
    pub fn finish(self) -> String {
        assert!(
            self.is_balanced(),
            "emission ended with {} unclosed scopes",
            self.stack.len()
        );
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_balance() {
        let mut cs = CodeStream::new();
        cs.scope("void f()", |cs| {
            cs.line("int a = 0;");
            cs.scope("for (int i = 0; i < 4; i++)", |cs| {
                cs.line("a += i;");
            });
        });
        let out = cs.finish();
        assert_eq!(out.matches('{').count(), out.matches('}').count());
        assert!(out.contains("void f() {"));
        assert!(out.contains("        a += i;"));
    }

    #[test]
    fn tagged_brackets_pair() {
        let mut cs = CodeStream::new();
        cs.open_tagged("if (x > 0)", 2041);
        cs.line("y = x;");
        cs.close_tagged(2041);
        assert!(cs.is_balanced());
    }

    #[test]
    #[should_panic]
    fn tag_mismatch_panics() {
        let mut cs = CodeStream::new();
        cs.open_tagged("if (x > 0)", 2041);
        cs.close_tagged(29);
    }

    #[test]
    #[should_panic]
    fn unbalanced_finish_panics() {
        let mut cs = CodeStream::new();
        cs.open_tagged("if (x > 0)", 2041);
        let _ = cs.finish();
    }

    #[test]
    fn fragment_reindents_lines() {
        let mut cs = CodeStream::new();
        cs.scope("", |cs| {
            cs.fragment("a = 1;\n  b = 2;");
        });
        let out = cs.finish();
        assert!(out.contains("    a = 1;"));
        assert!(out.contains("    b = 2;"));
    }

    #[test]
    fn empty_fragment_emits_nothing() {
        let mut cs = CodeStream::new();
        cs.fragment("   \n  ");
        assert_eq!(cs.finish(), "");
    }
}
