/// A named placeholder found in statement text. Offsets are byte offsets and
/// `start` points at the leading `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSpan {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Statement rewritten for drivers that only understand positional markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalStatement {
    /// Text with every `:name` replaced by `$n`.
    pub text: String,
    /// Parameter name for each position; `names[0]` is `$1`.
    pub names: Vec<String>,
}

/// Cursor over SQL text that finds `:name` placeholders.
///
/// String literals, quoted identifiers, comments, dollar-quoted bodies and
/// `::` casts are skipped so `'10:30'` or `x::date` never yield a placeholder.
#[derive(Debug, Default)]
pub struct SqlScanner {
    position: usize,
    length: usize,
    text_v: Vec<(usize, char)>,
    source_len: usize,
}

impl SqlScanner {
    pub fn new(statement: &str) -> Self {
        let text_v: Vec<(usize, char)> = statement.char_indices().collect();
        Self {
            position: 0,
            length: text_v.len(),
            text_v,
            source_len: statement.len(),
        }
    }

    /// All placeholder occurrences, in text order.
    pub fn scan(statement: &str) -> Vec<PlaceholderSpan> {
        SqlScanner::new(statement).run()
    }

    /// Replace placeholders with `$1..$n`, reusing the same position for a
    /// repeated name.
    pub fn to_positional(statement: &str) -> PositionalStatement {
        let mut text = String::with_capacity(statement.len());
        let mut names: Vec<String> = Vec::new();
        let mut last = 0;

        for span in Self::scan(statement) {
            let position = match names.iter().position(|n| *n == span.name) {
                Some(i) => i + 1,
                None => {
                    names.push(span.name.clone());
                    names.len()
                }
            };
            text.push_str(&statement[last..span.start]);
            text.push('$');
            text.push_str(&position.to_string());
            last = span.end;
        }
        text.push_str(&statement[last..]);

        PositionalStatement { text, names }
    }

    fn eof(&self) -> bool {
        self.position >= self.length
    }

    fn current(&self) -> char {
        self.peek(0)
    }

    fn peek(&self, ahead: usize) -> char {
        self.text_v.get(self.position + ahead).map(|(_, c)| *c).unwrap_or('\0')
    }

    fn next(&mut self) {
        self.position += 1;
    }

    fn jump(&mut self, ahead: usize) {
        self.position = (self.position + ahead).min(self.length);
    }

    fn byte_offset(&self, position: usize) -> usize {
        self.text_v.get(position).map(|(i, _)| *i).unwrap_or(self.source_len)
    }

    fn run(&mut self) -> Vec<PlaceholderSpan> {
        let mut spans = Vec::new();
        while !self.eof() {
            match self.current() {
                '\'' => self.skip_quoted('\'', self.after_escape_prefix()),
                '"' => self.skip_quoted('"', false),
                '-' if self.peek(1) == '-' => self.skip_line_comment(),
                '/' if self.peek(1) == '*' => self.skip_block_comment(),
                '$' => self.skip_dollar_quoted(),
                ':' if self.peek(1) == ':' => self.jump(2),
                ':' if is_ident_start(self.peek(1)) => spans.push(self.read_placeholder()),
                _ => self.next(),
            }
        }
        spans
    }

    fn read_placeholder(&mut self) -> PlaceholderSpan {
        let pivot = self.position;
        self.next();
        while !self.eof() && is_ident_char(self.current()) {
            self.next();
        }
        let start = self.byte_offset(pivot);
        let end = self.byte_offset(self.position);
        let name = self.text_v[pivot + 1..self.position].iter().map(|(_, c)| *c).collect();
        PlaceholderSpan { name, start, end }
    }

    /// True when the quote under the cursor opens an `E'...'` string.
    fn after_escape_prefix(&self) -> bool {
        let Some(prefix) = self.position.checked_sub(1) else {
            return false;
        };
        let is_e = matches!(self.text_v[prefix].1, 'E' | 'e');
        let standalone = prefix == 0 || !is_ident_char(self.text_v[prefix - 1].1);
        is_e && standalone
    }

    /// Quote characters are escaped by doubling them, as SQL does. Escape
    /// strings also accept a backslash before any character.
    fn skip_quoted(&mut self, quote: char, backslash_escapes: bool) {
        self.next();
        while !self.eof() {
            if backslash_escapes && self.current() == '\\' {
                self.jump(2);
                continue;
            }
            if self.current() == quote {
                if self.peek(1) == quote {
                    self.jump(2);
                    continue;
                }
                self.next();
                return;
            }
            self.next();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.eof() && self.current() != '\n' {
            self.next();
        }
    }

    fn skip_block_comment(&mut self) {
        self.jump(2);
        while !self.eof() {
            if self.current() == '*' && self.peek(1) == '/' {
                self.jump(2);
                return;
            }
            self.next();
        }
    }

    /// `$$ ... $$` or `$tag$ ... $tag$`. A `$` that does not open a tag
    /// (for example a positional `$1`) is passed over.
    fn skip_dollar_quoted(&mut self) {
        let pivot = self.position;
        let mut cursor = pivot + 1;
        while cursor < self.length {
            let ch = self.text_v[cursor].1;
            let valid = if cursor == pivot + 1 { is_ident_start(ch) } else { is_ident_char(ch) };
            if !valid {
                break;
            }
            cursor += 1;
        }
        if cursor >= self.length || self.text_v[cursor].1 != '$' {
            self.next();
            return;
        }

        let tag: Vec<char> = self.text_v[pivot..=cursor].iter().map(|(_, c)| *c).collect();
        self.position = cursor + 1;
        while !self.eof() {
            if self.matches_ahead(&tag) {
                self.jump(tag.len());
                return;
            }
            self.next();
        }
    }

    fn matches_ahead(&self, word: &[char]) -> bool {
        word.iter().enumerate().all(|(i, c)| self.peek(i) == *c)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
