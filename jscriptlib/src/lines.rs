//! Maps JSON value paths (`functions[0].body[2].let.name`) to source lines.
//!
//! The scanner runs after `serde_json` has accepted the document, so it only
//! tracks structure and never reports errors of its own.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lines: HashMap<String, usize>,
}

impl LineIndex {
    pub fn build(source: &str) -> Self {
        let mut scanner = Scanner::new(source);
        scanner.skip_ws();
        scanner.value(String::new());
        Self {
            lines: scanner.lines,
        }
    }

    /// Line of `path`, falling back to the closest indexed ancestor.
    pub fn line_of(&self, path: &str) -> usize {
        let mut current = path;
        loop {
            if let Some(line) = self.lines.get(current) {
                return *line;
            }
            if current.is_empty() {
                return 1;
            }
            current = parent_path(current);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn child_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub fn child_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn parent_path(path: &str) -> &str {
    if path.ends_with(']') {
        if let Some(open) = path.rfind('[') {
            return &path[..open];
        }
    }
    match path.rfind('.') {
        Some(dot) => &path[..dot],
        None => "",
    }
}

struct Scanner {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    lines: HashMap<String, usize>,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            lines: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn value(&mut self, path: String) {
        self.lines.entry(path.clone()).or_insert(self.line);
        match self.peek() {
            Some('{') => self.object(path),
            Some('[') => self.array(path),
            Some('"') => {
                self.string();
            }
            Some(_) => self.scalar(),
            None => {}
        }
    }

    fn object(&mut self, path: String) {
        self.bump();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return;
                }
                Some('"') => {}
                Some(_) => {
                    // Stray separator; keep scanning.
                    self.bump();
                    continue;
                }
                None => return,
            }
            let key_line = self.line;
            let key = self.string();
            let member = child_key(&path, &key);
            self.lines.insert(member.clone(), key_line);
            self.skip_ws();
            if self.peek() == Some(':') {
                self.bump();
            }
            self.skip_ws();
            self.value(member);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            }
        }
    }

    fn array(&mut self, path: String) {
        self.bump();
        let mut index = 0;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return;
                }
                Some(',') => {
                    self.bump();
                    continue;
                }
                None => return,
                Some(_) => {}
            }
            self.value(child_index(&path, index));
            index += 1;
        }
    }

    fn string(&mut self) -> String {
        let mut out = String::new();
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        out.push('\\');
                        out.push(escaped);
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }

    fn scalar(&mut self) {
        let start = self.idx;
        while let Some(c) = self.peek() {
            if c == ',' || c == '}' || c == ']' || c.is_whitespace() {
                break;
            }
            self.bump();
        }
        if self.idx == start {
            self.bump();
        }
    }
}
