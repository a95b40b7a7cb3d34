use std::fs;
use std::path::Path;

use crate::GenError;

/// One cleaned input line: uppercased, comment-free, split into tokens.
#[derive(Debug, Clone)]
pub struct TokenLine {
    pub line_no: usize,
    pub tokens: Vec<String>,
}

impl TokenLine {
    pub fn parse_f64(&self, file: &str, column: usize) -> Result<f64, GenError> {
        let token = self.token(file, column)?;
        token.parse::<f64>().map_err(|_| {
            GenError::parse(
                file,
                self.line_no,
                column + 1,
                format!("expected a number, found '{token}'"),
            )
        })
    }

    pub fn parse_i32(&self, file: &str, column: usize) -> Result<i32, GenError> {
        let token = self.token(file, column)?;
        token.parse::<i32>().map_err(|_| {
            GenError::parse(
                file,
                self.line_no,
                column + 1,
                format!("expected an integer, found '{token}'"),
            )
        })
    }

    pub fn parse_usize(&self, file: &str, column: usize) -> Result<usize, GenError> {
        let token = self.token(file, column)?;
        token.parse::<usize>().map_err(|_| {
            GenError::parse(
                file,
                self.line_no,
                column + 1,
                format!("expected a count, found '{token}'"),
            )
        })
    }

    fn token(&self, file: &str, column: usize) -> Result<&str, GenError> {
        self.tokens
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| GenError::parse(file, self.line_no, column + 1, "missing field"))
    }
}

/// A tokenized input file with comments and blank lines removed.
///
/// Contents are uppercased before tokenizing so variable names and
/// distribution keywords compare case-insensitively.
#[derive(Debug, Clone)]
pub struct TokenFile {
    pub name: String,
    pub lines: Vec<TokenLine>,
}

impl TokenFile {
    pub fn load(path: &Path) -> Result<Self, GenError> {
        let raw = fs::read_to_string(path)?;
        Ok(Self::from_contents(&path.display().to_string(), &raw))
    }

    pub fn from_contents(name: &str, raw: &str) -> Self {
        let mut lines = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            let upper = line.to_uppercase();
            let trimmed = upper.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let tokens: Vec<String> = trimmed
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                continue;
            }
            lines.push(TokenLine {
                line_no: index + 1,
                tokens,
            });
        }
        TokenFile {
            name: name.to_string(),
            lines,
        }
    }
}
