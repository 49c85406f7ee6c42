//! Mapping file grammar and the ordered directive table.
//!
//! One directive per line:
//!
//! ```text
//! r# MAIN.bTrig  : DI_Start [1]     PLC symbol -> robot signal
//! w# MAIN.fSpeed : AO_Speed [32]    robot signal -> PLC symbol
//! ```
//!
//! Blank lines are ignored. Lines that do not match the grammar are skipped
//! with a warning and never abort parsing. The table keeps file order, which
//! is the execution order inside every cycle.

use crate::codec::Width;
use crate::config::ConfigError;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(r|w)#\s*([^:]+?)\s*:\s*([^\[]+?)\s*\[\s*(\d+)\s*\]$")
        .expect("directive grammar is a valid regex")
});

/// Transfer direction of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `r#`: PLC symbol is copied onto the robot signal.
    SourceToTarget,
    /// `w#`: robot signal is copied into the PLC symbol.
    TargetToSource,
}

impl Direction {
    /// Short dashboard tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::SourceToTarget => "ADS->ROB",
            Self::TargetToSource => "ROB->ADS",
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "r" => Some(Self::SourceToTarget),
            "w" => Some(Self::TargetToSource),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parsed mapping entry.
///
/// `source_path` and `target_signal` are trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingDirective {
    pub direction: Direction,
    pub source_path: String,
    pub target_signal: String,
    pub width: Width,
}

impl MappingDirective {
    /// Parse a single line. Returns `None` for anything outside the grammar.
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = DIRECTIVE_RE.captures(line.trim())?;
        let direction = Direction::from_marker(&caps[1])?;
        let source_path = caps[2].trim();
        let target_signal = caps[3].trim();
        if source_path.is_empty() || target_signal.is_empty() {
            return None;
        }
        let bits: u32 = caps[4].parse().ok()?;

        Some(Self {
            direction,
            source_path: source_path.to_string(),
            target_signal: target_signal.to_string(),
            width: Width::from_bits(bits),
        })
    }
}

impl fmt::Display for MappingDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.direction {
            Direction::SourceToTarget => 'r',
            Direction::TargetToSource => 'w',
        };
        write!(
            f,
            "{marker}# {}: {}[{}]",
            self.source_path, self.target_signal, self.width
        )
    }
}

/// Ordered, immutable list of transfer directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    directives: Vec<MappingDirective>,
    skipped_lines: Vec<usize>,
}

impl MappingTable {
    /// Parse mapping text. Total: malformed lines are skipped with a warning.
    pub fn parse_str(text: &str) -> Self {
        let mut directives = Vec::new();
        let mut skipped_lines = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match MappingDirective::parse_line(line) {
                Some(directive) => {
                    debug!("Mapping line {}: {}", idx + 1, directive);
                    directives.push(directive);
                }
                None => {
                    warn!("Skipping malformed mapping line {}: {:?}", idx + 1, line.trim());
                    skipped_lines.push(idx + 1);
                }
            }
        }

        Self {
            directives,
            skipped_lines,
        }
    }

    /// Load and parse a mapping file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MappingNotFound` if the file does not exist
    /// - `ConfigError::ParseError` if it cannot be read
    /// - `ConfigError::EmptyMapping` if no line yields a directive
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::MappingNotFound(path.to_path_buf())
            } else {
                ConfigError::ParseError(format!("{}: {e}", path.display()))
            }
        })?;

        let table = Self::parse_str(&content);
        if table.is_empty() {
            return Err(ConfigError::EmptyMapping(path.to_path_buf()));
        }

        info!(
            "Loaded {} mapping directives from {} ({} skipped)",
            table.len(),
            path.display(),
            table.skipped_lines.len()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingDirective> {
        self.directives.iter()
    }

    pub fn directives(&self) -> &[MappingDirective] {
        &self.directives
    }

    /// 1-based numbers of lines that were skipped as malformed.
    pub fn skipped_lines(&self) -> &[usize] {
        &self.skipped_lines
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a MappingDirective;
    type IntoIter = std::slice::Iter<'a, MappingDirective>;

    fn into_iter(self) -> Self::IntoIter {
        self.directives.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(direction: Direction, src: &str, sig: &str, bits: u32) -> MappingDirective {
        MappingDirective {
            direction,
            source_path: src.to_string(),
            target_signal: sig.to_string(),
            width: Width::from_bits(bits),
        }
    }

    #[test]
    fn parses_read_directive_with_spaces() {
        assert_eq!(
            MappingDirective::parse_line("r# MAIN.bTrig: DI_Start[1]"),
            Some(directive(Direction::SourceToTarget, "MAIN.bTrig", "DI_Start", 1))
        );
    }

    #[test]
    fn parses_write_directive_without_spaces() {
        assert_eq!(
            MappingDirective::parse_line("w#MAIN.fSpeed:AO_Speed[32]"),
            Some(directive(Direction::TargetToSource, "MAIN.fSpeed", "AO_Speed", 32))
        );
    }

    #[test]
    fn trims_every_field() {
        let d = MappingDirective::parse_line("   r#   GVL.nCount   :   GO_Count   [ 16 ]   ")
            .expect("should parse");
        assert_eq!(d.source_path, "GVL.nCount");
        assert_eq!(d.target_signal, "GO_Count");
        assert_eq!(d.width, Width::Word);
    }

    #[test]
    fn other_width_is_real() {
        let d = MappingDirective::parse_line("w# MAIN.fPos : AI_Pos [64]").expect("should parse");
        assert_eq!(d.width, Width::Real(64));
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "garbage text",
            "x# MAIN.a: DO_1[1]",
            "R# MAIN.a: DO_1[1]",
            "r MAIN.a: DO_1[1]",
            "r# MAIN.a DO_1[1]",
            "r# MAIN.a: DO_1",
            "r# MAIN.a: DO_1[]",
            "r# MAIN.a: DO_1[x]",
            "r# MAIN.a: DO_1[1] trailing",
            "r#   : DO_1[1]",
            "r# MAIN.a:   [1]",
            "r# MAIN.a: DO_1[99999999999]",
        ] {
            assert_eq!(MappingDirective::parse_line(line), None, "line {line:?}");
        }
    }

    #[test]
    fn table_skips_blank_and_malformed_lines_in_order() {
        let text = "\
r# MAIN.bTrig: DI_Start[1]

garbage text
w#MAIN.fSpeed:AO_Speed[32]
   \t
r# MAIN.nMode: GO_Mode[8]
";
        let table = MappingTable::parse_str(text);
        assert_eq!(table.len(), 3);
        assert_eq!(table.skipped_lines(), &[3]);
        let sources: Vec<_> = table.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(sources, vec!["MAIN.bTrig", "MAIN.fSpeed", "MAIN.nMode"]);
    }

    #[test]
    fn empty_text_gives_empty_table() {
        assert!(MappingTable::parse_str("").is_empty());
        assert!(MappingTable::parse_str("garbage\nmore garbage\n").is_empty());
    }

    #[test]
    fn display_round_trips_through_parser() {
        let d = directive(Direction::TargetToSource, "MAIN.fSpeed", "AO_Speed", 32);
        assert_eq!(d.to_string(), "w# MAIN.fSpeed: AO_Speed[32]");
        assert_eq!(MappingDirective::parse_line(&d.to_string()), Some(d));
    }

    #[test]
    fn direction_tags() {
        assert_eq!(Direction::SourceToTarget.tag(), "ADS->ROB");
        assert_eq!(Direction::TargetToSource.to_string(), "ROB->ADS");
    }
}
