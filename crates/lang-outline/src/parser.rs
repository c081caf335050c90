use regex::Regex;
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Function,
    Const,
}

impl DeclKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Function => "fn",
            DeclKind::Const => "const",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" | "struct" | "trait" | "interface" | "enum" => Some(DeclKind::Class),
            "fn" | "def" | "function" | "func" => Some(DeclKind::Function),
            "const" => Some(DeclKind::Const),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    pub name: SmolStr,
    /// Leading whitespace width; a tab counts as four columns.
    pub indent: usize,
    pub line: usize,
}

pub struct OutlineParser {
    decl: Regex,
}

impl OutlineParser {
    pub fn new() -> Result<Self, regex::Error> {
        let decl = Regex::new(
            r"^(?:(?:pub(?:\([a-z]+\))?|export|public|private|protected|internal|static|abstract|final|async|unsafe|data|sealed)\s+)*(class|struct|trait|interface|enum|fn|def|function|func|const)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )?;
        Ok(Self { decl })
    }

    /// Declarations in source order.
    pub fn parse(&self, text: &str) -> Vec<Decl> {
        let mut decls = Vec::new();
        for (line, raw) in text.lines().enumerate() {
            let trimmed = raw.trim_start();
            let Some(caps) = self.decl.captures(trimmed) else {
                continue;
            };
            let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(kind) = DeclKind::from_keyword(keyword.as_str()) else {
                continue;
            };
            decls.push(Decl {
                kind,
                name: SmolStr::new(name.as_str()),
                indent: indent_width(&raw[..raw.len() - trimmed.len()]),
                line: line + 1,
            });
        }
        decls
    }
}

fn indent_width(prefix: &str) -> usize {
    prefix
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers_and_keywords() {
        let parser = OutlineParser::new().unwrap();
        let decls = parser.parse(
            "pub(crate) struct Engine;\nexport function render() {}\n\tpublic static final class Inner {}\nlet x = 1;\n",
        );
        let names: Vec<(&str, DeclKind, usize)> = decls
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.indent))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Engine", DeclKind::Class, 0),
                ("render", DeclKind::Function, 0),
                ("Inner", DeclKind::Class, 4),
            ]
        );
        assert_eq!(decls[2].line, 3);
    }

    #[test]
    fn test_keyword_must_be_followed_by_a_name() {
        let parser = OutlineParser::new().unwrap();
        assert!(parser.parse("classify(x)\nfn(\ndefault = 3\n").is_empty());
    }
}
