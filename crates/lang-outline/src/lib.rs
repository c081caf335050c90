//! Declaration outline for brace and indentation languages.
//!
//! Recognises `class`/`struct`/`trait`/`interface`/`enum`, `fn`/`def`/`function`
//! and `const` declarations line by line and nests them by indentation.

pub mod parser;

use parser::{DeclKind, OutlineParser};
use stubdex_api::{FileContent, FileKind, IndexDomain, StubTree};
use stubdex_plugin::{BuildError, StubBuilder};

pub const OUTLINE_KIND: FileKind = FileKind::from_static("outline");
pub const OUTLINE_STUB_VERSION: u32 = 1;

pub const CLASS_NAMES: IndexDomain = IndexDomain::from_static("class.names");
pub const FN_NAMES: IndexDomain = IndexDomain::from_static("fn.names");
pub const CONST_NAMES: IndexDomain = IndexDomain::from_static("const.names");

/// Larger files get no stub.
pub const MAX_CONTENT_LEN: usize = 2 * 1024 * 1024;

const EXTENSIONS: &[&str] = &["outline", "rs", "py", "js", "ts", "java", "kt", "go", "swift"];

pub struct OutlineStubBuilder {
    parser: OutlineParser,
}

impl OutlineStubBuilder {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            parser: OutlineParser::new()?,
        })
    }

    fn domain_of(kind: DeclKind) -> IndexDomain {
        match kind {
            DeclKind::Class => CLASS_NAMES,
            DeclKind::Function => FN_NAMES,
            DeclKind::Const => CONST_NAMES,
        }
    }
}

impl StubBuilder for OutlineStubBuilder {
    fn kind(&self) -> FileKind {
        OUTLINE_KIND
    }

    fn stub_version(&self) -> u32 {
        OUTLINE_STUB_VERSION
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn domains(&self) -> Vec<IndexDomain> {
        vec![CLASS_NAMES, FN_NAMES, CONST_NAMES]
    }

    fn accepts(&self, content: &FileContent) -> bool {
        content.len() <= MAX_CONTENT_LEN
    }

    fn build(&self, content: &FileContent) -> Result<Option<StubTree>, BuildError> {
        let text = content
            .text()
            .ok_or_else(|| BuildError::Malformed("content is not UTF-8".to_string()))?;
        if text.contains('\0') {
            return Err(BuildError::Malformed("content contains NUL bytes".to_string()));
        }

        let decls = self.parser.parse(text);
        if decls.is_empty() {
            return Ok(None);
        }

        let mut tree = StubTree::new("file");
        // Open containers as (indent, id); the innermost is last.
        let mut scopes: Vec<(usize, stubdex_api::StubId)> = Vec::new();
        for decl in decls {
            while scopes.last().is_some_and(|(indent, _)| *indent >= decl.indent) {
                scopes.pop();
            }
            let parent = scopes.last().map_or(tree.root(), |(_, id)| *id);
            let id = tree.add_child(parent, decl.kind.as_str(), Some(decl.name.clone()));
            tree.index(id, Self::domain_of(decl.kind), decl.name);
            if decl.kind == DeclKind::Class {
                scopes.push((decl.indent, id));
            }
        }
        Ok(Some(tree))
    }
}
