use serde::{Deserialize, Serialize};

use crate::cst::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// One analysis pass over one file. References and definitions are stamped
/// with the generation that produced them so a later pass can replace them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub source: SourceId,
    pub span: SourceSpan,
}

impl Location {
    pub fn new(source: SourceId, span: SourceSpan) -> Self {
        Self { source, span }
    }

    pub fn contains(&self, source: SourceId, line: usize, column: usize) -> bool {
        self.source == source && self.span.contains(line, column)
    }
}
