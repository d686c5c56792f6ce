use std::collections::HashMap;

use tracing::trace;

use super::Block;

/// Lookup from block id to block, built once per document render.
#[derive(Debug, Default)]
pub struct BlockIndex {
    blocks: HashMap<String, Block>,
}

impl BlockIndex {
    /// Index a flat block list. Later duplicates overwrite earlier ones.
    pub fn build(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            blocks: blocks
                .into_iter()
                .map(|block| (block.id.clone(), block))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// The page block of a document shares the document id.
    pub fn root(&self, document_id: &str) -> Option<&Block> {
        self.blocks.get(document_id)
    }

    /// Resolved children of `block` in document order. Dangling ids are skipped.
    pub fn children<'a>(&'a self, block: &'a Block) -> impl Iterator<Item = &'a Block> + 'a {
        block.children.iter().filter_map(move |id| {
            let child = self.blocks.get(id);
            if child.is_none() {
                trace!(parent = %block.id, child = %id, "skip unresolved child");
            }
            child
        })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
