//! # Link Resolver
//!
//! Read-only queries over the link graph formed by [`LinkMetadata`] on blocks.
//! Nothing here mutates pages.
//!
//! ```text
//!   Page A                      Page B
//!   ├── text                    ├── heading
//!   └── embed ──sourcePageId──▶ └── text
//!
//!   outbound_links(A) = {B}      inbound_links(B) = {A}
//!   linked_block_count(B) = 1
//! ```
//!
//! ## Dangling References
//!
//! A link whose target page (or target block) no longer exists is not an error.
//! [`resolve`] reports it as [`LinkTarget::Missing`] / [`LinkTarget::MissingBlock`]
//! so a renderer can show a "reference not found" state. Dangling links are
//! left in place: deleting a page never rewrites the blocks pointing at it.
//!
//! Pages flagged `is_deleted` count as absent.
//!
//! ## Memoization
//!
//! The free functions recompute in O(total blocks) on every call. [`LinkIndex`]
//! holds the inbound side precomputed and is tagged with the workspace version
//! it was built from, so the workspace can reuse it until the next mutation.

use crate::model::{Block, BlockId, LinkMetadata, Page, PageId};
use std::collections::{HashMap, HashSet};

/// What a link points at, right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkTarget<'a> {
    /// Link to a whole page.
    Page(&'a Page),
    /// Link to one block of a page.
    Block { page: &'a Page, block: &'a Block },
    /// The page exists but the linked block is gone.
    MissingBlock { page: &'a Page },
    /// The page is gone.
    Missing,
}

impl LinkTarget<'_> {
    pub fn is_dangling(&self) -> bool {
        matches!(self, LinkTarget::Missing | LinkTarget::MissingBlock { .. })
    }
}

/// A link whose target can no longer be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    pub page: PageId,
    pub block: BlockId,
    pub target_page: PageId,
    pub target_block: Option<BlockId>,
}

fn find_page<'a>(pages: &'a [Page], id: &PageId) -> Option<&'a Page> {
    pages.iter().find(|p| &p.id == id && !p.is_deleted)
}

pub fn resolve<'a>(pages: &'a [Page], link: &LinkMetadata) -> LinkTarget<'a> {
    let Some(page) = find_page(pages, &link.source_page_id) else {
        return LinkTarget::Missing;
    };
    match &link.source_block_id {
        None => LinkTarget::Page(page),
        Some(block_id) => match page.block(block_id) {
            Some(block) => LinkTarget::Block { page, block },
            None => LinkTarget::MissingBlock { page },
        },
    }
}

/// Pages referenced by any block of `page`, in order of first reference.
/// Targets that no longer exist are skipped.
pub fn outbound_links<'a>(pages: &'a [Page], page: &Page) -> Vec<&'a Page> {
    let mut seen = HashSet::new();
    page.blocks
        .iter()
        .filter_map(|b| b.link_metadata.as_ref())
        .filter(|link| seen.insert(link.source_page_id.clone()))
        .filter_map(|link| find_page(pages, &link.source_page_id))
        .collect()
}

/// Other pages holding at least one block that links to `target`.
pub fn inbound_links<'a>(pages: &'a [Page], target: &PageId) -> Vec<&'a Page> {
    pages
        .iter()
        .filter(|p| &p.id != target && !p.is_deleted)
        .filter(|p| p.blocks.iter().any(|b| b.links_to(target)))
        .collect()
}

/// Blocks in other pages that link to `target`.
pub fn linked_block_count(pages: &[Page], target: &PageId) -> usize {
    pages
        .iter()
        .filter(|p| &p.id != target && !p.is_deleted)
        .flat_map(|p| p.blocks.iter())
        .filter(|b| b.links_to(target))
        .count()
}

pub fn dangling_links(pages: &[Page]) -> Vec<DanglingLink> {
    pages
        .iter()
        .filter(|p| !p.is_deleted)
        .flat_map(|page| page.blocks.iter().map(move |block| (page, block)))
        .filter_map(|(page, block)| {
            let link = block.link_metadata.as_ref()?;
            resolve(pages, link).is_dangling().then(|| DanglingLink {
                page: page.id.clone(),
                block: block.id.clone(),
                target_page: link.source_page_id.clone(),
                target_block: link.source_block_id.clone(),
            })
        })
        .collect()
}

/// Inbound link table built once per workspace version.
#[derive(Debug, Clone)]
pub struct LinkIndex {
    version: u64,
    // target page -> (linking page, number of linking blocks), in page order
    inbound: HashMap<PageId, Vec<(PageId, usize)>>,
}

impl LinkIndex {
    pub fn build(pages: &[Page], version: u64) -> Self {
        let mut inbound: HashMap<PageId, Vec<(PageId, usize)>> = HashMap::new();
        for page in pages.iter().filter(|p| !p.is_deleted) {
            let mut counts: Vec<(PageId, usize)> = Vec::new();
            for link in page.blocks.iter().filter_map(|b| b.link_metadata.as_ref()) {
                if link.source_page_id == page.id {
                    continue;
                }
                match counts.iter_mut().find(|(t, _)| t == &link.source_page_id) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((link.source_page_id.clone(), 1)),
                }
            }
            for (target, n) in counts {
                inbound.entry(target).or_default().push((page.id.clone(), n));
            }
        }
        Self { version, inbound }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn inbound_page_ids(&self, target: &PageId) -> Vec<PageId> {
        self.inbound
            .get(target)
            .map(|sources| sources.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn linked_block_count(&self, target: &PageId) -> usize {
        self.inbound
            .get(target)
            .map(|sources| sources.iter().map(|(_, n)| n).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::create_page;
    use crate::model::{LinkKind, LinkMetadata};

    fn link_to(target: &Page, block: Option<&str>) -> Block {
        Block::text("Ref").with_link(LinkMetadata::new(
            target.id.clone(),
            block.map(BlockId::from),
            LinkKind::Live,
        ))
    }

    fn fixture() -> Vec<Page> {
        let b = create_page("B", Some(vec![Block::text("target").with_id("t")]));
        let a = create_page(
            "A",
            Some(vec![link_to(&b, None), link_to(&b, Some("t")), Block::text("x")]),
        );
        let c = create_page("C", Some(vec![link_to(&b, None)]));
        vec![a, b, c]
    }

    #[test]
    fn inbound_and_outbound_are_mirrors() {
        let pages = fixture();
        let (a, b, c) = (&pages[0], &pages[1], &pages[2]);

        let out: Vec<_> = outbound_links(&pages, a).iter().map(|p| p.id.clone()).collect();
        assert_eq!(out, vec![b.id.clone()]);

        let inbound: Vec<_> = inbound_links(&pages, &b.id).iter().map(|p| p.id.clone()).collect();
        assert_eq!(inbound, vec![a.id.clone(), c.id.clone()]);
        assert!(inbound_links(&pages, &a.id).is_empty());
    }

    #[test]
    fn linked_block_count_counts_blocks_not_pages() {
        let pages = fixture();
        assert_eq!(linked_block_count(&pages, &pages[1].id), 3);
        assert_eq!(linked_block_count(&pages, &pages[0].id), 0);
    }

    #[test]
    fn self_links_are_not_inbound() {
        let mut page = create_page("Self", None);
        let block = link_to(&page, None);
        page.blocks.push(block);
        let pages = vec![page];

        assert!(inbound_links(&pages, &pages[0].id).is_empty());
        assert_eq!(linked_block_count(&pages, &pages[0].id), 0);
        assert_eq!(outbound_links(&pages, &pages[0]).len(), 1);
    }

    #[test]
    fn resolve_reports_each_target_state() {
        let pages = fixture();
        let a = &pages[0];
        let page_link = a.blocks[0].link_metadata.as_ref().unwrap();
        let block_link = a.blocks[1].link_metadata.as_ref().unwrap();

        assert!(matches!(resolve(&pages, page_link), LinkTarget::Page(p) if p.title == "B"));
        assert!(matches!(
            resolve(&pages, block_link),
            LinkTarget::Block { block, .. } if block.content == "target"
        ));

        let gone = LinkMetadata::new(PageId::from("gone"), None, LinkKind::Snapshot);
        assert_eq!(resolve(&pages, &gone), LinkTarget::Missing);

        let missing_block =
            LinkMetadata::new(pages[1].id.clone(), Some(BlockId::from("nope")), LinkKind::Live);
        assert!(matches!(resolve(&pages, &missing_block), LinkTarget::MissingBlock { .. }));
    }

    #[test]
    fn removing_target_leaves_dangling_links() {
        let mut pages = fixture();
        assert!(dangling_links(&pages).is_empty());

        let b = pages.remove(1);
        let dangling = dangling_links(&pages);
        assert_eq!(dangling.len(), 3);
        assert!(dangling.iter().all(|d| d.target_page == b.id));
        assert!(outbound_links(&pages, &pages[0]).is_empty());
    }

    #[test]
    fn deleted_pages_count_as_missing() {
        let mut pages = fixture();
        pages[1].is_deleted = true;
        let link = pages[0].blocks[0].link_metadata.clone().unwrap();
        assert_eq!(resolve(&pages, &link), LinkTarget::Missing);
    }

    #[test]
    fn index_agrees_with_free_functions() {
        let pages = fixture();
        let index = LinkIndex::build(&pages, 7);
        let b = &pages[1].id;

        assert_eq!(index.version(), 7);
        assert_eq!(index.linked_block_count(b), linked_block_count(&pages, b));
        let expected: Vec<_> = inbound_links(&pages, b).iter().map(|p| p.id.clone()).collect();
        assert_eq!(index.inbound_page_ids(b), expected);
    }
}
