//! Tree Invariant Tests
//!
//! Drives long mixed sequences of point mutations and reconciliations and
//! checks after every step that the stored records still form one consistent
//! tree per document.

#[cfg(test)]
mod tree_invariant_tests {
    use anyhow::Result;
    use docnode_core::db::{MemoryStore, NodeStore};
    use docnode_core::models::{DocumentTree, PageTreeEntry};
    use docnode_core::operations::ConflictRetryQueue;
    use docnode_core::services::NodeService;
    use std::sync::Arc;

    /// Small deterministic generator so failures are reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next_u64(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next_u64() % n as u64) as usize
        }
    }

    async fn page_ids(store: &MemoryStore, document_id: &str) -> Result<Vec<String>> {
        let mut ids: Vec<String> = store
            .get_nodes_by_document(document_id)
            .await?
            .into_iter()
            .filter(|n| n.id != document_id)
            .map(|n| n.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn assert_consistent(service: &NodeService, store: &MemoryStore, step: usize) -> Result<()> {
        let report = service.verify_document_tree("D1").await?;
        assert!(
            report.is_consistent(),
            "step {}: {:?}",
            step,
            report.violations
        );

        let tree = service.get_document_tree("D1").await?;
        assert_eq!(
            tree.page_count(),
            page_ids(store, "D1").await?.len(),
            "step {}: every record must appear in the view",
            step
        );
        Ok(())
    }

    /// Move the last top-level page under the first one
    fn nest_last_page(tree: &DocumentTree) -> Option<Vec<PageTreeEntry>> {
        if tree.pages.len() < 2 {
            return None;
        }
        let mut pages = tree.pages.clone();
        let moved = pages.pop()?;
        pages[0].children.push(moved);
        Some(pages)
    }

    #[tokio::test]
    async fn test_random_mutation_sequence_keeps_invariants() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let service = NodeService::new(store.clone());
        service.register_document_node("D1").await?;

        let mut rng = Lcg(0x5eed);
        let mut next_page = 0usize;

        for step in 0..200 {
            let existing = page_ids(&store, "D1").await?;
            let new_id = format!("P{}", next_page);

            match rng.below(6) {
                0 => {
                    service.insert_first_in_document("D1", &new_id).await?;
                    next_page += 1;
                }
                1 if !existing.is_empty() => {
                    let target = &existing[rng.below(existing.len())];
                    service.insert_first_child(target, "D1", &new_id).await?;
                    next_page += 1;
                }
                2 if !existing.is_empty() => {
                    let target = &existing[rng.below(existing.len())];
                    service.append_next_sibling(target, "D1", &new_id).await?;
                    next_page += 1;
                }
                3 if existing.len() > 4 => {
                    let target = &existing[rng.below(existing.len())];
                    service.remove_subtree(target).await?;
                }
                4 => {
                    let tree = service.get_document_tree("D1").await?;
                    service.update_document_tree(&tree.into_update()).await?;
                }
                5 => {
                    let tree = service.get_document_tree("D1").await?;
                    if let Some(pages) = nest_last_page(&tree) {
                        let mut update = tree.into_update();
                        update.pages = pages;
                        service.update_document_tree(&update).await?;
                    }
                }
                _ => {
                    service.insert_first_in_document("D1", &new_id).await?;
                    next_page += 1;
                }
            }

            assert_consistent(&service, &store, step).await?;
        }

        assert!(next_page > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_documents_stay_isolated() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let service = NodeService::new(store.clone());
        service.register_document_node("D1").await?;
        service.register_document_node("D2").await?;

        service.insert_first_in_document("D1", "P1").await?;
        service.insert_first_in_document("D2", "Q1").await?;
        service.insert_first_child("Q1", "D2", "Q2").await?;

        let tree = service.get_document_tree("D2").await?;
        service.update_document_tree(&tree.into_update()).await?;

        assert_eq!(page_ids(&store, "D1").await?, vec!["P1".to_string()]);
        assert_eq!(
            page_ids(&store, "D2").await?,
            vec!["Q1".to_string(), "Q2".to_string()]
        );
        assert_eq!(store.get_node("P1").await?.unwrap().version, 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_with_retry_lose_nothing() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(NodeService::new(store.clone()));
        service.register_document_node("D1").await?;
        let queue = Arc::new(ConflictRetryQueue::new(service.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .insert_first_in_document("D1", &format!("P{}", i), 20)
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let root = store.get_node("D1").await?.unwrap();
        assert_eq!(root.children.len(), 8);
        assert_eq!(root.version, 9);

        let report = service.verify_document_tree("D1").await?;
        assert!(report.is_consistent(), "{:?}", report.violations);
        Ok(())
    }
}
