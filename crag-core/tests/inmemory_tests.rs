//! Property tests for in-memory vector store query ordering.

use std::collections::HashMap;

use crag_core::{InMemoryVectorStore, Metric, VectorRecord, VectorStore};
use proptest::prelude::*;

/// A non-zero L2-normalized vector of the given dimension.
fn arb_normalized_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero vector", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        v.iter_mut().for_each(|x| *x /= norm);
        Some(v)
    })
}

fn arb_record(dim: usize) -> impl Strategy<Value = VectorRecord> {
    ("chunk_[0-9]{1,3}", "[a-z ]{5,30}", arb_normalized_vector(dim)).prop_map(
        |(id, text, values)| VectorRecord {
            id,
            values,
            metadata: HashMap::from([("text".to_string(), text)]),
        },
    )
}

fn arb_metric() -> impl Strategy<Value = Metric> {
    prop_oneof![Just(Metric::Cosine), Just(Metric::Euclidean), Just(Metric::DotProduct)]
}

/// Query results come back by descending score, never exceed `top_k` or the
/// number of stored records, and carry the stored text.
mod prop_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_vector(DIM),
            top_k in 1usize..25,
            metric in arb_metric(),
        ) {
            let mut deduped: HashMap<String, VectorRecord> = HashMap::new();
            for record in &records {
                deduped.entry(record.id.clone()).or_insert_with(|| record.clone());
            }
            let unique: Vec<VectorRecord> = deduped.into_values().collect();
            let stored = unique.len();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_index("test", DIM, metric).await.unwrap();
                store.upsert("test", &unique).await.unwrap();
                store.query("test", &query, top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(stored));

            for pair in results.windows(2) {
                prop_assert!(
                    pair[0].score >= pair[1].score,
                    "results not descending: {} < {}",
                    pair[0].score,
                    pair[1].score
                );
            }

            for m in &results {
                prop_assert!(m.text().is_some());
            }
        }

        #[test]
        fn stored_vector_is_its_own_best_cosine_match(
            records in proptest::collection::vec(arb_record(DIM), 1..10),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut deduped: HashMap<String, VectorRecord> = HashMap::new();
            for record in &records {
                deduped.entry(record.id.clone()).or_insert_with(|| record.clone());
            }
            let unique: Vec<VectorRecord> = deduped.into_values().collect();
            let target = unique[pick.index(unique.len())].clone();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_index("test", DIM, Metric::Cosine).await.unwrap();
                store.upsert("test", &unique).await.unwrap();
                store.query("test", &target.values, 1).await.unwrap()
            });

            prop_assert_eq!(results.len(), 1);
            prop_assert!((results[0].score - 1.0).abs() < 1e-4);
        }
    }
}
