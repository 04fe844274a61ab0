//! Concurrency Tests
//!
//! Encode and decode calls share no state: many of them can run at once on
//! a multi-threaded runtime and each sees only its own referent IDs and
//! declared sizes.

mod common;

use std::sync::Arc;

use futures::future::join_all;

use common::*;
use msrpc_ndr::{decode, encode, Bytes, NdrContext, NdrError, UniquePtr, FIRST_REFERENT_ID};

fn nested(i: u32) -> Record {
    let mut value = record(i, Some(&format!("parent-{i}")));
    value.child = UniquePtr::new(record(i + 1, Some(&format!("child-{i}"))));
    value
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_independent_calls() {
    init_logging();

    const NUM_CALLS: u32 = 64;

    let handles = (0..NUM_CALLS).map(|i| {
        tokio::spawn(async move {
            let ctx = if i % 2 == 0 { NdrContext::new() } else { NdrContext::ndr64() };
            let value = nested(i);
            let bytes = encode(&value, ctx)?;
            let decoded: Record = decode(bytes.clone(), ctx)?;
            Ok::<_, NdrError>((i, value, decoded, bytes))
        })
    });

    let results = join_all(handles).await;
    assert_eq!(results.len(), NUM_CALLS as usize);

    for result in results {
        let (i, value, decoded, bytes) = result.expect("task panicked").expect("codec failed");
        assert_eq!(decoded, value);
        if i % 2 == 0 {
            // every call numbers its referents from the start
            assert_eq!(&bytes[24..28], &(FIRST_REFERENT_ID as u32).to_le_bytes());
        } else {
            assert_eq!(&bytes[24..32], &FIRST_REFERENT_ID.to_le_bytes());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_input_buffer() {
    init_logging();

    let expected = Arc::new(nested(7));
    let input: Bytes = encode(expected.as_ref(), NdrContext::new()).unwrap();

    let handles = (0..32).map(|_| {
        let input = input.clone();
        let expected = expected.clone();
        tokio::spawn(async move {
            let decoded: Record = decode(input, NdrContext::new())?;
            assert_eq!(&decoded, expected.as_ref());
            Ok::<_, NdrError>(())
        })
    });

    for result in join_all(handles).await {
        result.expect("task panicked").expect("codec failed");
    }
}
