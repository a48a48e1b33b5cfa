//! Property tests for ordering and cleanup under arbitrary demand.

use proptest::prelude::*;
use spillway_codec::serializers;
use spillway_core::flow::{IterPublisher, Publisher, UNBOUNDED};
use spillway_core::{buffer_to_file, DrainMode};
use spillway_testkit::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn order_survives_rollover_and_chunked_demand(
        payloads in payload_strategy(),
        rollover in rollover_strategy(),
        plan in request_plan_strategy(),
    ) {
        let dir = SpillDir::new();
        let buffered = buffer_to_file(
            IterPublisher::from_values(payloads.clone()),
            serializers::string(),
            DrainMode::Synchronous,
            rollover.apply(dir.options()),
        )
        .unwrap();

        let subscriber = TestSubscriber::with_initial_request(0).shared();
        buffered.subscribe(subscriber.clone());

        let mut granted = 0usize;
        for n in plan {
            subscriber.request(n).unwrap();
            granted += usize::try_from(n).unwrap();
            let expected = granted.min(payloads.len());
            prop_assert_eq!(&subscriber.values()[..], &payloads[..expected]);
        }

        subscriber.request(UNBOUNDED).unwrap();
        prop_assert_eq!(subscriber.values(), payloads);
        subscriber.assert_completed();
        dir.assert_empty();
    }

    #[test]
    fn cancel_at_any_point_leaves_no_files(
        count in 0usize..200,
        every in 1u64..20,
        taken in 0i64..50,
    ) {
        let dir = SpillDir::new();
        let buffered = buffer_to_file(
            IterPublisher::range(0, count),
            serializers::integer(),
            DrainMode::Synchronous,
            dir.options().rollover_every(every),
        )
        .unwrap();

        let subscriber = TestSubscriber::with_initial_request(taken).shared();
        buffered.subscribe(subscriber.clone());
        subscriber.cancel();

        let delivered = usize::try_from(taken).unwrap().min(count);
        prop_assert_eq!(subscriber.value_count(), delivered);
        dir.assert_empty();
    }
}
