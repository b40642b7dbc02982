use kmeans_par::cluster::distance::closest;
use kmeans_par::cluster::{Normalizer, Recluster, SumSqrTask};
use kmeans_par::task::MapReduce;
use kmeans_par::{Clustering, ColumnFrame, Kmeans};
use proptest::prelude::*;
use rand::prelude::*;

fn maybe_missing() -> impl Strategy<Value = f64> {
    prop_oneof![9 => -100.0f64..100.0, 1 => Just(f64::NAN)]
}

proptest! {
    #[test]
    fn prop_kmeans_all_assigned(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 2..20),
        k in 2usize..5
    ) {
        // Skip if k > n
        if k <= data.len() {
            let model = Kmeans::new(k).with_seed(42);
            let labels = model.fit_predict(&data).unwrap();

            prop_assert_eq!(labels.len(), data.len());
            for &l in &labels {
                prop_assert!(l < k);
            }
        }
    }

    #[test]
    fn prop_distance_non_negative_and_in_range(
        centroids in prop::collection::vec(prop::collection::vec(-50.0f64..50.0, 4), 1..8),
        point in prop::collection::vec(maybe_missing(), 4),
    ) {
        let cd = closest(&centroids, &point);
        prop_assert!(cd.dist >= 0.0);
        match cd.cluster {
            Some(c) => prop_assert!(c < centroids.len()),
            None => prop_assert!(point.iter().all(|x| x.is_nan())),
        }
    }

    #[test]
    fn prop_normalizer_round_trip(
        x in prop::collection::vec(-1.0e6f64..1.0e6, 3),
        means in prop::collection::vec(-1.0e3f64..1.0e3, 3),
        sigmas in prop::collection::vec(prop_oneof![Just(0.0), Just(1e-7), 1e-3f64..1.0e3], 3),
    ) {
        let norm = Normalizer::new(means, Some(sigmas));
        let back = norm.denormalize(&norm.normalize(&x));
        for (a, b) in x.iter().zip(&back) {
            prop_assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "{} vs {}", a, b);
        }
    }

    #[test]
    fn prop_sumsqr_independent_of_split(
        values in prop::collection::vec(-100.0f64..100.0, 2..60),
        split in any::<prop::sample::Index>(),
    ) {
        let rows: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
        let frame = ColumnFrame::from_rows(&rows).unwrap();
        let norm = Normalizer::from_frame(&frame, false);
        let centroids = vec![vec![-20.0], vec![30.0]];
        let task = SumSqrTask::new(&centroids, &norm);

        let at = split.index(rows.len());
        let p1 = task.map(&frame, 0..at);
        let p2 = task.map(&frame, at..rows.len());
        let expected: f64 = rows.iter().map(|r| closest(&centroids, r).dist).sum();
        for total in [task.reduce(p1, p2).sqr, task.reduce(p2, p1).sqr] {
            prop_assert!((total - expected).abs() <= 1e-9 * expected.max(1.0));
        }
    }

    #[test]
    fn prop_furthest_recluster_is_deterministic(
        pool in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..30),
        k in 2usize..6,
        s1 in any::<u64>(),
        s2 in any::<u64>(),
    ) {
        let a = Recluster::Furthest.select(&pool, k, &mut StdRng::seed_from_u64(s1)).unwrap();
        let b = Recluster::Furthest.select(&pool, k, &mut StdRng::seed_from_u64(s2)).unwrap();
        prop_assert_eq!(a.len(), k);
        prop_assert_eq!(a, b);
    }
}
