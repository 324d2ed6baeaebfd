use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use comms::specs::{
    machine_learning::TopologySpec,
    pipeline::{DataSpec, PoolSpec},
};
use machine_learning::{dataset::Dataset, model::TrainedModel};
use pipeline::{PipelineErr, Supervisor, TrainErr, Trainer};

fn data() -> DataSpec {
    serde_json::from_str(
        r#"{
            "columns": ["a", "b", "label", "w"],
            "target_column": 2,
            "pos_tags": ["Y"],
            "neg_tags": ["N"],
            "weight_column": 3
        }"#,
    )
    .unwrap()
}

fn pools() -> PoolSpec {
    let n = |n| NonZeroUsize::new(n).unwrap();
    PoolSpec {
        load_workers: n(3),
        column_workers: n(2),
        batch_size: n(2),
        queue_capacity: n(4),
    }
}

fn lines() -> Vec<String> {
    [
        "1|10|Y|1",
        "2|20|N|1",
        "bad line",
        "3||N|2",
        "4|x|Y|1",
        "5|50|?|1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn topology() -> TopologySpec {
    TopologySpec {
        inputs: 2,
        hidden: Vec::new(),
        outputs: 1,
        output_act_fn: Default::default(),
    }
}

/// Reports the size of its training set as the amount of iterations.
struct CountingTrainer;

impl Trainer for CountingTrainer {
    async fn train(
        &self,
        replicate: usize,
        dataset: Arc<Dataset>,
    ) -> Result<TrainedModel, TrainErr> {
        Ok(TrainedModel {
            replicate,
            topology: topology(),
            weights: vec![0.; 3],
            best_weights: vec![0.; 3],
            train_error: 0.,
            validation_error: 0.,
            iterations: dataset.len() as u32,
        })
    }
}

struct FailingTrainer;

impl Trainer for FailingTrainer {
    async fn train(&self, _: usize, _: Arc<Dataset>) -> Result<TrainedModel, TrainErr> {
        Err("diverged".into())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_skip_malformed_and_untagged_records() {
    let supervisor = Supervisor::new(data(), pools(), Some(1)).unwrap();
    let stats = supervisor.run_stats(lines()).await.unwrap();

    assert_eq!(stats.len(), 2);

    let a = &stats[0];
    assert_eq!((a.column, a.name.as_str()), (0, "a"));
    assert_eq!((a.count, a.missing), (4, 0));
    assert!((a.mean - 2.5).abs() < 1e-9);
    assert!((a.std_dev - 1.25f64.sqrt()).abs() < 1e-9);
    assert_eq!((a.min, a.max), (1., 4.));

    let b = &stats[1];
    assert_eq!((b.column, b.name.as_str()), (1, "b"));
    assert_eq!((b.count, b.missing), (2, 2));
    assert!((b.mean - 15.).abs() < 1e-9);
    assert!((b.std_dev - 5.).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread")]
async fn no_lines_still_completes_every_column() {
    let supervisor = Supervisor::new(data(), pools(), None).unwrap();
    let stats = supervisor.run_stats(Vec::new()).await.unwrap();

    assert_eq!(stats.iter().map(|s| s.column).collect::<Vec<_>>(), [0, 1]);
    assert!(stats.iter().all(|s| s.count == 0 && s.missing == 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn every_replicate_trains_on_the_whole_training_set() {
    let supervisor = Supervisor::new(data(), pools(), Some(7)).unwrap();
    let stats = supervisor.run_stats(lines()).await.unwrap();

    let models = supervisor
        .run_training(
            lines(),
            &stats,
            Arc::new(CountingTrainer),
            NonZeroUsize::new(3).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(models.iter().map(|m| m.replicate).collect::<Vec<_>>(), [0, 1, 2]);
    assert!(models.iter().all(|m| m.iterations == 4));
}

#[tokio::test(flavor = "multi_thread")]
async fn trainer_failure_halts_the_pipeline() {
    let supervisor = Supervisor::new(data(), pools(), Some(7)).unwrap();
    let stats = supervisor.run_stats(lines()).await.unwrap();

    let err = supervisor
        .run_training(
            lines(),
            &stats,
            Arc::new(FailingTrainer),
            NonZeroUsize::new(2).unwrap(),
        )
        .await
        .unwrap_err();

    let PipelineErr::StageFailure { stage, detail } = err else {
        panic!("expected a stage failure, got {err}");
    };
    assert_eq!(stage, "train");
    assert!(detail.contains("diverged"));
}

#[tokio::test(flavor = "multi_thread")]
async fn post_train_bins_scores_by_raw_value() {
    let supervisor = Supervisor::new(data(), pools(), None).unwrap();
    let stats = supervisor.run_stats(lines()).await.unwrap();

    let models = supervisor
        .run_training(
            lines(),
            &stats,
            Arc::new(CountingTrainer),
            NonZeroUsize::new(2).unwrap(),
        )
        .await
        .unwrap();

    let scores = supervisor
        .run_post_train(lines(), &stats, &models)
        .await
        .unwrap();

    assert_eq!(scores.len(), 2);

    let values: Vec<_> = scores[0].bins.iter().map(|b| b.value.as_str()).collect();
    assert_eq!(values, ["1", "2", "3", "4", "5"]);

    let values: Vec<_> = scores[1].bins.iter().map(|b| b.value.as_str()).collect();
    assert_eq!(values, ["", "10", "20", "50", "x"]);

    // Zero weights make every record score 0.5.
    for bin in scores.iter().flat_map(|s| &s.bins) {
        assert_eq!(bin.count, 1);
        assert!((bin.mean_score - 0.5).abs() < 1e-6);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn models_must_match_the_candidate_columns() {
    let supervisor = Supervisor::new(data(), pools(), None).unwrap();
    let stats = supervisor.run_stats(lines()).await.unwrap();

    let model = TrainedModel {
        replicate: 0,
        topology: TopologySpec {
            inputs: 3,
            ..topology()
        },
        weights: vec![0.; 4],
        best_weights: vec![0.; 4],
        train_error: 0.,
        validation_error: 0.,
        iterations: 1,
    };

    let err = supervisor
        .run_post_train(lines(), &stats, &[model])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineErr::InvalidConfig(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_follow_the_candidate_order() {
    let mut spec = data();
    spec.candidate_columns = Some(vec![1, 0]);

    let supervisor = Supervisor::new(spec, pools(), None).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(5), supervisor.run_stats(lines()))
        .await
        .expect("stats never completed")
        .unwrap();

    assert_eq!(stats.iter().map(|s| s.column).collect::<Vec<_>>(), [0, 1]);
}

#[test]
fn inconsistent_layouts_are_rejected() {
    let mut spec = data();
    spec.target_column = 4;
    assert!(matches!(
        Supervisor::new(spec, pools(), None),
        Err(PipelineErr::InvalidConfig(_))
    ));

    let mut spec = data();
    spec.candidate_columns = Some(vec![0, 2]);
    assert!(matches!(
        Supervisor::new(spec, pools(), None),
        Err(PipelineErr::InvalidConfig(_))
    ));

    let mut spec = data();
    spec.candidate_columns = Some(vec![0, 0, 1]);
    assert!(matches!(
        Supervisor::new(spec, pools(), None),
        Err(PipelineErr::InvalidConfig(_))
    ));

    let mut spec = data();
    spec.neg_tags.clear();
    assert!(matches!(
        Supervisor::new(spec, pools(), None),
        Err(PipelineErr::InvalidConfig(_))
    ));
}
