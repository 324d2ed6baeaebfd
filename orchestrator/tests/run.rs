use orchestrator::{ModelConfig, OrchestratorError, RunContext};

const CONFIG: &str = r#"{
    "training": {
        "topology": { "inputs": 2, "hidden": [{ "nodes": 3, "act_fn": "tanh" }], "outputs": 1 },
        "learning_rate": 0.05,
        "propagation": "R",
        "max_iterations": 6,
        "bagging_count": 2,
        "sample_rate": 0.8,
        "cross_validation_rate": 0.2,
        "workers_per_replicate": 3,
        "seed": 17
    },
    "data": {
        "delimiter": ",",
        "columns": ["height", "weight", "class"],
        "target_column": 2,
        "pos_tags": ["tall"],
        "neg_tags": ["short"]
    },
    "pools": { "load_workers": 2, "column_workers": 2, "batch_size": 16, "queue_capacity": 8 }
}"#;

fn lines() -> Vec<String> {
    (0..80)
        .map(|i| {
            let height = 150 + i;
            let class = if height > 190 { "tall" } else { "short" };
            format!("{height},{},{class}", 40 + i / 2)
        })
        .collect()
}

#[test]
fn a_run_trains_and_scores_every_candidate_column() {
    let config = ModelConfig::from_json(CONFIG).unwrap();
    let report = RunContext::new(config).unwrap().run(lines()).unwrap();

    assert_eq!(report.stats.len(), 2);
    assert_eq!(report.stats[0].count, 80);
    assert!((report.stats[0].mean - 189.5).abs() < 1e-9);

    assert_eq!(report.models.len(), 2);
    for model in &report.models {
        assert_eq!(model.best_weights.len(), 13);
        assert_eq!(model.iterations, 6);
    }

    assert_eq!(report.scores.len(), 2);
    let bins = &report.scores[0].bins;
    assert_eq!(bins.len(), 80);
    assert!(bins.iter().all(|b| (0. ..=1.).contains(&b.mean_score)));
}

#[test]
fn a_data_layout_without_negative_tags_is_rejected_up_front() {
    let json = CONFIG.replace(r#""neg_tags": ["short"]"#, r#""neg_tags": []"#);
    let config: ModelConfig = serde_json::from_str(&json).unwrap();

    let err = RunContext::new(config).err().unwrap();
    assert!(matches!(err, OrchestratorError::Pipeline(_)));
}
