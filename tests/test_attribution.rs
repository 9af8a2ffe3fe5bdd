//! Integration tests for the attribution engine driven by loaded models

use kolosal_scoring::explainability::{LocalExplainer, LOCAL_ACCURACY_TOLERANCE};
use kolosal_scoring::inference::{
    LoadedModel, ModelArtifact, ModelMetadata, RegressionModel, RegressionTree, TreeNode,
};
use kolosal_scoring::utils::ParallelConfig;
use ndarray::{array, Array2};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Two stumps plus an interaction tree over three features
fn tree_model() -> LoadedModel {
    let stump = |feature: usize, threshold: f64, lo: f64, hi: f64| RegressionTree {
        nodes: vec![
            TreeNode::Split { feature, threshold, left: 1, right: 2, missing_left: true },
            TreeNode::Leaf { value: lo },
            TreeNode::Leaf { value: hi },
        ],
    };
    let interaction = RegressionTree {
        nodes: vec![
            TreeNode::Split { feature: 0, threshold: 0.5, left: 1, right: 2, missing_left: false },
            TreeNode::Leaf { value: 0.0 },
            TreeNode::Split { feature: 2, threshold: 1.0, left: 3, right: 4, missing_left: true },
            TreeNode::Leaf { value: -2.0 },
            TreeNode::Leaf { value: 5.0 },
        ],
    };

    let artifact = ModelArtifact::new(
        ModelMetadata::new("trees", names(&["a", "b", "c"])),
        RegressionModel::TreeEnsemble {
            base_score: 1.5,
            trees: vec![stump(0, 0.5, -1.0, 1.0), stump(1, 2.0, 0.0, 3.0), interaction],
        },
    );
    LoadedModel::from_artifact(artifact).unwrap()
}

fn background() -> Array2<f64> {
    array![
        [0.0, 1.0, 0.0],
        [1.0, 3.0, 2.0],
        [0.2, 2.5, 1.5],
        [0.9, 0.0, 0.5],
        [0.6, 4.0, 3.0],
    ]
}

fn instances() -> Array2<f64> {
    array![
        [1.0, 3.0, 2.0],
        [0.0, 0.0, 0.0],
        [0.7, 1.0, 0.2],
        [0.3, 5.0, 4.0],
    ]
}

#[test]
fn test_tree_ensemble_local_accuracy() {
    let model = tree_model();
    let columns = names(&["a", "b", "c"]);
    let layout = model.layout_for(&columns).unwrap();

    let matrix = LocalExplainer::new(|x| model.predict_matrix(x, &layout), background())
        .with_feature_names(columns)
        .with_n_permutations(4)
        .explain_batch(&instances())
        .unwrap();

    let deviations = matrix.predictions() - matrix.base_value();
    for (sum, dev) in matrix.row_sums().iter().zip(deviations.iter()) {
        assert!((sum - dev).abs() <= LOCAL_ACCURACY_TOLERANCE * dev.abs().max(1.0));
    }
}

#[test]
fn test_columns_follow_scoring_frame_order() {
    let model = tree_model();
    // Scoring frame stores the features in a different order plus an unused column
    let columns = names(&["c", "unused", "a", "b"]);
    let layout = model.layout_for(&columns).unwrap();

    let reorder = |x: &Array2<f64>| -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), 4));
        for (i, row) in x.rows().into_iter().enumerate() {
            out[[i, 0]] = row[2];
            out[[i, 1]] = 9.0;
            out[[i, 2]] = row[0];
            out[[i, 3]] = row[1];
        }
        out
    };

    let matrix = LocalExplainer::new(|x| model.predict_matrix(x, &layout), reorder(&background()))
        .with_feature_names(columns)
        .explain_batch(&reorder(&instances()))
        .unwrap();

    // A column the model never reads receives nothing
    assert!(matrix.column(1).iter().all(|v| v.abs() < 1e-12));
    assert!(matrix.local_accuracy_gap() < 1e-9);
}

#[test]
fn test_results_independent_of_thread_count() {
    let model = tree_model();
    let columns = names(&["a", "b", "c"]);
    let layout = model.layout_for(&columns).unwrap();

    let run = |threads: usize| {
        LocalExplainer::new(|x| model.predict_matrix(x, &layout), background())
            .with_seed(2024)
            .with_parallel(ParallelConfig::new().with_threads(threads))
            .explain_batch(&instances())
            .unwrap()
    };

    let single = run(1);
    let many = run(4);
    assert_eq!(single.values(), many.values());
}
